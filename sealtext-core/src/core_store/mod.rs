/*
    core_store - Shared-store layer

    The only transport and durability mechanism SealText has:
    - The shared-store collaborator trait
    - Per-author append-only partitions on top of it
    - An in-process binding (tests, simulations)
    - A binding that drives the `git` executable
*/

pub mod author_log;
pub mod errors;
pub mod git_store;
pub mod memory_store;
pub mod traits;

pub use author_log::{AuthorId, AuthorLog, Partition, MESSAGES_DIR};
pub use errors::{StoreError, StoreResult};
pub use git_store::GitStore;
pub use memory_store::{CommitSummary, MemoryRemote, MemoryStore};
pub use traits::{
    Credentials, MergeOutcome, PushOutcome, RejectReason, RemoteSpec, Revision, SharedStore,
};
