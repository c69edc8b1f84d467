//! Synchronization with the shared store
//!
//! - [`engine`]: the publish/receive state machine with conflict retry
//! - [`reader`]: merged, verified, timestamp-ordered reads

pub mod engine;
pub mod errors;
pub mod reader;

pub use engine::{SyncConfig, SyncEngine, SyncState};
pub use errors::{SyncError, SyncResult};
pub use reader::MessageReader;
