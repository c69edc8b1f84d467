//! Message records and the per-author hash chain
//!
//! - [`types`]: drafts, sealed records and reader-facing messages
//! - [`chain`]: hash computation and chain verification

pub mod chain;
pub mod types;

pub use chain::{ChainCursor, ChainError, ChainResult, HashChainer, TamperReason};
pub use types::{
    current_timestamp, ChatMessage, IntegrityStatus, MessageDraft, PlaintextMessage, RecordOrigin,
    TAMPER_WARNING, UNDECRYPTABLE_NOTICE,
};
