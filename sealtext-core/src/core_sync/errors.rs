//! Error types for core_sync module

use crate::core_crypto::CryptoError;
use crate::core_store::StoreError;
use thiserror::Error;

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that end a publish or receive cycle
#[derive(Error, Debug)]
pub enum SyncError {
    /// Connectivity probe failed, or every attempt failed on transport
    #[error("Remote unreachable: {0}")]
    Unreachable(String),

    /// Non-fast-forward rejections exhausted the retry budget
    #[error("Sync failed after {attempts} attempts")]
    SyncFailed { attempts: u32 },

    /// Fetch found concurrent edits to the same paths
    #[error("Merge conflict on {paths:?}")]
    Conflict { paths: Vec<String> },

    /// The remote refused the push for a reason other than a lost race
    #[error("Push rejected: {0}")]
    PushRejected(String),

    /// Store operation failed
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Sealing a record failed
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

impl SyncError {
    /// Whether another attempt within the same cycle may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            SyncError::Store(e) => e.is_transient(),
            _ => false,
        }
    }
}
