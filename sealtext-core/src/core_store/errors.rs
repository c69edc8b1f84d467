/*
    errors.rs - Error types for the shared-store layer

    Covers failures of the store bindings themselves:
    - Local I/O on the working copy
    - Transport failures (probe, fetch, push)
    - Commands that exited unsuccessfully
    - Partition files that do not parse

    A rejected push is not an error; bindings report it as
    `PushOutcome::Rejected`.
*/

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur in the store subsystem
#[derive(Debug, Error)]
pub enum StoreError {
    /// Local filesystem error
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The remote could not be reached
    #[error("Remote unreachable: {0}")]
    Unreachable(String),

    /// A network operation exceeded its time bound
    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },

    /// An external command exited unsuccessfully
    #[error("Command `{command}` failed ({status}): {stderr}")]
    Command { command: String, status: String, stderr: String },

    /// A stored file does not have the expected shape
    #[error("Corrupted data in {path}: {reason}")]
    Corrupted { path: String, reason: String },

    /// Path escapes the working copy or is otherwise unusable
    #[error("Invalid store path: {0}")]
    InvalidPath(String),

    /// The local path is not a working copy
    #[error("Not a repository: {0}")]
    NotARepository(String),

    /// No remote has been configured yet
    #[error("No remote configured")]
    NoRemote,

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Whether retrying the operation later might succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unreachable(_) | StoreError::Timeout { .. })
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;
