//! Shared Store Trait
//!
//! The interface SealText consumes from a version-controlled shared store.
//! A binding owns one local working copy plus a link to one remote; the
//! sync engine drives it through fetch, write, commit and push.

use super::errors::{StoreError, StoreResult};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::path::{Component, Path};

/// Opaque pointer to a commit in the local working copy
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Revision(String);

impl Revision {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Username/token pair for authenticating against the remote
///
/// Held in memory only; bindings must never write it to disk.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub token: SecretString,
}

impl Credentials {
    pub fn new(username: impl Into<String>, token: impl Into<String>) -> Self {
        Self { username: username.into(), token: SecretString::new(token.into()) }
    }

    /// `username:token`, for HTTP basic authentication
    pub(crate) fn basic_pair(&self) -> String {
        format!("{}:{}", self.username, self.token.expose_secret())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Where the remote lives and how to authenticate
#[derive(Debug, Clone)]
pub struct RemoteSpec {
    pub url: String,
    pub credentials: Option<Credentials>,
}

impl RemoteSpec {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), credentials: None }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }
}

/// Result of integrating the remote branch into the working copy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Nothing new on the remote
    UpToDate,
    /// Remote changes were fast-forwarded or merged
    Updated,
    /// Both sides changed the same paths; the working copy is unchanged
    Conflict { paths: Vec<String> },
}

/// Why the remote refused a push
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// The remote branch advanced since the last fetch
    NonFastForward,
    /// Any other refusal (permissions, hooks, protected branch)
    Other(String),
}

/// Result of publishing local commits
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    Pushed,
    Rejected(RejectReason),
}

/// Shared-store collaborator
///
/// All paths are relative to the working-copy root and use `/` as the
/// separator. Methods take `&self`; bindings use interior mutability so a
/// single handle can be reused for the whole session.
#[async_trait]
pub trait SharedStore: Send + Sync {
    /// Set the identity recorded on commits made through this handle
    async fn set_identity(&self, name: &str) -> StoreResult<()>;

    /// Point the working copy at a remote, replacing any previous one
    async fn ensure_remote(&self, remote: &RemoteSpec) -> StoreResult<()>;

    /// Cheap connectivity check against the remote
    async fn probe(&self) -> StoreResult<()>;

    /// Fetch `branch` from the remote and integrate it into the working copy
    async fn fetch_and_merge(&self, branch: &str) -> StoreResult<MergeOutcome>;

    /// Current local commit, `None` before the first commit
    async fn head(&self) -> StoreResult<Option<Revision>>;

    /// Contents of a file in the working copy, `None` if absent
    async fn read_file(&self, path: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Names of the regular files directly inside `dir`, sorted
    async fn list_files(&self, dir: &str) -> StoreResult<Vec<String>>;

    /// Create or replace a file and stage it for the next commit
    async fn write_file(&self, path: &str, bytes: &[u8]) -> StoreResult<()>;

    /// Commit staged changes; `None` when there was nothing to commit
    async fn commit(&self, message: &str) -> StoreResult<Option<Revision>>;

    /// Publish the local head to `branch` on the remote
    async fn push(&self, branch: &str) -> StoreResult<PushOutcome>;

    /// Discard local commits and working-copy changes back to `revision`
    ///
    /// `None` returns the working copy to its unborn, empty state.
    async fn reset_to(&self, revision: Option<&Revision>) -> StoreResult<()>;

    /// Release resources held by the handle
    async fn close(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// Reject paths that are empty, absolute, or step outside the working copy
pub fn validate_relative_path(path: &str) -> StoreResult<()> {
    if path.is_empty() {
        return Err(StoreError::InvalidPath("empty path".to_string()));
    }

    for component in Path::new(path).components() {
        match component {
            Component::Normal(part) if part != ".git" => {}
            _ => return Err(StoreError::InvalidPath(path.to_string())),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_relative_path() {
        assert!(validate_relative_path("messages/alice.json").is_ok());
        assert!(validate_relative_path("").is_err());
        assert!(validate_relative_path("/etc/passwd").is_err());
        assert!(validate_relative_path("messages/../../x").is_err());
        assert!(validate_relative_path(".git/config").is_err());
        assert!(validate_relative_path("./messages").is_err());
    }

    #[test]
    fn test_credentials_debug_redacted() {
        let creds = Credentials::new("alice", "ghp_secret");
        let debug = format!("{:?}", creds);
        assert!(debug.contains("alice"));
        assert!(!debug.contains("ghp_secret"));
        assert_eq!(creds.basic_pair(), "alice:ghp_secret");
    }

    #[test]
    fn test_remote_spec_builder() {
        let spec = RemoteSpec::new("https://example.com/chat.git")
            .with_credentials(Credentials::new("bob", "t"));
        assert_eq!(spec.url, "https://example.com/chat.git");
        assert_eq!(spec.credentials.map(|c| c.username), Some("bob".to_string()));
    }
}
