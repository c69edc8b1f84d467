//! Git Store Binding
//!
//! Drives the `git` executable against a local working copy whose `origin`
//! remote is the shared chat repository.
//!
//! - Every command runs non-interactively (`GIT_TERMINAL_PROMPT=0`, no
//!   stdin) and is killed if the calling future is dropped, so an outer
//!   timeout really stops a hung fetch or push.
//! - Credentials travel per command as an HTTP `Authorization` header and
//!   are never written to `.git/config`.
//! - Push results come from `git push --porcelain`; a `!` status line
//!   becomes a typed rejection instead of an error string.

use super::errors::{StoreError, StoreResult};
use super::traits::{
    validate_relative_path, MergeOutcome, PushOutcome, RejectReason, RemoteSpec, Revision,
    SharedStore,
};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::sync::{Mutex, MutexGuard};
use tokio::process::Command;
use tracing::{debug, warn};

const REMOTE_NAME: &str = "origin";

/// Push summaries meaning the remote moved underneath us
const RETRYABLE_REJECTIONS: &[&str] = &[
    "(fetch first)",
    "(non-fast-forward)",
    "(failed to update ref)",
    "cannot lock ref",
    "(stale info)",
];

/// Domain used for commit e-mail addresses
const NOREPLY_DOMAIN: &str = "users.noreply.github.com";

/// Captured result of one git invocation
struct GitOutput {
    success: bool,
    status: String,
    stdout: String,
    stderr: String,
}

impl From<Output> for GitOutput {
    fn from(output: Output) -> Self {
        Self {
            success: output.status.success(),
            status: output.status.to_string(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
    }
}

/// Working copy of a git repository
pub struct GitStore {
    workdir: PathBuf,
    remote: Mutex<Option<RemoteSpec>>,
}

impl GitStore {
    /// Create a new repository at `path` (the directory may already exist)
    pub async fn init(path: impl AsRef<Path>) -> StoreResult<Self> {
        let workdir = path.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&workdir).await?;

        let store = Self::at(workdir);
        store.git_ok(&["init", "--quiet"]).await?;
        debug!(path = %store.workdir.display(), "Initialized repository");
        Ok(store)
    }

    /// Open an existing working copy
    pub async fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let workdir = path.as_ref().to_path_buf();
        if tokio::fs::metadata(workdir.join(".git")).await.is_err() {
            return Err(StoreError::NotARepository(workdir.display().to_string()));
        }
        Ok(Self::at(workdir))
    }

    /// Open `path` if it is a working copy, otherwise initialize one there
    pub async fn open_or_init(path: impl AsRef<Path>) -> StoreResult<Self> {
        match Self::open(path.as_ref()).await {
            Err(StoreError::NotARepository(_)) => Self::init(path).await,
            other => other,
        }
    }

    fn at(workdir: PathBuf) -> Self {
        Self { workdir, remote: Mutex::new(None) }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn remote(&self) -> MutexGuard<'_, Option<RemoteSpec>> {
        self.remote.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// `-c http.extraHeader=...` for the configured credentials, if any
    fn auth_args(&self) -> Vec<String> {
        match self.remote().as_ref().and_then(|spec| spec.credentials.as_ref()) {
            Some(credentials) => vec![
                "-c".to_string(),
                format!(
                    "http.extraHeader=Authorization: Basic {}",
                    STANDARD.encode(credentials.basic_pair())
                ),
            ],
            None => Vec::new(),
        }
    }

    fn require_remote(&self) -> StoreResult<()> {
        if self.remote().is_some() {
            Ok(())
        } else {
            Err(StoreError::NoRemote)
        }
    }

    async fn run(&self, args: &[&str], authenticated: bool) -> StoreResult<GitOutput> {
        let mut command = Command::new("git");
        command
            .arg("-C")
            .arg(&self.workdir)
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("LC_ALL", "C")
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if authenticated {
            command.args(self.auth_args());
        }
        command.args(args);

        debug!(command = %args.join(" "), "Running git");
        let output = command.output().await?;
        Ok(output.into())
    }

    /// Run a local command
    async fn git(&self, args: &[&str]) -> StoreResult<GitOutput> {
        self.run(args, false).await
    }

    /// Run a local command and fail on a non-zero exit
    async fn git_ok(&self, args: &[&str]) -> StoreResult<String> {
        let output = self.git(args).await?;
        if output.success {
            Ok(output.stdout)
        } else {
            Err(command_error(args, output))
        }
    }

    /// Run a command that talks to the remote; failures are transport errors
    async fn git_remote(&self, args: &[&str]) -> StoreResult<GitOutput> {
        self.require_remote()?;
        self.run(args, true).await
    }

    async fn rev_parse(&self, rev: &str) -> StoreResult<Option<String>> {
        let output = self.git(&["rev-parse", "--verify", "--quiet", rev]).await?;
        Ok(output.success.then(|| output.stdout.trim().to_string()))
    }

    async fn conflicted_paths(&self) -> StoreResult<Vec<String>> {
        let stdout = self.git_ok(&["diff", "--name-only", "--diff-filter=U"]).await?;
        Ok(stdout.lines().map(str::to_string).collect())
    }
}

fn command_error(args: &[&str], output: GitOutput) -> StoreError {
    StoreError::Command {
        command: format!("git {}", args.join(" ")),
        status: output.status,
        stderr: output.stderr,
    }
}

/// Classify `git push --porcelain` output
///
/// Status lines look like `<flag>\t<from>:<to>\t<summary>`; `!` marks a
/// rejected ref. A lost race for the remote ref lock is reported as a
/// non-fast-forward so the caller merges and retries.
fn parse_push_output(stdout: &str) -> Option<RejectReason> {
    stdout
        .lines()
        .find(|line| line.starts_with('!'))
        .map(|line| {
            if RETRYABLE_REJECTIONS.iter().any(|marker| line.contains(marker)) {
                RejectReason::NonFastForward
            } else {
                RejectReason::Other(line.trim_start_matches('!').trim().to_string())
            }
        })
}

/// Commit e-mail for a display name
fn noreply_email(name: &str) -> String {
    let local: String = name
        .chars()
        .map(|c| if c.is_whitespace() || c == '@' || c == '<' || c == '>' { '-' } else { c })
        .collect();
    format!("{}@{}", local, NOREPLY_DOMAIN)
}

#[async_trait]
impl SharedStore for GitStore {
    async fn set_identity(&self, name: &str) -> StoreResult<()> {
        self.git_ok(&["config", "user.name", name]).await?;
        self.git_ok(&["config", "user.email", &noreply_email(name)]).await?;
        Ok(())
    }

    async fn ensure_remote(&self, remote: &RemoteSpec) -> StoreResult<()> {
        let current = self.git(&["remote", "get-url", REMOTE_NAME]).await?;
        if !current.success {
            self.git_ok(&["remote", "add", REMOTE_NAME, &remote.url]).await?;
        } else if current.stdout.trim() != remote.url {
            self.git_ok(&["remote", "set-url", REMOTE_NAME, &remote.url]).await?;
        }

        *self.remote() = Some(remote.clone());
        Ok(())
    }

    async fn probe(&self) -> StoreResult<()> {
        let output = self.git_remote(&["ls-remote", "--heads", REMOTE_NAME]).await?;
        if output.success {
            Ok(())
        } else {
            Err(StoreError::Unreachable(output.stderr))
        }
    }

    async fn fetch_and_merge(&self, branch: &str) -> StoreResult<MergeOutcome> {
        let fetch = self.git_remote(&["fetch", "--quiet", REMOTE_NAME]).await?;
        if !fetch.success {
            return Err(StoreError::Unreachable(fetch.stderr));
        }

        let tracking = format!("refs/remotes/{}/{}", REMOTE_NAME, branch);
        let Some(theirs) = self.rev_parse(&tracking).await? else {
            // Remote branch does not exist yet
            return Ok(MergeOutcome::UpToDate);
        };

        let before = self.rev_parse("HEAD").await?;
        if before.as_deref() == Some(theirs.as_str()) {
            return Ok(MergeOutcome::UpToDate);
        }

        // Two first writers racing on an empty remote create unrelated roots
        let merge_args = [
            "merge",
            "--no-edit",
            "--quiet",
            "--allow-unrelated-histories",
            tracking.as_str(),
        ];
        let merge = self.git(&merge_args).await?;
        if !merge.success {
            let paths = self.conflicted_paths().await?;
            if paths.is_empty() {
                return Err(command_error(&merge_args, merge));
            }
            warn!(?paths, "Merge conflict, aborting merge");
            self.git_ok(&["merge", "--abort"]).await?;
            return Ok(MergeOutcome::Conflict { paths });
        }

        let after = self.rev_parse("HEAD").await?;
        if after == before {
            Ok(MergeOutcome::UpToDate)
        } else {
            Ok(MergeOutcome::Updated)
        }
    }

    async fn head(&self) -> StoreResult<Option<Revision>> {
        Ok(self.rev_parse("HEAD").await?.map(Revision::new))
    }

    async fn read_file(&self, path: &str) -> StoreResult<Option<Vec<u8>>> {
        validate_relative_path(path)?;
        match tokio::fs::read(self.workdir.join(path)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_files(&self, dir: &str) -> StoreResult<Vec<String>> {
        validate_relative_path(dir)?;
        let mut entries = match tokio::fs::read_dir(self.workdir.join(dir)).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    async fn write_file(&self, path: &str, bytes: &[u8]) -> StoreResult<()> {
        validate_relative_path(path)?;
        let full = self.workdir.join(path);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, bytes).await?;
        self.git_ok(&["add", "--", path]).await?;
        Ok(())
    }

    async fn commit(&self, message: &str) -> StoreResult<Option<Revision>> {
        let staged = self.git(&["diff", "--cached", "--quiet"]).await?;
        if staged.success {
            return Ok(None);
        }

        self.git_ok(&["-c", "commit.gpgsign=false", "commit", "--quiet", "-m", message])
            .await?;
        self.head().await
    }

    async fn push(&self, branch: &str) -> StoreResult<PushOutcome> {
        let refspec = format!("HEAD:refs/heads/{}", branch);
        let output = self
            .git_remote(&["push", "--porcelain", REMOTE_NAME, &refspec])
            .await?;

        if let Some(reason) = parse_push_output(&output.stdout) {
            debug!(?reason, "Push rejected");
            return Ok(PushOutcome::Rejected(reason));
        }
        if output.success {
            Ok(PushOutcome::Pushed)
        } else {
            Err(StoreError::Unreachable(output.stderr))
        }
    }

    async fn reset_to(&self, revision: Option<&Revision>) -> StoreResult<()> {
        match revision {
            Some(revision) => {
                self.git_ok(&["reset", "--quiet", "--hard", revision.as_str()]).await?;
            }
            None => {
                if self.rev_parse("HEAD").await?.is_some() {
                    self.git_ok(&["update-ref", "-d", "HEAD"]).await?;
                }
                self.git_ok(&["read-tree", "--empty"]).await?;
                self.git_ok(&["clean", "-fdq"]).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_push_output_accepted() {
        let stdout = "To /tmp/remote.git\n \tHEAD:refs/heads/main\t[new branch]\nDone\n";
        assert_eq!(parse_push_output(stdout), None);
    }

    #[test]
    fn test_parse_push_output_fetch_first() {
        let stdout = "To /tmp/remote.git\n!\tHEAD:refs/heads/main\t[rejected] (fetch first)\nDone\n";
        assert_eq!(parse_push_output(stdout), Some(RejectReason::NonFastForward));
    }

    #[test]
    fn test_parse_push_output_non_fast_forward() {
        let stdout = "!\tHEAD:refs/heads/main\t[rejected] (non-fast-forward)\n";
        assert_eq!(parse_push_output(stdout), Some(RejectReason::NonFastForward));
    }

    #[test]
    fn test_parse_push_output_lost_ref_race() {
        for summary in [
            "[remote rejected] (failed to update ref)",
            "[remote rejected] (cannot lock ref 'refs/heads/main')",
            "[rejected] (stale info)",
        ] {
            let stdout = format!("To /tmp/remote.git\n!\tHEAD:refs/heads/main\t{}\nDone\n", summary);
            assert_eq!(parse_push_output(&stdout), Some(RejectReason::NonFastForward), "{}", summary);
        }
    }

    #[test]
    fn test_parse_push_output_other_rejection() {
        let stdout = "!\tHEAD:refs/heads/main\t[remote rejected] (protected branch hook declined)\n";
        assert!(matches!(
            parse_push_output(stdout),
            Some(RejectReason::Other(reason)) if reason.contains("protected branch")
        ));
    }

    #[test]
    fn test_noreply_email() {
        assert_eq!(noreply_email("alice"), "alice@users.noreply.github.com");
        assert_eq!(noreply_email("Alice Smith"), "Alice-Smith@users.noreply.github.com");
    }

    #[tokio::test]
    async fn test_open_missing_repository() {
        let dir = tempfile::tempdir().unwrap();
        let result = GitStore::open(dir.path()).await;
        assert!(matches!(result, Err(StoreError::NotARepository(_))));
    }
}
