//! In-Memory Store Binding
//!
//! A small commit graph living in process memory. [`MemoryRemote`] plays the
//! shared remote; each participant gets its own [`MemoryStore`] working copy
//! attached to it. Push is accepted only as a fast-forward and fetch merges
//! path by path, which is enough to reproduce the concurrency behaviour of a
//! real version-controlled store in tests and simulations.
//!
//! The remote also exposes fault injection: reachability, latency, a
//! foreign commit that lands just before the next push, and transport
//! failures scoped to fetch or push so the probe still succeeds.

use super::errors::{StoreError, StoreResult};
use super::traits::{
    validate_relative_path, MergeOutcome, PushOutcome, RejectReason, RemoteSpec, Revision,
    SharedStore,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

type CommitId = u64;
type Tree = BTreeMap<String, Vec<u8>>;

#[derive(Debug, Clone)]
struct Commit {
    parents: Vec<CommitId>,
    message: String,
    author: String,
    tree: Tree,
}

#[derive(Debug, Clone)]
struct ForeignCommit {
    path: String,
    bytes: Vec<u8>,
}

/// Remote state plus the object database shared by every attached store
#[derive(Debug)]
struct RemoteState {
    objects: HashMap<CommitId, Commit>,
    branches: HashMap<String, CommitId>,
    next_id: CommitId,
    reachable: bool,
    latency: Duration,
    scheduled: VecDeque<ForeignCommit>,
    push_attempts: usize,
    lose_next_ack: bool,
    failing_fetches: usize,
    failing_pushes: usize,
}

impl RemoteState {
    fn insert(&mut self, commit: Commit) -> CommitId {
        self.next_id += 1;
        let id = self.next_id;
        self.objects.insert(id, commit);
        id
    }

    fn tree_of(&self, id: Option<CommitId>) -> Tree {
        id.and_then(|id| self.objects.get(&id))
            .map(|commit| commit.tree.clone())
            .unwrap_or_default()
    }

    /// All commits reachable from `id`, itself included
    fn ancestors(&self, id: CommitId) -> HashSet<CommitId> {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([id]);
        while let Some(current) = queue.pop_front() {
            if !seen.insert(current) {
                continue;
            }
            if let Some(commit) = self.objects.get(&current) {
                queue.extend(commit.parents.iter().copied());
            }
        }
        seen
    }

    fn is_ancestor(&self, ancestor: CommitId, descendant: CommitId) -> bool {
        self.ancestors(descendant).contains(&ancestor)
    }

    /// Nearest common ancestor found walking back from `theirs`
    fn merge_base(&self, ours: CommitId, theirs: CommitId) -> Option<CommitId> {
        let ours_ancestors = self.ancestors(ours);
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([theirs]);
        while let Some(current) = queue.pop_front() {
            if ours_ancestors.contains(&current) {
                return Some(current);
            }
            if !seen.insert(current) {
                continue;
            }
            if let Some(commit) = self.objects.get(&current) {
                queue.extend(commit.parents.iter().copied());
            }
        }
        None
    }

    /// Commit one file change straight onto a remote branch
    fn commit_onto(&mut self, branch: &str, foreign: ForeignCommit) {
        let parent = self.branches.get(branch).copied();
        let mut tree = self.tree_of(parent);
        let message = format!("Foreign write to {}", foreign.path);
        tree.insert(foreign.path, foreign.bytes);
        let id = self.insert(Commit {
            parents: parent.into_iter().collect(),
            message,
            author: "foreign".to_string(),
            tree,
        });
        self.branches.insert(branch.to_string(), id);
    }

    fn land_scheduled(&mut self, branch: &str) {
        if let Some(foreign) = self.scheduled.pop_front() {
            self.commit_onto(branch, foreign);
        }
    }
}

/// Author and message of one commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitSummary {
    pub author: String,
    pub message: String,
}

/// Shared in-process remote
///
/// Cloning yields another handle to the same remote.
#[derive(Debug, Clone)]
pub struct MemoryRemote {
    url: String,
    state: Arc<Mutex<RemoteState>>,
}

impl MemoryRemote {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            state: Arc::new(Mutex::new(RemoteState {
                objects: HashMap::new(),
                branches: HashMap::new(),
                next_id: 0,
                reachable: true,
                latency: Duration::ZERO,
                scheduled: VecDeque::new(),
                push_attempts: 0,
                lose_next_ack: false,
                failing_fetches: 0,
                failing_pushes: 0,
            })),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn lock(&self) -> MutexGuard<'_, RemoteState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make every network operation fail (or succeed again)
    pub fn set_reachable(&self, reachable: bool) {
        self.lock().reachable = reachable;
    }

    /// Delay applied to probe, fetch and push
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = latency;
    }

    /// Queue a commit by another writer
    ///
    /// Each push lands at most one queued commit just before it is evaluated,
    /// so queueing `n` commits forces the next `n` pushes to be rejected.
    pub fn schedule_foreign_commit(&self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.lock()
            .scheduled
            .push_back(ForeignCommit { path: path.into(), bytes: bytes.into() });
    }

    /// Accept the next push but report it as a transport failure
    pub fn lose_next_push_ack(&self) {
        self.lock().lose_next_ack = true;
    }

    /// Fail the next `n` fetches on transport; probes are unaffected
    pub fn fail_next_fetches(&self, n: usize) {
        self.lock().failing_fetches = n;
    }

    /// Fail the next `n` pushes on transport before they reach the branch
    pub fn fail_next_pushes(&self, n: usize) {
        self.lock().failing_pushes = n;
    }

    /// Commit a file straight onto the remote branch, bypassing any working copy
    pub fn write_file_direct(&self, branch: &str, path: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.lock()
            .commit_onto(branch, ForeignCommit { path: path.into(), bytes: bytes.into() });
    }

    /// File contents at the tip of `branch`
    pub fn read_file(&self, branch: &str, path: &str) -> Option<Vec<u8>> {
        let state = self.lock();
        let head = state.branches.get(branch).copied();
        state.tree_of(head).get(path).cloned()
    }

    /// Paths present at the tip of `branch`
    pub fn paths(&self, branch: &str) -> Vec<String> {
        let state = self.lock();
        let head = state.branches.get(branch).copied();
        state.tree_of(head).into_keys().collect()
    }

    /// Number of commits reachable from the tip of `branch`
    pub fn commit_count(&self, branch: &str) -> usize {
        let state = self.lock();
        state
            .branches
            .get(branch)
            .map(|head| state.ancestors(*head).len())
            .unwrap_or(0)
    }

    /// Commits reachable from `branch`, newest first
    pub fn log(&self, branch: &str) -> Vec<CommitSummary> {
        let state = self.lock();
        let Some(head) = state.branches.get(branch).copied() else {
            return Vec::new();
        };
        let mut ids: Vec<CommitId> = state.ancestors(head).into_iter().collect();
        ids.sort_unstable_by(|a, b| b.cmp(a));
        ids.iter()
            .filter_map(|id| state.objects.get(id))
            .map(|commit| CommitSummary {
                author: commit.author.clone(),
                message: commit.message.clone(),
            })
            .collect()
    }

    /// Push attempts seen so far, rejected ones included
    pub fn push_attempts(&self) -> usize {
        self.lock().push_attempts
    }

    /// Wait out the injected latency, then fail if unreachable
    async fn network_round_trip(&self, operation: &str) -> StoreResult<()> {
        let latency = self.lock().latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        let mut state = self.lock();
        let injected = match operation {
            "fetch" => &mut state.failing_fetches,
            "push" => &mut state.failing_pushes,
            _ => return Self::reachability(&state, operation, &self.url),
        };
        if *injected > 0 {
            *injected -= 1;
            return Err(StoreError::Unreachable(format!("{}: connection reset by {}", operation, self.url)));
        }
        Self::reachability(&state, operation, &self.url)
    }

    fn reachability(state: &RemoteState, operation: &str, url: &str) -> StoreResult<()> {
        if state.reachable {
            Ok(())
        } else {
            Err(StoreError::Unreachable(format!("{}: {} is not reachable", operation, url)))
        }
    }
}

#[derive(Debug, Default)]
struct LocalState {
    head: Option<CommitId>,
    tree: Tree,
    identity: Option<String>,
    remote_attached: bool,
}

/// A participant's working copy attached to a [`MemoryRemote`]
#[derive(Debug)]
pub struct MemoryStore {
    remote: MemoryRemote,
    local: Mutex<LocalState>,
}

impl MemoryStore {
    /// Fresh, empty working copy that already tracks `remote`
    pub fn new(remote: &MemoryRemote) -> Self {
        Self {
            remote: remote.clone(),
            local: Mutex::new(LocalState { remote_attached: true, ..LocalState::default() }),
        }
    }

    /// Fresh working copy with no remote configured yet
    pub fn detached(remote: &MemoryRemote) -> Self {
        Self { remote: remote.clone(), local: Mutex::new(LocalState::default()) }
    }

    fn local(&self) -> MutexGuard<'_, LocalState> {
        self.local.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn require_remote(&self) -> StoreResult<()> {
        if self.local().remote_attached {
            Ok(())
        } else {
            Err(StoreError::NoRemote)
        }
    }

    fn parse_revision(revision: &Revision) -> StoreResult<CommitId> {
        revision
            .as_str()
            .parse()
            .map_err(|_| StoreError::InvalidPath(format!("unknown revision {}", revision)))
    }
}

#[async_trait]
impl SharedStore for MemoryStore {
    async fn set_identity(&self, name: &str) -> StoreResult<()> {
        self.local().identity = Some(name.to_string());
        Ok(())
    }

    async fn ensure_remote(&self, remote: &RemoteSpec) -> StoreResult<()> {
        if remote.url != self.remote.url {
            return Err(StoreError::Unreachable(format!("unknown remote {}", remote.url)));
        }
        self.local().remote_attached = true;
        Ok(())
    }

    async fn probe(&self) -> StoreResult<()> {
        self.require_remote()?;
        self.remote.network_round_trip("probe").await
    }

    async fn fetch_and_merge(&self, branch: &str) -> StoreResult<MergeOutcome> {
        self.require_remote()?;
        self.remote.network_round_trip("fetch").await?;

        let mut remote = self.remote.lock();
        let mut local = self.local();

        let Some(theirs) = remote.branches.get(branch).copied() else {
            return Ok(MergeOutcome::UpToDate);
        };

        let Some(ours) = local.head else {
            local.head = Some(theirs);
            local.tree = remote.tree_of(Some(theirs));
            debug!(branch, "Fast-forwarded unborn working copy");
            return Ok(MergeOutcome::Updated);
        };

        if remote.is_ancestor(theirs, ours) {
            return Ok(MergeOutcome::UpToDate);
        }

        if remote.is_ancestor(ours, theirs) {
            local.head = Some(theirs);
            local.tree = remote.tree_of(Some(theirs));
            debug!(branch, "Fast-forwarded working copy");
            return Ok(MergeOutcome::Updated);
        }

        let base = remote.tree_of(remote.merge_base(ours, theirs));
        let our_tree = remote.tree_of(Some(ours));
        let their_tree = remote.tree_of(Some(theirs));

        let paths: BTreeSet<&String> = base.keys().chain(our_tree.keys()).chain(their_tree.keys()).collect();
        let mut merged = Tree::new();
        let mut conflicts = Vec::new();

        for path in paths {
            let (b, o, t) = (base.get(path), our_tree.get(path), their_tree.get(path));
            let resolved = if o == t || t == b {
                o
            } else if o == b {
                t
            } else {
                conflicts.push(path.clone());
                continue;
            };
            if let Some(bytes) = resolved {
                merged.insert(path.clone(), bytes.clone());
            }
        }

        if !conflicts.is_empty() {
            return Ok(MergeOutcome::Conflict { paths: conflicts });
        }

        let author = local.identity.clone().unwrap_or_default();
        let merge = remote.insert(Commit {
            parents: vec![ours, theirs],
            message: format!("Merge remote-tracking branch 'origin/{}'", branch),
            author,
            tree: merged.clone(),
        });
        local.head = Some(merge);
        local.tree = merged;
        debug!(branch, "Merged diverged histories");
        Ok(MergeOutcome::Updated)
    }

    async fn head(&self) -> StoreResult<Option<Revision>> {
        Ok(self.local().head.map(|id| Revision::new(id.to_string())))
    }

    async fn read_file(&self, path: &str) -> StoreResult<Option<Vec<u8>>> {
        validate_relative_path(path)?;
        Ok(self.local().tree.get(path).cloned())
    }

    async fn list_files(&self, dir: &str) -> StoreResult<Vec<String>> {
        validate_relative_path(dir)?;
        let prefix = format!("{}/", dir.trim_end_matches('/'));
        Ok(self
            .local()
            .tree
            .keys()
            .filter_map(|path| path.strip_prefix(&prefix))
            .filter(|name| !name.contains('/'))
            .map(str::to_string)
            .collect())
    }

    async fn write_file(&self, path: &str, bytes: &[u8]) -> StoreResult<()> {
        validate_relative_path(path)?;
        self.local().tree.insert(path.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn commit(&self, message: &str) -> StoreResult<Option<Revision>> {
        let mut remote = self.remote.lock();
        let mut local = self.local();

        if remote.tree_of(local.head) == local.tree {
            return Ok(None);
        }

        let id = remote.insert(Commit {
            parents: local.head.into_iter().collect(),
            message: message.to_string(),
            author: local.identity.clone().unwrap_or_default(),
            tree: local.tree.clone(),
        });
        local.head = Some(id);
        Ok(Some(Revision::new(id.to_string())))
    }

    async fn push(&self, branch: &str) -> StoreResult<PushOutcome> {
        self.require_remote()?;
        self.remote.network_round_trip("push").await?;

        let mut remote = self.remote.lock();
        let local = self.local();

        remote.push_attempts += 1;
        remote.land_scheduled(branch);

        let Some(ours) = local.head else {
            return Ok(PushOutcome::Pushed);
        };

        match remote.branches.get(branch).copied() {
            Some(theirs) if !remote.is_ancestor(theirs, ours) => {
                debug!(branch, "Push rejected: remote advanced");
                Ok(PushOutcome::Rejected(RejectReason::NonFastForward))
            }
            _ => {
                remote.branches.insert(branch.to_string(), ours);
                if std::mem::take(&mut remote.lose_next_ack) {
                    return Err(StoreError::Unreachable("connection reset after push".to_string()));
                }
                Ok(PushOutcome::Pushed)
            }
        }
    }

    async fn reset_to(&self, revision: Option<&Revision>) -> StoreResult<()> {
        let target = revision.map(Self::parse_revision).transpose()?;
        let remote = self.remote.lock();
        let mut local = self.local();

        if let Some(id) = target {
            if !remote.objects.contains_key(&id) {
                return Err(StoreError::InvalidPath(format!("unknown revision {}", id)));
            }
        }

        local.head = target;
        local.tree = remote.tree_of(target);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BRANCH: &str = "main";

    async fn commit_file(store: &MemoryStore, path: &str, bytes: &[u8]) {
        store.write_file(path, bytes).await.unwrap();
        store.commit("test commit").await.unwrap();
    }

    #[tokio::test]
    async fn test_write_read_list() {
        let store = MemoryStore::new(&MemoryRemote::new("mem://r"));
        store.write_file("messages/a.json", b"[]").await.unwrap();
        store.write_file("messages/nested/b.json", b"[]").await.unwrap();
        store.write_file("other.txt", b"x").await.unwrap();

        assert_eq!(store.read_file("messages/a.json").await.unwrap(), Some(b"[]".to_vec()));
        assert_eq!(store.read_file("missing").await.unwrap(), None);
        assert_eq!(store.list_files("messages").await.unwrap(), vec!["a.json"]);
        assert!(store.write_file("../escape", b"x").await.is_err());
    }

    #[tokio::test]
    async fn test_commit_nothing_returns_none() {
        let store = MemoryStore::new(&MemoryRemote::new("mem://r"));
        assert_eq!(store.commit("empty").await.unwrap(), None);

        commit_file(&store, "a", b"1").await;
        assert!(store.head().await.unwrap().is_some());
        assert_eq!(store.commit("again").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_push_then_fetch_fast_forwards() {
        let remote = MemoryRemote::new("mem://r");
        let alice = MemoryStore::new(&remote);
        let bob = MemoryStore::new(&remote);

        commit_file(&alice, "messages/alice.json", b"[\"a\"]").await;
        assert_eq!(alice.push(BRANCH).await.unwrap(), PushOutcome::Pushed);

        assert_eq!(bob.fetch_and_merge(BRANCH).await.unwrap(), MergeOutcome::Updated);
        assert_eq!(bob.read_file("messages/alice.json").await.unwrap(), Some(b"[\"a\"]".to_vec()));
        assert_eq!(bob.fetch_and_merge(BRANCH).await.unwrap(), MergeOutcome::UpToDate);
    }

    #[tokio::test]
    async fn test_diverged_push_is_rejected_then_merges() {
        let remote = MemoryRemote::new("mem://r");
        let alice = MemoryStore::new(&remote);
        let bob = MemoryStore::new(&remote);

        commit_file(&alice, "messages/alice.json", b"a").await;
        commit_file(&bob, "messages/bob.json", b"b").await;
        assert_eq!(alice.push(BRANCH).await.unwrap(), PushOutcome::Pushed);
        assert_eq!(
            bob.push(BRANCH).await.unwrap(),
            PushOutcome::Rejected(RejectReason::NonFastForward)
        );

        assert_eq!(bob.fetch_and_merge(BRANCH).await.unwrap(), MergeOutcome::Updated);
        assert_eq!(bob.push(BRANCH).await.unwrap(), PushOutcome::Pushed);

        let mut paths = remote.paths(BRANCH);
        paths.sort();
        assert_eq!(paths, vec!["messages/alice.json", "messages/bob.json"]);
    }

    #[tokio::test]
    async fn test_same_path_divergence_conflicts() {
        let remote = MemoryRemote::new("mem://r");
        let alice = MemoryStore::new(&remote);
        let bob = MemoryStore::new(&remote);

        commit_file(&alice, "shared", b"a").await;
        alice.push(BRANCH).await.unwrap();
        bob.fetch_and_merge(BRANCH).await.unwrap();

        commit_file(&alice, "shared", b"a2").await;
        alice.push(BRANCH).await.unwrap();
        commit_file(&bob, "shared", b"b2").await;

        let head_before = bob.head().await.unwrap();
        assert_eq!(
            bob.fetch_and_merge(BRANCH).await.unwrap(),
            MergeOutcome::Conflict { paths: vec!["shared".to_string()] }
        );
        assert_eq!(bob.head().await.unwrap(), head_before);
        assert_eq!(bob.read_file("shared").await.unwrap(), Some(b"b2".to_vec()));
    }

    #[tokio::test]
    async fn test_reset_to_discards_local_commit() {
        let store = MemoryStore::new(&MemoryRemote::new("mem://r"));
        commit_file(&store, "a", b"1").await;
        let checkpoint = store.head().await.unwrap();

        commit_file(&store, "b", b"2").await;
        store.reset_to(checkpoint.as_ref()).await.unwrap();
        assert_eq!(store.head().await.unwrap(), checkpoint);
        assert_eq!(store.read_file("b").await.unwrap(), None);

        store.reset_to(None).await.unwrap();
        assert_eq!(store.head().await.unwrap(), None);
        assert_eq!(store.read_file("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unreachable_remote() {
        let remote = MemoryRemote::new("mem://r");
        let store = MemoryStore::new(&remote);
        remote.set_reachable(false);

        assert!(matches!(store.probe().await, Err(StoreError::Unreachable(_))));
        assert!(store.fetch_and_merge(BRANCH).await.unwrap_err().is_transient());
        assert!(store.push(BRANCH).await.is_err());

        remote.set_reachable(true);
        assert!(store.probe().await.is_ok());
    }

    #[tokio::test]
    async fn test_detached_store_requires_remote() {
        let remote = MemoryRemote::new("mem://r");
        let store = MemoryStore::detached(&remote);
        assert!(matches!(store.probe().await, Err(StoreError::NoRemote)));

        assert!(store.ensure_remote(&RemoteSpec::new("mem://other")).await.is_err());
        store.ensure_remote(&RemoteSpec::new("mem://r")).await.unwrap();
        assert!(store.probe().await.is_ok());
    }

    #[tokio::test]
    async fn test_scheduled_foreign_commit_forces_rejection() {
        let remote = MemoryRemote::new("mem://r");
        let store = MemoryStore::new(&remote);
        commit_file(&store, "messages/alice.json", b"a").await;

        remote.schedule_foreign_commit("messages/bob.json", b"b".to_vec());
        assert_eq!(
            store.push(BRANCH).await.unwrap(),
            PushOutcome::Rejected(RejectReason::NonFastForward)
        );
        assert_eq!(remote.read_file(BRANCH, "messages/bob.json"), Some(b"b".to_vec()));

        store.fetch_and_merge(BRANCH).await.unwrap();
        assert_eq!(store.push(BRANCH).await.unwrap(), PushOutcome::Pushed);
        assert_eq!(remote.push_attempts(), 2);
    }

    #[tokio::test]
    async fn test_each_push_lands_one_foreign_commit() {
        let remote = MemoryRemote::new("mem://r");
        let store = MemoryStore::new(&remote);
        commit_file(&store, "mine", b"m").await;

        remote.schedule_foreign_commit("f1", b"1".to_vec());
        remote.schedule_foreign_commit("f2", b"2".to_vec());

        assert!(matches!(store.push(BRANCH).await.unwrap(), PushOutcome::Rejected(_)));
        assert_eq!(remote.read_file(BRANCH, "f2"), None);
        store.fetch_and_merge(BRANCH).await.unwrap();
        assert!(matches!(store.push(BRANCH).await.unwrap(), PushOutcome::Rejected(_)));
        store.fetch_and_merge(BRANCH).await.unwrap();
        assert_eq!(store.push(BRANCH).await.unwrap(), PushOutcome::Pushed);
    }

    #[tokio::test]
    async fn test_lost_ack_still_lands() {
        let remote = MemoryRemote::new("mem://r");
        let store = MemoryStore::new(&remote);
        commit_file(&store, "mine", b"m").await;

        remote.lose_next_push_ack();
        assert!(store.push(BRANCH).await.unwrap_err().is_transient());
        assert_eq!(remote.read_file(BRANCH, "mine"), Some(b"m".to_vec()));
        assert_eq!(store.push(BRANCH).await.unwrap(), PushOutcome::Pushed);
    }

    #[tokio::test]
    async fn test_injected_transport_failures_skip_probe() {
        let remote = MemoryRemote::new("mem://r");
        let store = MemoryStore::new(&remote);
        commit_file(&store, "mine", b"m").await;

        remote.fail_next_fetches(1);
        remote.fail_next_pushes(2);
        assert!(store.probe().await.is_ok());
        assert!(store.fetch_and_merge(BRANCH).await.unwrap_err().is_transient());
        assert_eq!(store.fetch_and_merge(BRANCH).await.unwrap(), MergeOutcome::UpToDate);

        assert!(store.push(BRANCH).await.unwrap_err().is_transient());
        assert!(store.push(BRANCH).await.unwrap_err().is_transient());
        assert_eq!(remote.read_file(BRANCH, "mine"), None);
        assert_eq!(store.push(BRANCH).await.unwrap(), PushOutcome::Pushed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_is_applied() {
        let remote = MemoryRemote::new("mem://r");
        remote.set_latency(Duration::from_secs(5));
        let store = MemoryStore::new(&remote);

        let started = tokio::time::Instant::now();
        store.probe().await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_write_file_direct() {
        let remote = MemoryRemote::new("mem://r");
        remote.schedule_foreign_commit("later", b"l".to_vec());
        remote.write_file_direct(BRANCH, "now", b"n".to_vec());

        assert_eq!(remote.read_file(BRANCH, "now"), Some(b"n".to_vec()));
        assert_eq!(remote.read_file(BRANCH, "later"), None);
        assert_eq!(remote.commit_count(BRANCH), 1);
    }

    #[tokio::test]
    async fn test_log_records_identity() {
        let remote = MemoryRemote::new("mem://r");
        let store = MemoryStore::new(&remote);
        store.set_identity("alice").await.unwrap();
        store.write_file("a", b"1").await.unwrap();
        store.commit("Message from alice").await.unwrap();
        store.push(BRANCH).await.unwrap();

        assert_eq!(
            remote.log(BRANCH),
            vec![CommitSummary {
                author: "alice".to_string(),
                message: "Message from alice".to_string()
            }]
        );
    }
}
