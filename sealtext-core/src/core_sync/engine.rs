//! Sync engine: optimistic fetch–append–commit–push against the shared store
//!
//! One publish cycle walks
//!
//! ```text
//! Idle -> Fetching -> Merging -> Appending -> Committing -> Pushing -> Idle
//!                        ^                                    |
//!                        +----------- ConflictRetry <---------+
//! ```
//!
//! A connectivity probe runs before the first fetch; if it fails nothing is
//! touched and the cycle reports `Unreachable`. Every network step is
//! bounded by `network_timeout`. A non-fast-forward rejection (or a
//! transient transport failure) rolls the working copy back to the
//! checkpoint taken after the fetch, waits with exponential backoff and
//! starts over from a fresh fetch, up to `max_attempts`.

use super::errors::{SyncError, SyncResult};
use crate::core_crypto::MessageCipher;
use crate::core_message::chain::HashChainer;
use crate::core_message::types::{MessageDraft, PlaintextMessage};
use crate::core_store::{
    AuthorId, AuthorLog, MergeOutcome, PushOutcome, RejectReason, Revision, SharedStore,
    StoreError, StoreResult,
};
use crate::metrics::{
    record_counter, Timer, MESSAGES_SENT, SYNC_CONFLICT_RETRIES, SYNC_CYCLES, SYNC_DURATION_MS,
    SYNC_FAILURES,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Steps of a sync cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Fetching,
    Merging,
    Appending,
    Committing,
    Pushing,
    ConflictRetry,
}

impl SyncState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncState::Idle => "idle",
            SyncState::Fetching => "fetching",
            SyncState::Merging => "merging",
            SyncState::Appending => "appending",
            SyncState::Committing => "committing",
            SyncState::Pushing => "pushing",
            SyncState::ConflictRetry => "conflict_retry",
        }
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Retry and timeout policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Publish/fetch attempts per cycle
    pub max_attempts: u32,

    /// Delay before the first retry; doubles on each further retry
    #[serde(with = "humantime_serde")]
    pub initial_backoff: Duration,

    /// Upper bound for the retry delay
    #[serde(with = "humantime_serde")]
    pub max_backoff: Duration,

    /// Bound on each probe, fetch and push
    #[serde(with = "humantime_serde")]
    pub network_timeout: Duration,

    /// How often interactive clients refresh
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(4),
            network_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_secs(30),
        }
    }
}

impl SyncConfig {
    /// Delay before retry number `retry` (1-based)
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u32 << retry.saturating_sub(1).min(16);
        self.initial_backoff.saturating_mul(factor).min(self.max_backoff)
    }
}

enum AttemptOutcome {
    Published(PlaintextMessage),
    Rejected(RejectReason),
}

/// Drives publish and receive cycles for one participant
#[derive(Debug)]
pub struct SyncEngine {
    config: SyncConfig,
    branch: String,
    state: SyncState,
}

impl SyncEngine {
    pub fn new(config: SyncConfig, branch: impl Into<String>) -> Self {
        Self { config, branch: branch.into(), state: SyncState::Idle }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    fn transition(&mut self, next: SyncState) {
        debug!(from = %self.state, to = %next, "Sync state transition");
        self.state = next;
    }

    fn attempts(&self) -> u32 {
        self.config.max_attempts.max(1)
    }

    async fn bounded<T, F>(&self, operation: &str, fut: F) -> StoreResult<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        match tokio::time::timeout(self.config.network_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout {
                operation: operation.to_string(),
                after: self.config.network_timeout,
            }),
        }
    }

    async fn probe<S: SharedStore + ?Sized>(&self, store: &S) -> SyncResult<()> {
        self.bounded("probe", store.probe()).await.map_err(|e| {
            warn!(error = %e, "Connectivity probe failed");
            SyncError::Unreachable(e.to_string())
        })
    }

    async fn back_off(&mut self, retry: u32) {
        self.transition(SyncState::ConflictRetry);
        let delay = self.config.backoff(retry);
        debug!(retry, ?delay, "Backing off before retry");
        tokio::time::sleep(delay).await;
    }

    /// Fetch and merge the remote branch into the working copy
    pub async fn receive<S: SharedStore + ?Sized>(&mut self, store: &S) -> SyncResult<MergeOutcome> {
        record_counter(SYNC_CYCLES, 1);
        let result = self.receive_cycle(store).await;
        self.transition(SyncState::Idle);
        if let Err(e) = &result {
            record_counter(SYNC_FAILURES, 1);
            warn!(error = %e, "Receive failed");
        }
        result
    }

    async fn receive_cycle<S: SharedStore + ?Sized>(&mut self, store: &S) -> SyncResult<MergeOutcome> {
        self.probe(store).await?;

        let mut last_error = None;
        for attempt in 1..=self.attempts() {
            if attempt > 1 {
                self.back_off(attempt - 1).await;
            }

            self.transition(SyncState::Fetching);
            match self.bounded("fetch", store.fetch_and_merge(&self.branch)).await {
                Ok(MergeOutcome::Conflict { paths }) => return Err(SyncError::Conflict { paths }),
                Ok(outcome) => {
                    self.transition(SyncState::Merging);
                    debug!(?outcome, "Fetched remote branch");
                    return Ok(outcome);
                }
                Err(e) if e.is_transient() => {
                    warn!(attempt, error = %e, "Transient failure during fetch");
                    last_error = Some(e);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(SyncError::Unreachable(last_error.map(|e| e.to_string()).unwrap_or_default()))
    }

    /// Link, seal and publish one message, retrying on lost races
    ///
    /// On success the returned record is durable on the remote. On error
    /// the working copy holds no trace of the message.
    pub async fn publish<S: SharedStore + ?Sized>(
        &mut self,
        store: &S,
        cipher: &MessageCipher,
        draft: MessageDraft,
    ) -> SyncResult<PlaintextMessage> {
        record_counter(SYNC_CYCLES, 1);
        let timer = Timer::new(SYNC_DURATION_MS);
        let result = self.publish_cycle(store, cipher, &draft).await;
        self.transition(SyncState::Idle);
        timer.stop();

        match &result {
            Ok(record) => {
                record_counter(MESSAGES_SENT, 1);
                info!(author = %record.author, hash = %record.hash, "Message published");
            }
            Err(e) => {
                record_counter(SYNC_FAILURES, 1);
                warn!(error = %e, "Publish failed");
            }
        }
        result
    }

    async fn publish_cycle<S: SharedStore + ?Sized>(
        &mut self,
        store: &S,
        cipher: &MessageCipher,
        draft: &MessageDraft,
    ) -> SyncResult<PlaintextMessage> {
        self.probe(store).await?;

        let author = AuthorId::from_display_name(&draft.author);
        let max_attempts = self.attempts();
        let mut pending = None;
        let mut transport_failures = 0;

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                self.back_off(attempt - 1).await;
            }

            match self.publish_attempt(store, cipher, &author, draft, &mut pending).await {
                Ok(AttemptOutcome::Published(record)) => return Ok(record),
                Ok(AttemptOutcome::Rejected(RejectReason::NonFastForward)) => {
                    record_counter(SYNC_CONFLICT_RETRIES, 1);
                    warn!(attempt, "Push rejected, remote advanced concurrently");
                }
                Ok(AttemptOutcome::Rejected(RejectReason::Other(reason))) => {
                    return Err(SyncError::PushRejected(reason));
                }
                Err(e) if e.is_transient() => {
                    transport_failures += 1;
                    warn!(attempt, error = %e, "Transient failure during publish");
                }
                Err(e) => return Err(e),
            }
        }

        if transport_failures == max_attempts {
            Err(SyncError::Unreachable(format!(
                "all {} attempts failed on transport",
                max_attempts
            )))
        } else {
            Err(SyncError::SyncFailed { attempts: max_attempts })
        }
    }

    async fn publish_attempt<S: SharedStore + ?Sized>(
        &mut self,
        store: &S,
        cipher: &MessageCipher,
        author: &AuthorId,
        draft: &MessageDraft,
        pending: &mut Option<PlaintextMessage>,
    ) -> SyncResult<AttemptOutcome> {
        self.transition(SyncState::Fetching);
        let outcome = self.bounded("fetch", store.fetch_and_merge(&self.branch)).await?;

        self.transition(SyncState::Merging);
        if let MergeOutcome::Conflict { paths } = outcome {
            return Err(SyncError::Conflict { paths });
        }
        let checkpoint = store.head().await?;

        self.transition(SyncState::Appending);
        let last = AuthorLog::new(store).last_record_for(author, cipher).await?;

        // A push that timed out may still have landed.
        if let (Some(sent), Some(last)) = (pending.as_ref(), last.as_ref()) {
            if sent.hash == last.hash {
                info!(hash = %last.hash, "Earlier push had landed");
                return Ok(AttemptOutcome::Published(last.clone()));
            }
        }

        let record = HashChainer::seal(draft.clone(), last.map(|r| r.hash));
        match self.append_and_push(store, cipher, author, &record, pending).await {
            Ok(PushOutcome::Pushed) => Ok(AttemptOutcome::Published(record)),
            Ok(PushOutcome::Rejected(reason)) => {
                self.roll_back(store, checkpoint.as_ref()).await?;
                Ok(AttemptOutcome::Rejected(reason))
            }
            Err(e) => {
                if let Err(rollback_error) = self.roll_back(store, checkpoint.as_ref()).await {
                    warn!(error = %rollback_error, "Rollback after failed publish also failed");
                }
                Err(e)
            }
        }
    }

    async fn append_and_push<S: SharedStore + ?Sized>(
        &mut self,
        store: &S,
        cipher: &MessageCipher,
        author: &AuthorId,
        record: &PlaintextMessage,
        pending: &mut Option<PlaintextMessage>,
    ) -> SyncResult<PushOutcome> {
        let token = cipher.seal(record)?;
        AuthorLog::new(store).append(author, token).await?;

        self.transition(SyncState::Committing);
        store.commit(&format!("Message from {}", record.author)).await?;

        self.transition(SyncState::Pushing);
        *pending = Some(record.clone());
        Ok(self.bounded("push", store.push(&self.branch)).await?)
    }

    async fn roll_back<S: SharedStore + ?Sized>(
        &self,
        store: &S,
        checkpoint: Option<&Revision>,
    ) -> StoreResult<()> {
        debug!(?checkpoint, "Rolling back working copy");
        store.reset_to(checkpoint).await
    }
}
