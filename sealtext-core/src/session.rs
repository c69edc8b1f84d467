//! Chat session: the API presentation layers talk to
//!
//! A [`ChatSession`] is constructed once per run and owns everything a
//! participant needs: the store handle, the cipher holding the chat key, and
//! the sync engine. There is no process-wide state; two sessions in the
//! same process are fully independent.

use crate::config::{Config, ConfigError};
use crate::core_crypto::{self, CryptoError, MessageCipher, MnemonicLanguage};
use crate::core_message::types::{ChatMessage, MessageDraft};
use crate::core_store::{Credentials, GitStore, RemoteSpec, SharedStore, StoreError};
use crate::core_sync::{MessageReader, SyncConfig, SyncEngine, SyncError, SyncState};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::{debug, info};
use zeroize::Zeroizing;

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors surfaced to presentation layers
#[derive(Debug, Error)]
pub enum SessionError {
    /// The mnemonic failed word or checksum validation
    #[error("Invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    /// The remote could not be reached; safe to retry later
    #[error("Remote unreachable: {0}")]
    Unreachable(String),

    /// Concurrent writers kept winning the race
    #[error("Sync failed after {attempts} attempts")]
    SyncFailed { attempts: u32 },

    /// The shared store holds concurrent edits to the same paths
    #[error("Merge conflict on {paths:?}")]
    Conflict { paths: Vec<String> },

    /// The remote refused the push outright
    #[error("Push rejected: {0}")]
    PushRejected(String),

    /// Nothing to send
    #[error("Message is empty")]
    EmptyMessage,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Crypto error: {0}")]
    Crypto(CryptoError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl From<CryptoError> for SessionError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::InvalidMnemonic(reason) => SessionError::InvalidMnemonic(reason),
            other => SessionError::Crypto(other),
        }
    }
}

impl From<SyncError> for SessionError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Unreachable(reason) => SessionError::Unreachable(reason),
            SyncError::SyncFailed { attempts } => SessionError::SyncFailed { attempts },
            SyncError::Conflict { paths } => SessionError::Conflict { paths },
            SyncError::PushRejected(reason) => SessionError::PushRejected(reason),
            SyncError::Store(e) => SessionError::Store(e),
            SyncError::Crypto(e) => e.into(),
        }
    }
}

/// One participant's view of one chat
pub struct ChatSession<S: SharedStore> {
    store: S,
    cipher: MessageCipher,
    engine: SyncEngine,
}

impl<S: SharedStore> ChatSession<S> {
    /// Open a session over an already configured store
    ///
    /// Fails with [`SessionError::InvalidMnemonic`] before touching the store
    /// if the mnemonic does not validate.
    pub fn open(
        store: S,
        mnemonic: &str,
        language: MnemonicLanguage,
        sync: SyncConfig,
        branch: impl Into<String>,
    ) -> SessionResult<Self> {
        let cipher = MessageCipher::from_mnemonic(mnemonic, language)?;
        Ok(Self::with_cipher(store, cipher, sync, branch))
    }

    fn with_cipher(store: S, cipher: MessageCipher, sync: SyncConfig, branch: impl Into<String>) -> Self {
        Self { store, cipher, engine: SyncEngine::new(sync, branch) }
    }

    /// Publish a message stamped with the current time
    pub async fn send_message(
        &mut self,
        content: &str,
        author_display_name: &str,
    ) -> SessionResult<ChatMessage> {
        self.send_draft(MessageDraft::now(content, author_display_name)).await
    }

    /// Publish a fully specified draft
    pub async fn send_draft(&mut self, draft: MessageDraft) -> SessionResult<ChatMessage> {
        if draft.content.trim().is_empty() {
            return Err(SessionError::EmptyMessage);
        }

        let record = self.engine.publish(&self.store, &self.cipher, draft).await?;
        Ok(ChatMessage::verified(record))
    }

    /// Fetch from the remote and return every message, ordered by timestamp
    pub async fn fetch_messages(&mut self) -> SessionResult<Vec<ChatMessage>> {
        let messages = MessageReader::new(&self.cipher)
            .read_all(&mut self.engine, &self.store)
            .await?;
        info!(count = messages.len(), "Fetched messages");
        Ok(messages)
    }

    /// Messages already in the working copy, without contacting the remote
    pub async fn local_messages(&self) -> SessionResult<Vec<ChatMessage>> {
        Ok(MessageReader::new(&self.cipher).read_local(&self.store).await?)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn sync_state(&self) -> SyncState {
        self.engine.state()
    }

    /// Release the store handle
    pub async fn close(self) -> SessionResult<()> {
        debug!("Closing session");
        self.store.close().await?;
        Ok(())
    }
}

impl ChatSession<GitStore> {
    /// Open the configured working copy (creating it on first use) and
    /// point it at the configured remote
    pub async fn from_config(
        config: &Config,
        mnemonic: &SecretString,
        credentials: Option<Credentials>,
    ) -> SessionResult<Self> {
        let cipher = MessageCipher::from_mnemonic(mnemonic.expose_secret(), config.mnemonic.language)?;
        let remote_url = config.remote_url()?;

        let store = GitStore::open_or_init(config.repo_path()).await?;
        store.set_identity(&config.identity.display_name).await?;

        let mut remote = RemoteSpec::new(remote_url);
        if let Some(credentials) = credentials {
            remote = remote.with_credentials(credentials);
        }
        store.ensure_remote(&remote).await?;

        debug!(repo = %store.workdir().display(), "Session opened");
        Ok(Self::with_cipher(store, cipher, config.sync.clone(), config.store.branch.clone()))
    }
}

/// Fresh mnemonic for bootstrapping a new chat
pub fn generate_mnemonic(
    language: MnemonicLanguage,
    word_count: usize,
) -> SessionResult<Zeroizing<String>> {
    Ok(core_crypto::generate_mnemonic(language, word_count)?)
}

/// Whether `phrase` is a checksum-valid mnemonic in `language`
pub fn verify_mnemonic(phrase: &str, language: MnemonicLanguage) -> bool {
    core_crypto::verify_mnemonic(phrase, language)
}
