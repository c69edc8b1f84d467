//! Test fixtures for creating common test objects
//!
//! Provides builder patterns and factory functions for creating test data.

use crate::core_crypto::{MessageCipher, MnemonicLanguage};
use crate::core_store::{MemoryRemote, MemoryStore};
use crate::core_sync::SyncConfig;
use crate::session::ChatSession;
use std::time::Duration;

/// BIP39 test vector, all-zero entropy
pub const TEST_MNEMONIC: &str =
    "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

/// BIP39 test vector, 0x7f entropy
pub const OTHER_MNEMONIC: &str =
    "legal winner thank year wave sausage worth useful legal winner thank yellow";

pub const TEST_REMOTE_URL: &str = "mem://sealtext-test";

pub const TEST_BRANCH: &str = "main";

/// Cipher keyed from an English test mnemonic
pub fn test_cipher(phrase: &str) -> MessageCipher {
    MessageCipher::from_mnemonic(phrase, MnemonicLanguage::English)
        .expect("test mnemonic is valid")
}

/// Sync settings with short backoffs so retry tests stay fast
pub fn fast_sync_config() -> SyncConfig {
    SyncConfig {
        max_attempts: 3,
        initial_backoff: Duration::from_millis(10),
        max_backoff: Duration::from_millis(100),
        network_timeout: Duration::from_secs(5),
        poll_interval: Duration::from_secs(1),
    }
}

/// Fixed UTC timestamp `seconds` after 2024-01-01T00:00:00Z
pub fn fixed_timestamp(seconds: u32) -> String {
    format!(
        "2024-01-01T{:02}:{:02}:{:02}.000000Z",
        seconds / 3600,
        (seconds / 60) % 60,
        seconds % 60
    )
}

/// Builder for a chat participant backed by a [`MemoryStore`]
pub struct TestParticipantBuilder {
    remote: MemoryRemote,
    mnemonic: String,
    sync: SyncConfig,
    detached: bool,
}

impl TestParticipantBuilder {
    pub fn new(remote: &MemoryRemote) -> Self {
        Self {
            remote: remote.clone(),
            mnemonic: TEST_MNEMONIC.to_string(),
            sync: fast_sync_config(),
            detached: false,
        }
    }

    pub fn with_mnemonic(mut self, phrase: impl Into<String>) -> Self {
        self.mnemonic = phrase.into();
        self
    }

    pub fn with_sync(mut self, sync: SyncConfig) -> Self {
        self.sync = sync;
        self
    }

    pub fn with_network_timeout(mut self, timeout: Duration) -> Self {
        self.sync.network_timeout = timeout;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.sync.max_attempts = attempts;
        self
    }

    /// Participant without a configured remote
    pub fn detached(mut self) -> Self {
        self.detached = true;
        self
    }

    pub fn build(self) -> ChatSession<MemoryStore> {
        let store = if self.detached {
            MemoryStore::detached(&self.remote)
        } else {
            MemoryStore::new(&self.remote)
        };
        ChatSession::open(store, &self.mnemonic, MnemonicLanguage::English, self.sync, TEST_BRANCH)
            .expect("test participant mnemonic is valid")
    }
}

/// Participant on `remote` using [`TEST_MNEMONIC`]
pub fn test_participant(remote: &MemoryRemote) -> ChatSession<MemoryStore> {
    TestParticipantBuilder::new(remote).build()
}

/// Fresh in-memory remote
pub fn test_remote() -> MemoryRemote {
    MemoryRemote::new(TEST_REMOTE_URL)
}

/// Whether a `git` binary is on the PATH
pub fn git_available() -> bool {
    std::process::Command::new("git")
        .arg("--version")
        .output()
        .map(|out| out.status.success())
        .unwrap_or(false)
}
