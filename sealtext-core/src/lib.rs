//! SealText core: end-to-end encrypted, tamper-evident group chat over a
//! shared git store
//!
//! Presentation layers construct a [`ChatSession`] and call
//! [`ChatSession::send_message`] and [`ChatSession::fetch_messages`].

pub mod config;
pub mod core_crypto;
pub mod core_message;
pub mod core_store;
pub mod core_sync;
pub mod logging;
pub mod metrics;
pub mod session;

#[doc(hidden)]
pub mod test_utils;

pub use config::{Config, ConfigError};
pub use core_crypto::{CryptoError, MessageCipher, MnemonicLanguage};
pub use core_message::types::{ChatMessage, IntegrityStatus, MessageDraft};
pub use core_store::{Credentials, GitStore, MemoryRemote, MemoryStore, SharedStore};
pub use core_sync::SyncConfig;
pub use logging::{init_logging, LogLevel};
pub use session::{generate_mnemonic, verify_mnemonic, ChatSession, SessionError, SessionResult};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        let _ = LogLevel::Info;
        let _ = IntegrityStatus::Verified;
        assert!(verify_mnemonic(test_utils::TEST_MNEMONIC, MnemonicLanguage::English));
    }
}
