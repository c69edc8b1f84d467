//! Two participants chatting through an in-memory remote
//!
//! Run with:
//! ```bash
//! cargo run --example two_participants
//! ```

use sealtext_core::core_store::{MemoryRemote, MemoryStore};
use sealtext_core::logging::{init_logging_with_config, LogConfig, LogLevel};
use sealtext_core::{generate_mnemonic, ChatSession, MnemonicLanguage, SyncConfig};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging_with_config(LogConfig::new(LogLevel::Debug).with_target(false))?;

    let mnemonic = generate_mnemonic(MnemonicLanguage::English, 12)?;
    let remote = MemoryRemote::new("mem://demo");

    let open = |name: &str| -> anyhow::Result<ChatSession<MemoryStore>> {
        let store = MemoryStore::new(&remote);
        info!(participant = name, "Joining chat");
        Ok(ChatSession::open(store, &mnemonic, MnemonicLanguage::English, SyncConfig::default(), "main")?)
    };

    let mut alice = open("alice")?;
    let mut bob = open("bob")?;

    alice.send_message("hi bob", "alice").await?;
    bob.send_message("hey alice", "bob").await?;

    for message in alice.fetch_messages().await? {
        println!("[{}] {}: {} ({})", message.timestamp, message.author, message.content, message.integrity);
    }

    Ok(())
}
