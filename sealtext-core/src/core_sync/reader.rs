//! Message reader: fetch, decrypt, verify and order every author's records

use super::engine::SyncEngine;
use super::errors::SyncResult;
use crate::core_crypto::MessageCipher;
use crate::core_message::chain::ChainCursor;
use crate::core_message::types::ChatMessage;
use crate::core_store::{AuthorId, AuthorLog, Partition, SharedStore};
use crate::metrics::{record_counter, MESSAGES_READ, MESSAGES_TAMPERED, MESSAGES_UNDECRYPTABLE};
use tracing::{debug, warn};

/// Turns author partitions into one timestamp-ordered message list
///
/// Per-record failures never abort a read: an undecryptable token becomes
/// an [`ChatMessage::undecryptable`] placeholder and a record that fails
/// its chain check is surfaced with its content replaced by a warning.
pub struct MessageReader<'c> {
    cipher: &'c MessageCipher,
}

impl<'c> MessageReader<'c> {
    pub fn new(cipher: &'c MessageCipher) -> Self {
        Self { cipher }
    }

    /// Fetch the remote branch, then read everything in the working copy
    pub async fn read_all<S: SharedStore + ?Sized>(
        &self,
        engine: &mut SyncEngine,
        store: &S,
    ) -> SyncResult<Vec<ChatMessage>> {
        engine.receive(store).await?;
        self.read_local(store).await
    }

    /// Read the working copy as it is, without contacting the remote
    pub async fn read_local<S: SharedStore + ?Sized>(&self, store: &S) -> SyncResult<Vec<ChatMessage>> {
        let partitions = AuthorLog::new(store).all().await?;

        let mut messages = Vec::new();
        for (author, partition) in &partitions {
            messages.extend(self.read_partition(author, partition));
        }

        // Stable: equal timestamps keep author order, then append order.
        messages.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));

        debug!(partitions = partitions.len(), messages = messages.len(), "Read messages");
        Ok(messages)
    }

    /// Decrypt and verify one partition in append order
    pub fn read_partition(&self, author: &AuthorId, partition: &Partition) -> Vec<ChatMessage> {
        let tokens = match partition {
            Partition::Tokens(tokens) => tokens,
            Partition::Malformed(reason) => {
                warn!(author = %author, reason = %reason, "Skipping malformed partition");
                record_counter(MESSAGES_UNDECRYPTABLE, 1);
                return vec![ChatMessage::undecryptable(author.as_str()).at(author.as_str(), 0)];
            }
        };

        let mut cursor = ChainCursor::new();
        let mut messages = Vec::with_capacity(tokens.len());

        for (index, token) in tokens.iter().enumerate() {
            let record = match self.cipher.open(token) {
                Ok(record) => record,
                Err(e) => {
                    warn!(author = %author, index, error = %e, "Undecryptable record");
                    record_counter(MESSAGES_UNDECRYPTABLE, 1);
                    messages.push(ChatMessage::undecryptable(author.as_str()).at(author.as_str(), index));
                    continue;
                }
            };

            let misattributed = AuthorId::from_display_name(&record.author) != *author;
            let message = match cursor.advance(&record) {
                Ok(()) if !misattributed => {
                    record_counter(MESSAGES_READ, 1);
                    ChatMessage::verified(record)
                }
                Ok(()) => {
                    warn!(author = %author, index, claimed = %record.author, "Record in foreign partition");
                    record_counter(MESSAGES_TAMPERED, 1);
                    ChatMessage::tampered(record)
                }
                Err(e) => {
                    warn!(author = %author, index, error = %e, "Hash chain verification failed");
                    record_counter(MESSAGES_TAMPERED, 1);
                    ChatMessage::tampered(record)
                }
            };
            messages.push(message.at(author.as_str(), index));
        }

        messages
    }
}
