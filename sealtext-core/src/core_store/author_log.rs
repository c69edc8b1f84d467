//! Per-author append-only partitions
//!
//! Every author owns one file, `messages/<author-id>.json`, holding a JSON
//! array of sealed tokens in append order. Only the owning participant
//! ever appends to it, so concurrent writers never touch the same path and
//! merges in the shared store stay conflict-free.

use super::errors::{StoreError, StoreResult};
use super::traits::SharedStore;
use crate::core_crypto::MessageCipher;
use crate::core_message::types::PlaintextMessage;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, warn};

/// Directory holding all partitions
pub const MESSAGES_DIR: &str = "messages";

/// Partition file extension
const PARTITION_EXT: &str = ".json";

/// Longest sanitized name kept before the disambiguating suffix
const MAX_ID_LEN: usize = 64;

/// Device names some filesystems refuse as file stems
const RESERVED_NAMES: &[&str] = &["CON", "PRN", "AUX", "NUL"];

/// Filesystem-safe partition key derived from a display name
///
/// Names made only of ASCII alphanumerics, `-` and `_` map to themselves.
/// Anything else is sanitized and suffixed with `-` and the first 8 hex
/// digits of SHA-256(name). Names that already end in such a suffix, and
/// reserved device names, are suffixed too, so two distinct display names
/// never share a partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AuthorId(String);

impl AuthorId {
    pub fn from_display_name(name: &str) -> Self {
        let mut sanitized: String = name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();

        let mut changed = sanitized != name
            || sanitized.is_empty()
            || is_reserved(&sanitized)
            || has_hash_suffix(&sanitized);
        if sanitized.len() > MAX_ID_LEN {
            sanitized.truncate(MAX_ID_LEN);
            changed = true;
        }

        if changed {
            let digest = hex::encode(Sha256::digest(name.as_bytes()));
            sanitized.push('-');
            sanitized.push_str(&digest[..8]);
        }

        Self(sanitized)
    }

    /// Recover the id from a partition file name
    fn from_file_name(file_name: &str) -> Option<Self> {
        let stem = file_name.strip_suffix(PARTITION_EXT)?;
        if stem.is_empty() {
            return None;
        }
        Some(Self(stem.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path of this author's partition inside the store
    pub fn partition_path(&self) -> String {
        format!("{}/{}{}", MESSAGES_DIR, self.0, PARTITION_EXT)
    }
}

impl fmt::Display for AuthorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Contents of one partition as found in the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Partition {
    /// Tokens in append order
    Tokens(Vec<String>),
    /// The file exists but is not a JSON array of strings
    Malformed(String),
}

/// Append/enumerate access to author partitions over a shared store
pub struct AuthorLog<'s, S: SharedStore + ?Sized> {
    store: &'s S,
}

impl<'s, S: SharedStore + ?Sized> AuthorLog<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// Tokens of one author; empty if the author has never written
    pub async fn tokens(&self, author: &AuthorId) -> StoreResult<Vec<String>> {
        let path = author.partition_path();
        match self.store.read_file(&path).await? {
            None => Ok(Vec::new()),
            Some(bytes) => parse_partition(&bytes).map_err(|reason| StoreError::Corrupted { path, reason }),
        }
    }

    /// Append one token to `author`'s partition, rewriting the whole file
    pub async fn append(&self, author: &AuthorId, token: String) -> StoreResult<()> {
        let mut tokens = self.tokens(author).await?;
        tokens.push(token);

        let bytes = serde_json::to_vec_pretty(&tokens)?;
        self.store.write_file(&author.partition_path(), &bytes).await?;

        debug!(author = %author, records = tokens.len(), "Appended record to partition");
        Ok(())
    }

    /// Every partition present in the store, keyed by author id
    ///
    /// A partition that fails to parse is returned as
    /// [`Partition::Malformed`] instead of failing the whole enumeration.
    pub async fn all(&self) -> StoreResult<BTreeMap<AuthorId, Partition>> {
        let mut partitions = BTreeMap::new();

        for file_name in self.store.list_files(MESSAGES_DIR).await? {
            let Some(author) = AuthorId::from_file_name(&file_name) else {
                continue;
            };
            let path = format!("{}/{}", MESSAGES_DIR, file_name);
            let Some(bytes) = self.store.read_file(&path).await? else {
                continue;
            };

            let partition = match parse_partition(&bytes) {
                Ok(tokens) => Partition::Tokens(tokens),
                Err(reason) => {
                    warn!(path = %path, reason = %reason, "Malformed partition");
                    Partition::Malformed(reason)
                }
            };
            partitions.insert(author, partition);
        }

        Ok(partitions)
    }

    /// Decrypt the last record of `author`, `None` if the partition is empty
    ///
    /// A tail that cannot be opened with `cipher` is reported as corruption:
    /// appending after it would start a chain nobody can verify.
    pub async fn last_record_for(
        &self,
        author: &AuthorId,
        cipher: &MessageCipher,
    ) -> StoreResult<Option<PlaintextMessage>> {
        let tokens = self.tokens(author).await?;
        let Some(last) = tokens.last() else {
            return Ok(None);
        };

        cipher.open(last).map(Some).map_err(|e| StoreError::Corrupted {
            path: author.partition_path(),
            reason: format!("last record unreadable: {}", e),
        })
    }

    /// Hash of `author`'s last record, the `prev_hash` of their next message
    pub async fn last_hash_for(
        &self,
        author: &AuthorId,
        cipher: &MessageCipher,
    ) -> StoreResult<Option<String>> {
        Ok(self.last_record_for(author, cipher).await?.map(|record| record.hash))
    }
}

fn is_reserved(stem: &str) -> bool {
    let upper = stem.to_ascii_uppercase();
    if RESERVED_NAMES.contains(&upper.as_str()) {
        return true;
    }
    matches!(
        upper.as_bytes(),
        [b'C', b'O', b'M', b'1'..=b'9'] | [b'L', b'P', b'T', b'1'..=b'9']
    )
}

/// Ends in `-` plus 8 lowercase hex digits, the shape of a sanitized id
fn has_hash_suffix(stem: &str) -> bool {
    match stem.len().checked_sub(9).and_then(|at| stem.get(at..)) {
        Some(tail) => {
            tail.starts_with('-')
                && tail[1..].bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        }
        None => false,
    }
}

fn parse_partition(bytes: &[u8]) -> Result<Vec<String>, String> {
    serde_json::from_slice::<Vec<String>>(bytes).map_err(|e| e.to_string())
}
