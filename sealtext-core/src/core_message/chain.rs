//! Per-author tamper-evident hash chain
//!
//! Each record commits to its own fields and to the hash of the previous
//! record by the same author:
//!
//!   hash_i = SHA-256( canonical_json{author, content, prev_hash = hash_{i-1}, timestamp} )
//!
//! The canonical form is a JSON object with keys in sorted order, so the
//! digest does not depend on how a record happens to be laid out. The first
//! record of an author has `prev_hash = null`.
//!
//! Modifying a record's content (even when re-encrypted under the chat key)
//! breaks its own hash; dropping or reordering records breaks the
//! `prev_hash` link of the record that follows.

use super::types::{MessageDraft, PlaintextMessage};
use serde::Serialize;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;

/// Result type for chain verification
pub type ChainResult<T> = Result<T, ChainError>;

/// Why a record failed chain verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TamperReason {
    /// Recomputed digest differs from the stored `hash`
    HashMismatch,
    /// Stored `prev_hash` differs from the previous record's hash
    PrevHashMismatch { expected: Option<String>, actual: Option<String> },
}

/// Hash chain verification errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("Record tampered: {reason:?}")]
    Tampered { reason: TamperReason },
}

/// Canonical digest input; fields are declared in sorted key order
#[derive(Serialize)]
struct HashInput<'a> {
    author: &'a str,
    content: &'a str,
    prev_hash: Option<&'a str>,
    timestamp: &'a str,
}

/// Computes and verifies chain links
pub struct HashChainer;

impl HashChainer {
    /// SHA-256 over the canonical encoding of the four linked fields, hex encoded
    pub fn compute_hash(
        content: &str,
        author: &str,
        timestamp: &str,
        prev_hash: Option<&str>,
    ) -> String {
        let input = HashInput { author, content, prev_hash, timestamp };
        // Serializing borrowed strings into a Vec cannot fail.
        let canonical = serde_json::to_vec(&input).unwrap_or_default();
        hex::encode(Sha256::digest(&canonical))
    }

    /// Link a draft onto `prev_hash` and stamp its own hash
    pub fn seal(draft: MessageDraft, prev_hash: Option<String>) -> PlaintextMessage {
        let hash = Self::compute_hash(
            &draft.content,
            &draft.author,
            &draft.timestamp,
            prev_hash.as_deref(),
        );
        PlaintextMessage {
            content: draft.content,
            author: draft.author,
            timestamp: draft.timestamp,
            hash,
            prev_hash,
        }
    }

    /// Check a record's own hash and its link to the expected predecessor
    pub fn verify(record: &PlaintextMessage, expected_prev_hash: Option<&str>) -> ChainResult<()> {
        let recomputed = Self::compute_hash(
            &record.content,
            &record.author,
            &record.timestamp,
            record.prev_hash.as_deref(),
        );
        if !digest_eq(&recomputed, &record.hash) {
            return Err(ChainError::Tampered { reason: TamperReason::HashMismatch });
        }

        let linked = match (record.prev_hash.as_deref(), expected_prev_hash) {
            (None, None) => true,
            (Some(actual), Some(expected)) => digest_eq(actual, expected),
            _ => false,
        };
        if !linked {
            return Err(ChainError::Tampered {
                reason: TamperReason::PrevHashMismatch {
                    expected: expected_prev_hash.map(str::to_string),
                    actual: record.prev_hash.clone(),
                },
            });
        }

        Ok(())
    }
}

/// Running position in one author's chain while reading in append order
///
/// After each record the cursor advances to that record's stored hash,
/// whether or not it verified, so one altered record does not cascade
/// into flags on its successors.
#[derive(Debug, Clone, Default)]
pub struct ChainCursor {
    prev_hash: Option<String>,
}

impl ChainCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hash the next record is expected to link to
    pub fn expected_prev(&self) -> Option<&str> {
        self.prev_hash.as_deref()
    }

    /// Verify `record` against the cursor and advance past it
    pub fn advance(&mut self, record: &PlaintextMessage) -> ChainResult<()> {
        let verdict = HashChainer::verify(record, self.expected_prev());
        self.prev_hash = Some(record.hash.clone());
        verdict
    }
}

fn digest_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
