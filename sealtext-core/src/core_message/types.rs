//! Message record types
//!
//! [`MessageDraft`] is what a sender composes, [`PlaintextMessage`] is the
//! hash-linked record that gets sealed, and [`ChatMessage`] is what readers
//! hand to presentation layers after verification.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Content shown in place of a record whose hash chain does not verify
pub const TAMPER_WARNING: &str = "[message failed integrity verification]";

/// Content shown in place of a record that cannot be decrypted
pub const UNDECRYPTABLE_NOTICE: &str = "[message could not be decrypted]";

/// Current UTC time as RFC 3339 with microseconds
///
/// All participants use UTC so that lexicographic order of timestamps is
/// chronological order.
pub fn current_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// A message before it is linked into its author's chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageDraft {
    pub content: String,
    pub author: String,
    pub timestamp: String,
}

impl MessageDraft {
    pub fn new(
        content: impl Into<String>,
        author: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self { content: content.into(), author: author.into(), timestamp: timestamp.into() }
    }

    /// Draft stamped with the current time
    pub fn now(content: impl Into<String>, author: impl Into<String>) -> Self {
        Self::new(content, author, current_timestamp())
    }
}

/// A hash-linked message record, the unit that gets sealed
///
/// Deserialization rejects unknown fields and requires every field,
/// including `prev_hash` (which may be `null` but not absent).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlaintextMessage {
    pub content: String,
    pub author: String,
    pub timestamp: String,
    pub hash: String,
    #[serde(deserialize_with = "required_nullable")]
    pub prev_hash: Option<String>,
}

fn required_nullable<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)
}

/// Outcome of decrypting and verifying one record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrityStatus {
    /// Decrypted and the hash chain verified
    Verified,
    /// Decrypted but the hash or chain link did not match
    Tampered,
    /// Could not be authenticated with the session key
    Undecryptable,
}

impl IntegrityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntegrityStatus::Verified => "verified",
            IntegrityStatus::Tampered => "tampered",
            IntegrityStatus::Undecryptable => "undecryptable",
        }
    }
}

impl fmt::Display for IntegrityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a message was read from: partition id and position in append order
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordOrigin {
    pub partition: String,
    pub index: usize,
}

/// A message as surfaced to presentation layers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub content: String,
    pub author: String,
    pub timestamp: String,
    pub integrity: IntegrityStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<RecordOrigin>,
}

impl ChatMessage {
    /// A record that decrypted and verified
    pub fn verified(record: PlaintextMessage) -> Self {
        Self {
            content: record.content,
            author: record.author,
            timestamp: record.timestamp,
            integrity: IntegrityStatus::Verified,
            origin: None,
        }
    }

    /// A decrypted record whose chain check failed; content is replaced
    pub fn tampered(record: PlaintextMessage) -> Self {
        Self {
            content: TAMPER_WARNING.to_string(),
            author: record.author,
            timestamp: record.timestamp,
            integrity: IntegrityStatus::Tampered,
            origin: None,
        }
    }

    /// Placeholder for a token that could not be opened
    ///
    /// Nothing inside the token is trusted, so the author is the partition
    /// id and the timestamp is empty (sorting before everything else).
    pub fn undecryptable(partition: impl Into<String>) -> Self {
        Self {
            content: UNDECRYPTABLE_NOTICE.to_string(),
            author: partition.into(),
            timestamp: String::new(),
            integrity: IntegrityStatus::Undecryptable,
            origin: None,
        }
    }

    /// Tag the message with the partition slot it was read from
    pub fn at(mut self, partition: impl Into<String>, index: usize) -> Self {
        self.origin = Some(RecordOrigin { partition: partition.into(), index });
        self
    }

    pub fn is_verified(&self) -> bool {
        self.integrity == IntegrityStatus::Verified
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> PlaintextMessage {
        PlaintextMessage {
            content: "hi".to_string(),
            author: "alice".to_string(),
            timestamp: "2025-01-01T00:00:00".to_string(),
            hash: "ab".repeat(32),
            prev_hash: None,
        }
    }

    #[test]
    fn test_prev_hash_serializes_as_null() {
        let json = serde_json::to_string(&record()).unwrap();
        assert!(json.contains("\"prev_hash\":null"));
    }

    #[test]
    fn test_missing_field_rejected() {
        let json = r#"{"content":"hi","author":"alice","timestamp":"t","prev_hash":null}"#;
        assert!(serde_json::from_str::<PlaintextMessage>(json).is_err());
    }

    #[test]
    fn test_missing_prev_hash_rejected() {
        let json = r#"{"content":"hi","author":"alice","timestamp":"t","hash":"h"}"#;
        assert!(serde_json::from_str::<PlaintextMessage>(json).is_err());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let json = r#"{"content":"hi","author":"a","timestamp":"t","hash":"h","prev_hash":null,"x":1}"#;
        assert!(serde_json::from_str::<PlaintextMessage>(json).is_err());
    }

    #[test]
    fn test_current_timestamp_is_utc_rfc3339() {
        let ts = current_timestamp();
        assert!(ts.ends_with('Z'));
        assert!(chrono::DateTime::parse_from_rfc3339(&ts).is_ok());
    }

    #[test]
    fn test_tampered_replaces_content() {
        let msg = ChatMessage::tampered(record());
        assert_eq!(msg.content, TAMPER_WARNING);
        assert_eq!(msg.author, "alice");
        assert_eq!(msg.integrity, IntegrityStatus::Tampered);
        assert!(!msg.is_verified());
    }

    #[test]
    fn test_undecryptable_placeholder() {
        let msg = ChatMessage::undecryptable("bob");
        assert_eq!(msg.author, "bob");
        assert!(msg.timestamp.is_empty());
        assert_eq!(msg.integrity.to_string(), "undecryptable");
        assert_eq!(msg.origin, None);
    }

    #[test]
    fn test_origin_is_optional_in_json() {
        let tagged = ChatMessage::verified(record()).at("alice", 3);
        let json = serde_json::to_string(&tagged).unwrap();
        assert!(json.contains("\"origin\":{\"partition\":\"alice\",\"index\":3}"));

        let untagged = serde_json::to_string(&ChatMessage::verified(record())).unwrap();
        assert!(!untagged.contains("origin"));
        assert_eq!(serde_json::from_str::<ChatMessage>(&untagged).unwrap().origin, None);
    }
}
