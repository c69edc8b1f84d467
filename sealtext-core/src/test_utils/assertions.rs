//! Custom assertions for read results
//!
//! Panic messages include the offending message list so failures are
//! readable without a debugger.

use crate::core_message::types::{ChatMessage, IntegrityStatus};
use std::fmt::Debug;

/// Assert that a Result is Err and return the error
pub fn assert_err<T: Debug, E>(result: Result<T, E>) -> E {
    match result {
        Ok(value) => panic!("Expected Err, got Ok: {:?}", value),
        Err(e) => e,
    }
}

/// Assert that messages are in non-decreasing timestamp order
pub fn assert_chronological(messages: &[ChatMessage]) {
    for pair in messages.windows(2) {
        if pair[0].timestamp > pair[1].timestamp {
            panic!(
                "Messages out of order: {:?} before {:?}. All: {:?}",
                pair[0].timestamp, pair[1].timestamp, messages
            );
        }
    }
}

/// Assert the integrity status of each message, in order
pub fn assert_integrity(messages: &[ChatMessage], expected: &[IntegrityStatus]) {
    let actual: Vec<IntegrityStatus> = messages.iter().map(|m| m.integrity).collect();
    if actual != expected {
        panic!("Expected integrity {:?}, got {:?}. Messages: {:?}", expected, actual, messages);
    }
}

/// Assert every message verified
pub fn assert_all_verified(messages: &[ChatMessage]) {
    if let Some(bad) = messages.iter().find(|m| !m.is_verified()) {
        panic!("Expected all messages verified, found {:?}. All: {:?}", bad, messages);
    }
}

/// `(author, content)` pairs, in order
pub fn transcript(messages: &[ChatMessage]) -> Vec<(String, String)> {
    messages.iter().map(|m| (m.author.clone(), m.content.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_message::types::PlaintextMessage;

    fn message(content: &str, timestamp: &str) -> ChatMessage {
        ChatMessage::verified(PlaintextMessage {
            content: content.to_string(),
            author: "alice".to_string(),
            timestamp: timestamp.to_string(),
            hash: String::new(),
            prev_hash: None,
        })
    }

    #[test]
    fn test_chronological_accepts_ties() {
        assert_chronological(&[message("a", "t1"), message("b", "t1"), message("c", "t2")]);
    }

    #[test]
    #[should_panic(expected = "out of order")]
    fn test_chronological_rejects_inversion() {
        assert_chronological(&[message("a", "t2"), message("b", "t1")]);
    }

    #[test]
    fn test_transcript() {
        let t = transcript(&[message("hi", "t1")]);
        assert_eq!(t, vec![("alice".to_string(), "hi".to_string())]);
    }

    #[test]
    fn test_assert_err() {
        let result: Result<(), &str> = Err("boom");
        assert_eq!(assert_err(result), "boom");
    }
}
