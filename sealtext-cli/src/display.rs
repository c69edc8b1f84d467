//! Terminal rendering of chat messages

use chrono::{DateTime, NaiveDateTime};
use sealtext_core::core_message::types::RecordOrigin;
use sealtext_core::{ChatMessage, IntegrityStatus};
use std::collections::HashSet;

const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// `YYYY-MM-DD HH:MM:SS` in UTC, or the raw value if it does not parse
pub fn display_time(timestamp: &str) -> String {
    if timestamp.is_empty() {
        return "unknown time".to_string();
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(timestamp) {
        return parsed.naive_utc().format(DISPLAY_FORMAT).to_string();
    }
    // Older records carry no offset
    if let Ok(naive) = NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%dT%H:%M:%S%.f") {
        return naive.format(DISPLAY_FORMAT).to_string();
    }
    timestamp.to_string()
}

/// One line per message: `[time] author: content`, plus an integrity marker
///
/// An undecryptable record names no author of its own, so it is shown
/// under the partition it was found in.
pub fn format_message(message: &ChatMessage) -> String {
    let author = match message.integrity {
        IntegrityStatus::Undecryptable => format!("partition {}", message.author),
        _ => message.author.clone(),
    };
    let line = format!(
        "[{}] {}: {}",
        display_time(&message.timestamp),
        author,
        message.content
    );
    match message.integrity {
        IntegrityStatus::Verified => line,
        other => format!("{} [{}]", line, other),
    }
}

/// Identity of a printed message
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum SeenKey {
    /// Partition slot plus status, so a slot rewritten later shows again
    Slot(RecordOrigin, IntegrityStatus),
    Fields(String, String, String),
}

impl SeenKey {
    fn of(message: &ChatMessage) -> Self {
        match &message.origin {
            Some(origin) => SeenKey::Slot(origin.clone(), message.integrity),
            None => SeenKey::Fields(
                message.author.clone(),
                message.timestamp.clone(),
                message.content.clone(),
            ),
        }
    }
}

/// Remembers what `watch` already printed
#[derive(Debug, Default)]
pub struct SeenMessages {
    seen: HashSet<SeenKey>,
}

impl SeenMessages {
    /// Messages not returned by an earlier call, in input order
    pub fn fresh<'m>(&mut self, messages: &'m [ChatMessage]) -> Vec<&'m ChatMessage> {
        messages
            .iter()
            .filter(|m| self.seen.insert(SeenKey::of(m)))
            .collect()
    }
}
