//! Counters and timings for sync cycles and message handling
//!
//! Recorded through the `metrics` facade; they are no-ops until the
//! embedding application installs a recorder.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use std::time::Instant;

pub const SYNC_CYCLES: &str = "sealtext.sync.cycles";
pub const SYNC_CONFLICT_RETRIES: &str = "sealtext.sync.conflict_retries";
pub const SYNC_FAILURES: &str = "sealtext.sync.failures";
pub const SYNC_DURATION_MS: &str = "sealtext.sync.duration_ms";
pub const MESSAGES_SENT: &str = "sealtext.messages.sent";
pub const MESSAGES_READ: &str = "sealtext.messages.read";
pub const MESSAGES_TAMPERED: &str = "sealtext.messages.tampered";
pub const MESSAGES_UNDECRYPTABLE: &str = "sealtext.messages.undecryptable";

/// Initialize metrics with descriptions
pub fn init_metrics() {
    describe_counter!(SYNC_CYCLES, "Number of publish/receive cycles started");
    describe_counter!(SYNC_CONFLICT_RETRIES, "Pushes rejected as non-fast-forward and retried");
    describe_counter!(SYNC_FAILURES, "Cycles that ended in an error");
    describe_histogram!(SYNC_DURATION_MS, "Sync cycle duration in milliseconds");
    describe_counter!(MESSAGES_SENT, "Messages published to the shared store");
    describe_counter!(MESSAGES_READ, "Records read and verified");
    describe_counter!(MESSAGES_TAMPERED, "Records that failed hash chain verification");
    describe_counter!(MESSAGES_UNDECRYPTABLE, "Records that could not be decrypted");
}

/// Record a counter metric
pub fn record_counter(name: &'static str, value: u64) {
    counter!(name).increment(value);
}

/// Timer for measuring operation duration
pub struct Timer {
    name: &'static str,
    start: Instant,
}

impl Timer {
    pub fn new(name: &'static str) -> Self {
        Self { name, start: Instant::now() }
    }

    /// Stop the timer and record the duration
    pub fn stop(self) {
        let duration = self.start.elapsed();
        histogram!(self.name).record(duration.as_secs_f64() * 1000.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_without_recorder() {
        init_metrics();
        record_counter(MESSAGES_SENT, 1);
        record_counter(SYNC_FAILURES, 0);
        Timer::new(SYNC_DURATION_MS).stop();
    }

    #[test]
    fn test_metric_names_are_namespaced() {
        for name in [
            SYNC_CYCLES,
            SYNC_CONFLICT_RETRIES,
            SYNC_FAILURES,
            SYNC_DURATION_MS,
            MESSAGES_SENT,
            MESSAGES_READ,
            MESSAGES_TAMPERED,
            MESSAGES_UNDECRYPTABLE,
        ] {
            assert!(name.starts_with("sealtext."));
        }
    }
}
