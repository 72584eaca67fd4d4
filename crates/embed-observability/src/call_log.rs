//! Per-call performance logging: batch size, latency, cache hits, outcome.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A single `Embed` call log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallLogEntry {
    pub request_id: Option<String>,
    pub text_count: usize,
    pub latency: Duration,
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub batches_dispatched: usize,
    pub retried_indices: usize,
    pub succeeded: bool,
    pub timestamp_epoch_ms: i64,
}

impl CallLogEntry {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        request_id: Option<String>,
        text_count: usize,
        latency: Duration,
        cache_hits: usize,
        cache_misses: usize,
        batches_dispatched: usize,
        retried_indices: usize,
        succeeded: bool,
    ) -> Self {
        Self {
            request_id,
            text_count,
            latency,
            cache_hits,
            cache_misses,
            batches_dispatched,
            retried_indices,
            succeeded,
            timestamp_epoch_ms: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Append-only call log for latency analysis, bounded to a ring buffer.
#[derive(Debug, Clone)]
pub struct CallLog {
    entries: Vec<CallLogEntry>,
    max_entries: usize,
}

impl CallLog {
    pub fn new() -> Self {
        Self::with_capacity(50_000)
    }

    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            entries: Vec::new(),
            max_entries,
        }
    }

    pub fn record(&mut self, entry: CallLogEntry) {
        tracing::debug!(
            event = "embed_call_logged",
            request_id = ?entry.request_id,
            text_count = entry.text_count,
            latency_ms = entry.latency.as_millis() as u64,
            cache_hits = entry.cache_hits,
            cache_misses = entry.cache_misses,
            succeeded = entry.succeeded,
            "embed call logged"
        );

        self.entries.push(entry);
        if self.entries.len() > self.max_entries {
            self.entries.drain(..self.entries.len() - self.max_entries);
        }
    }

    pub fn entries(&self) -> &[CallLogEntry] {
        &self.entries
    }

    pub fn avg_latency(&self) -> Duration {
        if self.entries.is_empty() {
            return Duration::ZERO;
        }
        let total: Duration = self.entries.iter().map(|e| e.latency).sum();
        total / self.entries.len() as u32
    }

    /// Latency at the given percentile (0.0-1.0).
    pub fn latency_percentile(&self, p: f64) -> Duration {
        if self.entries.is_empty() {
            return Duration::ZERO;
        }
        let mut latencies: Vec<Duration> = self.entries.iter().map(|e| e.latency).collect();
        latencies.sort();
        let idx = ((p * (latencies.len() - 1) as f64).round() as usize).min(latencies.len() - 1);
        latencies[idx]
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }
}

impl Default for CallLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_buffer_drops_oldest_entries_past_capacity() {
        let mut log = CallLog::with_capacity(2);
        for i in 0..3 {
            log.record(CallLogEntry::new(None, 1, Duration::from_millis(i), 0, 1, 1, 0, true));
        }
        assert_eq!(log.count(), 2);
    }

    #[test]
    fn avg_latency_of_empty_log_is_zero() {
        assert_eq!(CallLog::new().avg_latency(), Duration::ZERO);
    }
}
