//! Ingestion configuration and metrics

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Shared input queue configuration
#[derive(Debug, Clone)]
pub struct IngestionConfig {
    /// Capacity of the queue feeding the operators; senders wait when full
    pub channel_capacity: usize,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 100,
        }
    }
}

/// Ingestion metrics
#[derive(Debug, Default)]
pub struct IngestionMetrics {
    /// Payload messages sent
    pub payloads_sent: AtomicU64,

    /// Watermarks sent
    pub watermarks_sent: AtomicU64,

    /// Sends that failed because the queue was closed
    pub send_failures: AtomicU64,

    /// Current queue length
    pub queue_len: AtomicUsize,
}

impl IngestionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_sent(&self, watermark: bool) {
        if watermark {
            self.watermarks_sent.fetch_add(1, Ordering::Relaxed);
        } else {
            self.payloads_sent.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_send_failure(&self) {
        self.send_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn update_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            payloads_sent: self.payloads_sent.load(Ordering::Relaxed),
            watermarks_sent: self.watermarks_sent.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
            queue_len: self.queue_len.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub payloads_sent: u64,
    pub watermarks_sent: u64,
    pub send_failures: u64,
    pub queue_len: usize,
}

impl MetricsSnapshot {
    pub fn events_sent(&self) -> u64 {
        self.payloads_sent + self.watermarks_sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_counts_by_kind() {
        let metrics = IngestionMetrics::new();
        metrics.record_sent(false);
        metrics.record_sent(true);
        metrics.record_sent(true);
        metrics.record_send_failure();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.payloads_sent, 1);
        assert_eq!(snapshot.watermarks_sent, 2);
        assert_eq!(snapshot.events_sent(), 3);
        assert_eq!(snapshot.send_failures, 1);
    }
}
