//! Per-sink counters

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Counters of one sink worker
#[derive(Debug, Default)]
pub struct SinkMetrics {
    queue_len: AtomicUsize,
    data_written: AtomicU64,
    watermarks_written: AtomicU64,
    failures: AtomicU64,
    /// Outputs dropped because the sink queue was full
    dropped: AtomicU64,
}

impl SinkMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    pub fn record_written(&self, watermark: bool) {
        let counter = if watermark {
            &self.watermarks_written
        } else {
            &self.data_written
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queue_len: self.queue_len.load(Ordering::Relaxed),
            data_written: self.data_written.load(Ordering::Relaxed),
            watermarks_written: self.watermarks_written.load(Ordering::Relaxed),
            failures: self.failures(),
            dropped: self.dropped(),
        }
    }
}

/// Snapshot of sink metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub queue_len: usize,
    pub data_written: u64,
    pub watermarks_written: u64,
    pub failures: u64,
    pub dropped: u64,
}

impl MetricsSnapshot {
    pub fn written(&self) -> u64 {
        self.data_written + self.watermarks_written
    }
}
