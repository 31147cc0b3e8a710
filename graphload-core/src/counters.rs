//! Process-wide load counters shared by every partition.

use std::sync::atomic::{AtomicU64, Ordering};

/// Aggregate counters, safe for concurrent increments from many partitions.
///
/// Batch counters count write attempts; the record counters next to them
/// count the records those attempts carried.
#[derive(Debug, Default)]
pub struct LoadCounters {
    batch_success: AtomicU64,
    batch_failure: AtomicU64,
    records_written: AtomicU64,
    records_failed: AtomicU64,
    rows_skipped: AtomicU64,
}

/// Point-in-time copy of [`LoadCounters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub batch_success: u64,
    pub batch_failure: u64,
    pub records_written: u64,
    pub records_failed: u64,
    pub rows_skipped: u64,
}

impl CounterSnapshot {
    pub fn attempts(&self) -> u64 {
        self.batch_success + self.batch_failure
    }
}

impl LoadCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self, records: u64) {
        self.batch_success.fetch_add(1, Ordering::Relaxed);
        self.records_written.fetch_add(records, Ordering::Relaxed);
    }

    pub fn record_failure(&self, records: u64) {
        self.batch_failure.fetch_add(1, Ordering::Relaxed);
        self.records_failed.fetch_add(records, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.rows_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            batch_success: self.batch_success.load(Ordering::Relaxed),
            batch_failure: self.batch_failure.load(Ordering::Relaxed),
            records_written: self.records_written.load(Ordering::Relaxed),
            records_failed: self.records_failed.load(Ordering::Relaxed),
            rows_skipped: self.rows_skipped.load(Ordering::Relaxed),
        }
    }
}
