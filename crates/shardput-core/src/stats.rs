//! Delivery counters for one batcher.
//!
//! Counters are observability only; nothing reads them to make a decision,
//! so relaxed ordering is enough.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

#[derive(Debug, Default)]
pub struct BatcherStats {
    puts_ok: AtomicU64,
    puts_permanent: AtomicU64,
    puts_exhausted: AtomicU64,
    puts_cancelled: AtomicU64,
    submissions: AtomicU64,
    records_accepted: AtomicU64,
    records_retried: AtomicU64,
    throttled_attempts: AtomicU64,
}

/// Point-in-time copy of [`BatcherStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatcherStatsSnapshot {
    pub puts_ok: u64,
    pub puts_permanent: u64,
    pub puts_exhausted: u64,
    pub puts_cancelled: u64,
    pub submissions: u64,
    pub records_accepted: u64,
    pub records_retried: u64,
    pub throttled_attempts: u64,
}

impl BatcherStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_submission(&self) {
        self.submissions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_accepted(&self, records: usize) {
        self.records_accepted
            .fetch_add(records as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_retry(&self, records: usize, throttled: bool) {
        self.records_retried
            .fetch_add(records as u64, Ordering::Relaxed);
        if throttled {
            self.throttled_attempts.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_ok(&self) {
        self.puts_ok.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_permanent(&self) {
        self.puts_permanent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_exhausted(&self) {
        self.puts_exhausted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cancelled(&self) {
        self.puts_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> BatcherStatsSnapshot {
        BatcherStatsSnapshot {
            puts_ok: self.puts_ok.load(Ordering::Relaxed),
            puts_permanent: self.puts_permanent.load(Ordering::Relaxed),
            puts_exhausted: self.puts_exhausted.load(Ordering::Relaxed),
            puts_cancelled: self.puts_cancelled.load(Ordering::Relaxed),
            submissions: self.submissions.load(Ordering::Relaxed),
            records_accepted: self.records_accepted.load(Ordering::Relaxed),
            records_retried: self.records_retried.load(Ordering::Relaxed),
            throttled_attempts: self.throttled_attempts.load(Ordering::Relaxed),
        }
    }
}
