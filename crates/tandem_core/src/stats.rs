//! Counters shared between producers and the worker.

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters. Producers bump `submitted`, the worker bumps the rest.
#[derive(Debug, Default)]
pub struct DispatchStats {
    submitted: AtomicU64,
    executed: AtomicU64,
    failed: AtomicU64,
    panicked: AtomicU64,
    barriers: AtomicU64,
}

/// Point-in-time copy of [`DispatchStats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchStatsSnapshot {
    /// Commands accepted by the queue.
    pub submitted: u64,
    /// Commands the worker ran to completion (successfully or not).
    pub executed: u64,
    /// Commands that returned an error.
    pub failed: u64,
    /// Commands that panicked.
    pub panicked: u64,
    /// Synchronizing calls that returned a signalled result.
    pub barriers: u64,
}

impl DispatchStatsSnapshot {
    /// Commands accepted but not yet finished.
    #[must_use]
    pub fn in_flight(&self) -> u64 {
        self.submitted.saturating_sub(self.executed + self.panicked)
    }
}

impl DispatchStats {
    pub(crate) fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_executed(&self, ok: bool) {
        if !ok {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
        // Release pairs with the Acquire in `snapshot`, so a caller that saw a
        // barrier return also sees every count before it.
        self.executed.fetch_add(1, Ordering::Release);
    }

    pub(crate) fn record_panicked(&self) {
        self.panicked.fetch_add(1, Ordering::Release);
    }

    pub(crate) fn record_barrier(&self) {
        self.barriers.fetch_add(1, Ordering::Relaxed);
    }

    /// Reads all counters.
    #[must_use]
    pub fn snapshot(&self) -> DispatchStatsSnapshot {
        DispatchStatsSnapshot {
            executed: self.executed.load(Ordering::Acquire),
            panicked: self.panicked.load(Ordering::Acquire),
            submitted: self.submitted.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            barriers: self.barriers.load(Ordering::Relaxed),
        }
    }
}
