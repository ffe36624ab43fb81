//! Pool statistics

use core::fmt;

use crate::sync::atomic::{AtomicUsize, Ordering};
use crate::utils::atomic_max;

/// Point-in-time pool statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Number of slots
    pub capacity: usize,
    /// Currently allocated slots
    pub in_use: usize,
    /// Highest `in_use` ever observed
    pub peak_in_use: usize,
    /// Successful allocations
    pub allocations: usize,
    /// Successful releases
    pub releases: usize,
    /// Allocations that found the pool exhausted
    pub exhaustions: usize,
    /// Failed CAS attempts on pool and structure heads
    pub cas_retries: usize,
}

impl PoolStats {
    /// Fraction of slots currently allocated, in `0.0..=1.0`
    #[allow(clippy::cast_precision_loss)]
    pub fn utilization(&self) -> f64 {
        if self.capacity == 0 {
            return 0.0;
        }
        self.in_use as f64 / self.capacity as f64
    }
}

impl fmt::Display for PoolStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "in_use {}/{} (peak {}), {} allocs, {} releases, {} exhausted, {} cas retries",
            self.in_use,
            self.capacity,
            self.peak_in_use,
            self.allocations,
            self.releases,
            self.exhaustions,
            self.cas_retries
        )
    }
}

/// Internal counters behind [`PoolStats`]
#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
    allocations: AtomicUsize,
    releases: AtomicUsize,
    exhaustions: AtomicUsize,
    cas_retries: AtomicUsize,
    peak_in_use: AtomicUsize,
}

impl PoolCounters {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn record_allocation(&self, live: usize) {
        self.allocations.fetch_add(1, Ordering::Relaxed);
        atomic_max(&self.peak_in_use, live);
    }

    #[inline]
    pub(crate) fn record_release(&self) {
        self.releases.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_exhausted(&self) {
        self.exhaustions.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_retry(&self) {
        self.cas_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, capacity: usize, in_use: usize) -> PoolStats {
        PoolStats {
            capacity,
            in_use,
            peak_in_use: self.peak_in_use.load(Ordering::Relaxed),
            allocations: self.allocations.load(Ordering::Relaxed),
            releases: self.releases.load(Ordering::Relaxed),
            exhaustions: self.exhaustions.load(Ordering::Relaxed),
            cas_retries: self.cas_retries.load(Ordering::Relaxed),
        }
    }
}
