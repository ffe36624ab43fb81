//! Small helpers shared by the CAS loops.

use crate::sync::atomic::{AtomicUsize, Ordering};
use crate::sync::hint;

/// Exponential backoff for CAS retry loops
///
/// Spins `1, 2, 4, ... max` times between attempts. Never parks the thread:
/// a retry loop stays lock-free with or without backoff.
#[derive(Debug)]
#[cfg_attr(loom, allow(dead_code))]
pub(crate) struct Backoff {
    current: u32,
    max: u32,
    enabled: bool,
}

impl Backoff {
    /// Create new backoff with default parameters
    #[inline]
    pub(crate) fn new(enabled: bool) -> Self {
        Self {
            current: 1,
            max: 64,
            enabled,
        }
    }

    /// Perform backoff
    #[inline]
    pub(crate) fn spin(&mut self) {
        if !self.enabled {
            return;
        }
        // Every spin is a scheduling point under loom; one is enough.
        #[cfg(loom)]
        hint::spin_loop();
        #[cfg(not(loom))]
        {
            for _ in 0..self.current {
                hint::spin_loop();
            }
            if self.current < self.max {
                self.current *= 2;
            }
        }
    }
}

/// Atomically update maximum value
#[inline]
pub(crate) fn atomic_max(current: &AtomicUsize, value: usize) {
    let mut max = current.load(Ordering::Relaxed);
    loop {
        if value <= max {
            break;
        }
        match current.compare_exchange_weak(max, value, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => break,
            Err(x) => max = x,
        }
    }
}
