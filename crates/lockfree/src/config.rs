//! Block pool configuration

use crate::error::{LockFreeError, LockFreeResult};
use crate::tagged::TaggedIndex;

/// Largest slot count a pool can address.
///
/// Slot indices are packed into the low 32 bits of a tagged word, with
/// `u32::MAX` reserved for null.
pub const MAX_CAPACITY: usize = TaggedIndex::MAX_INDEX as usize + 1;

/// Slot count used by `Default` and by `Stack::new` / `Queue::new`.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Configuration for a block pool and the structures built on it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Number of slots, fixed for the pool's lifetime
    pub capacity: usize,

    /// Enable statistics tracking
    pub track_stats: bool,

    /// Use exponential backoff for CAS retries
    pub use_backoff: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            track_stats: cfg!(debug_assertions),
            use_backoff: true,
        }
    }
}

impl PoolConfig {
    /// Default configuration with a fixed slot count
    #[must_use]
    pub fn bounded(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    /// Production configuration - optimized for throughput under contention
    #[must_use]
    pub fn production() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            track_stats: false,
            use_backoff: true,
        }
    }

    /// Debug configuration - every counter on
    #[must_use]
    pub fn debug() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            track_stats: true,
            use_backoff: false,
        }
    }

    /// Performance configuration - minimal overhead, no backoff
    #[must_use]
    pub fn performance() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            track_stats: false,
            use_backoff: false,
        }
    }

    /// Replace the slot count
    #[must_use = "builder methods must be chained or built"]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Check that the configuration describes a pool that can exist
    pub fn validate(&self) -> LockFreeResult<()> {
        if self.capacity == 0 {
            return Err(LockFreeError::invalid_config("capacity must be non-zero"));
        }
        if self.capacity > MAX_CAPACITY {
            return Err(LockFreeError::invalid_config(&format!(
                "capacity {} exceeds the addressable maximum {MAX_CAPACITY}",
                self.capacity
            )));
        }
        Ok(())
    }
}
