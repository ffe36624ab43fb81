//! Standalone error types for nebula-lockfree
//!
//! Uses thiserror for clean, idiomatic Rust error definitions. Emptiness of a
//! stack or queue is not an error: `pop`/`dequeue` return `Option`.

use thiserror::Error;

#[cfg(feature = "logging")]
use tracing::{error, trace};

// ============================================================================
// Main Error Type
// ============================================================================

/// Lock-free pool and structure errors
#[must_use = "errors should be handled"]
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LockFreeError {
    // --- Pool Errors ---
    #[error("block pool exhausted (capacity: {capacity})")]
    PoolExhausted { capacity: usize },

    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    // --- Contract Violations ---
    #[error("slot {index} was released into a pool that did not issue it")]
    ForeignHandle { index: usize },

    #[error("slot {index} released while not in use")]
    DoubleRelease { index: usize },

    #[error("slot index {index} out of range (capacity: {capacity})")]
    InvalidIndex { index: usize, capacity: usize },
}

impl LockFreeError {
    /// Check if error is retryable
    ///
    /// Exhaustion clears as soon as another thread releases a slot; every
    /// other variant is a caller bug.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::PoolExhausted { .. })
    }

    /// Get error code for categorization
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::PoolExhausted { .. } => "LF:POOL:EXHAUSTED",
            Self::InvalidConfig { .. } => "LF:CONFIG:INVALID",
            Self::ForeignHandle { .. } => "LF:HANDLE:FOREIGN",
            Self::DoubleRelease { .. } => "LF:HANDLE:DOUBLE_RELEASE",
            Self::InvalidIndex { .. } => "LF:HANDLE:INDEX",
        }
    }

    /// Whether this error reports a broken caller contract rather than a
    /// transient condition.
    #[must_use]
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Self::ForeignHandle { .. } | Self::DoubleRelease { .. } | Self::InvalidIndex { .. }
        )
    }

    // ============================================================================
    // Convenience Constructors
    // ============================================================================

    /// Create pool exhausted error
    pub fn pool_exhausted(capacity: usize) -> Self {
        // Exhaustion is ordinary control flow, keep it below debug.
        #[cfg(feature = "logging")]
        trace!(capacity, "block pool exhausted");

        Self::PoolExhausted { capacity }
    }

    /// Create invalid config error
    pub fn invalid_config(reason: &str) -> Self {
        Self::InvalidConfig {
            reason: reason.to_string(),
        }
    }

    /// Create foreign handle error
    pub fn foreign_handle(index: usize) -> Self {
        #[cfg(feature = "logging")]
        error!(index, "slot handle released into a foreign pool");

        Self::ForeignHandle { index }
    }

    /// Create double release error
    pub fn double_release(index: usize) -> Self {
        #[cfg(feature = "logging")]
        error!(index, "slot released while not in use");

        Self::DoubleRelease { index }
    }

    /// Create invalid index error
    #[must_use]
    pub fn invalid_index(index: usize, capacity: usize) -> Self {
        Self::InvalidIndex { index, capacity }
    }
}

// ============================================================================
// Result Types
// ============================================================================

/// Result type for pool operations
pub type LockFreeResult<T> = Result<T, LockFreeError>;

// ============================================================================
// Tests
// ============================================================================
