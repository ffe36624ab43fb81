//! One arena slot: value storage plus the atomic words threaded through it.

use crate::sync::SyncUnsafeCell;
use crate::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};
use crate::tagged::{AtomicTaggedIndex, TaggedIndex};

/// Storage for exactly one node.
///
/// Only `value` is owner-exclusive. Every other field is atomic and may be
/// read through a stale index at any time: slots live for the pool's whole
/// lifetime, so a late reader sees a recycled word, never freed memory.
pub(crate) struct Slot<T> {
    /// Node payload, initialized only while a structure or handle owns it.
    pub(crate) value: SyncUnsafeCell<T>,

    /// Successor link used by the stack and queue. Its tag survives recycling
    /// and is bumped on every re-initialisation.
    pub(crate) link: AtomicTaggedIndex,

    /// Free-list linkage, meaningful only while the slot is recyclable.
    pub(crate) free_next: AtomicTaggedIndex,

    /// Double-release detection. Not needed for normal operation.
    pub(crate) in_use: AtomicBool,

    /// Allocation count, exposed as the handle generation.
    pub(crate) generation: AtomicU32,

    /// Retirement claims collected by the queue before the slot goes back.
    pub(crate) claims: AtomicU8,
}

impl<T> Slot<T> {
    pub(crate) fn new() -> Self {
        Self {
            value: SyncUnsafeCell::uninit(),
            link: AtomicTaggedIndex::new(TaggedIndex::NULL),
            free_next: AtomicTaggedIndex::new(TaggedIndex::NULL),
            in_use: AtomicBool::new(false),
            generation: AtomicU32::new(0),
            claims: AtomicU8::new(0),
        }
    }

    /// Points `link` at nothing under a fresh tag, so a CAS that captured the
    /// previous incarnation's link fails.
    ///
    /// Only the slot owner calls this, before the slot is published.
    #[inline]
    pub(crate) fn reset_link(&self) -> TaggedIndex {
        let fresh = self.link.load(Ordering::Relaxed).null_successor();
        self.link.store(fresh, Ordering::Relaxed);
        fresh
    }
}
