//! Main block pool implementation
//!
//! # Safety
//!
//! This module implements a fixed-capacity slot arena with a lock-free free
//! list:
//! - Slots are handed out first from a virgin region by an atomic bump cursor
//! - Released slots form a singly-linked free list threaded through
//!   `Slot::free_next`, headed by an atomic tagged index
//! - Every push onto the free list takes a fresh tag from `release_tag`, so a
//!   pop that observed an older head cannot succeed (ABA)
//!
//! ## Invariants
//!
//! - A slot index is owned by exactly one party between allocate and release
//! - Slot memory is never returned to the allocator before the pool drops,
//!   so stale indices are always safe to read through atomic fields
//! - Release publishes the previous owner's writes (Release CAS); allocate
//!   acquires them before the new owner writes (Acquire CAS)
//! - `live` counts allocated slots and never exceeds `capacity`

use core::fmt;

use crossbeam_utils::CachePadded;

use super::handle::SlotHandle;
use super::slot::Slot;
use super::snapshot::PoolSnapshot;
use super::stats::{PoolCounters, PoolStats};
use crate::config::PoolConfig;
use crate::error::{LockFreeError, LockFreeResult};
use crate::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use crate::tagged::{AtomicTaggedIndex, TaggedIndex};
use crate::utils::Backoff;

#[cfg(feature = "logging")]
use tracing::debug;

/// Fixed-capacity pool of slots, each holding one `T`
///
/// # Memory Layout
/// ```text
///   slots:  [0][1][2][3][4][5][6][7]
///            ^-----------^  ^-----^
///            handed out     virgin (cursor = 5)
///
///   free list: head -> 3 -> 0 -> null     (recyclable)
/// ```
///
/// Allocation never blocks: it either returns a slot or reports
/// [`LockFreeError::PoolExhausted`].
pub struct BlockPool<T> {
    slots: Box<[Slot<T>]>,

    /// Next never-used slot. May overshoot `capacity` briefly under a race.
    virgin: CachePadded<AtomicUsize>,

    /// Head of the free list
    free_head: CachePadded<AtomicTaggedIndex>,

    /// Source of fresh free-list tags
    release_tag: AtomicU32,

    /// Allocated slot count (always tracked)
    live: AtomicUsize,

    capacity: usize,
    config: PoolConfig,
    counters: PoolCounters,
}

impl<T> BlockPool<T> {
    /// Creates a pool with `capacity` slots and default configuration
    pub fn new(capacity: usize) -> LockFreeResult<Self> {
        Self::with_config(PoolConfig::bounded(capacity))
    }

    /// Creates a pool with custom configuration
    ///
    /// # Errors
    /// Returns [`LockFreeError::InvalidConfig`] if the capacity is zero or
    /// does not fit the packed index.
    pub fn with_config(config: PoolConfig) -> LockFreeResult<Self> {
        config.validate()?;
        Ok(Self::from_valid_config(config))
    }

    /// Builds the pool without re-validating. `config` must have passed
    /// [`PoolConfig::validate`].
    pub(crate) fn from_valid_config(config: PoolConfig) -> Self {
        let capacity = config.capacity;
        let slots = (0..capacity).map(|_| Slot::new()).collect();

        #[cfg(feature = "logging")]
        debug!(
            capacity,
            slot_size = size_of::<Slot<T>>(),
            track_stats = config.track_stats,
            "block pool created"
        );

        Self {
            slots,
            virgin: CachePadded::new(AtomicUsize::new(0)),
            free_head: CachePadded::new(AtomicTaggedIndex::new(TaggedIndex::NULL)),
            release_tag: AtomicU32::new(1),
            live: AtomicUsize::new(0),
            capacity,
            config,
            counters: PoolCounters::new(),
        }
    }

    /// Returns the number of slots
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the configuration the pool was built with
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Returns the number of allocated slots (exact in absence of races)
    pub fn in_use(&self) -> usize {
        self.live.load(Ordering::Relaxed)
    }

    /// Returns the number of slots an allocate could still obtain
    pub fn available(&self) -> usize {
        self.capacity.saturating_sub(self.in_use())
    }

    /// Checks if every slot is allocated
    pub fn is_exhausted(&self) -> bool {
        self.in_use() >= self.capacity
    }

    /// Allocates a slot
    ///
    /// # Errors
    /// Returns [`LockFreeError::PoolExhausted`] when both the virgin region
    /// and the free list are empty. This is an expected outcome.
    pub fn allocate(&self) -> LockFreeResult<SlotHandle<'_, T>> {
        match self.allocate_index() {
            Some(index) => {
                let generation = self.slot(index).generation.load(Ordering::Relaxed);
                Ok(SlotHandle::new(self, index, generation))
            },
            None => Err(LockFreeError::pool_exhausted(self.capacity)),
        }
    }

    /// Returns a slot to the pool, dropping any value it still holds
    ///
    /// # Errors
    /// Returns [`LockFreeError::ForeignHandle`] if `handle` was issued by a
    /// different pool. The handle is then returned to its own pool.
    pub fn release(&self, handle: SlotHandle<'_, T>) -> LockFreeResult<()> {
        if !handle.belongs_to(self) {
            return Err(LockFreeError::foreign_handle(handle.index()));
        }
        drop(handle);
        Ok(())
    }

    /// Whether `index` is currently allocated. Advisory under concurrency.
    pub fn is_in_use(&self, index: usize) -> bool {
        self.slots
            .get(index)
            .is_some_and(|slot| slot.in_use.load(Ordering::Relaxed))
    }

    /// Get statistics (if tracking is enabled)
    pub fn stats(&self) -> Option<PoolStats> {
        if !self.config.track_stats {
            return None;
        }
        Some(self.counters.snapshot(self.capacity, self.in_use()))
    }

    /// Best-effort listing of in-use slots and free-list contents.
    ///
    /// Takes no locks; under live traffic the result may mix states from
    /// different instants. The free-list walk stops after `capacity` steps.
    pub fn snapshot(&self) -> PoolSnapshot {
        let virgin_cursor = self.virgin.load(Ordering::Relaxed).min(self.capacity);
        let in_use = (0..virgin_cursor)
            .filter(|&index| self.is_in_use(index))
            .collect();

        let mut free_list = Vec::new();
        let mut cursor = self.free_head.load(Ordering::Acquire);
        let mut truncated = false;
        while let Some(index) = cursor.get() {
            if free_list.len() == self.capacity {
                truncated = true;
                break;
            }
            free_list.push(index);
            cursor = self.slot(index).free_next.load(Ordering::Acquire);
        }

        PoolSnapshot {
            capacity: self.capacity,
            virgin_cursor,
            in_use,
            free_list,
            truncated,
        }
    }

    /// Emits [`snapshot`](Self::snapshot) at debug level
    #[cfg(feature = "logging")]
    pub fn log_snapshot(&self) {
        let snapshot = self.snapshot();
        debug!(
            capacity = snapshot.capacity,
            in_use = snapshot.in_use.len(),
            free = snapshot.free_list.len(),
            truncated = snapshot.truncated,
            "{snapshot}"
        );
    }

    // ------------------------------------------------------------------------
    // Index-level protocol, shared with the stack and queue
    // ------------------------------------------------------------------------

    #[inline]
    pub(crate) fn slot(&self, index: usize) -> &Slot<T> {
        &self.slots[index]
    }

    pub(crate) fn backoff(&self) -> Backoff {
        Backoff::new(self.config.use_backoff)
    }

    pub(crate) fn record_retry(&self) {
        if self.config.track_stats {
            self.counters.record_retry();
        }
    }

    /// Takes a slot index, marking it in use.
    pub(crate) fn allocate_index(&self) -> Option<usize> {
        let Some(index) = self.take_virgin().or_else(|| self.pop_free()) else {
            if self.config.track_stats {
                self.counters.record_exhausted();
            }
            return None;
        };

        let slot = self.slot(index);
        let was_in_use = slot.in_use.swap(true, Ordering::Relaxed);
        debug_assert!(!was_in_use, "slot {index} handed out twice");
        slot.generation.fetch_add(1, Ordering::Relaxed);
        slot.claims.store(0, Ordering::Relaxed);

        let live = self.live.fetch_add(1, Ordering::Relaxed) + 1;
        if self.config.track_stats {
            self.counters.record_allocation(live);
        }
        Some(index)
    }

    /// Returns a slot index to the free list.
    ///
    /// The slot's value must already be taken or dropped.
    pub(crate) fn release_index(&self, index: usize) -> LockFreeResult<()> {
        let Some(slot) = self.slots.get(index) else {
            return Err(LockFreeError::invalid_index(index, self.capacity));
        };
        // Cleared before the push: once the slot is on the free list another
        // thread may allocate it and set the flag again.
        if !slot.in_use.swap(false, Ordering::Relaxed) {
            return Err(LockFreeError::double_release(index));
        }

        // Uncounted before it becomes reachable: the Release push orders this
        // decrement before the next owner's increment.
        self.live.fetch_sub(1, Ordering::Relaxed);
        if self.config.track_stats {
            self.counters.record_release();
        }

        self.push_free(index);
        Ok(())
    }

    /// Bumps the virgin cursor. No retry: the fetch-add is the
    /// synchronization point.
    fn take_virgin(&self) -> Option<usize> {
        if self.virgin.load(Ordering::Relaxed) >= self.capacity {
            return None;
        }
        let index = self.virgin.fetch_add(1, Ordering::Relaxed);
        if index < self.capacity {
            return Some(index);
        }
        // Overshot under a race. Every fetch that saw >= capacity stores the
        // same clamp, and the cursor never drops back below capacity.
        self.virgin.store(self.capacity, Ordering::Relaxed);
        None
    }

    fn pop_free(&self) -> Option<usize> {
        let mut backoff = self.backoff();
        let mut head = self.free_head.load(Ordering::Acquire);

        loop {
            let index = head.get()?;

            // A stale head may point at a slot that was popped and reused in
            // the meantime. The read is still an atomic load on live memory,
            // and the tagged CAS below rejects it.
            let next = self.slot(index).free_next.load(Ordering::Relaxed);

            match self.free_head.compare_exchange_weak(
                head,
                next,
                Ordering::Acquire,
                Ordering::Acquire,
            ) {
                Ok(_) => return Some(index),
                Err(current) => {
                    head = current;
                    self.record_retry();
                    backoff.spin();
                },
            }
        }
    }

    fn push_free(&self, index: usize) {
        let tag = self.release_tag.fetch_add(1, Ordering::Relaxed);
        let node = TaggedIndex::new(index, tag);
        let slot = self.slot(index);

        let mut backoff = self.backoff();
        let mut head = self.free_head.load(Ordering::Relaxed);

        loop {
            slot.free_next.store(head, Ordering::Relaxed);

            match self.free_head.compare_exchange_weak(
                head,
                node,
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(current) => {
                    head = current;
                    self.record_retry();
                    backoff.spin();
                },
            }
        }
    }
}

impl<T> fmt::Debug for BlockPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockPool")
            .field("capacity", &self.capacity)
            .field("in_use", &self.in_use())
            .field("free_head", &*self.free_head)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// SAFETY: BlockPool<T> is Send because:
// - Slot values are only ever moved, never shared, so T: Send suffices
// - All bookkeeping fields are atomics or plain data
unsafe impl<T: Send> Send for BlockPool<T> {}

// SAFETY: BlockPool<T> is Sync because:
// - Slot ownership transfers only through the atomic free list and cursor
// - A slot value is touched by its single owner (SyncUnsafeCell contract)
// - No shared mutable state outside of atomics
unsafe impl<T: Send> Sync for BlockPool<T> {}
