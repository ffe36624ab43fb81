//! Lock-free FIFO queue (Michael–Scott with an announced tail-next gate)
//!
//! # Protocol
//!
//! The list always starts at a dummy node; `head` points at it and the first
//! value lives in `head.next`. Enqueuers never CAS a tail's `next` directly:
//!
//! 1. Announce the new node by CAS-ing `gate` from null to it
//! 2. Link the announced node after the current last node
//! 3. Clear `gate`, then swing `tail` forward
//!
//! Steps 2 and 3 are idempotent and any thread that finds `gate` occupied
//! performs them before retrying its own enqueue, so a preempted announcer
//! delays nobody. Since at most one node is announced at a time, at most one
//! link CAS targets the last node at any moment.
//!
//! # Reclamation
//!
//! A dequeued node is touched by two parties: the dequeuer that moves `head`
//! onto it (and takes its value), and the later dequeuer that moves `head`
//! past it (it was the dummy by then). Each adds a claim; the second claim
//! returns the slot to the pool. The initial dummy starts with one claim.

use core::fmt;

use crossbeam_utils::CachePadded;

use crate::config::{MAX_CAPACITY, PoolConfig};
use crate::error::{LockFreeError, LockFreeResult};
use crate::pool::BlockPool;
use crate::sync::atomic::Ordering;
use crate::tagged::{AtomicTaggedIndex, TaggedIndex};

#[cfg(feature = "logging")]
use tracing::debug;

/// Claims needed before a dequeued node goes back to the pool.
const RETIRE_CLAIMS: u8 = 2;

/// Bounded lock-free queue whose nodes live in a [`BlockPool`]
///
/// One extra pool slot is reserved for the dummy node, so a queue of
/// capacity `n` holds up to `n` values.
///
/// # Example
/// ```
/// use nebula_lockfree::Queue;
///
/// let queue = Queue::with_capacity(2).unwrap();
/// queue.enqueue("first").unwrap();
/// queue.enqueue("second").unwrap();
/// assert_eq!(queue.enqueue("third"), Err("third"));
///
/// assert_eq!(queue.dequeue(), Some("first"));
/// assert_eq!(queue.dequeue(), Some("second"));
/// assert_eq!(queue.dequeue(), None);
/// ```
pub struct Queue<T> {
    head: CachePadded<AtomicTaggedIndex>,
    tail: CachePadded<AtomicTaggedIndex>,
    /// Node announced for linking, or null
    gate: CachePadded<AtomicTaggedIndex>,
    pool: BlockPool<T>,
}

impl<T> Queue<T> {
    /// Creates a queue with the default capacity
    pub fn new() -> Self {
        let config = PoolConfig::default();
        let capacity = config.capacity + 1;
        Self::from_pool(BlockPool::from_valid_config(config.with_capacity(capacity)))
    }

    /// Creates a queue that holds at most `capacity` values
    pub fn with_capacity(capacity: usize) -> LockFreeResult<Self> {
        Self::with_config(PoolConfig::bounded(capacity))
    }

    /// Creates a queue backed by a pool built from `config`
    ///
    /// # Errors
    /// Returns [`LockFreeError::InvalidConfig`] if the capacity is invalid or
    /// leaves no room for the dummy node.
    pub fn with_config(config: PoolConfig) -> LockFreeResult<Self> {
        config.validate()?;
        if config.capacity >= MAX_CAPACITY {
            return Err(LockFreeError::invalid_config(
                "queue capacity leaves no slot for the dummy node",
            ));
        }
        let capacity = config.capacity + 1;
        BlockPool::with_config(config.with_capacity(capacity)).map(Self::from_pool)
    }

    fn from_pool(pool: BlockPool<T>) -> Self {
        // Capacity is at least one and nothing else holds the pool yet, so
        // the first allocate is virgin slot 0.
        let allocated = pool.allocate_index();
        debug_assert_eq!(allocated, Some(0), "fresh pool refused the dummy slot");
        let dummy = allocated.unwrap_or(0);
        let slot = pool.slot(dummy);
        slot.reset_link();
        slot.claims.store(1, Ordering::Relaxed);

        #[cfg(feature = "logging")]
        debug!(capacity = pool.capacity() - 1, dummy, "queue created");

        let origin = TaggedIndex::new(dummy, 0);
        Self {
            head: CachePadded::new(AtomicTaggedIndex::new(origin)),
            tail: CachePadded::new(AtomicTaggedIndex::new(origin)),
            gate: CachePadded::new(AtomicTaggedIndex::new(TaggedIndex::NULL)),
            pool,
        }
    }

    /// Maximum number of values
    pub fn capacity(&self) -> usize {
        self.pool.capacity() - 1
    }

    /// The pool the nodes are allocated from
    pub fn pool(&self) -> &BlockPool<T> {
        &self.pool
    }

    /// Whether the queue looked empty at the moment of the call
    pub fn is_empty(&self) -> bool {
        let head = self.head.load(Ordering::Acquire);
        self.pool.slot(head.index()).link.load(Ordering::Acquire).is_null()
    }

    /// Appends `value`
    ///
    /// # Errors
    /// Hands `value` back when the pool is exhausted.
    pub fn enqueue(&self, value: T) -> Result<(), T> {
        let Some(index) = self.pool.allocate_index() else {
            return Err(value);
        };
        let slot = self.pool.slot(index);
        // SAFETY: freshly allocated slot, owned by this thread and empty.
        unsafe { slot.value.write(value) };
        slot.reset_link();

        let mut backoff = self.pool.backoff();
        loop {
            let tail = self.tail.load(Ordering::Acquire);
            let next = self.pool.slot(tail.index()).link.load(Ordering::Acquire);
            if tail != self.tail.load(Ordering::Acquire) {
                continue;
            }

            if !next.is_null() {
                self.swing_tail(tail, next.index());
                continue;
            }

            let gate = self.gate.load(Ordering::Acquire);
            if !gate.is_null() {
                self.help_announced(gate);
                continue;
            }

            let mine = gate.successor(index);
            match self
                .gate
                .compare_exchange(gate, mine, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => {
                    self.help_announced(mine);
                    return Ok(());
                },
                Err(_) => {
                    self.pool.record_retry();
                    backoff.spin();
                },
            }
        }
    }

    /// Removes the oldest value
    pub fn dequeue(&self) -> Option<T> {
        let mut backoff = self.pool.backoff();
        loop {
            let head = self.head.load(Ordering::Acquire);
            let tail = self.tail.load(Ordering::Acquire);
            let next = self.pool.slot(head.index()).link.load(Ordering::Acquire);
            if head != self.head.load(Ordering::Acquire) {
                continue;
            }

            if head.index() == tail.index() {
                if next.is_null() {
                    return None;
                }
                // A node is linked but the tail still lags on the dummy.
                self.swing_tail(tail, next.index());
                continue;
            }

            // Tail is ahead of head, so head has a successor; a null read
            // means `head` was recycled between the loads.
            let Some(first) = next.get() else {
                continue;
            };

            match self.head.compare_exchange(
                head,
                head.successor(first),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    // SAFETY: the successful CAS made this thread the only
                    // one to take `first`'s value. Its slot cannot be
                    // released before this thread's claim below.
                    let value = unsafe { self.pool.slot(first).value.take() };
                    self.retire(first);
                    self.retire(head.index());
                    return Some(value);
                },
                Err(_) => {
                    self.pool.record_retry();
                    backoff.spin();
                },
            }
        }
    }

    /// Drives the announced node `announced` to linked and clears the gate.
    ///
    /// Returns once `gate` no longer holds `announced`.
    fn help_announced(&self, announced: TaggedIndex) {
        let node = announced.index();
        loop {
            if self.gate.load(Ordering::Acquire) != announced {
                return;
            }
            let tail = self.tail.load(Ordering::Acquire);
            let last = self.pool.slot(tail.index()).link.load(Ordering::Acquire);
            if tail != self.tail.load(Ordering::Acquire)
                || self.gate.load(Ordering::Acquire) != announced
            {
                continue;
            }

            // While the gate holds `announced`, nothing else can be linked,
            // so the node is either absent or the last one.
            let linked = tail.index() == node || last.get() == Some(node);
            if !linked {
                if let Some(lagging) = last.get() {
                    self.swing_tail(tail, lagging);
                    continue;
                }
                // The expected word carries the link tag, so a tail slot that
                // was recycled since the load rejects this.
                if self
                    .pool
                    .slot(tail.index())
                    .link
                    .compare_exchange(last, last.successor(node), Ordering::AcqRel, Ordering::Acquire)
                    .is_err()
                {
                    continue;
                }
            }

            // Either CAS may lose to a helper that already did the same.
            let _ = self.gate.compare_exchange(
                announced,
                announced.null_successor(),
                Ordering::AcqRel,
                Ordering::Relaxed,
            );
            if tail.index() != node {
                self.swing_tail(tail, node);
            }
            return;
        }
    }

    /// Best-effort advance of `tail` from `observed` to `next`.
    fn swing_tail(&self, observed: TaggedIndex, next: usize) {
        let _ = self.tail.compare_exchange(
            observed,
            observed.successor(next),
            Ordering::AcqRel,
            Ordering::Relaxed,
        );
    }

    /// Adds one reclamation claim to `index`; the second claim frees it.
    fn retire(&self, index: usize) {
        let claims = self.pool.slot(index).claims.fetch_add(1, Ordering::AcqRel) + 1;
        if claims == RETIRE_CLAIMS {
            let released = self.pool.release_index(index);
            debug_assert!(released.is_ok(), "queue node release failed: {released:?}");
        }
    }
}

impl<T> Default for Queue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for Queue<T> {
    fn drop(&mut self) {
        while self.dequeue().is_some() {}
        // The remaining dummy is owned outright here.
        let dummy = self.head.load(Ordering::Relaxed).index();
        let released = self.pool.release_index(dummy);
        debug_assert!(released.is_ok(), "queue dummy release failed: {released:?}");
    }
}

impl<T> fmt::Debug for Queue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Queue")
            .field("head", &*self.head)
            .field("tail", &*self.tail)
            .field("gate", &*self.gate)
            .field("pool", &self.pool)
            .finish()
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use std::rc::Rc;

    use super::*;

    #[test]
    fn test_fifo_order() {
        let queue = Queue::with_capacity(4).unwrap();
        assert!(queue.is_empty());
        for i in 1..=4 {
            queue.enqueue(i).unwrap();
        }
        assert!(!queue.is_empty());
        for i in 1..=4 {
            assert_eq!(queue.dequeue(), Some(i));
        }
        assert_eq!(queue.dequeue(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_capacity_excludes_dummy() {
        let queue = Queue::<u8>::with_capacity(3).unwrap();
        assert_eq!(queue.capacity(), 3);
        assert_eq!(queue.pool().capacity(), 4);
        assert_eq!(queue.pool().in_use(), 1);
        assert_eq!(queue.pool().snapshot().in_use, vec![0]);
        assert_eq!(queue.head.load(Ordering::Acquire).get(), Some(0));
    }

    #[test]
    fn test_enqueue_on_exhaustion_returns_value() {
        let queue = Queue::with_capacity(1).unwrap();
        queue.enqueue('a').unwrap();
        assert_eq!(queue.enqueue('b'), Err('b'));
        assert_eq!(queue.dequeue(), Some('a'));
        queue.enqueue('c').unwrap();
        assert_eq!(queue.dequeue(), Some('c'));
    }

    #[test]
    fn test_steady_state_uses_one_spare_slot() {
        let queue = Queue::with_capacity(2).unwrap();
        for round in 0..50 {
            queue.enqueue(round).unwrap();
            queue.enqueue(round + 100).unwrap();
            assert_eq!(queue.dequeue(), Some(round));
            assert_eq!(queue.dequeue(), Some(round + 100));
            // Only the dummy remains allocated.
            assert_eq!(queue.pool().in_use(), 1);
        }
    }

    #[test]
    fn test_gate_clear_after_enqueue() {
        let queue = Queue::with_capacity(2).unwrap();
        queue.enqueue(1).unwrap();
        assert!(queue.gate.load(Ordering::Relaxed).is_null());
        let tail = queue.tail.load(Ordering::Relaxed);
        let head = queue.head.load(Ordering::Relaxed);
        assert_ne!(head.index(), tail.index());
    }

    #[test]
    fn test_helper_completes_stalled_announcement() {
        let queue = Queue::with_capacity(3).unwrap();

        // Announce a node the way an enqueuer does, then stop before linking.
        let index = queue.pool.allocate_index().unwrap();
        unsafe { queue.pool.slot(index).value.write(10) };
        queue.pool.slot(index).reset_link();
        let announced = TaggedIndex::NULL.successor(index);
        queue.gate.store(announced, Ordering::Release);

        // A second enqueue must finish the stalled one first.
        queue.enqueue(20).unwrap();
        assert!(queue.gate.load(Ordering::Relaxed).is_null());
        assert_eq!(queue.dequeue(), Some(10));
        assert_eq!(queue.dequeue(), Some(20));
        assert_eq!(queue.dequeue(), None);
    }

    #[test]
    fn test_dequeue_reconciles_lagging_tail() {
        let queue = Queue::with_capacity(2).unwrap();
        queue.enqueue(5).unwrap();

        // Roll the tail back onto the dummy as if the final swing was lost.
        let head = queue.head.load(Ordering::Relaxed);
        let tail = queue.tail.load(Ordering::Relaxed);
        queue.tail.store(TaggedIndex::new(head.index(), tail.tag() + 1), Ordering::Relaxed);

        assert_eq!(queue.dequeue(), Some(5));
        assert_eq!(queue.dequeue(), None);
    }

    #[test]
    fn test_drop_drops_values_and_dummy() {
        let marker = Rc::new(());
        {
            let queue = Queue::with_capacity(3).unwrap();
            for _ in 0..3 {
                queue.enqueue(Rc::clone(&marker)).unwrap();
            }
            queue.dequeue();
            assert_eq!(Rc::strong_count(&marker), 3);
        }
        assert_eq!(Rc::strong_count(&marker), 1);
    }

    #[test]
    fn test_rejects_capacity_without_dummy_room() {
        assert!(Queue::<u8>::with_capacity(MAX_CAPACITY).is_err());
        assert!(Queue::<u8>::with_capacity(0).is_err());
    }
}
