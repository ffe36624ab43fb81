//! Lock-free LIFO stack (Treiber)

use core::fmt;

use crossbeam_utils::CachePadded;

use crate::config::PoolConfig;
use crate::error::LockFreeResult;
use crate::pool::{BlockPool, SlotHandle};
use crate::sync::atomic::Ordering;
use crate::tagged::{AtomicTaggedIndex, TaggedIndex};

#[cfg(feature = "logging")]
use tracing::debug;

/// Bounded lock-free stack whose nodes live in a [`BlockPool`]
///
/// The head is a tagged index: every successful push or pop bumps its tag, so
/// a pop that read a head which was popped and pushed again in the meantime
/// fails its CAS instead of installing a stale successor.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use std::thread;
///
/// use nebula_lockfree::Stack;
///
/// let stack = Arc::new(Stack::with_capacity(64).unwrap());
///
/// let handles: Vec<_> = (0..4)
///     .map(|t| {
///         let stack = Arc::clone(&stack);
///         thread::spawn(move || {
///             for i in 0..8 {
///                 stack.push(t * 8 + i).unwrap();
///             }
///         })
///     })
///     .collect();
/// for handle in handles {
///     handle.join().unwrap();
/// }
///
/// let mut values: Vec<_> = std::iter::from_fn(|| stack.pop()).collect();
/// values.sort_unstable();
/// assert_eq!(values, (0..32).collect::<Vec<_>>());
/// ```
pub struct Stack<T> {
    head: CachePadded<AtomicTaggedIndex>,
    pool: BlockPool<T>,
}

impl<T> Stack<T> {
    /// Creates a stack with the default capacity
    pub fn new() -> Self {
        Self::from_pool(BlockPool::from_valid_config(PoolConfig::default()))
    }

    /// Creates a stack that holds at most `capacity` values
    pub fn with_capacity(capacity: usize) -> LockFreeResult<Self> {
        Self::with_config(PoolConfig::bounded(capacity))
    }

    /// Creates a stack backed by a pool built from `config`
    pub fn with_config(config: PoolConfig) -> LockFreeResult<Self> {
        BlockPool::with_config(config).map(Self::from_pool)
    }

    fn from_pool(pool: BlockPool<T>) -> Self {
        #[cfg(feature = "logging")]
        debug!(capacity = pool.capacity(), "stack created");

        Self {
            head: CachePadded::new(AtomicTaggedIndex::new(TaggedIndex::NULL)),
            pool,
        }
    }

    /// Maximum number of values
    pub fn capacity(&self) -> usize {
        self.pool.capacity()
    }

    /// The pool the nodes are allocated from
    pub fn pool(&self) -> &BlockPool<T> {
        &self.pool
    }

    /// Whether the stack looked empty at the moment of the call
    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Acquire).is_null()
    }

    /// Pushes `value`
    ///
    /// # Errors
    /// Hands `value` back when the pool is exhausted.
    pub fn push(&self, value: T) -> Result<(), T> {
        let Some(index) = self.pool.allocate_index() else {
            return Err(value);
        };
        // SAFETY: freshly allocated slot, owned by this thread and empty.
        unsafe { self.pool.slot(index).value.write(value) };
        self.link(index);
        Ok(())
    }

    /// Pushes a slot that was allocated and filled through [`pool`](Self::pool)
    ///
    /// # Errors
    /// Hands the handle back if it holds no value or belongs to another pool.
    pub fn push_slot<'a>(&'a self, handle: SlotHandle<'a, T>) -> Result<(), SlotHandle<'a, T>> {
        if !handle.belongs_to(&self.pool) || !handle.is_initialized() {
            return Err(handle);
        }
        self.link(handle.into_index());
        Ok(())
    }

    /// Pops the most recently pushed value
    pub fn pop(&self) -> Option<T> {
        let mut backoff = self.pool.backoff();
        let mut head = self.head.load(Ordering::Acquire);

        loop {
            let index = head.get()?;
            // May be stale if `index` was popped concurrently; the CAS below
            // then fails on the tag.
            let next = self.pool.slot(index).link.load(Ordering::Relaxed);

            match self.head.compare_exchange_weak(
                head,
                TaggedIndex::new(next.index(), head.tag().wrapping_add(1)),
                Ordering::Acquire,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    // SAFETY: the successful CAS unlinked `index`; this thread
                    // is its sole owner and it holds the pushed value.
                    let value = unsafe { self.pool.slot(index).value.take() };
                    let released = self.pool.release_index(index);
                    debug_assert!(released.is_ok(), "stack node release failed: {released:?}");
                    return Some(value);
                },
                Err(current) => {
                    head = current;
                    self.pool.record_retry();
                    backoff.spin();
                },
            }
        }
    }

    /// Publishes an owned, filled slot as the new head.
    fn link(&self, index: usize) {
        let node = &self.pool.slot(index).link;
        let mut backoff = self.pool.backoff();
        let mut head = self.head.load(Ordering::Relaxed);

        loop {
            node.store(head, Ordering::Relaxed);

            match self.head.compare_exchange_weak(
                head,
                head.successor(index),
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(current) => {
                    head = current;
                    self.pool.record_retry();
                    backoff.spin();
                },
            }
        }
    }
}

impl<T> Default for Stack<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for Stack<T> {
    fn drop(&mut self) {
        while self.pop().is_some() {}
    }
}

impl<T> fmt::Debug for Stack<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stack")
            .field("head", &*self.head)
            .field("pool", &self.pool)
            .finish()
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::error::LockFreeError;

    #[test]
    fn test_lifo_order() {
        let stack = Stack::with_capacity(4).unwrap();
        assert!(stack.is_empty());
        for i in 1..=3 {
            stack.push(i).unwrap();
        }
        assert_eq!(stack.pop(), Some(3));
        assert_eq!(stack.pop(), Some(2));
        assert_eq!(stack.pop(), Some(1));
        assert_eq!(stack.pop(), None);
    }

    #[test]
    fn test_push_on_exhaustion_returns_value() {
        let stack = Stack::with_capacity(1).unwrap();
        stack.push("a").unwrap();
        assert_eq!(stack.push("b"), Err("b"));
        assert_eq!(stack.pop(), Some("a"));
        stack.push("c").unwrap();
    }

    #[test]
    fn test_nodes_return_to_pool() {
        let stack = Stack::with_capacity(2).unwrap();
        for round in 0..10 {
            stack.push(round).unwrap();
            stack.push(round + 1).unwrap();
            assert!(stack.pool().is_exhausted());
            stack.pop();
            stack.pop();
            assert_eq!(stack.pool().in_use(), 0);
        }
    }

    #[test]
    fn test_head_tag_changes_on_reuse() {
        let stack = Stack::with_capacity(1).unwrap();
        stack.push(1).unwrap();
        let first = stack.head.load(Ordering::Relaxed);
        stack.pop();
        stack.push(2).unwrap();
        let second = stack.head.load(Ordering::Relaxed);
        assert_eq!(first.index(), second.index());
        assert_ne!(first, second);
    }

    #[test]
    fn test_push_slot() {
        let stack = Stack::with_capacity(2).unwrap();
        let mut handle = stack.pool().allocate().unwrap();
        handle.write(7);
        stack.push_slot(handle).unwrap();
        assert_eq!(stack.pool().in_use(), 1);
        assert_eq!(stack.pop(), Some(7));
        assert_eq!(stack.pool().in_use(), 0);
    }

    #[test]
    fn test_push_slot_rejects_empty_and_foreign() {
        let stack = Stack::<u8>::with_capacity(1).unwrap();
        let empty = stack.pool().allocate().unwrap();
        let empty = stack.push_slot(empty).unwrap_err();
        drop(empty);

        let other = BlockPool::new(1).unwrap();
        let mut foreign = other.allocate().unwrap();
        foreign.write(1);
        assert!(stack.push_slot(foreign).is_err());
        assert!(stack.is_empty());
        assert_eq!(other.in_use(), 0);
    }

    #[test]
    fn test_drop_drops_values() {
        let marker = Rc::new(());
        {
            let stack = Stack::with_capacity(3).unwrap();
            for _ in 0..3 {
                stack.push(Rc::clone(&marker)).unwrap();
            }
            assert_eq!(Rc::strong_count(&marker), 4);
        }
        assert_eq!(Rc::strong_count(&marker), 1);
    }

    #[test]
    fn test_invalid_capacity() {
        assert!(matches!(
            Stack::<u8>::with_capacity(0),
            Err(LockFreeError::InvalidConfig { .. })
        ));
    }
}
