//! Owning handle to one allocated slot

use core::fmt;
use core::marker::PhantomData;
use core::mem::ManuallyDrop;
use core::ptr;

use super::BlockPool;
use crate::tagged::TaggedIndex;

/// Exclusive ownership of one pool slot
///
/// Automatically returns the slot to its pool when dropped, dropping any
/// value still stored in it. Similar to `Box` but backed by a pool slot that
/// may start out empty.
pub struct SlotHandle<'pool, T> {
    pool: &'pool BlockPool<T>,
    index: usize,
    generation: u32,
    initialized: bool,
    // Shared access to the handle hands out `&T`.
    _marker: PhantomData<T>,
}

impl<'pool, T> SlotHandle<'pool, T> {
    pub(super) fn new(pool: &'pool BlockPool<T>, index: usize, generation: u32) -> Self {
        Self {
            pool,
            index,
            generation,
            initialized: false,
            _marker: PhantomData,
        }
    }

    /// Slot index inside the pool
    pub fn index(&self) -> usize {
        self.index
    }

    /// How many times this slot had been allocated, including this time
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Index and generation packed together; unique for the pool's lifetime
    /// until the generation wraps
    pub fn tagged(&self) -> TaggedIndex {
        TaggedIndex::new(self.index, self.generation)
    }

    /// The pool this handle came from
    pub fn pool(&self) -> &'pool BlockPool<T> {
        self.pool
    }

    /// Whether a value is stored
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Stores `value`, returning the previous one if any
    pub fn write(&mut self, value: T) -> Option<T> {
        let previous = self.take();
        // SAFETY: the handle owns the slot exclusively and the cell is empty
        // after `take`.
        unsafe { self.pool.slot(self.index).value.write(value) };
        self.initialized = true;
        previous
    }

    /// Gets a reference to the stored value
    pub fn get(&self) -> Option<&T> {
        if !self.initialized {
            return None;
        }
        // SAFETY: initialized value in a slot owned by this handle; the
        // returned borrow is tied to `&self`.
        Some(unsafe { self.pool.slot(self.index).value.with_mut(|p| &*p) })
    }

    /// Gets a mutable reference to the stored value
    pub fn get_mut(&mut self) -> Option<&mut T> {
        if !self.initialized {
            return None;
        }
        // SAFETY: as in `get`, and `&mut self` rules out other borrows.
        Some(unsafe { self.pool.slot(self.index).value.with_mut(|p| &mut *p) })
    }

    /// Moves the stored value out, leaving the slot empty
    pub fn take(&mut self) -> Option<T> {
        if !self.initialized {
            return None;
        }
        self.initialized = false;
        // SAFETY: the slot is owned and holds a value; the flag was cleared
        // so it is read exactly once.
        Some(unsafe { self.pool.slot(self.index).value.take() })
    }

    pub(crate) fn belongs_to(&self, pool: &BlockPool<T>) -> bool {
        ptr::eq(self.pool, pool)
    }

    /// Gives up the handle without releasing the slot. Any stored value stays
    /// in place and becomes the caller's responsibility.
    pub(crate) fn into_index(self) -> usize {
        let this = ManuallyDrop::new(self);
        this.index
    }
}

impl<T> Drop for SlotHandle<'_, T> {
    fn drop(&mut self) {
        if self.initialized {
            self.initialized = false;
            // SAFETY: the slot is still owned by this handle and holds a
            // value that nothing else reads.
            unsafe { self.pool.slot(self.index).value.drop_in_place() };
        }
        let released = self.pool.release_index(self.index);
        debug_assert!(released.is_ok(), "handle release failed: {released:?}");
    }
}

impl<T: fmt::Debug> fmt::Debug for SlotHandle<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotHandle")
            .field("index", &self.index)
            .field("generation", &self.generation)
            .field("value", &self.get())
            .finish()
    }
}
