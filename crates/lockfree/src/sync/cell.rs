//! Thread-safe slot storage.
//!
//! `SyncUnsafeCell` holds a possibly-uninitialized value that is shared by
//! address across threads but only ever touched by the thread that currently
//! owns the slot. Ownership is handed over through the pool's CAS protocol,
//! never through this type.
//!
//! loom's `UnsafeCell` exposes `with_mut` instead of `get`, so all access is
//! funnelled through [`SyncUnsafeCell::with_mut`] to compile under both.

use core::mem::MaybeUninit;

#[cfg(loom)]
use loom::cell::UnsafeCell;

#[cfg(not(loom))]
use core::cell::UnsafeCell;

/// Possibly-uninitialized value storage that is `Sync` for `T: Send`.
///
/// # Safety
///
/// The caller must ensure that at most one thread touches the value at a time
/// and that reads only happen after a write.
pub(crate) struct SyncUnsafeCell<T>(UnsafeCell<MaybeUninit<T>>);

// SAFETY: SyncUnsafeCell<T> is Sync if T is Send.
// - Exactly one thread owns a slot between a successful allocate and its release
// - Ownership transfer goes through Release/Acquire CAS on the pool heads
// - T: Send ensures the value can be moved to whichever thread takes it
unsafe impl<T: Send> Sync for SyncUnsafeCell<T> {}

// SAFETY: SyncUnsafeCell<T> is Send if T is Send.
// - No thread-local state in the wrapper
unsafe impl<T: Send> Send for SyncUnsafeCell<T> {}

impl<T> SyncUnsafeCell<T> {
    /// Creates an empty cell.
    #[inline]
    pub(crate) fn uninit() -> Self {
        Self(UnsafeCell::new(MaybeUninit::uninit()))
    }

    /// Runs `f` with a raw pointer to the (possibly uninitialized) value.
    ///
    /// # Safety
    ///
    /// The caller must own the slot for the duration of `f`.
    #[inline]
    pub(crate) unsafe fn with_mut<R>(&self, f: impl FnOnce(*mut T) -> R) -> R {
        #[cfg(not(loom))]
        {
            f(self.0.get().cast::<T>())
        }
        #[cfg(loom)]
        {
            self.0.with_mut(|p| f(p.cast::<T>()))
        }
    }

    /// Moves `value` into the cell, overwriting without dropping.
    ///
    /// # Safety
    ///
    /// The caller must own the slot; any previous value must already have
    /// been taken or dropped.
    #[inline]
    pub(crate) unsafe fn write(&self, value: T) {
        // SAFETY: upheld by caller.
        unsafe { self.with_mut(|p| p.write(value)) }
    }

    /// Moves the value out, leaving the cell logically uninitialized.
    ///
    /// # Safety
    ///
    /// The caller must own the slot and the cell must hold a value.
    #[inline]
    pub(crate) unsafe fn take(&self) -> T {
        // SAFETY: upheld by caller.
        unsafe { self.with_mut(|p| p.read()) }
    }

    /// Drops the value in place.
    ///
    /// # Safety
    ///
    /// Same as [`take`](Self::take).
    #[inline]
    pub(crate) unsafe fn drop_in_place(&self) {
        // SAFETY: upheld by caller.
        unsafe { self.with_mut(|p| p.drop_in_place()) }
    }
}
