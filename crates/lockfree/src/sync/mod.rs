//! Unified synchronization primitive shim.
//!
//! Under `cfg(loom)`, re-exports from `loom` so the model checker sees every
//! atomic access. Otherwise, re-exports from `std`.
//!
//! Every module in the crate imports atomics through here. A single direct
//! `use std::sync::atomic::*` would bypass loom's scheduler and silently
//! break exhaustive testing.
#![allow(unused_imports)]

mod cell;

pub(crate) use cell::SyncUnsafeCell;

pub(crate) mod atomic {
    #[cfg(loom)]
    pub(crate) use loom::sync::atomic::{
        AtomicBool, AtomicU8, AtomicU32, AtomicU64, AtomicUsize, Ordering,
    };

    #[cfg(not(loom))]
    pub(crate) use std::sync::atomic::{
        AtomicBool, AtomicU8, AtomicU32, AtomicU64, AtomicUsize, Ordering,
    };
}

#[cfg(loom)]
pub(crate) use loom::sync::Arc;

#[cfg(not(loom))]
pub(crate) use std::sync::Arc;

pub(crate) mod hint {
    #[cfg(loom)]
    pub(crate) use loom::hint::spin_loop;

    #[cfg(not(loom))]
    pub(crate) use std::hint::spin_loop;
}

pub(crate) mod thread {
    #[cfg(loom)]
    pub(crate) use loom::thread::{spawn, yield_now};

    #[cfg(not(loom))]
    pub(crate) use std::thread::{spawn, yield_now};
}
