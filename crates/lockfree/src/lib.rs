//! # nebula-lockfree
//!
//! Lock-free building blocks for the Nebula runtime: a fixed-capacity block
//! pool and two bounded containers whose nodes live in it.
//!
//! - [`BlockPool`]: slot arena with a bump cursor and a tagged free list
//! - [`Stack`]: Treiber stack
//! - [`Queue`]: Michael–Scott queue with an announced tail-next gate
//! - [`TaggedPtr`] / [`TaggedIndex`]: reference plus ABA tag in one word
//!
//! No operation takes a lock or calls the system allocator after
//! construction. Full structures report it as a value (`Err(value)` or
//! [`LockFreeError::PoolExhausted`]) rather than blocking.
//!
//! ## Quick Start
//!
//! ```rust
//! use nebula_lockfree::prelude::*;
//!
//! let stack = Stack::with_capacity(16)?;
//! stack.push(1).unwrap();
//! assert_eq!(stack.pop(), Some(1));
//!
//! let queue = Queue::with_capacity(16)?;
//! queue.enqueue("job").unwrap();
//! assert_eq!(queue.dequeue(), Some("job"));
//!
//! let pool = BlockPool::<u64>::new(4)?;
//! let mut slot = pool.allocate()?;
//! slot.write(42);
//! // slot goes back to the pool when dropped
//! # Ok::<(), LockFreeError>(())
//! ```
//!
//! ## Features
//!
//! - `std` (default): Standard library build
//! - `logging` (default): Structured logging via `tracing`
//!
//! ## Model checking
//!
//! Every atomic goes through an internal shim that switches to `loom` under
//! `RUSTFLAGS="--cfg loom"`:
//!
//! ```text
//! RUSTFLAGS="--cfg loom" cargo test -p nebula-lockfree --release --lib loom_tests
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rust_2018_idioms)]
// Slot storage and the handle API are built on raw cell access
#![allow(unsafe_code)]
// Precision loss in usize -> f64 casts is acceptable for stats
#![allow(clippy::cast_precision_loss)]

#[cfg(not(target_pointer_width = "64"))]
compile_error!("nebula-lockfree packs indices and tags into 64-bit words and requires a 64-bit target");

// Error types
pub mod error;

// Core modules
pub mod config;
pub mod pool;
pub mod queue;
pub mod stack;
pub mod tagged;

// Internal
mod sync;
mod utils;


pub use crate::config::PoolConfig;
pub use crate::error::{LockFreeError, LockFreeResult};
pub use crate::pool::{BlockPool, PoolSnapshot, PoolStats, SlotHandle};
pub use crate::queue::Queue;
pub use crate::stack::Stack;
pub use crate::tagged::{TaggedIndex, TaggedPtr};

// Public API exports
pub mod prelude {
    //! Convenient re-exports of commonly used types.

    pub use crate::config::PoolConfig;
    pub use crate::error::{LockFreeError, LockFreeResult};
    pub use crate::pool::{BlockPool, PoolSnapshot, PoolStats, SlotHandle};
    pub use crate::queue::Queue;
    pub use crate::stack::Stack;
    pub use crate::tagged::{TaggedIndex, TaggedPtr};
}
