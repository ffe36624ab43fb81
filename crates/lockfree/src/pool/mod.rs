//! Fixed-capacity block pool
//!
//! Hands out slot indices without locks or system allocation after
//! construction. The stack and queue build their nodes out of pool slots.

mod block_pool;
mod handle;
pub(crate) mod slot;
mod snapshot;
mod stats;

pub use block_pool::BlockPool;
pub use handle::SlotHandle;
pub use snapshot::PoolSnapshot;
pub use stats::PoolStats;
