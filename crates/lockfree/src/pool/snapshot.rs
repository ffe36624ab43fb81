//! Debug listing of pool state

use core::fmt;

/// Best-effort view of which slots are allocated and which are recyclable
///
/// Produced by [`BlockPool::snapshot`](super::BlockPool::snapshot).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolSnapshot {
    /// Number of slots
    pub capacity: usize,
    /// Slots at or above this index were never handed out
    pub virgin_cursor: usize,
    /// Indices marked in use, ascending
    pub in_use: Vec<usize>,
    /// Free-list indices from head to tail
    pub free_list: Vec<usize>,
    /// The free-list walk hit its step limit (only possible under concurrent
    /// mutation)
    pub truncated: bool,
}

impl PoolSnapshot {
    /// Slots that are neither in use, on the free list, nor virgin.
    ///
    /// Always zero for a quiescent pool.
    pub fn unaccounted(&self) -> usize {
        let virgin = self.capacity.saturating_sub(self.virgin_cursor);
        self.capacity
            .saturating_sub(virgin + self.in_use.len() + self.free_list.len())
    }
}

impl fmt::Display for PoolSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "pool: capacity {}, virgin cursor {}",
            self.capacity, self.virgin_cursor
        )?;
        writeln!(f, "  in use: {:?}", self.in_use)?;
        write!(f, "  free: ")?;
        for index in &self.free_list {
            write!(f, "{index} -> ")?;
        }
        if self.truncated {
            write!(f, "...")
        } else {
            write!(f, "null")
        }
    }
}
