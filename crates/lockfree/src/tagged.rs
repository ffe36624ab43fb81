//! Tagged references: an address or slot index bundled with an ABA counter.
//!
//! Two encodings live here:
//!
//! - [`TaggedPtr`] steals the low bits a pointer's alignment leaves zero.
//!   The tag width is `log2(align_of::<T>())`, so an 8-aligned type gets a
//!   3-bit tag and a byte-aligned type gets none.
//! - [`TaggedIndex`] packs a 32-bit arena index and a 32-bit tag into one
//!   `u64`. This is what every shared head in the crate stores.
//!
//! ```text
//!   TaggedIndex:  bits [63:32]  tag    (32 bits)
//!                 bits [31:0]   index  (u32::MAX = null)
//! ```
//!
//! In both encodings `pack` **truncates** a tag that does not fit: the tag is
//! a wrapping counter, so keeping its low bits is the intended behaviour.
//! Equality is bitwise over the whole word. The same address under two tags
//! compares unequal.
//!
//! A tag narrows the ABA window, it does not close it: after `2^bits`
//! replacements of the same word, an old value can reappear.

use core::fmt;

use crate::sync::atomic::{AtomicU64, Ordering};

// ============================================================================
// TaggedPtr
// ============================================================================

/// Pointer to `T` with a counter in its alignment bits.
#[repr(transparent)]
pub struct TaggedPtr<T> {
    raw: *mut T,
}

impl<T> TaggedPtr<T> {
    /// Number of tag bits available for `T`.
    pub const TAG_BITS: u32 = align_of::<T>().trailing_zeros();

    /// Mask selecting the tag bits of the packed word.
    pub const TAG_MASK: usize = (1 << Self::TAG_BITS) - 1;

    /// Null address, tag zero.
    #[inline]
    pub const fn null() -> Self {
        Self {
            raw: core::ptr::null_mut(),
        }
    }

    /// Packs `ptr` and `tag`. Tag bits above [`TAG_BITS`](Self::TAG_BITS) are
    /// dropped.
    #[inline]
    pub fn pack(ptr: *mut T, tag: usize) -> Self {
        debug_assert_eq!(
            ptr.addr() & Self::TAG_MASK,
            0,
            "pointer {ptr:p} is not aligned for its type"
        );
        Self {
            raw: ptr.map_addr(|addr| addr | (tag & Self::TAG_MASK)),
        }
    }

    /// The address with tag bits masked out. Safe to dereference if the
    /// packed pointer was.
    #[inline]
    pub fn address(self) -> *mut T {
        self.raw.map_addr(|addr| addr & !Self::TAG_MASK)
    }

    /// The tag.
    #[inline]
    pub fn tag(self) -> usize {
        self.raw.addr() & Self::TAG_MASK
    }

    /// Whether the address part is null, whatever the tag.
    #[inline]
    pub fn is_null(self) -> bool {
        self.address().is_null()
    }

    /// Same address, different tag.
    #[inline]
    pub fn with_tag(self, tag: usize) -> Self {
        Self::pack(self.address(), tag)
    }

    /// Replacement for this word: `ptr` with this tag plus one.
    #[inline]
    pub fn successor(self, ptr: *mut T) -> Self {
        Self::pack(ptr, self.tag().wrapping_add(1))
    }

    /// The packed word.
    #[inline]
    pub fn into_raw(self) -> *mut T {
        self.raw
    }
}

impl<T> Clone for TaggedPtr<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for TaggedPtr<T> {}

impl<T> PartialEq for TaggedPtr<T> {
    fn eq(&self, other: &Self) -> bool {
        core::ptr::eq(self.raw, other.raw)
    }
}

impl<T> Eq for TaggedPtr<T> {}

impl<T> Default for TaggedPtr<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T> fmt::Debug for TaggedPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TaggedPtr({:p}, tag={})", self.address(), self.tag())
    }
}

// ============================================================================
// TaggedIndex
// ============================================================================

/// Arena slot index (or null) plus a 32-bit tag, packed into a `u64`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct TaggedIndex(u64);

impl TaggedIndex {
    /// Index value reserved for null.
    pub const NULL_INDEX: u32 = u32::MAX;

    /// Largest index that can be packed.
    pub const MAX_INDEX: u32 = u32::MAX - 1;

    /// Null index, tag zero.
    pub const NULL: Self = Self::null(0);

    /// Packs `index` and `tag`.
    #[inline]
    pub const fn new(index: usize, tag: u32) -> Self {
        debug_assert!(index <= Self::MAX_INDEX as usize);
        Self(((tag as u64) << 32) | (index as u32 as u64))
    }

    /// Null index carrying `tag`.
    #[inline]
    pub const fn null(tag: u32) -> Self {
        Self(((tag as u64) << 32) | Self::NULL_INDEX as u64)
    }

    /// Rebuilds from a word produced by [`into_raw`](Self::into_raw).
    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The packed word.
    #[inline]
    pub const fn into_raw(self) -> u64 {
        self.0
    }

    /// Whether the index part is null, whatever the tag.
    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 as u32 == Self::NULL_INDEX
    }

    /// The slot index. Meaningless for a null word; check
    /// [`is_null`](Self::is_null) or use [`get`](Self::get).
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as u32 as usize
    }

    /// The slot index, or `None` for null.
    #[inline]
    pub const fn get(self) -> Option<usize> {
        if self.is_null() { None } else { Some(self.index()) }
    }

    /// The tag.
    #[inline]
    pub const fn tag(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Replacement for this word: `index` with this tag plus one.
    #[inline]
    pub const fn successor(self, index: usize) -> Self {
        Self::new(index, self.tag().wrapping_add(1))
    }

    /// Replacement for this word pointing nowhere.
    #[inline]
    pub const fn null_successor(self) -> Self {
        Self::null(self.tag().wrapping_add(1))
    }
}

impl Default for TaggedIndex {
    fn default() -> Self {
        Self::NULL
    }
}

impl fmt::Debug for TaggedIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(index) => write!(f, "TaggedIndex({index}, tag={})", self.tag()),
            None => write!(f, "TaggedIndex(null, tag={})", self.tag()),
        }
    }
}

// ============================================================================
// AtomicTaggedIndex
// ============================================================================

/// A [`TaggedIndex`] that can be loaded, stored and swapped as a unit.
#[repr(transparent)]
pub(crate) struct AtomicTaggedIndex(AtomicU64);

impl AtomicTaggedIndex {
    #[inline]
    pub(crate) fn new(value: TaggedIndex) -> Self {
        Self(AtomicU64::new(value.into_raw()))
    }

    #[inline]
    pub(crate) fn load(&self, order: Ordering) -> TaggedIndex {
        TaggedIndex::from_raw(self.0.load(order))
    }

    #[inline]
    pub(crate) fn store(&self, value: TaggedIndex, order: Ordering) {
        self.0.store(value.into_raw(), order);
    }

    #[inline]
    pub(crate) fn compare_exchange(
        &self,
        current: TaggedIndex,
        new: TaggedIndex,
        success: Ordering,
        failure: Ordering,
    ) -> Result<TaggedIndex, TaggedIndex> {
        self.0
            .compare_exchange(current.into_raw(), new.into_raw(), success, failure)
            .map(TaggedIndex::from_raw)
            .map_err(TaggedIndex::from_raw)
    }

    #[inline]
    pub(crate) fn compare_exchange_weak(
        &self,
        current: TaggedIndex,
        new: TaggedIndex,
        success: Ordering,
        failure: Ordering,
    ) -> Result<TaggedIndex, TaggedIndex> {
        self.0
            .compare_exchange_weak(current.into_raw(), new.into_raw(), success, failure)
            .map(TaggedIndex::from_raw)
            .map_err(TaggedIndex::from_raw)
    }
}

impl fmt::Debug for AtomicTaggedIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.load(Ordering::Relaxed), f)
    }
}
