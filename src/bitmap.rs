//! The public [`BitmapTree`] type and its point/branch/statistics operations.

use tracing::debug;

use crate::codec::{BitmapReadSource, BitmapWriteSink, CodecError};
use crate::node::{self, Slot, LEAF_BITS};
use crate::registry;

/// A compressed sparse bit-array trie over a universe of `size` bits (or, when
/// `size == 0`, the full `2^64`-bit universe).
///
/// Uniform subtrees — runs of all-zero or all-one bits — are represented by a
/// sentinel rather than allocated nodes, so a tree with few set bits, or one
/// with long runs of set bits, stays close to `O(bits of information)` rather
/// than `O(size)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BitmapTree {
    size: u64,
    levels: u32,
    top: Slot,
}

/// A branch operation's `(offset, size)` pair failed validation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum BranchError {
    #[error("branch size {0} is not a power of two")]
    SizeNotPowerOfTwo(u64),
    #[error("branch size {size} exceeds the universe size {universe}")]
    SizeExceedsUniverse { size: u64, universe: u64 },
    #[error("branch offset {offset} is not a multiple of its size {size}")]
    MisalignedOffset { offset: u64, size: u64 },
    #[error("branch [{offset}, {offset}+{size}) falls outside the universe")]
    RangeOverflow { offset: u64, size: u64 },
}

impl BitmapTree {
    /// Creates a tree over `requested` bits, rounded up to the next power of
    /// two with a minimum universe of 64 bits (one leaf word). A `requested`
    /// value of `0`, or anything exceeding `2^63`, yields the full `2^64`-bit
    /// universe (represented internally with `size == 0`).
    pub fn create(requested: u64) -> Self {
        if requested == 0 || requested > 0x8000_0000_0000_0000 {
            return Self {
                size: 0,
                levels: 64 - LEAF_BITS,
                top: Slot::Empty,
            };
        }
        let exponent = node::ulog2(requested).max(LEAF_BITS);
        Self {
            size: 1u64 << exponent,
            levels: exponent - LEAF_BITS,
            top: Slot::Empty,
        }
    }

    pub(crate) fn from_parts(size: u64, levels: u32, top: Slot) -> Self {
        Self { size, levels, top }
    }

    /// Consumes and drops the tree. `Drop` already frees every allocated
    /// node recursively; this exists only for interface parity with the
    /// original library's explicit `bmtDelete`.
    pub fn delete(self) {}

    pub(crate) fn top(&self) -> &Slot {
        &self.top
    }

    pub(crate) fn levels(&self) -> u32 {
        self.levels
    }

    /// The universe size, or `0` if it is the full `2^64` bits.
    pub fn size(&self) -> u64 {
        self.size
    }

    fn in_range(&self, offset: u64) -> bool {
        self.size == 0 || offset < self.size
    }

    /// Sets the bit at `offset`. A no-op if `offset` is outside the universe.
    pub fn set_bit(&mut self, offset: u64) {
        if !self.in_range(offset) {
            return;
        }
        let top = std::mem::replace(&mut self.top, Slot::Empty);
        self.top = node::set_bit(top, offset, self.levels, &Slot::Full);
    }

    /// Clears the bit at `offset`. A no-op if `offset` is outside the universe.
    pub fn clear_bit(&mut self, offset: u64) {
        if !self.in_range(offset) {
            return;
        }
        let top = std::mem::replace(&mut self.top, Slot::Empty);
        self.top = node::set_bit(top, offset, self.levels, &Slot::Empty);
    }

    /// Reads the bit at `offset`. Out-of-range offsets read as `0`.
    pub fn bit(&self, offset: u64) -> u8 {
        if !self.in_range(offset) {
            return 0;
        }
        node::get_bit(&self.top, offset)
    }

    /// Finds the numerically smallest clear bit, sets it, and returns its
    /// offset. Returns `None` if the tree is already completely full.
    pub fn reserve_bit(&mut self) -> Option<u64> {
        if self.top.is_full() {
            return None;
        }
        let mut offset = 0u64;
        let top = std::mem::replace(&mut self.top, Slot::Empty);
        self.top = node::reserve_bit(top, self.levels, &mut offset)
            .expect("a canonical non-full root always has a clear bit to reserve");
        Some(offset)
    }

    fn apply_branch(&mut self, offset: u64, size: u64, target: &Slot) -> Result<(), BranchError> {
        let mut size = size;
        if size == 0 {
            size = self.size;
            if offset == 0 && size == 0 {
                self.top = target.clone();
                return Ok(());
            }
        }
        if size == 0 || !size.is_power_of_two() {
            return Err(BranchError::SizeNotPowerOfTwo(size));
        }
        if self.size != 0 && size > self.size {
            return Err(BranchError::SizeExceedsUniverse {
                size,
                universe: self.size,
            });
        }
        if offset % size != 0 {
            return Err(BranchError::MisalignedOffset { offset, size });
        }
        if self.size == 0 {
            if offset > u64::MAX - size + 1 {
                return Err(BranchError::RangeOverflow { offset, size });
            }
        } else if offset > self.size - size {
            return Err(BranchError::RangeOverflow { offset, size });
        }
        let target_level = size.trailing_zeros();
        let top = std::mem::replace(&mut self.top, Slot::Empty);
        self.top = node::set_branch(top, offset, self.levels, target_level, target);
        Ok(())
    }

    /// Sets every bit in the aligned range `[offset, offset + size)`.
    /// `size == 0` means "the whole universe"; `size` must otherwise be a
    /// power of two and `offset` a multiple of `size`.
    pub fn set_branch(&mut self, offset: u64, size: u64) -> Result<(), BranchError> {
        self.apply_branch(offset, size, &Slot::Full)
    }

    /// Clears every bit in the aligned range `[offset, offset + size)`. See
    /// [`set_branch`](Self::set_branch) for the alignment rules.
    pub fn clear_branch(&mut self, offset: u64, size: u64) -> Result<(), BranchError> {
        self.apply_branch(offset, size, &Slot::Empty)
    }

    /// Number of set bits. Saturates at `u64::MAX` for a completely full
    /// `2^64`-bit universe (which actually holds one more set bit than that —
    /// a limitation of returning a `u64` count at all, carried over from the
    /// original library this one continues).
    pub fn count_ones(&self) -> u64 {
        node::count_ones(&self.top, self.levels)
    }

    /// Number of allocated (non-sentinel) nodes.
    pub fn count_nodes(&self) -> u64 {
        node::count_nodes(&self.top)
    }

    /// Approximate bytes held by this tree: one header plus one node-sized
    /// allocation per allocated node.
    pub fn allocated_bytes(&self) -> u64 {
        let header = std::mem::size_of::<BitmapTree>() as u64;
        let node = std::mem::size_of::<crate::node::Node>() as u64;
        header + self.count_nodes() * node
    }

    /// `true` if every bit in the universe is set.
    pub fn is_full(&self) -> bool {
        self.top.is_full()
    }

    /// Structural equality: same size and the same set of bits, regardless
    /// of how each tree happened to get there.
    pub fn compare(&self, other: &Self) -> bool {
        self == other
    }

    /// Writes this tree using the currently active serialization method.
    pub fn write(&self, sink: &mut dyn BitmapWriteSink) {
        registry::active_writer()(self, sink)
    }

    /// Reads a tree using the currently active serialization method.
    pub fn read(source: &mut dyn BitmapReadSource) -> Result<BitmapTree, CodecError> {
        registry::active_reader()(source)
    }

    /// Writes an indented debug dump of the trie's structure to stdout.
    pub fn print(&self) {
        debug!(nodes = self.count_nodes(), ones = self.count_ones(), "printing tree");
        crate::print::print_tree(self);
    }
}
