//! A compressed sparse bit-array trie.
//!
//! [`BitmapTree`] represents a mutable set of `u64` offsets over a universe
//! of up to `2^64` bits. Runs of all-zero or all-one bits collapse to a
//! sentinel rather than staying materialized as nodes, so the in-memory and
//! serialized size of a tree tracks the number of zero/one boundaries it
//! contains, not its nominal length — a tree with a handful of set bits
//! scattered across a `2^64`-bit universe costs a handful of allocations,
//! and a fully-set universe costs none at all.
//!
//! This makes the structure a natural fit for address-pool and
//! block-allocation bookkeeping (IPAM, free-list tracking) and for
//! compressing sets over otherwise-huge uniform ranges.
//!
//! ```
//! use bitmaptrie::BitmapTree;
//!
//! let mut b = BitmapTree::create(256);
//! b.set_branch(0, 256).unwrap();
//! b.clear_branch(128, 128).unwrap();
//! assert_eq!(b.count_ones(), 128);
//! assert_eq!(b.reserve_bit(), Some(128));
//! ```
//!
//! Thread safety: a [`BitmapTree`] is a plain owned aggregate with no
//! internal synchronization. Concurrent read-only access to an unmutated
//! tree is safe; concurrent mutation (or mutation concurrent with reads)
//! requires external exclusion, e.g. a `Mutex<BitmapTree>` at the call site.
//! The only process-wide mutable state this crate owns is the serialization
//! [`registry`], which is safe to register into at any time but is intended
//! to be populated once near process start.

mod bitmap;
mod codec;
mod node;
mod print;
pub mod registry;

pub use bitmap::{BitmapTree, BranchError};
pub use codec::{
    read_tree_store, write_tree_store, BitmapReadSource, BitmapWriteSink, CodecError, SliceSource,
    VecSink,
};
pub use registry::{register_method, select_method, RegistryError};

#[cfg(test)]
mod tests;
