//! The default "tree-store" wire format and the sink/source traits that
//! decouple serialization from any particular I/O backend.
//!
//! Wire format (all multi-byte integers little-endian):
//!
//! ```text
//! version: u16        always 0
//! flags:   u8          bits 0-5: log2(universe size), or 0 for 2^64
//!                      bit 6 (0x40): set iff bit 7 is also set and the
//!                                    uniform value is FULL
//!                      bit 7 (0x80): the whole tree is a single sentinel;
//!                                    no node stream follows
//! node stream (only present when bit 7 is clear), preorder:
//!   leaf:     0x00, then 8 bytes of bitmask
//!   interior: one byte, high nibble tags the zero child, low nibble the
//!             one child: 0x4 = EMPTY, 0x5 = FULL, 0x7 = inline (recurse)
//! ```

use byteorder::{ByteOrder, LittleEndian};
use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::FromPrimitive;

use crate::bitmap::BitmapTree;
use crate::node::{Node, Slot, LEAF_BITS};

/// Destination for serialized tree bytes. Mirrors the callback contract of
/// the original library: a write is expected to consume everything handed to
/// it, so there is no partial-write or failure signal.
pub trait BitmapWriteSink {
    fn write_all(&mut self, data: &[u8]);
}

/// Source of serialized tree bytes. `read` may return fewer bytes than
/// requested only at end of input; any short read during decoding is treated
/// as a corrupt or truncated stream.
pub trait BitmapReadSource {
    fn read(&mut self, buf: &mut [u8]) -> usize;
}

/// An in-memory [`BitmapWriteSink`] that appends to a growable buffer.
#[derive(Default)]
pub struct VecSink(pub Vec<u8>);

impl BitmapWriteSink for VecSink {
    fn write_all(&mut self, data: &[u8]) {
        self.0.extend_from_slice(data);
    }
}

/// An in-memory [`BitmapReadSource`] over a byte slice.
pub struct SliceSource<'a> {
    data: &'a [u8],
    cursor: usize,
}

impl<'a> SliceSource<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, cursor: 0 }
    }
}

impl BitmapReadSource for SliceSource<'_> {
    fn read(&mut self, buf: &mut [u8]) -> usize {
        let remaining = self.data.len() - self.cursor;
        let n = remaining.min(buf.len());
        buf[..n].copy_from_slice(&self.data[self.cursor..self.cursor + n]);
        self.cursor += n;
        n
    }
}

/// Errors from decoding the tree-store wire format.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("short read: expected {expected} bytes, got {actual}")]
    ShortRead { expected: usize, actual: usize },
    #[error("unsupported version {version}")]
    UnsupportedVersion { version: u16 },
    #[error("unknown node tag byte {tag:#04x}")]
    UnknownTag { tag: u8 },
    #[error("leaf tag found where an interior node was expected at level {level}")]
    LeafTagAtInteriorLevel { level: u32 },
    #[error("interior tag found where a leaf bitmap node was expected")]
    InteriorTagAtLeafLevel,
    #[error("size exponent {0} is below the minimum 64-bit leaf (must be 0 or in 6..=63)")]
    UniverseBelowLeafWidth(u8),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u8)]
enum ChildTag {
    Empty = 0x4,
    Full = 0x5,
    Inline = 0x7,
}

fn child_tag(slot: &Slot) -> ChildTag {
    match slot {
        Slot::Empty => ChildTag::Empty,
        Slot::Full => ChildTag::Full,
        Slot::Node(_) => ChildTag::Inline,
    }
}

fn log_size_byte(size: u64) -> u8 {
    if size == 0 {
        0
    } else {
        size.trailing_zeros() as u8
    }
}

/// Writes `bmt` in the tree-store format.
pub fn write_tree_store(bmt: &BitmapTree, sink: &mut dyn BitmapWriteSink) {
    let mut version_buf = [0u8; 2];
    LittleEndian::write_u16(&mut version_buf, 0);
    sink.write_all(&version_buf);

    let log_size = log_size_byte(bmt.size());
    match bmt.top() {
        Slot::Empty => sink.write_all(&[log_size | 0x80]),
        Slot::Full => sink.write_all(&[log_size | 0x80 | 0x40]),
        Slot::Node(_) => {
            sink.write_all(&[log_size]);
            write_node(bmt.top(), sink);
        }
    }
}

fn write_node(slot: &Slot, sink: &mut dyn BitmapWriteSink) {
    let node = match slot {
        Slot::Node(n) => n.as_ref(),
        _ => unreachable!("write_node is only ever called on an allocated node"),
    };
    match node {
        Node::Leaf { bits } => {
            let mut buf = [0u8; 8];
            LittleEndian::write_u64(&mut buf, *bits);
            sink.write_all(&[0x00]);
            sink.write_all(&buf);
        }
        Node::Interior { zero, one, .. } => {
            let zero_tag = child_tag(zero);
            let one_tag = child_tag(one);
            let byte = ((zero_tag as u8) << 4) | (one_tag as u8);
            sink.write_all(&[byte]);
            if zero_tag == ChildTag::Inline {
                write_node(zero, sink);
            }
            if one_tag == ChildTag::Inline {
                write_node(one, sink);
            }
        }
    }
}

/// Reads a tree in the tree-store format.
pub fn read_tree_store(source: &mut dyn BitmapReadSource) -> Result<BitmapTree, CodecError> {
    let mut header = [0u8; 2];
    read_exact(source, &mut header)?;
    let version = LittleEndian::read_u16(&header);
    if version != 0 {
        return Err(CodecError::UnsupportedVersion { version });
    }

    let mut flag_buf = [0u8; 1];
    read_exact(source, &mut flag_buf)?;
    let flag = flag_buf[0];
    let log_size = flag & 0x3f;
    let (size, levels) = if log_size == 0 {
        (0u64, 64 - LEAF_BITS)
    } else if u32::from(log_size) < LEAF_BITS {
        return Err(CodecError::UniverseBelowLeafWidth(log_size));
    } else {
        (1u64 << log_size, u32::from(log_size) - LEAF_BITS)
    };

    if flag & 0x80 != 0 {
        let top = if flag & 0x40 != 0 { Slot::Full } else { Slot::Empty };
        return Ok(BitmapTree::from_parts(size, levels, top));
    }

    let top = read_node(levels, source)?;
    Ok(BitmapTree::from_parts(size, levels, top))
}

fn read_exact(source: &mut dyn BitmapReadSource, buf: &mut [u8]) -> Result<(), CodecError> {
    let n = source.read(buf);
    if n != buf.len() {
        return Err(CodecError::ShortRead {
            expected: buf.len(),
            actual: n,
        });
    }
    Ok(())
}

fn read_node(level: u32, source: &mut dyn BitmapReadSource) -> Result<Slot, CodecError> {
    let mut tag_buf = [0u8; 1];
    read_exact(source, &mut tag_buf)?;
    let tag = tag_buf[0];

    if tag == 0 {
        if level > 0 {
            return Err(CodecError::LeafTagAtInteriorLevel { level });
        }
        let mut bits_buf = [0u8; 8];
        read_exact(source, &mut bits_buf)?;
        let bits = LittleEndian::read_u64(&bits_buf);
        return Ok(Slot::Node(Box::new(Node::Leaf { bits })));
    }

    if level == 0 {
        return Err(CodecError::InteriorTagAtLeafLevel);
    }

    let zero_tag = ChildTag::from_u8(tag >> 4).ok_or(CodecError::UnknownTag { tag })?;
    let one_tag = ChildTag::from_u8(tag & 0x0f).ok_or(CodecError::UnknownTag { tag })?;

    let zero = match zero_tag {
        ChildTag::Empty => Slot::Empty,
        ChildTag::Full => Slot::Full,
        ChildTag::Inline => read_node(level - 1, source)?,
    };
    let one = match one_tag {
        ChildTag::Empty => Slot::Empty,
        ChildTag::Full => Slot::Full,
        ChildTag::Inline => read_node(level - 1, source)?,
    };
    Ok(Slot::Node(Box::new(Node::Interior { level, zero, one })))
}
