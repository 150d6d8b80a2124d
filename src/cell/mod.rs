//! The chain's native binary container: a tree of cells, each holding up to
//! 1023 data bits and up to 4 references to child cells. Everything that
//! crosses the wire — message bodies, contract data, getter arguments — is a
//! cell tree, and contract addresses are representation hashes of cell trees.

use std::fmt;
use std::sync::Arc;

use sha2::{Digest, Sha256};

mod builder;
mod dict;
mod slice;

pub use builder::CellBuilder;
pub use dict::{build_dict, parse_dict};
pub use slice::CellSlice;

use crate::error::CellError;

pub const MAX_CELL_BITS: usize = 1023;
pub const MAX_CELL_REFS: usize = 4;

/// An immutable cell. Build one with [`CellBuilder`], read it with
/// [`CellSlice`].
#[derive(Clone, PartialEq, Eq)]
pub struct Cell {
    data: Vec<u8>,
    bit_len: usize,
    refs: Vec<Arc<Cell>>,
}

impl Cell {
    pub(crate) fn new(data: Vec<u8>, bit_len: usize, refs: Vec<Arc<Cell>>) -> Self {
        debug_assert!(bit_len <= MAX_CELL_BITS);
        debug_assert!(refs.len() <= MAX_CELL_REFS);
        debug_assert_eq!(data.len(), bit_len.div_ceil(8));
        Cell {
            data,
            bit_len,
            refs,
        }
    }

    pub fn empty() -> Self {
        Cell::new(Vec::new(), 0, Vec::new())
    }

    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn refs(&self) -> &[Arc<Cell>] {
        &self.refs
    }

    pub fn parse(&self) -> CellSlice {
        CellSlice::new(Arc::new(self.clone()))
    }

    pub(crate) fn bit(&self, index: usize) -> bool {
        self.data[index / 8] & (0x80 >> (index % 8)) != 0
    }

    /// Height of the reference tree below this cell.
    pub fn depth(&self) -> u16 {
        self.refs
            .iter()
            .map(|r| r.depth() + 1)
            .max()
            .unwrap_or(0)
    }

    /// The standard representation hash: SHA-256 over the two descriptor
    /// bytes, the completion-tagged data, then each child's depth and each
    /// child's representation hash. This is what the chain content-addresses
    /// contracts by.
    pub fn repr_hash(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        // d1: reference count (ordinary cell, level 0); d2: data length
        // descriptor, odd when a completion tag is present.
        let d1 = self.refs.len() as u8;
        let d2 = (self.bit_len / 8 + self.bit_len.div_ceil(8)) as u8;
        hasher.update([d1, d2]);

        let mut data = self.data.clone();
        if self.bit_len % 8 != 0 {
            // Completion tag: a single 1 bit right after the payload.
            let tail = self.bit_len % 8;
            let last = data.len() - 1;
            data[last] &= !(0xffu8 >> tail);
            data[last] |= 0x80 >> tail;
        }
        hasher.update(&data);

        for child in &self.refs {
            hasher.update(child.depth().to_be_bytes());
        }
        for child in &self.refs {
            hasher.update(child.repr_hash());
        }
        hasher.finalize().into()
    }
}

impl fmt::Debug for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cell{{{}b", self.bit_len)?;
        if !self.data.is_empty() {
            write!(f, " {}", hex::encode(&self.data))?;
        }
        for child in &self.refs {
            write!(f, " -> {:?}", child)?;
        }
        write!(f, "}}")
    }
}

/// Chunked ("snake") encoding of an arbitrarily long byte string: whole
/// bytes fill the current cell, the remainder chains through its single
/// trailing reference.
pub(crate) fn store_snake_tail(builder: &mut CellBuilder, data: &[u8]) -> Result<(), CellError> {
    let head = data.len().min(builder.spare_bits() / 8);
    builder.store_bytes(&data[..head])?;
    let rest = &data[head..];
    if !rest.is_empty() {
        let mut child = CellBuilder::new();
        store_snake_tail(&mut child, rest)?;
        builder.store_ref(child.build()?)?;
    }
    Ok(())
}

pub(crate) fn load_snake_tail(slice: &mut CellSlice, out: &mut Vec<u8>) -> Result<(), CellError> {
    let whole_bytes = slice.remaining_bits() / 8;
    out.extend_from_slice(&slice.load_bytes(whole_bytes)?);
    if slice.remaining_refs() > 0 {
        let mut next = slice.load_ref()?.parse();
        load_snake_tail(&mut next, out)?;
    }
    Ok(())
}
