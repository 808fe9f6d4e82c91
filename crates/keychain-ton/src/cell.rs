//! Cell model and representation hashing.
//!
//! Everything TON addresses is a tree of cells, and a contract address
//! is the representation hash of its `StateInit` cell. Only ordinary
//! level-0 cells appear in wallet state, so that is all this module
//! models. A referenced subtree whose body is not carried (well-known
//! contract code, for instance) can be represented by its published
//! hash and depth alone.

use sha2::{Digest, Sha256};

use crate::error::{Result, TonError};

/// Maximum data bits in an ordinary cell
pub const MAX_BITS: usize = 1023;

/// Maximum references per cell
pub const MAX_REFS: usize = 4;

/// An ordinary cell, or the exterior (hash, depth) of one whose body is
/// not materialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    /// Fully materialized cell
    Ordinary {
        /// Packed data bits, most significant bit first
        data: Vec<u8>,
        /// Number of meaningful bits in `data`
        bit_len: usize,
        /// Referenced child cells
        refs: Vec<Cell>,
    },
    /// Hash and depth of a cell carried by reference only
    Exterior {
        hash: [u8; 32],
        depth: u16,
    },
}

impl Cell {
    /// Reference a cell known only by its representation hash and depth.
    pub fn exterior(hash: [u8; 32], depth: u16) -> Self {
        Cell::Exterior { hash, depth }
    }

    /// Tree depth: 0 for leaves, 1 + the deepest reference otherwise.
    pub fn depth(&self) -> u16 {
        match self {
            Cell::Exterior { depth, .. } => *depth,
            Cell::Ordinary { refs, .. } => refs
                .iter()
                .map(|r| r.depth().saturating_add(1))
                .max()
                .unwrap_or(0),
        }
    }

    /// Representation hash: sha256 over the descriptor bytes, the
    /// augmented data, each reference's depth, then each reference's
    /// hash, in that order.
    pub fn repr_hash(&self) -> [u8; 32] {
        match self {
            Cell::Exterior { hash, .. } => *hash,
            Cell::Ordinary { data, bit_len, refs } => {
                let mut hasher = Sha256::new();
                hasher.update([refs.len() as u8, descriptor_d2(*bit_len)]);
                hasher.update(augmented(data, *bit_len));
                for r in refs {
                    hasher.update(r.depth().to_be_bytes());
                }
                for r in refs {
                    hasher.update(r.repr_hash());
                }
                hasher.finalize().into()
            }
        }
    }
}

/// Second descriptor byte: floor(bits / 8) + ceil(bits / 8). An odd
/// value marks a cell whose last data byte carries padding.
pub(crate) fn descriptor_d2(bit_len: usize) -> u8 {
    (bit_len / 8 + bit_len.div_ceil(8)) as u8
}

/// Data bytes with the completion marker: a single 1 bit after the data
/// when the bit length is not byte-aligned.
fn augmented(data: &[u8], bit_len: usize) -> Vec<u8> {
    let mut out = data.to_vec();
    if bit_len % 8 != 0 {
        let last = out.len() - 1;
        out[last] |= 0x80 >> (bit_len % 8);
    }
    out
}

/// Incremental bit-level cell builder.
#[derive(Debug, Default)]
pub struct CellBuilder {
    data: Vec<u8>,
    bit_len: usize,
    refs: Vec<Cell>,
}

impl CellBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a single bit.
    pub fn store_bit(mut self, bit: bool) -> Result<Self> {
        if self.bit_len + 1 > MAX_BITS {
            return Err(TonError::CellOverflow(self.bit_len + 1));
        }
        if self.bit_len % 8 == 0 {
            self.data.push(0);
        }
        if bit {
            let last = self.data.len() - 1;
            self.data[last] |= 0x80 >> (self.bit_len % 8);
        }
        self.bit_len += 1;
        Ok(self)
    }

    /// Append a 32-bit big-endian unsigned integer.
    pub fn store_u32(mut self, value: u32) -> Result<Self> {
        for i in (0..32).rev() {
            self = self.store_bit(value >> i & 1 == 1)?;
        }
        Ok(self)
    }

    /// Append whole bytes.
    pub fn store_bytes(mut self, bytes: &[u8]) -> Result<Self> {
        for byte in bytes {
            for i in (0..8).rev() {
                self = self.store_bit(byte >> i & 1 == 1)?;
            }
        }
        Ok(self)
    }

    /// Attach a referenced child cell.
    pub fn store_ref(mut self, cell: Cell) -> Result<Self> {
        if self.refs.len() == MAX_REFS {
            return Err(TonError::TooManyRefs);
        }
        self.refs.push(cell);
        Ok(self)
    }

    pub fn build(self) -> Cell {
        Cell::Ordinary {
            data: self.data,
            bit_len: self.bit_len,
            refs: self.refs,
        }
    }
}
