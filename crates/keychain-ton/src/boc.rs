//! Bag-of-cells deserialization.
//!
//! Parses the standard serialized cell format so callers can load a
//! contract code cell from its published BOC instead of relying on the
//! built-in hash constants. Only ordinary cells are supported; index
//! tables and trailing checksums are skipped, not verified.

use crate::cell::{Cell, MAX_REFS};
use crate::error::{Result, TonError};

/// Serialized bag-of-cells magic
const BOC_MAGIC: [u8; 4] = [0xb5, 0xee, 0x9c, 0x72];

/// Parse a bag of cells, returning its root cells in declared order.
pub fn parse(bytes: &[u8]) -> Result<Vec<Cell>> {
    let mut r = Reader::new(bytes);
    if r.take(4)? != BOC_MAGIC {
        return Err(TonError::InvalidBoc("bad magic".into()));
    }

    let flags = r.byte()?;
    let has_index = flags & 0x80 != 0;
    let has_crc = flags & 0x40 != 0;
    let ref_size = (flags & 0x07) as usize;
    if ref_size == 0 || ref_size > 4 {
        return Err(TonError::InvalidBoc(format!("reference size {}", ref_size)));
    }
    let off_size = r.byte()? as usize;
    if off_size == 0 || off_size > 8 {
        return Err(TonError::InvalidBoc(format!("offset size {}", off_size)));
    }

    let cell_count = r.uint(ref_size)? as usize;
    let root_count = r.uint(ref_size)? as usize;
    if r.uint(ref_size)? != 0 {
        return Err(TonError::InvalidBoc("absent cells unsupported".into()));
    }
    let _total_size = r.uint(off_size)?;

    let mut roots = Vec::with_capacity(root_count);
    for _ in 0..root_count {
        roots.push(r.uint(ref_size)? as usize);
    }
    if has_index {
        r.take(cell_count * off_size)?;
    }

    // First pass: raw cell bodies with forward reference indices.
    let mut raw = Vec::with_capacity(cell_count);
    for i in 0..cell_count {
        let d1 = r.byte()?;
        let d2 = r.byte()?;
        if d1 & 0x08 != 0 {
            return Err(TonError::InvalidBoc("exotic cells unsupported".into()));
        }
        let ref_count = (d1 & 0x07) as usize;
        if ref_count > MAX_REFS {
            return Err(TonError::InvalidBoc(format!("{} references", ref_count)));
        }

        let byte_len = ((d2 >> 1) + (d2 & 1)) as usize;
        let mut data = r.take(byte_len)?.to_vec();
        let bit_len = if d2 & 1 == 0 {
            byte_len * 8
        } else {
            strip_completion_marker(&mut data)?
        };

        let mut refs = Vec::with_capacity(ref_count);
        for _ in 0..ref_count {
            let idx = r.uint(ref_size)? as usize;
            if idx <= i || idx >= cell_count {
                return Err(TonError::InvalidBoc(format!(
                    "cell {} references {}",
                    i, idx
                )));
            }
            refs.push(idx);
        }
        raw.push((data, bit_len, refs));
    }
    if has_crc {
        r.take(4)?;
    }

    // Second pass: references always point forward, so building from the
    // back resolves every child before its parent.
    let mut cells: Vec<Option<Cell>> = vec![None; cell_count];
    for i in (0..cell_count).rev() {
        let (data, bit_len, ref_idxs) = &raw[i];
        let mut refs = Vec::with_capacity(ref_idxs.len());
        for &idx in ref_idxs {
            let child = cells[idx]
                .clone()
                .ok_or_else(|| TonError::InvalidBoc("dangling reference".into()))?;
            refs.push(child);
        }
        cells[i] = Some(Cell::Ordinary {
            data: data.clone(),
            bit_len: *bit_len,
            refs,
        });
    }

    roots
        .into_iter()
        .map(|idx| {
            cells
                .get(idx)
                .and_then(|c| c.clone())
                .ok_or_else(|| TonError::InvalidBoc("root index out of range".into()))
        })
        .collect()
}

/// An odd d2 means the last data byte ends with a 1 marker followed by
/// zeros. Returns the true bit length and clears the marker so parsed
/// cells compare equal to built ones.
fn strip_completion_marker(data: &mut [u8]) -> Result<usize> {
    let last = *data
        .last()
        .ok_or_else(|| TonError::InvalidBoc("padded cell with no data".into()))?;
    let trailing = last.trailing_zeros() as usize;
    if trailing >= 8 {
        return Err(TonError::InvalidBoc("missing completion marker".into()));
    }
    let idx = data.len() - 1;
    data[idx] &= !(1u8 << trailing);
    Ok(data.len() * 8 - trailing - 1)
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.pos + n > self.bytes.len() {
            return Err(TonError::InvalidBoc("truncated".into()));
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn byte(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn uint(&mut self, n: usize) -> Result<u64> {
        let mut value = 0u64;
        for byte in self.take(n)? {
            value = value << 8 | *byte as u64;
        }
        Ok(value)
    }
}
