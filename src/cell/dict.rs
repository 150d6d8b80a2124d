//! Canonical hashmap cells with fixed 256-bit keys and cell values stored
//! as leaf references — the shape on-chain token metadata dictionaries use.
//! Building always emits the canonical (shortest) edge-label encoding, so a
//! given map has exactly one byte representation.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::{Cell, CellBuilder, CellSlice};
use crate::error::CellError;

const KEY_BITS: usize = 256;

fn key_bit(key: &[u8; 32], index: usize) -> bool {
    key[index / 8] & (0x80 >> (index % 8)) != 0
}

fn len_bits(n: usize) -> usize {
    // ⌈log2(n + 1)⌉
    (usize::BITS - n.leading_zeros()) as usize
}

fn store_label(
    builder: &mut CellBuilder,
    label: &[bool],
    n: usize,
) -> Result<(), CellError> {
    let len = label.len();
    let l = len_bits(n);
    let short_size = 1 + (len + 1) + len;
    let long_size = 2 + l + len;
    let same = len > 0 && label.iter().all(|&b| b == label[0]);
    let same_size = 3 + 1 + l;

    if same && same_size < short_size && same_size < long_size {
        builder.store_uint(0b110, 3)?;
        builder.store_bit(label[0])?;
        builder.store_uint(len as u64, l)?;
    } else if short_size <= long_size {
        builder.store_bit(false)?;
        for _ in 0..len {
            builder.store_bit(true)?;
        }
        builder.store_bit(false)?;
        for &bit in label {
            builder.store_bit(bit)?;
        }
    } else {
        builder.store_uint(0b10, 2)?;
        builder.store_uint(len as u64, l)?;
        for &bit in label {
            builder.store_bit(bit)?;
        }
    }
    Ok(())
}

fn load_label(slice: &mut CellSlice, n: usize) -> Result<Vec<bool>, CellError> {
    let l = len_bits(n);
    if !slice.load_bit()? {
        // hml_short: unary length, then the bits.
        let mut len = 0;
        while slice.load_bit()? {
            len += 1;
        }
        let mut label = Vec::with_capacity(len);
        for _ in 0..len {
            label.push(slice.load_bit()?);
        }
        Ok(label)
    } else if !slice.load_bit()? {
        // hml_long
        let len = slice.load_uint(l)? as usize;
        let mut label = Vec::with_capacity(len);
        for _ in 0..len {
            label.push(slice.load_bit()?);
        }
        Ok(label)
    } else {
        // hml_same
        let bit = slice.load_bit()?;
        let len = slice.load_uint(l)? as usize;
        Ok(vec![bit; len])
    }
}

fn build_edge(entries: &[(&[u8; 32], &Cell)], pos: usize) -> Result<Cell, CellError> {
    debug_assert!(!entries.is_empty());
    let n = KEY_BITS - pos;

    let mut label = Vec::new();
    'outer: for i in 0..n {
        let bit = key_bit(entries[0].0, pos + i);
        for (key, _) in &entries[1..] {
            if key_bit(key, pos + i) != bit {
                break 'outer;
            }
        }
        label.push(bit);
    }

    let mut builder = CellBuilder::new();
    store_label(&mut builder, &label, n)?;

    if label.len() == n {
        debug_assert_eq!(entries.len(), 1);
        builder.store_ref(entries[0].1.clone())?;
    } else {
        let split = pos + label.len();
        let pivot = entries.partition_point(|(key, _)| !key_bit(key, split));
        let (left, right) = entries.split_at(pivot);
        if left.is_empty() || right.is_empty() {
            return Err(CellError::BadDictionary(
                "edge split produced an empty branch".into(),
            ));
        }
        builder.store_ref(build_edge(left, split + 1)?)?;
        builder.store_ref(build_edge(right, split + 1)?)?;
    }
    builder.build()
}

/// Build the dictionary's root edge cell. `None` for an empty map — stored
/// on the wire as a cleared presence bit with no reference allocated.
pub fn build_dict(entries: &BTreeMap<[u8; 32], Cell>) -> Result<Option<Cell>, CellError> {
    if entries.is_empty() {
        return Ok(None);
    }
    let flat: Vec<(&[u8; 32], &Cell)> = entries.iter().collect();
    Ok(Some(build_edge(&flat, 0)?))
}

fn parse_edge(
    cell: &Arc<Cell>,
    prefix: &mut Vec<bool>,
    out: &mut BTreeMap<[u8; 32], Arc<Cell>>,
) -> Result<(), CellError> {
    let mut slice = CellSlice::new(cell.clone());
    let label = load_label(&mut slice, KEY_BITS - prefix.len())?;
    let depth = prefix.len();
    prefix.extend_from_slice(&label);
    if prefix.len() > KEY_BITS {
        return Err(CellError::BadDictionary("label overruns the key width".into()));
    }

    if prefix.len() == KEY_BITS {
        let mut key = [0u8; 32];
        for (i, &bit) in prefix.iter().enumerate() {
            if bit {
                key[i / 8] |= 0x80 >> (i % 8);
            }
        }
        out.insert(key, slice.load_ref()?);
    } else {
        let left = slice.load_ref()?;
        let right = slice.load_ref()?;
        prefix.push(false);
        parse_edge(&left, prefix, out)?;
        prefix.pop();
        prefix.push(true);
        parse_edge(&right, prefix, out)?;
        prefix.pop();
    }
    prefix.truncate(depth);
    Ok(())
}

/// Inverse of [`build_dict`] over a root edge cell.
pub fn parse_dict(root: &Cell) -> Result<BTreeMap<[u8; 32], Arc<Cell>>, CellError> {
    let mut out = BTreeMap::new();
    let mut prefix = Vec::with_capacity(KEY_BITS);
    parse_edge(&Arc::new(root.clone()), &mut prefix, &mut out)?;
    Ok(out)
}
