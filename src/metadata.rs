//! On-chain token/NFT content cells: a dictionary keyed by the SHA-256 of
//! each field name, values snake-encoded with a leading format tag. The
//! reading side addresses fields by hash, never by name, so both directions
//! live here to stay in agreement.

use std::collections::{BTreeMap, HashMap};

use itertools::Itertools;
use sha2::{Digest, Sha256};

use crate::cell::{Cell, CellBuilder, build_dict, parse_dict};
use crate::error::{CellError, CodecError};

/// Content-kind tags per the on-chain content standard.
const ONCHAIN_CONTENT_PREFIX: u8 = 0x00;
const OFFCHAIN_CONTENT_PREFIX: u8 = 0x01;
/// Snake values carry their own leading format byte.
const SNAKE_PREFIX: u8 = 0x00;

/// Field names the standard wallets understand.
pub const STANDARD_KEYS: &[&str] = &[
    "name",
    "description",
    "symbol",
    "image",
    "image_data",
    "decimals",
];

fn key_hash(key: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hasher.finalize().into()
}

fn snake_value(value: &str) -> Result<Cell, CellError> {
    let mut bytes = Vec::with_capacity(value.len() + 1);
    bytes.push(SNAKE_PREFIX);
    bytes.extend_from_slice(value.as_bytes());
    let mut builder = CellBuilder::new();
    crate::cell::store_snake_tail(&mut builder, &bytes)?;
    builder.build()
}

/// Build the canonical on-chain content cell for a field map. Pure and
/// deterministic: keys are hashed and inserted in sorted order, so the same
/// map always yields a byte-identical cell.
pub fn build_onchain_metadata(fields: &HashMap<String, String>) -> Result<Cell, CodecError> {
    let entries: BTreeMap<[u8; 32], Cell> = fields
        .iter()
        .sorted_by(|a, b| a.0.cmp(b.0))
        .map(|(key, value)| Ok((key_hash(key), snake_value(value)?)))
        .collect::<Result<_, CellError>>()
        .map_err(CodecError::Encode)?;

    let root = build_dict(&entries).map_err(CodecError::Encode)?;
    let mut builder = CellBuilder::new();
    builder
        .store_uint(ONCHAIN_CONTENT_PREFIX as u64, 8)
        .and_then(|b| b.store_maybe_ref(root))
        .map_err(CodecError::Encode)?;
    builder.build().map_err(CodecError::Encode)
}

/// Read named fields back out of an on-chain content cell. Only the asked
/// field names can be recovered — the dictionary stores hashes, not names.
pub fn parse_onchain_metadata(
    content: &Cell,
    field_names: &[&str],
) -> Result<BTreeMap<String, String>, CodecError> {
    let mut slice = content.parse();
    let prefix = slice.load_uint(8).map_err(CodecError::Decode)? as u8;
    if prefix != ONCHAIN_CONTENT_PREFIX {
        return Err(CodecError::InvalidField(format!(
            "not an on-chain content cell (prefix {prefix:#04x})"
        )));
    }

    let mut out = BTreeMap::new();
    let Some(root) = slice.load_maybe_ref().map_err(CodecError::Decode)? else {
        return Ok(out);
    };
    let entries = parse_dict(&root).map_err(CodecError::Decode)?;

    for &name in field_names {
        if let Some(value) = entries.get(&key_hash(name)) {
            let text = value
                .parse()
                .load_string_tail()
                .map_err(CodecError::Decode)?;
            let text = text
                .strip_prefix(SNAKE_PREFIX as char)
                .ok_or_else(|| {
                    CodecError::InvalidField(format!("field `{name}` is not snake-tagged"))
                })?
                .to_string();
            out.insert(name.to_string(), text);
        }
    }
    Ok(out)
}

/// Off-chain content: a format tag byte and the URL, tail-chained.
pub fn encode_offchain_content(url: &str) -> Result<Cell, CodecError> {
    let mut bytes = Vec::with_capacity(url.len() + 1);
    bytes.push(OFFCHAIN_CONTENT_PREFIX);
    bytes.extend_from_slice(url.as_bytes());
    let mut builder = CellBuilder::new();
    crate::cell::store_snake_tail(&mut builder, &bytes).map_err(CodecError::Encode)?;
    builder.build().map_err(CodecError::Encode)
}
