//! Account addresses and deterministic derivation from contract
//! initialization data.

use std::fmt;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::{URL_SAFE_NO_PAD, STANDARD_NO_PAD};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::cell::{Cell, CellBuilder};
use crate::error::CellError;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressParseError {
    #[error("expected `workchain:hex64` or a 48-character friendly form")]
    BadFormat,
    #[error("unknown address tag byte {0:#04x}")]
    BadTag(u8),
    #[error("checksum mismatch")]
    BadChecksum,
}

/// A two-component account address: signed workchain id plus the 256-bit
/// hash part (for deployed contracts, the representation hash of their
/// initial state).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TonAddress {
    pub workchain: i8,
    pub hash_part: [u8; 32],
}

const TAG_BOUNCEABLE: u8 = 0x11;
const TAG_NON_BOUNCEABLE: u8 = 0x51;
const TAG_TESTNET: u8 = 0x80;

impl TonAddress {
    pub fn new(workchain: i8, hash_part: [u8; 32]) -> Self {
        TonAddress {
            workchain,
            hash_part,
        }
    }

    /// Raw form, e.g. `0:3f…aa`.
    pub fn to_raw(&self) -> String {
        format!("{}:{}", self.workchain, hex::encode(self.hash_part))
    }

    /// User-friendly form: 36 bytes (tag, workchain, hash, CRC16) in
    /// url-safe base64.
    pub fn to_friendly(&self, bounceable: bool) -> String {
        let mut bytes = [0u8; 36];
        bytes[0] = if bounceable {
            TAG_BOUNCEABLE
        } else {
            TAG_NON_BOUNCEABLE
        };
        bytes[1] = self.workchain as u8;
        bytes[2..34].copy_from_slice(&self.hash_part);
        let crc = crc16_xmodem(&bytes[..34]);
        bytes[34..36].copy_from_slice(&crc.to_be_bytes());
        URL_SAFE_NO_PAD.encode(bytes)
    }
}

/// CRC16/XMODEM — the checksum the friendly address form carries.
fn crc16_xmodem(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                crc << 1 ^ 0x1021
            } else {
                crc << 1
            };
        }
    }
    crc
}

impl fmt::Display for TonAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_friendly(true))
    }
}

impl fmt::Debug for TonAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_raw())
    }
}

impl FromStr for TonAddress {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some((wc, hash)) = s.split_once(':') {
            let workchain: i8 = wc.parse().map_err(|_| AddressParseError::BadFormat)?;
            let bytes = hex::decode(hash).map_err(|_| AddressParseError::BadFormat)?;
            let hash_part: [u8; 32] =
                bytes.try_into().map_err(|_| AddressParseError::BadFormat)?;
            return Ok(TonAddress::new(workchain, hash_part));
        }

        let bytes = URL_SAFE_NO_PAD
            .decode(s)
            .or_else(|_| STANDARD_NO_PAD.decode(s))
            .map_err(|_| AddressParseError::BadFormat)?;
        let bytes: [u8; 36] = bytes.try_into().map_err(|_| AddressParseError::BadFormat)?;

        let tag = bytes[0] & !TAG_TESTNET;
        if tag != TAG_BOUNCEABLE && tag != TAG_NON_BOUNCEABLE {
            return Err(AddressParseError::BadTag(bytes[0]));
        }
        let crc = crc16_xmodem(&bytes[..34]);
        if crc.to_be_bytes() != bytes[34..36] {
            return Err(AddressParseError::BadChecksum);
        }
        let mut hash_part = [0u8; 32];
        hash_part.copy_from_slice(&bytes[2..34]);
        Ok(TonAddress::new(bytes[1] as i8, hash_part))
    }
}

impl Serialize for TonAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_friendly(true))
    }
}

impl<'de> Deserialize<'de> for TonAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A contract's initial (code, data) pair. Its representation hash is the
/// contract's address — computable before anything is deployed, which is
/// what lets a router target an escrow instance that does not exist yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateInit {
    pub code: Cell,
    pub data: Cell,
}

impl StateInit {
    pub fn new(code: Cell, data: Cell) -> Self {
        StateInit { code, data }
    }

    /// The standard state-init cell: no split depth, not special, code and
    /// data references present, empty library dictionary.
    pub fn to_cell(&self) -> Result<Cell, CellError> {
        let mut builder = CellBuilder::new();
        builder
            .store_bit(false)?
            .store_bit(false)?
            .store_bit(true)?
            .store_bit(true)?
            .store_bit(false)?;
        builder.store_ref(self.code.clone())?;
        builder.store_ref(self.data.clone())?;
        builder.build()
    }

    /// Deterministic content-addressed account address. Pure: identical
    /// inputs always derive the identical address.
    pub fn derive_address(&self, workchain: i8) -> Result<TonAddress, CellError> {
        Ok(TonAddress::new(workchain, self.to_cell()?.repr_hash()))
    }
}
