use std::sync::Arc;

use super::Cell;
use crate::address::TonAddress;
use crate::error::CellError;

/// A read cursor over one cell. Loads mirror the builder's stores; running
/// past the end surfaces the same structural-shortfall condition the
/// contracts reject with on-chain.
#[derive(Debug, Clone)]
pub struct CellSlice {
    cell: Arc<Cell>,
    bit_pos: usize,
    ref_pos: usize,
}

impl CellSlice {
    pub(crate) fn new(cell: Arc<Cell>) -> Self {
        CellSlice {
            cell,
            bit_pos: 0,
            ref_pos: 0,
        }
    }

    pub fn remaining_bits(&self) -> usize {
        self.cell.bit_len() - self.bit_pos
    }

    pub fn remaining_refs(&self) -> usize {
        self.cell.refs().len() - self.ref_pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining_bits() == 0 && self.remaining_refs() == 0
    }

    fn take_bits(&mut self, wanted: usize) -> Result<(), CellError> {
        if wanted > self.remaining_bits() {
            return Err(CellError::DataUnderflow {
                wanted,
                available: self.remaining_bits(),
            });
        }
        Ok(())
    }

    pub fn load_bit(&mut self) -> Result<bool, CellError> {
        self.take_bits(1)?;
        let bit = self.cell.bit(self.bit_pos);
        self.bit_pos += 1;
        Ok(bit)
    }

    pub fn load_uint(&mut self, bits: usize) -> Result<u64, CellError> {
        debug_assert!(bits <= 64);
        self.take_bits(bits)?;
        let mut value = 0u64;
        for _ in 0..bits {
            value = value << 1 | self.load_bit()? as u64;
        }
        Ok(value)
    }

    pub fn load_int(&mut self, bits: usize) -> Result<i128, CellError> {
        debug_assert!(bits > 0 && bits <= 257);
        self.take_bits(bits)?;
        let sign = self.load_bit()?;
        let mut value: i128 = if sign { -1 } else { 0 };
        for _ in 1..bits {
            // Sign-extension bits carry no magnitude; shifting -1 or 0 left
            // keeps them absorbed. Magnitudes beyond i128 are outside every
            // field this SDK decodes and are reported, not wrapped.
            value = value
                .checked_mul(2)
                .ok_or(CellError::ValueOutOfRange {
                    value: "int257 magnitude beyond 127 bits".into(),
                    bits,
                })?
                | self.load_bit()? as i128;
        }
        Ok(value)
    }

    pub fn load_coins(&mut self) -> Result<u128, CellError> {
        let byte_len = self.load_uint(4)? as usize;
        self.take_bits(byte_len * 8)?;
        let mut value = 0u128;
        for _ in 0..byte_len * 8 {
            value = value << 1 | self.load_bit()? as u128;
        }
        Ok(value)
    }

    pub fn load_address(&mut self) -> Result<TonAddress, CellError> {
        match self.load_address_opt()? {
            Some(address) => Ok(address),
            None => Err(CellError::BadAddressTag { tag: 0b00 }),
        }
    }

    pub fn load_address_opt(&mut self) -> Result<Option<TonAddress>, CellError> {
        let tag = self.load_uint(2)? as u8;
        match tag {
            0b00 => Ok(None),
            0b10 => {
                let anycast = self.load_bit()?;
                if anycast {
                    return Err(CellError::BadAddressTag { tag });
                }
                let workchain = self.load_uint(8)? as u8 as i8;
                let mut hash_part = [0u8; 32];
                let bytes = self.load_bytes(32)?;
                hash_part.copy_from_slice(&bytes);
                Ok(Some(TonAddress::new(workchain, hash_part)))
            }
            other => Err(CellError::BadAddressTag { tag: other }),
        }
    }

    pub fn load_bytes(&mut self, len: usize) -> Result<Vec<u8>, CellError> {
        self.take_bits(len * 8)?;
        let mut out = Vec::with_capacity(len);
        for _ in 0..len {
            let mut byte = 0u8;
            for _ in 0..8 {
                byte = byte << 1 | self.load_bit()? as u8;
            }
            out.push(byte);
        }
        Ok(out)
    }

    pub fn load_ref(&mut self) -> Result<Arc<Cell>, CellError> {
        let cell = self
            .cell
            .refs()
            .get(self.ref_pos)
            .cloned()
            .ok_or(CellError::RefUnderflow)?;
        self.ref_pos += 1;
        Ok(cell)
    }

    pub fn load_maybe_ref(&mut self) -> Result<Option<Arc<Cell>>, CellError> {
        if self.load_bit()? {
            Ok(Some(self.load_ref()?))
        } else {
            Ok(None)
        }
    }

    /// Inverse of [`super::CellBuilder::store_string_tail`]: the remaining
    /// whole bytes plus everything chained through trailing references.
    pub fn load_string_tail(&mut self) -> Result<String, CellError> {
        let mut bytes = Vec::new();
        super::load_snake_tail(self, &mut bytes)?;
        String::from_utf8(bytes)
            .map_err(|e| CellError::BadDictionary(format!("non-UTF-8 string tail: {e}")))
    }

    /// Remaining bits and refs as a standalone cell.
    pub fn to_cell(&self) -> Result<Cell, CellError> {
        let mut builder = super::CellBuilder::new();
        builder.store_slice(self)?;
        builder.build()
    }
}
