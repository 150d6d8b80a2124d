use std::sync::Arc;

use super::{Cell, CellSlice, MAX_CELL_BITS, MAX_CELL_REFS};
use crate::address::TonAddress;
use crate::error::CellError;

/// Append-only writer producing a [`Cell`]. Every store checks the declared
/// bit width and the cell budget; nothing is silently truncated.
///
/// Store methods return `&mut Self` so fallible chains compose with `?`:
///
/// ```
/// # use tondeal_rs::cell::CellBuilder;
/// # fn demo() -> Result<(), tondeal_rs::error::CellError> {
/// let mut b = CellBuilder::new();
/// b.store_uint(0x0f8a7ea5, 32)?.store_uint(0, 64)?.store_coins(1_000_000_000)?;
/// let cell = b.build()?;
/// # Ok(()) }
/// ```
#[derive(Debug, Default)]
pub struct CellBuilder {
    data: Vec<u8>,
    bit_len: usize,
    refs: Vec<Arc<Cell>>,
}

impl CellBuilder {
    pub fn new() -> Self {
        CellBuilder::default()
    }

    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    pub fn spare_bits(&self) -> usize {
        MAX_CELL_BITS - self.bit_len
    }

    pub fn spare_refs(&self) -> usize {
        MAX_CELL_REFS - self.refs.len()
    }

    fn push_bit(&mut self, bit: bool) {
        if self.bit_len % 8 == 0 {
            self.data.push(0);
        }
        if bit {
            let last = self.data.len() - 1;
            self.data[last] |= 0x80 >> (self.bit_len % 8);
        }
        self.bit_len += 1;
    }

    fn ensure_capacity(&mut self, bits: usize) -> Result<(), CellError> {
        if self.bit_len + bits > MAX_CELL_BITS {
            return Err(CellError::DataOverflow {
                over: self.bit_len + bits - MAX_CELL_BITS,
            });
        }
        Ok(())
    }

    pub fn store_bit(&mut self, bit: bool) -> Result<&mut Self, CellError> {
        self.ensure_capacity(1)?;
        self.push_bit(bit);
        Ok(self)
    }

    /// Big-endian unsigned integer of up to 64 bits.
    pub fn store_uint(&mut self, value: u64, bits: usize) -> Result<&mut Self, CellError> {
        if bits > 64 || (bits < 64 && value >> bits != 0) {
            return Err(CellError::ValueOutOfRange {
                value: value.to_string(),
                bits,
            });
        }
        self.ensure_capacity(bits)?;
        for i in (0..bits).rev() {
            self.push_bit(value >> i & 1 != 0);
        }
        Ok(self)
    }

    /// Two's-complement signed integer of up to 257 bits. Values wider than
    /// 128 bits are sign-extended, which covers the chain's full `int257`
    /// range for every magnitude this SDK handles.
    pub fn store_int(&mut self, value: i128, bits: usize) -> Result<&mut Self, CellError> {
        if bits == 0 || bits > 257 {
            return Err(CellError::ValueOutOfRange {
                value: value.to_string(),
                bits,
            });
        }
        if bits < 128 {
            let min = -(1i128 << (bits - 1));
            let max = (1i128 << (bits - 1)) - 1;
            if value < min || value > max {
                return Err(CellError::ValueOutOfRange {
                    value: value.to_string(),
                    bits,
                });
            }
        }
        self.ensure_capacity(bits)?;
        let sign = value < 0;
        if bits > 128 {
            for _ in 0..bits - 128 {
                self.push_bit(sign);
            }
            for i in (0..128).rev() {
                self.push_bit(value >> i & 1 != 0);
            }
        } else {
            for i in (0..bits).rev() {
                self.push_bit(value >> i & 1 != 0);
            }
        }
        Ok(self)
    }

    /// Coin amount as VarUInteger 16: a 4-bit byte-length prefix followed by
    /// the minimal big-endian value. Caps at 120 bits of magnitude.
    pub fn store_coins(&mut self, value: u128) -> Result<&mut Self, CellError> {
        let byte_len = (16 - (value.leading_zeros() as usize / 8)).min(16);
        if byte_len > 15 {
            return Err(CellError::ValueOutOfRange {
                value: value.to_string(),
                bits: 120,
            });
        }
        self.ensure_capacity(4 + byte_len * 8)?;
        for i in (0..4).rev() {
            self.push_bit(byte_len >> i & 1 != 0);
        }
        for i in (0..byte_len * 8).rev() {
            self.push_bit(value >> i & 1 != 0);
        }
        Ok(self)
    }

    /// Standard two-component address: tag `10`, no anycast, signed 8-bit
    /// workchain, 256-bit hash part.
    pub fn store_address(&mut self, address: &TonAddress) -> Result<&mut Self, CellError> {
        self.ensure_capacity(2 + 1 + 8 + 256)?;
        self.push_bit(true);
        self.push_bit(false);
        self.push_bit(false);
        let wc = address.workchain as u8;
        for i in (0..8).rev() {
            self.push_bit(wc >> i & 1 != 0);
        }
        for byte in address.hash_part {
            for i in (0..8).rev() {
                self.push_bit(byte >> i & 1 != 0);
            }
        }
        Ok(self)
    }

    /// `addr_none` (two zero bits) when absent.
    pub fn store_address_opt(
        &mut self,
        address: Option<&TonAddress>,
    ) -> Result<&mut Self, CellError> {
        match address {
            Some(address) => self.store_address(address),
            None => {
                self.ensure_capacity(2)?;
                self.push_bit(false);
                self.push_bit(false);
                Ok(self)
            }
        }
    }

    pub fn store_bytes(&mut self, bytes: &[u8]) -> Result<&mut Self, CellError> {
        self.ensure_capacity(bytes.len() * 8)?;
        for byte in bytes {
            for i in (0..8).rev() {
                self.push_bit(byte >> i & 1 != 0);
            }
        }
        Ok(self)
    }

    /// A 1-bit presence flag followed by a reference when present.
    pub fn store_maybe_ref(&mut self, cell: Option<Cell>) -> Result<&mut Self, CellError> {
        match cell {
            Some(cell) => {
                self.store_bit(true)?;
                self.store_ref(cell)
            }
            None => self.store_bit(false),
        }
    }

    pub fn store_ref(&mut self, cell: Cell) -> Result<&mut Self, CellError> {
        self.store_ref_shared(Arc::new(cell))
    }

    pub fn store_ref_shared(&mut self, cell: Arc<Cell>) -> Result<&mut Self, CellError> {
        if self.refs.len() == MAX_CELL_REFS {
            return Err(CellError::RefOverflow);
        }
        self.refs.push(cell);
        Ok(self)
    }

    /// Append the remainder of a slice — bits and references — inline.
    pub fn store_slice(&mut self, slice: &CellSlice) -> Result<&mut Self, CellError> {
        let mut slice = slice.clone();
        self.ensure_capacity(slice.remaining_bits())?;
        while slice.remaining_bits() > 0 {
            let bit = slice.load_bit()?;
            self.push_bit(bit);
        }
        while slice.remaining_refs() > 0 {
            self.store_ref_shared(slice.load_ref()?)?;
        }
        Ok(self)
    }

    /// UTF-8 text stored tail-style: bytes fill this cell, the remainder
    /// chains through a trailing reference per cell.
    pub fn store_string_tail(&mut self, text: &str) -> Result<&mut Self, CellError> {
        super::store_snake_tail(self, text.as_bytes())?;
        Ok(self)
    }

    pub fn build(&self) -> Result<Cell, CellError> {
        Ok(Cell::new(
            self.data.clone(),
            self.bit_len,
            self.refs.clone(),
        ))
    }
}
