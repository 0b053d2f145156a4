//! Bit Field Access for UCI Payloads
//!
//! UCI payloads delivered by the PHY address bit `n` at `payload[n / 8] >> (n % 8)`,
//! i.e. LSB first within each byte. Every field inside the payload is transmitted
//! MSB first, so reading a field reverses the order of the addressed bits.

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Errors raised while walking a bit payload
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BitError {
    #[error("field of {requested} bits at offset {position} overruns payload of {bit_len} bits")]
    Overrun {
        requested: usize,
        position: usize,
        bit_len: usize,
    },

    #[error("field width {0} exceeds 32 bits")]
    FieldTooWide(usize),
}

/// Sequential reader over the bit fields of a UCI payload
#[derive(Debug, Clone)]
pub struct BitCursor<'a> {
    payload: &'a [u8],
    bit_len: usize,
    pos: usize,
}

impl<'a> BitCursor<'a> {
    /// Create a cursor over the first `bit_len` bits of `payload`
    pub fn new(payload: &'a [u8], bit_len: usize) -> Self {
        Self {
            payload,
            bit_len: bit_len.min(payload.len() * 8),
            pos: 0,
        }
    }

    /// Current bit offset
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bits left before the end of the payload
    pub fn remaining(&self) -> usize {
        self.bit_len - self.pos
    }

    /// Read an `n`-bit field and advance past it
    pub fn read_bits(&mut self, n: usize) -> Result<u32, BitError> {
        let value = self.peek_bits(n)?;
        self.pos += n;
        Ok(value)
    }

    /// Read an `n`-bit field without advancing
    pub fn peek_bits(&self, n: usize) -> Result<u32, BitError> {
        if n > 32 {
            return Err(BitError::FieldTooWide(n));
        }
        if self.pos + n > self.bit_len {
            return Err(BitError::Overrun {
                requested: n,
                position: self.pos,
                bit_len: self.bit_len,
            });
        }
        let mut value = 0u32;
        for i in 0..n {
            let bit = self.pos + i;
            let b = (self.payload[bit / 8] >> (bit % 8)) & 0x01;
            value |= (b as u32) << (n - i - 1);
        }
        Ok(value)
    }

    /// Move to absolute bit offset `pos`
    pub fn seek(&mut self, pos: usize) -> Result<(), BitError> {
        if pos > self.bit_len {
            return Err(BitError::Overrun {
                requested: pos.saturating_sub(self.pos),
                position: self.pos,
                bit_len: self.bit_len,
            });
        }
        self.pos = pos;
        Ok(())
    }

    /// Advance over `n` bits without interpreting them
    pub fn skip(&mut self, n: usize) -> Result<(), BitError> {
        if self.pos + n > self.bit_len {
            return Err(BitError::Overrun {
                requested: n,
                position: self.pos,
                bit_len: self.bit_len,
            });
        }
        self.pos += n;
        Ok(())
    }
}

/// Builds payloads in the same layout [`BitCursor`] reads
#[derive(Debug, Default)]
pub struct BitPacker {
    buf: BytesMut,
    bit_len: usize,
}

impl BitPacker {
    /// Create an empty packer
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the low `n` bits of `value`, MSB first
    pub fn write_bits(&mut self, value: u32, n: usize) -> &mut Self {
        for i in 0..n {
            let b = (value >> (n - i - 1)) & 0x01;
            if self.bit_len % 8 == 0 {
                self.buf.put_u8(0);
            }
            if b != 0 {
                let idx = self.bit_len / 8;
                self.buf[idx] |= 1 << (self.bit_len % 8);
            }
            self.bit_len += 1;
        }
        self
    }

    /// Append `n` zero bits
    pub fn pad(&mut self, n: usize) -> &mut Self {
        self.write_bits(0, n)
    }

    /// Number of bits written so far
    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    /// Finish and return the payload with its bit length
    pub fn finish(self) -> (Bytes, usize) {
        (self.buf.freeze(), self.bit_len)
    }
}
