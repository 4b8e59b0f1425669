//! Growable MSB-first bit sequence.
//!
//! Bits are appended and read most-significant first, so a sequence built
//! with `append_bits(2, 2); append_bits(0, 1); append_bits(1, 5)` packs to
//! the single byte `0b10_0_00001`. Used to assemble bit-packed protocol
//! headers and by codecs that work below byte granularity.

use crate::error::{Result, StrandError};

/// A sequence of bits with an independent read cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BitSequence {
    bytes: Vec<u8>,
    len: usize,
    read_pos: usize,
}

impl BitSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Room for `bits` bits without reallocating.
    pub fn with_capacity(bits: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(bits.div_ceil(8)),
            len: 0,
            read_pos: 0,
        }
    }

    /// Take `bit_len` bits from `bytes`.
    pub fn from_bytes(bytes: &[u8], bit_len: usize) -> Result<Self> {
        if bit_len > bytes.len() * 8 {
            return Err(StrandError::Other(format!(
                "bit length {bit_len} exceeds {} available bits",
                bytes.len() * 8
            )));
        }
        let mut bytes = bytes[..bit_len.div_ceil(8)].to_vec();
        if bit_len % 8 != 0 {
            if let Some(last) = bytes.last_mut() {
                *last &= 0xFF << (8 - bit_len % 8);
            }
        }
        Ok(Self {
            bytes,
            len: bit_len,
            read_pos: 0,
        })
    }

    /// Number of bits in the sequence.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bits left between the read cursor and the end.
    pub fn remaining(&self) -> usize {
        self.len - self.read_pos
    }

    /// The packed bytes; unused low bits of the last byte are zero.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn append_bit(&mut self, bit: bool) {
        if self.len % 8 == 0 {
            self.bytes.push(0);
        }
        if bit {
            let idx = self.len / 8;
            self.bytes[idx] |= 0x80 >> (self.len % 8);
        }
        self.len += 1;
    }

    /// Append the low `count` bits of `value`, most significant first.
    pub fn append_bits(&mut self, value: u64, count: u32) -> Result<()> {
        if count > 64 {
            return Err(StrandError::Other(format!("cannot append {count} bits at once")));
        }
        if count < 64 && value >> count != 0 {
            return Err(StrandError::Other(format!(
                "value {value:#x} does not fit in {count} bits"
            )));
        }
        for shift in (0..count).rev() {
            self.append_bit((value >> shift) & 1 == 1);
        }
        Ok(())
    }

    /// Value of the bit at `index`.
    pub fn bit(&self, index: usize) -> Option<bool> {
        (index < self.len).then(|| self.bytes[index / 8] & (0x80 >> (index % 8)) != 0)
    }

    pub fn set_bit(&mut self, index: usize, value: bool) -> Result<()> {
        if index >= self.len {
            return Err(StrandError::Other(format!(
                "bit index {index} out of range for length {}",
                self.len
            )));
        }
        let mask = 0x80 >> (index % 8);
        if value {
            self.bytes[index / 8] |= mask;
        } else {
            self.bytes[index / 8] &= !mask;
        }
        Ok(())
    }

    /// Read the next `count` bits as an unsigned value.
    pub fn read_bits(&mut self, count: u32) -> Result<u64> {
        if count > 64 {
            return Err(StrandError::Other(format!("cannot read {count} bits at once")));
        }
        if count as usize > self.remaining() {
            return Err(StrandError::EndOfStream);
        }
        let mut value = 0u64;
        for _ in 0..count {
            let bit = self.bytes[self.read_pos / 8] & (0x80 >> (self.read_pos % 8)) != 0;
            value = (value << 1) | u64::from(bit);
            self.read_pos += 1;
        }
        Ok(value)
    }

    /// Move the read cursor back to the first bit.
    pub fn rewind(&mut self) {
        self.read_pos = 0;
    }

    pub fn clear(&mut self) {
        self.bytes.clear();
        self.len = 0;
        self.read_pos = 0;
    }
}

// ── Tests ────────────────────────────────────────────────────────
