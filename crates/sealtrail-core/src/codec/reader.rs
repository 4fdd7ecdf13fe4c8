//! Byte source for strict decoding.

use super::CodecError;

/// Cursor over a borrowed byte slice.
#[derive(Debug, Clone)]
pub struct StrictReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> StrictReader<'a> {
    #[must_use]
    pub const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    /// Current offset from the start of the input.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Number of unread bytes.
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    /// Bytes consumed since `start`, which must be an earlier
    /// [`position`](Self::position).
    #[must_use]
    pub fn slice_since(&self, start: usize) -> &'a [u8] {
        &self.bytes[start..self.pos]
    }

    /// Fails if any bytes remain unread.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::TrailingBytes`] when input remains.
    pub const fn finish(&self) -> Result<(), CodecError> {
        if self.remaining() == 0 {
            Ok(())
        } else {
            Err(CodecError::TrailingBytes {
                count: self.remaining(),
            })
        }
    }

    /// Reads exactly `len` raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::UnexpectedEof`] if fewer bytes remain.
    pub fn read_raw(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        if len > self.remaining() {
            return Err(CodecError::UnexpectedEof {
                needed: len,
                remaining: self.remaining(),
            });
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    /// Reads a fixed-size byte array.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::UnexpectedEof`] if fewer than `N` bytes remain.
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_raw(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.read_raw(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, CodecError> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, CodecError> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64, CodecError> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    /// Reads a compact-size integer, rejecting non-minimal forms.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::NonMinimalVarInt`] for overlong encodings or
    /// [`CodecError::UnexpectedEof`] for truncated input.
    pub fn read_varint(&mut self) -> Result<u64, CodecError> {
        let (value, min) = match self.read_u8()? {
            0xFD => (u64::from(self.read_u16()?), 0xFD),
            0xFE => (u64::from(self.read_u32()?), 0x1_0000),
            0xFF => (self.read_u64()?, 0x1_0000_0000),
            small => return Ok(u64::from(small)),
        };
        if value < min {
            return Err(CodecError::NonMinimalVarInt { value });
        }
        Ok(value)
    }

    /// Reads a length prefix bounded by `max`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::LengthExceeded`] if the prefix is above `max`.
    pub fn read_len(&mut self, max: usize) -> Result<usize, CodecError> {
        let len = self.read_varint()?;
        match usize::try_from(len) {
            Ok(len) if len <= max => Ok(len),
            _ => Err(CodecError::LengthExceeded { len, max }),
        }
    }

    /// Reads a length-prefixed byte string bounded by `max`.
    ///
    /// # Errors
    ///
    /// Returns an error if the prefix is out of bounds or the input is short.
    pub fn read_bytes(&mut self, max: usize) -> Result<&'a [u8], CodecError> {
        let len = self.read_len(max)?;
        self.read_raw(len)
    }
}
