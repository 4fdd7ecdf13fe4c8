//! Byte sink for strict encoding.

/// Accumulates canonical bytes. Writing never fails.
#[derive(Debug, Default, Clone)]
pub struct StrictWriter {
    buf: Vec<u8>,
}

impl StrictWriter {
    /// Creates an empty writer.
    #[must_use]
    pub const fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a compact-size integer using the shortest form.
    #[allow(clippy::cast_possible_truncation)]
    pub fn write_varint(&mut self, value: u64) {
        match value {
            0..=0xFC => self.write_u8(value as u8),
            0xFD..=0xFFFF => {
                self.write_u8(0xFD);
                self.write_u16(value as u16);
            },
            0x1_0000..=0xFFFF_FFFF => {
                self.write_u8(0xFE);
                self.write_u32(value as u32);
            },
            _ => {
                self.write_u8(0xFF);
                self.write_u64(value);
            },
        }
    }

    /// Writes a collection length prefix.
    pub fn write_len(&mut self, len: usize) {
        self.write_varint(len as u64);
    }

    /// Writes bytes without a length prefix.
    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Writes a length-prefixed byte string.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.write_len(bytes.len());
        self.write_raw(bytes);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}
