use bytes::Bytes;

use crate::buffer::ByteBuffer;
use crate::error::{Result, StreamError};

/// Width of the length placeholder reserved by [`StreamWriter::push_length_placeholder`].
pub const LENGTH_PLACEHOLDER_SIZE: usize = 4;

/// Sequential big-endian binary encoder over an owned [`ByteBuffer`].
///
/// The 8/16/24-bit writers accept wider integers and truncate with
/// two's-complement wraparound; protocols in the wild routinely pass
/// values like 256 into an 8-bit field and expect the low byte on the
/// wire, so truncation is deliberate rather than an error.
#[derive(Debug, Default)]
pub struct StreamWriter {
    buf: ByteBuffer,
}

impl StreamWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a writer with pre-reserved capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: ByteBuffer::with_capacity(capacity),
        }
    }

    /// Write a bool as one byte, 0 or 1.
    pub fn write_bool(&mut self, v: bool) -> Result<()> {
        self.buf.append(&[u8::from(v)])
    }

    /// Write the low 8 bits of a signed value.
    pub fn write_i8(&mut self, v: i32) -> Result<()> {
        self.buf.append(&[v as u8])
    }

    /// Write the low 8 bits of an unsigned value.
    pub fn write_u8(&mut self, v: u32) -> Result<()> {
        self.buf.append(&[v as u8])
    }

    /// Write the low 16 bits of a signed value, big-endian.
    pub fn write_i16(&mut self, v: i32) -> Result<()> {
        self.buf.append(&(v as u16).to_be_bytes())
    }

    /// Write the low 16 bits of an unsigned value, big-endian.
    pub fn write_u16(&mut self, v: u32) -> Result<()> {
        self.buf.append(&(v as u16).to_be_bytes())
    }

    /// Write the low 24 bits of a signed value, big-endian.
    pub fn write_i24(&mut self, v: i32) -> Result<()> {
        self.write_u24(v as u32)
    }

    /// Write the low 24 bits of an unsigned value, big-endian.
    pub fn write_u24(&mut self, v: u32) -> Result<()> {
        let be = v.to_be_bytes();
        self.buf.append(&be[1..4])
    }

    /// Write a signed 32-bit value, big-endian.
    pub fn write_i32(&mut self, v: i32) -> Result<()> {
        self.buf.append(&v.to_be_bytes())
    }

    /// Write an unsigned 32-bit value, big-endian.
    pub fn write_u32(&mut self, v: u32) -> Result<()> {
        self.buf.append(&v.to_be_bytes())
    }

    /// Write an IEEE-754 single, big-endian.
    pub fn write_f32(&mut self, v: f32) -> Result<()> {
        self.buf.append(&v.to_bits().to_be_bytes())
    }

    /// Write an IEEE-754 double, big-endian.
    pub fn write_f64(&mut self, v: f64) -> Result<()> {
        self.buf.append(&v.to_bits().to_be_bytes())
    }

    /// Write an unsigned integer 7 bits at a time, low group first.
    /// The high bit of each byte marks continuation.
    pub fn write_varint(&mut self, v: u32) -> Result<()> {
        let mut v = v;
        while v >= 0x80 {
            self.buf.append(&[(v as u8) | 0x80])?;
            v >>= 7;
        }
        self.buf.append(&[v as u8])
    }

    /// Write a string as a varint byte-length prefix followed by raw UTF-8.
    pub fn write_vstring(&mut self, s: &str) -> Result<()> {
        self.write_varint(s.len() as u32)?;
        self.buf.append(s.as_bytes())
    }

    /// Reserve 4 bytes for a length field to be patched later.
    ///
    /// Returns the offset of the reserved region.
    pub fn push_length_placeholder(&mut self) -> Result<usize> {
        let offset = self.buf.len();
        self.buf.append(&[0u8; LENGTH_PLACEHOLDER_SIZE])?;
        Ok(offset)
    }

    /// Patch a previously reserved length field with the number of bytes
    /// written since the placeholder, the placeholder itself included,
    /// as a big-endian u32.
    ///
    /// Must be called before the buffer is transmitted; an unpatched
    /// placeholder stays zero on the wire.
    pub fn patch_length_placeholder(&mut self, offset: usize) -> Result<()> {
        let span = self.buf.len().checked_sub(offset).ok_or(StreamError::Range {
            offset,
            len: self.buf.len(),
        })? as u32;
        self.buf.overwrite(offset, &span.to_be_bytes())
    }

    /// Take an independent snapshot of `[start, end)` of the written bytes.
    pub fn sub(&self, start: usize, end: Option<usize>) -> Result<Bytes> {
        self.buf.sub(start, end)
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// View the written bytes.
    pub fn as_slice(&self) -> &[u8] {
        self.buf.as_slice()
    }

    /// Consume the writer into immutable bytes.
    pub fn into_bytes(self) -> Bytes {
        self.buf.into_bytes()
    }
}
