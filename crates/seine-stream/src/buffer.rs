use bytes::{Bytes, BytesMut};

use crate::error::{Result, StreamError};

/// Maximum size a buffer may grow to: 64 MiB.
pub const MAX_BUFFER_SIZE: usize = 64 * 1024 * 1024;

/// Growable owned byte storage with snapshot slicing.
///
/// `sub()` returns independent copies: mutating the buffer after taking a
/// slice never changes bytes already observed through that slice. This
/// matters when slices of one buffer are queued for transmission while the
/// source keeps being written.
#[derive(Debug, Default, Clone)]
pub struct ByteBuffer {
    data: BytesMut,
}

impl ByteBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty buffer with pre-reserved capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: BytesMut::with_capacity(capacity),
        }
    }

    /// Append bytes to the end of the buffer.
    pub fn append(&mut self, bytes: &[u8]) -> Result<()> {
        let requested = self.data.len() + bytes.len();
        if requested > MAX_BUFFER_SIZE {
            return Err(StreamError::Overflow {
                requested,
                max: MAX_BUFFER_SIZE,
            });
        }
        self.data.extend_from_slice(bytes);
        Ok(())
    }

    /// Overwrite bytes at `offset` in place. The region must already exist.
    pub fn overwrite(&mut self, offset: usize, bytes: &[u8]) -> Result<()> {
        let end = offset + bytes.len();
        if end > self.data.len() {
            return Err(StreamError::Range {
                offset,
                len: self.data.len(),
            });
        }
        self.data[offset..end].copy_from_slice(bytes);
        Ok(())
    }

    /// Number of bytes in the buffer.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// View the buffer contents.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Take an independent snapshot of `[start, end)`.
    ///
    /// `end = None` means "to the end of the buffer".
    pub fn sub(&self, start: usize, end: Option<usize>) -> Result<Bytes> {
        let len = self.data.len();
        let end = end.unwrap_or(len);
        if end > len || start > end {
            return Err(StreamError::Range { offset: start, len });
        }
        Ok(Bytes::copy_from_slice(&self.data[start..end]))
    }

    /// Consume the buffer into immutable bytes.
    pub fn into_bytes(self) -> Bytes {
        self.data.freeze()
    }
}
