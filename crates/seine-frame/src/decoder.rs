use bytes::{Bytes, BytesMut};
use tracing::warn;

use crate::config::FrameConfig;
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Reassembles a TCP byte stream into complete length-delimited frames.
///
/// Socket chunks go in via [`feed`](Self::feed) in arrival order; complete
/// frames come out via [`next_frame`](Self::next_frame). A chunk may carry
/// a fraction of a frame or several frames; the decoder keeps whatever is
/// unresolved and never rescans consumed bytes.
///
/// Emitted frames span the full declared region from offset zero, length
/// field included; consumers seek past the header when parsing.
#[derive(Debug)]
pub struct FrameDecoder {
    config: FrameConfig,
    buf: BytesMut,
    fault: Option<FrameError>,
}

impl FrameDecoder {
    /// Create a decoder for one connection.
    pub fn new(config: FrameConfig) -> Self {
        Self {
            config,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            fault: None,
        }
    }

    /// Append a chunk of received bytes.
    pub fn feed(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Extract the next complete frame, if the accumulated bytes hold one.
    ///
    /// Returns `Ok(None)` while the header or body is still incomplete.
    /// After the first error the decoder is spent: the stream can no longer
    /// be trusted to be frame-aligned, so every later call fails too.
    pub fn next_frame(&mut self) -> Result<Option<Bytes>> {
        if let Some(fault) = &self.fault {
            return Err(fault.clone());
        }

        let header_end = self.config.header_end();
        if self.buf.len() < header_end {
            return Ok(None); // Need more header bytes
        }

        let declared = self.read_length_field();
        let total = declared + i64::from(self.config.length_adjustment);
        if total < header_end as i64 || total > self.config.max_frame_length as i64 {
            let err = FrameError::BadLength {
                length: total,
                max: self.config.max_frame_length,
            };
            warn!(length = total, max = self.config.max_frame_length, "frame length rejected");
            self.fault = Some(err.clone());
            return Err(err);
        }

        let total = total as usize;
        if self.buf.len() < total {
            return Ok(None); // Frame not fully received yet
        }

        Ok(Some(self.buf.split_to(total).freeze()))
    }

    /// Feed a chunk and drain every frame it completes.
    pub fn decode(&mut self, chunk: &[u8]) -> Result<Vec<Bytes>> {
        self.feed(chunk);
        let mut frames = Vec::new();
        while let Some(frame) = self.next_frame()? {
            frames.push(frame);
        }
        Ok(frames)
    }

    /// Unsigned big-endian length field at the configured offset.
    fn read_length_field(&self) -> i64 {
        let start = self.config.length_field_offset;
        let mut value = 0u64;
        for &byte in &self.buf[start..start + self.config.length_field_length] {
            value = (value << 8) | u64::from(byte);
        }
        value as i64
    }

    /// Bytes received but not yet resolved into frames.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// The framing parameters this decoder was built with.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}
