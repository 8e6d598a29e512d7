use std::collections::VecDeque;
use std::io::{ErrorKind, Read, Write};
use std::net::TcpStream;

use bytes::Bytes;
use seine_frame::{FrameConfig, FrameDecoder};
use tracing::debug;

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Copyable handle to one live connection owned by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransportId(pub(crate) u64);

impl std::fmt::Display for TransportId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One live TCP connection: the nonblocking socket, its frame decoder, and
/// a FIFO send queue. Owned exclusively by the service and released
/// deterministically on close or error.
#[derive(Debug)]
pub(crate) struct Transport {
    pub(crate) id: TransportId,
    pub(crate) channel: usize,
    stream: TcpStream,
    decoder: FrameDecoder,
    send_queue: VecDeque<Bytes>,
    /// Bytes of the queue head already written to the socket.
    sent: usize,
}

impl Transport {
    /// Wrap an established connection. The stream must already be
    /// nonblocking.
    pub(crate) fn new(id: TransportId, channel: usize, stream: TcpStream, config: FrameConfig) -> Self {
        Self {
            id,
            channel,
            stream,
            decoder: FrameDecoder::new(config),
            send_queue: VecDeque::new(),
            sent: 0,
        }
    }

    /// Queue bytes for transmission. Order across calls is preserved on
    /// the wire even when the socket accepts partial writes.
    pub(crate) fn enqueue(&mut self, bytes: Bytes) {
        self.send_queue.push_back(bytes);
    }

    /// Read everything currently available and decode complete frames
    /// into `frames`.
    ///
    /// `Err` means the transport is done for: peer close, socket error, or
    /// a framing violation. Frames decoded before the failure are still in
    /// `frames` and must be delivered ahead of the loss event.
    pub(crate) fn recv(&mut self, frames: &mut Vec<Bytes>) -> std::io::Result<()> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            let read = match self.stream.read(&mut chunk) {
                Ok(0) => {
                    return Err(std::io::Error::new(
                        ErrorKind::UnexpectedEof,
                        "peer closed the connection",
                    ));
                }
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::WouldBlock => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            };

            self.decoder.feed(&chunk[..read]);
            loop {
                match self.decoder.next_frame() {
                    Ok(Some(frame)) => frames.push(frame),
                    Ok(None) => break,
                    Err(err) => {
                        debug!(transport = %self.id, %err, "frame decode failed");
                        return Err(std::io::Error::other(err));
                    }
                }
            }
        }
    }

    /// Push queued bytes to the socket until it stops taking them.
    ///
    /// `Err` means the transport is done for.
    pub(crate) fn flush(&mut self) -> std::io::Result<()> {
        while let Some(front) = self.send_queue.front() {
            match self.stream.write(&front[self.sent..]) {
                Ok(0) => {
                    return Err(std::io::Error::new(
                        ErrorKind::WriteZero,
                        "socket accepted no bytes",
                    ));
                }
                Ok(n) => {
                    self.sent += n;
                    if self.sent == front.len() {
                        self.send_queue.pop_front();
                        self.sent = 0;
                    }
                }
                Err(err) if err.kind() == ErrorKind::WouldBlock => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// Shut both directions down; later reads and writes fail fast.
    pub(crate) fn shutdown(&self) {
        let _ = self.stream.shutdown(std::net::Shutdown::Both);
    }
}
