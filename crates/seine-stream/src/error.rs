/// Errors that can occur in buffer and stream operations.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// An offset or range is outside the buffer bounds.
    #[error("range out of bounds (offset {offset}, buffer length {len})")]
    Range { offset: usize, len: usize },

    /// A read needs more bytes than remain in the stream.
    #[error("stream underflow ({needed} bytes needed, {remaining} remaining)")]
    Underflow { needed: usize, remaining: usize },

    /// A write would grow the buffer beyond its maximum size.
    #[error("buffer overflow ({requested} bytes requested, max {max})")]
    Overflow { requested: usize, max: usize },

    /// A length-prefixed string holds invalid UTF-8.
    #[error("string payload is not valid UTF-8")]
    InvalidUtf8,

    /// A variable-width integer prefix is longer than 5 bytes.
    #[error("malformed variable-width integer")]
    InvalidVarint,
}

pub type Result<T> = std::result::Result<T, StreamError>;
