/// Errors that can occur configuring or running the frame decoder.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FrameError {
    /// The length-field configuration violates its invariants.
    #[error("invalid frame config: {reason}")]
    InvalidConfig { reason: String },

    /// The decoded length field yields a non-positive or oversized frame.
    #[error("bad frame length {length} (max {max})")]
    BadLength { length: i64, max: usize },
}

pub type Result<T> = std::result::Result<T, FrameError>;
