use crate::channel::ChannelState;
use crate::transport::TransportId;

/// Errors returned by service operations.
///
/// Connect and accept failures are not in here: they surface as
/// `ConnectResponse` events so the channel stays usable for retry, and
/// per-transport failures surface as `ConnectionLost` events. `Err`
/// returns are reserved for misuse of the local API.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// No channel is configured at this index.
    #[error("unknown channel index {index}")]
    UnknownChannel { index: usize },

    /// The channel is in the wrong state for the operation.
    #[error("channel {index} is in state {state:?}")]
    InvalidState { index: usize, state: ChannelState },

    /// The transport was closed or never existed.
    #[error("transport {id} is closed")]
    ClosedTransport { id: TransportId },

    /// Frame configuration error.
    #[error("frame error: {0}")]
    Frame(#[from] seine_frame::FrameError),

    /// An I/O error outside any single transport (e.g. bind failure).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ServiceError>;
