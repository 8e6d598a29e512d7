use std::net::TcpListener;

use seine_frame::FrameConfig;

/// The TCP role a channel is opened with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    /// Connects out to the configured host:port.
    TcpClient,
    /// Binds and accepts on the configured host:port.
    TcpServer,
}

/// Channel lifecycle state.
///
/// Client: `Closed → Opening → Open → Closed`.
/// Server: `Closed → Listening → Closed`; each accepted connection runs its
/// own transport lifecycle under the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Closed,
    /// Resolve and connect are in flight on the background connector.
    Opening,
    Open,
    Listening,
}

/// One configured endpoint slot: a client connector or a server acceptor,
/// with its own framing parameters. Lives for the service's lifetime.
#[derive(Debug)]
pub(crate) struct Channel {
    pub(crate) host: String,
    pub(crate) port: u16,
    pub(crate) kind: Option<ChannelKind>,
    pub(crate) frame_config: FrameConfig,
    pub(crate) state: ChannelState,
    pub(crate) listener: Option<TcpListener>,
}

impl Channel {
    pub(crate) fn new(host: String, port: u16) -> Self {
        Self {
            host,
            port,
            kind: None,
            frame_config: FrameConfig::default(),
            state: ChannelState::Closed,
            listener: None,
        }
    }
}
