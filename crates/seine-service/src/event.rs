use bytes::Bytes;

use crate::transport::TransportId;

/// One occurrence on the service, delivered to the registered callback.
///
/// Events for a given transport arrive in the order their underlying
/// conditions occurred: the connect result first, packets in receipt
/// order, and a connection-lost only after every buffered packet.
#[derive(Debug)]
pub enum Event {
    /// Outcome of a client connect or a server accept.
    ///
    /// Success carries the transport id; failure carries the error and the
    /// channel stays usable for a retry.
    ConnectResponse {
        channel: usize,
        transport: Option<TransportId>,
        error: Option<std::io::Error>,
    },

    /// The transport went away: peer close, socket error, or a framing
    /// violation.
    ConnectionLost {
        transport: TransportId,
        reason: std::io::Error,
    },

    /// One complete inbound frame, length header included.
    Packet {
        transport: TransportId,
        frame: Bytes,
    },
}

impl Event {
    /// The transport this event concerns, when it concerns one.
    pub fn transport(&self) -> Option<TransportId> {
        match self {
            Event::ConnectResponse { transport, .. } => *transport,
            Event::ConnectionLost { transport, .. } => Some(*transport),
            Event::Packet { transport, .. } => Some(*transport),
        }
    }
}
