use std::collections::{HashMap, VecDeque};
use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::time::Duration;

use bytes::Bytes;
use seine_frame::FrameConfig;
use tracing::{debug, info, warn};

use crate::channel::{Channel, ChannelKind, ChannelState};
use crate::connector::Connector;
use crate::error::{Result, ServiceError};
use crate::event::Event;
use crate::transport::{Transport, TransportId};

/// Default limit on how long a connect attempt may take.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

type EventCallback = Box<dyn FnMut(&mut IoService, Event)>;

/// Caller-driven TCP transport service.
///
/// Owns a fixed set of channels (one per configured endpoint) and every
/// live transport under them. All socket I/O and event delivery happens
/// inside [`dispatch`](Self::dispatch), which the caller invokes on its own
/// cadence; nothing here blocks or runs I/O on internal threads, except
/// the resolve-and-connect worker whose completion `dispatch` observes.
///
/// The registered callback receives `&mut IoService` alongside each event,
/// so writing, closing and stopping from inside the callback is safe.
pub struct IoService {
    channels: Vec<Channel>,
    transports: HashMap<TransportId, Transport>,
    next_transport_id: u64,
    pending: VecDeque<Event>,
    callback: Option<EventCallback>,
    connector: Connector,
    connect_timeout: Duration,
    running: bool,
}

impl IoService {
    /// Create a service with one channel per `(host, port)` endpoint.
    /// Channel indices follow the slice order.
    pub fn new(endpoints: &[(&str, u16)]) -> Self {
        let channels = endpoints
            .iter()
            .map(|(host, port)| Channel::new((*host).to_string(), *port))
            .collect();
        Self {
            channels,
            transports: HashMap::new(),
            next_transport_id: 1,
            pending: VecDeque::new(),
            callback: None,
            connector: Connector::new(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            running: false,
        }
    }

    /// Override the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the framing parameters for a channel. Only valid before the
    /// channel is opened.
    pub fn set_frame_config(&mut self, index: usize, config: FrameConfig) -> Result<()> {
        let ch = self.channel_mut(index)?;
        if ch.state != ChannelState::Closed {
            return Err(ServiceError::InvalidState {
                index,
                state: ch.state,
            });
        }
        ch.frame_config = config;
        Ok(())
    }

    /// Register the event callback and mark the service running.
    ///
    /// Calling this from inside the callback replaces it; the replacement
    /// takes effect once the current delivery round finishes.
    pub fn start<F>(&mut self, callback: F)
    where
        F: FnMut(&mut IoService, Event) + 'static,
    {
        self.callback = Some(Box::new(callback));
        self.running = true;
    }

    /// Close every channel and transport and drop all undelivered events.
    pub fn stop(&mut self) {
        for (_, transport) in self.transports.drain() {
            transport.shutdown();
        }
        for ch in &mut self.channels {
            ch.listener = None;
            ch.state = ChannelState::Closed;
        }
        self.pending.clear();
        self.running = false;
        info!("service stopped");
    }

    /// Whether `start` has been called and `stop` has not.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Open a channel in the given role.
    ///
    /// A server channel binds and listens immediately; bind failures come
    /// back from this call. A client channel hands resolve-and-connect to
    /// the background connector and reports the outcome through a later
    /// `ConnectResponse` event.
    pub fn open(&mut self, index: usize, kind: ChannelKind) -> Result<()> {
        let timeout = self.connect_timeout;
        let ch = self.channel_mut(index)?;
        if ch.state != ChannelState::Closed {
            return Err(ServiceError::InvalidState {
                index,
                state: ch.state,
            });
        }
        ch.kind = Some(kind);
        match kind {
            ChannelKind::TcpServer => {
                let listener = TcpListener::bind((ch.host.as_str(), ch.port))?;
                listener.set_nonblocking(true)?;
                info!(channel = index, addr = %listener.local_addr()?, "listening");
                ch.listener = Some(listener);
                ch.state = ChannelState::Listening;
            }
            ChannelKind::TcpClient => {
                ch.state = ChannelState::Opening;
                let host = ch.host.clone();
                let port = ch.port;
                debug!(channel = index, host = %host, port, "connect started");
                if let Err(err) = self.connector.spawn(index, host, port, timeout) {
                    self.channels[index].state = ChannelState::Closed;
                    return Err(err.into());
                }
            }
        }
        Ok(())
    }

    /// Queue bytes for FIFO transmission on an open transport. Returns
    /// immediately; `dispatch` pushes the bytes out.
    pub fn write(&mut self, id: TransportId, data: impl Into<Bytes>) -> Result<()> {
        let transport = self
            .transports
            .get_mut(&id)
            .ok_or(ServiceError::ClosedTransport { id })?;
        transport.enqueue(data.into());
        Ok(())
    }

    /// Close one transport. Pending events for it are discarded; no
    /// `ConnectionLost` is emitted for an explicit close.
    pub fn close_transport(&mut self, id: TransportId) -> Result<()> {
        let transport = self
            .transports
            .remove(&id)
            .ok_or(ServiceError::ClosedTransport { id })?;
        transport.shutdown();
        self.pending.retain(|event| event.transport() != Some(id));
        let ch = &mut self.channels[transport.channel];
        if ch.kind == Some(ChannelKind::TcpClient) {
            ch.state = ChannelState::Closed;
        }
        debug!(transport = %id, "transport closed");
        Ok(())
    }

    /// Close a channel and every transport it owns.
    pub fn close_channel(&mut self, index: usize) -> Result<()> {
        if index >= self.channels.len() {
            return Err(ServiceError::UnknownChannel { index });
        }
        let ids: Vec<TransportId> = self
            .transports
            .values()
            .filter(|t| t.channel == index)
            .map(|t| t.id)
            .collect();
        for id in ids {
            let _ = self.close_transport(id);
        }
        let ch = &mut self.channels[index];
        ch.listener = None;
        ch.state = ChannelState::Closed;
        info!(channel = index, "channel closed");
        Ok(())
    }

    /// One bounded nonblocking pass: harvest finished connects, accept,
    /// read, flush queued writes, then deliver at most `budget` events to
    /// the callback. Returns the number delivered.
    pub fn dispatch(&mut self, budget: usize) -> usize {
        if !self.running {
            return 0;
        }
        self.poll_connects();
        self.poll_accepts();
        self.poll_reads();
        self.flush_writes();
        self.deliver(budget)
    }

    /// Bound address of a listening channel. Useful when the channel was
    /// configured with port 0.
    pub fn local_addr(&self, index: usize) -> Result<SocketAddr> {
        let ch = self.channel(index)?;
        match &ch.listener {
            Some(listener) => Ok(listener.local_addr()?),
            None => Err(ServiceError::InvalidState {
                index,
                state: ch.state,
            }),
        }
    }

    /// Current lifecycle state of a channel.
    pub fn channel_state(&self, index: usize) -> Result<ChannelState> {
        Ok(self.channel(index)?.state)
    }

    /// Number of live transports across all channels.
    pub fn transport_count(&self) -> usize {
        self.transports.len()
    }

    /// Number of events queued but not yet delivered.
    pub fn pending_events(&self) -> usize {
        self.pending.len()
    }

    fn channel(&self, index: usize) -> Result<&Channel> {
        self.channels
            .get(index)
            .ok_or(ServiceError::UnknownChannel { index })
    }

    fn channel_mut(&mut self, index: usize) -> Result<&mut Channel> {
        self.channels
            .get_mut(index)
            .ok_or(ServiceError::UnknownChannel { index })
    }

    /// Harvest finished background connects into transports and events.
    fn poll_connects(&mut self) {
        while let Some(outcome) = self.connector.poll() {
            let index = outcome.channel;
            let still_opening = self
                .channels
                .get(index)
                .is_some_and(|ch| ch.state == ChannelState::Opening);
            if !still_opening {
                // The channel was closed while the connect was in flight;
                // the connection (if any) is dropped without an event.
                continue;
            }
            match outcome.result {
                Ok(stream) => match self.register_transport(index, stream) {
                    Ok(id) => {
                        self.channels[index].state = ChannelState::Open;
                        info!(channel = index, transport = %id, "connected");
                        self.pending.push_back(Event::ConnectResponse {
                            channel: index,
                            transport: Some(id),
                            error: None,
                        });
                    }
                    Err(err) => self.fail_connect(index, err),
                },
                Err(err) => self.fail_connect(index, err),
            }
        }
    }

    fn fail_connect(&mut self, index: usize, err: std::io::Error) {
        warn!(channel = index, %err, "connect failed");
        self.channels[index].state = ChannelState::Closed;
        self.pending.push_back(Event::ConnectResponse {
            channel: index,
            transport: None,
            error: Some(err),
        });
    }

    /// Accept every connection currently queued on listening channels.
    fn poll_accepts(&mut self) {
        for index in 0..self.channels.len() {
            if self.channels[index].state != ChannelState::Listening {
                continue;
            }
            loop {
                let accepted = match &self.channels[index].listener {
                    Some(listener) => listener.accept(),
                    None => break,
                };
                match accepted {
                    Ok((stream, addr)) => match self.register_transport(index, stream) {
                        Ok(id) => {
                            info!(channel = index, transport = %id, %addr, "accepted connection");
                            self.pending.push_back(Event::ConnectResponse {
                                channel: index,
                                transport: Some(id),
                                error: None,
                            });
                        }
                        Err(err) => {
                            warn!(channel = index, %err, "accepted socket setup failed");
                            self.pending.push_back(Event::ConnectResponse {
                                channel: index,
                                transport: None,
                                error: Some(err),
                            });
                        }
                    },
                    Err(err) if err.kind() == ErrorKind::WouldBlock => break,
                    Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                    Err(err) => {
                        warn!(channel = index, %err, "accept failed");
                        self.pending.push_back(Event::ConnectResponse {
                            channel: index,
                            transport: None,
                            error: Some(err),
                        });
                        break;
                    }
                }
            }
        }
    }

    fn register_transport(&mut self, channel: usize, stream: TcpStream) -> std::io::Result<TransportId> {
        stream.set_nonblocking(true)?;
        let _ = stream.set_nodelay(true);
        let id = TransportId(self.next_transport_id);
        self.next_transport_id += 1;
        let config = self.channels[channel].frame_config.clone();
        self.transports
            .insert(id, Transport::new(id, channel, stream, config));
        Ok(id)
    }

    /// Read every open transport until its socket runs dry, decoding
    /// complete frames into packet events.
    fn poll_reads(&mut self) {
        let ids: Vec<TransportId> = self.transports.keys().copied().collect();
        let mut frames = Vec::new();
        for id in ids {
            let Some(transport) = self.transports.get_mut(&id) else {
                continue;
            };
            let result = transport.recv(&mut frames);
            for frame in frames.drain(..) {
                self.pending.push_back(Event::Packet {
                    transport: id,
                    frame,
                });
            }
            if let Err(reason) = result {
                // Frames decoded before the failure were queued above, so
                // the loss event lands after them.
                self.drop_transport(id);
                self.pending.push_back(Event::ConnectionLost {
                    transport: id,
                    reason,
                });
            }
        }
    }

    /// Push queued outbound bytes on every transport.
    fn flush_writes(&mut self) {
        let ids: Vec<TransportId> = self.transports.keys().copied().collect();
        for id in ids {
            let Some(transport) = self.transports.get_mut(&id) else {
                continue;
            };
            if let Err(reason) = transport.flush() {
                self.drop_transport(id);
                self.pending.push_back(Event::ConnectionLost {
                    transport: id,
                    reason,
                });
            }
        }
    }

    /// Release a transport after a failure. Unlike an explicit close, its
    /// already-queued packet events stay deliverable.
    fn drop_transport(&mut self, id: TransportId) {
        if let Some(transport) = self.transports.remove(&id) {
            transport.shutdown();
            let ch = &mut self.channels[transport.channel];
            if ch.kind == Some(ChannelKind::TcpClient) {
                ch.state = ChannelState::Closed;
            }
        }
    }

    /// Deliver up to `budget` queued events through the callback.
    ///
    /// The callback is taken out of `self` for the duration so it can call
    /// back into the service; a nested `dispatch` from inside it finds no
    /// callback and delivers nothing.
    fn deliver(&mut self, budget: usize) -> usize {
        let Some(mut callback) = self.callback.take() else {
            return 0;
        };
        let mut delivered = 0;
        while delivered < budget && self.running {
            let Some(event) = self.pending.pop_front() else {
                break;
            };
            callback(&mut *self, event);
            delivered += 1;
        }
        // A callback that re-registered via start() wins over the one we
        // took out.
        if self.callback.is_none() {
            self.callback = Some(callback);
        }
        delivered
    }
}

impl std::fmt::Debug for IoService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IoService")
            .field("channels", &self.channels.len())
            .field("transports", &self.transports.len())
            .field("pending", &self.pending.len())
            .field("running", &self.running)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_channel_rejected() {
        let mut svc = IoService::new(&[("127.0.0.1", 0)]);
        assert!(matches!(
            svc.open(5, ChannelKind::TcpServer),
            Err(ServiceError::UnknownChannel { index: 5 })
        ));
        assert!(matches!(
            svc.set_frame_config(5, FrameConfig::default()),
            Err(ServiceError::UnknownChannel { index: 5 })
        ));
    }

    #[test]
    fn frame_config_locked_once_open() {
        let mut svc = IoService::new(&[("127.0.0.1", 0)]);
        svc.open(0, ChannelKind::TcpServer).unwrap();
        assert!(matches!(
            svc.set_frame_config(0, FrameConfig::default()),
            Err(ServiceError::InvalidState { .. })
        ));
    }

    #[test]
    fn reopen_requires_close() {
        let mut svc = IoService::new(&[("127.0.0.1", 0)]);
        svc.open(0, ChannelKind::TcpServer).unwrap();
        assert!(matches!(
            svc.open(0, ChannelKind::TcpServer),
            Err(ServiceError::InvalidState { .. })
        ));

        svc.close_channel(0).unwrap();
        assert_eq!(svc.channel_state(0).unwrap(), ChannelState::Closed);
        svc.open(0, ChannelKind::TcpServer).unwrap();
        assert_eq!(svc.channel_state(0).unwrap(), ChannelState::Listening);
    }

    #[test]
    fn write_to_unknown_transport_is_closed_error() {
        let mut svc = IoService::new(&[("127.0.0.1", 0)]);
        let bogus = TransportId(99);
        assert!(matches!(
            svc.write(bogus, Bytes::from_static(b"x")),
            Err(ServiceError::ClosedTransport { .. })
        ));
    }

    #[test]
    fn dispatch_without_start_is_a_no_op() {
        let mut svc = IoService::new(&[("127.0.0.1", 0)]);
        assert_eq!(svc.dispatch(128), 0);
    }

    #[test]
    fn local_addr_only_for_listeners() {
        let mut svc = IoService::new(&[("127.0.0.1", 0)]);
        assert!(matches!(
            svc.local_addr(0),
            Err(ServiceError::InvalidState { .. })
        ));
        svc.open(0, ChannelKind::TcpServer).unwrap();
        let addr = svc.local_addr(0).unwrap();
        assert_ne!(addr.port(), 0);
    }

    #[test]
    fn callback_replaced_from_inside_callback_sticks() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let seen: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));
        let mut svc = IoService::new(&[("127.0.0.1", 0)]);

        let first_log = Rc::clone(&seen);
        svc.start(move |svc, _| {
            first_log.borrow_mut().push("first");
            let second_log = Rc::clone(&first_log);
            svc.start(move |_, _| second_log.borrow_mut().push("second"));
        });

        svc.pending.push_back(Event::Packet {
            transport: TransportId(1),
            frame: Bytes::from_static(b"a"),
        });
        svc.pending.push_back(Event::Packet {
            transport: TransportId(2),
            frame: Bytes::from_static(b"b"),
        });

        assert_eq!(svc.dispatch(1), 1);
        assert_eq!(svc.dispatch(1), 1);
        assert_eq!(&*seen.borrow(), &["first", "second"]);
    }

    #[test]
    fn stop_clears_everything() {
        let mut svc = IoService::new(&[("127.0.0.1", 0)]);
        svc.start(|_, _| {});
        svc.open(0, ChannelKind::TcpServer).unwrap();
        assert!(svc.is_running());

        svc.stop();
        assert!(!svc.is_running());
        assert_eq!(svc.transport_count(), 0);
        assert_eq!(svc.pending_events(), 0);
        assert_eq!(svc.channel_state(0).unwrap(), ChannelState::Closed);
    }
}
