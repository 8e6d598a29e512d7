use std::io::ErrorKind;
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::time::Duration;

use tracing::debug;

/// Result of one background resolve-and-connect attempt.
pub(crate) struct ConnectOutcome {
    pub(crate) channel: usize,
    pub(crate) result: std::io::Result<TcpStream>,
}

/// Offloads DNS resolution and TCP connect establishment to short-lived
/// worker threads so `open()` and `dispatch()` never block on them.
/// Completions are harvested by `dispatch()` via `poll()`.
pub(crate) struct Connector {
    tx: Sender<ConnectOutcome>,
    rx: Receiver<ConnectOutcome>,
}

impl Connector {
    pub(crate) fn new() -> Self {
        let (tx, rx) = channel();
        Self { tx, rx }
    }

    /// Start a connect attempt for `channel`.
    pub(crate) fn spawn(
        &self,
        channel: usize,
        host: String,
        port: u16,
        timeout: Duration,
    ) -> std::io::Result<()> {
        let tx = self.tx.clone();
        std::thread::Builder::new()
            .name(format!("seine-connect-{channel}"))
            .spawn(move || {
                let result = resolve_and_connect(&host, port, timeout);
                // The receiver is gone only if the service was dropped.
                let _ = tx.send(ConnectOutcome { channel, result });
            })?;
        Ok(())
    }

    /// Next finished attempt, if any. Never blocks.
    pub(crate) fn poll(&self) -> Option<ConnectOutcome> {
        self.rx.try_recv().ok()
    }
}

/// Resolve the host and try each address until one connects.
fn resolve_and_connect(host: &str, port: u16, timeout: Duration) -> std::io::Result<TcpStream> {
    let addrs = (host, port).to_socket_addrs()?;
    let mut last_err = None;
    for addr in addrs {
        debug!(%addr, "attempting connect");
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(err) => last_err = Some(err),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        std::io::Error::new(ErrorKind::NotFound, format!("no addresses resolved for {host}"))
    }))
}
