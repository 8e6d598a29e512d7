//! Bidirectional TCP transport service with caller-driven dispatch.
//!
//! An [`IoService`] owns a set of channels, each a TCP client connector or
//! server acceptor with its own length-field framing configuration. The
//! caller invokes [`IoService::dispatch`] on its own cadence; each call
//! performs one nonblocking I/O pass and delivers a bounded number of
//! [`Event`]s to the registered callback. Inbound bytes are reassembled
//! into complete frames before delivery; outbound writes are FIFO-queued
//! per transport.

pub mod channel;
mod connector;
pub mod error;
pub mod event;
pub mod service;
pub mod transport;

pub use channel::{ChannelKind, ChannelState};
pub use error::{Result, ServiceError};
pub use event::Event;
pub use seine_frame::{FrameConfig, FrameDecoder, FrameError};
pub use service::{IoService, DEFAULT_CONNECT_TIMEOUT};
pub use transport::TransportId;
