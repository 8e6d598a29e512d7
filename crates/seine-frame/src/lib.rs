//! Length-field frame decoding for seine.
//!
//! A [`FrameDecoder`] turns an arbitrarily segmented TCP byte stream into
//! discrete application frames, driven by a per-channel [`FrameConfig`]
//! (length field offset, width, adjustment, and a hard size cap). Frames
//! split across socket reads are reassembled; reads holding several frames
//! are split apart.

pub mod config;
pub mod decoder;
pub mod error;

pub use config::{FrameConfig, DEFAULT_MAX_FRAME_LENGTH};
pub use decoder::FrameDecoder;
pub use error::{FrameError, Result};
