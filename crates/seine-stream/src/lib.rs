//! Byte buffer and binary stream primitives for seine.
//!
//! - [`ByteBuffer`]: growable owned storage with independent `sub()` slices
//! - [`StreamWriter`]: sequential big-endian encoder with
//!   placeholder-and-patch length prefixing
//! - [`StreamReader`]: bounds-checked cursor decoder over a borrowed range
//!
//! All multi-byte integers and floats use network (big-endian) byte order.

pub mod buffer;
pub mod error;
pub mod reader;
pub mod writer;

pub use buffer::{ByteBuffer, MAX_BUFFER_SIZE};
pub use error::{Result, StreamError};
pub use reader::StreamReader;
pub use writer::{StreamWriter, LENGTH_PLACEHOLDER_SIZE};
