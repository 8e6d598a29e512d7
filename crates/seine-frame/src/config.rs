use crate::error::{FrameError, Result};

/// Default maximum frame size: 10 MiB.
pub const DEFAULT_MAX_FRAME_LENGTH: usize = 10 * 1024 * 1024;

/// Length-field framing parameters for one channel.
///
/// Validated once at construction instead of failing deep inside the
/// decode loop:
/// - `length_field_length` must be 1, 2, 3 or 4
/// - the length field must fit inside `max_frame_length`
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Upper bound on an accepted frame's total size.
    pub max_frame_length: usize,
    /// Byte offset of the length field from the frame start.
    pub length_field_offset: usize,
    /// Width of the length field in bytes (1-4).
    pub length_field_length: usize,
    /// Signed correction added to the decoded length to get the total
    /// frame size. Zero when the length field already counts the header.
    pub length_adjustment: i32,
}

impl FrameConfig {
    /// Build a validated config.
    pub fn new(
        max_frame_length: usize,
        length_field_offset: usize,
        length_field_length: usize,
        length_adjustment: i32,
    ) -> Result<Self> {
        if !(1..=4).contains(&length_field_length) {
            return Err(FrameError::InvalidConfig {
                reason: format!("length field width must be 1-4, got {length_field_length}"),
            });
        }
        if length_field_offset + length_field_length > max_frame_length {
            return Err(FrameError::InvalidConfig {
                reason: format!(
                    "length field at offset {length_field_offset} width {length_field_length} \
                     does not fit in max frame length {max_frame_length}"
                ),
            });
        }
        Ok(Self {
            max_frame_length,
            length_field_offset,
            length_field_length,
            length_adjustment,
        })
    }

    /// First byte past the length field; a header must be at least this long.
    pub fn header_end(&self) -> usize {
        self.length_field_offset + self.length_field_length
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
            length_field_offset: 0,
            length_field_length: 4,
            length_adjustment: 0,
        }
    }
}
