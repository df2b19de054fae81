//! Frame layout configuration shared by the reader and the send path.

use static_assertions::const_assert;
use tokio_util::codec::LengthDelimitedCodec;

const MIN_FRAME_LENGTH: usize = 64;
/// Largest frame payload either direction will accept.
pub const MAX_FRAME_LENGTH: usize = 16 * 1024 * 1024;
const DEFAULT_MAX_FRAME_LENGTH: usize = 256 * 1024;

const_assert!(MIN_FRAME_LENGTH <= DEFAULT_MAX_FRAME_LENGTH);
const_assert!(DEFAULT_MAX_FRAME_LENGTH <= MAX_FRAME_LENGTH);

/// Width of the big-endian length prefix in front of every frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LengthPrefix {
    U16,
    #[default]
    U32,
}

impl LengthPrefix {
    /// Number of bytes occupied by the prefix.
    #[must_use]
    pub const fn bytes(self) -> usize {
        match self {
            LengthPrefix::U16 => 2,
            LengthPrefix::U32 => 4,
        }
    }

    /// Read the declared payload length from the start of `header`.
    pub(crate) fn declared_length(self, header: &[u8]) -> Option<usize> {
        match self {
            LengthPrefix::U16 => header
                .get(..2)
                .map(|b| usize::from(u16::from_be_bytes([b[0], b[1]]))),
            LengthPrefix::U32 => header.get(..4).and_then(|b| {
                usize::try_from(u32::from_be_bytes([b[0], b[1], b[2], b[3]])).ok()
            }),
        }
    }
}

/// Framing parameters.
///
/// # Examples
///
/// ```
/// use ackframe::frame::{FrameConfig, LengthPrefix};
///
/// let config = FrameConfig::default()
///     .max_frame_length(4096)
///     .length_prefix(LengthPrefix::U16);
/// assert_eq!(config.max_frame_length_value(), 4096);
/// assert_eq!(config.length_prefix_value().bytes(), 2);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameConfig {
    length_prefix: LengthPrefix,
    max_frame_length: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            length_prefix: LengthPrefix::default(),
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
        }
    }
}

impl FrameConfig {
    /// Set the maximum payload length, clamped between 64 bytes and
    /// [`MAX_FRAME_LENGTH`].
    #[must_use]
    pub fn max_frame_length(mut self, max_frame_length: usize) -> Self {
        self.max_frame_length = max_frame_length.clamp(MIN_FRAME_LENGTH, MAX_FRAME_LENGTH);
        self
    }

    /// Set the width of the length prefix.
    #[must_use]
    pub fn length_prefix(mut self, length_prefix: LengthPrefix) -> Self {
        self.length_prefix = length_prefix;
        self
    }

    /// Return the configured maximum payload length.
    #[must_use]
    pub const fn max_frame_length_value(&self) -> usize { self.max_frame_length }

    /// Return the configured length prefix.
    #[must_use]
    pub const fn length_prefix_value(&self) -> LengthPrefix { self.length_prefix }

    pub(crate) fn build_codec(&self) -> LengthDelimitedCodec {
        let mut builder = LengthDelimitedCodec::builder();
        builder
            .length_field_length(self.length_prefix.bytes())
            .big_endian()
            .max_frame_length(self.effective_max());
        builder.new_codec()
    }

    // A 16-bit prefix cannot describe more than `u16::MAX` bytes.
    pub(crate) fn effective_max(&self) -> usize {
        match self.length_prefix {
            LengthPrefix::U16 => self.max_frame_length.min(usize::from(u16::MAX)),
            LengthPrefix::U32 => self.max_frame_length,
        }
    }
}
