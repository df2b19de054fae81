//! Frame decoding from a blocking byte stream.
//!
//! Every frame is a big-endian length prefix followed by a bincode-encoded
//! [`WireMessage`](crate::message::WireMessage). [`FrameSource`] is the seam
//! the receiver reads through; [`StreamFrameSource`] implements it for any
//! [`std::io::Read`], and [`encode_frame`] produces the matching bytes for the
//! send path.

mod config;
mod error;
mod source;

pub use config::{FrameConfig, LengthPrefix, MAX_FRAME_LENGTH};
pub use error::{EncodeFrameError, EofError, FramingError, ReadError};
pub use source::{FrameSource, StreamFrameSource, encode_frame};
