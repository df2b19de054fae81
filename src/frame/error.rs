//! Errors raised while pulling frames off the stream.
//!
//! A [`ReadError`] is either fatal to the stream ([`ReadError::Io`], which
//! includes every flavour of end-of-stream) or fatal to the protocol session
//! ([`ReadError::Decode`] and [`ReadError::Framing`]). Neither is retried.

use std::io;

use bincode::error::{DecodeError, EncodeError};
use thiserror::Error;

/// Frame boundary violations.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FramingError {
    /// Length prefix exceeds the configured maximum.
    #[error("frame exceeds max length of {max} bytes")]
    OversizedFrame {
        /// Maximum allowed payload size.
        max: usize,
    },
    /// The payload decoded to a message before its end.
    #[error("{count} trailing bytes after decoded message")]
    TrailingBytes {
        /// Bytes left over after decoding.
        count: usize,
    },
}

/// End-of-stream conditions, carried inside an
/// [`io::ErrorKind::UnexpectedEof`] error.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum EofError {
    /// Peer closed the stream at a frame boundary.
    #[error("connection closed cleanly at frame boundary")]
    CleanClose,
    /// Peer closed the stream part way through a payload.
    #[error("premature EOF: {bytes_received} bytes of {expected} byte frame received")]
    MidFrame {
        /// Payload bytes received before EOF.
        bytes_received: usize,
        /// Payload length declared by the prefix.
        expected: usize,
    },
    /// Peer closed the stream part way through a length prefix.
    #[error("premature EOF in header: {bytes_received} of {header_size} bytes received")]
    MidHeader {
        /// Prefix bytes received before EOF.
        bytes_received: usize,
        /// Size of the length prefix.
        header_size: usize,
    },
}

impl From<EofError> for io::Error {
    fn from(eof: EofError) -> Self { io::Error::new(io::ErrorKind::UnexpectedEof, eof) }
}

/// Failure to obtain the next inbound frame.
#[derive(Debug, Error)]
pub enum ReadError {
    /// The payload is not a valid message.
    #[error("failed to decode frame payload: {0}")]
    Decode(#[from] DecodeError),
    /// The frame boundary is invalid.
    #[error(transparent)]
    Framing(#[from] FramingError),
    /// The stream failed or closed.
    #[error("stream error: {0}")]
    Io(#[from] io::Error),
}

impl ReadError {
    /// Returns `true` when the stream itself failed or closed.
    #[must_use]
    pub fn is_io(&self) -> bool { matches!(self, Self::Io(_)) }

    /// Return the end-of-stream detail, if this error reports one.
    #[must_use]
    pub fn eof(&self) -> Option<&EofError> {
        match self {
            Self::Io(error) => error.get_ref().and_then(|inner| inner.downcast_ref::<EofError>()),
            _ => None,
        }
    }

    /// Returns `true` if the peer closed the stream at a frame boundary.
    #[must_use]
    pub fn is_clean_close(&self) -> bool { matches!(self.eof(), Some(EofError::CleanClose)) }
}

/// Failure to encode an outbound frame.
#[derive(Debug, Error)]
pub enum EncodeFrameError {
    /// The message could not be serialized.
    #[error("failed to encode message: {0}")]
    Encode(#[from] EncodeError),
    /// The serialized message exceeds the configured maximum.
    #[error("encoded message of {size} bytes exceeds max length of {max}")]
    Oversized {
        /// Serialized size.
        size: usize,
        /// Maximum allowed payload size.
        max: usize,
    },
}
