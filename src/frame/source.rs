//! Blocking frame source over a byte stream.

use std::io::{self, Read};

use bincode::Encode;
use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder, LengthDelimitedCodec};
use tracing::trace;

use super::{EncodeFrameError, EofError, FrameConfig, FramingError, MAX_FRAME_LENGTH, ReadError};
use crate::message::WireMessage;

const READ_CHUNK: usize = 8 * 1024;

/// Bincode settings for frame payloads.
///
/// The limit caps what a length field inside a payload may claim, so an
/// absurd collection length fails to decode instead of allocating.
fn wire_config() -> impl bincode::config::Config {
    bincode::config::standard().with_limit::<MAX_FRAME_LENGTH>()
}

/// Pulls one decoded frame at a time from an inbound stream.
///
/// Implementations block until a complete frame is available, the stream
/// closes, or the bytes received cannot be decoded. There is no timeout: a
/// caller wanting to abandon a blocked read must close the stream.
pub trait FrameSource {
    /// Read and decode the next frame.
    ///
    /// # Errors
    ///
    /// Returns [`ReadError::Io`] when the stream fails or closes (an EOF
    /// carries an [`EofError`]), and [`ReadError::Decode`] or
    /// [`ReadError::Framing`] when the bytes are not a valid frame.
    fn read_frame(&mut self) -> Result<WireMessage, ReadError>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn read_frame(&mut self) -> Result<WireMessage, ReadError> { (**self).read_frame() }
}

/// [`FrameSource`] reading length-prefixed bincode frames from a [`Read`].
///
/// # Examples
///
/// ```
/// use ackframe::{
///     frame::{FrameConfig, FrameSource, StreamFrameSource, encode_frame},
///     message::{Ack, WireMessage},
/// };
///
/// let config = FrameConfig::default();
/// let bytes = encode_frame(&WireMessage::from(Ack::pub_ack(5)), &config).expect("encode");
/// let mut source = StreamFrameSource::with_config(&bytes[..], config);
/// assert_eq!(source.read_frame().expect("frame"), WireMessage::from(Ack::pub_ack(5)));
/// assert!(source.read_frame().expect_err("stream is exhausted").is_clean_close());
/// ```
pub struct StreamFrameSource<R> {
    reader: R,
    codec: LengthDelimitedCodec,
    config: FrameConfig,
    buffer: BytesMut,
}

impl<R: Read> StreamFrameSource<R> {
    /// Wrap `reader` using the default [`FrameConfig`].
    pub fn new(reader: R) -> Self { Self::with_config(reader, FrameConfig::default()) }

    /// Wrap `reader` using `config`.
    pub fn with_config(reader: R, config: FrameConfig) -> Self {
        Self {
            reader,
            codec: config.build_codec(),
            config,
            buffer: BytesMut::with_capacity(READ_CHUNK),
        }
    }

    /// Borrow the underlying reader.
    pub fn get_ref(&self) -> &R { &self.reader }

    /// Return the underlying reader, discarding any buffered bytes.
    pub fn into_inner(self) -> R { self.reader }

    /// Split the next complete frame off the buffer, if one is present.
    ///
    /// The codec only ever sees whole frames so the buffer always starts at
    /// a length prefix; [`Self::eof`] relies on this.
    fn next_buffered(&mut self) -> Result<Option<BytesMut>, ReadError> {
        let prefix = self.config.length_prefix_value();
        let Some(length) = prefix.declared_length(&self.buffer) else {
            return Ok(None);
        };
        let max = self.config.effective_max();
        if length > max {
            return Err(FramingError::OversizedFrame { max }.into());
        }
        let needed = prefix.bytes() + length;
        if self.buffer.len() < needed {
            self.buffer.reserve(needed - self.buffer.len());
            return Ok(None);
        }
        self.codec
            .decode(&mut self.buffer)
            .map_err(|_| ReadError::from(FramingError::OversizedFrame { max }))
    }

    fn fill_buffer(&mut self) -> io::Result<usize> {
        let mut chunk = [0_u8; READ_CHUNK];
        loop {
            match self.reader.read(&mut chunk) {
                Ok(read) => {
                    self.buffer.extend_from_slice(&chunk[..read]);
                    return Ok(read);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
    }

    fn eof(&self) -> EofError {
        let prefix = self.config.length_prefix_value();
        let buffered = self.buffer.len();
        if buffered == 0 {
            return EofError::CleanClose;
        }
        match prefix.declared_length(&self.buffer) {
            Some(expected) => EofError::MidFrame {
                bytes_received: buffered - prefix.bytes(),
                expected,
            },
            None => EofError::MidHeader {
                bytes_received: buffered,
                header_size: prefix.bytes(),
            },
        }
    }
}

impl<R: Read> FrameSource for StreamFrameSource<R> {
    fn read_frame(&mut self) -> Result<WireMessage, ReadError> {
        loop {
            if let Some(frame) = self.next_buffered()? {
                return decode_message(&frame);
            }
            if self.fill_buffer()? == 0 {
                return Err(ReadError::Io(self.eof().into()));
            }
        }
    }
}

fn decode_message(frame: &[u8]) -> Result<WireMessage, ReadError> {
    let (message, consumed): (WireMessage, usize) =
        bincode::decode_from_slice(frame, wire_config())?;
    if consumed != frame.len() {
        return Err(FramingError::TrailingBytes {
            count: frame.len() - consumed,
        }
        .into());
    }
    trace!(len = frame.len(), ack = message.is_ack(), "decoded frame");
    Ok(message)
}

/// Encode `message` as a single length-prefixed frame.
///
/// # Errors
///
/// Returns [`EncodeFrameError`] if serialization fails or the payload exceeds
/// the configured maximum.
pub fn encode_frame<M: Encode>(message: &M, config: &FrameConfig) -> Result<Bytes, EncodeFrameError> {
    let payload = bincode::encode_to_vec(message, wire_config())?;
    let size = payload.len();
    let max = config.effective_max();
    if size > max {
        return Err(EncodeFrameError::Oversized { size, max });
    }
    let mut buffer = BytesMut::with_capacity(config.length_prefix_value().bytes() + size);
    config
        .build_codec()
        .encode(Bytes::from(payload), &mut buffer)
        .map_err(|_| EncodeFrameError::Oversized { size, max })?;
    Ok(buffer.freeze())
}
