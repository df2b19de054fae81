//! Error types for the send path.

use std::{io, sync::Arc};

use crate::{frame::EncodeFrameError, token::TokenError};

/// Errors returned by [`crate::comms::ClientComms::send_tracked`].
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// The identifier is already in flight.
    #[error(transparent)]
    Token(#[from] TokenError),
    /// The request could not be framed.
    #[error("failed to encode request: {0}")]
    Encode(#[from] EncodeFrameError),
    /// Writing the request failed; the connection has been torn down.
    #[error("failed to write request: {0}")]
    Io(#[source] Arc<io::Error>),
    /// The connection is disconnecting or gone.
    #[error("client is not connected")]
    NotConnected,
}
