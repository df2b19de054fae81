//! Canonical failure type delivered to pending operations and to the
//! connection supervisor.
//!
//! A single [`CommsError`] fans out to every operation failed by a teardown,
//! so it is cheaply cloneable: underlying causes are shared behind [`Arc`].

use std::{io, sync::Arc};

use thiserror::Error;

use crate::{frame::ReadError, message::MessageId};

/// Stable reason codes reported alongside a [`CommsError`].
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReasonCode {
    /// The peer broke the protocol contract.
    UnexpectedError,
    /// The connection failed underneath the client.
    ConnectionLost,
    /// The application asked the client to disconnect.
    ClientDisconnecting,
    /// The broker refused a subscription.
    SubscribeFailed,
}

impl ReasonCode {
    /// Numeric form of the code.
    #[must_use]
    pub fn as_u16(self) -> u16 {
        match self {
            ReasonCode::UnexpectedError => 6,
            ReasonCode::ConnectionLost => 32_109,
            ReasonCode::ClientDisconnecting => 32_102,
            ReasonCode::SubscribeFailed => 128,
        }
    }
}

/// Errors observed by pending operations and the connection supervisor.
#[non_exhaustive]
#[derive(Clone, Debug, Error)]
pub enum CommsError {
    /// An acknowledgment arrived for an identifier with no pending operation.
    #[error("acknowledgment for message id {id} matches no pending operation")]
    UnexpectedAck {
        /// Identifier carried by the stray acknowledgment.
        id: MessageId,
    },
    /// An inbound frame could not be decoded.
    #[error("malformed inbound frame: {0}")]
    Decode(#[source] Arc<ReadError>),
    /// The stream failed or was closed by the peer.
    #[error("connection lost: {0}")]
    ConnectionLost(#[source] Arc<io::Error>),
    /// The application disconnected while the operation was pending.
    #[error("client is disconnecting")]
    Disconnected,
    /// The broker rejected the request.
    #[error("request {id} refused by broker with return code {code:#04x}")]
    Refused {
        /// Identifier of the refused request.
        id: MessageId,
        /// Return code sent by the broker.
        code: u8,
    },
    /// The frame source or a session state callback panicked inside the
    /// receive loop.
    #[error("receive loop panicked: {reason}")]
    HandlerPanicked {
        /// Panic payload rendered as text.
        reason: String,
    },
}

impl CommsError {
    /// Wrap an I/O failure as a lost connection.
    #[must_use]
    pub fn connection_lost(cause: io::Error) -> Self { Self::ConnectionLost(Arc::new(cause)) }

    /// Reason code for this error.
    #[must_use]
    pub fn reason_code(&self) -> ReasonCode {
        match self {
            Self::UnexpectedAck { .. } | Self::Decode(_) | Self::HandlerPanicked { .. } => {
                ReasonCode::UnexpectedError
            }
            Self::ConnectionLost(_) => ReasonCode::ConnectionLost,
            Self::Disconnected => ReasonCode::ClientDisconnecting,
            Self::Refused { .. } => ReasonCode::SubscribeFailed,
        }
    }

    /// Returns `true` for protocol violations by the peer.
    #[must_use]
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, Self::UnexpectedAck { .. } | Self::Decode(_))
    }
}

impl From<ReadError> for CommsError {
    fn from(error: ReadError) -> Self {
        match error {
            ReadError::Io(cause) => Self::connection_lost(cause),
            other => Self::Decode(Arc::new(other)),
        }
    }
}
