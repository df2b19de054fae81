//! Messages exchanged with the broker.
//!
//! Inbound traffic decodes into a [`WireMessage`]: either an [`Ack`] that
//! answers a request this client issued, or an [`Inbound`] message the broker
//! pushed on its own. Outbound requests that expect an acknowledgment are
//! modelled by [`Request`].

use bincode::{Decode, Encode};

use crate::error::CommsError;

/// Return code a broker places in a subscribe acknowledgment for a filter it
/// refused.
pub const SUBSCRIBE_FAILURE: u8 = 0x80;

/// Correlation identifier pairing a request with its acknowledgment.
///
/// Identifiers are unique among the operations outstanding on a connection at
/// any one time; they are recycled once the acknowledgment has arrived.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Encode, Decode)]
pub struct MessageId(u16);

impl MessageId {
    /// Create a new [`MessageId`].
    #[must_use]
    pub const fn new(id: u16) -> Self { Self(id) }

    /// Return the raw identifier.
    #[must_use]
    pub const fn get(self) -> u16 { self.0 }
}

impl From<u16> for MessageId {
    fn from(value: u16) -> Self { Self(value) }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "{}", self.0) }
}

/// Delivery guarantee requested for a publish or subscription.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Encode, Decode)]
pub enum QoS {
    #[default]
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
}

/// The request an acknowledgment answers.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub enum AckKind {
    /// Publish acknowledged (QoS 1).
    PubAck,
    /// Publish exchange complete (QoS 2).
    PubComp,
    /// Subscribe acknowledged with one return code per requested filter.
    SubAck {
        /// Granted QoS per filter, or [`SUBSCRIBE_FAILURE`].
        return_codes: Vec<u8>,
    },
    /// Unsubscribe acknowledged.
    UnsubAck,
}

/// An acknowledgment frame. Immutable once decoded.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct Ack {
    id: MessageId,
    kind: AckKind,
}

impl Ack {
    /// Create an acknowledgment for `id`.
    #[must_use]
    pub fn new(id: MessageId, kind: AckKind) -> Self { Self { id, kind } }

    /// Shorthand for a publish acknowledgment.
    #[must_use]
    pub fn pub_ack(id: u16) -> Self { Self::new(MessageId::new(id), AckKind::PubAck) }

    /// Shorthand for an unsubscribe acknowledgment.
    #[must_use]
    pub fn unsub_ack(id: u16) -> Self { Self::new(MessageId::new(id), AckKind::UnsubAck) }

    /// Shorthand for a subscribe acknowledgment.
    #[must_use]
    pub fn sub_ack(id: u16, return_codes: Vec<u8>) -> Self {
        Self::new(MessageId::new(id), AckKind::SubAck { return_codes })
    }

    /// Correlation identifier of the request being acknowledged.
    #[must_use]
    pub fn id(&self) -> MessageId { self.id }

    /// The kind of acknowledgment.
    #[must_use]
    pub fn kind(&self) -> &AckKind { &self.kind }

    /// Interpret the acknowledgment as the outcome of its operation.
    ///
    /// A subscribe acknowledgment carrying [`SUBSCRIBE_FAILURE`] for any filter
    /// fails the whole operation.
    ///
    /// # Errors
    ///
    /// Returns [`CommsError::Refused`] when the broker rejected the request.
    pub fn outcome(&self) -> Result<AckKind, CommsError> {
        let refused = match &self.kind {
            AckKind::SubAck { return_codes } => return_codes.contains(&SUBSCRIBE_FAILURE),
            _ => false,
        };
        if refused {
            return Err(CommsError::Refused {
                id: self.id,
                code: SUBSCRIBE_FAILURE,
            });
        }
        Ok(self.kind.clone())
    }
}

/// Application message published by the broker.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct Publish {
    /// Present for QoS 1 and 2 deliveries.
    pub id: Option<MessageId>,
    pub topic: String,
    pub qos: QoS,
    pub retained: bool,
    pub payload: Vec<u8>,
}

/// Inbound message that is not correlated with a local request.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub enum Inbound {
    /// Server-pushed delivery for one of our subscriptions.
    Publish(Publish),
    /// Second step of an inbound QoS 2 delivery.
    PubRel { id: MessageId },
    /// Keep-alive response.
    PingResp,
}

/// A decoded inbound frame.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub enum WireMessage {
    Ack(Ack),
    Inbound(Inbound),
}

impl WireMessage {
    /// Return `true` if this frame acknowledges a local request.
    #[must_use]
    pub fn is_ack(&self) -> bool { matches!(self, Self::Ack(_)) }
}

impl From<Ack> for WireMessage {
    fn from(ack: Ack) -> Self { Self::Ack(ack) }
}

impl From<Inbound> for WireMessage {
    fn from(message: Inbound) -> Self { Self::Inbound(message) }
}

/// Outbound request answered by an [`Ack`].
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub enum Request {
    Subscribe {
        id: MessageId,
        filters: Vec<(String, QoS)>,
    },
    Unsubscribe {
        id: MessageId,
        filters: Vec<String>,
    },
    Publish {
        id: MessageId,
        topic: String,
        qos: QoS,
        payload: Vec<u8>,
    },
}

impl Request {
    /// Correlation identifier carried by the request.
    #[must_use]
    pub fn id(&self) -> MessageId {
        match self {
            Self::Subscribe { id, .. } | Self::Unsubscribe { id, .. } | Self::Publish { id, .. } => {
                *id
            }
        }
    }
}
