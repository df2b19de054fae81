//! Session state notified by the receiver.
//!
//! [`ClientState`] is the seam through which the receiver hands over every
//! frame it reads: acknowledgments together with the locked operation they
//! resolve, and everything else for delivery to the application.
//! [`SessionState`] is the stock implementation; it completes operations from
//! their acknowledgments and queues inbound messages on an unbounded channel
//! drained through [`Deliveries`].

use std::sync::{
    Mutex,
    PoisonError,
    atomic::{AtomicU64, Ordering},
};

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::{
    message::{Ack, Inbound},
    token::OperationGuard,
};

/// Receives the frames read off the connection, in wire order.
///
/// Both entry points run on the receiver thread. They must not block on
/// network I/O: the receiver reads nothing else until they return.
pub trait ClientState: Send + Sync {
    /// Resolve the operation acknowledged by `ack`.
    ///
    /// The caller holds `operation`'s lock for the duration of the call.
    fn notify_ack_received(&self, ack: Ack, operation: &mut OperationGuard<'_>);

    /// Hand an uncorrelated inbound message to the delivery path.
    fn notify_message_received(&self, message: Inbound);
}

/// Default [`ClientState`] implementation.
///
/// # Examples
///
/// ```
/// use ackframe::{
///     message::{Inbound, MessageId},
///     state::{ClientState, SessionState},
/// };
///
/// let (state, mut deliveries) = SessionState::new();
/// state.notify_message_received(Inbound::PubRel { id: MessageId::new(3) });
/// assert_eq!(
///     deliveries.try_recv(),
///     Some(Inbound::PubRel { id: MessageId::new(3) })
/// );
/// ```
#[derive(Debug)]
pub struct SessionState {
    deliveries: Mutex<Option<mpsc::UnboundedSender<Inbound>>>,
    acks_received: AtomicU64,
    messages_received: AtomicU64,
}

/// Receiving half of the delivery queue fed by [`SessionState`].
#[derive(Debug)]
pub struct Deliveries(mpsc::UnboundedReceiver<Inbound>);

impl SessionState {
    /// Create a session state and the queue its messages are delivered to.
    #[must_use]
    pub fn new() -> (Self, Deliveries) {
        let (tx, rx) = mpsc::unbounded_channel();
        let state = Self {
            deliveries: Mutex::new(Some(tx)),
            acks_received: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
        };
        (state, Deliveries(rx))
    }

    /// Stop delivering messages. [`Deliveries`] yields `None` once drained.
    pub fn close_deliveries(&self) {
        let sender = self
            .deliveries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if sender.is_some() {
            debug!("delivery queue closed");
        }
    }

    /// Number of acknowledgments processed so far.
    #[must_use]
    pub fn acks_received(&self) -> u64 { self.acks_received.load(Ordering::Relaxed) }

    /// Number of inbound messages processed so far.
    #[must_use]
    pub fn messages_received(&self) -> u64 { self.messages_received.load(Ordering::Relaxed) }
}

impl ClientState for SessionState {
    fn notify_ack_received(&self, ack: Ack, operation: &mut OperationGuard<'_>) {
        self.acks_received.fetch_add(1, Ordering::Relaxed);
        let outcome = ack.outcome();
        if let Err(error) = &outcome {
            warn!(id = %ack.id(), %error, "request refused");
        }
        if operation.complete(outcome) {
            debug!(id = %ack.id(), "operation resolved");
        }
    }

    fn notify_message_received(&self, message: Inbound) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        let deliveries = self.deliveries.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(tx) = deliveries.as_ref() else {
            debug!(?message, "delivery queue closed; message discarded");
            return;
        };
        if let Err(mpsc::error::SendError(message)) = tx.send(message) {
            debug!(?message, "no consumer for deliveries; message discarded");
        }
    }
}

impl Deliveries {
    /// Await the next delivered message.
    ///
    /// Returns `None` once the session has closed its queue and every queued
    /// message has been received.
    pub async fn recv(&mut self) -> Option<Inbound> { self.0.recv().await }

    /// Block the current thread until the next message is delivered.
    ///
    /// # Panics
    ///
    /// Panics if called from within an asynchronous execution context.
    pub fn blocking_recv(&mut self) -> Option<Inbound> { self.0.blocking_recv() }

    /// Return a queued message without waiting.
    pub fn try_recv(&mut self) -> Option<Inbound> { self.0.try_recv().ok() }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        error::CommsError,
        message::{AckKind, MessageId, SUBSCRIBE_FAILURE},
        token::PendingOperation,
    };

    #[test]
    fn ack_completes_the_locked_operation() {
        let (state, _deliveries) = SessionState::new();
        let op = Arc::new(PendingOperation::new(MessageId::new(5)));

        state.notify_ack_received(Ack::pub_ack(5), &mut op.lock());

        assert!(matches!(op.wait(), Ok(AckKind::PubAck)));
        assert_eq!(state.acks_received(), 1);
    }

    #[test]
    fn refused_subscription_fails_the_operation() {
        let (state, _deliveries) = SessionState::new();
        let op = PendingOperation::new(MessageId::new(2));

        state.notify_ack_received(Ack::sub_ack(2, vec![SUBSCRIBE_FAILURE]), &mut op.lock());

        assert!(matches!(op.wait(), Err(CommsError::Refused { .. })));
    }

    #[tokio::test]
    async fn messages_reach_the_async_consumer_in_order() {
        let (state, mut deliveries) = SessionState::new();
        state.notify_message_received(Inbound::PingResp);
        state.notify_message_received(Inbound::PubRel {
            id: MessageId::new(1),
        });
        state.close_deliveries();

        assert_eq!(deliveries.recv().await, Some(Inbound::PingResp));
        assert_eq!(
            deliveries.recv().await,
            Some(Inbound::PubRel {
                id: MessageId::new(1)
            })
        );
        assert_eq!(deliveries.recv().await, None);
    }

    #[test]
    fn dropped_consumer_does_not_block_delivery() {
        let (state, deliveries) = SessionState::new();
        drop(deliveries);
        state.notify_message_received(Inbound::PingResp);
        assert_eq!(state.messages_received(), 1);
    }
}
