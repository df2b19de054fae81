//! Registry of in-flight operations keyed by correlation identifier.
//!
//! [`TokenStore`] is shared between the send path, which registers an
//! operation before writing its request, and the receiver, which removes the
//! operation when the acknowledgment arrives. Every access is an atomic
//! operation on a sharded map, so neither side ever observes a half-applied
//! update.

use std::sync::Arc;

use dashmap::{DashMap, mapref::entry::Entry};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{message::MessageId, metrics};

mod pending;

pub use pending::{OperationGuard, Outcome, PendingOperation};

/// Invariant violations reported by [`TokenStore`].
#[non_exhaustive]
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    /// An operation is already registered under the identifier.
    #[error("message id {0} is already in flight")]
    DuplicateId(MessageId),
}

/// Concurrent map of pending operations keyed by [`MessageId`].
#[derive(Debug, Default)]
pub struct TokenStore(DashMap<MessageId, Arc<PendingOperation>>);

impl TokenStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Register `operation` under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::DuplicateId`] if `id` is already registered; the
    /// existing registration is left untouched.
    pub fn put(&self, id: MessageId, operation: Arc<PendingOperation>) -> Result<(), TokenError> {
        debug_assert_eq!(id, operation.id(), "operation registered under a foreign id");
        match self.0.entry(id) {
            Entry::Occupied(_) => {
                warn!(%id, "rejected duplicate registration");
                return Err(TokenError::DuplicateId(id));
            }
            Entry::Vacant(slot) => {
                slot.insert(operation);
            }
        }
        metrics::inc_pending();
        debug!(%id, "operation registered");
        Ok(())
    }

    /// Remove and return the operation registered under `id`.
    ///
    /// At most one caller obtains a given registration.
    pub fn take(&self, id: MessageId) -> Option<Arc<PendingOperation>> {
        let (_, operation) = self.0.remove(&id)?;
        metrics::dec_pending(1);
        Some(operation)
    }

    /// Remove and return every registered operation.
    ///
    /// `DashMap::retain` write-locks one shard at a time, so registrations
    /// racing with the drain either land in the result or remain in the store.
    #[must_use]
    pub fn drain_all(&self) -> Vec<Arc<PendingOperation>> {
        let mut drained = Vec::with_capacity(self.0.len());
        self.0.retain(|_, operation| {
            drained.push(Arc::clone(operation));
            false
        });
        metrics::dec_pending(drained.len());
        drained
    }

    /// Returns `true` if an operation is registered under `id`.
    #[must_use]
    pub fn contains(&self, id: MessageId) -> bool { self.0.contains_key(&id) }

    /// Number of registered operations.
    #[must_use]
    pub fn len(&self) -> usize { self.0.len() }

    /// Returns `true` when nothing is in flight.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.0.is_empty() }
}
