//! Completion state of a single in-flight request.

#[cfg(not(loom))]
use std::sync::{Condvar, Mutex, MutexGuard};
use std::{
    sync::PoisonError,
    time::{Duration, Instant},
};

#[cfg(loom)]
use loom::sync::{Condvar, Mutex, MutexGuard};
use tracing::debug;

use crate::{
    error::CommsError,
    message::{AckKind, MessageId},
};

/// Result delivered to whoever waits on a [`PendingOperation`].
pub type Outcome = Result<AckKind, CommsError>;

#[derive(Debug, Default)]
struct Phase {
    /// Set once the send path has handed the request to the transport.
    sent: bool,
    outcome: Option<Outcome>,
}

/// A request awaiting its acknowledgment.
///
/// Each operation carries its own lock. The send path holds it while it
/// registers and writes the request; the receiver holds it while the
/// acknowledgment is processed. Resolution therefore never becomes visible
/// before the send path has finished with the same operation, and unrelated
/// operations never contend.
///
/// An operation completes at most once; later completions are ignored.
#[derive(Debug)]
pub struct PendingOperation {
    id: MessageId,
    phase: Mutex<Phase>,
    completed: Condvar,
}

/// Exclusive access to a [`PendingOperation`]'s completion state.
///
/// Waiters are woken when the state is completed; they observe the outcome
/// once the guard is dropped.
pub struct OperationGuard<'a> {
    id: MessageId,
    phase: MutexGuard<'a, Phase>,
    completed: &'a Condvar,
}

impl PendingOperation {
    /// Create an operation for the request carrying `id`.
    #[must_use]
    pub fn new(id: MessageId) -> Self {
        Self {
            id,
            phase: Mutex::new(Phase::default()),
            completed: Condvar::new(),
        }
    }

    /// Correlation identifier of the request.
    #[must_use]
    pub fn id(&self) -> MessageId { self.id }

    /// Acquire exclusive access to this operation.
    pub fn lock(&self) -> OperationGuard<'_> {
        OperationGuard {
            id: self.id,
            phase: self.phase.lock().unwrap_or_else(PoisonError::into_inner),
            completed: &self.completed,
        }
    }

    /// Fail the operation with `error` unless it has already completed.
    ///
    /// Returns `true` if this call completed the operation.
    pub fn fail(&self, error: CommsError) -> bool { self.lock().complete(Err(error)) }

    /// Returns `true` once an outcome has been recorded.
    #[must_use]
    pub fn is_complete(&self) -> bool { self.lock().is_complete() }

    /// Block until the operation completes and return its outcome.
    ///
    /// # Errors
    ///
    /// Returns the [`CommsError`] the operation was failed with.
    pub fn wait(&self) -> Outcome {
        let mut phase = self.phase.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(outcome) = &phase.outcome {
                return outcome.clone();
            }
            phase = self
                .completed
                .wait(phase)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Like [`Self::wait`] but gives up after `timeout`, returning `None`.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Outcome> {
        let deadline = Instant::now() + timeout;
        let mut phase = self.phase.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(outcome) = &phase.outcome {
                return Some(outcome.clone());
            }
            let remaining = deadline
                .checked_duration_since(Instant::now())
                .filter(|left| !left.is_zero())?;
            phase = self
                .completed
                .wait_timeout(phase, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}

impl OperationGuard<'_> {
    /// Correlation identifier of the guarded operation.
    #[must_use]
    pub fn id(&self) -> MessageId { self.id }

    /// Record that the request has been handed to the transport.
    pub fn mark_sent(&mut self) { self.phase.sent = true; }

    /// Returns `true` once the send path has finished with the request.
    #[must_use]
    pub fn is_sent(&self) -> bool { self.phase.sent }

    /// Returns `true` once an outcome has been recorded.
    #[must_use]
    pub fn is_complete(&self) -> bool { self.phase.outcome.is_some() }

    /// Record `outcome` and wake every waiter.
    ///
    /// Returns `false`, leaving the first outcome in place, if the operation
    /// had already completed.
    pub fn complete(&mut self, outcome: Outcome) -> bool {
        if self.is_complete() {
            debug!(id = %self.id, "operation already complete; outcome ignored");
            return false;
        }
        self.phase.outcome = Some(outcome);
        self.completed.notify_all();
        true
    }
}
