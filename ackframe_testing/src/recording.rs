//! Recording implementations of the receiver's collaborators.

use std::{
    sync::{
        Arc,
        Condvar,
        Mutex,
        MutexGuard,
        PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

use ackframe::{
    error::CommsError,
    message::{Ack, Inbound, MessageId},
    state::ClientState,
    supervisor::ConnectionSupervisor,
    token::{OperationGuard, PendingOperation},
};

/// A frame as observed by [`RecordingClientState`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Observed {
    /// An acknowledgment, reported with the operation it resolved.
    Ack {
        /// The acknowledgment.
        ack: Ack,
        /// Identifier of the operation whose lock was held.
        operation: MessageId,
    },
    /// An uncorrelated inbound message.
    Message(Inbound),
}

/// Append-only log with a condition variable for waiting on its length.
#[derive(Debug)]
struct Log<T> {
    entries: Mutex<Vec<T>>,
    grew: Condvar,
}

impl<T: Clone> Log<T> {
    fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            grew: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<T>> { self.entries.lock().unwrap_or_else(PoisonError::into_inner) }

    fn push(&self, entry: T) {
        self.lock().push(entry);
        self.grew.notify_all();
    }

    fn snapshot(&self) -> Vec<T> { self.lock().clone() }

    fn wait_for(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut entries = self.lock();
        while entries.len() < count {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            entries = self
                .grew
                .wait_timeout(entries, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }
}

/// [`ClientState`] that records every notification in arrival order.
///
/// Acknowledgments complete their operation from [`Ack::outcome`], as the
/// default session state does.
#[derive(Debug)]
pub struct RecordingClientState {
    log: Log<Observed>,
}

impl Default for RecordingClientState {
    fn default() -> Self { Self { log: Log::new() } }
}

impl RecordingClientState {
    /// Create an empty recorder behind an [`Arc`].
    pub fn shared() -> Arc<Self> { Arc::new(Self::default()) }

    /// Everything observed so far, in order.
    pub fn observed(&self) -> Vec<Observed> { self.log.snapshot() }

    /// Inbound messages observed so far, in order.
    pub fn messages(&self) -> Vec<Inbound> {
        self.observed()
            .into_iter()
            .filter_map(|entry| match entry {
                Observed::Message(message) => Some(message),
                Observed::Ack { .. } => None,
            })
            .collect()
    }

    /// Block until `count` notifications have arrived or `timeout` elapses.
    pub fn wait_for(&self, count: usize, timeout: Duration) -> bool { self.log.wait_for(count, timeout) }
}

impl ClientState for RecordingClientState {
    fn notify_ack_received(&self, ack: Ack, operation: &mut OperationGuard<'_>) {
        operation.complete(ack.outcome());
        self.log.push(Observed::Ack {
            operation: operation.id(),
            ack,
        });
    }

    fn notify_message_received(&self, message: Inbound) { self.log.push(Observed::Message(message)); }
}

/// One call to [`ConnectionSupervisor::shutdown_connection`].
#[derive(Clone, Debug)]
pub struct Shutdown {
    /// Identifier of the operation passed along, if any.
    pub operation: Option<MessageId>,
    /// The error reported.
    pub error: CommsError,
}

/// [`ConnectionSupervisor`] that records shutdown requests.
///
/// Its disconnecting flag is controlled by the test.
#[derive(Debug)]
pub struct RecordingSupervisor {
    log: Log<Shutdown>,
    disconnecting: AtomicBool,
}

impl Default for RecordingSupervisor {
    fn default() -> Self {
        Self {
            log: Log::new(),
            disconnecting: AtomicBool::new(false),
        }
    }
}

impl RecordingSupervisor {
    /// Create a connected recorder behind an [`Arc`].
    pub fn shared() -> Arc<Self> { Arc::new(Self::default()) }

    /// Mark a disconnect as underway, or clear the mark.
    pub fn set_disconnecting(&self, disconnecting: bool) {
        self.disconnecting.store(disconnecting, Ordering::SeqCst);
    }

    /// Shutdown requests received so far.
    pub fn shutdowns(&self) -> Vec<Shutdown> { self.log.snapshot() }

    /// Block until `count` shutdown requests have arrived or `timeout`
    /// elapses.
    pub fn wait_for(&self, count: usize, timeout: Duration) -> bool { self.log.wait_for(count, timeout) }
}

impl ConnectionSupervisor for RecordingSupervisor {
    fn shutdown_connection(&self, operation: Option<Arc<PendingOperation>>, error: CommsError) {
        self.log.push(Shutdown {
            operation: operation.map(|op| op.id()),
            error,
        });
    }

    fn is_disconnecting(&self) -> bool { self.disconnecting.load(Ordering::SeqCst) }
}
