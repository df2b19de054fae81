//! Connection teardown.
//!
//! [`ConnectionSupervisor`] is what the receiver escalates to when its loop
//! ends abnormally. [`Supervisor`] is the stock implementation: a
//! `Connected → Disconnecting → Disconnected` state machine guarded by a
//! compare-and-swap so that exactly one teardown runs, whether it was started
//! by the receiver thread or by the application.

use std::{
    io,
    net::{Shutdown, TcpStream},
    sync::{
        Arc,
        Mutex,
        PoisonError,
        atomic::{AtomicU8, Ordering},
    },
};

use log::{debug, info, warn};

use crate::{
    error::CommsError,
    token::{PendingOperation, TokenStore},
};

/// Owner of the connection lifecycle, notified when the receiver stops.
pub trait ConnectionSupervisor: Send + Sync {
    /// Tear the connection down.
    ///
    /// `operation` is the operation being processed when the failure was
    /// detected, if any. It and every other pending operation must observe
    /// `error`. Calls made while a teardown is underway are no-ops.
    fn shutdown_connection(&self, operation: Option<Arc<PendingOperation>>, error: CommsError);

    /// Returns `true` once a disconnect has started, so that the stream
    /// closing underneath the receiver is expected rather than a failure.
    fn is_disconnecting(&self) -> bool;
}

/// A byte stream the supervisor can close to unblock its reader.
pub trait Transport: Send + Sync {
    /// Close both directions of the stream.
    ///
    /// # Errors
    ///
    /// Returns the error reported by the underlying stream.
    fn close(&self) -> io::Result<()>;
}

impl Transport for TcpStream {
    fn close(&self) -> io::Result<()> { self.shutdown(Shutdown::Both) }
}

/// Callback run once when the connection is torn down.
pub type TeardownHook = Box<dyn FnOnce(&CommsError) + Send + 'static>;

const CONNECTED: u8 = 0;
const DISCONNECTING: u8 = 1;
const DISCONNECTED: u8 = 2;

/// Default [`ConnectionSupervisor`].
pub struct Supervisor {
    state: AtomicU8,
    tokens: Arc<TokenStore>,
    transport: Mutex<Option<Box<dyn Transport>>>,
    hooks: Mutex<Vec<TeardownHook>>,
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("state", &self.state.load(Ordering::Acquire))
            .field("pending", &self.tokens.len())
            .finish_non_exhaustive()
    }
}

impl Supervisor {
    /// Create a connected supervisor failing operations from `tokens` on
    /// teardown.
    #[must_use]
    pub fn new(tokens: Arc<TokenStore>) -> Self {
        Self {
            state: AtomicU8::new(CONNECTED),
            tokens,
            transport: Mutex::new(None),
            hooks: Mutex::new(Vec::new()),
        }
    }

    /// Set the stream released on teardown.
    pub fn attach_transport(&self, transport: impl Transport + 'static) {
        *self.transport.lock().unwrap_or_else(PoisonError::into_inner) = Some(Box::new(transport));
    }

    /// Register `hook` to run during teardown, before pending operations are
    /// failed.
    pub fn on_teardown(&self, hook: impl FnOnce(&CommsError) + Send + 'static) {
        self.hooks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(hook));
    }

    /// Returns `true` until a teardown starts.
    #[must_use]
    pub fn is_connected(&self) -> bool { self.state.load(Ordering::Acquire) == CONNECTED }

    /// Returns `true` once a teardown has finished.
    #[must_use]
    pub fn is_disconnected(&self) -> bool { self.state.load(Ordering::Acquire) == DISCONNECTED }

    /// Claim the teardown.
    ///
    /// Returns `true` for exactly one caller over the supervisor's lifetime;
    /// only that caller may invoke [`Self::finish_disconnect`].
    pub fn begin_disconnect(&self) -> bool {
        self.state
            .compare_exchange(CONNECTED, DISCONNECTING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Close the transport, unblocking any reader. Idempotent.
    pub fn close_transport(&self) {
        let transport = self
            .transport
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Err(error) = transport.map_or(Ok(()), |transport| transport.close()) {
            debug!("closing transport failed: {error}");
        }
    }

    /// Complete a teardown claimed with [`Self::begin_disconnect`].
    ///
    /// Runs the teardown hooks, fails `operation` and every registered
    /// operation with `error`, and releases the transport.
    pub fn finish_disconnect(&self, operation: Option<Arc<PendingOperation>>, error: CommsError) {
        if self.state.load(Ordering::Acquire) != DISCONNECTING {
            warn!("finish_disconnect called without a claimed teardown");
            return;
        }
        self.close_transport();

        let hooks = std::mem::take(&mut *self.hooks.lock().unwrap_or_else(PoisonError::into_inner));
        for hook in hooks {
            hook(&error);
        }

        let mut failed = 0_usize;
        for pending in operation.into_iter().chain(self.tokens.drain_all()) {
            if pending.fail(error.clone()) {
                failed += 1;
            }
        }

        self.state.store(DISCONNECTED, Ordering::Release);
        info!(
            "connection torn down: reason={:?}, failed_operations={failed}, error={error}",
            error.reason_code()
        );
    }
}

impl ConnectionSupervisor for Supervisor {
    fn shutdown_connection(&self, operation: Option<Arc<PendingOperation>>, error: CommsError) {
        if !self.begin_disconnect() {
            debug!("teardown already underway; ignoring shutdown request: {error}");
            if let Some(operation) = operation {
                operation.fail(error);
            }
            return;
        }
        self.finish_disconnect(operation, error);
    }

    fn is_disconnecting(&self) -> bool { self.state.load(Ordering::Acquire) != CONNECTED }
}
