//! Shared utilities for integration tests.
//!
//! Wires a [`Receiver`] to the recording collaborators from
//! `ackframe_testing` and provides a loopback listener for socket tests.

// Items in this shared module may not be used by all test binaries that import it.
#![allow(
    dead_code,
    reason = "shared test utilities are not used by all test binaries"
)]

use std::{
    net::{Ipv4Addr, SocketAddr, TcpListener},
    sync::Arc,
    time::Duration,
};

use ackframe::{
    frame::FrameSource,
    message::MessageId,
    receiver::Receiver,
    token::{PendingOperation, TokenStore},
};
use ackframe_testing::{RecordingClientState, RecordingSupervisor};

/// Result type for fallible tests.
pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Upper bound for anything a test waits on.
pub const WAIT: Duration = Duration::from_secs(5);

/// A receiver together with the collaborators it reports to.
pub struct Rig<S> {
    pub tokens: Arc<TokenStore>,
    pub state: Arc<RecordingClientState>,
    pub supervisor: Arc<RecordingSupervisor>,
    pub receiver: Arc<Receiver<S>>,
}

impl<S: FrameSource + Send + 'static> Rig<S> {
    /// Build a stopped receiver reading from `source`.
    pub fn new(source: S) -> Self {
        let tokens = Arc::new(TokenStore::new());
        let state = RecordingClientState::shared();
        let supervisor = RecordingSupervisor::shared();
        let receiver = Arc::new(Receiver::new(
            source,
            Arc::clone(&tokens),
            state.clone(),
            supervisor.clone(),
        ));
        Self {
            tokens,
            state,
            supervisor,
            receiver,
        }
    }

    /// Register a pending operation under `id`.
    pub fn register(&self, id: u16) -> TestResult<Arc<PendingOperation>> {
        let op = Arc::new(PendingOperation::new(MessageId::new(id)));
        self.tokens.put(op.id(), Arc::clone(&op))?;
        Ok(op)
    }
}

/// Create a TCP listener bound to a free local port.
pub fn unused_listener() -> TestResult<TcpListener> {
    Ok(TcpListener::bind(SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 0))?)
}
