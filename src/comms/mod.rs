//! A client connection assembled from the receiver and its collaborators.
//!
//! [`ClientComms`] owns one [`TcpStream`] and splits it three ways: a clone
//! feeds the [`Receiver`], another is handed to the [`Supervisor`] so teardown
//! can unblock the reader, and the original carries outbound requests.

use std::{
    io::{self, Write},
    net::{TcpStream, ToSocketAddrs},
    sync::{Arc, Mutex, PoisonError},
};

use tracing::{debug, info, warn};

use crate::{
    config::ReceiverConfig,
    error::CommsError,
    frame::{StreamFrameSource, encode_frame},
    message::Request,
    receiver::{Receiver, ReceiverState},
    state::ClientState,
    supervisor::{ConnectionSupervisor, Supervisor},
    token::{PendingOperation, TokenStore},
};

mod error;

pub use error::SendError;

/// A connected client: send path, receiver thread, and teardown.
///
/// Dropping a `ClientComms` disconnects it.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
///
/// use ackframe::{
///     comms::ClientComms,
///     config::ReceiverConfig,
///     message::{MessageId, QoS, Request},
///     state::SessionState,
/// };
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let (state, _deliveries) = SessionState::new();
/// let comms = ClientComms::connect("127.0.0.1:1883", Arc::new(state), ReceiverConfig::default())?;
/// comms.start()?;
/// let op = comms.send_tracked(&Request::Subscribe {
///     id: MessageId::new(1),
///     filters: vec![("sensors/#".into(), QoS::AtLeastOnce)],
/// })?;
/// op.wait()?;
/// comms.disconnect();
/// # Ok(())
/// # }
/// ```
pub struct ClientComms {
    tokens: Arc<TokenStore>,
    supervisor: Arc<Supervisor>,
    receiver: Receiver<StreamFrameSource<TcpStream>>,
    writer: Mutex<TcpStream>,
    config: ReceiverConfig,
}

impl std::fmt::Debug for ClientComms {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientComms")
            .field("supervisor", &self.supervisor)
            .field("receiver", &self.receiver)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ClientComms {
    /// Connect to `addr`. The receiver is not started.
    ///
    /// # Errors
    ///
    /// Returns any error from connecting or from cloning the socket.
    pub fn connect<A: ToSocketAddrs>(
        addr: A,
        state: Arc<dyn ClientState>,
        config: ReceiverConfig,
    ) -> io::Result<Self> {
        let stream = TcpStream::connect(addr)?;
        if let Ok(peer) = stream.peer_addr() {
            info!(%peer, "connected");
        }
        Self::from_stream(stream, state, config)
    }

    /// Wrap an already connected stream.
    ///
    /// # Errors
    ///
    /// Returns any error from cloning the socket.
    pub fn from_stream(
        stream: TcpStream,
        state: Arc<dyn ClientState>,
        config: ReceiverConfig,
    ) -> io::Result<Self> {
        let tokens = Arc::new(TokenStore::new());
        let supervisor = Arc::new(Supervisor::new(Arc::clone(&tokens)));
        supervisor.attach_transport(stream.try_clone()?);
        let source = StreamFrameSource::with_config(stream.try_clone()?, *config.frame_value());
        let receiver = Receiver::new(
            source,
            Arc::clone(&tokens),
            state,
            Arc::clone(&supervisor) as Arc<dyn ConnectionSupervisor>,
        );
        Ok(Self {
            tokens,
            supervisor,
            receiver,
            writer: Mutex::new(stream),
            config,
        })
    }

    /// Start the receiver thread. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn start(&self) -> io::Result<()> { self.receiver.start(self.config.thread_name_value()) }

    /// The supervisor tearing this connection down.
    #[must_use]
    pub fn supervisor(&self) -> &Arc<Supervisor> { &self.supervisor }

    /// Operations still awaiting acknowledgment.
    #[must_use]
    pub fn pending(&self) -> usize { self.tokens.len() }

    /// Run status of the receiver.
    #[must_use]
    pub fn receiver_state(&self) -> ReceiverState { self.receiver.state() }

    /// Returns `true` until a teardown starts.
    #[must_use]
    pub fn is_connected(&self) -> bool { self.supervisor.is_connected() }

    /// Register `request` and write it to the broker.
    ///
    /// The operation is registered and written under its own lock, so the
    /// receiver cannot resolve it before this call has marked it sent.
    ///
    /// # Errors
    ///
    /// Returns [`SendError::NotConnected`] once a teardown has started,
    /// [`SendError::Token`] if the identifier is already in flight,
    /// [`SendError::Encode`] if the request cannot be framed, and
    /// [`SendError::Io`] if the write fails. A failed write tears the
    /// connection down.
    pub fn send_tracked(&self, request: &Request) -> Result<Arc<PendingOperation>, SendError> {
        if !self.supervisor.is_connected() {
            return Err(SendError::NotConnected);
        }
        let id = request.id();
        let operation = Arc::new(PendingOperation::new(id));
        let mut guard = operation.lock();
        self.tokens.put(id, Arc::clone(&operation))?;
        if !self.supervisor.is_connected() {
            self.tokens.take(id);
            return Err(SendError::NotConnected);
        }

        let frame = match encode_frame(request, self.config.frame_value()) {
            Ok(frame) => frame,
            Err(error) => {
                self.tokens.take(id);
                return Err(error.into());
            }
        };

        let written = {
            let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
            writer.write_all(&frame).and_then(|()| writer.flush())
        };
        if let Err(error) = written {
            drop(guard);
            self.tokens.take(id);
            let cause = Arc::new(error);
            warn!(%id, %cause, "request write failed");
            self.supervisor.shutdown_connection(
                Some(Arc::clone(&operation)),
                CommsError::ConnectionLost(Arc::clone(&cause)),
            );
            return Err(SendError::Io(cause));
        }

        guard.mark_sent();
        debug!(%id, len = frame.len(), "request sent");
        drop(guard);
        Ok(operation)
    }

    /// Disconnect at the application's request.
    ///
    /// Closes the transport, stops the receiver, and fails every pending
    /// operation with [`CommsError::Disconnected`]. Later calls only make
    /// sure the receiver thread has exited.
    pub fn disconnect(&self) {
        if !self.supervisor.begin_disconnect() {
            debug!("connection already torn down");
            self.receiver.stop();
            return;
        }
        self.supervisor.close_transport();
        self.receiver.stop();
        self.supervisor.finish_disconnect(None, CommsError::Disconnected);
    }
}

impl Drop for ClientComms {
    fn drop(&mut self) { self.disconnect(); }
}
