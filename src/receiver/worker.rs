//! Body of the receiver thread.

use std::{
    any::Any,
    io,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::Arc,
};

use tracing::{debug, trace, warn};

use super::{ExitSignal, RunFlag};
use crate::{
    error::CommsError,
    frame::{FrameSource, ReadError},
    message::WireMessage,
    metrics::{self, FrameKind},
    panic::format_panic,
    state::ClientState,
    supervisor::ConnectionSupervisor,
    token::{PendingOperation, TokenStore},
};

/// Why the loop stopped on its own.
enum Fatal {
    /// The peer broke the protocol, or the source or a handler panicked.
    Protocol {
        operation: Option<Arc<PendingOperation>>,
        error: CommsError,
    },
    /// The stream failed or reached end of input.
    Stream(io::Error),
}

impl Fatal {
    fn protocol(error: CommsError) -> Self {
        Self::Protocol {
            operation: None,
            error,
        }
    }

    fn panicked(payload: &(dyn Any + Send), operation: Option<Arc<PendingOperation>>) -> Self {
        Self::Protocol {
            operation,
            error: CommsError::HandlerPanicked {
                reason: format_panic(payload).to_string(),
            },
        }
    }
}

impl From<ReadError> for Fatal {
    fn from(error: ReadError) -> Self {
        match error {
            ReadError::Io(cause) => Self::Stream(cause),
            other => Self::protocol(CommsError::from(other)),
        }
    }
}

/// Marks the run finished even if the loop unwinds.
struct ExitGuard {
    run: Arc<RunFlag>,
    exit: Arc<ExitSignal>,
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        self.run.set_stopped();
        self.exit.raise();
    }
}

pub(super) struct ReceiveLoop<S> {
    pub(super) source: S,
    pub(super) run: Arc<RunFlag>,
    pub(super) tokens: Arc<TokenStore>,
    pub(super) state: Arc<dyn ClientState>,
    pub(super) supervisor: Arc<dyn ConnectionSupervisor>,
    pub(super) exit: Arc<ExitSignal>,
}

impl<S: FrameSource> ReceiveLoop<S> {
    /// Read and dispatch frames until stopped; returns the source.
    pub(super) fn run(mut self) -> S {
        let _exit = ExitGuard {
            run: Arc::clone(&self.run),
            exit: Arc::clone(&self.exit),
        };
        debug!("receive loop running");
        while self.run.is_running() {
            trace!("waiting for next frame");
            let read = catch_unwind(AssertUnwindSafe(|| self.source.read_frame()));
            let outcome = match read {
                Ok(Ok(message)) => self.dispatch(message),
                Ok(Err(error)) => Err(Fatal::from(error)),
                Err(payload) => Err(Fatal::panicked(payload.as_ref(), None)),
            };
            if let Err(fatal) = outcome {
                self.terminate(fatal);
                break;
            }
        }
        debug!("receive loop exited");
        self.source
    }

    fn dispatch(&self, message: WireMessage) -> Result<(), Fatal> {
        match message {
            WireMessage::Ack(ack) => {
                let id = ack.id();
                let Some(operation) = self.tokens.take(id) else {
                    return Err(Fatal::protocol(CommsError::UnexpectedAck { id }));
                };
                debug!(%id, kind = ?ack.kind(), "acknowledgment received");
                metrics::inc_frames(FrameKind::Ack);
                let handled = catch_unwind(AssertUnwindSafe(|| {
                    let mut guard = operation.lock();
                    self.state.notify_ack_received(ack, &mut guard);
                }));
                handled.map_err(|payload| Fatal::panicked(payload.as_ref(), Some(operation)))
            }
            WireMessage::Inbound(message) => {
                trace!(?message, "message received");
                metrics::inc_frames(FrameKind::Message);
                catch_unwind(AssertUnwindSafe(|| self.state.notify_message_received(message)))
                    .map_err(|payload| Fatal::panicked(payload.as_ref(), None))
            }
        }
    }

    fn terminate(&self, fatal: Fatal) {
        self.run.set_stopped();
        match fatal {
            Fatal::Protocol { operation, error } => {
                metrics::inc_errors();
                warn!(%error, reason = ?error.reason_code(), "receiver stopped");
                self.supervisor.shutdown_connection(operation, error);
            }
            Fatal::Stream(cause) if self.supervisor.is_disconnecting() => {
                debug!(%cause, "stream closed while disconnecting");
            }
            Fatal::Stream(cause) => {
                metrics::inc_errors();
                warn!(%cause, "receiver lost the connection");
                self.supervisor
                    .shutdown_connection(None, CommsError::connection_lost(cause));
            }
        }
    }
}
