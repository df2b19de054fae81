//! The dedicated receive loop.
//!
//! A [`Receiver`] owns a [`FrameSource`] and, while running, drives it from a
//! named OS thread. Every frame is dispatched in wire order: acknowledgments
//! resolve the operation registered under their identifier, everything else
//! goes to [`ClientState::notify_message_received`]. A protocol violation or a
//! failed stream stops the loop and is escalated to the
//! [`ConnectionSupervisor`], except that a stream closing during a disconnect
//! the supervisor already started is treated as expected.
//!
//! Starting and stopping are serialised by a lifecycle lock. `stop` requests
//! the loop to finish and waits for the thread to exit, but never waits on
//! itself when invoked from inside the loop (for instance by a supervisor
//! reacting to a failure).
//!
//! Lifecycle records (start, join, reaped panics) go through the `log` macros
//! so `logtest` captures them; per-frame events in `worker` use `tracing`.

use std::{
    io,
    sync::{
        Arc,
        Condvar,
        Mutex,
        MutexGuard,
        PoisonError,
        atomic::{AtomicU8, Ordering},
    },
    thread::{self, JoinHandle, ThreadId},
};

use log::{debug, info, warn};

use crate::{
    frame::FrameSource,
    panic::format_panic,
    state::ClientState,
    supervisor::ConnectionSupervisor,
    token::TokenStore,
};

mod worker;

use worker::ReceiveLoop;

/// Run status of a [`Receiver`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReceiverState {
    /// No loop is running.
    Stopped,
    /// The loop is reading frames.
    Running,
    /// A stop was requested; the loop finishes its current frame first.
    Stopping,
}

const STOPPED: u8 = 0;
const RUNNING: u8 = 1;
const STOPPING: u8 = 2;

/// Run flag shared between the lifecycle methods and the loop thread.
#[derive(Debug, Default)]
pub(crate) struct RunFlag(AtomicU8);

impl RunFlag {
    fn get(&self) -> ReceiverState {
        match self.0.load(Ordering::Acquire) {
            RUNNING => ReceiverState::Running,
            STOPPING => ReceiverState::Stopping,
            _ => ReceiverState::Stopped,
        }
    }

    pub(crate) fn is_running(&self) -> bool { self.0.load(Ordering::Acquire) == RUNNING }

    fn start(&self) -> bool {
        self.0
            .compare_exchange(STOPPED, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn request_stop(&self) -> bool {
        self.0
            .compare_exchange(RUNNING, STOPPING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn set_stopped(&self) { self.0.store(STOPPED, Ordering::Release); }
}

/// Latch raised by the loop thread just before it returns.
#[derive(Debug, Default)]
pub(crate) struct ExitSignal {
    exited: Mutex<bool>,
    cond: Condvar,
}

impl ExitSignal {
    fn flag(&self) -> MutexGuard<'_, bool> { self.exited.lock().unwrap_or_else(PoisonError::into_inner) }

    pub(crate) fn raise(&self) {
        *self.flag() = true;
        self.cond.notify_all();
    }

    fn is_raised(&self) -> bool { *self.flag() }

    fn wait(&self) {
        let mut exited = self.flag();
        while !*exited {
            exited = self.cond.wait(exited).unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// The loop thread of the current or most recent run.
struct Worker<S> {
    /// Taken by whichever stopper joins the thread.
    handle: Option<JoinHandle<S>>,
    thread: ThreadId,
    exit: Arc<ExitSignal>,
}

struct Lifecycle<S> {
    /// Present while no loop owns the source.
    source: Option<S>,
    worker: Option<Worker<S>>,
}

/// Drives a [`FrameSource`] on a dedicated thread.
pub struct Receiver<S> {
    run: Arc<RunFlag>,
    lifecycle: Mutex<Lifecycle<S>>,
    tokens: Arc<TokenStore>,
    state: Arc<dyn ClientState>,
    supervisor: Arc<dyn ConnectionSupervisor>,
}

impl<S> std::fmt::Debug for Receiver<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Receiver")
            .field("state", &self.run.get())
            .field("pending", &self.tokens.len())
            .finish_non_exhaustive()
    }
}

impl<S> Receiver<S>
where
    S: FrameSource + Send + 'static,
{
    /// Create a stopped receiver reading from `source`.
    ///
    /// Acknowledgments are correlated through `tokens`, frames are handed to
    /// `state`, and fatal failures are reported to `supervisor`.
    pub fn new(
        source: S,
        tokens: Arc<TokenStore>,
        state: Arc<dyn ClientState>,
        supervisor: Arc<dyn ConnectionSupervisor>,
    ) -> Self {
        Self {
            run: Arc::new(RunFlag::default()),
            lifecycle: Mutex::new(Lifecycle {
                source: Some(source),
                worker: None,
            }),
            tokens,
            state,
            supervisor,
        }
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle<S>> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current run status.
    #[must_use]
    pub fn state(&self) -> ReceiverState { self.run.get() }

    /// Returns `true` while the loop is reading frames.
    #[must_use]
    pub fn is_running(&self) -> bool { self.run.is_running() }

    /// Start the loop on a thread called `name`.
    ///
    /// Does nothing if the loop is already running, if the previous loop
    /// thread has not exited yet, or if the call is made from the loop thread
    /// itself. A loop that stopped on its own is reaped first, so a receiver
    /// can be restarted on the source it was reading.
    ///
    /// # Errors
    ///
    /// Returns the error from [`thread::Builder::spawn`]. The source is lost in
    /// that case and the receiver stays stopped.
    pub fn start(&self, name: &str) -> io::Result<()> {
        let mut lifecycle = self.lifecycle();
        if self.run.get() != ReceiverState::Stopped {
            debug!("receiver already running; start ignored");
            return Ok(());
        }
        if let Some(mut worker) = lifecycle.worker.take() {
            if worker.thread == thread::current().id() || !worker.exit.is_raised() {
                debug!("previous receive loop has not exited; start ignored");
                lifecycle.worker = Some(worker);
                return Ok(());
            }
            if let Some(source) = worker.handle.take().and_then(reap) {
                lifecycle.source = Some(source);
            }
        }
        let Some(source) = lifecycle.source.take() else {
            warn!("receiver has no frame source; start ignored");
            return Ok(());
        };
        if !self.run.start() {
            lifecycle.source = Some(source);
            return Ok(());
        }

        let exit = Arc::new(ExitSignal::default());
        let receive_loop = ReceiveLoop {
            source,
            run: Arc::clone(&self.run),
            tokens: Arc::clone(&self.tokens),
            state: Arc::clone(&self.state),
            supervisor: Arc::clone(&self.supervisor),
            exit: Arc::clone(&exit),
        };
        match thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || receive_loop.run())
        {
            Ok(handle) => {
                lifecycle.worker = Some(Worker {
                    thread: handle.thread().id(),
                    handle: Some(handle),
                    exit,
                });
                info!("receiver started: thread={name}");
                Ok(())
            }
            Err(error) => {
                self.run.set_stopped();
                warn!("failed to spawn receiver thread {name}: {error}");
                Err(error)
            }
        }
    }

    /// Stop the loop and wait for its thread to exit.
    ///
    /// The current frame, if any, is finished first. A loop blocked in a read
    /// only notices the request once the read returns, so callers that need
    /// `stop` to return promptly close the underlying stream first.
    ///
    /// Idempotent and safe to call from several threads at once: one caller
    /// joins the thread, the others wait for it to exit. Called from the loop
    /// thread itself, `stop` only requests the exit and returns.
    pub fn stop(&self) {
        if self.run.request_stop() {
            debug!("receiver stop requested");
        }
        let (handle, exit) = {
            let mut lifecycle = self.lifecycle();
            let Some(worker) = lifecycle.worker.as_mut() else {
                return;
            };
            if worker.thread == thread::current().id() {
                debug!("stop called on the receiver thread; not joining");
                return;
            }
            (worker.handle.take(), Arc::clone(&worker.exit))
        };

        let Some(handle) = handle else {
            exit.wait();
            return;
        };
        let thread = handle.thread().id();
        let source = reap(handle);
        let mut lifecycle = self.lifecycle();
        if lifecycle.worker.as_ref().is_some_and(|w| w.thread == thread) {
            lifecycle.worker = None;
        }
        if let Some(source) = source {
            lifecycle.source = Some(source);
        }
        info!("receiver thread joined");
    }
}

/// Join a finished loop thread, recovering its source.
fn reap<S>(handle: JoinHandle<S>) -> Option<S> {
    match handle.join() {
        Ok(source) => Some(source),
        Err(payload) => {
            warn!("receiver thread panicked: {}", format_panic(payload.as_ref()));
            None
        }
    }
}

impl<S> Drop for Receiver<S> {
    fn drop(&mut self) {
        // The loop keeps its own handles; it exits after its next read.
        self.run.request_stop();
    }
}

#[cfg(test)]
mod tests;
