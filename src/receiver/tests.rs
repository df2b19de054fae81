//! Lifecycle tests for the receiver.

use std::{
    sync::{Mutex, OnceLock, atomic::AtomicUsize, mpsc},
    time::{Duration, Instant},
};

use rstest::{fixture, rstest};

use super::*;
use crate::{
    error::CommsError,
    frame::ReadError,
    message::{Ack, AckKind, Inbound, MessageId, WireMessage},
    supervisor::Supervisor,
    token::{OperationGuard, PendingOperation},
};

type Frame = Result<WireMessage, ReadError>;

struct ChannelSource {
    frames: mpsc::Receiver<Frame>,
    reads: Arc<AtomicUsize>,
}

impl FrameSource for ChannelSource {
    fn read_frame(&mut self) -> Result<WireMessage, ReadError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.frames
            .recv()
            .unwrap_or_else(|_| Err(ReadError::Io(io::ErrorKind::UnexpectedEof.into())))
    }
}

#[derive(Default)]
struct Recorder {
    messages: Mutex<Vec<Inbound>>,
    panic_on_ack: bool,
}

impl ClientState for Recorder {
    fn notify_ack_received(&self, ack: Ack, operation: &mut OperationGuard<'_>) {
        assert!(!self.panic_on_ack, "ack handler exploded");
        operation.complete(ack.outcome());
    }

    fn notify_message_received(&self, message: Inbound) {
        self.messages.lock().expect("messages").push(message);
    }
}

type Hook = Box<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Escalations {
    seen: Mutex<Vec<(Option<MessageId>, CommsError)>>,
    disconnecting: std::sync::atomic::AtomicBool,
    on_shutdown: OnceLock<Hook>,
}

impl Escalations {
    fn count(&self) -> usize { self.seen.lock().expect("escalations").len() }
}

impl ConnectionSupervisor for Escalations {
    fn shutdown_connection(&self, operation: Option<Arc<PendingOperation>>, error: CommsError) {
        self.seen
            .lock()
            .expect("escalations")
            .push((operation.map(|op| op.id()), error));
        if let Some(hook) = self.on_shutdown.get() {
            hook();
        }
    }

    fn is_disconnecting(&self) -> bool { self.disconnecting.load(Ordering::SeqCst) }
}

struct Harness {
    frames: Option<mpsc::Sender<Frame>>,
    reads: Arc<AtomicUsize>,
    tokens: Arc<TokenStore>,
    state: Arc<Recorder>,
    supervisor: Arc<Escalations>,
    receiver: Arc<Receiver<ChannelSource>>,
}

impl Harness {
    fn with_state(state: Recorder) -> Self {
        let (tx, rx) = mpsc::channel();
        let reads = Arc::new(AtomicUsize::new(0));
        let tokens = Arc::new(TokenStore::new());
        let state = Arc::new(state);
        let supervisor = Arc::new(Escalations::default());
        let receiver = Arc::new(Receiver::new(
            ChannelSource {
                frames: rx,
                reads: Arc::clone(&reads),
            },
            Arc::clone(&tokens),
            Arc::clone(&state) as Arc<dyn ClientState>,
            Arc::clone(&supervisor) as Arc<dyn ConnectionSupervisor>,
        ));
        Self {
            frames: Some(tx),
            reads,
            tokens,
            state,
            supervisor,
            receiver,
        }
    }

    fn send(&self, frame: impl Into<WireMessage>) {
        self.frames
            .as_ref()
            .expect("frame channel open")
            .send(Ok(frame.into()))
            .expect("receiver source alive");
    }

    fn reads(&self) -> usize { self.reads.load(Ordering::SeqCst) }

    fn delivered(&self) -> usize { self.state.messages.lock().expect("messages").len() }

    /// Close the source during an application disconnect so the loop exits
    /// quietly.
    fn hang_up(&mut self) {
        self.supervisor.disconnecting.store(true, Ordering::SeqCst);
        self.frames = None;
    }
}

#[fixture]
fn harness() -> Harness { Harness::with_state(Recorder::default()) }

fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        thread::sleep(Duration::from_millis(2));
    }
}

#[rstest]
fn second_start_is_a_no_op(mut harness: Harness) {
    harness.receiver.start("recv-a").expect("spawn");
    harness.receiver.start("recv-b").expect("spawn");
    assert!(harness.receiver.is_running());

    harness.send(Inbound::PingResp);
    wait_until(|| harness.delivered() == 1);

    harness.hang_up();
    harness.receiver.stop();
    assert_eq!(harness.receiver.state(), ReceiverState::Stopped);
    assert_eq!(harness.supervisor.count(), 0, "disconnect close must not escalate");
}

#[rstest]
fn stop_before_start_returns_immediately(harness: Harness) {
    harness.receiver.stop();
    harness.receiver.stop();
    assert_eq!(harness.receiver.state(), ReceiverState::Stopped);
}

#[rstest]
fn frame_read_during_stop_is_still_dispatched(harness: Harness) {
    harness.receiver.start("recv").expect("spawn");
    wait_until(|| harness.reads() == 1);
    let receiver = Arc::clone(&harness.receiver);
    let stopper = thread::spawn(move || receiver.stop());
    wait_until(|| harness.receiver.state() == ReceiverState::Stopping);

    harness.send(Inbound::PingResp);
    stopper.join().expect("stopper thread panicked");

    assert_eq!(harness.delivered(), 1);
    assert_eq!(harness.reads(), 1, "loop must not read past a stop request");
    assert_eq!(harness.receiver.state(), ReceiverState::Stopped);
    assert_eq!(harness.supervisor.count(), 0);
}

#[rstest]
fn supervisor_may_stop_the_receiver_from_the_loop_thread(harness: Harness) {
    let receiver = Arc::downgrade(&harness.receiver);
    let hook: Hook = Box::new(move || {
        if let Some(receiver) = receiver.upgrade() {
            receiver.stop();
        }
    });
    assert!(harness.supervisor.on_shutdown.set(hook).is_ok());

    harness.receiver.start("recv").expect("spawn");
    harness.send(Ack::pub_ack(42));
    wait_until(|| harness.supervisor.count() == 1);
    wait_until(|| harness.receiver.state() == ReceiverState::Stopped);

    harness.receiver.stop();
    let seen = harness.supervisor.seen.lock().expect("escalations");
    assert!(matches!(
        seen.as_slice(),
        [(None, CommsError::UnexpectedAck { id })] if *id == MessageId::new(42)
    ));
}

#[rstest]
fn receiver_restarts_on_its_source_after_a_failure(harness: Harness) {
    harness.receiver.start("recv").expect("spawn");
    harness.send(Ack::unsub_ack(7));
    wait_until(|| harness.supervisor.count() == 1);
    harness.receiver.stop();

    harness.receiver.start("recv").expect("spawn");
    assert!(harness.receiver.is_running());
    harness.send(Inbound::PingResp);
    wait_until(|| harness.delivered() == 1);
}

#[test]
fn panicking_ack_handler_fails_the_operation_in_hand() {
    let harness = Harness::with_state(Recorder {
        panic_on_ack: true,
        ..Recorder::default()
    });
    let op = Arc::new(PendingOperation::new(MessageId::new(3)));
    harness.tokens.put(op.id(), Arc::clone(&op)).expect("register");

    harness.receiver.start("recv").expect("spawn");
    harness.send(Ack::pub_ack(3));
    wait_until(|| harness.supervisor.count() == 1);

    let seen = harness.supervisor.seen.lock().expect("escalations");
    let (id, error) = &seen[0];
    assert_eq!(*id, Some(MessageId::new(3)));
    assert!(matches!(error, CommsError::HandlerPanicked { reason } if reason.contains("exploded")));
    assert!(!op.is_complete(), "operation is failed by the supervisor, not the loop");
}

struct ExplodingSource;

impl FrameSource for ExplodingSource {
    fn read_frame(&mut self) -> Result<WireMessage, ReadError> { panic!("source exploded") }
}

/// Real supervisor that also counts escalations.
struct CountingSupervisor {
    inner: Supervisor,
    calls: AtomicUsize,
}

impl ConnectionSupervisor for CountingSupervisor {
    fn shutdown_connection(&self, operation: Option<Arc<PendingOperation>>, error: CommsError) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.shutdown_connection(operation, error);
    }

    fn is_disconnecting(&self) -> bool { self.inner.is_disconnecting() }
}

#[test]
fn panicking_source_is_escalated_and_fails_pending_operations() {
    let tokens = Arc::new(TokenStore::new());
    let supervisor = Arc::new(CountingSupervisor {
        inner: Supervisor::new(Arc::clone(&tokens)),
        calls: AtomicUsize::new(0),
    });
    let op = Arc::new(PendingOperation::new(MessageId::new(8)));
    tokens.put(op.id(), Arc::clone(&op)).expect("register");
    let receiver = Receiver::new(
        ExplodingSource,
        Arc::clone(&tokens),
        Arc::new(Recorder::default()) as Arc<dyn ClientState>,
        Arc::clone(&supervisor) as Arc<dyn ConnectionSupervisor>,
    );

    receiver.start("recv").expect("spawn");
    let outcome = op
        .wait_timeout(Duration::from_secs(5))
        .expect("operation resolved");
    wait_until(|| supervisor.inner.is_disconnected());
    wait_until(|| receiver.state() == ReceiverState::Stopped);
    receiver.stop();

    assert!(matches!(
        outcome,
        Err(CommsError::HandlerPanicked { reason }) if reason.contains("source exploded")
    ));
    assert_eq!(supervisor.calls.load(Ordering::SeqCst), 1);
    assert!(tokens.is_empty());
}

#[rstest]
fn acknowledgment_resolves_registered_operation(mut harness: Harness) {
    let op = Arc::new(PendingOperation::new(MessageId::new(11)));
    harness.tokens.put(op.id(), Arc::clone(&op)).expect("register");

    harness.receiver.start("recv").expect("spawn");
    harness.send(Ack::pub_ack(11));

    assert!(matches!(op.wait(), Ok(AckKind::PubAck)));
    assert!(harness.tokens.is_empty());
    harness.hang_up();
    harness.receiver.stop();
}
