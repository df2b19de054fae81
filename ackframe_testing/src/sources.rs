//! In-memory [`FrameSource`] implementations.

use std::{
    collections::VecDeque,
    io,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
        mpsc,
    },
};

use ackframe::{
    frame::{EofError, FrameConfig, FrameSource, FramingError, ReadError, encode_frame},
    message::WireMessage,
};

/// One scripted read result.
pub type Step = Result<WireMessage, ReadError>;

/// Replays a fixed script, then reports a clean close.
#[derive(Debug, Default)]
pub struct ScriptedFrameSource {
    steps: VecDeque<Step>,
}

impl ScriptedFrameSource {
    /// Create an empty script.
    pub fn new() -> Self { Self::default() }

    /// Append a successfully read frame.
    #[must_use]
    pub fn frame(mut self, message: impl Into<WireMessage>) -> Self {
        self.steps.push_back(Ok(message.into()));
        self
    }

    /// Append every message in `messages`.
    #[must_use]
    pub fn frames<I>(mut self, messages: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<WireMessage>,
    {
        self.steps.extend(messages.into_iter().map(|m| Ok(m.into())));
        self
    }

    /// Append a read failing with an I/O error of `kind`.
    #[must_use]
    pub fn io_error(mut self, kind: io::ErrorKind) -> Self {
        self.steps
            .push_back(Err(ReadError::Io(io::Error::new(kind, "scripted failure"))));
        self
    }

    /// Append a read whose frame cannot be decoded.
    #[must_use]
    pub fn malformed(mut self) -> Self {
        self.steps
            .push_back(Err(ReadError::Framing(FramingError::TrailingBytes { count: 3 })));
        self
    }

    /// Reads remaining before the clean close.
    pub fn remaining(&self) -> usize { self.steps.len() }
}

impl FrameSource for ScriptedFrameSource {
    fn read_frame(&mut self) -> Result<WireMessage, ReadError> {
        self.steps
            .pop_front()
            .unwrap_or_else(|| Err(ReadError::Io(EofError::CleanClose.into())))
    }
}

/// Sending half of a [`ChannelFrameSource`].
#[derive(Clone, Debug)]
pub struct FrameFeeder {
    tx: mpsc::Sender<Step>,
}

impl FrameFeeder {
    /// Deliver `message` to the next read.
    ///
    /// # Panics
    ///
    /// Panics if the source has been dropped.
    pub fn push(&self, message: impl Into<WireMessage>) {
        self.tx
            .send(Ok(message.into()))
            .expect("frame source dropped");
    }

    /// Fail the next read with an I/O error of `kind`.
    ///
    /// # Panics
    ///
    /// Panics if the source has been dropped.
    pub fn fail(&self, kind: io::ErrorKind) {
        self.tx
            .send(Err(ReadError::Io(io::Error::new(kind, "injected failure"))))
            .expect("frame source dropped");
    }
}

/// A source whose reads block until a [`FrameFeeder`] supplies a result.
///
/// Once every feeder is dropped, reads report a clean close.
#[derive(Debug)]
pub struct ChannelFrameSource {
    rx: mpsc::Receiver<Step>,
    reads: Arc<AtomicUsize>,
}

/// Counts reads started on a [`ChannelFrameSource`].
#[derive(Clone, Debug)]
pub struct ReadCounter(Arc<AtomicUsize>);

impl ReadCounter {
    /// Reads started so far, including one currently blocked.
    pub fn get(&self) -> usize { self.0.load(Ordering::SeqCst) }
}

/// Create a gate-controlled source together with its feeder and read counter.
pub fn channel_source() -> (FrameFeeder, ChannelFrameSource, ReadCounter) {
    let (tx, rx) = mpsc::channel();
    let reads = Arc::new(AtomicUsize::new(0));
    (
        FrameFeeder { tx },
        ChannelFrameSource {
            rx,
            reads: Arc::clone(&reads),
        },
        ReadCounter(reads),
    )
}

impl FrameSource for ChannelFrameSource {
    fn read_frame(&mut self) -> Result<WireMessage, ReadError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.rx
            .recv()
            .unwrap_or_else(|_| Err(ReadError::Io(EofError::CleanClose.into())))
    }
}

/// Encode `messages` back to back as they would appear on the wire.
///
/// # Panics
///
/// Panics if a message does not fit in a frame under `config`.
pub fn encode_stream<'a, I>(messages: I, config: &FrameConfig) -> Vec<u8>
where
    I: IntoIterator<Item = &'a WireMessage>,
{
    messages
        .into_iter()
        .flat_map(|message| encode_frame(message, config).expect("encode frame"))
        .collect()
}
