//! Test doubles for driving an [`ackframe`] receiver without a network.
//!
//! Scripted and channel-fed frame sources stand in for the stream, while the
//! recording collaborators capture what the receiver reports so tests can
//! assert on order and on escalations.
//!
//! ```rust
//! use std::{sync::Arc, time::Duration};
//!
//! use ackframe::{message::Inbound, receiver::Receiver, token::TokenStore};
//! use ackframe_testing::{RecordingClientState, RecordingSupervisor, ScriptedFrameSource};
//!
//! let state = RecordingClientState::shared();
//! let supervisor = RecordingSupervisor::shared();
//! let receiver = Receiver::new(
//!     ScriptedFrameSource::new().frame(Inbound::PingResp),
//!     Arc::new(TokenStore::new()),
//!     state.clone(),
//!     supervisor.clone(),
//! );
//! receiver.start("doc-receiver").unwrap();
//! assert!(state.wait_for(1, Duration::from_secs(5)));
//! ```

pub mod logging;
pub mod recording;
pub mod sources;

pub use logging::{LoggerHandle, logger};
pub use recording::{Observed, RecordingClientState, RecordingSupervisor, Shutdown};
pub use sources::{
    ChannelFrameSource,
    FrameFeeder,
    ReadCounter,
    ScriptedFrameSource,
    Step,
    channel_source,
    encode_stream,
};
