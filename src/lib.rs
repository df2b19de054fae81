#![doc(html_root_url = "https://docs.rs/ackframe/latest")]
//! Public API for the `ackframe` library.
//!
//! This crate implements the receive side of a publish/subscribe client: a
//! dedicated thread reads length-prefixed frames off a blocking stream,
//! resolves pending operations from their acknowledgments, and hands every
//! other inbound message to the session state. Failures are escalated to a
//! connection supervisor, which tears the connection down exactly once.

pub mod comms;
pub mod config;
pub mod error;
pub mod frame;
pub mod message;
pub mod metrics;
pub mod panic;
pub mod receiver;
pub mod state;
pub mod supervisor;
pub mod token;

pub use comms::{ClientComms, SendError};
pub use config::ReceiverConfig;
pub use error::{CommsError, ReasonCode};
pub use frame::{FrameConfig, FrameSource, ReadError, StreamFrameSource};
pub use message::{Ack, AckKind, Inbound, MessageId, QoS, Request, WireMessage};
pub use metrics::{FRAMES_RECEIVED, PENDING_OPERATIONS, RECEIVE_ERRORS};
pub use receiver::{Receiver, ReceiverState};
pub use state::{ClientState, Deliveries, SessionState};
pub use supervisor::{ConnectionSupervisor, Supervisor, Transport};
pub use token::{OperationGuard, PendingOperation, TokenError, TokenStore};
