//! Metric helpers for `ackframe`.
//!
//! This module defines metric names and thin wrappers around the
//! [`metrics`](https://docs.rs/metrics) crate. Every helper compiles to a
//! no-op when the `metrics` feature is disabled.

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

/// Name of the counter tracking frames handled by the receiver.
pub const FRAMES_RECEIVED: &str = "ackframe_frames_received_total";
/// Name of the counter tracking fatal receive errors.
pub const RECEIVE_ERRORS: &str = "ackframe_receive_errors_total";
/// Name of the gauge tracking operations awaiting acknowledgment.
pub const PENDING_OPERATIONS: &str = "ackframe_pending_operations";

/// Classification of a received frame.
#[derive(Clone, Copy, Debug)]
pub enum FrameKind {
    /// Acknowledgment correlated with a pending operation.
    Ack,
    /// Message pushed by the broker.
    Message,
}

impl FrameKind {
    #[cfg_attr(not(feature = "metrics"), allow(dead_code))]
    fn as_str(self) -> &'static str {
        match self {
            FrameKind::Ack => "ack",
            FrameKind::Message => "message",
        }
    }
}

/// Record a received frame of the given kind.
#[cfg_attr(not(feature = "metrics"), allow(unused_variables))]
pub fn inc_frames(kind: FrameKind) {
    #[cfg(feature = "metrics")]
    counter!(FRAMES_RECEIVED, "kind" => kind.as_str()).increment(1);
}

/// Record a fatal receive error.
pub fn inc_errors() {
    #[cfg(feature = "metrics")]
    counter!(RECEIVE_ERRORS).increment(1);
}

/// Record a newly registered operation.
pub fn inc_pending() {
    #[cfg(feature = "metrics")]
    gauge!(PENDING_OPERATIONS).increment(1.0);
}

/// Record `count` operations leaving the store.
#[cfg_attr(not(feature = "metrics"), allow(unused_variables))]
pub fn dec_pending(count: usize) {
    #[cfg(feature = "metrics")]
    #[allow(clippy::cast_precision_loss, reason = "gauge values are approximate")]
    gauge!(PENDING_OPERATIONS).decrement(count as f64);
}
