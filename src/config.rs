//! Connection-level configuration.
//!
//! [`ReceiverConfig`] bundles the settings [`crate::comms::ClientComms`]
//! applies when it builds its receiver: the receiver thread's name and the
//! [`FrameConfig`] shared by both directions of the stream.

use crate::frame::FrameConfig;

/// Thread name used when none is configured.
pub const DEFAULT_THREAD_NAME: &str = "ackframe-receiver";

/// Settings for a client connection's receive side.
///
/// # Examples
///
/// ```
/// use ackframe::{config::ReceiverConfig, frame::FrameConfig};
///
/// let config = ReceiverConfig::default()
///     .thread_name("broker-a")
///     .frame(FrameConfig::default().max_frame_length(1024));
/// assert_eq!(config.thread_name_value(), "broker-a");
/// assert_eq!(config.frame_value().max_frame_length_value(), 1024);
/// ```
#[derive(Clone, Debug)]
pub struct ReceiverConfig {
    thread_name: String,
    frame: FrameConfig,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            thread_name: DEFAULT_THREAD_NAME.to_owned(),
            frame: FrameConfig::default(),
        }
    }
}

impl ReceiverConfig {
    /// Name the receiver thread. Empty names fall back to
    /// [`DEFAULT_THREAD_NAME`].
    #[must_use]
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.thread_name = if name.is_empty() {
            DEFAULT_THREAD_NAME.to_owned()
        } else {
            name
        };
        self
    }

    /// Set the framing used for reads and writes.
    #[must_use]
    pub fn frame(mut self, frame: FrameConfig) -> Self {
        self.frame = frame;
        self
    }

    /// Configured receiver thread name.
    #[must_use]
    pub fn thread_name_value(&self) -> &str { &self.thread_name }

    /// Configured framing.
    #[must_use]
    pub fn frame_value(&self) -> &FrameConfig { &self.frame }
}
