//! Command line interface for the `ackframe` probe binary.
//!
//! Shared with `build.rs`, which renders the man page from it.

use clap::Parser;

/// Command line arguments for the `ackframe` binary.
#[derive(Debug, Parser)]
#[command(
    name = "ackframe",
    version,
    about = "Connect to a broker and print every message it pushes"
)]
pub struct Cli {
    /// Broker address to connect to.
    #[arg(short, long, default_value = "127.0.0.1:1883")]
    pub addr: String,
    /// Name of the receiver thread.
    #[arg(short, long, default_value = "ackframe-receiver")]
    pub thread_name: String,
    /// Largest frame accepted, in bytes.
    #[arg(short, long)]
    pub max_frame_length: Option<usize>,
}
