//! Probe binary for `ackframe`.
//!
//! Connects to a broker, starts the receiver, and prints each delivered
//! message until the connection is torn down.

mod cli;

use std::{process::ExitCode, sync::Arc};

use ackframe::{ClientComms, ClientState, ReceiverConfig, SessionState, frame::FrameConfig};
use clap::Parser;

fn main() -> ExitCode {
    // Applications embedding the library should install their own subscriber.
    tracing_subscriber::fmt::init();

    let cli = cli::Cli::parse();
    let mut frame = FrameConfig::default();
    if let Some(max) = cli.max_frame_length {
        frame = frame.max_frame_length(max);
    }
    let config = ReceiverConfig::default()
        .thread_name(cli.thread_name)
        .frame(frame);

    let (state, mut deliveries) = SessionState::new();
    let state = Arc::new(state);
    let comms = match ClientComms::connect(&cli.addr, Arc::clone(&state) as Arc<dyn ClientState>, config) {
        Ok(comms) => comms,
        Err(error) => {
            eprintln!("failed to connect to {}: {error}", cli.addr);
            return ExitCode::FAILURE;
        }
    };
    let closer = Arc::clone(&state);
    comms.supervisor().on_teardown(move |error| {
        tracing::info!(%error, "connection closed");
        closer.close_deliveries();
    });
    if let Err(error) = comms.start() {
        eprintln!("failed to start receiver: {error}");
        return ExitCode::FAILURE;
    }

    while let Some(message) = deliveries.blocking_recv() {
        println!("{message:?}");
    }
    ExitCode::SUCCESS
}
