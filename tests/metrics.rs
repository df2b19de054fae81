#![cfg(feature = "metrics")]
//! Tests for `ackframe` metrics helpers.
//!
//! These tests verify that counters and gauges update as expected using
//! `metrics_util::debugging::DebuggingRecorder`.

use std::sync::Arc;

use ackframe::{
    message::MessageId,
    metrics::{self as ack_metrics, FRAMES_RECEIVED, FrameKind, PENDING_OPERATIONS, RECEIVE_ERRORS},
    token::{PendingOperation, TokenStore},
};
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};

fn debugging_recorder_setup() -> (Snapshotter, DebuggingRecorder) {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    (snapshotter, recorder)
}

#[test]
fn frame_counter_is_labelled_by_kind() {
    let (snapshotter, recorder) = debugging_recorder_setup();
    metrics::with_local_recorder(&recorder, || {
        ack_metrics::inc_frames(FrameKind::Ack);
        ack_metrics::inc_frames(FrameKind::Message);
        ack_metrics::inc_frames(FrameKind::Message);
    });

    let metrics = snapshotter.snapshot().into_vec();
    let count = |kind: &str| {
        metrics.iter().find_map(|(k, _, _, v)| {
            let matches = k.key().name() == FRAMES_RECEIVED
                && k.key().labels().any(|l| l.key() == "kind" && l.value() == kind);
            match v {
                DebugValue::Counter(c) if matches => Some(*c),
                _ => None,
            }
        })
    };
    assert_eq!(count("ack"), Some(1));
    assert_eq!(count("message"), Some(2));
}

#[test]
fn receive_error_counter_increments() {
    let (snapshotter, recorder) = debugging_recorder_setup();
    metrics::with_local_recorder(&recorder, ack_metrics::inc_errors);

    let metrics = snapshotter.snapshot().into_vec();
    assert!(metrics.iter().any(|(k, _, _, v)| {
        k.key().name() == RECEIVE_ERRORS && matches!(v, DebugValue::Counter(c) if *c == 1)
    }));
}

#[test]
fn pending_gauge_tracks_the_token_store() {
    let (snapshotter, recorder) = debugging_recorder_setup();
    metrics::with_local_recorder(&recorder, || {
        let tokens = TokenStore::new();
        for id in 1..=3 {
            let op = Arc::new(PendingOperation::new(MessageId::new(id)));
            tokens.put(op.id(), op).expect("register");
        }
        tokens.take(MessageId::new(2));
    });

    let metrics = snapshotter.snapshot().into_vec();
    let gauge = metrics.iter().find_map(|(k, _, _, v)| match v {
        DebugValue::Gauge(g) if k.key().name() == PENDING_OPERATIONS => Some(g.into_inner()),
        _ => None,
    });
    assert_eq!(gauge, Some(2.0));
}
