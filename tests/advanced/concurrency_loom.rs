#![cfg(all(feature = "advanced-tests", loom))]
//! Concurrency tests for pending operations using loom.
//!
//! Run with `RUSTFLAGS="--cfg loom" cargo test --features advanced-tests`.
//! `loom` explores the interleavings of an acknowledgment racing a teardown
//! and checks that each operation resolves exactly once.

use ackframe::{
    error::CommsError,
    message::{AckKind, MessageId},
    token::PendingOperation,
};
use loom::{model, sync::Arc, thread};

#[test]
fn ack_and_teardown_resolve_once() {
    model(|| {
        let op = Arc::new(PendingOperation::new(MessageId::new(1)));

        let acker = Arc::clone(&op);
        let t1 = thread::spawn(move || acker.lock().complete(Ok(AckKind::PubAck)));
        let failer = Arc::clone(&op);
        let t2 = thread::spawn(move || failer.fail(CommsError::Disconnected));

        let acked = t1.join().expect("acker panicked");
        let failed = t2.join().expect("failer panicked");
        assert!(acked ^ failed, "exactly one completion must win");

        match op.wait() {
            Ok(AckKind::PubAck) => assert!(acked),
            Err(CommsError::Disconnected) => assert!(failed),
            other => panic!("unexpected outcome {other:?}"),
        }
    });
}

#[test]
fn waiter_observes_completion_after_send() {
    model(|| {
        let op = Arc::new(PendingOperation::new(MessageId::new(2)));

        let sender = Arc::clone(&op);
        let t = thread::spawn(move || {
            let mut guard = sender.lock();
            guard.mark_sent();
            guard.complete(Ok(AckKind::UnsubAck))
        });

        assert!(matches!(op.wait(), Ok(AckKind::UnsubAck)));
        assert!(t.join().expect("sender panicked"));
        assert!(op.lock().is_sent());
    });
}
