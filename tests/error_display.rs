//! Tests for Display implementations on error types.

use std::{io, sync::Arc};

use ackframe::{
    comms::SendError,
    error::{CommsError, ReasonCode},
    frame::{EofError, FramingError, ReadError},
    message::MessageId,
    token::TokenError,
};

#[test]
fn comms_error_messages() {
    assert_eq!(
        CommsError::UnexpectedAck {
            id: MessageId::new(9)
        }
        .to_string(),
        "acknowledgment for message id 9 matches no pending operation"
    );
    assert_eq!(CommsError::Disconnected.to_string(), "client is disconnecting");
    assert_eq!(
        CommsError::Refused {
            id: MessageId::new(3),
            code: 0x80
        }
        .to_string(),
        "request 3 refused by broker with return code 0x80"
    );
    assert_eq!(
        CommsError::connection_lost(io::Error::other("socket closed")).to_string(),
        "connection lost: socket closed"
    );
}

#[test]
fn read_errors_describe_their_cause() {
    assert_eq!(
        ReadError::from(FramingError::OversizedFrame { max: 64 }).to_string(),
        "frame exceeds max length of 64 bytes"
    );
    assert_eq!(
        ReadError::Io(EofError::CleanClose.into()).to_string(),
        "stream error: connection closed cleanly at frame boundary"
    );
    let decode = CommsError::Decode(Arc::new(ReadError::from(FramingError::TrailingBytes {
        count: 2,
    })));
    assert_eq!(
        decode.to_string(),
        "malformed inbound frame: 2 trailing bytes after decoded message"
    );
}

#[test]
fn send_error_messages() {
    assert_eq!(
        SendError::from(TokenError::DuplicateId(MessageId::new(4))).to_string(),
        "message id 4 is already in flight"
    );
    assert_eq!(SendError::NotConnected.to_string(), "client is not connected");
}

#[test]
fn reason_codes_are_stable() {
    assert_eq!(ReasonCode::UnexpectedError.as_u16(), 6);
    assert_eq!(ReasonCode::ConnectionLost.as_u16(), 32_109);
    assert_eq!(ReasonCode::ClientDisconnecting.as_u16(), 32_102);
    assert_eq!(ReasonCode::SubscribeFailed.as_u16(), 128);
    assert_eq!(
        CommsError::HandlerPanicked {
            reason: "boom".into()
        }
        .reason_code(),
        ReasonCode::UnexpectedError
    );
}
