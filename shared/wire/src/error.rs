use thiserror::Error;

use crate::MessageType;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("message has no frames")]
    Empty,

    #[error("expected an empty delimiter frame, got {0} bytes")]
    MissingDelimiter(usize),

    #[error("message type frame must be 4 bytes, got {0}")]
    InvalidTypeFrame(usize),

    #[error("unknown message type {0}")]
    UnknownMessageType(u32),

    #[error("unknown heartbeat type {0}")]
    UnknownHeartbeatType(u32),

    #[error("missing {field} frame in {message:?}")]
    MissingFrame {
        message: MessageType,
        field: &'static str,
    },

    #[error("{field} frame in {message:?} must be 4 bytes, got {len}")]
    InvalidInteger {
        message: MessageType,
        field: &'static str,
        len: usize,
    },

    #[error("{field} frame in {message:?} is not valid UTF-8")]
    InvalidString {
        message: MessageType,
        field: &'static str,
    },
}
