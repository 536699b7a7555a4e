mod error;
mod message;

pub use error::DecodeError;
pub use message::{
    serialize_params, BackendMetadata, HeartbeatKind, Message, MessageType, RetrainRequest,
    REQUEST_TYPE_START_RETRAIN, STATUS_OK,
};

/// A multipart message as it travels on the wire, one `Bytes` per frame.
pub type Frames = Vec<bytes::Bytes>;
