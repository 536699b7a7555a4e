use bytes::Bytes;
use std::{collections::BTreeMap, slice};

use crate::{DecodeError, Frames};

/// Status value the backend attaches to lifecycle notifications.
/// The protocol has no failure status, so this is the only value ever sent.
pub const STATUS_OK: u32 = 1;

/// Inner request code of a `StartRetrain` message that carries a batch id list.
pub const REQUEST_TYPE_START_RETRAIN: u32 = 0;

const ID_TERMINATOR: char = '\0';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    BackendMetadata,
    StartRetrain,
    BackendHeartbeat,
    RetrainStarted,
    RetrainEnded,
}

impl MessageType {
    pub fn code(self) -> u32 {
        match self {
            MessageType::BackendMetadata => 0,
            MessageType::StartRetrain => 1,
            MessageType::BackendHeartbeat => 2,
            MessageType::RetrainStarted => 3,
            MessageType::RetrainEnded => 4,
        }
    }
}

impl TryFrom<u32> for MessageType {
    type Error = DecodeError;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        Ok(match code {
            0 => MessageType::BackendMetadata,
            1 => MessageType::StartRetrain,
            2 => MessageType::BackendHeartbeat,
            3 => MessageType::RetrainStarted,
            4 => MessageType::RetrainEnded,
            other => return Err(DecodeError::UnknownMessageType(other)),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatKind {
    Keepalive,
    RequestMetadata,
}

impl HeartbeatKind {
    pub fn code(self) -> u32 {
        match self {
            HeartbeatKind::Keepalive => 0,
            HeartbeatKind::RequestMetadata => 1,
        }
    }
}

impl TryFrom<u32> for HeartbeatKind {
    type Error = DecodeError;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(HeartbeatKind::Keepalive),
            1 => Ok(HeartbeatKind::RequestMetadata),
            other => Err(DecodeError::UnknownHeartbeatType(other)),
        }
    }
}

/// Identity announcement sent in reply to a metadata request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendMetadata {
    pub name: String,
    pub version: String,
    pub app_name: String,
    pub policy: String,
    /// Hyperparameters as a JSON object, `{}` when there are none.
    pub params: String,
}

/// Serializes a hyperparameter map into the JSON object form the scheduler parses.
pub fn serialize_params(params: &BTreeMap<String, f64>) -> Result<String, serde_json::Error> {
    serde_json::to_string(params)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetrainRequest {
    Start { batch_ids: Vec<String> },
    /// A request code this backend does not understand. Any frames after it are dropped.
    Unknown(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// The scheduler tags its heartbeats with a kind. The backend's own
    /// heartbeat is the bare type frame.
    BackendHeartbeat(Option<HeartbeatKind>),
    BackendMetadata(BackendMetadata),
    StartRetrain { msg_id: u32, request: RetrainRequest },
    RetrainStarted { msg_id: u32, status: u32 },
    RetrainEnded { msg_id: u32, status: u32 },
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::BackendHeartbeat(_) => MessageType::BackendHeartbeat,
            Message::BackendMetadata(_) => MessageType::BackendMetadata,
            Message::StartRetrain { .. } => MessageType::StartRetrain,
            Message::RetrainStarted { .. } => MessageType::RetrainStarted,
            Message::RetrainEnded { .. } => MessageType::RetrainEnded,
        }
    }

    pub fn to_frames(&self) -> Vec<Bytes> {
        let mut frames = vec![u32_frame(self.message_type().code())];
        match self {
            Message::BackendHeartbeat(Some(kind)) => frames.push(u32_frame(kind.code())),
            Message::BackendHeartbeat(None) => {}
            Message::BackendMetadata(metadata) => {
                for field in [
                    &metadata.name,
                    &metadata.version,
                    &metadata.app_name,
                    &metadata.policy,
                    &metadata.params,
                ] {
                    frames.push(Bytes::copy_from_slice(field.as_bytes()));
                }
            }
            Message::StartRetrain { msg_id, request } => {
                frames.push(u32_frame(*msg_id));
                match request {
                    RetrainRequest::Start { batch_ids } => {
                        frames.push(u32_frame(REQUEST_TYPE_START_RETRAIN));
                        frames.push(Bytes::from(join_ids(batch_ids)));
                    }
                    RetrainRequest::Unknown(code) => frames.push(u32_frame(*code)),
                }
            }
            Message::RetrainStarted { msg_id, status } | Message::RetrainEnded { msg_id, status } => {
                frames.push(u32_frame(*msg_id));
                frames.push(u32_frame(*status));
            }
        }
        frames
    }

    /// Frames as a DEALER sends them: an empty delimiter, then the message.
    pub fn to_envelope(&self) -> Frames {
        let mut frames = vec![Bytes::new()];
        frames.extend(self.to_frames());
        frames
    }

    /// Parses frames read from a DEALER socket, which start with the empty delimiter.
    pub fn from_envelope(frames: &[Bytes]) -> Result<Self, DecodeError> {
        let (delimiter, rest) = frames.split_first().ok_or(DecodeError::Empty)?;
        if !delimiter.is_empty() {
            return Err(DecodeError::MissingDelimiter(delimiter.len()));
        }
        Self::from_frames(rest)
    }

    pub fn from_frames(frames: &[Bytes]) -> Result<Self, DecodeError> {
        let (type_frame, rest) = frames.split_first().ok_or(DecodeError::Empty)?;
        let code = read_u32(type_frame).ok_or(DecodeError::InvalidTypeFrame(type_frame.len()))?;
        let message_type = MessageType::try_from(code)?;
        let mut reader = FrameReader {
            message_type,
            frames: rest.iter(),
        };

        Ok(match message_type {
            MessageType::BackendHeartbeat => match reader.frames.len() {
                0 => Message::BackendHeartbeat(None),
                _ => Message::BackendHeartbeat(Some(HeartbeatKind::try_from(
                    reader.u32("heartbeat type")?,
                )?)),
            },
            MessageType::BackendMetadata => Message::BackendMetadata(BackendMetadata {
                name: reader.string("name")?,
                version: reader.string("version")?,
                app_name: reader.string("app name")?,
                policy: reader.string("policy")?,
                params: reader.string("params")?,
            }),
            MessageType::StartRetrain => {
                let msg_id = reader.u32("msg_id")?;
                let request = match reader.u32("request type")? {
                    REQUEST_TYPE_START_RETRAIN => RetrainRequest::Start {
                        batch_ids: split_ids(&reader.string("batch ids")?),
                    },
                    other => RetrainRequest::Unknown(other),
                };
                Message::StartRetrain { msg_id, request }
            }
            MessageType::RetrainStarted => Message::RetrainStarted {
                msg_id: reader.u32("msg_id")?,
                status: reader.u32("status")?,
            },
            MessageType::RetrainEnded => Message::RetrainEnded {
                msg_id: reader.u32("msg_id")?,
                status: reader.u32("status")?,
            },
        })
    }
}

struct FrameReader<'a> {
    message_type: MessageType,
    frames: slice::Iter<'a, Bytes>,
}

impl<'a> FrameReader<'a> {
    fn next(&mut self, field: &'static str) -> Result<&'a Bytes, DecodeError> {
        self.frames.next().ok_or(DecodeError::MissingFrame {
            message: self.message_type,
            field,
        })
    }

    fn u32(&mut self, field: &'static str) -> Result<u32, DecodeError> {
        let frame = self.next(field)?;
        read_u32(frame).ok_or(DecodeError::InvalidInteger {
            message: self.message_type,
            field,
            len: frame.len(),
        })
    }

    fn string(&mut self, field: &'static str) -> Result<String, DecodeError> {
        let frame = self.next(field)?;
        String::from_utf8(frame.to_vec()).map_err(|_| DecodeError::InvalidString {
            message: self.message_type,
            field,
        })
    }
}

fn u32_frame(value: u32) -> Bytes {
    Bytes::copy_from_slice(&value.to_le_bytes())
}

fn read_u32(frame: &[u8]) -> Option<u32> {
    let bytes: [u8; 4] = frame.try_into().ok()?;
    Some(u32::from_le_bytes(bytes))
}

fn join_ids(ids: &[String]) -> String {
    let mut joined = String::with_capacity(ids.iter().map(|id| id.len() + 1).sum());
    for id in ids {
        joined.push_str(id);
        joined.push(ID_TERMINATOR);
    }
    joined
}

// every id is NUL-terminated; a trailing unterminated id is still accepted.
fn split_ids(raw: &str) -> Vec<String> {
    raw.split_terminator(ID_TERMINATOR)
        .map(str::to_owned)
        .collect()
}
