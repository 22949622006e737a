//! Chat wire bodies.
//!
//! Fixed-width fields, zero-padded, numeric fields big-endian. The frame
//! layer treats these bodies as opaque bytes; both binaries must agree on
//! the layouts below.

use bytes::{Buf, BufMut, BytesMut};
use thiserror::Error;

use relayd_wire::TargetTag;

/// Target tag of login requests (client → server).
pub const TARGET_LOGIN: TargetTag = TargetTag::from_bytes(*b"LOGIN\0\0\0");

/// Target tag of chat messages (both directions).
pub const TARGET_CHAT: TargetTag = TargetTag::from_bytes(*b"CHAT\0\0\0\0");

/// Sender name the server uses for its own notices.
pub const SYSTEM_SENDER: &str = "SYSTEM";

const USER_ID_LEN: usize = 32;
const PASSWORD_LEN: usize = 32;
const MESSAGE_LEN: usize = 128;

/// Decode failures for chat bodies.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("body too short: {len} bytes, need {need}")]
    BodyTooShort { len: usize, need: usize },
}

fn put_padded(buf: &mut BytesMut, text: &str, width: usize) {
    let bytes = text.as_bytes();
    let take = bytes.len().min(width);
    buf.put_slice(&bytes[..take]);
    buf.put_bytes(0, width - take);
}

fn take_padded(buf: &mut &[u8], width: usize) -> String {
    let field = &buf[..width];
    let end = field.iter().position(|&b| b == 0).unwrap_or(width);
    let text = String::from_utf8_lossy(&field[..end]).into_owned();
    buf.advance(width);
    text
}

/// Login request body: user id, password, protocol version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRequest {
    pub user_id: String,
    pub password: String,
    pub version: u32,
}

impl LoginRequest {
    pub const WIRE_LEN: usize = USER_ID_LEN + PASSWORD_LEN + 4;

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(Self::WIRE_LEN);
        put_padded(&mut buf, &self.user_id, USER_ID_LEN);
        put_padded(&mut buf, &self.password, PASSWORD_LEN);
        buf.put_u32(self.version);
        buf.to_vec()
    }

    pub fn decode(mut body: &[u8]) -> Result<Self, ProtocolError> {
        if body.len() < Self::WIRE_LEN {
            return Err(ProtocolError::BodyTooShort {
                len: body.len(),
                need: Self::WIRE_LEN,
            });
        }
        let user_id = take_padded(&mut body, USER_ID_LEN);
        let password = take_padded(&mut body, PASSWORD_LEN);
        let version = body.get_u32();
        Ok(LoginRequest {
            user_id,
            password,
            version,
        })
    }
}

/// Chat message body: sender, text, unix timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub sender: String,
    pub text: String,
    pub timestamp: u64,
}

impl ChatMessage {
    pub const WIRE_LEN: usize = USER_ID_LEN + MESSAGE_LEN + 8;

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(Self::WIRE_LEN);
        put_padded(&mut buf, &self.sender, USER_ID_LEN);
        put_padded(&mut buf, &self.text, MESSAGE_LEN);
        buf.put_u64(self.timestamp);
        buf.to_vec()
    }

    pub fn decode(mut body: &[u8]) -> Result<Self, ProtocolError> {
        if body.len() < Self::WIRE_LEN {
            return Err(ProtocolError::BodyTooShort {
                len: body.len(),
                need: Self::WIRE_LEN,
            });
        }
        let sender = take_padded(&mut body, USER_ID_LEN);
        let text = take_padded(&mut body, MESSAGE_LEN);
        let timestamp = body.get_u64();
        Ok(ChatMessage {
            sender,
            text,
            timestamp,
        })
    }
}
