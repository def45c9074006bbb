//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol.
//!
//! ## Wire Format
//!
//! ```text
//! ┌───────────┬───────────────┬──────────┬───────────────┬─────────────┐
//! │ Magic (2) │ TotalLen (4)  │ Type (1) │ RequestId (4) │   Payload   │
//! └───────────┴───────────────┴──────────┴───────────────┴─────────────┘
//! ```
//!
//! ### Payload by Message Type
//! - GET:      key_len (2 bytes) + key
//! - SET:      key_len (2 bytes) + key + value
//! - DELETE:   key_len (2 bytes) + key
//! - PING/PONG: empty
//! - RESPONSE: status (1 byte) + data
//! - ERROR:    code (2 bytes) + message (UTF-8)

use bytes::{BufMut, BytesMut};

use super::{MessageType, Reply, Request, Status};
use crate::error::{Result, WireError};

/// Magic constant identifying the protocol
pub const MAGIC: u16 = 0xBEEF;

/// Header size: 2 bytes magic + 4 bytes total length + 1 byte type + 4 bytes request id
pub const HEADER_SIZE: usize = 11;

/// Maximum payload size (16 MB)
pub const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

/// A decoded frame envelope
///
/// Only the header has been validated; the payload is opaque until a
/// per-command decoder interprets it.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Message type from the header
    pub msg_type: MessageType,

    /// Caller-assigned request identifier, opaque to the protocol
    pub request_id: u32,

    /// Raw payload bytes
    pub payload: Vec<u8>,
}

// =============================================================================
// Generic Frame Encoding/Decoding
// =============================================================================

/// Encode a frame with the common header around an arbitrary payload
///
/// Format: magic (2) + total_len (4) + type (1) + request_id (4) + payload.
/// Always succeeds for payloads that fit the length field.
pub fn encode_frame(msg_type: MessageType, request_id: u32, payload: &[u8]) -> Vec<u8> {
    let total_len = (HEADER_SIZE + payload.len()) as u32;

    let mut frame = BytesMut::with_capacity(HEADER_SIZE + payload.len());
    frame.put_u16(MAGIC);
    frame.put_u32(total_len);
    frame.put_u8(msg_type as u8);
    frame.put_u32(request_id);
    frame.put_slice(payload);

    frame.to_vec()
}

/// Decode a frame envelope from bytes
///
/// Validates the header only; payload internals are checked by the
/// per-command decoders.
pub fn decode_frame(bytes: &[u8]) -> Result<Frame> {
    if bytes.len() < HEADER_SIZE {
        return Err(WireError::Protocol(format!(
            "Incomplete header: expected {} bytes, got {}",
            HEADER_SIZE,
            bytes.len()
        )));
    }

    // Parse and validate magic
    let magic = u16::from_be_bytes([bytes[0], bytes[1]]);
    if magic != MAGIC {
        return Err(WireError::Protocol(format!(
            "Bad magic: 0x{:04x} (expected 0x{:04x})",
            magic, MAGIC
        )));
    }

    // Parse total length and validate it against the buffer
    let total_len = u32::from_be_bytes([bytes[2], bytes[3], bytes[4], bytes[5]]) as usize;
    if total_len < HEADER_SIZE {
        return Err(WireError::Protocol(format!(
            "Frame length {} shorter than header",
            total_len
        )));
    }
    if total_len - HEADER_SIZE > MAX_PAYLOAD_SIZE as usize {
        return Err(WireError::Protocol(format!(
            "Payload too large: {} bytes (max {})",
            total_len - HEADER_SIZE,
            MAX_PAYLOAD_SIZE
        )));
    }
    if bytes.len() < total_len {
        return Err(WireError::Protocol(format!(
            "Incomplete frame: expected {} bytes, got {}",
            total_len,
            bytes.len()
        )));
    }

    let msg_type = MessageType::from_u8(bytes[6])?;
    let request_id = u32::from_be_bytes([bytes[7], bytes[8], bytes[9], bytes[10]]);
    let payload = bytes[HEADER_SIZE..total_len].to_vec();

    Ok(Frame {
        msg_type,
        request_id,
        payload,
    })
}

// =============================================================================
// Request Encoding/Decoding
// =============================================================================

/// Encode a request to a complete frame
pub fn encode_request(request_id: u32, request: &Request) -> Vec<u8> {
    let payload = match request {
        Request::Get { key } | Request::Delete { key } => {
            let mut payload = BytesMut::with_capacity(2 + key.len());
            payload.put_u16(key.len() as u16);
            payload.put_slice(key);
            payload.to_vec()
        }
        Request::Set { key, value } => {
            let mut payload = BytesMut::with_capacity(2 + key.len() + value.len());
            payload.put_u16(key.len() as u16);
            payload.put_slice(key);
            payload.put_slice(value);
            payload.to_vec()
        }
        Request::Ping => Vec::new(),
    };

    encode_frame(request.message_type(), request_id, &payload)
}

/// Decode a request from a frame envelope
///
/// Fails with a payload error if the frame is not a request type or its
/// payload does not match the declared layout.
pub fn decode_request(frame: &Frame) -> Result<Request> {
    match frame.msg_type {
        MessageType::Get => {
            let (key, rest) = decode_key(&frame.payload, "GET")?;
            if !rest.is_empty() {
                return Err(WireError::Payload(format!(
                    "GET request: {} trailing bytes after key",
                    rest.len()
                )));
            }
            Ok(Request::Get { key })
        }
        MessageType::Set => {
            let (key, rest) = decode_key(&frame.payload, "SET")?;
            Ok(Request::Set {
                key,
                value: rest.to_vec(),
            })
        }
        MessageType::Delete => {
            let (key, rest) = decode_key(&frame.payload, "DELETE")?;
            if !rest.is_empty() {
                return Err(WireError::Payload(format!(
                    "DELETE request: {} trailing bytes after key",
                    rest.len()
                )));
            }
            Ok(Request::Delete { key })
        }
        MessageType::Ping => {
            if !frame.payload.is_empty() {
                return Err(WireError::Payload(format!(
                    "PING request: unexpected payload of {} bytes",
                    frame.payload.len()
                )));
            }
            Ok(Request::Ping)
        }
        other => Err(WireError::Payload(format!(
            "Not a request message type: {:?}",
            other
        ))),
    }
}

/// Decode a length-prefixed key, returning the key and the remaining bytes
fn decode_key<'a>(payload: &'a [u8], what: &str) -> Result<(Vec<u8>, &'a [u8])> {
    if payload.len() < 2 {
        return Err(WireError::Payload(format!(
            "{} request: missing key length",
            what
        )));
    }

    let key_len = u16::from_be_bytes([payload[0], payload[1]]) as usize;

    if payload.len() < 2 + key_len {
        return Err(WireError::Payload(format!(
            "{} request: incomplete key (expected {}, got {})",
            what,
            key_len,
            payload.len() - 2
        )));
    }

    let key = payload[2..2 + key_len].to_vec();
    Ok((key, &payload[2 + key_len..]))
}

// =============================================================================
// Reply Encoding/Decoding
// =============================================================================

/// Encode a reply to a complete frame, preserving the request id
pub fn encode_reply(request_id: u32, reply: &Reply) -> Vec<u8> {
    let payload = match reply {
        Reply::Pong => Vec::new(),
        Reply::Response { status, data } => {
            let mut payload = BytesMut::with_capacity(1 + data.len());
            payload.put_u8(*status as u8);
            payload.put_slice(data);
            payload.to_vec()
        }
        Reply::Error { code, message } => {
            let mut payload = BytesMut::with_capacity(2 + message.len());
            payload.put_u16(*code);
            payload.put_slice(message.as_bytes());
            payload.to_vec()
        }
    };

    encode_frame(reply.message_type(), request_id, &payload)
}

/// Decode a reply from a frame envelope
pub fn decode_reply(frame: &Frame) -> Result<Reply> {
    match frame.msg_type {
        MessageType::Pong => {
            if !frame.payload.is_empty() {
                return Err(WireError::Payload(format!(
                    "PONG reply: unexpected payload of {} bytes",
                    frame.payload.len()
                )));
            }
            Ok(Reply::Pong)
        }
        MessageType::Response => {
            if frame.payload.is_empty() {
                return Err(WireError::Payload(
                    "RESPONSE reply: missing status byte".to_string(),
                ));
            }
            let status = Status::from_u8(frame.payload[0])?;
            Ok(Reply::Response {
                status,
                data: frame.payload[1..].to_vec(),
            })
        }
        MessageType::Error => {
            if frame.payload.len() < 2 {
                return Err(WireError::Payload(
                    "ERROR reply: missing error code".to_string(),
                ));
            }
            let code = u16::from_be_bytes([frame.payload[0], frame.payload[1]]);
            let message = String::from_utf8(frame.payload[2..].to_vec()).map_err(|e| {
                WireError::Payload(format!("ERROR reply: message is not UTF-8: {}", e))
            })?;
            Ok(Reply::Error { code, message })
        }
        other => Err(WireError::Payload(format!(
            "Not a reply message type: {:?}",
            other
        ))),
    }
}
