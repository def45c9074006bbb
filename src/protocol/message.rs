//! Message definitions
//!
//! Typed views of the frames exchanged between client and server.

use crate::error::{Result, WireError};

/// ERROR frame code: the message type is not one the server dispatches
pub const ERR_UNSUPPORTED: u16 = 1;

/// ERROR frame code: the payload does not match its declared layout
pub const ERR_MALFORMED: u16 = 2;

/// Wire-level message types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    Ping = 0x01,
    Pong = 0x02,
    Get = 0x03,
    Set = 0x04,
    Delete = 0x05,
    Response = 0x06,
    Error = 0x07,
}

impl MessageType {
    /// Parse a raw type byte
    pub fn from_u8(byte: u8) -> Result<Self> {
        match byte {
            0x01 => Ok(MessageType::Ping),
            0x02 => Ok(MessageType::Pong),
            0x03 => Ok(MessageType::Get),
            0x04 => Ok(MessageType::Set),
            0x05 => Ok(MessageType::Delete),
            0x06 => Ok(MessageType::Response),
            0x07 => Ok(MessageType::Error),
            _ => Err(WireError::Protocol(format!(
                "Unknown message type: 0x{:02x}",
                byte
            ))),
        }
    }

    /// Whether this type is a client-to-server request
    pub fn is_request(self) -> bool {
        matches!(
            self,
            MessageType::Ping | MessageType::Get | MessageType::Set | MessageType::Delete
        )
    }
}

/// Response status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    Ok = 0x00,
    NotFound = 0x01,
    Error = 0x02,
}

impl Status {
    /// Parse a raw status byte
    pub fn from_u8(byte: u8) -> Result<Self> {
        match byte {
            0x00 => Ok(Status::Ok),
            0x01 => Ok(Status::NotFound),
            0x02 => Ok(Status::Error),
            _ => Err(WireError::Payload(format!(
                "Unknown response status: 0x{:02x}",
                byte
            ))),
        }
    }
}

/// A request from client to server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Get a value by key
    Get { key: Vec<u8> },

    /// Set a key-value pair
    Set { key: Vec<u8>, value: Vec<u8> },

    /// Delete a key
    Delete { key: Vec<u8> },

    /// Ping (health check / latency probe)
    Ping,
}

impl Request {
    /// Get the wire message type
    pub fn message_type(&self) -> MessageType {
        match self {
            Request::Get { .. } => MessageType::Get,
            Request::Set { .. } => MessageType::Set,
            Request::Delete { .. } => MessageType::Delete,
            Request::Ping => MessageType::Ping,
        }
    }
}

/// A reply from server to client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Answer to a PING
    Pong,

    /// Answer to GET/SET/DELETE
    Response { status: Status, data: Vec<u8> },

    /// Request-level failure (unsupported type, malformed payload)
    Error { code: u16, message: String },
}

impl Reply {
    /// Get the wire message type
    pub fn message_type(&self) -> MessageType {
        match self {
            Reply::Pong => MessageType::Pong,
            Reply::Response { .. } => MessageType::Response,
            Reply::Error { .. } => MessageType::Error,
        }
    }

    /// Create an OK response with payload data
    pub fn ok(data: Vec<u8>) -> Self {
        Reply::Response {
            status: Status::Ok,
            data,
        }
    }

    /// Create a NOT_FOUND response
    pub fn not_found() -> Self {
        Reply::Response {
            status: Status::NotFound,
            data: Vec::new(),
        }
    }

    /// Create an ERROR reply
    pub fn error(code: u16, message: &str) -> Self {
        Reply::Error {
            code,
            message: message.to_string(),
        }
    }
}
