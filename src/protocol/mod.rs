//! Protocol Module
//!
//! Defines the wire protocol for client-server communication.
//!
//! ## Frame Format (V1 - Simple Binary)
//!
//! All multi-byte integers are big-endian.
//!
//! ```text
//! ┌───────────┬───────────────┬──────────┬───────────────┬─────────────┐
//! │ Magic (2) │ TotalLen (4)  │ Type (1) │ RequestId (4) │   Payload   │
//! └───────────┴───────────────┴──────────┴───────────────┴─────────────┘
//! ```
//!
//! `TotalLen` counts the entire frame, header included.
//!
//! ### Message Types
//! - 0x01: PING     - Payload: empty
//! - 0x02: PONG     - Payload: empty
//! - 0x03: GET      - Payload: key_len (2) + key
//! - 0x04: SET      - Payload: key_len (2) + key + value
//! - 0x05: DELETE   - Payload: key_len (2) + key
//! - 0x06: RESPONSE - Payload: status (1) + data
//! - 0x07: ERROR    - Payload: code (2) + message (UTF-8)
//!
//! ### Status Codes
//! - 0x00: OK
//! - 0x01: NOT_FOUND
//! - 0x02: ERROR

mod codec;
mod framer;
mod message;

pub use codec::{
    decode_frame, decode_reply, decode_request, encode_frame, encode_reply, encode_request, Frame,
    HEADER_SIZE, MAGIC, MAX_PAYLOAD_SIZE,
};
pub use framer::Framer;
pub use message::{MessageType, Reply, Request, Status, ERR_MALFORMED, ERR_UNSUPPORTED};
