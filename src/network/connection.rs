//! Connection Handler
//!
//! Handles individual client connections.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::error::{Result, WireError};
use crate::protocol::{
    decode_frame, decode_request, encode_reply, Framer, Reply, Request, ERR_MALFORMED,
    ERR_UNSUPPORTED,
};
use crate::store::Store;

/// Read buffer size per connection (64 KB)
const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Handles a single client connection
///
/// Owns the connection's framer; framer state is never shared across
/// connections and dies with the connection.
pub struct Connection {
    /// TCP stream (read and write alternate on the handler thread)
    stream: TcpStream,

    /// Per-connection frame reassembler
    framer: Framer,

    /// Shared key-value backend
    store: Arc<dyn Store>,

    /// Peer address for logging
    peer_addr: String,
}

impl Connection {
    /// Create a new connection handler
    ///
    /// Disables Nagle and configures timeouts from the server config.
    pub fn new(stream: TcpStream, store: Arc<dyn Store>, config: &Config) -> Result<Self> {
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        // Disable Nagle's algorithm for low latency
        stream.set_nodelay(true)?;

        if config.read_timeout_ms > 0 {
            stream.set_read_timeout(Some(Duration::from_millis(config.read_timeout_ms)))?;
        }
        if config.write_timeout_ms > 0 {
            stream.set_write_timeout(Some(Duration::from_millis(config.write_timeout_ms)))?;
        }

        Ok(Self {
            stream,
            framer: Framer::with_max_payload(config.max_payload_size),
            store,
            peer_addr,
        })
    }

    /// Handle the connection (blocking until closed)
    ///
    /// Reads chunks in a loop, feeds the framer, and dispatches every
    /// complete frame in arrival order. Returns when the client disconnects
    /// or a fatal protocol violation occurs.
    pub fn handle(&mut self) -> Result<()> {
        tracing::debug!("Connection established from {}", self.peer_addr);

        let mut buf = vec![0u8; READ_BUFFER_SIZE];

        loop {
            let n = match self.stream.read(&mut buf) {
                Ok(0) => {
                    // Client disconnected gracefully
                    tracing::debug!("Client {} disconnected", self.peer_addr);
                    return Ok(());
                }
                Ok(n) => n,
                Err(ref e) if e.kind() == std::io::ErrorKind::ConnectionReset => {
                    tracing::debug!("Connection reset by client {}", self.peer_addr);
                    return Ok(());
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::ConnectionAborted => {
                    tracing::debug!("Connection aborted by client {}", self.peer_addr);
                    return Ok(());
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    tracing::debug!("Read timeout for client {}", self.peer_addr);
                    return Ok(());
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => {
                    // Windows reports TimedOut instead of WouldBlock
                    tracing::debug!("Read timeout for client {}", self.peer_addr);
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!("Error reading from {}: {}", self.peer_addr, e);
                    return Err(e.into());
                }
            };

            // A framing error means the stream cannot be realigned; tear the
            // connection down rather than resynchronize.
            let frames = match self.framer.push(&buf[..n]) {
                Ok(frames) => frames,
                Err(e) => {
                    tracing::warn!(
                        "Framing violation from {}, closing connection: {}",
                        self.peer_addr,
                        e
                    );
                    return Err(e);
                }
            };

            for frame_bytes in frames {
                self.process_frame(&frame_bytes)?;
            }
        }
    }

    /// Decode one complete frame and answer it on the same connection
    fn process_frame(&mut self, bytes: &[u8]) -> Result<()> {
        let frame = match decode_frame(bytes) {
            Ok(frame) => frame,
            Err(e) => {
                // The framer already validated magic and length, so the only
                // envelope failure left is an unrecognized type byte. Answer
                // with ERROR and keep the connection; the stream is aligned.
                let request_id =
                    u32::from_be_bytes([bytes[7], bytes[8], bytes[9], bytes[10]]);
                tracing::warn!(
                    "Unsupported message type from {} (request {}): {}",
                    self.peer_addr,
                    request_id,
                    e
                );
                return self.send_reply(
                    request_id,
                    &Reply::error(ERR_UNSUPPORTED, "unsupported message type"),
                );
            }
        };

        tracing::trace!(
            "Received {:?} from {} (request {})",
            frame.msg_type,
            self.peer_addr,
            frame.request_id
        );

        let reply = if !frame.msg_type.is_request() {
            tracing::warn!(
                "Unexpected {:?} frame from {} (request {})",
                frame.msg_type,
                self.peer_addr,
                frame.request_id
            );
            Reply::error(ERR_UNSUPPORTED, "unsupported message type")
        } else {
            match decode_request(&frame) {
                Ok(request) => self.execute_request(request),
                Err(e) => {
                    tracing::warn!(
                        "Malformed payload from {} (request {}): {}",
                        self.peer_addr,
                        frame.request_id,
                        e
                    );
                    Reply::error(ERR_MALFORMED, &e.to_string())
                }
            }
        };

        self.send_reply(frame.request_id, &reply)
    }

    /// Execute a request against the store and build the reply
    fn execute_request(&self, request: Request) -> Reply {
        match request {
            Request::Get { key } => match as_utf8(key, "key") {
                Ok(key) => match self.store.get(&key) {
                    Some(value) => Reply::ok(value.into_bytes()),
                    None => Reply::not_found(),
                },
                Err(reply) => reply,
            },
            Request::Set { key, value } => {
                match (as_utf8(key, "key"), as_utf8(value, "value")) {
                    (Ok(key), Ok(value)) => {
                        self.store.set(key, value);
                        Reply::ok(Vec::new())
                    }
                    (Err(reply), _) | (_, Err(reply)) => reply,
                }
            }
            Request::Delete { key } => match as_utf8(key, "key") {
                Ok(key) => {
                    if self.store.delete(&key) {
                        Reply::ok(Vec::new())
                    } else {
                        Reply::not_found()
                    }
                }
                Err(reply) => reply,
            },
            Request::Ping => Reply::Pong,
        }
    }

    /// Send a reply to the client, preserving the inbound request id
    fn send_reply(&mut self, request_id: u32, reply: &Reply) -> Result<()> {
        let bytes = encode_reply(request_id, reply);

        if let Err(e) = self.stream.write_all(&bytes) {
            // The client may disconnect before the response lands; treat the
            // usual teardown kinds as a graceful close, not a server error.
            match e.kind() {
                std::io::ErrorKind::ConnectionAborted
                | std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::BrokenPipe => {
                    tracing::debug!(
                        "Client {} disconnected before reply could be sent: {}",
                        self.peer_addr,
                        e
                    );
                    return Err(WireError::ConnectionClosed);
                }
                _ => {
                    tracing::warn!("Error writing to {}: {}", self.peer_addr, e);
                    return Err(e.into());
                }
            }
        }

        Ok(())
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}

/// Interpret wire bytes as a UTF-8 string or build the malformed-payload reply
fn as_utf8(bytes: Vec<u8>, what: &str) -> std::result::Result<String, Reply> {
    String::from_utf8(bytes)
        .map_err(|_| Reply::error(ERR_MALFORMED, &format!("{} is not valid UTF-8", what)))
}
