//! Protocol Client
//!
//! Owns a connection and its framer; assigns strictly increasing request
//! ids, pipelines requests, and correlates out-of-order replies through the
//! pending-request table.
//!
//! ## Architecture
//! - The caller's thread encodes and writes requests
//! - One reader thread per client drains the socket through a private Framer
//! - Each in-flight request holds a bounded(1) completion channel; replies
//!   resolve it by request id, in whatever order the server answers

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;

use crate::config::Config;
use crate::error::{Result, WireError};
use crate::protocol::{
    decode_frame, decode_reply, encode_request, Framer, Reply, Request, Status,
};

/// Read buffer size for the reader thread (64 KB)
const READ_BUFFER_SIZE: usize = 64 * 1024;

// =============================================================================
// Correlation Table
// =============================================================================

/// Map from request id to the completion handle of the awaiting caller
///
/// `None` means the connection has closed; no further entries may register.
struct PendingTable {
    entries: Mutex<Option<HashMap<u32, Sender<Result<Reply>>>>>,
}

impl PendingTable {
    fn new() -> Self {
        Self {
            entries: Mutex::new(Some(HashMap::new())),
        }
    }

    /// Register a completion handle for an outgoing request
    fn register(&self, id: u32, tx: Sender<Result<Reply>>) -> Result<()> {
        match self.entries.lock().as_mut() {
            Some(map) => {
                map.insert(id, tx);
                Ok(())
            }
            None => Err(WireError::ConnectionClosed),
        }
    }

    /// Resolve an entry, returning whether a caller was still waiting
    fn resolve(&self, id: u32, result: Result<Reply>) -> bool {
        let tx = self.entries.lock().as_mut().and_then(|map| map.remove(&id));
        match tx {
            // A send error means the caller already timed out and left
            Some(tx) => tx.send(result).is_ok(),
            None => false,
        }
    }

    /// Remove an entry whose caller gave up (timeout or failed write)
    fn evict(&self, id: u32) {
        if let Some(map) = self.entries.lock().as_mut() {
            map.remove(&id);
        }
    }

    /// Close the table, rejecting every outstanding entry
    ///
    /// Dropping the senders disconnects the receivers, so waiting callers
    /// observe ConnectionClosed instead of hanging on a dead connection.
    fn close(&self) {
        self.entries.lock().take();
    }
}

// =============================================================================
// Pending Reply Handle
// =============================================================================

/// Handle to an in-flight request
///
/// Returned by [`Client::send`] without blocking the caller, so several
/// requests may be outstanding at once. `wait()` blocks until the matching
/// reply arrives, the request times out, or the connection closes.
pub struct PendingReply {
    id: u32,
    rx: Receiver<Result<Reply>>,
    pending: Arc<PendingTable>,
    timeout: Duration,
    sent_at: Instant,
}

impl PendingReply {
    /// The request id this handle is correlated on
    pub fn request_id(&self) -> u32 {
        self.id
    }

    /// Block until the reply arrives or the request deadline expires
    ///
    /// On timeout the correlation entry is evicted, so a late reply for this
    /// id is discarded as a stray instead of accumulating forever.
    pub fn wait(self) -> Result<Reply> {
        match self.rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                self.pending.evict(self.id);
                Err(WireError::Timeout)
            }
            Err(RecvTimeoutError::Disconnected) => Err(WireError::ConnectionClosed),
        }
    }

    /// When the request was written to the connection
    pub fn sent_at(&self) -> Instant {
        self.sent_at
    }
}

// =============================================================================
// Client
// =============================================================================

/// Client for the wirekv protocol
pub struct Client {
    /// Write half; callers serialize frame writes through this lock
    writer: Mutex<TcpStream>,

    /// Correlation table shared with the reader thread
    pending: Arc<PendingTable>,

    /// Monotonic request id counter, never reused for this client's lifetime
    next_id: AtomicU32,

    /// Per-request reply deadline
    request_timeout: Duration,

    /// Reader thread, reaped on drop
    reader: Option<JoinHandle<()>>,
}

impl Client {
    /// Connect with the default configuration
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        Self::connect_with(addr, Config::default())
    }

    /// Connect with an explicit configuration
    pub fn connect_with(addr: impl ToSocketAddrs, config: Config) -> Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;

        let pending = Arc::new(PendingTable::new());
        let read_stream = stream.try_clone()?;
        let framer = Framer::with_max_payload(config.max_payload_size);

        let reader = thread::spawn({
            let pending = Arc::clone(&pending);
            move || read_loop(read_stream, framer, pending)
        });

        Ok(Self {
            writer: Mutex::new(stream),
            pending,
            next_id: AtomicU32::new(1),
            request_timeout: Duration::from_millis(config.request_timeout_ms),
            reader: Some(reader),
        })
    }

    /// Send a request and return its pending-reply handle without blocking
    ///
    /// Pipelining is explicit: callers may issue further sends while earlier
    /// handles are still unresolved.
    pub fn send(&self, request: &Request) -> Result<PendingReply> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = bounded(1);

        // Register before writing so a reply cannot race past the table
        self.pending.register(id, tx)?;

        let bytes = encode_request(id, request);
        let write_result = {
            let mut stream = self.writer.lock();
            stream.write_all(&bytes)
        };
        let sent_at = Instant::now();

        if let Err(e) = write_result {
            self.pending.evict(id);
            return Err(e.into());
        }

        Ok(PendingReply {
            id,
            rx,
            pending: Arc::clone(&self.pending),
            timeout: self.request_timeout,
            sent_at,
        })
    }

    /// Get a value by key
    ///
    /// Returns `None` when the server answers NOT_FOUND.
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let reply = self
            .send(&Request::Get {
                key: key.as_bytes().to_vec(),
            })?
            .wait()?;

        match reply {
            Reply::Response {
                status: Status::Ok,
                data,
            } => {
                let value = String::from_utf8(data).map_err(|e| {
                    WireError::Payload(format!("GET response value is not UTF-8: {}", e))
                })?;
                Ok(Some(value))
            }
            Reply::Response {
                status: Status::NotFound,
                ..
            } => Ok(None),
            other => Err(unexpected_reply(other)),
        }
    }

    /// Set a key-value pair, returning whether the server answered OK
    pub fn set(&self, key: &str, value: &str) -> Result<bool> {
        let reply = self
            .send(&Request::Set {
                key: key.as_bytes().to_vec(),
                value: value.as_bytes().to_vec(),
            })?
            .wait()?;

        match reply {
            Reply::Response { status, .. } => Ok(status == Status::Ok),
            other => Err(unexpected_reply(other)),
        }
    }

    /// Delete a key, returning whether it existed
    pub fn delete(&self, key: &str) -> Result<bool> {
        let reply = self
            .send(&Request::Delete {
                key: key.as_bytes().to_vec(),
            })?
            .wait()?;

        match reply {
            Reply::Response { status, .. } => Ok(status == Status::Ok),
            other => Err(unexpected_reply(other)),
        }
    }

    /// Ping the server, returning the wall-clock round-trip time
    pub fn ping(&self) -> Result<Duration> {
        let handle = self.send(&Request::Ping)?;
        let sent_at = handle.sent_at();

        match handle.wait()? {
            Reply::Pong => Ok(sent_at.elapsed()),
            other => Err(unexpected_reply(other)),
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        // Unblock the reader thread, then reap it; the read loop rejects any
        // still-outstanding requests on its way out.
        let _ = self.writer.lock().shutdown(Shutdown::Both);
        if let Some(handle) = self.reader.take() {
            let _ = handle.join();
        }
    }
}

/// Turn a reply the typed operations cannot interpret into an error
fn unexpected_reply(reply: Reply) -> WireError {
    match reply {
        Reply::Error { code, message } => WireError::Remote { code, message },
        other => WireError::Payload(format!("Unexpected reply: {:?}", other)),
    }
}

// =============================================================================
// Reader Thread
// =============================================================================

/// Drain the socket, reassemble frames, and resolve waiting callers
fn read_loop(mut stream: TcpStream, mut framer: Framer, pending: Arc<PendingTable>) {
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    'outer: loop {
        let n = match stream.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(ref e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::debug!("Client read error: {}", e);
                break;
            }
        };

        let frames = match framer.push(&buf[..n]) {
            Ok(frames) => frames,
            Err(e) => {
                tracing::warn!("Framing violation from server, closing: {}", e);
                break;
            }
        };

        for frame_bytes in frames {
            // The framer guarantees a full, magic-checked header, so the
            // request id can be read even when typed decoding fails below.
            let request_id =
                u32::from_be_bytes([frame_bytes[7], frame_bytes[8], frame_bytes[9], frame_bytes[10]]);

            let result = match decode_frame(&frame_bytes) {
                Ok(frame) => decode_reply(&frame),
                Err(e) => Err(e),
            };

            match result {
                Ok(reply) => {
                    if !pending.resolve(request_id, Ok(reply)) {
                        // No caller awaits this id (duplicate or stray)
                        tracing::trace!("Discarding stray reply for request {}", request_id);
                    }
                }
                Err(WireError::Payload(msg)) => {
                    // The envelope is sound, so surface the malformed payload
                    // to the caller and keep the connection going.
                    tracing::warn!("Malformed reply for request {}: {}", request_id, msg);
                    pending.resolve(request_id, Err(WireError::Payload(msg)));
                }
                Err(e) => {
                    tracing::warn!("Undecodable frame from server, closing: {}", e);
                    pending.resolve(request_id, Err(e));
                    break 'outer;
                }
            }
        }
    }

    // Reject every outstanding request rather than leaving callers dangling
    pending.close();
}
