//! Message framer
//!
//! Reassembles complete frames from an unbounded, arbitrarily-chunked byte
//! stream. One framer per live connection; never shared across connections.

use bytes::{Bytes, BytesMut};

use super::codec::{HEADER_SIZE, MAGIC, MAX_PAYLOAD_SIZE};
use crate::error::{Result, WireError};

/// Stateful byte-stream to discrete-frame reassembler
///
/// A single growing accumulator consumed with an index cursor (`split_to`),
/// so extraction does not re-copy the unconsumed remainder. A chunk boundary
/// may fall anywhere: mid-header, mid-payload, or exactly on a frame
/// boundary; the accumulator handles all three uniformly.
pub struct Framer {
    /// Accumulated bytes not yet consumed as a frame
    buffer: BytesMut,

    /// Largest payload a frame may declare
    max_payload_size: u32,
}

impl Framer {
    /// Create a framer with the default payload cap
    pub fn new() -> Self {
        Self::with_max_payload(MAX_PAYLOAD_SIZE)
    }

    /// Create a framer with a custom payload cap
    pub fn with_max_payload(max_payload_size: u32) -> Self {
        Self {
            buffer: BytesMut::with_capacity(64 * 1024),
            max_payload_size,
        }
    }

    /// Append a chunk and drain every complete frame it unlocks
    ///
    /// Returns the complete frames, header included, byte-identical to what
    /// the peer sent. An empty vector means more input is needed.
    ///
    /// A magic mismatch in a would-be header is fatal: the stream cannot be
    /// realigned, and the caller must tear the connection down rather than
    /// attempt resynchronization.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<Bytes>> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(frame) = self.try_extract_one()? {
            frames.push(frame);
        }

        Ok(frames)
    }

    /// Try to extract a single frame from the accumulator
    ///
    /// Returns `Ok(None)` when the buffer holds less than one complete frame.
    fn try_extract_one(&mut self) -> Result<Option<Bytes>> {
        if self.buffer.len() < HEADER_SIZE {
            return Ok(None);
        }

        let magic = u16::from_be_bytes([self.buffer[0], self.buffer[1]]);
        if magic != MAGIC {
            return Err(WireError::Protocol(format!(
                "Bad magic: 0x{:04x} (expected 0x{:04x}), stream is corrupt",
                magic, MAGIC
            )));
        }

        let total_len =
            u32::from_be_bytes([self.buffer[2], self.buffer[3], self.buffer[4], self.buffer[5]])
                as usize;
        if total_len < HEADER_SIZE {
            return Err(WireError::Protocol(format!(
                "Frame length {} shorter than header",
                total_len
            )));
        }
        if total_len - HEADER_SIZE > self.max_payload_size as usize {
            return Err(WireError::Protocol(format!(
                "Payload too large: {} bytes (max {})",
                total_len - HEADER_SIZE,
                self.max_payload_size
            )));
        }

        if self.buffer.len() < total_len {
            // Sole suspension point: wait for more input
            return Ok(None);
        }

        Ok(Some(self.buffer.split_to(total_len).freeze()))
    }

    /// Get the number of buffered, unconsumed bytes
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the accumulator is empty
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

impl Default for Framer {
    fn default() -> Self {
        Self::new()
    }
}
