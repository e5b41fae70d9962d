//! Line reassembly over an append-only receive buffer.
//!
//! UART reads deliver frames in arbitrary chunks. Bytes are fed as they
//! arrive; complete lines are drained one at a time and any incomplete tail
//! stays buffered for the next read.

use crate::message::{DELIMITER, Message};

/// Default buffer capacity (matches the radio UART rx buffer).
pub const DEFAULT_CAPACITY: usize = 512;

/// One delimiter-terminated line drained from a [`LineBuffer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLine(Vec<u8>);

impl RawLine {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn parse(&self) -> Message {
        Message::parse(&self.0)
    }

    /// Lossy text without the delimiter, for logging.
    pub fn display(&self) -> String {
        String::from_utf8_lossy(self.0.trim_ascii_end()).into_owned()
    }
}

/// Growable receive buffer owning every unconsumed byte.
#[derive(Debug, Clone)]
pub struct LineBuffer {
    buf: Vec<u8>,
    capacity: usize,
    overflowed: u64,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// `capacity` bounds the bytes held while no delimiter has been seen.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity.min(DEFAULT_CAPACITY)),
            capacity: capacity.max(1),
            overflowed: 0,
        }
    }

    /// Append raw bytes.
    ///
    /// When the buffer would exceed its capacity without containing a
    /// delimiter, the oldest bytes are dropped: a line that long can never
    /// be a valid frame.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
        if self.buf.len() > self.capacity && !self.buf.contains(&DELIMITER) {
            let excess = self.buf.len() - self.capacity;
            self.buf.drain(..excess);
            self.overflowed += excess as u64;
        }
    }

    /// Remove and return the first complete line, delimiter included.
    pub fn take_line(&mut self) -> Option<RawLine> {
        let end = self.buf.iter().position(|&b| b == DELIMITER)?;
        let rest = self.buf.split_off(end + 1);
        let line = std::mem::replace(&mut self.buf, rest);
        Some(RawLine(line))
    }

    pub fn has_line(&self) -> bool {
        self.buf.contains(&DELIMITER)
    }

    /// Bytes currently buffered (complete lines and partial tail).
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Drop everything buffered. Returns the number of bytes discarded.
    pub fn clear(&mut self) -> usize {
        let n = self.buf.len();
        self.buf.clear();
        n
    }

    /// Total bytes dropped by the capacity guard.
    pub fn overflowed(&self) -> u64 {
        self.overflowed
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}
