//! Transport counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Live counters, updated by the transport without taking its lock.
#[derive(Debug, Default)]
pub struct TransportStats {
    transmitted: AtomicU64,
    received: AtomicU64,
    timeouts: AtomicU64,
    parse_errors: AtomicU64,
    flushed_bytes: AtomicU64,
    link_errors: AtomicU64,
    ignored_lines: AtomicU64,
    retries: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportStatsSnapshot {
    /// Frames written to the link.
    pub transmitted: u64,
    /// Lines read off the link, matching or not.
    pub received: u64,
    /// Attempts that ended without a matching reply.
    pub timeouts: u64,
    /// Received lines that did not parse.
    pub parse_errors: u64,
    /// Stale bytes dropped before transmitting.
    pub flushed_bytes: u64,
    pub link_errors: u64,
    /// Received lines that were not the awaited reply.
    pub ignored_lines: u64,
    /// Attempts after the first one.
    pub retries: u64,
}

impl TransportStats {
    pub(crate) fn add_transmitted(&self) {
        self.transmitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_parse_error(&self) {
        self.parse_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_flushed(&self, bytes: usize) {
        self.flushed_bytes.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn add_link_error(&self) {
        self.link_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_ignored(&self) {
        self.ignored_lines.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TransportStatsSnapshot {
        TransportStatsSnapshot {
            transmitted: self.transmitted.load(Ordering::Relaxed),
            received: self.received.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            parse_errors: self.parse_errors.load(Ordering::Relaxed),
            flushed_bytes: self.flushed_bytes.load(Ordering::Relaxed),
            link_errors: self.link_errors.load(Ordering::Relaxed),
            ignored_lines: self.ignored_lines.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
        }
    }
}

impl TransportStatsSnapshot {
    /// Share of transmitted frames answered, in percent.
    pub fn success_rate(&self) -> Option<f64> {
        if self.transmitted == 0 {
            return None;
        }
        let answered = self.transmitted.saturating_sub(self.timeouts);
        Some(answered as f64 * 100.0 / self.transmitted as f64)
    }
}
