//! Node-side message handling.
//!
//! [`Responder`] is pure: it maps one parsed message to at most one reply,
//! consulting the sensor and id store. Nodes never initiate traffic (apart
//! from the startup `BOOT`), and everything another node emits is an echo
//! of the shared medium to be dropped without a trace beyond a counter.

use std::time::Duration;

use dtd_core::message::{Message, UnrecognizedReason};
use dtd_core::node_id::NodeId;
use serde::Serialize;

use crate::collab::{IdStore, PresenceSensor};

/// Diagnostic counters of a running node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResponderStats {
    pub polls_answered: u64,
    pub polls_not_for_me: u64,
    pub setid_ok: u64,
    pub setid_err: u64,
    pub echoes_ignored: u64,
    pub unrecognized_empty: u64,
    pub unrecognized_too_short: u64,
    pub unrecognized_unknown_prefix: u64,
    pub unrecognized_malformed: u64,
    pub reply_failures: u64,
    pub min_response_us: Option<u64>,
    pub max_response_us: Option<u64>,
}

impl ResponderStats {
    /// Record the time between parsing a request and finishing its reply.
    pub fn record_response(&mut self, elapsed: Duration) {
        let us = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.min_response_us = Some(self.min_response_us.map_or(us, |m| m.min(us)));
        self.max_response_us = Some(self.max_response_us.map_or(us, |m| m.max(us)));
    }

    fn record_unrecognized(&mut self, reason: UnrecognizedReason) {
        let counter = match reason {
            UnrecognizedReason::Empty => &mut self.unrecognized_empty,
            UnrecognizedReason::TooShort => &mut self.unrecognized_too_short,
            UnrecognizedReason::UnknownPrefix => &mut self.unrecognized_unknown_prefix,
            UnrecognizedReason::Malformed => &mut self.unrecognized_malformed,
        };
        *counter += 1;
    }

    pub fn unrecognized_total(&self) -> u64 {
        self.unrecognized_empty
            + self.unrecognized_too_short
            + self.unrecognized_unknown_prefix
            + self.unrecognized_malformed
    }
}

#[derive(Debug, Clone)]
pub struct Responder {
    id: NodeId,
    stats: ResponderStats,
}

impl Responder {
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            stats: ResponderStats::default(),
        }
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn stats(&self) -> &ResponderStats {
        &self.stats
    }

    /// Startup announcement.
    pub fn boot_message(&self) -> Message {
        Message::Boot {
            id: self.id.clone(),
        }
    }

    /// Handle one inbound message, returning the reply to transmit.
    pub fn handle<S, I>(&mut self, message: &Message, sensor: &S, store: &mut I) -> Option<Message>
    where
        S: PresenceSensor + ?Sized,
        I: IdStore + ?Sized,
    {
        match message {
            Message::Poll { target } => {
                if !target.addresses(&self.id) {
                    self.stats.polls_not_for_me += 1;
                    return None;
                }
                let present = sensor.is_present();
                self.stats.polls_answered += 1;
                Some(Message::Ack {
                    from: self.id.clone(),
                    present,
                })
            }
            Message::SetId { new_id } => Some(self.assign(new_id, store)),
            Message::Ack { .. } | Message::Boot { .. } | Message::AckSetId { .. } => {
                self.stats.echoes_ignored += 1;
                None
            }
            Message::Unrecognized(reason) => {
                self.stats.record_unrecognized(*reason);
                None
            }
        }
    }

    fn assign<I: IdStore + ?Sized>(&mut self, new_id: &NodeId, store: &mut I) -> Message {
        match store.save_id(new_id) {
            Ok(()) => {
                tracing::info!("id changed {} -> {new_id}", self.id);
                self.id = new_id.clone();
                self.stats.setid_ok += 1;
                Message::AckSetId {
                    id: new_id.clone(),
                    ok: true,
                }
            }
            Err(e) => {
                tracing::warn!("cannot persist id {new_id}, keeping {}: {e}", self.id);
                self.stats.setid_err += 1;
                Message::AckSetId {
                    id: new_id.clone(),
                    ok: false,
                }
            }
        }
    }

    pub fn record_response(&mut self, elapsed: Duration) {
        self.stats.record_response(elapsed);
    }

    pub fn record_reply_failure(&mut self) {
        self.stats.reply_failures += 1;
    }
}
