//! Coordinator request/response over the shared link.
//!
//! The radio is half-duplex and every node hears every frame, so a request
//! owns the link from its first transmit until its last reply wait: the
//! reader sits behind an async mutex held for the whole call, retries
//! included. Two callers can never interleave their frames.

use std::time::Duration;

use dtd_core::config::TimingConfig;
use dtd_core::message::Message;
use dtd_core::node_id::NodeId;
use dtd_link::{FrameReader, Link, LinkError};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::retry::RetryPolicy;
use crate::stats::{TransportStats, TransportStatsSnapshot};

/// Outcome of a request that did not fail at the link level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exchange {
    Reply(Message),
    TimedOut,
}

impl Exchange {
    pub fn reply(&self) -> Option<&Message> {
        match self {
            Exchange::Reply(m) => Some(m),
            Exchange::TimedOut => None,
        }
    }

    pub fn is_timed_out(&self) -> bool {
        matches!(self, Exchange::TimedOut)
    }
}

pub struct Transport<L> {
    reader: Mutex<FrameReader<L>>,
    stats: TransportStats,
    flush_window: Duration,
}

impl<L: Link> Transport<L> {
    pub fn new(link: L, timing: &TimingConfig) -> Self {
        Self {
            reader: Mutex::new(FrameReader::new(link, timing.read_granularity())),
            stats: TransportStats::default(),
            flush_window: timing.flush_window(),
        }
    }

    pub fn stats(&self) -> TransportStatsSnapshot {
        self.stats.snapshot()
    }

    /// Send `request` and wait for a reply accepted by `matcher`.
    ///
    /// Lines the matcher rejects (echoes, other nodes, noise) are counted
    /// and skipped without restarting the attempt. A timed-out attempt is
    /// followed by the policy's backoff, then a retransmit. Only a fatal
    /// link error is returned as `Err`.
    pub async fn request<F>(
        &self,
        request: &Message,
        mut matcher: F,
        policy: &RetryPolicy,
    ) -> Result<Exchange, LinkError>
    where
        F: FnMut(&Message) -> bool + Send,
    {
        let mut reader = self.reader.lock().await;
        for attempt in 0..policy.attempts() {
            if attempt > 0 {
                self.stats.add_retry();
            }
            match self
                .attempt(&mut reader, request, &mut matcher, policy.reply_timeout)
                .await
            {
                Ok(Some(reply)) => return Ok(Exchange::Reply(reply)),
                Ok(None) => {
                    self.stats.add_timeout();
                    tracing::debug!("no reply to {request} (attempt {})", attempt + 1);
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    self.stats.add_link_error();
                    tracing::warn!("link error during {request}: {e}");
                }
            }
            if attempt < policy.max_retries {
                tokio::time::sleep(policy.backoff_for(attempt)).await;
            }
        }
        tracing::debug!("{request} unanswered after {} attempts", policy.attempts());
        Ok(Exchange::TimedOut)
    }

    async fn attempt<F>(
        &self,
        reader: &mut FrameReader<L>,
        request: &Message,
        matcher: &mut F,
        timeout: Duration,
    ) -> Result<Option<Message>, LinkError>
    where
        F: FnMut(&Message) -> bool + Send,
    {
        let flushed = reader.flush_input(self.flush_window).await?;
        self.stats.add_flushed(flushed);

        reader.send(request).await?;
        self.stats.add_transmitted();

        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            let Some(line) = reader.next_line(remaining).await? else {
                return Ok(None);
            };
            self.stats.add_received();
            let message = line.parse();
            tracing::debug!("← {}", line.display());
            if matcher(&message) {
                return Ok(Some(message));
            }
            if !message.is_recognized() {
                self.stats.add_parse_error();
            }
            self.stats.add_ignored();
        }
    }

    /// Ask `target` for its presence. A wildcard poll accepts any node's ACK.
    pub async fn poll(&self, target: &NodeId, policy: &RetryPolicy) -> Result<Exchange, LinkError> {
        let request = Message::Poll {
            target: target.clone(),
        };
        let wildcard = target.is_wildcard();
        self.request(
            &request,
            |m| matches!(m, Message::Ack { from, .. } if wildcard || from == target),
            policy,
        )
        .await
    }

    /// Reassign the id of whichever node is listening. The matching
    /// `ACKSETID` carries the new id.
    pub async fn assign_id(
        &self,
        new_id: &NodeId,
        policy: &RetryPolicy,
    ) -> Result<Exchange, LinkError> {
        let request = Message::SetId {
            new_id: new_id.clone(),
        };
        self.request(
            &request,
            |m| matches!(m, Message::AckSetId { id, .. } if id == new_id),
            policy,
        )
        .await
    }
}
