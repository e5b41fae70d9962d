//! Node main loop: drives a [`Responder`] over a [`FrameReader`].

use std::time::Duration;

use dtd_core::config::TimingConfig;
use dtd_core::message::Message;
use dtd_link::{FrameReader, Link, LinkError};
use tokio::time::Instant;

use crate::collab::{IdStore, PresenceSensor};
use crate::responder::{Responder, ResponderStats};

/// Log the counters every this many handled lines.
pub const DEFAULT_STATS_EVERY: u64 = 100;

#[derive(Debug, Clone)]
pub struct NodeSettings {
    /// Settle time before the startup flush and `BOOT`.
    pub boot_grace: Duration,
    /// Upper bound of each receive-side drain.
    pub flush_window: Duration,
    pub read_granularity: Duration,
    /// How long one `step` waits for a line.
    pub idle_wait: Duration,
    pub stats_every: u64,
}

impl NodeSettings {
    pub fn from_timing(timing: &TimingConfig) -> Self {
        Self {
            boot_grace: timing.boot_grace(),
            flush_window: timing.flush_window(),
            read_granularity: timing.read_granularity(),
            idle_wait: timing.poll_period(),
            stats_every: DEFAULT_STATS_EVERY,
        }
    }
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self::from_timing(&TimingConfig::default())
    }
}

pub struct NodeRunner<L, S, I> {
    reader: FrameReader<L>,
    responder: Responder,
    sensor: S,
    store: I,
    settings: NodeSettings,
    handled: u64,
}

impl<L, S, I> NodeRunner<L, S, I>
where
    L: Link,
    S: PresenceSensor,
    I: IdStore,
{
    pub fn new(link: L, responder: Responder, sensor: S, store: I, settings: NodeSettings) -> Self {
        Self {
            reader: FrameReader::new(link, settings.read_granularity),
            responder,
            sensor,
            store,
            settings,
            handled: 0,
        }
    }

    pub fn responder(&self) -> &Responder {
        &self.responder
    }

    pub fn stats(&self) -> &ResponderStats {
        self.responder.stats()
    }

    pub fn store(&self) -> &I {
        &self.store
    }

    /// Wait out the power-up noise, drop it, announce ourselves.
    pub async fn boot(&mut self) -> Result<(), LinkError> {
        tokio::time::sleep(self.settings.boot_grace).await;
        self.reader.flush_input(self.settings.flush_window).await?;
        let boot = self.responder.boot_message();
        self.reader.send(&boot).await?;
        tracing::info!("node {} online", self.responder.id());
        Ok(())
    }

    /// Handle at most one inbound line. Returns the reply sent, if any.
    ///
    /// Only a fatal link error is returned as `Err`; a failed write of a
    /// reply is counted and the node keeps listening.
    pub async fn step(&mut self, wait: Duration) -> Result<Option<Message>, LinkError> {
        let line = match self.reader.next_line(wait).await {
            Ok(Some(line)) => line,
            Ok(None) => return Ok(None),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                tracing::warn!("read failed: {e}");
                return Ok(None);
            }
        };
        let started = Instant::now();
        let message = line.parse();
        tracing::debug!("← {}", line.display());

        let reply = self
            .responder
            .handle(&message, &self.sensor, &mut self.store);
        self.handled += 1;
        if self.settings.stats_every > 0 && self.handled % self.settings.stats_every == 0 {
            self.log_stats();
        }

        let Some(reply) = reply else {
            return Ok(None);
        };
        match self.transmit(&reply).await {
            Ok(()) => {
                self.responder.record_response(started.elapsed());
                Ok(Some(reply))
            }
            Err(e) => {
                self.responder.record_reply_failure();
                if e.is_fatal() {
                    return Err(e);
                }
                tracing::warn!("reply {reply} not sent: {e}");
                Ok(None)
            }
        }
    }

    // The medium is half-duplex: drain whatever queued up behind the request
    // so the reply is not interleaved with stale traffic.
    async fn transmit(&mut self, reply: &Message) -> Result<(), LinkError> {
        self.reader.flush_input(self.settings.flush_window).await?;
        self.reader.send(reply).await
    }

    /// Boot, then serve until the link fails for good.
    pub async fn run(&mut self) -> Result<(), LinkError> {
        self.boot().await?;
        loop {
            self.step(self.settings.idle_wait).await?;
        }
    }

    pub fn log_stats(&self) {
        match serde_json::to_string(self.responder.stats()) {
            Ok(json) => tracing::info!("node {} stats {json}", self.responder.id()),
            Err(e) => tracing::warn!("stats serialization failed: {e}"),
        }
    }
}
