//! Scan loop: poll every configured node in order, debounce, report.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dtd_core::config::ProtocolConfig;
use dtd_core::message::Message;
use dtd_core::node_id::NodeId;
use dtd_core::types::{NodeObservation, Presence};
use dtd_link::{Link, LinkError};
use serde::Serialize;
use tokio::time::MissedTickBehavior;

use crate::aggregator::{Aggregator, ScanSummary, StateChange};
use crate::retry::RetryPolicy;
use crate::stats::TransportStatsSnapshot;
use crate::transport::{Exchange, Transport};

/// Everything one scan cycle produced.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub cycle: u64,
    pub started_at: DateTime<Utc>,
    pub observations: Vec<NodeObservation>,
    pub changes: Vec<StateChange>,
    pub states: BTreeMap<NodeId, Presence>,
    pub summary: ScanSummary,
    pub transport: TransportStatsSnapshot,
}

pub struct Orchestrator<L> {
    transport: Arc<Transport<L>>,
    aggregator: Aggregator,
    nodes: Vec<NodeId>,
    policy: RetryPolicy,
    inter_poll_delay: Duration,
    poll_period: Duration,
    cycle: u64,
}

impl<L: Link> Orchestrator<L> {
    /// `config` is expected to be validated already.
    pub fn new(transport: Arc<Transport<L>>, config: &ProtocolConfig) -> Self {
        Self {
            transport,
            aggregator: Aggregator::new(
                &config.nodes,
                config.debounce.confirmation_threshold,
                Utc::now(),
            ),
            nodes: config.nodes.clone(),
            policy: RetryPolicy::from_config(&config.retry, config.timing.reply_timeout()),
            inter_poll_delay: config.timing.inter_poll_delay(),
            poll_period: config.timing.poll_period(),
            cycle: 0,
        }
    }

    pub fn transport(&self) -> &Arc<Transport<L>> {
        &self.transport
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    pub fn aggregator_mut(&mut self) -> &mut Aggregator {
        &mut self.aggregator
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Raw presence of one node. Silence is `Unknown`, not absence.
    pub async fn poll_node(&self, node_id: &NodeId) -> Result<Presence, LinkError> {
        poll_presence(&self.transport, &self.policy, node_id).await
    }

    /// Poll every configured node once, in configuration order.
    pub async fn scan_cycle(&mut self) -> Result<ScanReport, LinkError> {
        self.cycle += 1;
        let started_at = Utc::now();
        let mut observations = Vec::with_capacity(self.nodes.len());
        let mut changes = Vec::new();

        for node_id in &self.nodes {
            let raw = poll_presence(&self.transport, &self.policy, node_id).await?;
            let observation = NodeObservation::new(node_id.clone(), raw, Utc::now());
            if let Some(change) = self.aggregator.record(&observation) {
                changes.push(change);
            }
            observations.push(observation);
            tokio::time::sleep(self.inter_poll_delay).await;
        }

        let summary = self.aggregator.summary();
        tracing::debug!(
            "cycle {}: {} present, {} absent, {} unknown",
            self.cycle,
            summary.present,
            summary.absent,
            summary.unknown
        );
        Ok(ScanReport {
            cycle: self.cycle,
            started_at,
            observations,
            changes,
            states: self.aggregator.current_states(),
            summary,
            transport: self.transport.stats(),
        })
    }

    /// Scan on a fixed period, handing each report to `sink`. Stops after
    /// `max_cycles` when given; otherwise only a fatal link error ends it.
    /// A cycle overrunning the period delays the next one instead of
    /// bunching up catch-up scans.
    pub async fn run<F>(&mut self, max_cycles: Option<u64>, mut sink: F) -> Result<(), LinkError>
    where
        F: FnMut(&ScanReport),
    {
        let mut ticker = tokio::time::interval(self.poll_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(
            "scanning {} nodes every {}ms",
            self.nodes.len(),
            self.poll_period.as_millis()
        );
        let mut done = 0u64;
        loop {
            if max_cycles.is_some_and(|max| done >= max) {
                return Ok(());
            }
            ticker.tick().await;
            let report = self.scan_cycle().await?;
            sink(&report);
            done += 1;
        }
    }
}

async fn poll_presence<L: Link>(
    transport: &Transport<L>,
    policy: &RetryPolicy,
    node_id: &NodeId,
) -> Result<Presence, LinkError> {
    match transport.poll(node_id, policy).await {
        Ok(Exchange::Reply(Message::Ack { present, .. })) => Ok(Presence::from_ack(present)),
        Ok(_) => Ok(Presence::Unknown),
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            tracing::warn!("poll of {node_id} failed: {e}");
            Ok(Presence::Unknown)
        }
    }
}
