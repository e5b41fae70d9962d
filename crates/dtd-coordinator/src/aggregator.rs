//! Per-node debounced presence, fed one observation at a time.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use dtd_core::debounce::{self, DebouncedState};
use dtd_core::node_id::NodeId;
use dtd_core::types::{NodeObservation, Presence};
use serde::{Deserialize, Serialize};

/// A committed change of a node's stable presence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChange {
    pub node_id: NodeId,
    pub from: Presence,
    pub to: Presence,
    pub at: DateTime<Utc>,
}

impl fmt::Display for StateChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} -> {}", self.node_id, self.from, self.to)
    }
}

/// Stable presence counts over all known nodes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub present: usize,
    pub absent: usize,
    pub unknown: usize,
}

impl ScanSummary {
    pub fn total(&self) -> usize {
        self.present + self.absent + self.unknown
    }
}

type Listener = Box<dyn FnMut(&StateChange) + Send>;

pub struct Aggregator {
    threshold: u32,
    states: BTreeMap<NodeId, DebouncedState>,
    listeners: Vec<Listener>,
}

impl Aggregator {
    /// Every node in `nodes` starts as `Unknown`.
    pub fn new(nodes: &[NodeId], threshold: u32, now: DateTime<Utc>) -> Self {
        let states = nodes
            .iter()
            .map(|id| (id.clone(), DebouncedState::unknown(now)))
            .collect();
        Self {
            threshold,
            states,
            listeners: Vec::new(),
        }
    }

    /// Register a callback invoked for every committed change.
    pub fn on_change<F>(&mut self, listener: F)
    where
        F: FnMut(&StateChange) + Send + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    /// Record one observation. Returns whether the node's stable state
    /// changed.
    pub fn observe(&mut self, observation: &NodeObservation) -> bool {
        self.record(observation).is_some()
    }

    /// Like [`observe`](Self::observe), returning the change itself.
    pub fn record(&mut self, observation: &NodeObservation) -> Option<StateChange> {
        let now = observation.observed_at;
        let state = self
            .states
            .entry(observation.node_id.clone())
            .or_insert_with(|| DebouncedState::unknown(now));
        let (next, output) = debounce::update(state, observation.raw_state, now, self.threshold);
        *state = next;
        if !output.changed {
            return None;
        }

        let change = StateChange {
            node_id: observation.node_id.clone(),
            from: output.previous,
            to: output.stable,
            at: now,
        };
        tracing::info!("node {change}");
        for listener in &mut self.listeners {
            listener(&change);
        }
        Some(change)
    }

    pub fn current_states(&self) -> BTreeMap<NodeId, Presence> {
        self.states
            .iter()
            .map(|(id, state)| (id.clone(), state.stable))
            .collect()
    }

    pub fn state(&self, node_id: &NodeId) -> Option<&DebouncedState> {
        self.states.get(node_id)
    }

    /// Consecutive unanswered polls of `node_id` (0 for unknown ids).
    pub fn unknown_streak(&self, node_id: &NodeId) -> u32 {
        self.states.get(node_id).map_or(0, |s| s.unknown_streak)
    }

    pub fn summary(&self) -> ScanSummary {
        self.states
            .values()
            .fold(ScanSummary::default(), |mut summary, state| {
                match state.stable {
                    Presence::Present => summary.present += 1,
                    Presence::Absent => summary.absent += 1,
                    Presence::Unknown => summary.unknown += 1,
                }
                summary
            })
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use std::sync::{Arc, Mutex};

    fn id(s: &str) -> NodeId {
        NodeId::parse(s).expect("valid id")
    }

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-01T08:00:00Z")
            .expect("timestamp")
            .with_timezone(&Utc)
    }

    fn obs(node: &str, raw: Presence, secs: i64) -> NodeObservation {
        NodeObservation::new(id(node), raw, t0() + TimeDelta::seconds(secs))
    }

    #[test]
    fn configured_nodes_start_unknown() {
        let agg = Aggregator::new(&[id("01"), id("02")], 2, t0());
        let states = agg.current_states();
        assert_eq!(states.len(), 2);
        assert!(states.values().all(|p| *p == Presence::Unknown));
        assert_eq!(agg.summary().unknown, 2);
    }

    #[test]
    fn second_confirmation_commits() {
        let mut agg = Aggregator::new(&[id("03")], 2, t0());
        assert!(!agg.observe(&obs("03", Presence::Present, 1)));
        assert!(agg.observe(&obs("03", Presence::Present, 2)));
        assert!(!agg.observe(&obs("03", Presence::Present, 3)));
        assert_eq!(agg.current_states()[&id("03")], Presence::Present);
    }

    #[test]
    fn flapping_never_commits() {
        let mut agg = Aggregator::new(&[id("03")], 2, t0());
        agg.observe(&obs("03", Presence::Present, 1));
        agg.observe(&obs("03", Presence::Present, 2));
        for (i, raw) in [Presence::Absent, Presence::Present, Presence::Absent]
            .into_iter()
            .enumerate()
        {
            assert!(!agg.observe(&obs("03", raw, 3 + i as i64)));
        }
        assert_eq!(agg.current_states()[&id("03")], Presence::Present);
    }

    #[test]
    fn listeners_see_only_changes() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut agg = Aggregator::new(&[id("01"), id("02")], 1, t0());
        agg.on_change(move |c| sink.lock().expect("sink").push(c.clone()));

        agg.observe(&obs("01", Presence::Present, 1));
        agg.observe(&obs("01", Presence::Present, 2));
        agg.observe(&obs("02", Presence::Unknown, 2));
        agg.observe(&obs("02", Presence::Absent, 3));

        let seen = seen.lock().expect("sink");
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].node_id, id("01"));
        assert_eq!(seen[0].from, Presence::Unknown);
        assert_eq!(seen[0].to, Presence::Present);
        assert_eq!(seen[1].to, Presence::Absent);
        assert_eq!(seen[1].at, t0() + TimeDelta::seconds(3));
    }

    #[test]
    fn unknown_streak_tracks_silence() {
        let mut agg = Aggregator::new(&[id("04")], 2, t0());
        agg.observe(&obs("04", Presence::Present, 1));
        agg.observe(&obs("04", Presence::Present, 2));
        for s in 3..6 {
            agg.observe(&obs("04", Presence::Unknown, s));
        }
        assert_eq!(agg.unknown_streak(&id("04")), 3);
        assert_eq!(agg.current_states()[&id("04")], Presence::Present);

        agg.observe(&obs("04", Presence::Present, 6));
        assert_eq!(agg.unknown_streak(&id("04")), 0);
        assert_eq!(agg.unknown_streak(&id("99")), 0);
    }

    #[test]
    fn summary_counts_stable_states() {
        let mut agg = Aggregator::new(&[id("01"), id("02"), id("03")], 1, t0());
        agg.observe(&obs("01", Presence::Present, 1));
        agg.observe(&obs("02", Presence::Absent, 1));
        let summary = agg.summary();
        assert_eq!(
            summary,
            ScanSummary {
                present: 1,
                absent: 1,
                unknown: 1
            }
        );
        assert_eq!(summary.total(), 3);
    }

    #[test]
    fn unconfigured_node_is_tracked() {
        let mut agg = Aggregator::new(&[], 1, t0());
        assert!(agg.observe(&obs("08", Presence::Absent, 1)));
        assert_eq!(agg.current_states().len(), 1);
    }
}
