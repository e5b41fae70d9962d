//! Debounce state machine for per-node presence.
//!
//! Turns noisy poll outcomes into a stable presence value:
//!
//! - **Confirmation**: the stable state only moves to a new value after
//!   `threshold` consecutive identical observations of it.
//! - **Reset**: any differing observation restarts the candidate with a
//!   count of 1.
//! - **Unknown never commits**: an unanswered poll is recorded (it resets
//!   the candidate and extends `unknown_streak`) but never changes the
//!   stable state. Deciding when a silent node counts as unreachable is left
//!   to the consumer via `unknown_streak`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::Presence;

/// Default number of consecutive identical observations needed to commit.
pub const DEFAULT_CONFIRMATION_THRESHOLD: u32 = 2;

/// Debounced presence of one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebouncedState {
    /// The committed presence seen by consumers.
    pub stable: Presence,
    /// The most recent raw observation.
    pub candidate: Presence,
    /// How many times in a row `candidate` has been observed.
    pub consecutive: u32,
    /// Consecutive `Unknown` observations (0 after any answered poll).
    pub unknown_streak: u32,
    /// When `stable` last changed.
    pub changed_at: DateTime<Utc>,
    /// When the last observation was recorded.
    pub observed_at: Option<DateTime<Utc>>,
}

impl DebouncedState {
    /// Fresh state: stable `Unknown`, nothing observed.
    pub fn unknown(now: DateTime<Utc>) -> Self {
        Self {
            stable: Presence::Unknown,
            candidate: Presence::Unknown,
            consecutive: 0,
            unknown_streak: 0,
            changed_at: now,
            observed_at: None,
        }
    }
}

/// Output of a debounce update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceOutput {
    /// Stable presence after this update.
    pub stable: Presence,
    /// Whether the stable presence changed in this update.
    pub changed: bool,
    /// Previous stable presence.
    pub previous: Presence,
}

/// Record one raw observation.
///
/// A `threshold` of 0 behaves like 1.
pub fn update(
    state: &DebouncedState,
    observed: Presence,
    now: DateTime<Utc>,
    threshold: u32,
) -> (DebouncedState, DebounceOutput) {
    let consecutive = if observed == state.candidate && state.consecutive > 0 {
        state.consecutive.saturating_add(1)
    } else {
        1
    };

    let unknown_streak = if observed.is_known() {
        0
    } else {
        state.unknown_streak.saturating_add(1)
    };

    let commit = observed.is_known() && observed != state.stable && consecutive >= threshold;

    let stable = if commit { observed } else { state.stable };
    let changed_at = if commit { now } else { state.changed_at };

    let next = DebouncedState {
        stable,
        candidate: observed,
        consecutive,
        unknown_streak,
        changed_at,
        observed_at: Some(now),
    };
    let output = DebounceOutput {
        stable,
        changed: commit,
        previous: state.stable,
    };
    (next, output)
}
