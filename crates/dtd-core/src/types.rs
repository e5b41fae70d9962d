use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::node_id::NodeId;

/// Presence of a node as seen by the coordinator.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    /// No usable answer (timeout, link fault) or not observed yet.
    #[default]
    Unknown,
    Present,
    Absent,
}

impl Presence {
    pub fn from_ack(present: bool) -> Self {
        if present { Self::Present } else { Self::Absent }
    }

    pub fn is_known(self) -> bool {
        self != Self::Unknown
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Present => "present",
            Self::Absent => "absent",
        }
    }
}

impl fmt::Display for Presence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one poll of one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeObservation {
    pub node_id: NodeId,
    pub raw_state: Presence,
    pub observed_at: DateTime<Utc>,
}

impl NodeObservation {
    pub fn new(node_id: NodeId, raw_state: Presence, observed_at: DateTime<Utc>) -> Self {
        Self {
            node_id,
            raw_state,
            observed_at,
        }
    }
}
