//! Startup identity resolution.
//!
//! Precedence, first match wins: explicit configuration, the persisted id,
//! the address straps, then the factory fallback `01`.

use std::fmt;

use dtd_core::node_id::NodeId;
use serde::Serialize;

use crate::collab::{IdStore, StrapReader};

/// Strap value → id table of the deployed boards.
pub const STRAP_IDS: [(u8, &str); 5] = [(1, "01"), (2, "02"), (3, "03"), (4, "04"), (5, "05")];

pub const FALLBACK_ID: &str = "01";

/// Where the running id came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "source", content = "strap")]
pub enum IdSource {
    Config,
    Persisted,
    Strap(u8),
    Fallback,
}

impl fmt::Display for IdSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config => f.write_str("config"),
            Self::Persisted => f.write_str("persisted"),
            Self::Strap(v) => write!(f, "strap {v}"),
            Self::Fallback => f.write_str("fallback"),
        }
    }
}

/// Id for a strap reading, if the value is wired to one.
pub fn id_for_strap(value: u8) -> Option<NodeId> {
    STRAP_IDS
        .iter()
        .find(|(v, _)| *v == value)
        .and_then(|(_, id)| NodeId::parse(id).ok())
}

pub fn resolve_identity<S, R>(
    configured: Option<&NodeId>,
    store: &S,
    straps: &R,
) -> (NodeId, IdSource)
where
    S: IdStore + ?Sized,
    R: StrapReader + ?Sized,
{
    if let Some(id) = configured {
        return (id.clone(), IdSource::Config);
    }
    match store.load_id() {
        Ok(Some(id)) => return (id, IdSource::Persisted),
        Ok(None) => {}
        Err(e) => tracing::warn!("ignoring persisted id: {e}"),
    }
    if let Some(value) = straps.read_strap() {
        match id_for_strap(value) {
            Some(id) => return (id, IdSource::Strap(value)),
            None => tracing::warn!("strap value {value} has no id mapping"),
        }
    }
    (NodeId::numbered(1), IdSource::Fallback)
}
