//! Node identities.
//!
//! An id is 1–8 printable ASCII characters without `:` (the wire field
//! separator). `ALL` (any case) is the reserved wildcard addressing every
//! node; ordinary ids compare exactly.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum id length in bytes.
pub const MAX_ID_LEN: usize = 8;

/// Canonical spelling of the wildcard id.
pub const WILDCARD: &str = "ALL";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodeIdError {
    #[error("node id is empty")]
    Empty,

    #[error("node id {0:?} is longer than {MAX_ID_LEN} characters")]
    TooLong(String),

    #[error("node id {id:?} contains invalid character {ch:?}")]
    InvalidChar { id: String, ch: char },
}

/// Validated node identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeId(String);

impl NodeId {
    pub fn parse(raw: &str) -> Result<Self, NodeIdError> {
        if raw.is_empty() {
            return Err(NodeIdError::Empty);
        }
        if let Some(ch) = raw.chars().find(|c| !is_id_char(*c)) {
            return Err(NodeIdError::InvalidChar {
                id: raw.to_string(),
                ch,
            });
        }
        if raw.len() > MAX_ID_LEN {
            return Err(NodeIdError::TooLong(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    /// The wildcard id addressing every node.
    pub fn wildcard() -> Self {
        Self(WILDCARD.to_string())
    }

    /// Two-digit zero-padded id (`7` → `"07"`), the numbering used by the
    /// deployed detector groups.
    pub fn numbered(n: u8) -> Self {
        Self(format!("{n:02}"))
    }

    pub fn is_wildcard(&self) -> bool {
        self.0.eq_ignore_ascii_case(WILDCARD)
    }

    /// Whether a poll with this target must be answered by `node`.
    pub fn addresses(&self, node: &NodeId) -> bool {
        self.is_wildcard() || self == node
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_id_char(c: char) -> bool {
    c.is_ascii_graphic() && c != ':'
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for NodeId {
    type Err = NodeIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for NodeId {
    type Error = NodeIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<NodeId> for String {
    fn from(id: NodeId) -> Self {
        id.0
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
