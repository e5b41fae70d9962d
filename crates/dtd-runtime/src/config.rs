//! Application configuration file.
//!
//! ```toml
//! [protocol]
//! nodes = ["01", "02", "03"]
//!
//! [protocol.timing]
//! reply_timeout_ms = 400
//!
//! [link]
//! port = "/dev/ttyUSB0"
//! baud = 9600
//!
//! [node]
//! id_file = "/var/lib/dtd/node_id"
//! presence_file = "/sys/class/gpio/gpio17/value"
//! ```
//!
//! Every section and key is optional; command-line flags override the file.

use std::path::{Path, PathBuf};

use anyhow::Context;
use dtd_core::config::ProtocolConfig;
use dtd_core::node_id::NodeId;
use serde::{Deserialize, Serialize};

/// Baud rate of the radio modules out of the box.
pub const DEFAULT_BAUD: u32 = 9600;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub protocol: ProtocolConfig,
    pub link: LinkConfig,
    pub node: NodeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LinkConfig {
    pub port: Option<String>,
    pub baud: u32,
    pub connect: Option<String>,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud: DEFAULT_BAUD,
            connect: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NodeConfig {
    pub id: Option<NodeId>,
    pub id_file: Option<PathBuf>,
    pub strap: Option<u8>,
    pub presence_file: Option<PathBuf>,
    pub active_low: bool,
    pub present: Option<bool>,
}

impl AppConfig {
    /// Load `path`, or the defaults when no file is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Self = toml::from_str(&raw)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        tracing::debug!("loaded config from {}", path.display());
        Ok(config)
    }

    pub fn to_toml(&self) -> anyhow::Result<String> {
        toml::to_string_pretty(self).context("failed to render config")
    }
}
