//! Protocol configuration and consistency checks.
//!
//! Every component receives its settings from a [`ProtocolConfig`] passed to
//! its constructor. [`ProtocolConfig::validate`] must pass before any
//! component is built; a failing check is fatal at boot.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::debounce::DEFAULT_CONFIRMATION_THRESHOLD;
use crate::node_id::NodeId;

/// Maximum number of polled nodes.
pub const MAX_NODES: usize = 10;

/// The reply timeout must be at least this multiple of the read granularity.
pub const READ_GRANULARITY_MARGIN: u64 = 3;

/// Upper bound on retries per request.
pub const MAX_RETRIES_LIMIT: u32 = 10;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error(
        "reply timeout ({reply_timeout_ms}ms) must be at least {READ_GRANULARITY_MARGIN}x the read granularity ({read_granularity_ms}ms)"
    )]
    ReplyTimeoutTooShort {
        reply_timeout_ms: u64,
        read_granularity_ms: u64,
    },

    #[error("reply timeout ({reply_timeout_ms}ms) must be shorter than the poll period ({poll_period_ms}ms)")]
    ReplyTimeoutExceedsPollPeriod {
        reply_timeout_ms: u64,
        poll_period_ms: u64,
    },

    #[error("read granularity must be at least 1ms")]
    ZeroReadGranularity,

    #[error("node list is empty")]
    NoNodes,

    #[error("too many nodes ({0}, max {MAX_NODES})")]
    TooManyNodes(usize),

    #[error("node {0} is listed more than once")]
    DuplicateNode(NodeId),

    #[error("the wildcard id cannot be polled as a node")]
    WildcardNode,

    #[error("confirmation threshold must be at least 1")]
    ZeroThreshold,

    #[error("backoff multiplier must be a finite number >= 1.0 (got {0})")]
    InvalidBackoffMultiplier(f64),

    #[error("max retries {0} exceeds the limit of {MAX_RETRIES_LIMIT}")]
    TooManyRetries(u32),

    #[error("configuration parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Channel timing, all in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimingConfig {
    /// Longest single blocking read on the link.
    pub read_granularity_ms: u64,
    /// Per-attempt wait for a matching reply.
    pub reply_timeout_ms: u64,
    /// Minimum period between scan cycle starts.
    pub poll_period_ms: u64,
    /// Guard delay between two consecutive polls.
    pub inter_poll_delay_ms: u64,
    /// Maximum time spent draining stale input before a transmit.
    pub flush_window_ms: u64,
    /// Node start-up delay before the initial flush and BOOT announce.
    pub boot_grace_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            read_granularity_ms: 100,
            reply_timeout_ms: 500,
            poll_period_ms: 800,
            inter_poll_delay_ms: 150,
            flush_window_ms: 50,
            boot_grace_ms: 200,
        }
    }
}

impl TimingConfig {
    pub fn read_granularity(&self) -> Duration {
        Duration::from_millis(self.read_granularity_ms)
    }

    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }

    pub fn poll_period(&self) -> Duration {
        Duration::from_millis(self.poll_period_ms)
    }

    pub fn inter_poll_delay(&self) -> Duration {
        Duration::from_millis(self.inter_poll_delay_ms)
    }

    pub fn flush_window(&self) -> Duration {
        Duration::from_millis(self.flush_window_ms)
    }

    pub fn boot_grace(&self) -> Duration {
        Duration::from_millis(self.boot_grace_ms)
    }
}

/// Retry and backoff for coordinator requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    /// Additional attempts after the first one.
    pub max_retries: u32,
    /// Backoff after the first timed-out attempt.
    pub backoff_base_ms: u64,
    /// Growth factor per attempt.
    pub backoff_multiplier: f64,
    /// Cap on a single backoff sleep.
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base_ms: 100,
            backoff_multiplier: 1.5,
            max_backoff_ms: 2_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DebounceConfig {
    pub confirmation_threshold: u32,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            confirmation_threshold: DEFAULT_CONFIRMATION_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProtocolConfig {
    /// Polled node ids, in scan order.
    pub nodes: Vec<NodeId>,
    pub timing: TimingConfig,
    pub retry: RetryConfig,
    pub debounce: DebounceConfig,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            nodes: (1..=5).map(NodeId::numbered).collect(),
            timing: TimingConfig::default(),
            retry: RetryConfig::default(),
            debounce: DebounceConfig::default(),
        }
    }
}

impl ProtocolConfig {
    /// Parse a TOML document and validate it.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// First consistency problem, if any.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.problems().into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Every consistency problem, in check order.
    pub fn problems(&self) -> Vec<ConfigError> {
        let mut problems = self.timing_problems();

        if self.nodes.is_empty() {
            problems.push(ConfigError::NoNodes);
        }
        if self.nodes.len() > MAX_NODES {
            problems.push(ConfigError::TooManyNodes(self.nodes.len()));
        }
        if self.nodes.iter().any(NodeId::is_wildcard) {
            problems.push(ConfigError::WildcardNode);
        }
        let mut seen = HashSet::new();
        for id in &self.nodes {
            if !seen.insert(id) {
                problems.push(ConfigError::DuplicateNode(id.clone()));
            }
        }

        if self.debounce.confirmation_threshold == 0 {
            problems.push(ConfigError::ZeroThreshold);
        }

        let multiplier = self.retry.backoff_multiplier;
        if !multiplier.is_finite() || multiplier < 1.0 {
            problems.push(ConfigError::InvalidBackoffMultiplier(multiplier));
        }
        if self.retry.max_retries > MAX_RETRIES_LIMIT {
            problems.push(ConfigError::TooManyRetries(self.retry.max_retries));
        }

        problems
    }

    /// Timing checks alone; nodes only run these (they have no node list).
    pub fn timing_problems(&self) -> Vec<ConfigError> {
        let t = &self.timing;
        let mut problems = Vec::new();

        if t.read_granularity_ms == 0 {
            problems.push(ConfigError::ZeroReadGranularity);
        }
        if t.reply_timeout_ms < t.read_granularity_ms.saturating_mul(READ_GRANULARITY_MARGIN) {
            problems.push(ConfigError::ReplyTimeoutTooShort {
                reply_timeout_ms: t.reply_timeout_ms,
                read_granularity_ms: t.read_granularity_ms,
            });
        }
        if t.reply_timeout_ms >= t.poll_period_ms {
            problems.push(ConfigError::ReplyTimeoutExceedsPollPeriod {
                reply_timeout_ms: t.reply_timeout_ms,
                poll_period_ms: t.poll_period_ms,
            });
        }

        problems
    }
}
