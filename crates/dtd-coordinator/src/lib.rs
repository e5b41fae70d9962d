//! dtd-coordinator: the polling side of the protocol.
//! Owns the link, polls each node with bounded retries, debounces the raw
//! answers into a stable per-node presence and reports every scan cycle.

pub mod aggregator;
pub mod orchestrator;
pub mod retry;
pub mod stats;
pub mod transport;

#[cfg(test)]
mod fake;

pub use aggregator::{Aggregator, ScanSummary, StateChange};
pub use orchestrator::{Orchestrator, ScanReport};
pub use retry::RetryPolicy;
pub use stats::{TransportStats, TransportStatsSnapshot};
pub use transport::{Exchange, Transport};
