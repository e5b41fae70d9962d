//! dtd-core: wire vocabulary and pure state machines for the DTD presence
//! protocol. Node identities, line framing, message codec, debounce and
//! configuration validation. No IO, no async.

pub mod config;
pub mod debounce;
pub mod framing;
pub mod message;
pub mod node_id;
pub mod types;

pub use config::{ConfigError, ProtocolConfig};
pub use debounce::{DebounceOutput, DebouncedState};
pub use framing::{LineBuffer, RawLine};
pub use message::{Message, UnrecognizedReason};
pub use node_id::{NodeId, NodeIdError};
pub use types::{NodeObservation, Presence};
