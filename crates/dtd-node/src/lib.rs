//! dtd-node: the remote detector side of the protocol.
//! Answers polls addressed to it, accepts id reassignment, ignores every
//! other station's traffic.

pub mod collab;
pub mod identity;
pub mod responder;
pub mod runner;

pub use collab::{
    FileIdStore, FileSensor, FixedSensor, FixedStraps, IdStore, MemoryIdStore, PresenceSensor,
    StoreError, StrapReader,
};
pub use identity::{IdSource, resolve_identity};
pub use responder::{Responder, ResponderStats};
pub use runner::{NodeRunner, NodeSettings};
