//! dtd-link: channel IO boundary.
//! Serial ports, byte streams and an in-process simulated radio bus behind
//! one [`Link`] trait, plus the [`FrameReader`] turning link reads into
//! protocol lines. No protocol policy lives here.

pub mod bus;
pub mod error;
pub mod link;
pub mod reader;
pub mod serial;
pub mod stream;

pub use bus::{BusLink, SimBus};
pub use error::LinkError;
pub use link::Link;
pub use reader::FrameReader;
pub use serial::SerialLink;
pub use stream::StreamLink;
