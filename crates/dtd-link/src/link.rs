//! Link trait: the byte-level half-duplex channel.

use std::future::Future;
use std::time::Duration;

use crate::error::LinkError;

/// A byte channel shared with other stations.
///
/// Implementations must be cancel-safe in `read_chunk`: dropping the future
/// must not lose bytes that were already taken off the wire.
pub trait Link: Send {
    /// Wait at most `wait` for incoming bytes. An empty vector means nothing
    /// arrived in time.
    fn read_chunk(
        &mut self,
        wait: Duration,
    ) -> impl Future<Output = Result<Vec<u8>, LinkError>> + Send;

    /// Transmit all of `data`.
    fn write_all(&mut self, data: &[u8]) -> impl Future<Output = Result<(), LinkError>> + Send;
}
