//! In-process simulated radio medium.
//!
//! Every station attached to a [`SimBus`] hears every transmission. With
//! echo enabled a station also hears its own transmissions, the way a
//! half-duplex radio module loops its output back onto RX. Writes can be
//! split into small chunks to reproduce UART fragmentation.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::Instant;

use crate::error::LinkError;
use crate::link::Link;

const BUS_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
struct Frame {
    from: usize,
    bytes: Arc<[u8]>,
}

/// Shared medium; attach one [`BusLink`] per station.
#[derive(Debug, Clone)]
pub struct SimBus {
    tx: broadcast::Sender<Frame>,
    next_station: Arc<AtomicUsize>,
    echo: bool,
    chunk_size: Option<usize>,
}

impl SimBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self {
            tx,
            next_station: Arc::new(AtomicUsize::new(0)),
            echo: false,
            chunk_size: None,
        }
    }

    /// Stations hear their own transmissions.
    #[must_use]
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// Deliver every write in chunks of at most `size` bytes.
    #[must_use]
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = Some(size.max(1));
        self
    }

    /// Attach a new station. It hears traffic sent from now on.
    pub fn attach(&self) -> BusLink {
        BusLink {
            station: self.next_station.fetch_add(1, Ordering::Relaxed),
            tx: self.tx.clone(),
            rx: self.tx.subscribe(),
            echo: self.echo,
            chunk_size: self.chunk_size,
        }
    }
}

impl Default for SimBus {
    fn default() -> Self {
        Self::new()
    }
}

/// One station's view of a [`SimBus`].
#[derive(Debug)]
pub struct BusLink {
    station: usize,
    tx: broadcast::Sender<Frame>,
    rx: broadcast::Receiver<Frame>,
    echo: bool,
    chunk_size: Option<usize>,
}

impl BusLink {
    pub fn station(&self) -> usize {
        self.station
    }
}

impl Link for BusLink {
    async fn read_chunk(&mut self, wait: Duration) -> Result<Vec<u8>, LinkError> {
        let deadline = Instant::now() + wait;
        loop {
            match tokio::time::timeout_at(deadline, self.rx.recv()).await {
                Err(_) => return Ok(Vec::new()),
                Ok(Ok(frame)) => {
                    if frame.from == self.station && !self.echo {
                        continue;
                    }
                    return Ok(frame.bytes.to_vec());
                }
                Ok(Err(RecvError::Lagged(skipped))) => {
                    tracing::warn!("station {} lagged, {skipped} frames lost", self.station);
                }
                Ok(Err(RecvError::Closed)) => return Err(LinkError::Closed),
            }
        }
    }

    async fn write_all(&mut self, data: &[u8]) -> Result<(), LinkError> {
        let size = self.chunk_size.unwrap_or(data.len().max(1));
        for chunk in data.chunks(size) {
            // No receivers is a quiet medium, not an error.
            let _ = self.tx.send(Frame {
                from: self.station,
                bytes: Arc::from(chunk),
            });
        }
        Ok(())
    }
}
