//! Scripted link for transport and orchestrator tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dtd_link::{Link, LinkError};

/// Records every write; answers writes that match a script entry by
/// queueing the scripted chunks as incoming data.
#[derive(Default)]
pub struct FakeLink {
    inbox: VecDeque<Vec<u8>>,
    script: Vec<(Vec<u8>, Vec<Vec<u8>>)>,
    writes: Arc<Mutex<Vec<Vec<u8>>>>,
    write_failures: usize,
    closed: bool,
}

impl FakeLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes already waiting before the first request.
    pub fn with_pending(mut self, bytes: &[u8]) -> Self {
        self.inbox.push_back(bytes.to_vec());
        self
    }

    /// When `request` is written, deliver `chunks` as incoming data.
    pub fn answering(mut self, request: &str, chunks: &[&str]) -> Self {
        self.script.push((
            request.as_bytes().to_vec(),
            chunks.iter().map(|c| c.as_bytes().to_vec()).collect(),
        ));
        self
    }

    /// The next `n` writes fail with a transient io error.
    pub fn failing_writes(mut self, n: usize) -> Self {
        self.write_failures = n;
        self
    }

    pub fn closed(mut self) -> Self {
        self.closed = true;
        self
    }

    /// Handle on the write log, usable after the link moved into a transport.
    pub fn writes(&self) -> Arc<Mutex<Vec<Vec<u8>>>> {
        Arc::clone(&self.writes)
    }
}

impl Link for FakeLink {
    async fn read_chunk(&mut self, wait: Duration) -> Result<Vec<u8>, LinkError> {
        if self.closed {
            return Err(LinkError::Closed);
        }
        match self.inbox.pop_front() {
            Some(chunk) => Ok(chunk),
            None => {
                tokio::time::sleep(wait).await;
                Ok(Vec::new())
            }
        }
    }

    async fn write_all(&mut self, data: &[u8]) -> Result<(), LinkError> {
        if self.closed {
            return Err(LinkError::Closed);
        }
        if self.write_failures > 0 {
            self.write_failures -= 1;
            return Err(LinkError::Io(std::io::Error::other("tx fifo full")));
        }
        self.writes.lock().expect("write log").push(data.to_vec());
        if let Some((_, chunks)) = self.script.iter().find(|(req, _)| req == data) {
            self.inbox.extend(chunks.iter().cloned());
        }
        Ok(())
    }
}
