//! Line-level reader/writer over a [`Link`].
//!
//! Partial lines survive across `next_line` timeouts: a frame split over
//! several reads is completed by a later call instead of being thrown away.

use std::time::Duration;

use dtd_core::framing::{LineBuffer, RawLine};
use dtd_core::message::Message;
use tokio::time::Instant;

use crate::error::LinkError;
use crate::link::Link;

/// Quiet time that ends a flush early: once the link delivers nothing for
/// this long, the stale input is considered drained.
pub const FLUSH_QUIET: Duration = Duration::from_millis(2);

pub struct FrameReader<L> {
    link: L,
    buffer: LineBuffer,
    read_granularity: Duration,
}

impl<L: Link> FrameReader<L> {
    /// `read_granularity` bounds each individual link read.
    pub fn new(link: L, read_granularity: Duration) -> Self {
        Self {
            link,
            buffer: LineBuffer::new(),
            read_granularity,
        }
    }

    /// Next complete line, or `None` when `timeout` elapses first. Buffered
    /// partial data is kept either way.
    pub async fn next_line(&mut self, timeout: Duration) -> Result<Option<RawLine>, LinkError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(line) = self.buffer.take_line() {
                return Ok(Some(line));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            let wait = (deadline - now).min(self.read_granularity);
            let chunk = self.link.read_chunk(wait).await?;
            self.buffer.feed(&chunk);
        }
    }

    /// Discard buffered bytes and whatever the link delivers within
    /// `window`, stopping at the first quiet gap. Returns the bytes dropped.
    pub async fn flush_input(&mut self, window: Duration) -> Result<usize, LinkError> {
        let mut flushed = self.buffer.clear();
        let deadline = Instant::now() + window;
        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let chunk = self.link.read_chunk((deadline - now).min(FLUSH_QUIET)).await?;
            if chunk.is_empty() {
                break;
            }
            flushed += chunk.len();
        }
        if flushed > 0 {
            tracing::debug!("flushed {flushed} bytes");
        }
        Ok(flushed)
    }

    /// Encode and transmit one message.
    pub async fn send(&mut self, message: &Message) -> Result<(), LinkError> {
        self.link.write_all(&message.encode()).await?;
        tracing::debug!("→ {message}");
        Ok(())
    }

    /// Bytes waiting in the line buffer.
    pub fn pending(&self) -> usize {
        self.buffer.pending()
    }

    /// Bytes dropped because a line grew past the buffer capacity.
    pub fn overflowed(&self) -> u64 {
        self.buffer.overflowed()
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn into_link(self) -> L {
        self.link
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Link that replays canned chunks, then stays silent.
    struct ScriptedLink {
        chunks: VecDeque<Vec<u8>>,
        written: Vec<u8>,
    }

    impl ScriptedLink {
        fn new(chunks: &[&[u8]]) -> Self {
            Self {
                chunks: chunks.iter().map(|c| c.to_vec()).collect(),
                written: Vec::new(),
            }
        }
    }

    impl Link for ScriptedLink {
        async fn read_chunk(&mut self, wait: Duration) -> Result<Vec<u8>, LinkError> {
            match self.chunks.pop_front() {
                Some(chunk) => Ok(chunk),
                None => {
                    tokio::time::sleep(wait).await;
                    Ok(Vec::new())
                }
            }
        }

        async fn write_all(&mut self, data: &[u8]) -> Result<(), LinkError> {
            self.written.extend_from_slice(data);
            Ok(())
        }
    }

    const GRANULARITY: Duration = Duration::from_millis(100);

    #[tokio::test(start_paused = true)]
    async fn reassembles_fragmented_line() {
        let link = ScriptedLink::new(&[b"AC", b"K:0", b"3:1", b"\n"]);
        let mut reader = FrameReader::new(link, GRANULARITY);
        let line = reader
            .next_line(Duration::from_millis(500))
            .await
            .expect("read")
            .expect("line");
        assert_eq!(line.as_bytes(), b"ACK:03:1\n");
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_keeps_partial_line() {
        let link = ScriptedLink::new(&[b"POLL:0"]);
        let mut reader = FrameReader::new(link, GRANULARITY);

        let first = reader
            .next_line(Duration::from_millis(300))
            .await
            .expect("read");
        assert!(first.is_none());
        assert_eq!(reader.pending(), 6);

        reader.link_mut().chunks.push_back(b"3\n".to_vec());
        let line = reader
            .next_line(Duration::from_millis(300))
            .await
            .expect("read")
            .expect("completed line");
        assert_eq!(line.parse().to_string(), "POLL:03");
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_bounded_by_deadline() {
        let mut reader = FrameReader::new(ScriptedLink::new(&[]), GRANULARITY);
        let start = Instant::now();
        let got = reader
            .next_line(Duration::from_millis(250))
            .await
            .expect("read");
        assert!(got.is_none());
        assert_eq!(start.elapsed(), Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn buffered_lines_return_without_reading() {
        let link = ScriptedLink::new(&[b"BOOT:01\nBOOT:02\n"]);
        let mut reader = FrameReader::new(link, GRANULARITY);
        let timeout = Duration::from_millis(100);
        let a = reader.next_line(timeout).await.expect("read").expect("a");
        let b = reader.next_line(timeout).await.expect("read").expect("b");
        assert_eq!(a.display(), "BOOT:01");
        assert_eq!(b.display(), "BOOT:02");
    }

    #[tokio::test(start_paused = true)]
    async fn flush_drops_buffer_and_pending_input() {
        let link = ScriptedLink::new(&[b"ACK:0"]);
        let mut reader = FrameReader::new(link, GRANULARITY);
        // Pull the first chunk into the line buffer.
        assert!(
            reader
                .next_line(Duration::from_millis(1))
                .await
                .expect("read")
                .is_none()
        );
        reader.link_mut().chunks.extend([b"1:1\nnoise".to_vec(), b"more".to_vec()]);
        let flushed = reader
            .flush_input(Duration::from_millis(50))
            .await
            .expect("flush");
        assert_eq!(flushed, 5 + 9 + 4);
        assert_eq!(reader.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn send_writes_encoded_frame() {
        let mut reader = FrameReader::new(ScriptedLink::new(&[]), GRANULARITY);
        let msg = Message::parse(b"POLL:07");
        reader.send(&msg).await.expect("send");
        assert_eq!(reader.link().written, b"POLL:07\n");
    }
}
