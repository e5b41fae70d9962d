//! Link over any tokio byte stream.
//!
//! Used for serial-over-TCP bridges (a radio module behind `ser2net` or a
//! similar gateway) and for in-memory duplex pipes in tests.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};

use crate::error::LinkError;
use crate::link::Link;

const READ_BUF_LEN: usize = 512;

pub struct StreamLink<S> {
    stream: S,
    buf: Box<[u8]>,
}

impl<S> StreamLink<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            buf: vec![0u8; READ_BUF_LEN].into_boxed_slice(),
        }
    }

    pub fn into_inner(self) -> S {
        self.stream
    }
}

impl StreamLink<TcpStream> {
    /// Connect to a TCP serial bridge.
    pub async fn connect<A>(addr: A) -> Result<Self, LinkError>
    where
        A: ToSocketAddrs + std::fmt::Display,
    {
        let target = addr.to_string();
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| LinkError::Open {
                target: target.clone(),
                detail: e.to_string(),
            })?;
        stream.set_nodelay(true)?;
        tracing::info!("connected to serial bridge at {target}");
        Ok(Self::new(stream))
    }
}

impl<S> Link for StreamLink<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn read_chunk(&mut self, wait: Duration) -> Result<Vec<u8>, LinkError> {
        match tokio::time::timeout(wait, self.stream.read(&mut self.buf)).await {
            Err(_) => Ok(Vec::new()),
            Ok(Ok(0)) => Err(LinkError::Closed),
            Ok(Ok(n)) => Ok(self.buf[..n].to_vec()),
            Ok(Err(e)) => Err(LinkError::Io(e)),
        }
    }

    async fn write_all(&mut self, data: &[u8]) -> Result<(), LinkError> {
        self.stream.write_all(data).await?;
        self.stream.flush().await?;
        Ok(())
    }
}
