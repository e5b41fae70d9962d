//! Link selection from flags and configuration.

use std::time::Duration;

use anyhow::Context;
use dtd_link::{BusLink, Link, LinkError, SerialLink, StreamLink};
use tokio::net::TcpStream;

use crate::cli::LinkOpts;
use crate::config::LinkConfig;

/// Every link kind the binary can run on.
pub enum AnyLink {
    Serial(SerialLink),
    Tcp(StreamLink<TcpStream>),
    Sim(BusLink),
}

impl Link for AnyLink {
    async fn read_chunk(&mut self, wait: Duration) -> Result<Vec<u8>, LinkError> {
        match self {
            AnyLink::Serial(link) => link.read_chunk(wait).await,
            AnyLink::Tcp(link) => link.read_chunk(wait).await,
            AnyLink::Sim(link) => link.read_chunk(wait).await,
        }
    }

    async fn write_all(&mut self, data: &[u8]) -> Result<(), LinkError> {
        match self {
            AnyLink::Serial(link) => link.write_all(data).await,
            AnyLink::Tcp(link) => link.write_all(data).await,
            AnyLink::Sim(link) => link.write_all(data).await,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkTarget {
    Serial { path: String, baud: u32 },
    Tcp(String),
}

/// Flags win over the file; a port wins over a bridge address from the
/// same source.
pub fn select(opts: &LinkOpts, config: &LinkConfig) -> anyhow::Result<LinkTarget> {
    let baud = opts.baud.unwrap_or(config.baud);
    if let Some(path) = &opts.port {
        return Ok(LinkTarget::Serial {
            path: path.clone(),
            baud,
        });
    }
    if let Some(addr) = &opts.connect {
        return Ok(LinkTarget::Tcp(addr.clone()));
    }
    if let Some(path) = &config.port {
        return Ok(LinkTarget::Serial {
            path: path.clone(),
            baud,
        });
    }
    if let Some(addr) = &config.connect {
        return Ok(LinkTarget::Tcp(addr.clone()));
    }
    anyhow::bail!("no link configured: pass --port or --connect, or set [link] in the config")
}

pub async fn open(opts: &LinkOpts, config: &LinkConfig) -> anyhow::Result<AnyLink> {
    match select(opts, config)? {
        LinkTarget::Serial { path, baud } => {
            let link = SerialLink::open(&path, baud).context("cannot open radio port")?;
            Ok(AnyLink::Serial(link))
        }
        LinkTarget::Tcp(addr) => {
            let link = StreamLink::connect(addr.as_str())
                .await
                .context("cannot reach serial bridge")?;
            Ok(AnyLink::Tcp(link))
        }
    }
}
