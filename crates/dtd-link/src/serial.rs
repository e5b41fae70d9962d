//! Serial (UART) link for the radio module.
//!
//! The `serialport` crate is blocking, so a dedicated reader thread pulls
//! bytes off the port and forwards them over a tokio channel; writes run on
//! the blocking pool.

use std::io::{Read, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use tokio::sync::mpsc;

use crate::error::LinkError;
use crate::link::Link;

/// Blocking read timeout of the reader thread. Bounds how long the thread
/// takes to notice the link was dropped.
const PORT_READ_TIMEOUT: Duration = Duration::from_millis(20);

const READ_BUF_LEN: usize = 512;

type Chunk = Result<Vec<u8>, std::io::Error>;

pub struct SerialLink {
    path: String,
    writer: Arc<Mutex<Box<dyn SerialPort>>>,
    rx: mpsc::UnboundedReceiver<Chunk>,
}

impl SerialLink {
    /// Open `path` at `baud_rate`, 8N1, no flow control.
    pub fn open(path: &str, baud_rate: u32) -> Result<Self, LinkError> {
        let port = serialport::new(path, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(PORT_READ_TIMEOUT)
            .open()
            .map_err(|e| LinkError::Open {
                target: path.to_string(),
                detail: e.to_string(),
            })?;
        let reader = port.try_clone()?;

        let (tx, rx) = mpsc::unbounded_channel();
        let thread_path = path.to_string();
        std::thread::Builder::new()
            .name(format!("dtd-serial-rx:{path}"))
            .spawn(move || reader_loop(reader, tx, &thread_path))?;

        tracing::info!("opened serial port {path} at {baud_rate} baud");

        Ok(Self {
            path: path.to_string(),
            writer: Arc::new(Mutex::new(port)),
            rx,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

fn reader_loop(mut port: Box<dyn SerialPort>, tx: mpsc::UnboundedSender<Chunk>, path: &str) {
    let mut buf = [0u8; READ_BUF_LEN];
    loop {
        if tx.is_closed() {
            break;
        }
        match port.read(&mut buf) {
            Ok(0) => {}
            Ok(n) => {
                if tx.send(Ok(buf[..n].to_vec())).is_err() {
                    break;
                }
            }
            Err(e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::TimedOut | std::io::ErrorKind::Interrupted
                ) => {}
            Err(e) => {
                tracing::warn!("serial read failed on {path}: {e}");
                let _ = tx.send(Err(e));
                break;
            }
        }
    }
    tracing::debug!("serial reader for {path} stopped");
}

impl Link for SerialLink {
    async fn read_chunk(&mut self, wait: Duration) -> Result<Vec<u8>, LinkError> {
        match tokio::time::timeout(wait, self.rx.recv()).await {
            Err(_) => Ok(Vec::new()),
            Ok(None) => Err(LinkError::Closed),
            Ok(Some(Ok(bytes))) => Ok(bytes),
            Ok(Some(Err(e))) => Err(LinkError::Io(e)),
        }
    }

    async fn write_all(&mut self, data: &[u8]) -> Result<(), LinkError> {
        let writer = Arc::clone(&self.writer);
        let data = data.to_vec();
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mut port = writer
                .lock()
                .map_err(|_| std::io::Error::other("serial writer lock poisoned"))?;
            port.write_all(&data)?;
            port.flush()
        })
        .await
        .map_err(std::io::Error::other)??;
        Ok(())
    }
}
