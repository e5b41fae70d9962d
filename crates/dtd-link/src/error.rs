//! Error types for the link layer.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("failed to open {target}: {detail}")]
    Open { target: String, detail: String },

    #[error("link closed by peer")]
    Closed,

    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("link io error: {0}")]
    Io(#[from] std::io::Error),
}

impl LinkError {
    /// Whether the link is gone for good (as opposed to one failed read or
    /// write on a link that may still work).
    pub fn is_fatal(&self) -> bool {
        matches!(self, LinkError::Closed | LinkError::Open { .. })
    }
}
