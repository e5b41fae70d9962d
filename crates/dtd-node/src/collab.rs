//! Hardware-facing collaborators of a node: presence sensor, persistent id
//! storage and address straps. Traits keep the responder testable without a
//! board; the file-backed implementations cover sysfs GPIO and a plain id
//! file on Linux targets.

use std::io;
use std::path::{Path, PathBuf};

use dtd_core::node_id::{NodeId, NodeIdError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("id store io error: {0}")]
    Io(#[from] io::Error),

    #[error("stored id in {path} is invalid: {source}")]
    InvalidId {
        path: PathBuf,
        #[source]
        source: NodeIdError,
    },

    #[error("id store unavailable: {0}")]
    Unavailable(String),
}

/// Reads the node's presence input.
pub trait PresenceSensor: Send + Sync {
    fn is_present(&self) -> bool;
}

impl<T: PresenceSensor + ?Sized> PresenceSensor for &T {
    fn is_present(&self) -> bool {
        (**self).is_present()
    }
}

impl<T: PresenceSensor + ?Sized> PresenceSensor for Box<T> {
    fn is_present(&self) -> bool {
        (**self).is_present()
    }
}

/// Persistent storage for an assigned id.
pub trait IdStore: Send {
    /// `Ok(None)` when nothing was ever stored.
    fn load_id(&self) -> Result<Option<NodeId>, StoreError>;

    fn save_id(&mut self, id: &NodeId) -> Result<(), StoreError>;
}

impl<T: IdStore + ?Sized> IdStore for Box<T> {
    fn load_id(&self) -> Result<Option<NodeId>, StoreError> {
        (**self).load_id()
    }

    fn save_id(&mut self, id: &NodeId) -> Result<(), StoreError> {
        (**self).save_id(id)
    }
}

/// Reads the hardware address straps, if the board has any.
pub trait StrapReader {
    fn read_strap(&self) -> Option<u8>;
}

/// Sensor with a constant answer.
#[derive(Debug, Clone, Copy)]
pub struct FixedSensor(pub bool);

impl PresenceSensor for FixedSensor {
    fn is_present(&self) -> bool {
        self.0
    }
}

/// Sensor backed by a value file holding `0` or `1` (sysfs GPIO `value`).
///
/// A read failure or an unexpected value reports absence.
#[derive(Debug, Clone)]
pub struct FileSensor {
    path: PathBuf,
    active_low: bool,
}

impl FileSensor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            active_low: false,
        }
    }

    /// Treat `0` as present (pull-up input wired to a closing contact).
    #[must_use]
    pub fn with_active_low(mut self, active_low: bool) -> Self {
        self.active_low = active_low;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PresenceSensor for FileSensor {
    fn is_present(&self) -> bool {
        let level = match std::fs::read_to_string(&self.path) {
            Ok(raw) => match raw.trim() {
                "1" => true,
                "0" => false,
                other => {
                    tracing::warn!(
                        "unexpected value {other:?} in {}, reporting absent",
                        self.path.display()
                    );
                    return false;
                }
            },
            Err(e) => {
                tracing::warn!("presence read failed on {}: {e}", self.path.display());
                return false;
            }
        };
        level != self.active_low
    }
}

/// Id persisted in a single text file.
///
/// Writes go to a sibling temp file that is then renamed over the target,
/// so a power cut never leaves a truncated id behind.
#[derive(Debug, Clone)]
pub struct FileIdStore {
    path: PathBuf,
}

impl FileIdStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl IdStore for FileIdStore {
    fn load_id(&self) -> Result<Option<NodeId>, StoreError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        NodeId::parse(raw)
            .map(Some)
            .map_err(|source| StoreError::InvalidId {
                path: self.path.clone(),
                source,
            })
    }

    fn save_id(&mut self, id: &NodeId) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.temp_path();
        std::fs::write(&tmp, format!("{id}\n"))?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Volatile store, for nodes without persistent storage and for tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryIdStore {
    id: Option<NodeId>,
    fail_saves: bool,
}

impl MemoryIdStore {
    pub fn new(id: Option<NodeId>) -> Self {
        Self {
            id,
            fail_saves: false,
        }
    }

    /// Every `save_id` fails (simulates worn-out flash).
    #[must_use]
    pub fn failing(mut self) -> Self {
        self.fail_saves = true;
        self
    }

    pub fn stored(&self) -> Option<&NodeId> {
        self.id.as_ref()
    }
}

impl IdStore for MemoryIdStore {
    fn load_id(&self) -> Result<Option<NodeId>, StoreError> {
        Ok(self.id.clone())
    }

    fn save_id(&mut self, id: &NodeId) -> Result<(), StoreError> {
        if self.fail_saves {
            return Err(StoreError::Unavailable("write rejected".into()));
        }
        self.id = Some(id.clone());
        Ok(())
    }
}

/// Strap reading fixed at construction (`None`: board without straps).
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedStraps(pub Option<u8>);

impl StrapReader for FixedStraps {
    fn read_strap(&self) -> Option<u8> {
        self.0
    }
}
