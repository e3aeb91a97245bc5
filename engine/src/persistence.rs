//! Session snapshots and the storage media they are written to.
//!
//! The engine only talks to a [`SessionStore`]; where the bytes end up is the
//! store's business. Two stores ship with the crate: [`MemoryStore`] for tests
//! and embedding, [`FileStore`] for the command-line binary.

use crate::config::SnapshotFormat;
use crate::error::{EngineError, EngineResult, StoreError};
use serde::{Deserialize, Serialize};
use shared::{PlayerSecret, Session};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const SNAPSHOT_VERSION: u32 = 1;

pub trait SessionStore: Send + Sync {
    fn put(&self, key: &str, blob: &[u8]) -> Result<(), StoreError>;
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
}

/// Everything needed to bring a session back after a reload, secrets included.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub version: u32,
    pub session: Session,
    pub secrets: HashMap<String, PlayerSecret>,
}

impl SessionSnapshot {
    pub fn new(session: Session, secrets: HashMap<String, PlayerSecret>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            session,
            secrets,
        }
    }

    fn validate(&self) -> Result<(), String> {
        if self.version != SNAPSHOT_VERSION {
            return Err(format!("unsupported snapshot version {}", self.version));
        }
        self.session.validate()?;
        match self.secrets.keys().find(|id| self.session.player(id).is_none()) {
            Some(stray) => Err(format!("secret held for unknown player {}", stray)),
            None => Ok(()),
        }
    }
}

pub fn encode(snapshot: &SessionSnapshot, format: SnapshotFormat) -> EngineResult<Vec<u8>> {
    let encoded = match format {
        SnapshotFormat::Json => serde_json::to_vec(snapshot).map_err(|e| e.to_string()),
        SnapshotFormat::Bincode => bincode::serialize(snapshot).map_err(|e| e.to_string()),
    };
    encoded.map_err(EngineError::MalformedSnapshot)
}

/// Parses and structurally checks a snapshot.
pub fn decode(blob: &[u8], format: SnapshotFormat) -> EngineResult<SessionSnapshot> {
    if blob.iter().all(u8::is_ascii_whitespace) {
        return Err(EngineError::MalformedSnapshot("empty snapshot".to_string()));
    }

    let snapshot: SessionSnapshot = match format {
        SnapshotFormat::Json => serde_json::from_slice(blob).map_err(|e| e.to_string()),
        SnapshotFormat::Bincode => bincode::deserialize(blob).map_err(|e| e.to_string()),
    }
    .map_err(EngineError::MalformedSnapshot)?;

    snapshot.validate().map_err(EngineError::MalformedSnapshot)?;
    Ok(snapshot)
}

/// Keeps blobs in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemoryStore {
    fn put(&self, key: &str, blob: &[u8]) -> Result<(), StoreError> {
        let mut blobs = self.blobs.lock().map_err(|_| StoreError::Poisoned)?;
        blobs.insert(key.to_string(), blob.to_vec());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let blobs = self.blobs.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(blobs.get(key).cloned())
    }
}

/// One file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.session", name))
    }
}

impl SessionStore for FileStore {
    fn put(&self, key: &str, blob: &[u8]) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        // Write then rename so a crash never leaves a half-written snapshot.
        let tmp = path.with_extension("session.tmp");
        fs::write(&tmp, blob)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match fs::read(self.path_for(key)) {
            Ok(blob) => Ok(Some(blob)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
