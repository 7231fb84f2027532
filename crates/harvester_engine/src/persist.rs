use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use harvester_core::SessionSnapshot;
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("output directory missing or not writable: {0}")]
    OutputDir(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum SnapshotStoreError {
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("encode error: {0}")]
    Encode(String),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Durable home of the orchestrator's session snapshot.
pub trait SnapshotStore: Send + Sync {
    fn load(&self) -> Result<Option<SessionSnapshot>, SnapshotStoreError>;
    fn save(&self, snapshot: &SessionSnapshot) -> Result<(), SnapshotStoreError>;
}

/// Keeps nothing.
#[derive(Debug, Default)]
pub struct NullSnapshotStore;

impl SnapshotStore for NullSnapshotStore {
    fn load(&self) -> Result<Option<SessionSnapshot>, SnapshotStoreError> {
        Ok(None)
    }

    fn save(&self, _snapshot: &SessionSnapshot) -> Result<(), SnapshotStoreError> {
        Ok(())
    }
}

/// Ensure output directory exists; create if missing.
pub fn ensure_output_dir(dir: &Path) -> Result<(), PersistError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(PersistError::OutputDir("path is not a directory".into()));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
    }
    Ok(())
}

/// Writes files in `dir` through a temp file and rename, so readers see
/// either the old or the new content.
#[derive(Debug, Clone)]
pub struct AtomicFileWriter {
    dir: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn write(&self, filename: &str, content: &[u8]) -> Result<PathBuf, PersistError> {
        ensure_output_dir(&self.dir)?;

        let target = self.dir.join(filename);
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(content)?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;
        tmp.persist(&target).map_err(|e| PersistError::Io(e.error))?;
        Ok(target)
    }
}
