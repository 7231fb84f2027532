use std::fs;
use std::path::PathBuf;

use engine_logging::engine_debug;
use harvester_core::SessionSnapshot;
use harvester_engine::{AtomicFileWriter, SnapshotStore, SnapshotStoreError};

const STATE_FILENAME: &str = ".harvester_state.ron";

/// Session snapshot kept as pretty RON next to the exported CSV files.
#[derive(Debug, Clone)]
pub struct RonSnapshotStore {
    writer: AtomicFileWriter,
}

impl RonSnapshotStore {
    pub fn new(output_dir: PathBuf) -> Self {
        Self {
            writer: AtomicFileWriter::new(output_dir),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.writer.dir().join(STATE_FILENAME)
    }
}

impl SnapshotStore for RonSnapshotStore {
    fn load(&self) -> Result<Option<SessionSnapshot>, SnapshotStoreError> {
        let path = self.path();
        let content = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let snapshot = ron::from_str(&content)
            .map_err(|err| SnapshotStoreError::Decode(format!("{}: {err}", path.display())))?;
        engine_debug!("Loaded session snapshot from {:?}", path);
        Ok(Some(snapshot))
    }

    fn save(&self, snapshot: &SessionSnapshot) -> Result<(), SnapshotStoreError> {
        let pretty = ron::ser::PrettyConfig::new();
        let content = ron::ser::to_string_pretty(snapshot, pretty)
            .map_err(|err| SnapshotStoreError::Encode(err.to_string()))?;
        self.writer.write(STATE_FILENAME, content.as_bytes())?;
        Ok(())
    }
}
