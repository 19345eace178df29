use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("atomic rename failed: {0}")]
    Persist(#[from] tempfile::PersistError),
}

/// In-memory record of which (era, query) pairs are already satisfied.
///
/// Serialized as a JSON object mapping era folder name to the list of
/// completed query strings. Deleting the file, or a single key inside it,
/// forces that scope to be re-processed on the next run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Checkpoint {
    completed: BTreeMap<String, Vec<String>>,
}

impl Checkpoint {
    pub fn is_done(&self, era_key: &str, query: &str) -> bool {
        self.completed
            .get(era_key)
            .map(|queries| queries.iter().any(|done| done == query))
            .unwrap_or(false)
    }

    /// Idempotent insert. Returns true when the entry was newly added.
    pub fn insert(&mut self, era_key: &str, query: &str) -> bool {
        let queries = self.completed.entry(era_key.to_string()).or_default();
        if queries.iter().any(|done| done == query) {
            return false;
        }
        queries.push(query.to_string());
        true
    }

    pub fn completed_for(&self, era_key: &str) -> usize {
        self.completed.get(era_key).map(Vec::len).unwrap_or(0)
    }

    pub fn completed_total(&self) -> usize {
        self.completed.values().map(Vec::len).sum()
    }
}

/// Durable store for the checkpoint file.
///
/// Saves go through a temp file in the same directory followed by an atomic
/// rename, so a process kill mid-write never leaves a truncated checkpoint
/// visible to the next run.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads durable state. An absent, unreadable, or structurally invalid
    /// file is treated as "start fresh" and logged as a warning.
    pub fn load(&self) -> Checkpoint {
        if !self.path.exists() {
            return Checkpoint::default();
        }
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "checkpoint unreadable, starting fresh");
                return Checkpoint::default();
            }
        };
        match serde_json::from_str(&content) {
            Ok(checkpoint) => checkpoint,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "checkpoint corrupt, starting fresh");
                Checkpoint::default()
            }
        }
    }

    pub fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&parent)?;
        let json = serde_json::to_string_pretty(checkpoint)?;
        tmp.write_all(json.as_bytes())?;
        tmp.flush()?;
        tmp.persist(&self.path)?;
        Ok(())
    }

    /// Records the query as complete and flushes to disk immediately. A write
    /// failure degrades persistence but never the run: the in-memory state
    /// still advances.
    pub fn mark_done(&self, checkpoint: &mut Checkpoint, era_key: &str, query: &str) {
        checkpoint.insert(era_key, query);
        if let Err(err) = self.save(checkpoint) {
            error!(path = %self.path.display(), error = %err, "could not save checkpoint");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn mark_done_is_idempotent_and_immediately_durable() {
        let dir = tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("completed_queries.json"));
        let mut checkpoint = store.load();

        store.mark_done(&mut checkpoint, "01_one", "red skirt painting");
        assert!(checkpoint.is_done("01_one", "red skirt painting"));
        store.mark_done(&mut checkpoint, "01_one", "red skirt painting");
        assert_eq!(checkpoint.completed_for("01_one"), 1);

        let reloaded = store.load();
        assert!(reloaded.is_done("01_one", "red skirt painting"));
        assert_eq!(reloaded.completed_total(), 1);
    }

    #[test]
    fn corrupt_file_loads_as_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("completed_queries.json");
        std::fs::write(&path, "{ not json").unwrap();
        let store = CheckpointStore::new(&path);
        assert_eq!(store.load().completed_total(), 0);

        std::fs::write(&path, r#"["wrong shape"]"#).unwrap();
        assert_eq!(store.load().completed_total(), 0);
    }

    #[test]
    fn interrupted_save_leaves_previous_file_intact() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("completed_queries.json");
        let store = CheckpointStore::new(&path);

        let mut checkpoint = Checkpoint::default();
        checkpoint.insert("01_one", "query a");
        store.save(&checkpoint).unwrap();

        // A crash between temp-write and rename leaves only a stray temp
        // file behind. The canonical checkpoint must still parse.
        std::fs::write(dir.path().join(".tmpXYZ"), "{ truncat").unwrap();
        let reloaded = store.load();
        assert!(reloaded.is_done("01_one", "query a"));
    }
}
