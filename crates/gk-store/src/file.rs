use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use gk_schemas::{GlobalState, PersistedState};
use tempfile::NamedTempFile;

use crate::{StateStore, StoreError};

/// Pretty-printed JSON file, replaced atomically on every save.
#[derive(Debug, Clone)]
pub struct JsonFileStateStore {
    path: PathBuf,
}

impl JsonFileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parent_dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }
}

impl StateStore for JsonFileStateStore {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn load(&self) -> Result<Option<PersistedState>, StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StoreError::Io(format!(
                    "read {} failed: {e}",
                    self.path.display()
                )))
            }
        };

        serde_json::from_slice::<PersistedState>(&bytes)
            .map(Some)
            .map_err(|e| StoreError::Malformed(format!("{}: {e}", self.path.display())))
    }

    fn save(&self, state: &GlobalState) -> Result<(), StoreError> {
        let mut snapshot = state.clone();
        snapshot.saved_at_utc = Some(Utc::now());
        let json = serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| StoreError::Encode(e.to_string()))?;

        let dir = self.parent_dir();
        fs::create_dir_all(&dir)
            .map_err(|e| StoreError::Io(format!("create dir {} failed: {e}", dir.display())))?;

        let mut tmp = NamedTempFile::new_in(&dir)
            .map_err(|e| StoreError::Io(format!("temp file in {} failed: {e}", dir.display())))?;
        tmp.write_all(&json)
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| StoreError::Io(format!("write temp state failed: {e}")))?;
        tmp.persist(&self.path).map_err(|e| {
            StoreError::Io(format!("replace {} failed: {}", self.path.display(), e.error))
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gk_schemas::UserId;

    #[test]
    fn save_then_load_keeps_progress_and_stamps_time() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStateStore::new(dir.path().join("state.json"));

        let mut st = GlobalState::fresh(2);
        st.active_index = 1;
        st.channels[0].pending.insert(UserId(5));
        store.save(&st).unwrap();

        let loaded = store.load().unwrap().expect("state was saved");
        assert_eq!(loaded.active_index, Some(1));
        assert!(loaded.saved_at_utc.is_some());
        let (repaired, report) = loaded.repair(2);
        assert!(report.is_clean(), "{report:?}");
        assert!(repaired.channels[0].pending.contains(&UserId(5)));
    }

    #[test]
    fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStateStore::new(dir.path().join("absent.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn save_creates_missing_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStateStore::new(dir.path().join("nested/deeper/state.json"));
        store.save(&GlobalState::fresh(1)).unwrap();
        assert!(store.path().exists());
    }
}
