//! JSON file storage for scan history.

use crate::error::StorageError;
use crate::history::HistoryStorage;
use crate::types::ScanResult;
use std::fs;
use std::path::{Path, PathBuf};

/// History stored as a JSON array in a single file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the platform default location.
    pub fn default_location() -> Result<Self, crate::config::ConfigError> {
        crate::config::get_history_path().map(Self::new)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HistoryStorage for JsonFileStore {
    fn load(&self) -> Result<Option<Vec<ScanResult>>, StorageError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)?;
        match serde_json::from_str(&content) {
            Ok(entries) => Ok(Some(entries)),
            Err(e) => {
                if let Err(backup_err) = backup_corrupted(&self.path) {
                    tracing::warn!("Could not back up corrupt history: {}", backup_err);
                }
                Err(e.into())
            }
        }
    }

    fn save(&self, history: &[ScanResult]) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write then rename so a crash never leaves a half-written file.
        let tmp = self.path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(history)?;
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &self.path)?;
        tracing::debug!("Flushed {} history entries to {:?}", history.len(), self.path);
        Ok(())
    }
}

/// Copy a corrupt file aside for debugging.
fn backup_corrupted(path: &Path) -> Result<PathBuf, StorageError> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("history");
    let backup_path = path.with_file_name(format!(
        "{}.corrupt.{}",
        stem,
        chrono::Utc::now().format("%Y%m%d_%H%M%S")
    ));
    fs::copy(path, &backup_path)?;
    tracing::info!("Backed up corrupt history to {:?}", backup_path);
    Ok(backup_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::HistoryStore;
    use crate::types::PayloadKind;
    use chrono::Utc;

    #[test]
    fn test_missing_file_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("history.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested").join("history.json"));
        let entries = vec![
            ScanResult::new("https://a.io", PayloadKind::Url, Utc::now()),
            ScanResult::new("hello", PayloadKind::Text, Utc::now()),
        ];
        store.save(&entries).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].content, "https://a.io");
        assert_eq!(loaded[1].kind, PayloadKind::Text);
    }

    #[test]
    fn test_reads_web_app_export() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        fs::write(
            &path,
            r#"[{"id":"k3j9x0a1b","content":"+5511999990000","timestamp":1717171717171,"type":"phone"}]"#,
        )
        .unwrap();

        let loaded = JsonFileStore::new(&path).load().unwrap().unwrap();
        assert_eq!(loaded[0].id, "k3j9x0a1b");
        assert_eq!(loaded[0].kind, PayloadKind::Phone);
    }

    #[test]
    fn test_corrupt_file_is_backed_up_and_degrades() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        fs::write(&path, "{not json").unwrap();

        let store = JsonFileStore::new(&path);
        assert!(matches!(store.load(), Err(StorageError::Corrupt(_))));

        let backups: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".corrupt."))
            .collect();
        assert_eq!(backups.len(), 1);

        // The store itself starts empty and the next flush overwrites the file.
        let mut history = HistoryStore::load(store.clone());
        assert!(history.is_empty());
        history.record(ScanResult::new("ok", PayloadKind::Text, Utc::now()));
        assert_eq!(store.load().unwrap().unwrap().len(), 1);
    }
}
