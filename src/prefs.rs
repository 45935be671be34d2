// ABOUTME: Persisted user preferences for the story-slides application
// ABOUTME: Provides a key-value store trait with JSON-file and in-memory backends

use crate::errors::{Result, StoryError};
use crate::utils;
use log::{debug, info};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Key under which the chosen language is remembered.
pub const PREFERRED_LANGUAGE_KEY: &str = "preferredLanguage";

/// A small string key-value store that survives restarts.
pub trait PreferenceStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;

    fn preferred_language(&self) -> Result<Option<String>> {
        self.get(PREFERRED_LANGUAGE_KEY)
    }

    fn set_preferred_language(&mut self, language: &str) -> Result<()> {
        self.set(PREFERRED_LANGUAGE_KEY, language)
    }
}

/// Preferences kept only for the lifetime of the process.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, key: &str, value: &str) -> Self {
        self.entries.insert(key.to_string(), value.to_string());
        self
    }
}

impl PreferenceStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Preferences stored as a flat JSON object on disk.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl JsonFileStore {
    /// Open the store, reading existing entries if the file is present.
    pub fn open(path: &Path) -> Result<Self> {
        let entries = if path.exists() {
            let content = fs::read_to_string(path).map_err(StoryError::FileReadError)?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&content).map_err(|e| {
                    StoryError::PreferenceError(format!("Corrupt preferences {:?}: {}", path, e))
                })?
            }
        } else {
            debug!("No preferences at {:?}, starting empty", path);
            BTreeMap::new()
        };

        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // Write to a sibling temp file and rename so a crash never leaves half a file.
    fn flush(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        utils::ensure_parent_directory_exists(&self.path)?;
        let content = serde_json::to_string_pretty(entries)?;
        let tmp = self
            .path
            .with_extension(format!("{}.tmp", uuid::Uuid::new_v4()));
        if let Err(e) = fs::write(&tmp, content).and_then(|()| fs::rename(&tmp, &self.path)) {
            let _ = fs::remove_file(&tmp);
            return Err(StoryError::FileReadError(e));
        }
        info!("Saved preferences to {:?}", self.path);
        Ok(())
    }
}

impl PreferenceStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    /// Memory only changes once the new entries are on disk.
    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.clone();
        entries.insert(key.to_string(), value.to_string());
        self.flush(&entries)?;
        self.entries = entries;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_memory_store_round_trip() {
        let mut store = MemoryStore::new();
        assert_eq!(store.preferred_language().unwrap(), None);
        store.set_preferred_language("hindi").unwrap();
        assert_eq!(store.preferred_language().unwrap().as_deref(), Some("hindi"));
    }

    #[test]
    fn test_json_store_persists_across_instances() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("nested").join("prefs.json");

        let mut store = JsonFileStore::open(&path).unwrap();
        store.set_preferred_language("hindi").unwrap();
        assert!(path.exists());

        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(
            reopened.get(PREFERRED_LANGUAGE_KEY).unwrap().as_deref(),
            Some("hindi")
        );

        // only the store file is left behind
        let files = fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(files, 1);
    }

    #[test]
    fn test_json_store_rejects_corrupt_file() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("prefs.json");
        fs::write(&path, "[1, 2").unwrap();
        assert!(matches!(
            JsonFileStore::open(&path),
            Err(StoryError::PreferenceError(_))
        ));
    }

    #[test]
    fn test_failed_save_leaves_store_unchanged() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("prefs.json");
        let mut store = JsonFileStore::open(&path).unwrap();

        // a directory in the way makes the final rename fail
        fs::create_dir_all(path.join("blocker")).unwrap();
        assert!(store.set_preferred_language("hindi").is_err());
        assert_eq!(store.preferred_language().unwrap(), None);

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty(), "{:?}", leftovers);
    }
}
