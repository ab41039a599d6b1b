pub mod channels;
pub mod filters;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Result of a store mutation, worded for the user who asked for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub ok: bool,
    pub message: String,
}

impl Outcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
        }
    }
}

/// A JSON document rewritten wholesale on every save.
///
/// Saves go through a sibling temp file and a rename, so a crash mid-write
/// leaves the previous document intact. Two processes sharing one file still
/// race: the last writer wins.
#[derive(Debug)]
pub struct JsonFile {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Held by every store operation that touches the file, including reads
    /// that may create it.
    pub fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns `Ok(None)` when the file does not exist yet.
    pub fn read<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let value = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", self.path.display()))?;
        Ok(Some(value))
    }

    pub fn write<T: Serialize>(&self, value: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(value).context("Failed to serialize store")?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        std::fs::write(&tmp_path, json)
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, &self.path).with_context(|| {
            format!(
                "Failed to move {} into place at {}",
                tmp_path.display(),
                self.path.display()
            )
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        let file = JsonFile::new(dir.path().join("missing.json"));
        let value: Option<Vec<String>> = file.read().unwrap();
        assert!(value.is_none());
    }

    #[test]
    fn test_write_is_pretty_printed_with_two_spaces() {
        let dir = TempDir::new().unwrap();
        let file = JsonFile::new(dir.path().join("list.json"));
        file.write(&vec!["@a".to_string(), "123".to_string()]).unwrap();

        let raw = std::fs::read_to_string(file.path()).unwrap();
        assert_eq!(raw, "[\n  \"@a\",\n  \"123\"\n]");
        assert!(!dir.path().join("list.json.tmp").exists());
    }

    #[test]
    fn test_write_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let file = JsonFile::new(dir.path().join("nested/deeper/list.json"));
        file.write(&Vec::<String>::new()).unwrap();
        let back: Option<Vec<String>> = file.read().unwrap();
        assert_eq!(back, Some(vec![]));
    }

    #[test]
    fn test_read_malformed_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        let file = JsonFile::new(path);
        assert!(file.read::<Vec<String>>().is_err());
    }
}
