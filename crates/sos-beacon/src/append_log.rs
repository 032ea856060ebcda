//! JSON array log files.
//!
//! Each log is a single pretty-printed JSON array. An append reads the whole
//! array, pushes the entry, evicts from the front past the capacity and writes
//! the result through a temporary file and a rename. Appends to one
//! [`AppendLog`] are serialized by an async mutex; nothing coordinates writers
//! in other processes.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{Error, Result};

/// An append-only JSON array on disk, optionally bounded.
#[derive(Debug)]
pub struct AppendLog {
    path: PathBuf,
    capacity: Option<usize>,
    write_lock: Mutex<()>,
}

impl AppendLog {
    /// An unbounded log at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            capacity: None,
            write_lock: Mutex::new(()),
        }
    }

    /// A log at `path` that keeps at most `capacity` entries, oldest evicted
    /// first.
    #[must_use]
    pub fn bounded(path: impl Into<PathBuf>, capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::new(path)
        }
    }

    /// Path of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Retention limit, if any.
    #[must_use]
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Check whether the file has been created.
    pub async fn exists(&self) -> bool {
        tokio::fs::try_exists(&self.path).await.unwrap_or(false)
    }

    /// All entries, oldest first. A missing file reads as empty.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LogCorrupt`] if the file is not a JSON array, or an
    /// I/O error if it cannot be read.
    pub async fn entries(&self) -> Result<Vec<Value>> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        serde_json::from_slice(&raw).map_err(|source| Error::LogCorrupt {
            path: self.path.clone(),
            source,
        })
    }

    /// The raw file contents, or `None` if nothing has been logged.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file exists but cannot be read.
    pub async fn read_raw(&self) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(&self.path).await {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Append one entry and return the number of entries now held.
    ///
    /// # Errors
    ///
    /// Returns an error if the existing file is corrupt, the entry cannot be
    /// serialized, or the file cannot be written. A corrupt file is left as
    /// it was.
    pub async fn append<T: Serialize + ?Sized>(&self, entry: &T) -> Result<usize> {
        let entry = serde_json::to_value(entry)?;

        let _guard = self.write_lock.lock().await;
        let mut entries = self.entries().await?;
        entries.push(entry);

        if let Some(capacity) = self.capacity {
            if entries.len() > capacity {
                let excess = entries.len() - capacity;
                entries.drain(..excess);
                debug!(path = %self.path.display(), excess, "Evicted oldest log entries");
            }
        }

        self.write(&entries).await?;
        Ok(entries.len())
    }

    async fn write(&self, entries: &[Value]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|source| Error::DirectoryCreate {
                        path: parent.to_path_buf(),
                        source,
                    })?;
            }
        }

        let body = serde_json::to_vec_pretty(entries)?;
        let mut staging = self.path.clone().into_os_string();
        staging.push(".tmp");
        let staging = PathBuf::from(staging);

        tokio::fs::write(&staging, body).await?;
        tokio::fs::rename(&staging, &self.path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let log = AppendLog::new(dir.path().join("sos_log.json"));

        assert!(!log.exists().await);
        assert!(log.entries().await.unwrap().is_empty());
        assert!(log.read_raw().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_append_creates_pretty_array() {
        let dir = tempfile::tempdir().unwrap();
        let log = AppendLog::new(dir.path().join("nested").join("sos_log.json"));

        assert_eq!(log.append(&json!({"user": "Asha"})).await.unwrap(), 1);
        assert_eq!(log.append(&json!({"user": "Ravi"})).await.unwrap(), 2);

        let raw = String::from_utf8(log.read_raw().await.unwrap().unwrap()).unwrap();
        assert!(raw.starts_with("[\n"));
        assert_eq!(
            log.entries().await.unwrap(),
            vec![json!({"user": "Asha"}), json!({"user": "Ravi"})]
        );
    }

    #[tokio::test]
    async fn test_bounded_log_evicts_oldest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shake_intensity_log.json");
        let seeded: Vec<Value> = (0..1000).map(|i| json!({ "n": i })).collect();
        std::fs::write(&path, serde_json::to_vec(&seeded).unwrap()).unwrap();

        let log = AppendLog::bounded(&path, 1000);
        assert_eq!(log.append(&json!({ "n": 1000 })).await.unwrap(), 1000);

        let entries = log.entries().await.unwrap();
        assert_eq!(entries.len(), 1000);
        assert_eq!(entries[0], json!({ "n": 1 }));
        assert_eq!(entries[999], json!({ "n": 1000 }));
    }

    #[tokio::test]
    async fn test_corrupt_file_is_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sos_log.json");
        std::fs::write(&path, "{ not an array").unwrap();

        let log = AppendLog::new(&path);
        let err = log.append(&json!({})).await.unwrap_err();

        assert!(matches!(err, Error::LogCorrupt { .. }));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ not an array");
    }

    #[tokio::test]
    async fn test_concurrent_appends_are_serialized() {
        let dir = tempfile::tempdir().unwrap();
        let log = std::sync::Arc::new(AppendLog::new(dir.path().join("sos_log.json")));

        let mut tasks = tokio::task::JoinSet::new();
        for i in 0..20 {
            let log = log.clone();
            tasks.spawn(async move { log.append(&json!({ "n": i })).await });
        }
        while let Some(result) = tasks.join_next().await {
            result.unwrap().unwrap();
        }

        assert_eq!(log.entries().await.unwrap().len(), 20);
    }
}
