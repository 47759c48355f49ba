use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;
use tracing::warn;

use crate::{record, CounterStore, StoreError};

/// Single-node store: one text file holds one record.
///
/// The key only labels errors; every key maps to the same file. Publishes
/// are serialized by an in-process lock and land atomically via a sibling
/// temp file and `rename`, so a crash never leaves a torn record. The lock
/// does not extend to other processes sharing the file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    publish_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            publish_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    async fn read_record(&self, key: &str) -> Result<u64, StoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => record::decode(&raw).map_err(|e| StoreError::unavailable(key, e)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(0),
            Err(e) => Err(StoreError::unavailable(
                key,
                format!("read {}: {e}", self.path.display()),
            )),
        }
    }

    /// Replace the record atomically. On failure the previous record is left
    /// in place.
    async fn write_record(&self, key: &str, value: u64) -> Result<(), StoreError> {
        let tmp = self.temp_path();
        let res = match tokio::fs::write(&tmp, record::encode(value)).await {
            Ok(()) => match tokio::fs::rename(&tmp, &self.path).await {
                Ok(()) => Ok(()),
                Err(e) => {
                    let _ = tokio::fs::remove_file(&tmp).await;
                    Err(format!("rename into {}: {e}", self.path.display()))
                }
            },
            Err(e) => Err(format!("write {}: {e}", tmp.display())),
        };

        res.map_err(|reason| {
            warn!(key, path = %self.path.display(), %reason, "counter record not replaced");
            StoreError::unavailable(key, reason)
        })?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl CounterStore for FileStore {
    fn backend_name(&self) -> &'static str {
        "file"
    }

    async fn read(&self, key: &str) -> Result<u64, StoreError> {
        self.read_record(key).await
    }

    async fn publish_if_unchanged(
        &self,
        key: &str,
        expected: u64,
        new_value: u64,
    ) -> Result<(), StoreError> {
        let _guard = self.publish_lock.lock().await;
        let current = self.read_record(key).await?;
        if current != expected {
            return Err(StoreError::conflict(key, expected));
        }
        self.write_record(key, new_value).await
    }
}
