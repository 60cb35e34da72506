//! Machine store
//!
//! Host records live at `<machines_dir>/<name>/config.json`. A record exists
//! only for hosts whose creation succeeded.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use thiserror::Error;

use super::schema::{Host, HostRecord};

const RECORD_FILE: &str = "config.json";

/// Distinguishes temp files of concurrent saves within one process
static SAVE_SEQ: AtomicU64 = AtomicU64::new(0);

/// Errors that can occur during store operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// A record for this host is already present
    #[error("Host already exists in store: {0}")]
    Duplicate(String),

    /// No record for this host
    #[error("Host not found in store: {0}")]
    NotFound(String),

    /// Reading or writing the store failed
    #[error("Store I/O failed at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A record could not be encoded or decoded
    #[error("Invalid host record: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Durable repository of host records
#[async_trait]
pub trait Store: Send + Sync {
    /// Whether a record with this name exists
    async fn exists(&self, name: &str) -> Result<bool, StoreError>;

    /// Persist a host; fails with [`StoreError::Duplicate`] if the name is taken
    async fn save(&self, host: &Host) -> Result<(), StoreError>;

    /// Directory holding per-machine state, including backend logs
    fn machines_dir(&self) -> &Path;
}

/// Store backed by one JSON file per machine
#[derive(Debug, Clone)]
pub struct FilesystemStore {
    machines_dir: PathBuf,
}

impl FilesystemStore {
    pub fn new(machines_dir: impl Into<PathBuf>) -> Self {
        Self {
            machines_dir: machines_dir.into(),
        }
    }

    fn record_path(&self, name: &str) -> PathBuf {
        self.machines_dir.join(name).join(RECORD_FILE)
    }

    /// Read a saved host record
    pub async fn load(&self, name: &str) -> Result<HostRecord, StoreError> {
        let path = self.record_path(name);
        let contents = match tokio::fs::read(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound(name.to_string()));
            }
            Err(e) => return Err(StoreError::io(&path, e)),
        };
        Ok(serde_json::from_slice(&contents)?)
    }
}

#[async_trait]
impl Store for FilesystemStore {
    async fn exists(&self, name: &str) -> Result<bool, StoreError> {
        let path = self.record_path(name);
        tokio::fs::try_exists(&path)
            .await
            .map_err(|e| StoreError::io(&path, e))
    }

    async fn save(&self, host: &Host) -> Result<(), StoreError> {
        let record = host.to_record()?;
        let json = serde_json::to_vec_pretty(&record)?;

        let dir = self.machines_dir.join(&host.name);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| StoreError::io(&dir, e))?;

        // hard_link refuses an existing target, so a second writer loses here
        // and readers never see a half-written record.
        let final_path = dir.join(RECORD_FILE);
        let seq = SAVE_SEQ.fetch_add(1, Ordering::Relaxed);
        let tmp_path = dir.join(format!(".{RECORD_FILE}.{}.{seq}.tmp", std::process::id()));
        tokio::fs::write(&tmp_path, &json)
            .await
            .map_err(|e| StoreError::io(&tmp_path, e))?;

        let linked = tokio::fs::hard_link(&tmp_path, &final_path).await;
        if let Err(e) = tokio::fs::remove_file(&tmp_path).await {
            tracing::warn!("Failed to remove {}: {}", tmp_path.display(), e);
        }

        match linked {
            Ok(()) => {
                tracing::debug!("Saved host record: {}", final_path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                Err(StoreError::Duplicate(host.name.clone()))
            }
            Err(e) => Err(StoreError::io(&final_path, e)),
        }
    }

    fn machines_dir(&self) -> &Path {
        &self.machines_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{BaseDriver, DriverContext, NoneDriver};

    fn host(name: &str) -> Host {
        let driver = NoneDriver::new(BaseDriver::new(name, "/store"), &DriverContext::default());
        Host::new(name, "none", Box::new(driver))
    }

    #[tokio::test]
    async fn test_exists_false_for_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemStore::new(dir.path().join("machines"));
        assert!(!store.exists("dev1").await.unwrap());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemStore::new(dir.path().join("machines"));

        store.save(&host("dev1")).await.unwrap();

        assert!(store.exists("dev1").await.unwrap());
        let record = store.load("dev1").await.unwrap();
        assert_eq!(record.name, "dev1");
        assert_eq!(record.driver_name, "none");
        assert_eq!(record.driver["MachineName"], "dev1");
    }

    #[tokio::test]
    async fn test_save_duplicate_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemStore::new(dir.path().join("machines"));

        store.save(&host("dev1")).await.unwrap();
        let err = store.save(&host("dev1")).await.unwrap_err();

        assert!(matches!(err, StoreError::Duplicate(ref name) if name == "dev1"));
    }

    #[tokio::test]
    async fn test_concurrent_saves_have_one_winner() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemStore::new(dir.path().join("machines"));
        let (a, b) = (host("dev1"), host("dev1"));

        let (first, second) = tokio::join!(store.save(&a), store.save(&b));

        assert_eq!(first.is_ok() as u8 + second.is_ok() as u8, 1);
        assert!(store.load("dev1").await.is_ok());
    }

    #[tokio::test]
    async fn test_backend_files_do_not_count_as_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemStore::new(dir.path().join("machines"));
        let logs = store.machines_dir().join("dev1").join("dev1").join("Logs");
        std::fs::create_dir_all(&logs).unwrap();

        assert!(!store.exists("dev1").await.unwrap());
        assert!(store.save(&host("dev1")).await.is_ok());
    }

    #[tokio::test]
    async fn test_load_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemStore::new(dir.path());
        let err = store.load("ghost").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
