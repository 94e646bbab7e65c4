//! Snapshot persistence
//!
//! The whole campaign state is saved as one `{ contacts, settings }` blob
//! under a fixed key. Backends only need to store and return that blob.

use async_trait::async_trait;
use gofor_store::{SnapshotTable, StoreError};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::model::Snapshot;

/// Storage key for the campaign snapshot
pub const SNAPSHOT_KEY: &str = "gofor360_state_v4";

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, PersistenceError>;

#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn load(&self) -> Result<Option<Snapshot>>;

    async fn save(&self, snapshot: &Snapshot) -> Result<()>;

    async fn is_healthy(&self) -> bool {
        true
    }

    fn backend(&self) -> &'static str;
}

/// JSON file under a state directory
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(format!("{}.json", SNAPSHOT_KEY)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn load(&self) -> Result<Option<Snapshot>> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let snapshot = serde_json::from_slice(&raw)?;
        info!(path = %self.path.display(), "Loaded state snapshot");
        Ok(Some(snapshot))
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let body = serde_json::to_vec_pretty(snapshot)?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        // Write-then-rename so a crash never leaves a truncated snapshot
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), contacts = snapshot.contacts.len(), "Saved state snapshot");
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "file"
    }
}

/// JSONB row in PostgreSQL
pub struct PgSnapshotStore {
    table: SnapshotTable,
}

impl PgSnapshotStore {
    pub async fn connect(table: SnapshotTable) -> Result<Self> {
        table.ensure_table().await?;
        Ok(Self { table })
    }
}

#[async_trait]
impl SnapshotStore for PgSnapshotStore {
    async fn load(&self) -> Result<Option<Snapshot>> {
        match self.table.load(SNAPSHOT_KEY).await? {
            Some(body) => Ok(Some(serde_json::from_value(body)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let body = serde_json::to_value(snapshot)?;
        self.table.save(SNAPSHOT_KEY, &body).await?;
        Ok(())
    }

    async fn is_healthy(&self) -> bool {
        self.table.is_healthy().await
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}

/// Process memory only; state is lost on restart
#[derive(Default)]
pub struct MemorySnapshotStore {
    snapshot: Mutex<Option<Snapshot>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self {
            snapshot: Mutex::new(Some(snapshot)),
        }
    }

    pub fn current(&self) -> Option<Snapshot> {
        self.snapshot.lock().clone()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn load(&self) -> Result<Option<Snapshot>> {
        Ok(self.current())
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<()> {
        *self.snapshot.lock() = Some(snapshot.clone());
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Contact, ContactStatus, Message};
    use crate::settings::Settings;

    fn snapshot() -> Snapshot {
        let contact = Contact {
            id: "c-1".to_string(),
            phone_number: "+39 333 000 1111".to_string(),
            product_name: "Lamp".to_string(),
            old_address: "Via Roma 1".to_string(),
            new_address: None,
            status: ContactStatus::Pending,
            last_updated: chrono::Utc::now(),
            conversation: vec![Message::model("Hello")],
        };
        Snapshot::new(vec![contact], &Settings::default())
    }

    #[tokio::test]
    async fn test_file_store_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path());
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_store_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path().join("nested"));
        store.save(&snapshot()).await.unwrap();

        assert!(store.path().ends_with("gofor360_state_v4.json"));
        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.contacts.len(), 1);
        assert_eq!(loaded.contacts[0].product_name, "Lamp");
        assert!(loaded.settings.is_some());
    }

    #[tokio::test]
    async fn test_file_store_rejects_corrupt_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path());
        tokio::fs::write(store.path(), b"{not json").await.unwrap();
        assert!(matches!(store.load().await, Err(PersistenceError::Encoding(_))));
    }

    #[tokio::test]
    async fn test_file_store_reads_blob_without_settings() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path());
        tokio::fs::write(store.path(), br#"{"contacts": []}"#).await.unwrap();
        let loaded = store.load().await.unwrap().unwrap();
        assert!(loaded.contacts.is_empty());
        assert!(loaded.settings.is_none());
    }

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemorySnapshotStore::new();
        assert!(store.load().await.unwrap().is_none());
        store.save(&snapshot()).await.unwrap();
        assert_eq!(store.current().unwrap().contacts.len(), 1);
    }
}
