//! Durable key-value storage the session token lives in.
//!
//! The client only reads from it. The write side exists for whoever owns the
//! session (login stores the token, logout removes it).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage file is corrupt: {0}")]
    Corrupt(String),
}

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError>;
    async fn remove_item(&self, key: &str) -> Result<(), StoreError>;
}

/// In-process store. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.items.lock().await.get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.items
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<(), StoreError> {
        self.items.lock().await.remove(key);
        Ok(())
    }
}

/// Store backed by a single JSON object on disk.
///
/// A missing file reads as empty. Reads share an async read lock and
/// read-modify-write cycles take the write lock. Each save writes a sibling
/// temp file and renames it over the target, so no reader ever sees a
/// truncated file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: RwLock<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: RwLock::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Map<String, Value>, StoreError> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };
        if text.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str(&text) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(StoreError::Corrupt("expected a JSON object".to_string())),
            Err(e) => Err(StoreError::Corrupt(e.to_string())),
        }
    }

    async fn save(&self, map: &Map<String, Value>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let text =
            serde_json::to_string_pretty(map).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        let tmp = self.temp_path();
        tokio::fs::write(&tmp, text).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
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
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StoreError> {
        let _guard = self.lock.read().await;
        let map = self.load().await?;
        Ok(map.get(key).and_then(Value::as_str).map(str::to_string))
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let _guard = self.lock.write().await;
        let mut map = self.load().await?;
        map.insert(key.to_string(), Value::String(value.to_string()));
        self.save(&map).await
    }

    async fn remove_item(&self, key: &str) -> Result<(), StoreError> {
        let _guard = self.lock.write().await;
        let mut map = self.load().await?;
        if map.remove(key).is_some() {
            self.save(&map).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert_eq!(store.get_item("auth_token").await.unwrap(), None);

        store.set_item("auth_token", "abc").await.unwrap();
        assert_eq!(store.get_item("auth_token").await.unwrap().as_deref(), Some("abc"));

        store.remove_item("auth_token").await.unwrap();
        assert_eq!(store.get_item("auth_token").await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_store_missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("storage.json"));
        assert_eq!(store.get_item("auth_token").await.unwrap(), None);
        // Removing from a missing file does not create it.
        store.remove_item("auth_token").await.unwrap();
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("storage.json");

        let store = FileStore::new(&path);
        store.set_item("auth_token", "tok-1").await.unwrap();
        store.set_item("user_data", r#"{"id":5}"#).await.unwrap();

        let reopened = FileStore::new(&path);
        assert_eq!(reopened.get_item("auth_token").await.unwrap().as_deref(), Some("tok-1"));
        assert_eq!(reopened.get_item("user_data").await.unwrap().as_deref(), Some(r#"{"id":5}"#));

        reopened.remove_item("auth_token").await.unwrap();
        assert_eq!(store.get_item("auth_token").await.unwrap(), None);
        assert!(store.get_item("user_data").await.unwrap().is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn file_store_reads_survive_concurrent_writes() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileStore::new(dir.path().join("storage.json")));
        store.set_item("auth_token", "tok").await.unwrap();

        let writer = {
            let store = store.clone();
            tokio::spawn(async move {
                let big = "x".repeat(200 * 1024);
                for _ in 0..100 {
                    store.set_item("user_data", &big).await.unwrap();
                }
            })
        };

        loop {
            let token = store.get_item("auth_token").await.unwrap();
            assert_eq!(token.as_deref(), Some("tok"));
            if writer.is_finished() {
                break;
            }
            tokio::task::yield_now().await;
        }
        writer.await.unwrap();
        assert!(!store.temp_path().exists());
    }

    #[tokio::test]
    async fn file_store_reports_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        std::fs::write(&path, "not json").unwrap();

        let err = FileStore::new(&path).get_item("auth_token").await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(_)));
    }
}
