//! Durable storage of the task document.
//!
//! The document is the single JSON object `{"tasks": [...]}`. Every save
//! replaces the whole document; there are no partial writes or appends.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use crate::task::TaskCollection;

/// Errors raised while reading or writing the task document.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The document could not be read or written.
    #[error("Failed to access task document {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The document exists but does not hold a valid task collection.
    #[error("Malformed task document {}: {reason}", path.display())]
    Malformed { path: PathBuf, reason: String },
    /// The collection could not be encoded as JSON.
    #[error("Failed to serialize task document: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Load/save access to the persisted task collection.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Reads the whole collection, creating an empty document if none exists.
    async fn load(&self) -> Result<TaskCollection, StorageError>;

    /// Replaces the persisted document with `collection`.
    async fn save(&self, collection: &TaskCollection) -> Result<(), StorageError>;
}

/// Stores the task document as pretty-printed JSON in a single file.
#[derive(Debug, Clone)]
pub struct JsonFileTaskStore {
    path: PathBuf,
}

impl JsonFileTaskStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn malformed(&self, reason: impl Into<String>) -> StorageError {
        StorageError::Malformed {
            path: self.path.clone(),
            reason: reason.into(),
        }
    }

    async fn initialize(&self) -> Result<TaskCollection, StorageError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }
        let empty = TaskCollection::new();
        self.save(&empty).await?;
        tracing::info!("Initialized empty task document at {}", self.path.display());
        Ok(empty)
    }
}

#[async_trait]
impl TaskStore for JsonFileTaskStore {
    #[tracing::instrument(skip(self), fields(path = %self.path.display()))]
    async fn load(&self) -> Result<TaskCollection, StorageError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return self.initialize().await,
            Err(e) => return Err(self.io_error(e)),
        };

        let collection: TaskCollection =
            serde_json::from_str(&contents).map_err(|e| self.malformed(e.to_string()))?;
        if let Some(id) = collection.duplicate_id() {
            return Err(self.malformed(format!("duplicate task id '{id}'")));
        }
        Ok(collection)
    }

    #[tracing::instrument(
        skip(self, collection),
        fields(path = %self.path.display(), tasks = collection.len())
    )]
    async fn save(&self, collection: &TaskCollection) -> Result<(), StorageError> {
        let json = serde_json::to_string_pretty(collection)?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| self.io_error(e))
    }
}

/// Keeps the task document in memory. Nothing survives the process.
#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    document: Mutex<TaskCollection>,
}

impl InMemoryTaskStore {
    /// Returns a copy of the current document.
    pub async fn snapshot(&self) -> TaskCollection {
        self.document.lock().await.clone()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn load(&self) -> Result<TaskCollection, StorageError> {
        Ok(self.document.lock().await.clone())
    }

    async fn save(&self, collection: &TaskCollection) -> Result<(), StorageError> {
        *self.document.lock().await = collection.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    const EXISTING_DOCUMENT: &str = r#"{
  "tasks": [
    {
      "id": "test-id-1",
      "title": "Existing Task 1",
      "completed": false,
      "priority": "medium",
      "createdAt": "2024-01-01T00:00:00.000Z",
      "updatedAt": "2024-01-01T00:00:00.000Z"
    }
  ]
}"#;

    #[tokio::test]
    async fn can_initialize_missing_document() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data").join("data.json");
        let store = JsonFileTaskStore::new(&path);

        let collection = store.load().await.unwrap();

        assert!(collection.is_empty());
        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, json!({"tasks": []}));
    }

    #[tokio::test]
    async fn can_load_existing_document() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(&path, EXISTING_DOCUMENT).unwrap();
        let store = JsonFileTaskStore::new(&path);

        let collection = store.load().await.unwrap();

        assert_eq!(collection.len(), 1);
        assert_eq!(collection.tasks()[0].id(), "test-id-1");
        assert_eq!(collection.tasks()[0].title(), "Existing Task 1");
    }

    #[tokio::test]
    async fn can_save_and_reload_document() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(&path, EXISTING_DOCUMENT).unwrap();
        let store = JsonFileTaskStore::new(&path);

        let collection = store.load().await.unwrap();
        store.save(&collection).await.unwrap();

        assert_eq!(store.load().await.unwrap(), collection);
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("{\n  \"tasks\": ["));
    }

    #[tokio::test]
    async fn can_report_corrupt_document_without_overwriting_it() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(&path, "{\"tasks\": [").unwrap();
        let store = JsonFileTaskStore::new(&path);

        let result = store.load().await;

        assert!(matches!(result, Err(StorageError::Malformed { .. })));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{\"tasks\": [");
    }

    #[tokio::test]
    async fn can_report_wrong_document_shape() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(&path, "[]").unwrap();

        let result = JsonFileTaskStore::new(&path).load().await;

        assert!(matches!(result, Err(StorageError::Malformed { .. })));
    }

    #[tokio::test]
    async fn can_report_duplicate_ids() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.json");
        let task = json!({
            "id": "same", "title": "t", "completed": false,
            "createdAt": "2024-01-01T00:00:00Z", "updatedAt": "2024-01-01T00:00:00Z"
        });
        std::fs::write(&path, json!({"tasks": [task, task]}).to_string()).unwrap();

        let err = JsonFileTaskStore::new(&path).load().await.unwrap_err();

        assert!(err.to_string().contains("duplicate task id 'same'"));
    }

    #[tokio::test]
    async fn can_report_unreadable_location() {
        let dir = TempDir::new().unwrap();
        // A directory where the file should be cannot be read as a document.
        let store = JsonFileTaskStore::new(dir.path());

        let result = store.load().await;

        assert!(matches!(result, Err(StorageError::Io { .. })));
    }

    #[tokio::test]
    async fn can_keep_document_in_memory() {
        let store = InMemoryTaskStore::default();
        let collection: TaskCollection =
            serde_json::from_str(EXISTING_DOCUMENT).unwrap();

        store.save(&collection).await.unwrap();

        assert_eq!(store.load().await.unwrap(), collection);
        assert_eq!(store.snapshot().await, collection);
    }
}
