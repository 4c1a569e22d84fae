//! Filesystem document store.
//!
//! Provides [`FsStore`], which keeps one JSON file per record under
//! `<root>/<collection>/<id>.json`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::store::{
    Collection, DocumentStore, Record, RecordPatch, StoreError, StoreErrorKind, StoredRecord,
    Timestamps, sort_newest_first,
};

/// Backend identifier for error messages.
const BACKEND: &str = "Fs";

/// Filesystem document store.
///
/// Writes go through a temporary file followed by a rename, so a reader
/// never observes a half-written record. Read-modify-write updates are
/// serialized by an internal lock.
///
/// # Example
///
/// ```ignore
/// use quill_store::{Collection, DocumentStore, FsStore, Record};
///
/// let store = FsStore::new(".quill/store");
/// let id = store.create(Collection::Drafts, Record::default()).await?;
/// ```
#[derive(Debug)]
pub struct FsStore {
    /// Root directory of the store.
    root: PathBuf,
    /// Serializes writers within this process.
    write_lock: Mutex<()>,
}

impl FsStore {
    /// Create a store rooted at `root`. Directories are created lazily.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Root directory of the store.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reject ids that could escape the collection directory.
    fn validate_id(collection: Collection, id: &str) -> Result<(), StoreError> {
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

        if !valid {
            return Err(StoreError::new(StoreErrorKind::InvalidId)
                .with_record(collection, id)
                .with_backend(BACKEND));
        }
        Ok(())
    }

    fn collection_dir(&self, collection: Collection) -> PathBuf {
        self.root.join(collection.as_str())
    }

    fn record_path(&self, collection: Collection, id: &str) -> PathBuf {
        self.collection_dir(collection).join(format!("{id}.json"))
    }

    async fn read_record(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<StoredRecord>, StoreError> {
        let path = self.record_path(collection, id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StoreError::io(e)
                    .with_record(collection, id)
                    .with_backend(BACKEND));
            }
        };

        serde_json::from_slice(&bytes).map(Some).map_err(|e| {
            StoreError::serialization(e)
                .with_record(collection, id)
                .with_backend(BACKEND)
        })
    }

    async fn write_record(
        &self,
        collection: Collection,
        stored: &StoredRecord,
    ) -> Result<(), StoreError> {
        let map_io = |e: std::io::Error| {
            StoreError::io(e)
                .with_record(collection, stored.id.clone())
                .with_backend(BACKEND)
        };

        let dir = self.collection_dir(collection);
        tokio::fs::create_dir_all(&dir).await.map_err(map_io)?;

        let json = serde_json::to_vec_pretty(stored).map_err(|e| {
            StoreError::serialization(e)
                .with_record(collection, stored.id.clone())
                .with_backend(BACKEND)
        })?;

        let path = self.record_path(collection, &stored.id);
        let tmp = dir.join(format!(".{}.json.tmp", stored.id));
        tokio::fs::write(&tmp, json).await.map_err(map_io)?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(map_io(e));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for FsStore {
    async fn create(&self, collection: Collection, record: Record) -> Result<String, StoreError> {
        let _guard = self.write_lock.lock().await;

        let stored = StoredRecord {
            id: Uuid::new_v4().simple().to_string(),
            record,
            timestamps: Timestamps::on_create(collection, Utc::now()),
        };
        self.write_record(collection, &stored).await?;

        tracing::debug!(collection = %collection, id = %stored.id, "Record created");
        Ok(stored.id)
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        patch: RecordPatch,
    ) -> Result<(), StoreError> {
        Self::validate_id(collection, id)?;
        let _guard = self.write_lock.lock().await;

        let mut stored = self
            .read_record(collection, id)
            .await?
            .ok_or_else(|| StoreError::not_found(collection, id).with_backend(BACKEND))?;

        patch.apply_to(&mut stored.record);
        stored.timestamps.touch(collection, Utc::now());
        self.write_record(collection, &stored).await?;

        tracing::debug!(collection = %collection, id = %id, "Record updated");
        Ok(())
    }

    async fn get(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<StoredRecord>, StoreError> {
        Self::validate_id(collection, id)?;
        self.read_record(collection, id).await
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError> {
        Self::validate_id(collection, id)?;
        let _guard = self.write_lock.lock().await;

        match tokio::fs::remove_file(self.record_path(collection, id)).await {
            Ok(()) => {
                tracing::debug!(collection = %collection, id = %id, "Record deleted");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(e)
                .with_record(collection, id)
                .with_backend(BACKEND)),
        }
    }

    async fn list(&self, collection: Collection) -> Result<Vec<StoredRecord>, StoreError> {
        let dir = self.collection_dir(collection);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(StoreError::io(e)
                    .with_collection(collection)
                    .with_backend(BACKEND));
            }
        };

        let mut records = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| {
            StoreError::io(e)
                .with_collection(collection)
                .with_backend(BACKEND)
        })? {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            // Skip in-flight temporaries and anything not written by this store.
            if Self::validate_id(collection, id).is_err() {
                continue;
            }
            if let Some(stored) = self.read_record(collection, id).await? {
                records.push(stored);
            }
        }

        sort_newest_first(collection, &mut records);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;

    fn record(title: &str) -> Record {
        Record {
            title: title.to_owned(),
            description: "desc".to_owned(),
            content: "<p>hello</p>".to_owned(),
        }
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let temp = TempDir::new().unwrap();
        let store = FsStore::new(temp.path());

        let id = store
            .create(Collection::Drafts, record("First"))
            .await
            .unwrap();
        let stored = store.get(Collection::Drafts, &id).await.unwrap().unwrap();

        assert_eq!(stored.id, id);
        assert_eq!(stored.record, record("First"));
        assert!(stored.timestamps.last_saved.is_some());
        assert!(temp.path().join("drafts").join(format!("{id}.json")).exists());
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let temp = TempDir::new().unwrap();
        let store = FsStore::new(temp.path());

        let result = store.get(Collection::Posts, "missing").await.unwrap();

        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let temp = TempDir::new().unwrap();
        let store = FsStore::new(temp.path());

        let err = store
            .update(Collection::Drafts, "missing", RecordPatch::full(record("x")))
            .await
            .unwrap_err();

        assert!(err.is_not_found());
        assert_eq!(err.backend(), Some("Fs"));
        assert_eq!(err.id(), Some("missing"));
    }

    #[tokio::test]
    async fn test_update_post_sets_last_edited_and_keeps_date() {
        let temp = TempDir::new().unwrap();
        let store = FsStore::new(temp.path());
        let id = store.create(Collection::Posts, record("Post")).await.unwrap();
        let before = store.get(Collection::Posts, &id).await.unwrap().unwrap();

        store
            .update(
                Collection::Posts,
                &id,
                RecordPatch {
                    title: Some("Edited".to_owned()),
                    ..RecordPatch::default()
                },
            )
            .await
            .unwrap();

        let after = store.get(Collection::Posts, &id).await.unwrap().unwrap();
        assert_eq!(after.record.title, "Edited");
        assert_eq!(after.record.content, "<p>hello</p>");
        assert_eq!(after.timestamps.date, before.timestamps.date);
        assert!(after.timestamps.last_edited.is_some());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let store = FsStore::new(temp.path());
        let id = store.create(Collection::Drafts, record("Gone")).await.unwrap();

        store.delete(Collection::Drafts, &id).await.unwrap();
        store.delete(Collection::Drafts, &id).await.unwrap();

        assert!(store.get(Collection::Drafts, &id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalid_id_rejected() {
        let temp = TempDir::new().unwrap();
        let store = FsStore::new(temp.path());

        let err = store
            .get(Collection::Drafts, "../../etc/passwd")
            .await
            .unwrap_err();

        assert_eq!(err.kind(), StoreErrorKind::InvalidId);
    }

    #[tokio::test]
    async fn test_list_empty_collection() {
        let temp = TempDir::new().unwrap();
        let store = FsStore::new(temp.path());

        let records = store.list(Collection::Posts).await.unwrap();

        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_list_ignores_foreign_files() {
        let temp = TempDir::new().unwrap();
        let store = FsStore::new(temp.path());
        let id = store.create(Collection::Drafts, record("Kept")).await.unwrap();
        std::fs::write(temp.path().join("drafts").join("notes.txt"), "x").unwrap();
        std::fs::write(temp.path().join("drafts").join(".tmp.json.tmp"), "x").unwrap();

        let records = store.list(Collection::Drafts).await.unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, id);
    }

    #[tokio::test]
    async fn test_failed_rename_removes_temp_file() {
        let temp = TempDir::new().unwrap();
        let store = FsStore::new(temp.path());
        let drafts = temp.path().join("drafts");
        // A non-empty directory where the record file should go.
        std::fs::create_dir_all(drafts.join("blocked.json")).unwrap();
        std::fs::write(drafts.join("blocked.json").join("keep"), "x").unwrap();
        let stored = StoredRecord {
            id: "blocked".to_owned(),
            record: record("Blocked"),
            timestamps: Timestamps::on_create(Collection::Drafts, Utc::now()),
        };

        let result = store.write_record(Collection::Drafts, &stored).await;

        assert!(result.is_err());
        assert!(!drafts.join(".blocked.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_corrupt_record_is_serialization_error() {
        let temp = TempDir::new().unwrap();
        let store = FsStore::new(temp.path());
        std::fs::create_dir_all(temp.path().join("posts")).unwrap();
        std::fs::write(temp.path().join("posts").join("bad.json"), "{not json").unwrap();

        let err = store.get(Collection::Posts, "bad").await.unwrap_err();

        assert_eq!(err.kind(), StoreErrorKind::Serialization);
        assert!(!err.is_retryable());
    }
}
