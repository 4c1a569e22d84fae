//! Document store trait and error types.
//!
//! Provides the core [`DocumentStore`] trait for persisting drafts and posts,
//! along with [`StoreError`] for unified error handling across backends.
//!
//! # Collections
//!
//! A store holds two logical collections with the same record shape:
//! - [`Collection::Drafts`] - editable, pre-publication documents
//! - [`Collection::Posts`] - published documents
//!
//! Timestamps are assigned by the store, never by the caller: drafts get
//! `last_saved` on every write, posts get `date` on create and `last_edited`
//! on update.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Logical collection within a document store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    /// Documents persisted in an editable, pre-publication state.
    Drafts,
    /// Documents persisted in their final, published form.
    Posts,
}

impl Collection {
    /// Collection name as used in storage keys and directory names.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Drafts => "drafts",
            Self::Posts => "posts",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full record written on create.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Document title.
    pub title: String,
    /// Short description shown in listings.
    pub description: String,
    /// Serialized rich-text content (HTML).
    pub content: String,
}

/// Partial record written on update.
///
/// Only `Some` fields are written; `None` fields keep their stored value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecordPatch {
    /// New title.
    pub title: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// New content.
    pub content: Option<String>,
}

impl RecordPatch {
    /// Patch that overwrites every field of the record.
    #[must_use]
    pub fn full(record: Record) -> Self {
        Self {
            title: Some(record.title),
            description: Some(record.description),
            content: Some(record.content),
        }
    }

    /// Returns `true` if the patch writes no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.content.is_none()
    }

    /// Apply the patch to a record in place.
    pub fn apply_to(self, record: &mut Record) {
        if let Some(title) = self.title {
            record.title = title;
        }
        if let Some(description) = self.description {
            record.description = description;
        }
        if let Some(content) = self.content {
            record.content = content;
        }
    }
}

impl From<Record> for RecordPatch {
    fn from(record: Record) -> Self {
        Self::full(record)
    }
}

/// Store-assigned timestamps.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamps {
    /// Last draft write (drafts only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_saved: Option<DateTime<Utc>>,
    /// Publication time (posts only, set on create).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
    /// Last edit of a published post (posts only, set on update).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_edited: Option<DateTime<Utc>>,
}

impl Timestamps {
    /// Timestamps for a freshly created record in `collection`.
    #[must_use]
    pub fn on_create(collection: Collection, now: DateTime<Utc>) -> Self {
        match collection {
            Collection::Drafts => Self {
                last_saved: Some(now),
                ..Self::default()
            },
            Collection::Posts => Self {
                date: Some(now),
                ..Self::default()
            },
        }
    }

    /// Advance timestamps for an update in `collection`.
    pub fn touch(&mut self, collection: Collection, now: DateTime<Utc>) {
        match collection {
            Collection::Drafts => self.last_saved = Some(now),
            Collection::Posts => self.last_edited = Some(now),
        }
    }
}

/// Record as read back from the store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    /// Store-assigned identifier.
    pub id: String,
    /// Record fields.
    #[serde(flatten)]
    pub record: Record,
    /// Store-assigned timestamps.
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

impl StoredRecord {
    /// Timestamp a listing of `collection` is ordered by.
    ///
    /// Drafts order by `last_saved`, posts by `date`.
    #[must_use]
    pub fn listing_time(&self, collection: Collection) -> Option<DateTime<Utc>> {
        match collection {
            Collection::Drafts => self.timestamps.last_saved,
            Collection::Posts => self.timestamps.date,
        }
    }
}

/// Sort records newest first by their listing timestamp, ties broken by id.
pub fn sort_newest_first(collection: Collection, records: &mut [StoredRecord]) {
    records.sort_by(|a, b| {
        b.listing_time(collection)
            .cmp(&a.listing_time(collection))
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Semantic error categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum StoreErrorKind {
    /// Record does not exist.
    NotFound,
    /// Record already exists (for create operations).
    AlreadyExists,
    /// Invalid record identifier.
    InvalidId,
    /// Backend is temporarily unavailable.
    Unavailable,
    /// Operation timed out.
    Timeout,
    /// Record could not be encoded or decoded.
    Serialization,
    /// Other/unknown error category.
    Other,
}

/// Retry guidance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ErrorStatus {
    /// Don't retry (not found, invalid id, corrupt record).
    #[default]
    Permanent,
    /// Retry immediately (timeout, connection reset).
    Temporary,
    /// Retry with backoff (service unavailable).
    Persistent,
}

/// Store error with semantic kind and backend-specific source.
#[derive(Debug)]
pub struct StoreError {
    kind: StoreErrorKind,
    status: ErrorStatus,
    collection: Option<Collection>,
    id: Option<String>,
    backend: Option<&'static str>,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl StoreError {
    /// Create a new store error.
    #[must_use]
    pub fn new(kind: StoreErrorKind) -> Self {
        let status = match kind {
            StoreErrorKind::Timeout => ErrorStatus::Temporary,
            StoreErrorKind::Unavailable => ErrorStatus::Persistent,
            _ => ErrorStatus::Permanent,
        };
        Self {
            kind,
            status,
            collection: None,
            id: None,
            backend: None,
            source: None,
        }
    }

    /// Attach collection and record id context.
    #[must_use]
    pub fn with_record(mut self, collection: Collection, id: impl Into<String>) -> Self {
        self.collection = Some(collection);
        self.id = Some(id.into());
        self
    }

    /// Attach collection context.
    #[must_use]
    pub fn with_collection(mut self, collection: Collection) -> Self {
        self.collection = Some(collection);
        self
    }

    /// Attach backend identifier.
    #[must_use]
    pub fn with_backend(mut self, backend: &'static str) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Set retry status.
    #[must_use]
    pub fn with_status(mut self, status: ErrorStatus) -> Self {
        self.status = status;
        self
    }

    /// Attach the underlying error source.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Semantic error category.
    #[must_use]
    pub fn kind(&self) -> StoreErrorKind {
        self.kind
    }

    /// Retry guidance.
    #[must_use]
    pub fn status(&self) -> ErrorStatus {
        self.status
    }

    /// Collection the failed operation targeted.
    #[must_use]
    pub fn collection(&self) -> Option<Collection> {
        self.collection
    }

    /// Record id the failed operation targeted.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Backend identifier.
    #[must_use]
    pub fn backend(&self) -> Option<&'static str> {
        self.backend
    }

    /// Returns `true` for [`StoreErrorKind::NotFound`].
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.kind == StoreErrorKind::NotFound
    }

    /// Returns `true` if the operation may succeed when retried.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.status != ErrorStatus::Permanent
    }

    /// Downcast the source error to a concrete type.
    #[must_use]
    pub fn downcast_source<E: std::error::Error + 'static>(&self) -> Option<&E> {
        self.source.as_ref()?.downcast_ref()
    }

    /// Create a not found error for a record.
    #[must_use]
    pub fn not_found(collection: Collection, id: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::NotFound).with_record(collection, id)
    }

    /// Create a timeout error.
    #[must_use]
    pub fn timeout() -> Self {
        Self::new(StoreErrorKind::Timeout)
    }

    /// Create a store error from an I/O error.
    #[must_use]
    pub fn io(err: std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::NotFound => StoreErrorKind::NotFound,
            std::io::ErrorKind::AlreadyExists => StoreErrorKind::AlreadyExists,
            std::io::ErrorKind::TimedOut => StoreErrorKind::Timeout,
            std::io::ErrorKind::PermissionDenied => StoreErrorKind::Unavailable,
            _ => StoreErrorKind::Other,
        };
        Self::new(kind).with_source(err)
    }

    /// Create a store error from a JSON encoding error.
    #[must_use]
    pub fn serialization(err: serde_json::Error) -> Self {
        Self::new(StoreErrorKind::Serialization).with_source(err)
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Format: "[Backend] Kind: message (drafts/abc123)"
        if let Some(backend) = self.backend {
            write!(f, "[{backend}] ")?;
        }

        let kind_str = match self.kind {
            StoreErrorKind::NotFound => "Not found",
            StoreErrorKind::AlreadyExists => "Already exists",
            StoreErrorKind::InvalidId => "Invalid id",
            StoreErrorKind::Unavailable => "Unavailable",
            StoreErrorKind::Timeout => "Timeout",
            StoreErrorKind::Serialization => "Serialization error",
            StoreErrorKind::Other => "Error",
        };

        write!(f, "{kind_str}")?;

        if let Some(source) = &self.source {
            write!(f, ": {source}")?;
        }

        match (self.collection, &self.id) {
            (Some(collection), Some(id)) => write!(f, " ({collection}/{id})")?,
            (Some(collection), None) => write!(f, " ({collection})")?,
            _ => {}
        }

        Ok(())
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|s| s.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Persistence gateway for drafts and posts.
///
/// Every method is a suspension point: callers must assume other work runs
/// while a call is pending. Implementations assign ids and timestamps.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create a record and return its store-assigned id.
    async fn create(&self, collection: Collection, record: Record) -> Result<String, StoreError>;

    /// Update fields of an existing record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreErrorKind::NotFound`] if `id` does not exist.
    async fn update(
        &self,
        collection: Collection,
        id: &str,
        patch: RecordPatch,
    ) -> Result<(), StoreError>;

    /// Fetch a record. Returns `Ok(None)` if it does not exist.
    async fn get(&self, collection: Collection, id: &str)
    -> Result<Option<StoredRecord>, StoreError>;

    /// Delete a record. Deleting a missing record is not an error.
    async fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError>;

    /// List every record in a collection.
    async fn list(&self, collection: Collection) -> Result<Vec<StoredRecord>, StoreError>;
}
