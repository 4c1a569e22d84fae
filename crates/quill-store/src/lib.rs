//! Document persistence for the Quill editor.
//!
//! This crate provides a [`DocumentStore`] trait abstracting where drafts and
//! published posts live. This enables:
//!
//! - **Unit testing** of editor sessions without touching the filesystem
//! - **Backend flexibility** (local JSON files, hosted document databases)
//! - **Clean separation** between the publish state machine and I/O
//!
//! # Architecture
//!
//! The crate provides:
//! - [`DocumentStore`] trait with `create()`, `update()`, `get()`, `delete()`, and `list()`
//! - [`FsStore`] implementation keeping one JSON file per record
//! - [`MemoryStore`] for testing (behind `mock` feature flag)
//!
//! # Example
//!
//! ```ignore
//! use quill_store::{Collection, DocumentStore, FsStore, Record};
//!
//! let store = FsStore::new(".quill/store");
//! let id = store.create(Collection::Drafts, Record::default()).await?;
//! for draft in store.list(Collection::Drafts).await? {
//!     println!("{}: {}", draft.id, draft.record.title);
//! }
//! ```

mod fs;
#[cfg(feature = "mock")]
mod mock;
mod store;

pub use fs::FsStore;
#[cfg(feature = "mock")]
pub use mock::{MemoryStore, StoreCall, StoreOp};
pub use store::{
    Collection, DocumentStore, ErrorStatus, Record, RecordPatch, StoreError, StoreErrorKind,
    StoredRecord, Timestamps, sort_newest_first,
};
