//! Draft/publish persistence engine for the Quill editor.
//!
//! An [`EditorSession`] holds one document being edited and keeps it safe:
//!
//! - edits are autosaved as a draft after a quiet period, with a periodic
//!   fallback timer
//! - saves made while offline are deferred and flushed on reconnect
//! - images are staged locally and uploaded only when the document is published
//! - publishing writes a post record and retires the draft
//!
//! At most one write to the store is in flight per session at any time.
//!
//! # Example
//!
//! ```ignore
//! use quill_editor::{EditorSession, SessionConfig, SessionDeps, Selection};
//!
//! let session = EditorSession::open(Selection::New, deps, SessionConfig::default()).await?;
//! session.set_title("Hello");
//! session.set_content("<p>World</p>");
//! let outcome = session.publish().await?;
//! println!("published {}", outcome.post_id);
//! ```

mod connectivity;
mod document;
mod error;
mod lifecycle;
mod reconcile;
mod scheduler;
mod session;
mod staging;
mod timer;

pub use connectivity::{ConnectivityMonitor, OnlineEdges};
pub use document::{DirtyTracker, Document, EMPTY_CONTENT, Snapshot, is_dirty, media_html};
pub use error::SessionError;
pub use lifecycle::{LifecycleState, SaveStatus, Selection};
pub use reconcile::{SweepReport, sweep_orphaned_drafts};
pub use scheduler::{AutosaveScheduler, SaveDecision, SaveTrigger, SchedulerConfig};
pub use session::{
    DiscardOutcome, EditorSession, InsertedMedia, PublishOutcome, SaveOutcome, SessionConfig,
    SessionDeps,
};
pub use staging::{
    AssetStatus, LOCAL_SCHEME, MediaStaging, PromotedAsset, PromotionReport, TempMediaAsset,
    folder_scope, local_ref,
};
pub use timer::TimerHandle;
