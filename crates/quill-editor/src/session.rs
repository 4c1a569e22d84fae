//! Editor session: the draft/publish state machine.
//!
//! One [`EditorSession`] exists per open document. It owns the document,
//! its dirty tracker, lifecycle state, staged media, and the autosave
//! scheduler, and is the only component that talks to the document store.
//!
//! # Locking
//!
//! Session state sits behind a `std::sync::Mutex` that is never held across
//! an `.await`. Writes to the store are serialized by a separate async write
//! lock:
//!
//! - background saves `try_lock` it and are dropped if a write is in flight
//! - an explicit save waits for it, then re-checks dirtiness
//! - publish waits for it and holds it until the post is written and the
//!   draft retired
//!
//! Timers hold only weak references to the session, so dropping the last
//! `EditorSession` clone cancels all background work.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use quill_media::{MediaFile, MediaKind, UploadError, UploadService};
use quill_store::{Collection, DocumentStore, RecordPatch, StoreError};

use crate::connectivity::ConnectivityMonitor;
use crate::document::{DirtyTracker, Document, Snapshot};
use crate::error::SessionError;
use crate::lifecycle::{LifecycleState, SaveStatus, Selection};
use crate::scheduler::{AutosaveScheduler, SaveDecision, SaveTrigger, SchedulerConfig};
use crate::staging::{MediaStaging, PromotedAsset, TempMediaAsset, folder_scope};
use crate::timer::TimerHandle;

/// Session tuning.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Autosave timing.
    pub autosave: SchedulerConfig,
    /// Bound on each store call.
    pub store_timeout: Duration,
    /// Bound on each media upload.
    pub upload_timeout: Duration,
    /// Upload folder prefix; the document scope is appended.
    pub folder_root: String,
    /// Publish even if some staged media failed to upload.
    pub allow_partial_media: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            autosave: SchedulerConfig::default(),
            store_timeout: Duration::from_secs(10),
            upload_timeout: Duration::from_secs(30),
            folder_root: "blog/post".to_owned(),
            allow_partial_media: false,
        }
    }
}

/// External collaborators of a session.
#[derive(Clone)]
pub struct SessionDeps {
    pub store: Arc<dyn DocumentStore>,
    pub uploader: Arc<dyn UploadService>,
    pub connectivity: ConnectivityMonitor,
}

/// Result of a save request that did not fail.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The snapshot was written under this id.
    Saved { id: String },
    /// Nothing to write.
    Clean,
    /// Another write was in flight; the trigger was dropped.
    Busy,
    /// A publish suppresses autosave, or the lifecycle does not autosave.
    Suppressed,
    /// Offline; the save will run when connectivity returns.
    Deferred,
    /// Waiting out a backoff after repeated failures.
    BackingOff,
    /// A background save failed; the error was logged.
    Failed,
}

/// Result of a successful publish.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishOutcome {
    /// Id of the post record.
    pub post_id: String,
    /// Media uploaded during this publish.
    pub promoted: Vec<PromotedAsset>,
    /// Media that failed or could not be resolved (only with partial media allowed).
    pub failed_media: Vec<String>,
    /// Draft left behind because deleting it failed.
    pub orphaned_draft: Option<String>,
}

/// Result of a discard request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiscardOutcome {
    /// Document was clean; nothing was lost.
    Exited,
    /// Unsaved edits were dropped and the last saved state restored.
    Abandoned,
    /// Document is dirty and the caller has not confirmed.
    NeedsConfirmation,
}

/// Media inserted into the session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InsertedMedia {
    /// Reference to embed: a local reference for images, a remote URL for videos.
    pub reference: String,
    pub kind: MediaKind,
    /// `true` if the media is staged until publish.
    pub staged: bool,
}

struct SessionState {
    document: Document,
    tracker: DirtyTracker,
    lifecycle: LifecycleState,
    status: SaveStatus,
    placeholder: String,
    publishing: bool,
}

struct Inner {
    config: SessionConfig,
    store: Arc<dyn DocumentStore>,
    uploader: Arc<dyn UploadService>,
    connectivity: ConnectivityMonitor,
    staging: MediaStaging,
    scheduler: AutosaveScheduler,
    state: Mutex<SessionState>,
    write_lock: tokio::sync::Mutex<()>,
    listener: Mutex<Option<TimerHandle>>,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn folder(&self, state: &SessionState) -> String {
        format!(
            "{}/{}",
            self.config.folder_root,
            folder_scope(&state.lifecycle, &state.placeholder)
        )
    }

    async fn bounded<T>(
        &self,
        fut: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        tokio::time::timeout(self.config.store_timeout, fut)
            .await
            .unwrap_or_else(|_| Err(StoreError::timeout()))
    }
}

/// An open document and everything needed to persist it.
///
/// Cloning is cheap; clones share the same session.
#[derive(Clone)]
pub struct EditorSession {
    inner: Arc<Inner>,
}

fn placeholder_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis());
    format!("new_{millis}")
}

impl EditorSession {
    /// Open a document and start background autosave.
    ///
    /// Must be called within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotFound`] if the selected record does not
    /// exist, [`SessionError::Offline`] if loading needs the network while
    /// offline, or [`SessionError::Persistence`] if the store fails.
    pub async fn open(
        selection: Selection,
        deps: SessionDeps,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        let (collection, id) = match selection {
            Selection::New => (None, None),
            Selection::Draft(id) => (Some(Collection::Drafts), Some(id)),
            Selection::Post(id) => (Some(Collection::Posts), Some(id)),
        };

        let (document, lifecycle) = match (collection, id) {
            (Some(collection), Some(id)) => {
                if !deps.connectivity.is_online() {
                    return Err(SessionError::Offline);
                }
                let stored = tokio::time::timeout(
                    config.store_timeout,
                    deps.store.get(collection, &id),
                )
                .await
                .unwrap_or_else(|_| Err(StoreError::timeout()))?
                .ok_or_else(|| SessionError::NotFound {
                    collection,
                    id: id.clone(),
                })?;
                let lifecycle = match collection {
                    Collection::Drafts => LifecycleState::Draft(id),
                    Collection::Posts => LifecycleState::Published(id),
                };
                (Document::from_record(stored.record), lifecycle)
            }
            _ => (Document::default(), LifecycleState::New),
        };

        let tracker = DirtyTracker::new(document.snapshot());
        let inner = Arc::new(Inner {
            staging: MediaStaging::new(Arc::clone(&deps.uploader)),
            scheduler: AutosaveScheduler::new(config.autosave.clone()),
            config,
            store: deps.store,
            uploader: deps.uploader,
            connectivity: deps.connectivity,
            state: Mutex::new(SessionState {
                document,
                tracker,
                lifecycle,
                status: SaveStatus::Clean,
                placeholder: placeholder_id(),
                publishing: false,
            }),
            write_lock: tokio::sync::Mutex::new(()),
            listener: Mutex::new(None),
        });

        let session = Self { inner };
        session.spawn_online_listener();
        if session.lifecycle().autosaves() {
            session.start_periodic();
        }

        tracing::info!(lifecycle = %session.lifecycle(), "Opened editor session");
        Ok(session)
    }

    fn weak(&self) -> Weak<Inner> {
        Arc::downgrade(&self.inner)
    }

    fn from_weak(weak: &Weak<Inner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    fn spawn_online_listener(&self) {
        let weak = self.weak();
        let mut edges = self.inner.connectivity.subscribe();
        let handle = TimerHandle::spawn(async move {
            while edges.became_online().await {
                let Some(session) = Self::from_weak(&weak) else {
                    return;
                };
                if session.inner.scheduler.take_pending_offline() {
                    tracing::debug!("Back online, flushing deferred save");
                    session.autosave(SaveTrigger::Reconnect).await;
                }
            }
        });
        *self
            .inner
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    /// Spawn a detached background save. Timer cancellation never interrupts it.
    fn trigger_callback(weak: Weak<Inner>, trigger: SaveTrigger) -> impl Fn() + Send + 'static {
        move || {
            if let Some(session) = Self::from_weak(&weak) {
                tokio::spawn(async move {
                    session.autosave(trigger).await;
                });
            }
        }
    }

    fn start_periodic(&self) {
        let callback = Self::trigger_callback(self.weak(), SaveTrigger::Periodic);
        self.inner.scheduler.start_periodic(callback);
    }

    fn arm_debounce(&self) {
        let callback = Self::trigger_callback(self.weak(), SaveTrigger::Debounce);
        self.inner.scheduler.arm_debounce(callback);
    }

    // Accessors

    /// Copy of the current document.
    #[must_use]
    pub fn document(&self) -> Document {
        self.inner.state().document.clone()
    }

    #[must_use]
    pub fn lifecycle(&self) -> LifecycleState {
        self.inner.state().lifecycle.clone()
    }

    /// Durable id, derived from the lifecycle.
    #[must_use]
    pub fn document_id(&self) -> Option<String> {
        self.inner.state().lifecycle.id().map(str::to_owned)
    }

    /// Locally generated `new_<millis>` id used before the first save.
    #[must_use]
    pub fn placeholder_id(&self) -> String {
        self.inner.state().placeholder.clone()
    }

    #[must_use]
    pub fn status(&self) -> SaveStatus {
        self.inner.state().status
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        let state = self.inner.state();
        state.tracker.is_dirty(&state.document)
    }

    /// Last committed snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.inner.state().tracker.snapshot().clone()
    }

    #[must_use]
    pub fn is_publishing(&self) -> bool {
        self.inner.state().publishing
    }

    #[must_use]
    pub fn display_title(&self) -> String {
        let state = self.inner.state();
        state.document.display_title(!state.lifecycle.is_new())
    }

    /// Upload folder for this document's media.
    #[must_use]
    pub fn media_folder(&self) -> String {
        self.inner.folder(&self.inner.state())
    }

    /// Staged media, in insertion order.
    #[must_use]
    pub fn staged_media(&self) -> Vec<TempMediaAsset> {
        self.inner.staging.snapshot()
    }

    /// `data:` preview for a staged asset.
    #[must_use]
    pub fn preview_data_url(&self, local_id: &str) -> Option<String> {
        self.inner.staging.preview_data_url(local_id)
    }

    #[must_use]
    pub fn scheduler(&self) -> &AutosaveScheduler {
        &self.inner.scheduler
    }

    #[must_use]
    pub fn connectivity(&self) -> &ConnectivityMonitor {
        &self.inner.connectivity
    }

    // Edits

    pub fn set_title(&self, title: impl Into<String>) {
        let title = title.into();
        self.edit(|doc| doc.title = title);
    }

    pub fn set_description(&self, description: impl Into<String>) {
        let description = description.into();
        self.edit(|doc| doc.description = description);
    }

    pub fn set_content(&self, content: impl Into<String>) {
        let content = content.into();
        self.edit(|doc| doc.content = content);
    }

    /// Apply an edit from the editing surface.
    ///
    /// Updates the save status and restarts the debounce timer when the
    /// document differs from the last saved snapshot.
    pub fn edit(&self, f: impl FnOnce(&mut Document)) {
        let rearm = {
            let mut state = self.inner.state();
            f(&mut state.document);
            let dirty = state.tracker.is_dirty(&state.document);
            if !matches!(state.status, SaveStatus::Saving | SaveStatus::Offline) {
                state.status = if dirty {
                    SaveStatus::Dirty
                } else {
                    SaveStatus::Clean
                };
            }
            dirty && state.lifecycle.autosaves() && !state.publishing
        };
        if rearm {
            self.arm_debounce();
        }
    }

    // Saving

    /// Save now.
    ///
    /// Waits for any in-flight write, then writes if the document is still
    /// dirty. A never-persisted document is written even when clean, so an
    /// explicit save always yields a draft id.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Offline`] when offline (the save is deferred
    /// until connectivity returns), [`SessionError::PublishInProgress`]
    /// during a publish, or [`SessionError::Persistence`] if the write fails.
    pub async fn save(&self) -> Result<SaveOutcome, SessionError> {
        if self.is_publishing() {
            return Err(SessionError::PublishInProgress);
        }
        let _guard = self.inner.write_lock.lock().await;
        self.save_locked(SaveTrigger::Explicit).await
    }

    /// Run a background save. Errors are logged, never returned.
    ///
    /// Timer triggers do nothing for published posts. A reconnect trigger
    /// still runs there, since it only follows an explicit save that was
    /// deferred while offline.
    pub async fn autosave(&self, trigger: SaveTrigger) -> SaveOutcome {
        if trigger != SaveTrigger::Reconnect && !self.inner.state().lifecycle.autosaves() {
            return SaveOutcome::Suppressed;
        }
        let Ok(_guard) = self.inner.write_lock.try_lock() else {
            tracing::trace!(?trigger, "Write in flight, dropping trigger");
            return SaveOutcome::Busy;
        };
        match self.save_locked(trigger).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(?trigger, error = %e, "Autosave failed");
                SaveOutcome::Failed
            }
        }
    }

    /// Save with the write lock held.
    async fn save_locked(&self, trigger: SaveTrigger) -> Result<SaveOutcome, SessionError> {
        let online = self.inner.connectivity.is_online();
        let (snapshot, lifecycle) = {
            let mut state = self.inner.state();
            let dirty = state.tracker.is_dirty(&state.document);
            let needs_write = dirty || (trigger == SaveTrigger::Explicit && state.lifecycle.is_new());

            match self.inner.scheduler.decide(trigger, needs_write, online) {
                SaveDecision::Start => {}
                SaveDecision::SkipClean => {
                    if state.status == SaveStatus::Offline {
                        state.status = SaveStatus::Clean;
                    }
                    return Ok(SaveOutcome::Clean);
                }
                SaveDecision::SkipSuppressed => return Ok(SaveOutcome::Suppressed),
                SaveDecision::SkipBackoff => return Ok(SaveOutcome::BackingOff),
                SaveDecision::DeferOffline => {
                    state.status = SaveStatus::Offline;
                    tracing::debug!(?trigger, "Offline, deferring save");
                    return if trigger.is_background() {
                        Ok(SaveOutcome::Deferred)
                    } else {
                        Err(SessionError::Offline)
                    };
                }
            }

            state.status = SaveStatus::Saving;
            (state.document.snapshot(), state.lifecycle.clone())
        };

        let record = snapshot.to_record();
        let result = match &lifecycle {
            LifecycleState::New => {
                self.inner
                    .bounded(self.inner.store.create(Collection::Drafts, record))
                    .await
            }
            LifecycleState::Draft(id) => self
                .inner
                .bounded(
                    self.inner
                        .store
                        .update(Collection::Drafts, id, RecordPatch::full(record)),
                )
                .await
                .map(|()| id.clone()),
            LifecycleState::Published(id) => self
                .inner
                .bounded(
                    self.inner
                        .store
                        .update(Collection::Posts, id, RecordPatch::full(record)),
                )
                .await
                .map(|()| id.clone()),
        };

        let mut state = self.inner.state();
        match result {
            Ok(id) => {
                if state.lifecycle.is_new() {
                    state.lifecycle.latch_draft(id.clone());
                    tracing::info!(id = %id, "Draft created");
                } else {
                    tracing::debug!(id = %id, ?trigger, "Saved");
                }
                state.tracker.commit(snapshot);
                state.status = if state.tracker.is_dirty(&state.document) {
                    SaveStatus::Dirty
                } else {
                    SaveStatus::Saved
                };
                self.inner.scheduler.record_success();
                Ok(SaveOutcome::Saved { id })
            }
            Err(e) => {
                state.status = SaveStatus::Failed;
                if let Some(delay) = self.inner.scheduler.record_failure() {
                    tracing::warn!(
                        failures = self.inner.scheduler.consecutive_failures(),
                        backoff_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "Repeated save failures, backing off"
                    );
                }
                Err(SessionError::Persistence(e))
            }
        }
    }

    // Media

    /// Insert media into the document.
    ///
    /// Images are staged locally and uploaded at publish time; the returned
    /// reference renders without any network call. Videos are uploaded
    /// immediately and the remote URL is returned.
    ///
    /// The caller embeds the returned reference into the content.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Upload`] for empty or unsupported media or a
    /// failed video upload, and [`SessionError::Offline`] for a video while
    /// offline.
    pub async fn insert_media(
        &self,
        media: MediaFile,
        placement_marker: impl Into<String>,
    ) -> Result<InsertedMedia, SessionError> {
        let kind = media.validate()?;
        let inserted = match kind {
            MediaKind::Image => InsertedMedia {
                reference: self.inner.staging.stage(media, placement_marker),
                kind,
                staged: true,
            },
            MediaKind::Video => {
                if !self.inner.connectivity.is_online() {
                    return Err(SessionError::Offline);
                }
                let folder = self.media_folder();
                let timeout = self.inner.config.upload_timeout;
                let url = tokio::time::timeout(timeout, self.inner.uploader.upload(&media, &folder))
                    .await
                    .unwrap_or(Err(UploadError::Timeout(timeout)))?;
                tracing::info!(url = %url, "Uploaded video");
                InsertedMedia {
                    reference: url,
                    kind,
                    staged: false,
                }
            }
        };
        self.inner
            .state()
            .document
            .add_media_ref(inserted.reference.clone());
        Ok(inserted)
    }

    // Publishing

    /// Publish the document.
    ///
    /// Suppresses autosave, waits for any in-flight save, promotes staged
    /// media, writes the post record, and deletes the draft record. A failed
    /// draft delete does not fail the publish; the orphan is reported in the
    /// outcome.
    ///
    /// On error the document is left untouched and autosave resumes, so the
    /// publish can be retried.
    ///
    /// # Errors
    ///
    /// - [`SessionError::Validation`] if the content is empty
    /// - [`SessionError::Offline`] if offline
    /// - [`SessionError::PublishInProgress`] if a publish is already running
    /// - [`SessionError::Media`] if media failed and partial media is not allowed
    /// - [`SessionError::Persistence`] if writing the post fails
    pub async fn publish(&self) -> Result<PublishOutcome, SessionError> {
        {
            let mut state = self.inner.state();
            if state.document.is_empty_content() {
                return Err(SessionError::Validation(
                    "post content cannot be empty".to_owned(),
                ));
            }
            if !self.inner.connectivity.is_online() {
                return Err(SessionError::Offline);
            }
            if state.publishing {
                return Err(SessionError::PublishInProgress);
            }
            state.publishing = true;
        }

        let mut guard = PublishGuard {
            session: self,
            committed: false,
        };
        self.inner.scheduler.suppress();
        let _write = self.inner.write_lock.lock().await;

        let outcome = self.publish_locked().await?;
        guard.committed = true;
        Ok(outcome)
    }

    async fn publish_locked(&self) -> Result<PublishOutcome, SessionError> {
        let folder = self.media_folder();
        let report = self
            .inner
            .staging
            .promote(&folder, self.inner.config.upload_timeout, |from, to| {
                self.inner.state().document.replace_ref(from, to);
            })
            .await;

        let (snapshot, lifecycle) = {
            let state = self.inner.state();
            (state.document.snapshot(), state.lifecycle.clone())
        };

        let mut failed_media = report.failed.clone();
        failed_media.extend(self.inner.staging.unresolved_refs(snapshot.content()));
        if !failed_media.is_empty() {
            if self.inner.config.allow_partial_media {
                tracing::warn!(failed = ?failed_media, "Publishing with missing media");
            } else {
                self.inner.state().status = SaveStatus::Failed;
                return Err(SessionError::Media {
                    failed: failed_media,
                });
            }
        }

        let record = snapshot.to_record();
        let written = match &lifecycle {
            LifecycleState::Published(id) => self
                .inner
                .bounded(
                    self.inner
                        .store
                        .update(Collection::Posts, id, RecordPatch::full(record)),
                )
                .await
                .map(|()| id.clone()),
            LifecycleState::New | LifecycleState::Draft(_) => {
                self.inner
                    .bounded(self.inner.store.create(Collection::Posts, record))
                    .await
            }
        };
        let post_id = match written {
            Ok(id) => id,
            Err(e) => {
                self.inner.state().status = SaveStatus::Failed;
                return Err(SessionError::Persistence(e));
            }
        };

        let mut orphaned_draft = None;
        if let LifecycleState::Draft(draft_id) = &lifecycle {
            let deleted = self
                .inner
                .bounded(self.inner.store.delete(Collection::Drafts, draft_id))
                .await;
            if let Err(e) = deleted {
                tracing::warn!(
                    draft_id = %draft_id,
                    post_id = %post_id,
                    error = %e,
                    "Post published but draft could not be deleted"
                );
                orphaned_draft = Some(draft_id.clone());
            }
        }

        {
            let mut state = self.inner.state();
            state.lifecycle.mark_published(post_id.clone());
            state.tracker.commit(snapshot);
            state.status = if state.tracker.is_dirty(&state.document) {
                SaveStatus::Dirty
            } else {
                SaveStatus::Saved
            };
            state.publishing = false;
        }
        self.inner.staging.clear_promoted();
        self.inner.scheduler.record_success();

        tracing::info!(post_id = %post_id, media = report.promoted.len(), "Published");
        Ok(PublishOutcome {
            post_id,
            promoted: report.promoted,
            failed_media,
            orphaned_draft,
        })
    }

    /// Re-enable autosave after a failed or abandoned publish.
    fn abort_publish(&self) {
        let dirty = {
            let mut state = self.inner.state();
            state.publishing = false;
            state.tracker.is_dirty(&state.document)
        };
        self.inner.scheduler.resume();
        if self.lifecycle().autosaves() {
            self.start_periodic();
            if dirty {
                self.arm_debounce();
            }
        }
    }

    // Discarding

    /// Leave the editor, dropping unsaved edits only when confirmed.
    ///
    /// Never deletes a persisted draft or post.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::PublishInProgress`] during a publish.
    pub fn discard(&self, confirmed: bool) -> Result<DiscardOutcome, SessionError> {
        let outcome = {
            let mut state = self.inner.state();
            if state.publishing {
                return Err(SessionError::PublishInProgress);
            }
            if !state.tracker.is_dirty(&state.document) {
                DiscardOutcome::Exited
            } else if !confirmed {
                return Ok(DiscardOutcome::NeedsConfirmation);
            } else {
                let snapshot = state.tracker.snapshot().clone();
                state.document.restore(&snapshot);
                state.status = SaveStatus::Clean;
                DiscardOutcome::Abandoned
            }
        };
        self.inner.scheduler.cancel_all();
        self.inner.scheduler.take_pending_offline();
        self.inner.staging.clear();
        tracing::debug!(?outcome, "Discarded session");
        Ok(outcome)
    }
}

/// Restores autosave if a publish returns early or its future is dropped.
struct PublishGuard<'a> {
    session: &'a EditorSession,
    committed: bool,
}

impl Drop for PublishGuard<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.session.abort_publish();
        }
    }
}

#[cfg(test)]
mod tests {
    use quill_media::MockUploader;
    use quill_store::{MemoryStore, Record, StoreErrorKind, StoreOp};

    use super::*;

    fn record(content: &str) -> Record {
        Record {
            title: "Title".to_owned(),
            description: "Desc".to_owned(),
            content: content.to_owned(),
        }
    }

    fn quiet_config() -> SessionConfig {
        SessionConfig {
            autosave: SchedulerConfig {
                enabled: false,
                ..SchedulerConfig::default()
            },
            ..SessionConfig::default()
        }
    }

    async fn open(store: &Arc<MemoryStore>, selection: Selection) -> EditorSession {
        let deps = SessionDeps {
            store: Arc::clone(store) as _,
            uploader: Arc::new(MockUploader::new()),
            connectivity: ConnectivityMonitor::default(),
        };
        EditorSession::open(selection, deps, quiet_config())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_open_new() {
        let store = Arc::new(MemoryStore::new());
        let session = open(&store, Selection::New).await;

        assert_eq!(session.lifecycle(), LifecycleState::New);
        assert!(session.document_id().is_none());
        assert!(session.placeholder_id().starts_with("new_"));
        assert!(!session.is_dirty());
        assert_eq!(session.display_title(), "Create New Post");
        assert!(session.media_folder().starts_with("blog/post/temp_"));
    }

    #[tokio::test]
    async fn test_open_missing_draft_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        let deps = SessionDeps {
            store: Arc::clone(&store) as _,
            uploader: Arc::new(MockUploader::new()),
            connectivity: ConnectivityMonitor::default(),
        };

        let result = EditorSession::open(Selection::Draft("gone".to_owned()), deps, quiet_config()).await;

        assert!(matches!(
            result,
            Err(SessionError::NotFound { collection: Collection::Drafts, .. })
        ));
    }

    #[tokio::test]
    async fn test_open_existing_offline_fails() {
        let store = Arc::new(MemoryStore::new().with_draft("d1", record("<p>x</p>")));
        let deps = SessionDeps {
            store: Arc::clone(&store) as _,
            uploader: Arc::new(MockUploader::new()),
            connectivity: ConnectivityMonitor::new(false),
        };

        let result = EditorSession::open(Selection::Draft("d1".to_owned()), deps, quiet_config()).await;

        assert!(matches!(result, Err(SessionError::Offline)));
        assert_eq!(store.call_count(StoreOp::Get, Collection::Drafts), 0);
    }

    #[tokio::test]
    async fn test_open_post_loads_record() {
        let store = Arc::new(MemoryStore::new().with_post("p1", record("<p>live</p>")));
        let session = open(&store, Selection::Post("p1".to_owned())).await;

        assert_eq!(session.lifecycle(), LifecycleState::Published("p1".to_owned()));
        assert_eq!(session.document().content, "<p>live</p>");
        assert_eq!(session.media_folder(), "blog/post/p1");
    }

    #[tokio::test]
    async fn test_edit_sets_status() {
        let store = Arc::new(MemoryStore::new());
        let session = open(&store, Selection::New).await;

        session.set_title("Hello");
        assert_eq!(session.status(), SaveStatus::Dirty);

        session.set_title("");
        assert_eq!(session.status(), SaveStatus::Clean);
    }

    #[tokio::test]
    async fn test_explicit_save_of_clean_new_creates_draft() {
        let store = Arc::new(MemoryStore::new());
        let session = open(&store, Selection::New).await;

        let outcome = session.save().await.unwrap();

        assert_eq!(outcome, SaveOutcome::Saved { id: "draft-1".to_owned() });
        assert_eq!(session.lifecycle(), LifecycleState::Draft("draft-1".to_owned()));
    }

    #[tokio::test]
    async fn test_explicit_save_of_clean_draft_is_noop() {
        let store = Arc::new(MemoryStore::new().with_draft("d1", record("<p>x</p>")));
        let session = open(&store, Selection::Draft("d1".to_owned())).await;

        let outcome = session.save().await.unwrap();

        assert_eq!(outcome, SaveOutcome::Clean);
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_save_keeps_document_dirty() {
        let store = Arc::new(MemoryStore::new().with_draft("d1", record("<p>x</p>")));
        let session = open(&store, Selection::Draft("d1".to_owned())).await;
        session.set_content("<p>changed</p>");
        store.fail_next(StoreOp::Update, StoreErrorKind::Unavailable);

        let err = session.save().await.unwrap_err();

        assert!(matches!(err, SessionError::Persistence(_)));
        assert!(session.is_dirty());
        assert_eq!(session.status(), SaveStatus::Failed);
        assert_eq!(session.document().content, "<p>changed</p>");

        session.save().await.unwrap();
        assert!(!session.is_dirty());
        assert_eq!(session.status(), SaveStatus::Saved);
    }

    #[tokio::test]
    async fn test_background_failure_is_swallowed() {
        let store = Arc::new(MemoryStore::new());
        let session = open(&store, Selection::New).await;
        session.set_content("<p>x</p>");
        store.fail_next(StoreOp::Create, StoreErrorKind::Timeout);

        let outcome = session.autosave(SaveTrigger::Periodic).await;

        assert_eq!(outcome, SaveOutcome::Failed);
        assert_eq!(session.lifecycle(), LifecycleState::New);
        assert_eq!(session.scheduler().consecutive_failures(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_timeout_surfaces_as_failed() {
        let store = Arc::new(MemoryStore::new().with_write_delay(Duration::from_secs(60)));
        let session = open(&store, Selection::New).await;
        session.set_content("<p>x</p>");

        let err = session.save().await.unwrap_err();

        assert!(matches!(&err, SessionError::Persistence(e) if e.kind() == StoreErrorKind::Timeout));
        assert_eq!(session.status(), SaveStatus::Failed);
    }

    #[tokio::test]
    async fn test_published_document_does_not_autosave() {
        let store = Arc::new(MemoryStore::new().with_post("p1", record("<p>x</p>")));
        let session = open(&store, Selection::Post("p1".to_owned())).await;
        session.set_content("<p>edited</p>");

        assert_eq!(session.autosave(SaveTrigger::Periodic).await, SaveOutcome::Suppressed);

        session.save().await.unwrap();
        assert_eq!(store.call_count(StoreOp::Update, Collection::Posts), 1);
        assert_eq!(store.record(Collection::Posts, "p1").unwrap().record.content, "<p>edited</p>");
    }

    #[tokio::test]
    async fn test_insert_image_is_staged() {
        let store = Arc::new(MemoryStore::new());
        let session = open(&store, Selection::New).await;

        let inserted = session
            .insert_media(MediaFile::new("a.png", b"png".to_vec()), "caret")
            .await
            .unwrap();

        assert!(inserted.staged);
        assert!(inserted.reference.starts_with("quill-local://"));
        assert_eq!(session.staged_media().len(), 1);
        assert_eq!(session.document().media_refs, vec![inserted.reference]);
    }

    #[tokio::test]
    async fn test_insert_video_uploads_immediately() {
        let store = Arc::new(MemoryStore::new().with_draft("d1", record("<p>x</p>")));
        let session = open(&store, Selection::Draft("d1".to_owned())).await;

        let inserted = session
            .insert_media(MediaFile::new("clip.mp4", b"mp4".to_vec()), "caret")
            .await
            .unwrap();

        assert!(!inserted.staged);
        assert_eq!(inserted.reference, "https://media.test/blog/post/d1/clip.mp4");
        assert!(session.staged_media().is_empty());
    }

    #[tokio::test]
    async fn test_insert_unsupported_media_rejected() {
        let store = Arc::new(MemoryStore::new());
        let session = open(&store, Selection::New).await;

        let err = session
            .insert_media(MediaFile::new("notes.pdf", b"%PDF".to_vec()), "")
            .await
            .unwrap_err();

        assert!(matches!(err, SessionError::Upload(UploadError::Rejected(_))));
    }

    #[tokio::test]
    async fn test_discard_clean_exits() {
        let store = Arc::new(MemoryStore::new());
        let session = open(&store, Selection::New).await;

        assert_eq!(session.discard(false).unwrap(), DiscardOutcome::Exited);
    }

    #[tokio::test]
    async fn test_discard_dirty_requires_confirmation() {
        let store = Arc::new(MemoryStore::new().with_draft("d1", record("<p>saved</p>")));
        let session = open(&store, Selection::Draft("d1".to_owned())).await;
        session.set_content("<p>unsaved</p>");

        assert_eq!(session.discard(false).unwrap(), DiscardOutcome::NeedsConfirmation);
        assert_eq!(session.document().content, "<p>unsaved</p>");

        assert_eq!(session.discard(true).unwrap(), DiscardOutcome::Abandoned);
        assert_eq!(session.document().content, "<p>saved</p>");
        assert!(!session.is_dirty());
        assert_eq!(store.len(Collection::Drafts), 1);
        assert_eq!(store.call_count(StoreOp::Delete, Collection::Drafts), 0);
    }

    #[tokio::test]
    async fn test_publish_empty_is_validation_error() {
        let store = Arc::new(MemoryStore::new());
        let session = open(&store, Selection::New).await;

        let err = session.publish().await.unwrap_err();

        assert!(matches!(err, SessionError::Validation(_)));
        assert_eq!(session.lifecycle(), LifecycleState::New);
        assert!(store.calls().is_empty());
        assert!(!session.is_publishing());
    }

    #[tokio::test]
    async fn test_publish_offline_is_error() {
        let store = Arc::new(MemoryStore::new());
        let session = open(&store, Selection::New).await;
        session.set_content("<p>Hello</p>");
        session.connectivity().set_online(false);

        let err = session.publish().await.unwrap_err();

        assert!(matches!(err, SessionError::Offline));
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_publish_new_creates_post_without_draft() {
        let store = Arc::new(MemoryStore::new());
        let session = open(&store, Selection::New).await;
        session.set_content("<p>Hello</p>");

        let outcome = session.publish().await.unwrap();

        assert_eq!(outcome.post_id, "post-1");
        assert!(outcome.orphaned_draft.is_none());
        assert_eq!(session.lifecycle(), LifecycleState::Published("post-1".to_owned()));
        assert_eq!(store.call_count(StoreOp::Delete, Collection::Drafts), 0);
        assert!(!session.is_dirty());
    }

    #[tokio::test]
    async fn test_publish_reports_orphaned_draft() {
        let store = Arc::new(MemoryStore::new().with_draft("d1", record("<p>x</p>")));
        let session = open(&store, Selection::Draft("d1".to_owned())).await;
        store.fail_next(StoreOp::Delete, StoreErrorKind::Unavailable);

        let outcome = session.publish().await.unwrap();

        assert_eq!(outcome.orphaned_draft.as_deref(), Some("d1"));
        assert!(session.lifecycle().is_published());
        assert!(store.record(Collection::Drafts, "d1").is_some());
    }

    #[tokio::test]
    async fn test_publish_store_failure_is_retryable() {
        let store = Arc::new(MemoryStore::new().with_draft("d1", record("<p>x</p>")));
        let session = open(&store, Selection::Draft("d1".to_owned())).await;
        session.set_content("<p>final</p>");
        store.fail_next(StoreOp::Create, StoreErrorKind::Unavailable);

        let err = session.publish().await.unwrap_err();

        assert!(matches!(err, SessionError::Persistence(_)));
        assert_eq!(session.lifecycle(), LifecycleState::Draft("d1".to_owned()));
        assert_eq!(session.status(), SaveStatus::Failed);
        assert!(!session.is_publishing());
        assert!(!session.scheduler().is_suppressed());
        assert_eq!(session.document().content, "<p>final</p>");

        let outcome = session.publish().await.unwrap();
        assert!(session.lifecycle().is_published());
        assert_eq!(store.record(Collection::Posts, &outcome.post_id).unwrap().record.content, "<p>final</p>");
    }

    #[tokio::test]
    async fn test_published_publish_updates_post() {
        let store = Arc::new(MemoryStore::new().with_post("p1", record("<p>v1</p>")));
        let session = open(&store, Selection::Post("p1".to_owned())).await;
        session.set_content("<p>v2</p>");

        let outcome = session.publish().await.unwrap();

        assert_eq!(outcome.post_id, "p1");
        assert_eq!(store.call_count(StoreOp::Create, Collection::Posts), 0);
        assert_eq!(store.call_count(StoreOp::Update, Collection::Posts), 1);
        assert!(store.record(Collection::Posts, "p1").unwrap().timestamps.last_edited.is_some());
    }
}
