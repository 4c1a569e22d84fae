//! Media staging.
//!
//! Images inserted while editing are kept locally and only uploaded when the
//! document is published. Each asset moves through
//! `Pending → Uploading → Uploaded(url) | Failed(error)`.
//!
//! Staging is synchronous and never touches the network, so the editing
//! surface can display the local reference (or its `data:` preview)
//! immediately.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use quill_media::{MediaFile, UploadError, UploadService};
use uuid::Uuid;

use crate::lifecycle::LifecycleState;

/// Scheme of local media references embedded in document content.
pub const LOCAL_SCHEME: &str = "quill-local://";

/// Upload state of a staged asset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AssetStatus {
    /// Not attempted yet.
    Pending,
    /// Upload in flight.
    Uploading,
    /// Uploaded; the document now references `url`.
    Uploaded {
        /// Remote URL returned by the upload service.
        url: String,
    },
    /// Last attempt failed. Retried by the next promotion.
    Failed {
        /// Error message from the upload service.
        error: String,
    },
}

/// A media file staged for upload at publish time.
#[derive(Clone, Debug)]
pub struct TempMediaAsset {
    /// Locally generated id (`temp-img-<uuid>`).
    pub local_id: String,
    /// File contents and metadata.
    pub source: MediaFile,
    /// Opaque marker from the editing surface locating the asset in the document.
    pub placement_marker: String,
    /// Upload state.
    pub status: AssetStatus,
}

impl TempMediaAsset {
    /// Reference embedded in the document until the asset is uploaded.
    #[must_use]
    pub fn local_ref(&self) -> String {
        local_ref(&self.local_id)
    }
}

/// Local reference for a staged asset id.
#[must_use]
pub fn local_ref(local_id: &str) -> String {
    format!("{LOCAL_SCHEME}{local_id}")
}

/// A successfully promoted asset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PromotedAsset {
    pub local_id: String,
    pub url: String,
}

/// Aggregate result of one promotion pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PromotionReport {
    /// Assets uploaded by this pass, in insertion order.
    pub promoted: Vec<PromotedAsset>,
    /// Local ids of assets that failed in this pass.
    pub failed: Vec<String>,
}

impl PromotionReport {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Folder scope for uploads of a document.
///
/// Unpersisted documents use `temp_<millis>` from their `new_<millis>`
/// placeholder; persisted ones use their id (`post_<n>` ids shortened to `<n>`).
#[must_use]
pub fn folder_scope(lifecycle: &LifecycleState, placeholder: &str) -> String {
    match lifecycle.id() {
        Some(id) => id.strip_prefix("post_").unwrap_or(id).to_owned(),
        None => match placeholder.strip_prefix("new_") {
            Some(millis) => format!("temp_{millis}"),
            None => format!("temp_{placeholder}"),
        },
    }
}

/// Staged media for one editor session.
pub struct MediaStaging {
    uploader: Arc<dyn UploadService>,
    assets: Mutex<Vec<TempMediaAsset>>,
}

impl MediaStaging {
    #[must_use]
    pub fn new(uploader: Arc<dyn UploadService>) -> Self {
        Self {
            uploader,
            assets: Mutex::new(Vec::new()),
        }
    }

    fn assets(&self) -> MutexGuard<'_, Vec<TempMediaAsset>> {
        self.assets.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stage a file and return its local reference. No network call is made.
    pub fn stage(&self, source: MediaFile, placement_marker: impl Into<String>) -> String {
        let asset = TempMediaAsset {
            local_id: format!("temp-img-{}", Uuid::new_v4().simple()),
            source,
            placement_marker: placement_marker.into(),
            status: AssetStatus::Pending,
        };
        let reference = asset.local_ref();
        tracing::debug!(local_id = %asset.local_id, file = %asset.source.file_name, "Staged media");
        self.assets().push(asset);
        reference
    }

    /// `data:` URL previewing a staged asset.
    #[must_use]
    pub fn preview_data_url(&self, local_id: &str) -> Option<String> {
        let assets = self.assets();
        let asset = assets.iter().find(|a| a.local_id == local_id)?;
        Some(format!(
            "data:{};base64,{}",
            asset.source.content_type,
            STANDARD.encode(&asset.source.data)
        ))
    }

    /// Copy of every staged asset, in insertion order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<TempMediaAsset> {
        self.assets().clone()
    }

    #[must_use]
    pub fn status(&self, local_id: &str) -> Option<AssetStatus> {
        self.assets()
            .iter()
            .find(|a| a.local_id == local_id)
            .map(|a| a.status.clone())
    }

    /// Number of assets still awaiting a successful upload.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.assets()
            .iter()
            .filter(|a| !matches!(a.status, AssetStatus::Uploaded { .. }))
            .count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assets().is_empty()
    }

    fn set_status(&self, local_id: &str, status: AssetStatus) {
        if let Some(asset) = self.assets().iter_mut().find(|a| a.local_id == local_id) {
            asset.status = status;
        }
    }

    /// Upload every `Pending` or `Failed` asset into `folder`.
    ///
    /// Assets are uploaded one at a time in insertion order. A failure marks
    /// that asset `Failed` and the pass continues. After each success,
    /// `rewrite(local_ref, url)` swaps that one reference in the document.
    /// `Uploaded` assets are skipped, so a retried publish only re-attempts
    /// what failed.
    pub async fn promote<F>(&self, folder: &str, timeout: Duration, mut rewrite: F) -> PromotionReport
    where
        F: FnMut(&str, &str),
    {
        let candidates: Vec<(String, MediaFile)> = self
            .assets()
            .iter()
            .filter(|a| matches!(a.status, AssetStatus::Pending | AssetStatus::Failed { .. }))
            .map(|a| (a.local_id.clone(), a.source.clone()))
            .collect();

        let mut report = PromotionReport::default();
        for (local_id, source) in candidates {
            self.set_status(&local_id, AssetStatus::Uploading);

            let result = tokio::time::timeout(timeout, self.uploader.upload(&source, folder))
                .await
                .unwrap_or(Err(UploadError::Timeout(timeout)));

            match result {
                Ok(url) => {
                    rewrite(&local_ref(&local_id), &url);
                    tracing::debug!(local_id = %local_id, url = %url, "Promoted media");
                    self.set_status(&local_id, AssetStatus::Uploaded { url: url.clone() });
                    report.promoted.push(PromotedAsset { local_id, url });
                }
                Err(e) => {
                    tracing::warn!(local_id = %local_id, file = %source.file_name, error = %e, "Media upload failed");
                    self.set_status(&local_id, AssetStatus::Failed {
                        error: e.to_string(),
                    });
                    report.failed.push(local_id);
                }
            }
        }
        report
    }

    /// Local ids referenced in `content` that have no staged asset.
    ///
    /// Staged media lives only as long as the session, so a draft reopened
    /// later can carry references nothing can resolve.
    #[must_use]
    pub fn unresolved_refs(&self, content: &str) -> Vec<String> {
        let assets = self.assets();
        let mut missing: Vec<String> = Vec::new();
        for (idx, _) in content.match_indices(LOCAL_SCHEME) {
            let rest = &content[idx + LOCAL_SCHEME.len()..];
            let end = rest
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
                .unwrap_or(rest.len());
            let id = &rest[..end];
            if !id.is_empty()
                && !assets.iter().any(|a| a.local_id == id)
                && !missing.iter().any(|m| m == id)
            {
                missing.push(id.to_owned());
            }
        }
        missing
    }

    /// Forget uploaded assets once the document referencing them is committed.
    pub fn clear_promoted(&self) {
        self.assets()
            .retain(|a| !matches!(a.status, AssetStatus::Uploaded { .. }));
    }

    /// Forget every staged asset.
    pub fn clear(&self) {
        self.assets().clear();
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use quill_media::MockUploader;

    use super::*;

    fn image(name: &str) -> MediaFile {
        MediaFile::new(name, name.as_bytes().to_vec())
    }

    fn staging(uploader: &Arc<MockUploader>) -> MediaStaging {
        MediaStaging::new(Arc::clone(uploader) as _)
    }

    #[test]
    fn test_folder_scope() {
        assert_eq!(folder_scope(&LifecycleState::New, "new_1700000000000"), "temp_1700000000000");
        assert_eq!(
            folder_scope(&LifecycleState::Draft("abc".to_owned()), "new_1"),
            "abc"
        );
        assert_eq!(
            folder_scope(&LifecycleState::Published("post_42".to_owned()), "new_1"),
            "42"
        );
    }

    #[tokio::test]
    async fn test_stage_makes_no_network_call() {
        let uploader = Arc::new(MockUploader::new());
        let staging = staging(&uploader);

        let reference = staging.stage(image("a.png"), "p:0");

        assert!(reference.starts_with("quill-local://temp-img-"));
        assert_eq!(uploader.upload_count(), 0);
        assert_eq!(staging.pending_count(), 1);
        let asset = &staging.snapshot()[0];
        assert_eq!(asset.status, AssetStatus::Pending);
        assert_eq!(asset.placement_marker, "p:0");
        assert_eq!(asset.local_ref(), reference);
    }

    #[test]
    fn test_preview_data_url() {
        let staging = MediaStaging::new(Arc::new(MockUploader::new()));
        let reference = staging.stage(MediaFile::new("a.png", b"hi".to_vec()), "");
        let local_id = reference.trim_start_matches(LOCAL_SCHEME);

        assert_eq!(
            staging.preview_data_url(local_id).unwrap(),
            "data:image/png;base64,aGk="
        );
        assert!(staging.preview_data_url("missing").is_none());
    }

    #[tokio::test]
    async fn test_promote_continues_past_failure() {
        let uploader = Arc::new(MockUploader::new().failing_on("b.png"));
        let staging = staging(&uploader);
        let refs: Vec<String> = ["a.png", "b.png", "c.png"]
            .into_iter()
            .map(|n| staging.stage(image(n), ""))
            .collect();
        let mut rewrites = Vec::new();

        let report = staging
            .promote("blog/post/d1", Duration::from_secs(5), |from, to| {
                rewrites.push((from.to_owned(), to.to_owned()));
            })
            .await;

        assert_eq!(uploader.upload_count(), 3);
        assert_eq!(report.promoted.len(), 2);
        let failed_id = refs[1].trim_start_matches(LOCAL_SCHEME).to_owned();
        assert_eq!(report.failed, vec![failed_id.clone()]);
        assert!(!report.is_complete());
        assert!(matches!(
            staging.status(&failed_id),
            Some(AssetStatus::Failed { .. })
        ));
        assert_eq!(
            rewrites,
            vec![
                (refs[0].clone(), "https://media.test/blog/post/d1/a.png".to_owned()),
                (refs[2].clone(), "https://media.test/blog/post/d1/c.png".to_owned()),
            ]
        );
    }

    #[tokio::test]
    async fn test_promote_skips_uploaded_on_retry() {
        let uploader = Arc::new(MockUploader::new().failing_on("b.png"));
        let staging = staging(&uploader);
        staging.stage(image("a.png"), "");
        staging.stage(image("b.png"), "");
        staging.promote("f", Duration::from_secs(5), |_, _| {}).await;
        uploader.recover("b.png");

        let report = staging.promote("f", Duration::from_secs(5), |_, _| {}).await;

        assert_eq!(report.promoted.len(), 1);
        assert!(report.is_complete());
        let names: Vec<_> = uploader.uploads().into_iter().map(|c| c.file_name).collect();
        assert_eq!(names, vec!["a.png", "b.png", "b.png"]);
        assert_eq!(staging.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_promote_times_out_slow_upload() {
        let uploader = Arc::new(MockUploader::new().with_delay(Duration::from_secs(60)));
        let staging = staging(&uploader);
        staging.stage(image("slow.png"), "");

        let report = staging.promote("f", Duration::from_secs(1), |_, _| {}).await;

        assert_eq!(report.failed.len(), 1);
        let asset = &staging.snapshot()[0];
        assert!(matches!(&asset.status, AssetStatus::Failed { error } if error.contains("timed out")));
    }

    #[tokio::test]
    async fn test_clear_promoted_keeps_failed() {
        let uploader = Arc::new(MockUploader::new().failing_on("b.png"));
        let staging = staging(&uploader);
        staging.stage(image("a.png"), "");
        staging.stage(image("b.png"), "");
        staging.promote("f", Duration::from_secs(5), |_, _| {}).await;

        staging.clear_promoted();

        let left = staging.snapshot();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].source.file_name, "b.png");

        staging.clear();
        assert!(staging.is_empty());
    }

    #[test]
    fn test_unresolved_refs() {
        let staging = MediaStaging::new(Arc::new(MockUploader::new()));
        let known = staging.stage(image("a.png"), "");
        let content = format!(
            r#"<img src="{known}"><img src="quill-local://temp-img-gone"><img src="quill-local://temp-img-gone">"#
        );

        assert_eq!(staging.unresolved_refs(&content), vec!["temp-img-gone".to_owned()]);
    }
}
