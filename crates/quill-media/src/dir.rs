//! Local directory media uploads.

use std::path::PathBuf;

use async_trait::async_trait;
use uuid::Uuid;

use crate::upload::{MediaFile, UploadError, UploadService, validate_folder};

/// Copies media into a local directory tree.
///
/// Useful when a static file server (or a CDN syncing the directory) serves
/// the media root. Without a `base_url`, returned URLs are `file://` URLs.
#[derive(Clone, Debug)]
pub struct DirUploader {
    root: PathBuf,
    base_url: Option<String>,
}

impl DirUploader {
    /// Create an uploader writing under `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            base_url: None,
        }
    }

    /// Serve uploaded files from `base_url` instead of `file://` paths.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }
}

#[async_trait]
impl UploadService for DirUploader {
    fn name(&self) -> &'static str {
        "dir"
    }

    async fn upload(&self, media: &MediaFile, folder: &str) -> Result<String, UploadError> {
        validate_folder(folder)?;
        let object_name = format!("{}-{}", Uuid::new_v4().simple(), media.safe_name());

        let dir = self.root.join(folder);
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(&object_name);
        tokio::fs::write(&path, &media.data).await?;

        tracing::debug!(path = %path.display(), bytes = media.len(), "Stored media");

        let url = match &self.base_url {
            Some(base) => format!("{}/{folder}/{object_name}", base.trim_end_matches('/')),
            None => {
                let abs = std::path::absolute(&path)?;
                format!("file://{}", abs.to_string_lossy().replace('\\', "/"))
            }
        };
        Ok(url)
    }
}
