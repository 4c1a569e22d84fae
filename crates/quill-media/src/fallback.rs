//! Primary/fallback upload chaining.

use std::sync::Arc;

use async_trait::async_trait;

use crate::upload::{MediaFile, UploadError, UploadService};

/// Tries a primary uploader and falls back to a secondary one on failure.
///
/// Rejections (empty or unsupported media, invalid folders) are returned
/// from the primary directly since the fallback would refuse them too.
pub struct FallbackUploader {
    primary: Arc<dyn UploadService>,
    fallback: Arc<dyn UploadService>,
}

impl FallbackUploader {
    /// Chain `primary` with `fallback`.
    #[must_use]
    pub fn new(primary: Arc<dyn UploadService>, fallback: Arc<dyn UploadService>) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl UploadService for FallbackUploader {
    fn name(&self) -> &'static str {
        "fallback"
    }

    async fn upload(&self, media: &MediaFile, folder: &str) -> Result<String, UploadError> {
        match self.primary.upload(media, folder).await {
            Ok(url) => Ok(url),
            Err(e @ (UploadError::Rejected(_) | UploadError::InvalidFolder(_))) => Err(e),
            Err(e) => {
                tracing::warn!(
                    primary = self.primary.name(),
                    fallback = self.fallback.name(),
                    file = %media.file_name,
                    error = %e,
                    "Primary upload failed, trying fallback"
                );
                self.fallback.upload(media, folder).await
            }
        }
    }
}

#[cfg(all(test, feature = "mock"))]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::MockUploader;

    use super::*;

    #[tokio::test]
    async fn test_primary_success_skips_fallback() {
        let primary = Arc::new(MockUploader::new());
        let fallback = Arc::new(MockUploader::with_base_url("https://backup.test"));
        let uploader =
            FallbackUploader::new(Arc::clone(&primary) as _, Arc::clone(&fallback) as _);

        let url = uploader
            .upload(&MediaFile::new("a.png", vec![1u8]), "blog/post/p1")
            .await
            .unwrap();

        assert_eq!(url, "https://media.test/blog/post/p1/a.png");
        assert_eq!(fallback.upload_count(), 0);
    }

    #[tokio::test]
    async fn test_primary_failure_uses_fallback() {
        let primary = Arc::new(MockUploader::new());
        primary.set_unavailable(true);
        let fallback = Arc::new(MockUploader::with_base_url("https://backup.test"));
        let uploader =
            FallbackUploader::new(Arc::clone(&primary) as _, Arc::clone(&fallback) as _);

        let url = uploader
            .upload(&MediaFile::new("a.png", vec![1u8]), "blog/post/p1")
            .await
            .unwrap();

        assert_eq!(url, "https://backup.test/blog/post/p1/a.png");
        assert_eq!(primary.upload_count(), 1);
        assert_eq!(fallback.upload_count(), 1);
    }

    #[tokio::test]
    async fn test_rejection_not_retried_on_fallback() {
        let primary = Arc::new(MockUploader::new());
        let fallback = Arc::new(MockUploader::new());
        let uploader =
            FallbackUploader::new(Arc::clone(&primary) as _, Arc::clone(&fallback) as _);

        let err = uploader
            .upload(&MediaFile::new("a.png", Vec::<u8>::new()), "f")
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::Rejected(_)));
        assert_eq!(fallback.upload_count(), 0);
    }
}
