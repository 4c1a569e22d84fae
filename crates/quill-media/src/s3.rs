//! S3 media uploads.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use tokio::sync::OnceCell;
use uuid::Uuid;

use crate::upload::{MediaFile, UploadError, UploadService, error_chain, validate_folder};

/// Configuration for S3 uploads.
#[derive(Clone, Debug)]
pub struct S3UploadConfig {
    /// S3 bucket name.
    pub bucket: String,
    /// AWS region.
    pub region: String,
    /// S3-compatible endpoint URL.
    pub endpoint: Option<String>,
    /// Optional prefix path within the bucket.
    pub bucket_root_path: Option<String>,
    /// Public base URL objects are served from.
    pub public_url: Option<String>,
}

/// Uploads media objects to an S3 bucket.
///
/// The SDK client is built on first upload and reused afterwards.
pub struct S3Uploader {
    config: S3UploadConfig,
    client: OnceCell<Client>,
}

impl S3Uploader {
    /// Create a new uploader with the given configuration.
    #[must_use]
    pub fn new(config: S3UploadConfig) -> Self {
        Self {
            config,
            client: OnceCell::new(),
        }
    }

    async fn client(&self) -> &Client {
        self.client.get_or_init(|| self.build_client()).await
    }

    async fn build_client(&self) -> Client {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(self.config.region.clone()));

        if let Some(endpoint) = &self.config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }

        let sdk_config = loader.load().await;

        // Custom endpoints (LocalStack, MinIO) need path-style addressing.
        if self.config.endpoint.is_some() {
            let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
                .force_path_style(true)
                .build();
            return Client::from_conf(s3_config);
        }

        Client::new(&sdk_config)
    }

    fn build_key(&self, folder: &str, object_name: &str) -> String {
        let mut parts = Vec::new();
        if let Some(root) = &self.config.bucket_root_path {
            parts.push(root.trim_matches('/'));
        }
        parts.push(folder);
        parts.push(object_name);
        parts.join("/")
    }

    fn public_url(&self, key: &str) -> String {
        match (&self.config.public_url, &self.config.endpoint) {
            (Some(base), _) => format!("{}/{key}", base.trim_end_matches('/')),
            (None, Some(endpoint)) => format!(
                "{}/{}/{key}",
                endpoint.trim_end_matches('/'),
                self.config.bucket
            ),
            (None, None) => format!(
                "https://{}.s3.{}.amazonaws.com/{key}",
                self.config.bucket, self.config.region
            ),
        }
    }
}

#[async_trait]
impl UploadService for S3Uploader {
    fn name(&self) -> &'static str {
        "s3"
    }

    async fn upload(&self, media: &MediaFile, folder: &str) -> Result<String, UploadError> {
        validate_folder(folder)?;
        let object_name = format!("{}-{}", Uuid::new_v4().simple(), media.safe_name());
        let key = self.build_key(folder, &object_name);

        self.client()
            .await
            .put_object()
            .bucket(&self.config.bucket)
            .key(&key)
            .body(media.data.to_vec().into())
            .content_type(&media.content_type)
            .send()
            .await
            .map_err(|e| UploadError::S3(error_chain(&e)))?;

        tracing::debug!(key = %key, bytes = media.len(), "Uploaded");
        Ok(self.public_url(&key))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn config() -> S3UploadConfig {
        S3UploadConfig {
            bucket: "media".to_owned(),
            region: "us-east-1".to_owned(),
            endpoint: None,
            bucket_root_path: None,
            public_url: None,
        }
    }

    #[test]
    fn test_build_key_simple() {
        let uploader = S3Uploader::new(config());

        assert_eq!(
            uploader.build_key("blog/post/abc", "x-photo.png"),
            "blog/post/abc/x-photo.png"
        );
    }

    #[test]
    fn test_build_key_with_root_path() {
        let uploader = S3Uploader::new(S3UploadConfig {
            bucket_root_path: Some("/quill/".to_owned()),
            ..config()
        });

        assert_eq!(
            uploader.build_key("blog/post/abc", "x.png"),
            "quill/blog/post/abc/x.png"
        );
    }

    #[test]
    fn test_public_url_default_virtual_host() {
        let uploader = S3Uploader::new(config());

        assert_eq!(
            uploader.public_url("blog/x.png"),
            "https://media.s3.us-east-1.amazonaws.com/blog/x.png"
        );
    }

    #[test]
    fn test_public_url_custom_endpoint_path_style() {
        let uploader = S3Uploader::new(S3UploadConfig {
            endpoint: Some("http://localhost:9000/".to_owned()),
            ..config()
        });

        assert_eq!(
            uploader.public_url("blog/x.png"),
            "http://localhost:9000/media/blog/x.png"
        );
    }

    #[test]
    fn test_public_url_explicit_base_wins() {
        let uploader = S3Uploader::new(S3UploadConfig {
            endpoint: Some("http://localhost:9000".to_owned()),
            public_url: Some("https://cdn.example.com/".to_owned()),
            ..config()
        });

        assert_eq!(
            uploader.public_url("blog/x.png"),
            "https://cdn.example.com/blog/x.png"
        );
    }

    #[tokio::test]
    async fn test_upload_rejects_bad_folder_before_network() {
        let uploader = S3Uploader::new(config());
        let media = MediaFile::new("a.png", vec![1u8]);

        let err = uploader.upload(&media, "../escape").await.unwrap_err();

        assert!(matches!(err, UploadError::InvalidFolder(_)));
    }
}
