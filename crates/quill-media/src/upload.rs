//! Upload service trait and media types.

use std::error::Error;
use std::fmt;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

/// Broad media category, derived from the content type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaKind {
    /// Still image. Staged locally and uploaded at publish time.
    Image,
    /// Video. Uploaded as soon as it is inserted.
    Video,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image => f.write_str("image"),
            Self::Video => f.write_str("video"),
        }
    }
}

/// Media file selected for embedding in a document.
///
/// The bytes are shared, so cloning a `MediaFile` is cheap.
#[derive(Clone, PartialEq, Eq)]
pub struct MediaFile {
    /// Original file name.
    pub file_name: String,
    /// MIME content type.
    pub content_type: String,
    /// File contents.
    pub data: Arc<[u8]>,
}

impl MediaFile {
    /// Create a media file, guessing the content type from the file name.
    #[must_use]
    pub fn new(file_name: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        let file_name = file_name.into();
        let content_type = guess_content_type(&file_name);
        Self {
            file_name,
            content_type,
            data: data.into(),
        }
    }

    /// Create a media file with an explicit content type.
    #[must_use]
    pub fn with_content_type(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Arc<[u8]>>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            data: data.into(),
        }
    }

    /// Read a media file from disk.
    pub async fn from_path(path: &Path) -> Result<Self, UploadError> {
        let data = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_owned());
        Ok(Self::new(file_name, data))
    }

    /// Media category, or `None` if the content type is neither image nor video.
    #[must_use]
    pub fn kind(&self) -> Option<MediaKind> {
        if self.content_type.starts_with("image/") {
            Some(MediaKind::Image)
        } else if self.content_type.starts_with("video/") {
            Some(MediaKind::Video)
        } else {
            None
        }
    }

    /// Size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the file has no contents.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Check that the file can be embedded at all.
    pub fn validate(&self) -> Result<MediaKind, UploadError> {
        if self.is_empty() {
            return Err(UploadError::Rejected(format!(
                "{} is empty",
                self.file_name
            )));
        }
        self.kind().ok_or_else(|| {
            UploadError::Rejected(format!(
                "{} has unsupported type {}",
                self.file_name, self.content_type
            ))
        })
    }

    /// File name reduced to characters safe for object keys and paths.
    #[must_use]
    pub fn safe_name(&self) -> String {
        let name: String = self
            .file_name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        let name = name.trim_start_matches('.');
        if name.is_empty() {
            "upload".to_owned()
        } else {
            name.to_owned()
        }
    }
}

impl fmt::Debug for MediaFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaFile")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.data.len())
            .finish()
    }
}

/// Error returned by upload backends.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("S3 error: {0}")]
    S3(String),
    #[error("Upload timed out after {0:?}")]
    Timeout(Duration),
    #[error("Upload rejected: {0}")]
    Rejected(String),
    #[error("Upload service unavailable: {0}")]
    Unavailable(String),
    #[error("Invalid folder: {0}")]
    InvalidFolder(String),
}

/// Remote media hosting.
///
/// Implementations store the bytes under `folder` and return the public URL
/// the document should reference.
#[async_trait]
pub trait UploadService: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Upload `media` into `folder` and return its remote URL.
    async fn upload(&self, media: &MediaFile, folder: &str) -> Result<String, UploadError>;
}

/// Reject folders that are empty, absolute, or contain `..` segments.
pub(crate) fn validate_folder(folder: &str) -> Result<(), UploadError> {
    let bad = folder.is_empty()
        || folder.starts_with('/')
        || folder.split('/').any(|seg| seg.is_empty() || seg == "..");
    if bad {
        return Err(UploadError::InvalidFolder(folder.to_owned()));
    }
    Ok(())
}

/// Walk the error source chain and join all messages.
pub(crate) fn error_chain(err: &dyn Error) -> String {
    let mut msgs = vec![err.to_string()];
    let mut source = err.source();
    while let Some(s) = source {
        msgs.push(s.to_string());
        source = s.source();
    }
    msgs.join(": ")
}

/// Guess a MIME type from a file name's extension.
#[must_use]
pub fn guess_content_type(file_name: &str) -> String {
    mime_guess::from_path(file_name)
        .first_or_octet_stream()
        .essence_str()
        .to_owned()
}
