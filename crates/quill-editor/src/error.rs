//! Error type for editor session operations.

use quill_media::UploadError;
use quill_store::{Collection, StoreError};

/// Error returned by explicit session actions.
///
/// Background autosave never surfaces these; it logs and retries on the
/// next trigger instead.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Document failed a precondition (e.g. publishing empty content).
    #[error("Validation failed: {0}")]
    Validation(String),
    /// No connectivity.
    #[error("Offline: the action needs a network connection")]
    Offline,
    /// A single media upload failed.
    #[error("Upload failed: {0}")]
    Upload(#[from] UploadError),
    /// Staged media could not be promoted. Lists the failed local ids.
    #[error("{} media item(s) failed to upload: {}", failed.len(), failed.join(", "))]
    Media {
        /// Local ids of assets that failed or are missing.
        failed: Vec<String>,
    },
    /// Document store failure.
    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),
    /// Requested document does not exist.
    #[error("{collection} record not found: {id}")]
    NotFound {
        /// Collection that was searched.
        collection: Collection,
        /// Requested id.
        id: String,
    },
    /// A publish is already running for this session.
    #[error("A publish is already in progress")]
    PublishInProgress,
    /// Both a post and a draft were requested.
    #[error("Invalid selection: {0}")]
    InvalidSelection(String),
}

impl SessionError {
    /// Returns `true` if retrying the same action may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Offline | Self::Upload(_) | Self::Media { .. } | Self::PublishInProgress => true,
            Self::Persistence(e) => e.is_retryable(),
            Self::Validation(_) | Self::NotFound { .. } | Self::InvalidSelection(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use quill_store::StoreErrorKind;

    use super::*;

    #[test]
    fn test_media_error_lists_ids() {
        let err = SessionError::Media {
            failed: vec!["temp-img-a".to_owned(), "temp-img-b".to_owned()],
        };

        assert_eq!(
            err.to_string(),
            "2 media item(s) failed to upload: temp-img-a, temp-img-b"
        );
    }

    #[test]
    fn test_not_found_display() {
        let err = SessionError::NotFound {
            collection: Collection::Posts,
            id: "p1".to_owned(),
        };

        assert_eq!(err.to_string(), "posts record not found: p1");
    }

    #[test]
    fn test_persistence_retry_follows_store_status() {
        let timeout = SessionError::from(StoreError::timeout());
        let corrupt = SessionError::from(StoreError::new(StoreErrorKind::Serialization));

        assert!(timeout.is_retryable());
        assert!(!corrupt.is_retryable());
        assert!(!SessionError::Validation("empty".to_owned()).is_retryable());
    }
}
