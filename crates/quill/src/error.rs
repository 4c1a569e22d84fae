//! CLI error types.

use quill_config::ConfigError;
use quill_editor::SessionError;
use quill_media::UploadError;
use quill_store::StoreError;

/// CLI error type.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Session(#[from] SessionError),

    #[error("{0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Upload(#[from] UploadError),

    #[error("{0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Validation(String),
}
