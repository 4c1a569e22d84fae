//! Media upload backends for Quill.
//!
//! This crate provides the [`UploadService`] trait the editor uses to move
//! locally staged media to remote hosting, plus concrete backends:
//!
//! - [`S3Uploader`] puts objects into an S3 (or S3-compatible) bucket
//! - [`DirUploader`] copies files into a local directory tree
//! - [`FallbackUploader`] chains two uploaders, trying the second when the first fails
//! - [`MockUploader`] for testing (behind `mock` feature flag)

mod dir;
mod fallback;
#[cfg(feature = "mock")]
mod mock;
mod s3;
mod upload;

pub use dir::DirUploader;
pub use fallback::FallbackUploader;
#[cfg(feature = "mock")]
pub use mock::{MockUploader, UploadCall};
pub use s3::{S3UploadConfig, S3Uploader};
pub use upload::{MediaFile, MediaKind, UploadError, UploadService, guess_content_type};
