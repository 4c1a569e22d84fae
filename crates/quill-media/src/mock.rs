//! Mock uploader for testing.

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::upload::{MediaFile, UploadError, UploadService, validate_folder};

/// A recorded upload attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadCall {
    /// File name of the uploaded media.
    pub file_name: String,
    /// Target folder.
    pub folder: String,
}

/// Mock uploader for testing.
///
/// Returns deterministic URLs of the form `<base_url>/<folder>/<file_name>`
/// and records every attempt.
///
/// # Example
///
/// ```ignore
/// use quill_media::{MediaFile, MockUploader, UploadService};
///
/// let uploader = MockUploader::new().failing_on("broken.png");
/// let url = uploader.upload(&MediaFile::new("ok.png", bytes), "blog/post/p1").await?;
/// assert_eq!(url, "https://media.test/blog/post/p1/ok.png");
/// ```
#[derive(Debug)]
pub struct MockUploader {
    base_url: String,
    failing: Mutex<HashSet<String>>,
    unavailable: AtomicBool,
    delay: Mutex<Duration>,
    calls: Mutex<Vec<UploadCall>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl Default for MockUploader {
    fn default() -> Self {
        Self::with_base_url("https://media.test")
    }
}

impl MockUploader {
    /// Create a mock uploader serving from `https://media.test`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock uploader serving from `base_url`.
    #[must_use]
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            failing: Mutex::new(HashSet::new()),
            unavailable: AtomicBool::new(false),
            delay: Mutex::new(Duration::ZERO),
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Fail every upload of a file named `file_name`.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn failing_on(self, file_name: impl Into<String>) -> Self {
        self.fail_on(file_name);
        self
    }

    /// Fail every upload of a file named `file_name`.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn fail_on(&self, file_name: impl Into<String>) {
        self.failing.lock().unwrap().insert(file_name.into());
    }

    /// Stop failing uploads of `file_name`.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn recover(&self, file_name: &str) {
        self.failing.lock().unwrap().remove(file_name);
    }

    /// Fail every upload while `unavailable` is set.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Delay every upload by `delay`.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn with_delay(self, delay: Duration) -> Self {
        *self.delay.lock().unwrap() = delay;
        self
    }

    /// Every upload attempt so far, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn uploads(&self) -> Vec<UploadCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of upload attempts so far.
    #[must_use]
    pub fn upload_count(&self) -> usize {
        self.uploads().len()
    }

    /// Highest number of uploads observed in flight at the same time.
    #[must_use]
    pub fn max_concurrent_uploads(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UploadService for MockUploader {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn upload(&self, media: &MediaFile, folder: &str) -> Result<String, UploadError> {
        self.calls.lock().unwrap().push(UploadCall {
            file_name: media.file_name.clone(),
            folder: folder.to_owned(),
        });
        media.validate()?;
        validate_folder(folder)?;

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.unavailable.load(Ordering::SeqCst) {
            return Err(UploadError::Unavailable(format!("{} is down", self.base_url)));
        }
        if self.failing.lock().unwrap().contains(&media.file_name) {
            return Err(UploadError::Unavailable(format!(
                "{} refused {}",
                self.base_url, media.file_name
            )));
        }

        Ok(format!("{}/{folder}/{}", self.base_url, media.file_name))
    }
}
