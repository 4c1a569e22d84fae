//! Configuration management for Quill.
//!
//! Parses `quill.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! String configuration values support environment variable expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//!
//! Expanded fields:
//! - `media.base_url`
//! - `media.s3.bucket`
//! - `media.s3.region`
//! - `media.s3.endpoint`
//! - `media.s3.public_url`
//! - `media.s3.bucket_root_path`

mod expand;

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override document store directory.
    pub store_dir: Option<PathBuf>,
    /// Override media backend.
    pub media_backend: Option<MediaBackend>,
    /// Override media directory (dir backend).
    pub media_dir: Option<PathBuf>,
    /// Override autosave enabled flag.
    pub autosave_enabled: Option<bool>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "quill.toml";

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Document store configuration (paths are relative strings from TOML).
    store: StoreConfigRaw,
    /// Autosave scheduling.
    pub autosave: AutosaveConfig,
    /// Media staging and upload.
    pub media: MediaConfig,
    /// Publish behavior.
    pub publish: PublishConfig,

    /// Resolved store configuration (set after loading).
    #[serde(skip)]
    pub store_resolved: StoreConfig,
    /// Resolved media directory for the dir backend (set after loading).
    #[serde(skip)]
    pub media_dir: PathBuf,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// Raw store configuration as parsed from TOML (paths as strings).
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct StoreConfigRaw {
    dir: Option<String>,
    timeout_ms: Option<u64>,
}

/// Resolved document store configuration with absolute paths.
#[derive(Debug, Default)]
pub struct StoreConfig {
    /// Root directory of the JSON document store.
    pub dir: PathBuf,
    /// Bound on each store call.
    pub timeout: Duration,
}

/// Default bound on each store call.
const DEFAULT_STORE_TIMEOUT_MS: u64 = 10_000;

/// Autosave configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AutosaveConfig {
    /// Whether background autosave runs at all.
    pub enabled: bool,
    /// Quiet period after the last edit before a save fires.
    pub debounce_ms: u64,
    /// Period of the fallback save timer.
    pub interval_ms: u64,
    /// Consecutive background failures tolerated before backing off.
    pub max_failures: u32,
    /// First backoff delay once `max_failures` is reached.
    pub backoff_initial_ms: u64,
    /// Upper bound on the backoff delay.
    pub backoff_max_ms: u64,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce_ms: 1500,
            interval_ms: 5000,
            max_failures: 5,
            backoff_initial_ms: 10_000,
            backoff_max_ms: 300_000,
        }
    }
}

impl AutosaveConfig {
    #[must_use]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    #[must_use]
    pub fn backoff_initial(&self) -> Duration {
        Duration::from_millis(self.backoff_initial_ms)
    }

    #[must_use]
    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }
}

/// Where promoted media is uploaded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaBackend {
    /// Copy into a local directory.
    #[default]
    Dir,
    /// Put into an S3 bucket.
    S3,
}

impl std::str::FromStr for MediaBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dir" => Ok(Self::Dir),
            "s3" => Ok(Self::S3),
            other => Err(ConfigError::Validation(format!(
                "unknown media backend '{other}' (expected 'dir' or 's3')"
            ))),
        }
    }
}

/// Media configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Upload backend.
    pub backend: MediaBackend,
    /// Folder prefix for every upload; the document scope is appended.
    pub folder_root: String,
    /// Bound on each upload.
    pub timeout_ms: u64,
    /// Directory for the dir backend, relative to the config file.
    dir: Option<String>,
    /// Public base URL the dir backend serves files from.
    pub base_url: Option<String>,
    /// With the s3 backend, fall back to the dir backend when S3 fails.
    pub fallback_dir: bool,
    /// S3 settings, required when `backend = "s3"`.
    pub s3: Option<S3Config>,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            backend: MediaBackend::Dir,
            folder_root: "blog/post".to_owned(),
            timeout_ms: 30_000,
            dir: None,
            base_url: None,
            fallback_dir: false,
            s3: None,
        }
    }
}

impl MediaConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// S3 media configuration.
#[derive(Debug, Deserialize)]
pub struct S3Config {
    /// Bucket name.
    pub bucket: String,
    /// AWS region.
    #[serde(default = "default_region")]
    pub region: String,
    /// S3-compatible endpoint URL.
    pub endpoint: Option<String>,
    /// Public base URL objects are served from.
    pub public_url: Option<String>,
    /// Optional prefix path within the bucket.
    pub bucket_root_path: Option<String>,
}

fn default_region() -> String {
    "us-east-1".to_owned()
}

impl S3Config {
    /// Validate that all required fields are properly set.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any field is empty or has invalid format.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_non_empty(&self.bucket, "media.s3.bucket")?;
        require_non_empty(&self.region, "media.s3.region")?;
        if let Some(endpoint) = &self.endpoint {
            require_http_url(endpoint, "media.s3.endpoint")?;
        }
        if let Some(public_url) = &self.public_url {
            require_http_url(public_url, "media.s3.public_url")?;
        }
        Ok(())
    }
}

/// Publish configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    /// Publish even when some staged media failed to upload.
    pub allow_partial_media: bool,
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`media.s3.bucket`").
        field: String,
        /// Error message (e.g., "${`QUILL_BUCKET`} not set").
        message: String,
    },
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

/// Require a URL field to use http:// or https:// scheme.
fn require_http_url(url: &str, field: &str) -> Result<(), ConfigError> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::Validation(format!(
            "{field} must start with http:// or https://"
        )));
    }
    Ok(())
}

/// Require a duration field to be non-zero.
fn require_positive(value: u64, field: &str) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::Validation(format!(
            "{field} must be greater than 0"
        )));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `quill.toml` in current directory and parents.
    ///
    /// CLI settings are applied after loading and path resolution, allowing CLI
    /// arguments to take precedence over config file values.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing fails,
    /// or the effective configuration is invalid.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default_with_cwd()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
            // A backend switch on the command line must still be complete.
            config.validate()?;
        }

        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(store_dir) = &settings.store_dir {
            self.store_resolved.dir.clone_from(store_dir);
        }
        if let Some(backend) = settings.media_backend {
            self.media.backend = backend;
        }
        if let Some(media_dir) = &settings.media_dir {
            self.media_dir.clone_from(media_dir);
        }
        if let Some(enabled) = settings.autosave_enabled {
            self.autosave.enabled = enabled;
        }
    }

    /// Get validated S3 configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if the `[media.s3]` section is missing or invalid.
    pub fn require_s3(&self) -> Result<&S3Config, ConfigError> {
        let s3 = self.media.s3.as_ref().ok_or_else(|| {
            ConfigError::Validation("[media.s3] section required for the s3 backend".into())
        })?;
        s3.validate()?;
        Ok(s3)
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;
        Self::discover_from(&current)
    }

    /// Search for config file in `start` and its parents.
    fn discover_from(start: &Path) -> Option<PathBuf> {
        let mut current = start.to_path_buf();
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Create default config with paths relative to current working directory.
    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    /// Create default config with paths relative to given base directory.
    fn default_with_base(base: &Path) -> Self {
        Self {
            store: StoreConfigRaw::default(),
            autosave: AutosaveConfig::default(),
            media: MediaConfig::default(),
            publish: PublishConfig::default(),
            store_resolved: StoreConfig {
                dir: base.join(".quill/store"),
                timeout: Duration::from_millis(DEFAULT_STORE_TIMEOUT_MS),
            },
            media_dir: base.join(".quill/media"),
            config_path: None,
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        // Expand environment variables before path resolution
        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir);
        config.config_path = Some(path.to_path_buf());

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// Called automatically after loading from file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_store()?;
        self.validate_autosave()?;
        self.validate_media()?;
        Ok(())
    }

    fn validate_store(&self) -> Result<(), ConfigError> {
        if self.store_resolved.timeout.is_zero() {
            return Err(ConfigError::Validation(
                "store.timeout_ms must be greater than 0".to_owned(),
            ));
        }
        Ok(())
    }

    fn validate_autosave(&self) -> Result<(), ConfigError> {
        let autosave = &self.autosave;
        require_positive(autosave.debounce_ms, "autosave.debounce_ms")?;
        require_positive(autosave.interval_ms, "autosave.interval_ms")?;
        require_positive(autosave.backoff_initial_ms, "autosave.backoff_initial_ms")?;
        if autosave.max_failures == 0 {
            return Err(ConfigError::Validation(
                "autosave.max_failures must be greater than 0".to_owned(),
            ));
        }
        if autosave.backoff_max_ms < autosave.backoff_initial_ms {
            return Err(ConfigError::Validation(
                "autosave.backoff_max_ms cannot be less than autosave.backoff_initial_ms"
                    .to_owned(),
            ));
        }
        Ok(())
    }

    fn validate_media(&self) -> Result<(), ConfigError> {
        let media = &self.media;
        require_positive(media.timeout_ms, "media.timeout_ms")?;

        let root = media.folder_root.as_str();
        require_non_empty(root, "media.folder_root")?;
        if root.starts_with('/')
            || root.ends_with('/')
            || root.split('/').any(|seg| seg.is_empty() || seg == "..")
        {
            return Err(ConfigError::Validation(
                "media.folder_root must be a relative path like \"blog/post\"".to_owned(),
            ));
        }

        if let Some(base_url) = &media.base_url {
            require_http_url(base_url, "media.base_url")?;
        }

        match media.backend {
            MediaBackend::S3 => {
                self.require_s3()?;
            }
            MediaBackend::Dir => {
                if let Some(s3) = &media.s3 {
                    s3.validate()?;
                }
            }
        }

        Ok(())
    }

    /// Expand environment variable references in configuration strings.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        expand::expand_opt(&mut self.media.base_url, "media.base_url")?;

        if let Some(ref mut s3) = self.media.s3 {
            s3.bucket = expand::expand_env(&s3.bucket, "media.s3.bucket")?;
            s3.region = expand::expand_env(&s3.region, "media.s3.region")?;
            expand::expand_opt(&mut s3.endpoint, "media.s3.endpoint")?;
            expand::expand_opt(&mut s3.public_url, "media.s3.public_url")?;
            expand::expand_opt(&mut s3.bucket_root_path, "media.s3.bucket_root_path")?;
        }

        Ok(())
    }

    /// Resolve relative paths to absolute paths based on config directory.
    fn resolve_paths(&mut self, config_dir: &Path) {
        let resolve = |path: Option<&str>, default: &str| config_dir.join(path.unwrap_or(default));

        self.store_resolved = StoreConfig {
            dir: resolve(self.store.dir.as_deref(), ".quill/store"),
            timeout: Duration::from_millis(
                self.store.timeout_ms.unwrap_or(DEFAULT_STORE_TIMEOUT_MS),
            ),
        };
        self.media_dir = resolve(self.media.dir.as_deref(), ".quill/media");
    }
}
