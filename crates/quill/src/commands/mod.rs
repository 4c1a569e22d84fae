//! CLI command implementations.

pub(crate) mod compose;
pub(crate) mod list;
pub(crate) mod publish;
pub(crate) mod save;
pub(crate) mod show;
pub(crate) mod sweep;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use quill_config::{CliSettings, Config, MediaBackend};
use quill_editor::{
    ConnectivityMonitor, Document, EditorSession, SchedulerConfig, Selection, SessionConfig,
    SessionDeps, media_html,
};
use quill_media::{
    DirUploader, FallbackUploader, MediaFile, S3UploadConfig, S3Uploader, UploadService,
};
use quill_store::{DocumentStore, FsStore};

use crate::error::CliError;
use crate::output::Output;

pub(crate) use compose::ComposeArgs;
pub(crate) use list::ListArgs;
pub(crate) use publish::PublishArgs;
pub(crate) use save::SaveArgs;
pub(crate) use show::ShowArgs;
pub(crate) use sweep::SweepArgs;

/// Options shared by every command.
#[derive(Args)]
pub(crate) struct GlobalArgs {
    /// Path to configuration file (default: auto-discover quill.toml).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Document store directory (overrides config).
    #[arg(long, global = true)]
    store_dir: Option<PathBuf>,

    /// Media backend, "dir" or "s3" (overrides config).
    #[arg(long, global = true)]
    media_backend: Option<MediaBackend>,

    /// Media directory for the dir backend (overrides config).
    #[arg(long, global = true)]
    media_dir: Option<PathBuf>,

    /// Enable verbose output (save and upload logs).
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl GlobalArgs {
    /// Load configuration with CLI overrides applied.
    ///
    /// `autosave` overrides the config file; one-shot commands disable it.
    pub(crate) fn load_config(&self, autosave: Option<bool>) -> Result<Config, CliError> {
        let cli_settings = CliSettings {
            store_dir: self.store_dir.clone(),
            media_backend: self.media_backend,
            media_dir: self.media_dir.clone(),
            autosave_enabled: autosave,
        };
        Ok(Config::load(self.config.as_deref(), Some(&cli_settings))?)
    }
}

/// Which document to open.
#[derive(Args)]
pub(crate) struct TargetArgs {
    /// Open an existing draft.
    #[arg(long, conflicts_with = "post")]
    draft: Option<String>,

    /// Open a published post.
    #[arg(long)]
    post: Option<String>,
}

impl TargetArgs {
    pub(crate) fn selection(&self) -> Result<Selection, CliError> {
        Ok(Selection::from_params(self.post.clone(), self.draft.clone())?)
    }
}

/// Edits applied to the opened document.
#[derive(Args)]
pub(crate) struct EditArgs {
    /// New title.
    #[arg(long)]
    title: Option<String>,

    /// New description.
    #[arg(long)]
    description: Option<String>,

    /// Replace the content with this file's HTML.
    #[arg(long)]
    content_file: Option<PathBuf>,

    /// Media files to append to the content (images are staged until publish).
    #[arg(long, num_args = 1..)]
    media: Vec<PathBuf>,
}

impl EditArgs {
    /// Apply the edits in order: fields, content, then media.
    pub(crate) async fn apply(
        &self,
        session: &EditorSession,
        output: &Output,
    ) -> Result<(), CliError> {
        if let Some(title) = &self.title {
            session.set_title(title.clone());
        }
        if let Some(description) = &self.description {
            session.set_description(description.clone());
        }
        if let Some(path) = &self.content_file {
            let content = std::fs::read_to_string(path)?;
            session.set_content(content);
        }
        for path in &self.media {
            let file = MediaFile::from_path(path).await?;
            let inserted = session
                .insert_media(file, path.display().to_string())
                .await?;
            let html = media_html(inserted.kind, &inserted.reference);
            session.edit(|doc| append_block(doc, &html));
            if inserted.staged {
                output.detail(&format!("Staged {}", path.display()));
            } else {
                output.detail(&format!("Uploaded {} to {}", path.display(), inserted.reference));
            }
        }
        Ok(())
    }
}

/// Append an HTML block, replacing the empty-content placeholder.
pub(crate) fn append_block(doc: &mut Document, html: &str) {
    if doc.is_empty_content() {
        html.clone_into(&mut doc.content);
    } else {
        doc.content.push_str(html);
    }
}

pub(crate) fn open_store(config: &Config) -> Arc<dyn DocumentStore> {
    Arc::new(FsStore::new(config.store_resolved.dir.clone()))
}

/// Build the upload service selected by the media configuration.
pub(crate) fn build_uploader(config: &Config) -> Result<Arc<dyn UploadService>, CliError> {
    let mut dir = DirUploader::new(config.media_dir.clone());
    if let Some(base_url) = &config.media.base_url {
        dir = dir.with_base_url(base_url.clone());
    }
    let dir: Arc<dyn UploadService> = Arc::new(dir);

    match config.media.backend {
        MediaBackend::Dir => Ok(dir),
        MediaBackend::S3 => {
            let s3 = config.require_s3()?;
            let uploader: Arc<dyn UploadService> = Arc::new(S3Uploader::new(S3UploadConfig {
                bucket: s3.bucket.clone(),
                region: s3.region.clone(),
                endpoint: s3.endpoint.clone(),
                bucket_root_path: s3.bucket_root_path.clone(),
                public_url: s3.public_url.clone(),
            }));
            if config.media.fallback_dir {
                Ok(Arc::new(FallbackUploader::new(uploader, dir)))
            } else {
                Ok(uploader)
            }
        }
    }
}

/// Translate file configuration into session tuning.
pub(crate) fn session_config(config: &Config) -> SessionConfig {
    SessionConfig {
        autosave: SchedulerConfig {
            enabled: config.autosave.enabled,
            debounce: config.autosave.debounce(),
            interval: config.autosave.interval(),
            max_failures: config.autosave.max_failures,
            backoff_initial: config.autosave.backoff_initial(),
            backoff_max: config.autosave.backoff_max(),
        },
        store_timeout: config.store_resolved.timeout,
        upload_timeout: config.media.timeout(),
        folder_root: config.media.folder_root.clone(),
        allow_partial_media: config.publish.allow_partial_media,
    }
}

/// Open an editor session against the configured backends.
pub(crate) async fn open_session(
    config: &Config,
    selection: Selection,
) -> Result<EditorSession, CliError> {
    let deps = SessionDeps {
        store: open_store(config),
        uploader: build_uploader(config)?,
        connectivity: ConnectivityMonitor::default(),
    };
    Ok(EditorSession::open(selection, deps, session_config(config)).await?)
}
