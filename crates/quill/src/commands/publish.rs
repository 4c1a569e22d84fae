//! `quill publish` command implementation.

use clap::Args;
use quill_editor::PublishOutcome;

use super::{EditArgs, GlobalArgs, TargetArgs, open_session};
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the publish command.
#[derive(Args)]
pub(crate) struct PublishArgs {
    #[command(flatten)]
    target: TargetArgs,

    #[command(flatten)]
    edits: EditArgs,
}

impl PublishArgs {
    /// Execute the publish command.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be opened, media cannot be
    /// uploaded, or the post cannot be written.
    pub(crate) async fn execute(self, global: &GlobalArgs) -> Result<(), CliError> {
        let output = Output::new();
        let config = global.load_config(Some(false))?;
        let session = open_session(&config, self.target.selection()?).await?;

        self.edits.apply(&session, &output).await?;

        let staged = session.staged_media().len();
        if staged > 0 {
            output.info(&format!("Uploading {staged} image(s)..."));
        }
        let outcome = session.publish().await?;
        print_publish_outcome(&output, &outcome);
        Ok(())
    }
}

pub(crate) fn print_publish_outcome(output: &Output, outcome: &PublishOutcome) {
    output.success(&format!("Published post {}", outcome.post_id));
    for asset in &outcome.promoted {
        output.detail(&format!("  {} -> {}", asset.local_id, asset.url));
    }
    if !outcome.failed_media.is_empty() {
        output.warning(&format!(
            "Published without {} media item(s): {}",
            outcome.failed_media.len(),
            outcome.failed_media.join(", ")
        ));
    }
    if let Some(draft) = &outcome.orphaned_draft {
        output.warning(&format!(
            "Draft {draft} could not be deleted; run `quill sweep` to clean it up"
        ));
    }
}
