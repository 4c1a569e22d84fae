//! `quill save` command implementation.

use clap::Args;
use quill_editor::{LifecycleState, SaveOutcome};

use super::{EditArgs, GlobalArgs, TargetArgs, open_session};
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the save command.
#[derive(Args)]
pub(crate) struct SaveArgs {
    #[command(flatten)]
    target: TargetArgs,

    #[command(flatten)]
    edits: EditArgs,
}

impl SaveArgs {
    /// Execute the save command.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be opened or saved.
    pub(crate) async fn execute(self, global: &GlobalArgs) -> Result<(), CliError> {
        let output = Output::new();
        let config = global.load_config(Some(false))?;
        let session = open_session(&config, self.target.selection()?).await?;

        self.edits.apply(&session, &output).await?;

        match session.save().await? {
            SaveOutcome::Saved { id } => match session.lifecycle() {
                LifecycleState::Published(_) => output.success(&format!("Updated post {id}")),
                _ => output.success(&format!("Saved draft {id}")),
            },
            SaveOutcome::Clean => output.info("No changes to save"),
            other => output.warning(&format!("Save not performed: {other:?}")),
        }

        let staged = session.staged_media().len();
        if staged > 0 {
            output.warning(&format!(
                "{staged} staged image(s) are only uploaded by `quill publish` in the same run"
            ));
        }
        Ok(())
    }
}
