//! `quill show` command implementation.

use clap::Args;
use quill_editor::{Selection, SessionError};
use quill_store::Collection;

use super::{GlobalArgs, TargetArgs, open_store};
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the show command.
#[derive(Args)]
pub(crate) struct ShowArgs {
    #[command(flatten)]
    target: TargetArgs,
}

impl ShowArgs {
    /// Print the selected record as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if no record was selected or it does not exist.
    pub(crate) async fn execute(self, global: &GlobalArgs) -> Result<(), CliError> {
        let output = Output::new();
        let (collection, id) = match self.target.selection()? {
            Selection::Draft(id) => (Collection::Drafts, id),
            Selection::Post(id) => (Collection::Posts, id),
            Selection::New => {
                return Err(CliError::Validation(
                    "show needs --draft or --post".to_owned(),
                ));
            }
        };

        let config = global.load_config(Some(false))?;
        let store = open_store(&config);
        let record = store.get(collection, &id).await?;
        let record = record.ok_or(SessionError::NotFound { collection, id })?;

        output.data(&serde_json::to_string_pretty(&record)?);
        Ok(())
    }
}
