//! `quill sweep` command implementation.

use clap::Args;
use quill_editor::sweep_orphaned_drafts;

use super::{GlobalArgs, open_store};
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the sweep command.
#[derive(Args)]
pub(crate) struct SweepArgs {
    /// Report orphaned drafts without deleting them.
    #[arg(long)]
    dry_run: bool,
}

impl SweepArgs {
    /// Execute the sweep command.
    ///
    /// # Errors
    ///
    /// Returns an error if drafts or posts cannot be listed.
    pub(crate) async fn execute(self, global: &GlobalArgs) -> Result<(), CliError> {
        let output = Output::new();
        let config = global.load_config(Some(false))?;
        let store = open_store(&config);

        let report = sweep_orphaned_drafts(store.as_ref(), self.dry_run).await?;

        if report.orphaned.is_empty() {
            output.info("No orphaned drafts");
            return Ok(());
        }
        if self.dry_run {
            output.info(&format!("{} orphaned draft(s):", report.orphaned.len()));
            for id in &report.orphaned {
                output.data(id);
            }
            return Ok(());
        }
        for id in &report.deleted {
            output.detail(&format!("  deleted {id}"));
        }
        for (id, error) in &report.failed {
            output.warning(&format!("  {id}: {error}"));
        }
        output.success(&format!("Deleted {} orphaned draft(s)", report.deleted.len()));
        Ok(())
    }
}
