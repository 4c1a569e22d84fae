//! `quill compose` command implementation.
//!
//! Reads stdin line by line and appends each non-empty line as a paragraph,
//! with autosave running as it would under an interactive editor. Pending
//! changes are flushed with an explicit save at end of input.

use std::io::BufRead;

use clap::Args;
use quill_editor::{EditorSession, SaveOutcome};
use tokio::sync::mpsc;

use super::{GlobalArgs, TargetArgs, append_block, open_session};
use super::publish::print_publish_outcome;
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the compose command.
#[derive(Args)]
pub(crate) struct ComposeArgs {
    #[command(flatten)]
    target: TargetArgs,

    /// Title for the document.
    #[arg(long)]
    title: Option<String>,

    /// Publish at end of input instead of saving a draft.
    #[arg(long)]
    publish: bool,
}

impl ComposeArgs {
    /// Execute the compose command.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be opened, stdin cannot be
    /// read, or the final save or publish fails.
    pub(crate) async fn execute(self, global: &GlobalArgs) -> Result<(), CliError> {
        let output = Output::new();
        let config = global.load_config(None)?;
        let session = open_session(&config, self.target.selection()?).await?;

        if let Some(title) = self.title {
            session.set_title(title);
        }

        let mut lines = spawn_stdin_reader();
        let mut paragraphs = 0usize;
        while let Some(line) = lines.recv().await {
            let line = line?;
            let text = line.trim();
            if text.is_empty() {
                continue;
            }
            let html = format!("<p>{}</p>", html_escape::encode_text(text));
            session.edit(|doc| append_block(doc, &html));
            paragraphs += 1;
            tracing::debug!(paragraphs, status = %session.status(), "Appended paragraph");
        }
        output.info(&format!("Read {paragraphs} paragraph(s)"));

        if self.publish {
            let outcome = session.publish().await?;
            print_publish_outcome(&output, &outcome);
        } else {
            flush(&session, &output).await?;
        }
        Ok(())
    }
}

async fn flush(session: &EditorSession, output: &Output) -> Result<(), CliError> {
    match session.save().await? {
        SaveOutcome::Saved { id } => output.success(&format!("Saved {id}")),
        _ => match session.document_id() {
            Some(id) => output.success(&format!("Saved {id}")),
            None => output.info("Nothing to save"),
        },
    }
    Ok(())
}

/// Read stdin on a blocking thread so timers keep running while waiting.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<std::io::Result<String>> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::task::spawn_blocking(move || {
        for line in std::io::stdin().lock().lines() {
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}
