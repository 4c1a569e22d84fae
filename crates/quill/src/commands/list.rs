//! `quill list` command implementation.

use clap::{Args, ValueEnum};
use quill_store::{Collection, StoredRecord};

use super::{GlobalArgs, open_store};
use crate::error::CliError;
use crate::output::Output;

#[derive(Clone, Copy, ValueEnum)]
enum ListKind {
    Drafts,
    Posts,
}

impl From<ListKind> for Collection {
    fn from(kind: ListKind) -> Self {
        match kind {
            ListKind::Drafts => Collection::Drafts,
            ListKind::Posts => Collection::Posts,
        }
    }
}

/// Arguments for the list command.
#[derive(Args)]
pub(crate) struct ListArgs {
    /// Collection to list.
    kind: ListKind,

    /// Print records as a JSON array.
    #[arg(long)]
    json: bool,
}

impl ListArgs {
    /// List a collection, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub(crate) async fn execute(self, global: &GlobalArgs) -> Result<(), CliError> {
        let output = Output::new();
        let config = global.load_config(Some(false))?;
        let collection = Collection::from(self.kind);
        let records = open_store(&config).list(collection).await?;

        if self.json {
            output.data(&serde_json::to_string_pretty(&records)?);
            return Ok(());
        }
        if records.is_empty() {
            output.info(&format!("No {collection}"));
            return Ok(());
        }
        for record in &records {
            output.data(&format_row(collection, record));
        }
        Ok(())
    }
}

fn format_row(collection: Collection, record: &StoredRecord) -> String {
    let time = record
        .listing_time(collection)
        .map_or_else(|| "-".to_owned(), |t| t.format("%Y-%m-%d %H:%M").to_string());
    let title = match record.record.title.as_str() {
        "" => "(untitled)",
        title => title,
    };
    format!("{}\t{time}\t{title}", record.id)
}

#[cfg(test)]
mod tests {
    use quill_store::{Record, Timestamps};

    use super::*;

    #[test]
    fn test_format_row_untitled_without_time() {
        let record = StoredRecord {
            id: "d1".to_owned(),
            record: Record::default(),
            timestamps: Timestamps::default(),
        };

        assert_eq!(format_row(Collection::Drafts, &record), "d1\t-\t(untitled)");
    }
}
