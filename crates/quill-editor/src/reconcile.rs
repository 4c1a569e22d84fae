//! Orphaned draft sweep.
//!
//! A publish whose draft delete failed leaves a draft behind whose content
//! matches a live post. The sweep finds those drafts and deletes them.

use std::collections::HashSet;

use quill_store::{Collection, DocumentStore, StoreError};

/// Drafts matched by a sweep.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Drafts whose content equals a post's content.
    pub orphaned: Vec<String>,
    /// Orphans actually deleted (empty on a dry run).
    pub deleted: Vec<String>,
    /// Orphans whose delete failed, with the error message.
    pub failed: Vec<(String, String)>,
}

/// Find drafts whose content exactly equals a post's content and delete them.
///
/// With `dry_run` nothing is deleted. Delete failures are collected, not
/// returned, so one bad record does not stop the sweep.
///
/// # Errors
///
/// Returns an error if either collection cannot be listed.
pub async fn sweep_orphaned_drafts(
    store: &dyn DocumentStore,
    dry_run: bool,
) -> Result<SweepReport, StoreError> {
    let posts = store.list(Collection::Posts).await?;
    let published: HashSet<&str> = posts.iter().map(|p| p.record.content.as_str()).collect();

    let drafts = store.list(Collection::Drafts).await?;
    let mut report = SweepReport::default();
    for draft in drafts {
        if !published.contains(draft.record.content.as_str()) {
            continue;
        }
        report.orphaned.push(draft.id.clone());
        if dry_run {
            continue;
        }
        match store.delete(Collection::Drafts, &draft.id).await {
            Ok(()) => {
                tracing::info!(id = %draft.id, "Deleted orphaned draft");
                report.deleted.push(draft.id);
            }
            Err(e) => {
                tracing::warn!(id = %draft.id, error = %e, "Failed to delete orphaned draft");
                report.failed.push((draft.id, e.to_string()));
            }
        }
    }
    Ok(report)
}
