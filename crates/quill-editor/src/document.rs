//! In-memory document, snapshots, and dirty tracking.
//!
//! A [`Snapshot`] is the value last confirmed persisted. The session captures
//! one at the start of every save and hands it to [`DirtyTracker::commit`]
//! only after that save succeeds, so edits made while a write is in flight
//! keep the document dirty.

use quill_media::MediaKind;
use quill_store::Record;

/// Content of a document with no text: a single empty paragraph.
pub const EMPTY_CONTENT: &str = "<p><br></p>";

/// The editable document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Document {
    /// Title as typed (untrimmed).
    pub title: String,
    /// Short description.
    pub description: String,
    /// Serialized rich-text content (HTML).
    pub content: String,
    /// References to embedded media, in insertion order without duplicates.
    pub media_refs: Vec<String>,
}

impl Default for Document {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            content: EMPTY_CONTENT.to_owned(),
            media_refs: Vec::new(),
        }
    }
}

impl Document {
    /// Build a document from a stored record.
    ///
    /// Blank content becomes [`EMPTY_CONTENT`]; media references are read
    /// back from `src` attributes.
    #[must_use]
    pub fn from_record(record: Record) -> Self {
        let content = if record.content.trim().is_empty() {
            EMPTY_CONTENT.to_owned()
        } else {
            record.content
        };
        let media_refs = extract_sources(&content);
        Self {
            title: record.title,
            description: record.description,
            content,
            media_refs,
        }
    }

    /// Returns `true` if the content is blank or the empty-paragraph sentinel.
    #[must_use]
    pub fn is_empty_content(&self) -> bool {
        let trimmed = self.content.trim();
        trimmed.is_empty() || trimmed == EMPTY_CONTENT
    }

    /// Title to show in window chrome.
    ///
    /// `persisted` selects the fallback for an untitled document.
    #[must_use]
    pub fn display_title(&self, persisted: bool) -> String {
        let title = self.title.trim();
        if !title.is_empty() {
            title.to_owned()
        } else if persisted {
            "Untitled Post".to_owned()
        } else {
            "Create New Post".to_owned()
        }
    }

    /// Capture the persisted fields.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            title: self.title.clone(),
            description: self.description.clone(),
            content: self.content.clone(),
        }
    }

    /// Replace the persisted fields with a snapshot's values.
    pub fn restore(&mut self, snapshot: &Snapshot) {
        self.title.clone_from(&snapshot.title);
        self.description.clone_from(&snapshot.description);
        self.content.clone_from(&snapshot.content);
        self.media_refs = extract_sources(&self.content);
    }

    /// Record an embedded media reference.
    pub fn add_media_ref(&mut self, reference: impl Into<String>) {
        let reference = reference.into();
        if !self.media_refs.contains(&reference) {
            self.media_refs.push(reference);
        }
    }

    /// Swap one media reference for another.
    ///
    /// Only exact occurrences of `from` change; the rest of the content is
    /// left untouched. Returns `true` if the content contained `from`.
    pub fn replace_ref(&mut self, from: &str, to: &str) -> bool {
        let found = self.content.contains(from);
        if found {
            self.content = self.content.replace(from, to);
        }
        for r in &mut self.media_refs {
            if r == from {
                to.clone_into(r);
            }
        }
        found
    }
}

impl From<&Snapshot> for Record {
    fn from(snapshot: &Snapshot) -> Self {
        Self {
            title: snapshot.title.trim().to_owned(),
            description: snapshot.description.clone(),
            content: snapshot.content.clone(),
        }
    }
}

/// Immutable copy of the persisted document fields.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Snapshot {
    title: String,
    description: String,
    content: String,
}

impl Snapshot {
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Store record for this snapshot (title trimmed).
    #[must_use]
    pub fn to_record(&self) -> Record {
        Record::from(self)
    }
}

/// Structural inequality over title, description, and content.
#[must_use]
pub fn is_dirty(current: &Document, snapshot: &Snapshot) -> bool {
    current.title != snapshot.title
        || current.description != snapshot.description
        || current.content != snapshot.content
}

/// Tracks the last persisted snapshot.
#[derive(Clone, Debug, Default)]
pub struct DirtyTracker {
    snapshot: Snapshot,
}

impl DirtyTracker {
    /// Start tracking from an already persisted (or pristine) snapshot.
    #[must_use]
    pub fn new(snapshot: Snapshot) -> Self {
        Self { snapshot }
    }

    #[must_use]
    pub fn is_dirty(&self, current: &Document) -> bool {
        is_dirty(current, &self.snapshot)
    }

    /// Replace the tracked snapshot. Call only after a confirmed write of `snapshot`.
    pub fn commit(&mut self, snapshot: Snapshot) {
        self.snapshot = snapshot;
    }

    #[must_use]
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }
}

/// HTML fragment embedding media at `url`.
#[must_use]
pub fn media_html(kind: MediaKind, url: &str) -> String {
    match kind {
        MediaKind::Image => format!(r#"<p><img src="{url}" alt="User uploaded image"></p>"#),
        MediaKind::Video => format!(r#"<p><video src="{url}" controls></video></p>"#),
    }
}

/// Collect `src="..."` attribute values in document order.
fn extract_sources(content: &str) -> Vec<String> {
    const ATTR: &str = "src=\"";

    let mut refs: Vec<String> = Vec::new();
    let mut rest = content;
    while let Some(start) = rest.find(ATTR) {
        rest = &rest[start + ATTR.len()..];
        let Some(end) = rest.find('"') else {
            break;
        };
        let value = &rest[..end];
        if !value.is_empty() && !refs.iter().any(|r| r == value) {
            refs.push(value.to_owned());
        }
        rest = &rest[end..];
    }
    refs
}
