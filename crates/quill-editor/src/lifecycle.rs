//! Document lifecycle, save status, and document selection.

use std::fmt;

use crate::error::SessionError;

/// Where a document is in its New → Draft → Published progression.
///
/// Predicates are derived from this single tag; there are no parallel flags.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LifecycleState {
    /// Never persisted.
    New,
    /// Persisted as a draft.
    Draft(String),
    /// Persisted as a published post.
    Published(String),
}

impl LifecycleState {
    #[must_use]
    pub fn is_new(&self) -> bool {
        matches!(self, Self::New)
    }

    #[must_use]
    pub fn is_draft(&self) -> bool {
        matches!(self, Self::Draft(_))
    }

    #[must_use]
    pub fn is_published(&self) -> bool {
        matches!(self, Self::Published(_))
    }

    /// Durable id, if the document has been persisted.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::New => None,
            Self::Draft(id) | Self::Published(id) => Some(id),
        }
    }

    /// Whether background autosave applies in this state.
    #[must_use]
    pub fn autosaves(&self) -> bool {
        !self.is_published()
    }

    /// Latch the id from the first successful draft create.
    ///
    /// Has no effect unless the state is [`LifecycleState::New`].
    pub fn latch_draft(&mut self, id: String) {
        if self.is_new() {
            *self = Self::Draft(id);
        }
    }

    /// Enter [`LifecycleState::Published`]. Reachable from every state.
    pub fn mark_published(&mut self, id: String) {
        *self = Self::Published(id);
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::New => f.write_str("new"),
            Self::Draft(id) => write!(f, "draft {id}"),
            Self::Published(id) => write!(f, "post {id}"),
        }
    }
}

/// Save status, for display only.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SaveStatus {
    /// Matches the last persisted snapshot.
    #[default]
    Clean,
    /// Has unsaved edits.
    Dirty,
    /// A write is in flight.
    Saving,
    /// Last write succeeded.
    Saved,
    /// Save deferred until connectivity returns.
    Offline,
    /// Last write failed; edits are kept and will be retried.
    Failed,
}

impl fmt::Display for SaveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Clean => "No changes",
            Self::Dirty => "Unsaved changes",
            Self::Saving => "Saving...",
            Self::Saved => "Draft saved",
            Self::Offline => "Offline, will save when reconnected",
            Self::Failed => "Save failed, will retry",
        };
        f.write_str(text)
    }
}

/// Which document to open.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Selection {
    /// A fresh, unpersisted document.
    New,
    /// An existing draft.
    Draft(String),
    /// An existing published post.
    Post(String),
}

impl Selection {
    /// Build a selection from optional post and draft ids.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidSelection`] if both ids are given.
    pub fn from_params(post: Option<String>, draft: Option<String>) -> Result<Self, SessionError> {
        match (post, draft) {
            (Some(post), Some(draft)) => Err(SessionError::InvalidSelection(format!(
                "post '{post}' and draft '{draft}' are mutually exclusive"
            ))),
            (Some(post), None) => Ok(Self::Post(post)),
            (None, Some(draft)) => Ok(Self::Draft(draft)),
            (None, None) => Ok(Self::New),
        }
    }
}
