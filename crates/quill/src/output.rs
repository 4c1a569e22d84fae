//! Terminal output for CLI commands.
//!
//! Status lines go to stderr and are colored by [`Tone`]. Record data, such
//! as `show` JSON or `list` rows, goes to stdout uncolored so it can be piped.

use console::{Style, Term};

#[derive(Clone, Copy)]
enum Tone {
    Plain,
    Success,
    Warning,
    Failure,
    Detail,
}

impl Tone {
    fn style(self) -> Style {
        match self {
            Self::Plain => Style::new(),
            Self::Success => Style::new().green(),
            Self::Warning => Style::new().yellow(),
            Self::Failure => Style::new().red().bold(),
            Self::Detail => Style::new().dim(),
        }
    }
}

pub(crate) struct Output {
    status: Term,
    data: Term,
}

impl Output {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            status: Term::stderr(),
            data: Term::stdout(),
        }
    }

    // Write errors on a closed terminal are not actionable.
    fn status_line(&self, tone: Tone, msg: &str) {
        let line = tone.style().apply_to(msg).to_string();
        let _ = self.status.write_line(&line);
    }

    pub(crate) fn info(&self, msg: &str) {
        self.status_line(Tone::Plain, msg);
    }

    pub(crate) fn success(&self, msg: &str) {
        self.status_line(Tone::Success, msg);
    }

    pub(crate) fn warning(&self, msg: &str) {
        self.status_line(Tone::Warning, msg);
    }

    pub(crate) fn error(&self, msg: &str) {
        self.status_line(Tone::Failure, msg);
    }

    /// Secondary line under a status message, such as one failed upload.
    pub(crate) fn detail(&self, msg: &str) {
        self.status_line(Tone::Detail, msg);
    }

    /// Command result on stdout.
    pub(crate) fn data(&self, msg: &str) {
        let _ = self.data.write_line(msg);
    }
}
