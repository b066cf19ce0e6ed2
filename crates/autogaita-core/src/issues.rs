//! Append-only `Issues.txt` log.
//!
//! Every warning and error raised while analysing one subject (or one group
//! run) is recorded here and mirrored to `tracing`. Issues recorded before
//! the results directory exists are buffered and flushed by
//! [`IssueLog::attach`].

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{error, warn};

use crate::error::{GaitError, GaitResult};

/// File name of the issues log inside a results directory.
pub const ISSUES_FILE: &str = "Issues.txt";

/// Severity of an [`Issue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Computation continues.
    Warning,
    /// The subject/trial was aborted.
    Error,
}

/// One line of `Issues.txt`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    /// Severity.
    pub severity: Severity,
    /// Message text.
    pub message: String,
}

impl Issue {
    /// A warning.
    pub fn warning(message: impl Into<String>) -> Self {
        Issue { severity: Severity::Warning, message: message.into() }
    }

    /// An error.
    pub fn error(message: impl Into<String>) -> Self {
        Issue { severity: Severity::Error, message: message.into() }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.severity {
            Severity::Warning => write!(f, "Warning: {}", self.message),
            Severity::Error => write!(f, "Error: {}", self.message),
        }
    }
}

/// Issue collector bound to one subject (or group) label.
#[derive(Debug)]
pub struct IssueLog {
    label: String,
    issues: Vec<Issue>,
    flushed: usize,
    path: Option<PathBuf>,
}

impl IssueLog {
    /// A log whose events are tagged with `label` (e.g. `"ID 15 - Run 3"`).
    pub fn new(label: impl Into<String>) -> Self {
        IssueLog { label: label.into(), issues: Vec::new(), flushed: 0, path: None }
    }

    /// Label used for tracing events.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Record a warning.
    pub fn warn(&mut self, message: impl Into<String>) {
        let issue = Issue::warning(message);
        warn!(subject = %self.label, "{}", issue.message);
        self.push(issue);
    }

    /// Record an error.
    pub fn error(&mut self, message: impl Into<String>) {
        let issue = Issue::error(message);
        error!(subject = %self.label, "{}", issue.message);
        self.push(issue);
    }

    /// Record an already-built issue, mirroring it to `tracing`.
    pub fn record(&mut self, issue: Issue) {
        match issue.severity {
            Severity::Warning => warn!(subject = %self.label, "{}", issue.message),
            Severity::Error => error!(subject = %self.label, "{}", issue.message),
        }
        self.push(issue);
    }

    fn push(&mut self, issue: Issue) {
        self.issues.push(issue);
        if self.path.is_some() {
            // An unwritable log must not abort the analysis; the issue is
            // still in memory and in the tracing output.
            if let Err(e) = self.flush() {
                error!(subject = %self.label, "cannot write {ISSUES_FILE}: {e}");
            }
        }
    }

    /// Bind the log to `<dir>/Issues.txt` and write buffered issues.
    pub fn attach(&mut self, dir: &Path) -> GaitResult<()> {
        self.path = Some(dir.join(ISSUES_FILE));
        self.flush()
    }

    fn flush(&mut self) -> GaitResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if self.flushed == self.issues.len() {
            return Ok(());
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| GaitError::io(path, e))?;
        for issue in &self.issues[self.flushed..] {
            writeln!(file, "{issue}").map_err(|e| GaitError::io(path, e))?;
        }
        self.flushed = self.issues.len();
        Ok(())
    }

    /// All issues recorded so far.
    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    /// Number of warnings recorded so far.
    pub fn warning_count(&self) -> usize {
        self.issues.iter().filter(|i| i.severity == Severity::Warning).count()
    }

    /// Path of the attached `Issues.txt`, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

/// Append one line to `<dir>/Issues.txt`, creating the directory if needed.
///
/// Used by batch drivers to record failures that happen outside a pipeline
/// invocation (e.g. a caught panic).
pub fn append_issue(dir: &Path, issue: &Issue) -> GaitResult<()> {
    std::fs::create_dir_all(dir).map_err(|e| GaitError::io(dir, e))?;
    let path = dir.join(ISSUES_FILE);
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| GaitError::io(&path, e))?;
    writeln!(file, "{issue}").map_err(|e| GaitError::io(&path, e))
}
