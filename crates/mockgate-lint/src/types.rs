//! Core types for the linting library.

use serde::Serialize;
use std::path::{Path, PathBuf};

/// Severity level of a lint issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// The fixture will be rejected when loaded.
    Error,
    /// The fixture loads but probably does not do what was meant.
    Warning,
}

impl Severity {
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
        }
    }
}

/// A single lint issue found during validation.
#[derive(Debug, Clone, Serialize)]
pub struct LintIssue {
    pub severity: Severity,
    /// Issue code (e.g., "E004", "W002").
    pub code: String,
    pub message: String,
    #[serde(serialize_with = "serialize_path")]
    pub file: PathBuf,
    /// Location within the document (e.g., "group[2].respond.status").
    pub location: Option<String>,
    pub suggestion: Option<String>,
}

fn serialize_path<S>(path: &Path, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&path.to_string_lossy())
}

impl LintIssue {
    fn new(
        severity: Severity,
        code: impl Into<String>,
        message: impl Into<String>,
        file: PathBuf,
    ) -> Self {
        Self {
            severity,
            code: code.into(),
            message: message.into(),
            file,
            location: None,
            suggestion: None,
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>, file: PathBuf) -> Self {
        Self::new(Severity::Error, code, message, file)
    }

    pub fn warning(code: impl Into<String>, message: impl Into<String>, file: PathBuf) -> Self {
        Self::new(Severity::Warning, code, message, file)
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

/// Result of linting one or more fixtures.
#[derive(Debug, Default, Serialize)]
pub struct LintResult {
    pub issues: Vec<LintIssue>,
    pub files_checked: usize,
    pub errors: usize,
    pub warnings: usize,
}

impl LintResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_issue(&mut self, issue: LintIssue) {
        match issue.severity {
            Severity::Error => self.errors += 1,
            Severity::Warning => self.warnings += 1,
        }
        self.issues.push(issue);
    }

    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }

    pub fn has_warnings(&self) -> bool {
        self.warnings > 0
    }

    /// Whether the checked fixtures would all load.
    pub fn is_valid(&self) -> bool {
        self.errors == 0
    }

    /// Issue codes in the order they were found.
    pub fn codes(&self) -> Vec<&str> {
        self.issues.iter().map(|issue| issue.code.as_str()).collect()
    }

    pub fn merge(&mut self, other: LintResult) {
        self.issues.extend(other.issues);
        self.files_checked += other.files_checked;
        self.errors += other.errors;
        self.warnings += other.warnings;
    }
}

/// Options for validation.
#[derive(Debug, Clone)]
pub struct LintOptions {
    /// Warn (W001) when an `exact` URL has no scheme or host.
    pub require_absolute_urls: bool,
}

impl Default for LintOptions {
    fn default() -> Self {
        Self {
            require_absolute_urls: true,
        }
    }
}
