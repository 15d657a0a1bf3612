//! Fixture linting library for Mockgate.
//!
//! Checks YAML and JSON fixture documents for problems that would make
//! `mockgate::Fixture` reject them, or that would make a scope behave
//! unexpectedly at test time.
//!
//! # Example
//!
//! ```no_run
//! use mockgate_lint::{lint_directory, lint_file, LintOptions};
//! use std::path::Path;
//!
//! let result = lint_file(Path::new("fixtures/catalog.yaml"), &LintOptions::default());
//! let result = lint_directory(Path::new("./fixtures"), &LintOptions::default());
//!
//! if result.has_errors() {
//!     eprintln!("Found {} errors", result.errors);
//! }
//! ```

mod types;
mod validator;

use mockgate::Fixture;
use serde_json::Value;
use std::path::{Path, PathBuf};

pub use types::{LintIssue, LintOptions, LintResult, Severity};
pub use validator::{
    validate_fixture, validate_group, validate_match, validate_respond, validate_rule,
};

/// Extensions considered fixture documents.
pub const FIXTURE_EXTENSIONS: [&str; 3] = ["json", "yaml", "yml"];

/// Syntax of a fixture document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Yaml,
}

impl DocumentFormat {
    /// `.json` is JSON, anything else YAML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => DocumentFormat::Json,
            _ => DocumentFormat::Yaml,
        }
    }
}

/// Why a document could not be checked at all.
#[derive(Debug, thiserror::Error)]
pub enum LintError {
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl LintError {
    pub fn code(&self) -> &'static str {
        match self {
            LintError::Io(_) => "E001",
            LintError::Json(_) | LintError::Yaml(_) => "E002",
        }
    }

    fn into_issue(self, file: PathBuf) -> LintIssue {
        let issue = LintIssue::error(self.code(), self.to_string(), file);
        match self {
            LintError::Io(_) => issue,
            LintError::Json(_) | LintError::Yaml(_) => {
                issue.with_suggestion("Check the document for syntax errors")
            }
        }
    }
}

/// Parse a fixture document into a JSON value, whatever its syntax.
pub fn parse_document(contents: &str, format: DocumentFormat) -> Result<Value, LintError> {
    Ok(match format {
        DocumentFormat::Json => serde_json::from_str(contents)?,
        DocumentFormat::Yaml => serde_yaml::from_str(contents)?,
    })
}

/// Lint a single fixture file.
pub fn lint_file(path: &Path, options: &LintOptions) -> LintResult {
    match std::fs::read_to_string(path) {
        Ok(contents) => lint_contents(&contents, DocumentFormat::from_path(path), path, options),
        Err(e) => {
            let mut result = LintResult::new();
            result.files_checked = 1;
            result.add_issue(LintError::from(e).into_issue(path.to_path_buf()));
            result
        }
    }
}

fn lint_contents(
    contents: &str,
    format: DocumentFormat,
    path: &Path,
    options: &LintOptions,
) -> LintResult {
    let mut result = LintResult::new();
    result.files_checked = 1;

    match parse_document(contents, format) {
        Ok(value) => {
            validate_fixture(path, &value, &mut result, options);
            check_loads(contents, format, path, &mut result);
        }
        Err(e) => result.add_issue(e.into_issue(path.to_path_buf())),
    }
    result
}

/// A document with no errors must also load as a `mockgate::Fixture`.
fn check_loads(contents: &str, format: DocumentFormat, path: &Path, result: &mut LintResult) {
    if result.has_errors() {
        return;
    }
    let loaded = match format {
        DocumentFormat::Json => Fixture::from_json_str(contents),
        DocumentFormat::Yaml => Fixture::from_yaml_str(contents),
    };
    if let Err(e) = loaded {
        result.add_issue(LintIssue::error(
            "E002",
            format!("Fixture does not load: {e}"),
            path.to_path_buf(),
        ));
    }
}

/// Fixture files directly inside `path` (non-recursive), sorted.
pub fn fixture_files(path: &Path) -> Result<Vec<PathBuf>, LintError> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(path)?
        .flatten()
        .map(|entry| entry.path())
        .filter(|file| file.is_file() && is_fixture(file))
        .collect();
    files.sort();
    Ok(files)
}

fn is_fixture(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            FIXTURE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

/// Lint all fixture files in a directory (non-recursive).
pub fn lint_directory(path: &Path, options: &LintOptions) -> LintResult {
    let mut result = LintResult::new();

    match fixture_files(path) {
        Ok(files) => {
            for file in files {
                result.merge(lint_file(&file, options));
            }
        }
        Err(e) => result.add_issue(e.into_issue(path.to_path_buf())),
    }
    result
}

/// Lint a document held in memory; `source_name` labels the issues.
pub fn lint_str(
    contents: &str,
    format: DocumentFormat,
    source_name: &str,
    options: &LintOptions,
) -> LintResult {
    lint_contents(contents, format, Path::new(source_name), options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const CATALOG: &str = r#"
group:
  - match: { exact: "https://shop.test/catalog" }
    respond: { status: 200, body: "[]" }
  - match: { pattern: "shop\\.test/product/\\d+" }
    respond: { status: 202, bodyBase64: "dGVzdA==" }
"#;

    #[test]
    fn test_lint_str_yaml() {
        let options = LintOptions::default();
        let result = lint_str(CATALOG, DocumentFormat::Yaml, "catalog.yaml", &options);
        assert!(result.is_valid());
        assert!(!result.has_warnings());
        assert_eq!(result.files_checked, 1);
    }

    #[test]
    fn test_unparsable_document() {
        let options = LintOptions::default();
        let result = lint_str("{ not json", DocumentFormat::Json, "broken.json", &options);
        assert_eq!(result.codes(), vec!["E002"]);
        assert_eq!(result.issues[0].file, PathBuf::from("broken.json"));
    }

    #[test]
    fn test_lint_agrees_with_fixture_loader() {
        let documents = [
            r#"
match: { exact: "https://x.test/a" }
respond: { status: 200, headers: {} }
"#,
            r#"
group: []
match: { exact: "https://x.test/a" }
respond: { status: 200 }
"#,
            r#"
match: { exact: "https://x.test/a" }
respond: { status: 200, body: [a, b] }
"#,
            r#"
match: { exact: "https://x.test/a" }
respond: { failure: { code: 1, domain: [x] } }
"#,
        ];
        let options = LintOptions::default();
        for document in documents {
            let result = lint_str(document, DocumentFormat::Yaml, "fixture.yaml", &options);
            assert!(Fixture::from_yaml_str(document).is_err());
            assert!(result.has_errors(), "{document}");
        }

        let result = lint_str(CATALOG, DocumentFormat::Yaml, "catalog.yaml", &options);
        assert!(Fixture::from_yaml_str(CATALOG).is_ok());
        assert!(result.is_valid());
    }

    #[test]
    fn test_unreadable_file() {
        let result = lint_file(Path::new("/nonexistent/fixture.yaml"), &LintOptions::default());
        assert_eq!(result.codes(), vec!["E001"]);
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(DocumentFormat::from_path(Path::new("a.JSON")), DocumentFormat::Json);
        assert_eq!(DocumentFormat::from_path(Path::new("a.yml")), DocumentFormat::Yaml);
        assert_eq!(DocumentFormat::from_path(Path::new("a")), DocumentFormat::Yaml);
    }

    #[test]
    fn test_lint_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("catalog.yaml"), CATALOG).unwrap();
        fs::write(
            dir.path().join("redirect.json"),
            r#"{"match": {"exact": "https://x.test/old"}, "respond": {"status": 301}}"#,
        )
        .unwrap();
        fs::write(dir.path().join("notes.txt"), "not a fixture").unwrap();

        let result = lint_directory(dir.path(), &LintOptions::default());
        assert_eq!(result.files_checked, 2);
        assert_eq!(result.codes(), vec!["E005"]);
        assert!(result.issues[0].file.ends_with("redirect.json"));
    }

    #[test]
    fn test_lint_directory_missing() {
        let missing = Path::new("/nonexistent/fixtures");
        let result = lint_directory(missing, &LintOptions::default());
        assert_eq!(result.codes(), vec!["E001"]);
        assert_eq!(result.files_checked, 0);
    }
}
