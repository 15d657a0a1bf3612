//! Loading response strategies from YAML or JSON fixture files.
//!
//! ```yaml
//! group:
//!   - match: { exact: "https://x.test/a" }
//!     respond: { status: 200 }
//!   - match: { pattern: "product/\\d+" }
//!     respond: { status: 202, body: "test" }
//!   - match: { exact: "https://x.test/down" }
//!     respond: { failure: { code: -1001, domain: "com.example" } }
//! ```
//!
//! A document without `group` holds a single rule at the top level.

use crate::strategy::{
    FailureInfo, MatchStrategy, ResponseCode, ResponseSpec, ResponseStrategy, UnsupportedStatus,
};
use base64::Engine;
use bytes::Bytes;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    #[error("failed to read fixture {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid YAML fixture: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid JSON fixture: {0}")]
    Json(#[from] serde_json::Error),
    #[error("fixture has neither `group` nor `match`/`respond`")]
    MissingRule,
    #[error("rule {index}: `match` needs exactly one of `exact` or `pattern`")]
    AmbiguousMatch { index: usize },
    #[error("rule {index}: {source}")]
    InvalidStatus {
        index: usize,
        #[source]
        source: UnsupportedStatus,
    },
    #[error("rule {index}: {reason}")]
    AmbiguousResponse { index: usize, reason: &'static str },
    #[error("rule {index}: `bodyBase64` is not valid base64: {source}")]
    InvalidBase64 {
        index: usize,
        #[source]
        source: base64::DecodeError,
    },
    #[error("rule {index}: `respond` needs a `status` or a `failure`")]
    MissingResponse { index: usize },
}

// ============================================================================
// Document shape
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FixtureDocument {
    group: Option<Vec<RuleDocument>>,
    #[serde(rename = "match")]
    rule: Option<MatchDocument>,
    respond: Option<RespondDocument>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleDocument {
    #[serde(rename = "match")]
    rule: MatchDocument,
    respond: RespondDocument,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MatchDocument {
    exact: Option<String>,
    pattern: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RespondDocument {
    status: Option<u16>,
    body: Option<String>,
    body_base64: Option<String>,
    failure: Option<FailureInfo>,
}

impl MatchDocument {
    fn into_strategy(self, index: usize) -> Result<MatchStrategy, FixtureError> {
        match (self.exact, self.pattern) {
            (Some(url), None) => Ok(MatchStrategy::Exact(url)),
            (None, Some(pattern)) => Ok(MatchStrategy::Pattern(pattern)),
            _ => Err(FixtureError::AmbiguousMatch { index }),
        }
    }
}

impl RespondDocument {
    fn into_spec(self, index: usize) -> Result<ResponseSpec, FixtureError> {
        if let Some(failure) = self.failure {
            if self.status.is_some() || self.body.is_some() || self.body_base64.is_some() {
                return Err(FixtureError::AmbiguousResponse {
                    index,
                    reason: "`failure` cannot be combined with `status` or a body",
                });
            }
            return Ok(ResponseSpec::Failure(failure));
        }

        let status = self.status.ok_or(FixtureError::MissingResponse { index })?;
        let code = ResponseCode::try_from(status)
            .map_err(|source| FixtureError::InvalidStatus { index, source })?;

        let body = match (self.body, self.body_base64) {
            (Some(_), Some(_)) => {
                return Err(FixtureError::AmbiguousResponse {
                    index,
                    reason: "`body` and `bodyBase64` are mutually exclusive",
                })
            }
            (Some(text), None) => Some(Bytes::from(text)),
            (None, Some(encoded)) => Some(Bytes::from(
                base64::engine::general_purpose::STANDARD
                    .decode(encoded.trim())
                    .map_err(|source| FixtureError::InvalidBase64 { index, source })?,
            )),
            (None, None) => None,
        };

        Ok(match body {
            Some(body) => ResponseSpec::Payload(code, body),
            None => ResponseSpec::Empty(code),
        })
    }
}

impl RuleDocument {
    fn into_rule(self, index: usize) -> Result<(MatchStrategy, ResponseSpec), FixtureError> {
        Ok((self.rule.into_strategy(index)?, self.respond.into_spec(index)?))
    }
}

impl FixtureDocument {
    fn into_strategy(self) -> Result<ResponseStrategy, FixtureError> {
        match (self.group, self.rule, self.respond) {
            (Some(group), None, None) => group
                .into_iter()
                .enumerate()
                .map(|(index, rule)| rule.into_rule(index))
                .collect::<Result<Vec<_>, _>>()
                .map(ResponseStrategy::Group),
            (None, Some(rule), Some(respond)) => {
                let (rule, response) = RuleDocument { rule, respond }.into_rule(0)?;
                Ok(ResponseStrategy::Single(rule, response))
            }
            _ => Err(FixtureError::MissingRule),
        }
    }
}

// ============================================================================
// Fixture
// ============================================================================

/// A response strategy loaded from a fixture document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fixture {
    pub strategy: ResponseStrategy,
    /// File the fixture was read from, if any
    pub source: Option<PathBuf>,
}

impl Fixture {
    /// Load a fixture, choosing the parser by file extension (`.json` is
    /// JSON, anything else YAML).
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, FixtureError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| FixtureError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let mut fixture = if is_json {
            Self::from_json_str(&contents)?
        } else {
            Self::from_yaml_str(&contents)?
        };
        fixture.source = Some(path.to_path_buf());

        debug!(
            "Loaded fixture {} with {} rule(s)",
            path.display(),
            fixture.strategy.len()
        );
        Ok(fixture)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, FixtureError> {
        let document: FixtureDocument = serde_yaml::from_str(contents)?;
        Self::from_document(document)
    }

    pub fn from_json_str(contents: &str) -> Result<Self, FixtureError> {
        let document: FixtureDocument = serde_json::from_str(contents)?;
        Self::from_document(document)
    }

    fn from_document(document: FixtureDocument) -> Result<Self, FixtureError> {
        Ok(Self {
            strategy: document.into_strategy()?,
            source: None,
        })
    }

    pub fn into_strategy(self) -> ResponseStrategy {
        self.strategy
    }
}
