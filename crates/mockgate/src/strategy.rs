//! Type definitions for mock registrations.
//!
//! A scope registers one [`ResponseStrategy`]: either a single rule or an
//! ordered group of rules. Each rule pairs a [`MatchStrategy`] (which URLs it
//! claims) with a [`ResponseSpec`] (what the caller observes).

use bytes::Bytes;
use hyper::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Match Strategy
// ============================================================================

/// How a rule decides whether a request URL belongs to it.
///
/// Equality and hashing are structural over the variant and its payload, so a
/// strategy can key the per-scope execution counters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchStrategy {
    /// Canonicalized URL equality
    Exact(String),
    /// Case-insensitive regex search anywhere in the URL
    Pattern(String),
}

impl MatchStrategy {
    pub fn exact(url: impl Into<String>) -> Self {
        MatchStrategy::Exact(url.into())
    }

    pub fn pattern(pattern: impl Into<String>) -> Self {
        MatchStrategy::Pattern(pattern.into())
    }
}

impl fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchStrategy::Exact(url) => write!(f, "exact({url})"),
            MatchStrategy::Pattern(pattern) => write!(f, "pattern({pattern})"),
        }
    }
}

// ============================================================================
// Response Code
// ============================================================================

/// Status codes a mock is allowed to answer with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
#[repr(u16)]
pub enum ResponseCode {
    Ok = 200,
    Created = 201,
    Accepted = 202,
    NoContent = 204,
    BadRequest = 400,
    Unauthorized = 401,
    Forbidden = 403,
    NotFound = 404,
    MethodNotAllowed = 405,
    RequestTimeout = 408,
    TooManyRequests = 429,
    InternalServerError = 500,
    NotImplemented = 501,
    BadGateway = 502,
    ServiceUnavailable = 503,
    GatewayTimeout = 504,
}

impl ResponseCode {
    pub const ALL: [ResponseCode; 16] = [
        ResponseCode::Ok,
        ResponseCode::Created,
        ResponseCode::Accepted,
        ResponseCode::NoContent,
        ResponseCode::BadRequest,
        ResponseCode::Unauthorized,
        ResponseCode::Forbidden,
        ResponseCode::NotFound,
        ResponseCode::MethodNotAllowed,
        ResponseCode::RequestTimeout,
        ResponseCode::TooManyRequests,
        ResponseCode::InternalServerError,
        ResponseCode::NotImplemented,
        ResponseCode::BadGateway,
        ResponseCode::ServiceUnavailable,
        ResponseCode::GatewayTimeout,
    ];

    pub fn as_u16(self) -> u16 {
        self as u16
    }

    pub fn status(self) -> StatusCode {
        // Every variant is a registered status code
        StatusCode::from_u16(self.as_u16()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl TryFrom<u16> for ResponseCode {
    type Error = UnsupportedStatus;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        ResponseCode::ALL
            .into_iter()
            .find(|c| c.as_u16() == code)
            .ok_or(UnsupportedStatus(code))
    }
}

impl From<ResponseCode> for u16 {
    fn from(code: ResponseCode) -> Self {
        code.as_u16()
    }
}

impl From<ResponseCode> for StatusCode {
    fn from(code: ResponseCode) -> Self {
        code.status()
    }
}

/// A status code outside the set a mock may answer with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("status code {0} is not a supported mock response code")]
pub struct UnsupportedStatus(pub u16);

// ============================================================================
// Response Spec
// ============================================================================

/// Transport-level failure a rule delivers instead of a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureInfo {
    #[serde(default = "default_failure_domain")]
    pub domain: String,
    pub code: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

fn default_failure_domain() -> String {
    "mockgate".to_string()
}

impl FailureInfo {
    pub fn new(domain: impl Into<String>, code: i64) -> Self {
        Self {
            domain: domain.into(),
            code,
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl fmt::Display for FailureInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error {}", self.domain, self.code)?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        Ok(())
    }
}

/// The canned outcome of a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseSpec {
    /// Status only, no body
    Empty(ResponseCode),
    /// Status followed by the exact body bytes
    Payload(ResponseCode, Bytes),
    /// Error instead of any response
    Failure(FailureInfo),
}

impl ResponseSpec {
    pub fn payload(code: ResponseCode, body: impl Into<Bytes>) -> Self {
        ResponseSpec::Payload(code, body.into())
    }

    pub fn failure(domain: impl Into<String>, code: i64) -> Self {
        ResponseSpec::Failure(FailureInfo::new(domain, code))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ResponseSpec::Empty(_) => "empty",
            ResponseSpec::Payload(..) => "payload",
            ResponseSpec::Failure(_) => "failure",
        }
    }
}

// ============================================================================
// Response Strategy
// ============================================================================

/// Everything one scope answers with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseStrategy {
    Single(MatchStrategy, ResponseSpec),
    /// Independently evaluated rules, in registration order
    Group(Vec<(MatchStrategy, ResponseSpec)>),
}

impl ResponseStrategy {
    pub fn single(rule: MatchStrategy, response: ResponseSpec) -> Self {
        ResponseStrategy::Single(rule, response)
    }

    pub fn group<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (MatchStrategy, ResponseSpec)>,
    {
        ResponseStrategy::Group(entries.into_iter().collect())
    }

    /// Rules in registration order.
    pub fn entries(&self) -> Vec<(&MatchStrategy, &ResponseSpec)> {
        match self {
            ResponseStrategy::Single(rule, response) => vec![(rule, response)],
            ResponseStrategy::Group(entries) => entries.iter().map(|(r, s)| (r, s)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ResponseStrategy::Single(..) => 1,
            ResponseStrategy::Group(entries) => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
