//! Observation recording for mock scopes.
//!
//! Every scope owns one [`Recorder`]. The gate appends a [`RequestRecord`]
//! per scope-keyed request, the synthesizer bumps the counter of every rule
//! that fired, and [`Recorder::snapshot`] turns both into an immutable
//! [`Report`].

use crate::strategy::MatchStrategy;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use hyper::{HeaderMap, Request};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Snapshot of one intercepted request attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestRecord {
    pub url: String,
    pub method: String,
    pub headers: HashMap<String, String>,
    pub body: Option<Bytes>,
    pub timestamp: DateTime<Utc>,
}

impl RequestRecord {
    /// Capture a request. An empty body is recorded as `None`.
    pub fn capture(request: &Request<Bytes>, include_body: bool) -> Self {
        let body = if include_body && !request.body().is_empty() {
            Some(request.body().clone())
        } else {
            None
        };

        Self {
            url: request.uri().to_string(),
            method: request.method().as_str().to_string(),
            headers: flatten_headers(request.headers()),
            body,
            timestamp: Utc::now(),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Repeated headers are joined with ", ".
fn flatten_headers(headers: &HeaderMap) -> HashMap<String, String> {
    let mut flat: HashMap<String, String> = HashMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        flat.entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }
    flat
}

/// A scope-keyed request that no rule of its scope matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnmatchedRequest {
    pub method: String,
    pub url: String,
}

/// Immutable summary of everything a scope observed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Report {
    /// Requests in the order they were issued
    pub requests: Vec<RequestRecord>,
    /// How many times each rule fired
    pub executed_mock: HashMap<MatchStrategy, u64>,
    /// Sum of `executed_mock`
    pub total_executed: u64,
    /// Fail-fast diagnostics raised inside the scope
    pub unmatched: Vec<UnmatchedRequest>,
}

impl Report {
    pub fn executions(&self, rule: &MatchStrategy) -> u64 {
        self.executed_mock.get(rule).copied().unwrap_or(0)
    }

    /// Panics listing every request that no rule matched.
    pub fn assert_all_matched(&self) {
        if self.unmatched.is_empty() {
            return;
        }
        let listed: Vec<String> = self
            .unmatched
            .iter()
            .map(|u| format!("{} {}", u.method, u.url))
            .collect();
        panic!(
            "{} request(s) had no matching mock: {}",
            listed.len(),
            listed.join(", ")
        );
    }
}

/// Per-scope request log and execution counters.
#[derive(Debug, Default)]
pub struct Recorder {
    requests: Mutex<Vec<RequestRecord>>,
    executed: Mutex<HashMap<MatchStrategy, u64>>,
    unmatched: Mutex<Vec<UnmatchedRequest>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, record: RequestRecord) {
        self.requests.lock().push(record);
    }

    /// Increment a rule's counter and return its new value.
    pub fn bump(&self, rule: &MatchStrategy) -> u64 {
        let mut executed = self.executed.lock();
        let count = executed.entry(rule.clone()).or_insert(0);
        *count += 1;
        *count
    }

    pub fn flag_unmatched(&self, unmatched: UnmatchedRequest) {
        self.unmatched.lock().push(unmatched);
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn snapshot(&self) -> Report {
        let requests = self.requests.lock().clone();
        let executed_mock = self.executed.lock().clone();
        let unmatched = self.unmatched.lock().clone();
        let total_executed = executed_mock.values().sum();

        Report {
            requests,
            executed_mock,
            total_executed,
            unmatched,
        }
    }
}
