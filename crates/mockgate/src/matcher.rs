//! URL matching for mock rules.
//!
//! Rules are compiled once when a scope opens and evaluated per request. A
//! pattern that does not compile degrades to a matcher that never matches, so
//! one bad rule cannot take down the rest of its scope.

use crate::strategy::MatchStrategy;
use hyper::Uri;
use regex::{Regex, RegexBuilder};
use std::sync::Arc;
use tracing::warn;

/// Compiled form of a [`MatchStrategy`].
#[derive(Debug, Clone)]
pub enum CompiledMatcher {
    /// Canonical form of the registered URL
    Exact(String),
    Pattern(Arc<Regex>),
    /// Pattern that failed to compile
    Never { pattern: String, reason: String },
}

impl CompiledMatcher {
    pub fn compile(strategy: &MatchStrategy) -> Self {
        match strategy {
            MatchStrategy::Exact(url) => CompiledMatcher::Exact(canonical_url(url)),
            MatchStrategy::Pattern(pattern) => {
                match RegexBuilder::new(pattern).case_insensitive(true).build() {
                    Ok(regex) => CompiledMatcher::Pattern(Arc::new(regex)),
                    Err(e) => {
                        warn!(
                            "Invalid URL pattern '{}', rule will never match: {}",
                            pattern, e
                        );
                        CompiledMatcher::Never {
                            pattern: pattern.clone(),
                            reason: e.to_string(),
                        }
                    }
                }
            }
        }
    }

    pub fn matches(&self, url: &str) -> bool {
        match self {
            CompiledMatcher::Exact(expected) => canonical_url(url) == *expected,
            CompiledMatcher::Pattern(regex) => regex.is_match(url),
            CompiledMatcher::Never { .. } => false,
        }
    }

    /// False when the rule degraded to never matching.
    pub fn is_valid(&self) -> bool {
        !matches!(self, CompiledMatcher::Never { .. })
    }
}

/// Evaluate one rule against a URL without keeping the compiled form.
pub fn matches(strategy: &MatchStrategy, url: &str) -> bool {
    CompiledMatcher::compile(strategy).matches(url)
}

/// True for a URI with both a scheme and a host.
pub fn is_absolute_url(raw: &str) -> bool {
    raw.trim()
        .parse::<Uri>()
        .is_ok_and(|uri| uri.scheme_str().is_some() && uri.host().is_some_and(|h| !h.is_empty()))
}

/// Canonical string form used for exact URL comparison.
///
/// Scheme and host are lowercased, an empty path becomes `/`, the query is
/// kept verbatim. Userinfo is kept as written. The fragment is dropped, it
/// never reaches the server. Strings that are not absolute URIs compare as
/// trimmed text.
pub fn canonical_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let Ok(uri) = trimmed.parse::<Uri>() else {
        return trimmed.to_string();
    };
    let (Some(scheme), Some(authority), Some(host)) =
        (uri.scheme_str(), uri.authority(), uri.host())
    else {
        return trimmed.to_string();
    };

    let mut canonical = format!("{}://", scheme.to_ascii_lowercase());
    if let Some((userinfo, _)) = authority.as_str().rsplit_once('@') {
        canonical.push_str(userinfo);
        canonical.push('@');
    }
    canonical.push_str(&host.to_ascii_lowercase());
    if let Some(port) = uri.port_u16() {
        canonical.push(':');
        canonical.push_str(&port.to_string());
    }
    match uri.path() {
        "" => canonical.push('/'),
        path => canonical.push_str(path),
    }
    if let Some(query) = uri.query() {
        canonical.push('?');
        canonical.push_str(query);
    }
    canonical
}
