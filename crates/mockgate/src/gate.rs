//! Interception gate: decides which outgoing requests the mock layer claims.

use crate::recorder::RequestRecord;
use crate::scope::{Scope, ScopeKey, ScopeRegistry};
use bytes::Bytes;
use hyper::header::HeaderName;
use hyper::Request;
use std::sync::Arc;
use tracing::debug;

/// What the gate decided for one request.
#[derive(Debug, Clone)]
pub enum GateDecision {
    /// No scope header, or no scope open under its key
    Passthrough,
    /// At least one rule of the scope matches the URL
    Intercept(Arc<Scope>),
    /// The scope is open but none of its rules matches the URL
    Unmatched(Arc<Scope>),
}

impl GateDecision {
    pub fn is_intercepted(&self) -> bool {
        matches!(self, GateDecision::Intercept(_))
    }

    pub fn scope(&self) -> Option<&Arc<Scope>> {
        match self {
            GateDecision::Passthrough => None,
            GateDecision::Intercept(scope) | GateDecision::Unmatched(scope) => Some(scope),
        }
    }
}

#[derive(Debug, Clone)]
pub struct InterceptionGate {
    registry: Arc<ScopeRegistry>,
    header: HeaderName,
}

impl InterceptionGate {
    pub fn new(registry: Arc<ScopeRegistry>) -> Self {
        let header = registry.config().header_name();
        Self { registry, header }
    }

    pub fn registry(&self) -> &Arc<ScopeRegistry> {
        &self.registry
    }

    pub fn header(&self) -> &HeaderName {
        &self.header
    }

    /// Scope key carried by the request, if any.
    pub fn scope_key<B>(&self, request: &Request<B>) -> Option<ScopeKey> {
        request
            .headers()
            .get(&self.header)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .map(ScopeKey::from)
    }

    /// Classify a request and, when its key resolves to an open scope, append
    /// it to that scope's request log.
    ///
    /// Call once per logical request: every call against an open scope records.
    pub fn evaluate(&self, request: &Request<Bytes>) -> GateDecision {
        let Some(key) = self.scope_key(request) else {
            return GateDecision::Passthrough;
        };
        let Some(scope) = self.registry.lookup(&key) else {
            debug!("No scope open for key {}, passing {} through", key, request.uri());
            return GateDecision::Passthrough;
        };

        let record_bodies = self.registry.config().record_bodies;
        scope
            .recorder()
            .record(RequestRecord::capture(request, record_bodies));

        let url = request.uri().to_string();
        if scope.matches_any(&url) {
            GateDecision::Intercept(scope)
        } else {
            GateDecision::Unmatched(scope)
        }
    }

    pub fn should_intercept(&self, request: &Request<Bytes>) -> bool {
        self.evaluate(request).is_intercepted()
    }
}
