//! Response synthesis for intercepted requests.
//!
//! The synthesizer walks the rules of a scope in registration order. Every
//! matching rule fires: its counter is bumped and its outcome is emitted. A
//! group whose entries overlap therefore emits more than once for a single
//! request; only the first emission reaches the caller.

use crate::config::UnmatchedPolicy;
use crate::error::MockError;
use crate::recorder::UnmatchedRequest;
use crate::scope::Scope;
use crate::strategy::{FailureInfo, MatchStrategy, ResponseSpec};
use bytes::Bytes;
use http_body_util::Full;
use hyper::{Request, Response, StatusCode};
use tracing::{debug, error};

/// What one fired rule produces for the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Status only
    Headers { status: StatusCode },
    /// Status, then the body
    Payload { status: StatusCode, body: Bytes },
    /// Transport failure instead of a response
    Failure(FailureInfo),
}

impl Outcome {
    fn from_spec(spec: &ResponseSpec) -> Self {
        match spec {
            ResponseSpec::Empty(code) => Outcome::Headers {
                status: code.status(),
            },
            ResponseSpec::Payload(code, body) => Outcome::Payload {
                status: code.status(),
                body: body.clone(),
            },
            ResponseSpec::Failure(info) => Outcome::Failure(info.clone()),
        }
    }

    /// Turn the outcome into what the caller observes.
    pub fn into_response(self) -> Result<Response<Full<Bytes>>, MockError> {
        match self {
            Outcome::Headers { status } => Ok(Response::builder()
                .status(status)
                .body(Full::new(Bytes::new()))?),
            Outcome::Payload { status, body } => {
                Ok(Response::builder().status(status).body(Full::new(body))?)
            }
            Outcome::Failure(info) => Err(MockError::Failure(info)),
        }
    }
}

/// One rule firing for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Emission {
    pub rule: MatchStrategy,
    pub outcome: Outcome,
}

/// Result of resolving one request against its scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Synthesis {
    /// Emissions in registration order, never empty
    Emitted(Vec<Emission>),
    /// Nothing resolved for a scope-keyed request
    Unmatched(UnmatchedRequest),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseSynthesizer {
    policy: UnmatchedPolicy,
}

impl ResponseSynthesizer {
    pub fn new(policy: UnmatchedPolicy) -> Self {
        Self { policy }
    }

    /// Fire every rule of `scope` that matches the request.
    ///
    /// A missing scope (closed after the gate looked it up) and a scope with
    /// no matching rule both end in [`Synthesis::Unmatched`], which is also
    /// logged and, when the scope still exists, noted in its recorder.
    pub fn synthesize(&self, scope: Option<&Scope>, request: &Request<Bytes>) -> Synthesis {
        let url = request.uri().to_string();
        let mut emissions = Vec::new();

        if let Some(scope) = scope {
            for rule in scope.matching_rules(&url) {
                let count = scope.recorder().bump(&rule.rule);
                debug!(
                    "Scope {}: {} fired for {} {} ({} so far, {})",
                    scope.key(),
                    rule.rule,
                    request.method(),
                    url,
                    count,
                    rule.response.kind()
                );
                emissions.push(Emission {
                    rule: rule.rule.clone(),
                    outcome: Outcome::from_spec(&rule.response),
                });
            }
        }

        if !emissions.is_empty() {
            return Synthesis::Emitted(emissions);
        }

        let unmatched = UnmatchedRequest {
            method: request.method().to_string(),
            url,
        };
        match scope {
            Some(scope) => {
                error!(
                    "Scope {}: no mock matches {} {}",
                    scope.key(),
                    unmatched.method,
                    unmatched.url
                );
                scope.recorder().flag_unmatched(unmatched.clone());
            }
            None => error!(
                "No scope resolves for {} {}",
                unmatched.method, unmatched.url
            ),
        }
        Synthesis::Unmatched(unmatched)
    }

    /// Synthesize and deliver: the first emission becomes the result.
    ///
    /// # Panics
    ///
    /// Under [`UnmatchedPolicy::Panic`], when nothing matched the request.
    pub fn respond(
        &self,
        scope: Option<&Scope>,
        request: &Request<Bytes>,
    ) -> Result<Response<Full<Bytes>>, MockError> {
        match self.synthesize(scope, request) {
            Synthesis::Emitted(emissions) => {
                let mut emissions = emissions.into_iter();
                let Some(first) = emissions.next() else {
                    return Err(MockError::Unmatched {
                        method: request.method().to_string(),
                        url: request.uri().to_string(),
                    });
                };
                for extra in emissions {
                    debug!(
                        "{} also fired for {}, response already delivered",
                        extra.rule,
                        request.uri()
                    );
                }
                first.outcome.into_response()
            }
            Synthesis::Unmatched(unmatched) => match self.policy {
                UnmatchedPolicy::Panic => panic!(
                    "mockgate: no mock registered for {} {}",
                    unmatched.method, unmatched.url
                ),
                UnmatchedPolicy::Error => Err(MockError::Unmatched {
                    method: unmatched.method,
                    url: unmatched.url,
                }),
            },
        }
    }
}
