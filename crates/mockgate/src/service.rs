//! Tower integration.
//!
//! [`MockLayer`] wraps any HTTP service. Requests carrying the scope header of
//! an open scope are answered by the mock engine; everything else is handed
//! to the inner service untouched.

use crate::error::{BoxError, MockError};
use crate::gate::{GateDecision, InterceptionGate};
use crate::scope::ScopeRegistry;
use crate::synth::ResponseSynthesizer;
use bytes::Bytes;
use futures::future::{self, BoxFuture, Ready};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::Body;
use hyper::{Request, Response};
use std::convert::Infallible;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service, ServiceExt};
use tracing::debug;

/// Body type of every response produced by [`MockService`].
pub type MockBody = UnsyncBoxBody<Bytes, BoxError>;

fn full_body(body: Full<Bytes>) -> MockBody {
    body.map_err(|never: Infallible| match never {}).boxed_unsync()
}

#[derive(Debug, Clone)]
pub struct MockLayer {
    registry: Arc<ScopeRegistry>,
}

impl MockLayer {
    pub fn new(registry: Arc<ScopeRegistry>) -> Self {
        Self { registry }
    }
}

impl<S> Layer<S> for MockLayer {
    type Service = MockService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MockService::new(Arc::clone(&self.registry), inner)
    }
}

/// Service answering scope-keyed requests from the registry.
#[derive(Debug, Clone)]
pub struct MockService<S> {
    inner: S,
    gate: InterceptionGate,
    synthesizer: ResponseSynthesizer,
}

impl<S> MockService<S> {
    pub fn new(registry: Arc<ScopeRegistry>, inner: S) -> Self {
        let synthesizer = ResponseSynthesizer::new(registry.config().on_unmatched);
        Self {
            inner,
            gate: InterceptionGate::new(registry),
            synthesizer,
        }
    }

    pub fn gate(&self) -> &InterceptionGate {
        &self.gate
    }

    pub fn registry(&self) -> &Arc<ScopeRegistry> {
        self.gate.registry()
    }
}

impl<S, B> Service<Request<Bytes>> for MockService<S>
where
    S: Service<Request<Full<Bytes>>, Response = Response<B>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Into<BoxError>,
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    type Response = Response<MockBody>;
    type Error = MockError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // The inner service is driven to readiness per passthrough call
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<Bytes>) -> Self::Future {
        // Resolution happens here, synchronously, so diagnostics surface in
        // the caller's task
        let scope = match self.gate.evaluate(&request) {
            GateDecision::Passthrough => {
                debug!("Passing {} {} through", request.method(), request.uri());
                let inner = self.inner.clone();
                return Box::pin(passthrough(inner, request));
            }
            GateDecision::Intercept(scope) | GateDecision::Unmatched(scope) => scope,
        };

        let result = self
            .synthesizer
            .respond(Some(&scope), &request)
            .map(|response| response.map(full_body));
        Box::pin(future::ready(result))
    }
}

async fn passthrough<S, B>(
    inner: S,
    request: Request<Bytes>,
) -> Result<Response<MockBody>, MockError>
where
    S: Service<Request<Full<Bytes>>, Response = Response<B>>,
    S::Error: Into<BoxError>,
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    let response = inner
        .oneshot(request.map(Full::new))
        .await
        .map_err(into_mock_error)?;
    Ok(response.map(|body| body.map_err(|e| -> BoxError { e.into() }).boxed_unsync()))
}

fn into_mock_error<E: Into<BoxError>>(error: E) -> MockError {
    let error: BoxError = error.into();
    match error.downcast::<MockError>() {
        Ok(error) => *error,
        Err(other) => MockError::Transport(other),
    }
}

/// Inner service that refuses every request, for tests that must never touch
/// the network.
#[derive(Debug, Clone, Copy, Default)]
pub struct Offline;

impl Service<Request<Full<Bytes>>> for Offline {
    type Response = Response<Full<Bytes>>;
    type Error = MockError;
    type Future = Ready<Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<Full<Bytes>>) -> Self::Future {
        future::ready(Err(MockError::Offline {
            url: request.uri().to_string(),
        }))
    }
}
