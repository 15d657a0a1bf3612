//! Scoped client and the `stub` convenience wrapper.
//!
//! [`stub`] opens a scope keyed by its call site, hands the closure a
//! [`MockClient`] that stamps every request with that key, waits for the
//! closure to finish, and closes the scope again, also when the closure
//! panics.

use crate::error::{BoxError, MockError};
use crate::recorder::Report;
use crate::scope::{ScopeHandle, ScopeKey, ScopeRegistry};
use crate::service::{MockService, Offline};
use crate::strategy::ResponseStrategy;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Body;
use hyper::header::HeaderValue;
use hyper::{Method, Request, Response};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tower::{Service, ServiceExt};
use tracing::info;

/// Inner service for requests the mock layer does not claim.
pub type PassthroughClient = Client<HttpsConnector<HttpConnector>, Full<Bytes>>;

/// Create a real HTTP(S) client to sit under a [`MockService`].
pub fn passthrough_client() -> Result<PassthroughClient, std::io::Error> {
    let mut http_connector = HttpConnector::new();
    http_connector.set_connect_timeout(Some(Duration::from_secs(10)));
    http_connector.enforce_http(false); // Allow both HTTP and HTTPS

    let https_connector = hyper_rustls::HttpsConnectorBuilder::new()
        .with_native_roots()?
        .https_or_http()
        .enable_http1()
        .wrap_connector(http_connector);

    info!("Passthrough client configured (HTTP/1.1)");
    Ok(Client::builder(TokioExecutor::new()).build(https_connector))
}

/// HTTP client bound to one scope.
#[derive(Debug, Clone)]
pub struct MockClient<S> {
    service: MockService<S>,
    key: ScopeKey,
}

impl<S> MockClient<S> {
    pub fn new(service: MockService<S>, key: ScopeKey) -> Self {
        Self { service, key }
    }

    /// Client for the scope behind `handle`.
    pub fn for_scope(registry: &Arc<ScopeRegistry>, inner: S, handle: &ScopeHandle) -> Self {
        Self::new(
            MockService::new(Arc::clone(registry), inner),
            handle.key().clone(),
        )
    }

    pub fn key(&self) -> &ScopeKey {
        &self.key
    }
}

impl<S, B> MockClient<S>
where
    S: Service<Request<Full<Bytes>>, Response = Response<B>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Into<BoxError>,
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    /// Send a request stamped with this client's scope key and collect the
    /// response body.
    pub async fn send(&self, mut request: Request<Bytes>) -> Result<Response<Bytes>, MockError> {
        let value = HeaderValue::from_str(self.key.as_str()).map_err(hyper::http::Error::from)?;
        request
            .headers_mut()
            .insert(self.service.gate().header().clone(), value);

        let response = self.service.clone().oneshot(request).await?;
        let (parts, body) = response.into_parts();
        let body = body
            .collect()
            .await
            .map_err(MockError::Transport)?
            .to_bytes();
        Ok(Response::from_parts(parts, body))
    }

    pub async fn request(
        &self,
        method: Method,
        url: &str,
        body: impl Into<Bytes>,
    ) -> Result<Response<Bytes>, MockError> {
        let request = Request::builder()
            .method(method)
            .uri(url)
            .body(body.into())?;
        self.send(request).await
    }

    pub async fn get(&self, url: &str) -> Result<Response<Bytes>, MockError> {
        self.request(Method::GET, url, Bytes::new()).await
    }

    pub async fn post(
        &self,
        url: &str,
        body: impl Into<Bytes>,
    ) -> Result<Response<Bytes>, MockError> {
        self.request(Method::POST, url, body).await
    }
}

/// Closes its scope when dropped.
struct CloseOnDrop {
    registry: Arc<ScopeRegistry>,
    handle: ScopeHandle,
}

impl Drop for CloseOnDrop {
    fn drop(&mut self) {
        self.registry.close_scope(&self.handle);
    }
}

/// Run `handle` inside a scope answering with `strategy`, without network
/// access, and return what the scope observed.
///
/// The scope key is derived from the call site of `stub`.
#[track_caller]
pub fn stub<F, Fut>(
    registry: &Arc<ScopeRegistry>,
    strategy: ResponseStrategy,
    handle: F,
) -> impl Future<Output = Report>
where
    F: FnOnce(MockClient<Offline>) -> Fut,
    Fut: Future<Output = ()>,
{
    let key = ScopeKey::from_call_site();
    run_scope(Arc::clone(registry), Offline, key, strategy, handle)
}

/// [`stub`] with a caller-chosen inner service for unclaimed requests.
#[track_caller]
pub fn stub_with<S, F, Fut>(
    registry: &Arc<ScopeRegistry>,
    inner: S,
    strategy: ResponseStrategy,
    handle: F,
) -> impl Future<Output = Report>
where
    F: FnOnce(MockClient<S>) -> Fut,
    Fut: Future<Output = ()>,
{
    let key = ScopeKey::from_call_site();
    run_scope(Arc::clone(registry), inner, key, strategy, handle)
}

async fn run_scope<S, F, Fut>(
    registry: Arc<ScopeRegistry>,
    inner: S,
    key: ScopeKey,
    strategy: ResponseStrategy,
    handle: F,
) -> Report
where
    F: FnOnce(MockClient<S>) -> Fut,
    Fut: Future<Output = ()>,
{
    let guard = CloseOnDrop {
        handle: registry.open(key, strategy),
        registry,
    };
    let client = MockClient::for_scope(&guard.registry, inner, &guard.handle);

    handle(client).await;
    guard.handle.report()
}
