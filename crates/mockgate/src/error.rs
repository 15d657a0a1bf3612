use crate::strategy::FailureInfo;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error observed by a caller of [`MockService`](crate::MockService).
#[derive(Debug, thiserror::Error)]
pub enum MockError {
    /// A registered `Failure` rule fired
    #[error("mocked failure: {0}")]
    Failure(FailureInfo),
    #[error("no mock matches {method} {url}")]
    Unmatched { method: String, url: String },
    #[error("real network access is disabled, refused {url}")]
    Offline { url: String },
    /// Error from the inner service on a passthrough request
    #[error("transport error: {0}")]
    Transport(#[source] BoxError),
    #[error(transparent)]
    Http(#[from] hyper::http::Error),
}

impl MockError {
    /// Code of a registered failure.
    pub fn code(&self) -> Option<i64> {
        match self {
            MockError::Failure(info) => Some(info.code),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&FailureInfo> {
        match self {
            MockError::Failure(info) => Some(info),
            _ => None,
        }
    }

    pub fn is_unmatched(&self) -> bool {
        matches!(self, MockError::Unmatched { .. })
    }
}
