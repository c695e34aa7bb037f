use std::time::Duration;

use http::StatusCode;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Why a request URL was refused before anything was sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum UrlProblem {
    #[error("malformed: {0}")]
    Malformed(String),
    #[error("missing scheme")]
    MissingScheme,
    #[error("missing host")]
    MissingHost,
    #[error("scheme '{0}' is not supported")]
    UnsupportedScheme(String),
    /// `http://` while the client is TLS-only.
    #[error("plain http is not allowed; use https")]
    PlainHttp,
}

/// Errors produced by [`HttpClient`](crate::HttpClient) and its layers.
///
/// An HTTP status is never an error on `send()`; [`HttpError::HttpStatus`]
/// only comes from the checked body readers on
/// [`HttpResponse`](crate::HttpResponse).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HttpError {
    // Building the request
    #[error("invalid URL '{url}': {problem}")]
    InvalidUrl { url: String, problem: UrlProblem },

    #[error("invalid header name: {0}")]
    InvalidHeaderName(#[from] http::header::InvalidHeaderName),

    #[error("invalid header value: {0}")]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),

    #[error("failed to build request: {0}")]
    RequestBuild(#[from] http::Error),

    // Getting it to the server and back
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Connection, DNS or protocol failure.
    #[error("transport error: {0}")]
    Transport(#[source] BoxError),

    #[error("TLS error: {0}")]
    Tls(#[source] BoxError),

    /// Concurrency limit reached; the request was not queued.
    #[error("client overloaded: concurrency limit reached")]
    Overloaded,

    /// The buffer worker is gone.
    #[error("client unavailable: request buffer closed")]
    ServiceClosed,

    /// An auth layer gave up on the request, e.g. its session could not be
    /// renewed. The source is the layer's own error; see [`HttpError::auth_source`].
    #[error("authentication failed: {0}")]
    Auth(#[source] BoxError),

    // Reading the response
    #[error("HTTP {status}: {body_preview}")]
    HttpStatus {
        status: StatusCode,
        body_preview: String,
        content_type: Option<String>,
    },

    #[error("response body too large: limit {limit} bytes, got {actual} bytes")]
    BodyTooLarge { limit: usize, actual: usize },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl HttpError {
    /// The auth layer's error, if this is [`HttpError::Auth`] carrying an `E`.
    #[must_use]
    pub fn auth_source<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        match self {
            HttpError::Auth(source) => source.downcast_ref::<E>(),
            _ => None,
        }
    }

    pub(crate) fn invalid_url(url: &str, problem: UrlProblem) -> Self {
        HttpError::InvalidUrl {
            url: url.to_owned(),
            problem,
        }
    }
}
