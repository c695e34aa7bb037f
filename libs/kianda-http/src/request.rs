use crate::client::Dispatcher;
use crate::config::TransportSecurity;
use crate::error::{HttpError, UrlProblem};
use crate::response::HttpResponse;
use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use http::Request;
use http_body_util::Full;
use serde::Serialize;

#[derive(Clone, Debug)]
enum BodyKind {
    Empty,
    Bytes(Bytes),
    Json(Bytes),
}

/// Request builder returned by [`HttpClient::get`](crate::HttpClient::get) and friends.
///
/// Header errors are deferred to [`send()`](RequestBuilder::send) (or to
/// [`json()`](RequestBuilder::json), which already returns a `Result`).
///
/// The body is buffered in full before sending so that a layer below can
/// replay the request.
#[must_use = "RequestBuilder does nothing until .send() is called"]
pub struct RequestBuilder {
    dispatcher: Dispatcher,
    method: http::Method,
    url: String,
    headers: Vec<(HeaderName, HeaderValue)>,
    body: BodyKind,
    error: Option<HttpError>,
}

impl RequestBuilder {
    pub(crate) fn new(dispatcher: Dispatcher, method: http::Method, url: String) -> Self {
        Self {
            dispatcher,
            method,
            url,
            headers: Vec::new(),
            body: BodyKind::Empty,
            error: None,
        }
    }

    /// Add a single header to the request
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if self.error.is_some() {
            return self;
        }

        match (HeaderName::try_from(name), HeaderValue::try_from(value)) {
            (Ok(name), Ok(value)) => self.headers.push((name, value)),
            (Err(e), _) => self.error = Some(HttpError::InvalidHeaderName(e)),
            (_, Err(e)) => self.error = Some(HttpError::InvalidHeaderValue(e)),
        }
        self
    }

    /// Add multiple headers to the request
    pub fn headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (name, value) in headers {
            self = self.header(name.as_ref(), value.as_ref());
            if self.error.is_some() {
                break;
            }
        }
        self
    }

    /// Set the body to the JSON encoding of `body`.
    ///
    /// `Content-Type: application/json` is added unless the caller set one.
    ///
    /// # Errors
    ///
    /// Returns a deferred header error, or `HttpError::Json` if serialization fails.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, HttpError> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }

        let json_bytes = serde_json::to_vec(body)?;
        self.body = BodyKind::Json(Bytes::from(json_bytes));
        Ok(self)
    }

    /// Set the body to raw bytes
    pub fn body_bytes(mut self, body: Bytes) -> Self {
        self.body = BodyKind::Bytes(body);
        self
    }

    /// Set the body to a string
    pub fn body_string(mut self, body: String) -> Self {
        self.body = BodyKind::Bytes(Bytes::from(body));
        self
    }

    /// Send the request.
    ///
    /// Resolves to `Ok` for every HTTP status the server answers with.
    ///
    /// # Errors
    ///
    /// - deferred header errors, `InvalidUrl`
    /// - `Transport`, `Tls`, `Timeout`
    /// - `Overloaded` when the buffer or concurrency limit is saturated
    /// - `Auth` when an auth layer gave up on the request
    pub async fn send(mut self) -> Result<HttpResponse, HttpError> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }

        let uri = parse_url(&self.url, self.dispatcher.transport())?;
        let mut builder = Request::builder().method(self.method).uri(uri);

        let has_content_type = self.headers.iter().any(|(name, _)| name == CONTENT_TYPE);
        if !has_content_type && matches!(self.body, BodyKind::Json(_)) {
            builder = builder.header(CONTENT_TYPE, "application/json");
        }

        for (name, value) in self.headers {
            builder = builder.header(name, value);
        }

        let body_bytes = match self.body {
            BodyKind::Empty => Bytes::new(),
            BodyKind::Bytes(b) | BodyKind::Json(b) => b,
        };

        let request = builder.body(Full::new(body_bytes))?;

        self.dispatcher.dispatch(request).await
    }
}

/// Absolute `http(s)` URL allowed by `transport`.
fn parse_url(url: &str, transport: TransportSecurity) -> Result<http::Uri, HttpError> {
    let uri: http::Uri = url.parse().map_err(|e: http::uri::InvalidUri| {
        HttpError::invalid_url(url, UrlProblem::Malformed(e.to_string()))
    })?;

    let problem = match (uri.scheme_str(), uri.authority()) {
        (None, _) => UrlProblem::MissingScheme,
        (Some(_), None) => UrlProblem::MissingHost,
        (Some("https"), Some(_)) => return Ok(uri),
        (Some("http"), Some(_)) => match transport {
            TransportSecurity::AllowInsecureHttp => return Ok(uri),
            TransportSecurity::TlsOnly => UrlProblem::PlainHttp,
        },
        (Some(other), Some(_)) => UrlProblem::UnsupportedScheme(other.to_owned()),
    };
    Err(HttpError::invalid_url(url, problem))
}
