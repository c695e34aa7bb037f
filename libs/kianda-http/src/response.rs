use crate::error::HttpError;
use bytes::Bytes;
use http::{HeaderMap, Response, StatusCode};
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;

/// Maximum body preview kept in [`HttpError::HttpStatus`] (8 KiB).
pub const ERROR_BODY_PREVIEW_LIMIT: usize = 8 * 1024;

/// Type-erased response body (already decompressed).
pub type ResponseBody =
    http_body_util::combinators::BoxBody<Bytes, Box<dyn std::error::Error + Send + Sync>>;

/// A response of any status, as returned by [`RequestBuilder::send`](crate::RequestBuilder::send).
///
/// [`bytes`](Self::bytes) reads whatever came back. [`checked_bytes`](Self::checked_bytes),
/// [`json`](Self::json) and [`text`](Self::text) first turn a non-2xx status into
/// [`HttpError::HttpStatus`] carrying a preview of the body. Every reader stops
/// at the client's body limit.
#[derive(Debug)]
pub struct HttpResponse {
    pub(crate) inner: Response<ResponseBody>,
    pub(crate) max_body_size: usize,
}

impl HttpResponse {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.inner.status()
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    #[must_use]
    pub fn into_inner(self) -> Response<ResponseBody> {
        self.inner
    }

    /// Return `HttpError::HttpStatus` (with an empty preview) for non-2xx.
    ///
    /// # Errors
    /// Returns `HttpError::HttpStatus` if the status is not 2xx.
    pub fn error_for_status(self) -> Result<Self, HttpError> {
        if self.inner.status().is_success() {
            return Ok(self);
        }
        Err(HttpError::HttpStatus {
            status: self.inner.status(),
            body_preview: String::new(),
            content_type: content_type(self.inner.headers()),
        })
    }

    /// Read the body as bytes without a status check.
    ///
    /// # Errors
    /// Returns `HttpError::BodyTooLarge` if the body exceeds the limit.
    pub async fn bytes(self) -> Result<Bytes, HttpError> {
        collect_capped(self.inner, self.max_body_size).await
    }

    /// Read the body as bytes; non-2xx becomes `HttpError::HttpStatus` with
    /// a body preview.
    ///
    /// # Errors
    /// Returns `HttpError::HttpStatus` for non-2xx statuses and
    /// `HttpError::BodyTooLarge` if the body exceeds the limit.
    pub async fn checked_bytes(self) -> Result<Bytes, HttpError> {
        body_or_status(self.inner, self.max_body_size).await
    }

    /// Parse the body as JSON after a status check.
    ///
    /// # Errors
    /// Returns `HttpError::HttpStatus`, `HttpError::BodyTooLarge`, or
    /// `HttpError::Json`.
    pub async fn json<T: DeserializeOwned>(self) -> Result<T, HttpError> {
        let body = body_or_status(self.inner, self.max_body_size).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Read the body as UTF-8 text (lossy) after a status check.
    ///
    /// # Errors
    /// Returns `HttpError::HttpStatus` or `HttpError::BodyTooLarge`.
    pub async fn text(self) -> Result<String, HttpError> {
        let body = body_or_status(self.inner, self.max_body_size).await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    /// Configured body limit for this response.
    #[must_use]
    pub fn max_body_size(&self) -> usize {
        self.max_body_size
    }
}

fn content_type(headers: &HeaderMap) -> Option<String> {
    headers
        .get(http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

async fn body_or_status(
    response: Response<ResponseBody>,
    max_body_size: usize,
) -> Result<Bytes, HttpError> {
    let status = response.status();
    if status.is_success() {
        return collect_capped(response, max_body_size).await;
    }

    let content_type = content_type(response.headers());
    let preview_limit = max_body_size.min(ERROR_BODY_PREVIEW_LIMIT);
    let body_preview = match collect_capped(response, preview_limit).await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(HttpError::BodyTooLarge { .. }) => "<body too large for preview>".to_owned(),
        Err(e) => return Err(e),
    };

    Err(HttpError::HttpStatus {
        status,
        body_preview,
        content_type,
    })
}

async fn collect_capped(
    response: Response<ResponseBody>,
    limit: usize,
) -> Result<Bytes, HttpError> {
    let mut body = std::pin::pin!(response.into_body());
    let mut buf = Vec::new();

    while let Some(frame) = body.frame().await.transpose().map_err(HttpError::Transport)? {
        let Some(chunk) = frame.data_ref() else {
            continue;
        };
        let actual = buf.len() + chunk.len();
        if actual > limit {
            return Err(HttpError::BodyTooLarge { limit, actual });
        }
        buf.extend_from_slice(chunk);
    }

    Ok(Bytes::from(buf))
}
