use std::sync::Arc;

use bytes::Bytes;
use http::header::AUTHORIZATION;
use http::{HeaderValue, Request};
use http_body_util::Full;
use kianda_http::HttpError;
use kianda_utils::SecretString;
use zeroize::Zeroizing;

/// Which send of a request this is.
///
/// A request is replayed at most once, after a successful renewal. The
/// attempt is recorded in the outbound request's extensions so inner layers
/// can tell a replay apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attempt {
    Original,
    Replay,
}

impl Attempt {
    /// Whether a 401 on this attempt may still be answered with a renewal.
    #[must_use]
    pub const fn may_renew(self) -> bool {
        matches!(self, Self::Original)
    }
}

/// Immutable snapshot of an outbound request: method, URI, headers, body.
///
/// Produces the concrete request for each [`Attempt`], with the bearer
/// token current at that moment.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    parts: Arc<http::request::Parts>,
    body: Full<Bytes>,
}

impl RequestDescriptor {
    #[must_use]
    pub fn from_request(req: Request<Full<Bytes>>) -> Self {
        let (parts, body) = req.into_parts();
        Self {
            parts: Arc::new(parts),
            body,
        }
    }

    #[must_use]
    pub fn method(&self) -> &http::Method {
        &self.parts.method
    }

    #[must_use]
    pub fn uri(&self) -> &http::Uri {
        &self.parts.uri
    }

    /// Build the request for `attempt`.
    ///
    /// With a token, `Authorization: Bearer <token>` replaces any caller
    /// value and is marked sensitive. Without one the caller's headers are
    /// left as they are.
    ///
    /// # Errors
    /// Returns [`HttpError::InvalidHeaderValue`] if the token contains bytes
    /// that cannot appear in a header.
    pub fn to_request(
        &self,
        attempt: Attempt,
        token: Option<&SecretString>,
    ) -> Result<Request<Full<Bytes>>, HttpError> {
        let mut req = Request::from_parts((*self.parts).clone(), self.body.clone());
        // Parts::clone drops extensions that are not Clone; restore what we can
        *req.version_mut() = self.parts.version;
        *req.extensions_mut() = self.parts.extensions.clone();
        req.extensions_mut().insert(attempt);

        if let Some(token) = token {
            req.headers_mut()
                .insert(AUTHORIZATION, bearer_header(token)?);
        }
        Ok(req)
    }
}

fn bearer_header(token: &SecretString) -> Result<HeaderValue, HttpError> {
    let raw = Zeroizing::new(format!("Bearer {}", token.expose()));
    let mut value = HeaderValue::from_str(&raw)?;
    value.set_sensitive(true);
    Ok(value)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use http::Method;
    use http_body_util::BodyExt;

    fn descriptor() -> RequestDescriptor {
        RequestDescriptor::from_request(
            Request::builder()
                .method(Method::POST)
                .uri("http://localhost:8000/api/students/bulk_attendance/")
                .header("content-type", "application/json")
                .body(Full::new(Bytes::from_static(br#"{"attendance":[]}"#)))
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn rebuilds_identical_requests() {
        let d = descriptor();
        let token = SecretString::new("T1");
        let first = d.to_request(Attempt::Original, Some(&token)).unwrap();
        let second = d.to_request(Attempt::Original, Some(&token)).unwrap();

        assert_eq!(first.method(), second.method());
        assert_eq!(first.uri(), second.uri());
        assert_eq!(first.headers(), second.headers());

        let a = first.into_body().collect().await.unwrap().to_bytes();
        let b = second.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(a, b);
        assert_eq!(&a[..], br#"{"attendance":[]}"#);
    }

    #[test]
    fn bearer_header_is_sensitive() {
        let req = descriptor()
            .to_request(Attempt::Original, Some(&SecretString::new("T1")))
            .unwrap();
        let value = req.headers().get(AUTHORIZATION).unwrap();
        assert_eq!(value, "Bearer T1");
        assert!(value.is_sensitive());
    }

    #[test]
    fn no_token_no_header() {
        let req = descriptor().to_request(Attempt::Original, None).unwrap();
        assert!(req.headers().get(AUTHORIZATION).is_none());
    }

    #[test]
    fn token_replaces_caller_authorization() {
        let d = RequestDescriptor::from_request(
            Request::builder()
                .uri("http://localhost:8000/api/")
                .header("authorization", "Bearer stale")
                .body(Full::new(Bytes::new()))
                .unwrap(),
        );
        let req = d
            .to_request(Attempt::Replay, Some(&SecretString::new("T2")))
            .unwrap();
        let values: Vec<_> = req.headers().get_all(AUTHORIZATION).iter().collect();
        assert_eq!(values, vec!["Bearer T2"]);
    }

    #[test]
    fn attempt_is_recorded_in_extensions() {
        let req = descriptor().to_request(Attempt::Replay, None).unwrap();
        assert_eq!(req.extensions().get::<Attempt>(), Some(&Attempt::Replay));
        assert!(!Attempt::Replay.may_renew());
        assert!(Attempt::Original.may_renew());
    }

    #[test]
    fn malformed_token_is_header_error() {
        let err = descriptor()
            .to_request(Attempt::Original, Some(&SecretString::new("T1\nX")))
            .unwrap_err();
        assert!(matches!(err, HttpError::InvalidHeaderValue(_)));
    }
}
