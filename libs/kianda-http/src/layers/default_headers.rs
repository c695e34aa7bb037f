use crate::error::HttpError;
use http::header::{HeaderName, USER_AGENT};
use http::{HeaderValue, Request, Response};
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Tower layer that fills in `User-Agent` and the configured default headers.
///
/// Headers the caller already set are left untouched.
#[derive(Clone, Debug)]
pub struct DefaultHeadersLayer {
    headers: Arc<[(HeaderName, HeaderValue)]>,
}

impl DefaultHeadersLayer {
    /// Build the layer from a user agent and extra `(name, value)` pairs.
    ///
    /// # Errors
    /// Returns `HttpError::InvalidHeaderName` / `InvalidHeaderValue` for
    /// malformed input.
    pub fn try_new(
        user_agent: impl AsRef<str>,
        defaults: &[(String, String)],
    ) -> Result<Self, HttpError> {
        let mut headers = Vec::with_capacity(defaults.len() + 1);
        headers.push((USER_AGENT, HeaderValue::from_str(user_agent.as_ref())?));
        for (name, value) in defaults {
            headers.push((
                HeaderName::try_from(name.as_str())?,
                HeaderValue::try_from(value.as_str())?,
            ));
        }
        Ok(Self {
            headers: headers.into(),
        })
    }
}

impl<S> Layer<S> for DefaultHeadersLayer {
    type Service = DefaultHeadersService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        DefaultHeadersService {
            inner,
            headers: Arc::clone(&self.headers),
        }
    }
}

/// Service created by [`DefaultHeadersLayer`].
#[derive(Clone, Debug)]
pub struct DefaultHeadersService<S> {
    inner: S,
    headers: Arc<[(HeaderName, HeaderValue)]>,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for DefaultHeadersService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        for (name, value) in self.headers.iter() {
            if !req.headers().contains_key(name) {
                req.headers_mut().insert(name.clone(), value.clone());
            }
        }
        self.inner.call(req)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::{Method, StatusCode};
    use http_body_util::Full;
    use tower::ServiceExt;

    /// Echoes the request headers back as the response headers.
    #[derive(Clone)]
    struct EchoHeaders;

    impl Service<Request<Full<Bytes>>> for EchoHeaders {
        type Response = Response<Full<Bytes>>;
        type Error = Box<dyn std::error::Error + Send + Sync>;
        type Future = std::future::Ready<Result<Self::Response, Self::Error>>;

        fn poll_ready(&mut self, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, req: Request<Full<Bytes>>) -> Self::Future {
            let mut resp = Response::builder()
                .status(StatusCode::OK)
                .body(Full::new(Bytes::new()))
                .unwrap();
            *resp.headers_mut() = req.headers().clone();
            std::future::ready(Ok(resp))
        }
    }

    fn json_defaults() -> Vec<(String, String)> {
        vec![("accept".to_owned(), "application/json".to_owned())]
    }

    #[tokio::test]
    async fn adds_user_agent_and_accept() {
        let layer = DefaultHeadersLayer::try_new("kianda-test/1.0", &json_defaults()).unwrap();
        let svc = layer.layer(EchoHeaders);

        let req = Request::builder()
            .method(Method::GET)
            .uri("http://localhost:8000/api/courses/")
            .body(Full::new(Bytes::new()))
            .unwrap();

        let resp = svc.oneshot(req).await.unwrap();
        assert_eq!(resp.headers()[USER_AGENT], "kianda-test/1.0");
        assert_eq!(resp.headers()["accept"], "application/json");
    }

    #[tokio::test]
    async fn caller_headers_win() {
        let layer = DefaultHeadersLayer::try_new("kianda-test/1.0", &json_defaults()).unwrap();
        let svc = layer.layer(EchoHeaders);

        let req = Request::builder()
            .method(Method::GET)
            .uri("http://localhost:8000/media/report.pdf")
            .header(USER_AGENT, "custom-agent/2.0")
            .header("accept", "application/pdf")
            .body(Full::new(Bytes::new()))
            .unwrap();

        let resp = svc.oneshot(req).await.unwrap();
        assert_eq!(resp.headers()[USER_AGENT], "custom-agent/2.0");
        assert_eq!(resp.headers()["accept"], "application/pdf");
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(DefaultHeadersLayer::try_new("invalid\x00agent", &[]).is_err());
        let bad_name = vec![("bad header".to_owned(), "x".to_owned())];
        assert!(matches!(
            DefaultHeadersLayer::try_new("ok", &bad_name),
            Err(HttpError::InvalidHeaderName(_))
        ));
    }
}
