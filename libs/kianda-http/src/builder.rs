use crate::client::{BufferedStack, Dispatcher, HttpClient};
use crate::config::{HttpClientConfig, TlsRootConfig, TransportSecurity};
use crate::error::HttpError;
use crate::layers::DefaultHeadersLayer;
use crate::response::ResponseBody;
use crate::tls;
use bytes::Bytes;
use http::{Request, Response};
use http_body_util::{BodyExt, Full};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use std::time::Duration;
use tower::buffer::Buffer;
use tower::limit::ConcurrencyLimitLayer;
use tower::load_shed::LoadShedLayer;
use tower::timeout::TimeoutLayer;
use tower::util::BoxCloneService;
use tower::{BoxError, ServiceBuilder, ServiceExt};
use tower_http::decompression::DecompressionLayer;

/// Type-erased service handed to the auth layer in [`HttpClientBuilder::with_auth_layer`].
pub type InnerService = BoxCloneService<Request<Full<Bytes>>, Response<ResponseBody>, HttpError>;

type AuthWrap = Box<dyn FnOnce(InnerService) -> InnerService + Send>;

/// Builder for an [`HttpClient`].
///
/// The stack, outermost first:
///
/// ```text
/// Buffer -> LoadShed + ConcurrencyLimit -> [auth layer] -> Timeout
///        -> DefaultHeaders -> Decompression -> hyper (rustls)
/// ```
///
/// Nothing in it retries or follows redirects, so every request reaches the
/// wire once and every status comes back to the caller.
#[must_use]
pub struct HttpClientBuilder {
    config: HttpClientConfig,
    auth: Option<AuthWrap>,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClientBuilder {
    pub fn new() -> Self {
        Self::with_config(HttpClientConfig::default())
    }

    pub fn with_config(config: HttpClientConfig) -> Self {
        Self { config, auth: None }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Header sent on every request that does not set it itself.
    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_headers.push((name.into(), value.into()));
        self
    }

    pub fn max_body_size(mut self, size: usize) -> Self {
        self.config.max_body_size = size;
        self
    }

    pub fn transport(mut self, transport: TransportSecurity) -> Self {
        self.config.transport = transport;
        self
    }

    /// Wrap the per-request stack with an auth layer.
    ///
    /// The layer sits inside the concurrency limit and outside the timeout:
    /// it sees each request before default headers are added, and each
    /// response of any status on the way back. Every call it makes to the
    /// inner service gets its own timeout. A second call replaces the first.
    pub fn with_auth_layer(
        mut self,
        wrap: impl FnOnce(InnerService) -> InnerService + Send + 'static,
    ) -> Self {
        self.auth = Some(Box::new(wrap));
        self
    }

    /// # Errors
    /// Returns [`HttpError::Tls`] if the root store cannot be loaded and
    /// [`HttpError::InvalidHeaderValue`]/[`HttpError::InvalidHeaderName`] for
    /// a bad user agent or default header.
    pub fn build(self) -> Result<HttpClient, HttpError> {
        let config = self.config;
        if config.transport == TransportSecurity::AllowInsecureHttp {
            tracing::warn!(
                target: "kianda_http::security",
                "plain HTTP allowed; bearer tokens will travel unencrypted"
            );
        }

        let mut service = per_request_stack(&config)?;
        if let Some(wrap) = self.auth {
            service = wrap(service);
        }
        if let Some(limit) = config.max_in_flight {
            service = shed_over_limit(service, limit);
        }

        // tower::Buffer panics with capacity 0
        let stack: BufferedStack = Buffer::new(service, config.buffer_capacity.max(1));

        Ok(HttpClient {
            dispatcher: Dispatcher::new(stack, config.max_body_size, config.transport),
        })
    }
}

/// Timeout, default headers and decompression over the pooled hyper client.
fn per_request_stack(config: &HttpClientConfig) -> Result<InnerService, HttpError> {
    let mut pool = Client::builder(TokioExecutor::new());
    // pool_idle_timeout has no effect without a pool timer
    pool.pool_timer(TokioTimer::new())
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .pool_idle_timeout(config.pool_idle_timeout);
    let hyper_client = pool.build::<_, Full<Bytes>>(https_connector(config)?);

    let timeout = config.request_timeout;
    let service = ServiceBuilder::new()
        .layer(TimeoutLayer::new(timeout))
        .layer(DefaultHeadersLayer::try_new(
            &config.user_agent,
            &config.default_headers,
        )?)
        .layer(DecompressionLayer::new())
        .service(hyper_client)
        .map_response(box_body)
        .map_err(move |err: BoxError| classify(err, timeout));

    Ok(service.boxed_clone())
}

/// Reject immediately with [`HttpError::Overloaded`] once the limit is reached.
fn shed_over_limit(service: InnerService, limit: usize) -> InnerService {
    ServiceBuilder::new()
        .layer(LoadShedLayer::new())
        .layer(ConcurrencyLimitLayer::new(limit))
        .service(service)
        .map_err(|err: BoxError| classify(err, Duration::ZERO))
        .boxed_clone()
}

/// Turn a middleware error back into an [`HttpError`].
///
/// `timeout` is only reported when the error is a timeout, so callers above
/// the timeout layer pass any value.
fn classify(err: BoxError, timeout: Duration) -> HttpError {
    if err.is::<tower::timeout::error::Elapsed>() {
        return HttpError::Timeout(timeout);
    }
    if err.is::<tower::load_shed::error::Overloaded>() {
        return HttpError::Overloaded;
    }
    match err.downcast::<HttpError>() {
        Ok(http_err) => *http_err,
        Err(other) => HttpError::Transport(other),
    }
}

fn box_body<B>(response: Response<B>) -> Response<ResponseBody>
where
    B: hyper::body::Body<Data = Bytes> + Send + Sync + 'static,
    B::Error: Into<BoxError>,
{
    response.map(|body| body.map_err(Into::into).boxed())
}

/// HTTPS connector for the configured roots; plain `http://` only when the
/// transport allows it. ALPN offers h2 and http/1.1.
fn https_connector(config: &HttpClientConfig) -> Result<HttpsConnector<HttpConnector>, HttpError> {
    let roots = match config.tls_roots {
        TlsRootConfig::WebPki => HttpsConnectorBuilder::new()
            .with_provider_and_webpki_roots(tls::crypto_provider())
            .map_err(|e| HttpError::Tls(Box::new(e)))?,
        TlsRootConfig::Native => HttpsConnectorBuilder::new().with_tls_config(
            tls::native_roots_client_config().map_err(|e| HttpError::Tls(e.into()))?,
        ),
    };
    let schemes = match config.transport {
        TransportSecurity::TlsOnly => roots.https_only(),
        TransportSecurity::AllowInsecureHttp => roots.https_or_http(),
    };
    Ok(schemes.enable_all_versions().build())
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::config::DEFAULT_USER_AGENT;

    #[test]
    fn setters_update_config() {
        let builder = HttpClientBuilder::with_config(HttpClientConfig::minimal())
            .timeout(Duration::from_secs(60))
            .user_agent("kianda-test/1.0")
            .max_body_size(1024)
            .transport(TransportSecurity::AllowInsecureHttp)
            .default_header("x-client", "cli");
        assert_eq!(builder.config.request_timeout, Duration::from_secs(60));
        assert_eq!(builder.config.user_agent, "kianda-test/1.0");
        assert_eq!(builder.config.max_body_size, 1024);
        assert_eq!(builder.config.transport, TransportSecurity::AllowInsecureHttp);
        assert!(
            builder
                .config
                .default_headers
                .contains(&("x-client".to_owned(), "cli".to_owned()))
        );
        assert!(builder.auth.is_none());
    }

    #[test]
    fn defaults_come_from_config() {
        let builder = HttpClientBuilder::new();
        assert_eq!(builder.config.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(builder.config.transport, TransportSecurity::TlsOnly);
    }

    #[tokio::test]
    async fn builds_with_and_without_auth_layer() {
        assert!(HttpClientBuilder::new().build().is_ok());
        assert!(
            HttpClientBuilder::new()
                .with_auth_layer(|svc| svc)
                .build()
                .is_ok()
        );
    }

    #[tokio::test]
    async fn invalid_user_agent_fails_build() {
        let result = HttpClientBuilder::new().user_agent("bad\nagent").build();
        assert!(matches!(result, Err(HttpError::InvalidHeaderValue(_))));
    }

    #[tokio::test]
    async fn zero_buffer_capacity_is_clamped() {
        let config = HttpClientConfig {
            buffer_capacity: 0,
            ..HttpClientConfig::default()
        };
        assert!(HttpClientBuilder::with_config(config).build().is_ok());
    }

    #[test]
    fn classify_maps_middleware_errors() {
        let elapsed: BoxError = Box::new(tower::timeout::error::Elapsed::new());
        assert!(matches!(
            classify(elapsed, Duration::from_secs(5)),
            HttpError::Timeout(d) if d == Duration::from_secs(5)
        ));

        let shed: BoxError = Box::new(tower::load_shed::error::Overloaded::new());
        assert!(matches!(classify(shed, Duration::ZERO), HttpError::Overloaded));

        let typed: BoxError = Box::new(HttpError::ServiceClosed);
        assert!(matches!(classify(typed, Duration::ZERO), HttpError::ServiceClosed));

        let other: BoxError = "connection reset".into();
        assert!(matches!(classify(other, Duration::ZERO), HttpError::Transport(_)));
    }
}
