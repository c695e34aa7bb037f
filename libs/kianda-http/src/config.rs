use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str = concat!("kianda-http/", env!("CARGO_PKG_VERSION"));

/// Where trusted root certificates come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum TlsRootConfig {
    /// Bundled Mozilla roots (`webpki-roots`).
    #[default]
    WebPki,
    /// The operating system's store, loaded once per process.
    Native,
}

/// Which URL schemes the client will send to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransportSecurity {
    #[default]
    TlsOnly,
    /// Also `http://`, for a backend on `http://localhost:8000` during
    /// development. Bearer tokens then travel in clear text.
    AllowInsecureHttp,
}

/// Settings for one [`HttpClient`](crate::HttpClient).
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Applied to each call through the stack, so a replayed request gets a
    /// fresh budget.
    pub request_timeout: Duration,
    /// Largest response body the readers on [`HttpResponse`](crate::HttpResponse) accept.
    pub max_body_size: usize,
    pub user_agent: String,
    /// Added to requests that do not already carry the header.
    pub default_headers: Vec<(String, String)>,
    /// In-flight request cap; above it requests fail with
    /// [`HttpError::Overloaded`](crate::HttpError::Overloaded). `None` means no cap.
    pub max_in_flight: Option<usize>,
    pub transport: TransportSecurity,
    pub tls_roots: TlsRootConfig,
    /// Requests queued in front of the stack; at least 1.
    pub buffer_capacity: usize,
    pub pool_idle_timeout: Option<Duration>,
    pub pool_max_idle_per_host: usize,
}

fn accept_json() -> Vec<(String, String)> {
    vec![("accept".to_owned(), "application/json".to_owned())]
}

impl Default for HttpClientConfig {
    /// 30s timeout, 10 MiB bodies, 100 in flight, HTTPS only.
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            max_body_size: 10 << 20,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            default_headers: accept_json(),
            max_in_flight: Some(100),
            transport: TransportSecurity::TlsOnly,
            tls_roots: TlsRootConfig::WebPki,
            buffer_capacity: 1024,
            pool_idle_timeout: Some(Duration::from_secs(90)),
            pool_max_idle_per_host: 32,
        }
    }
}

impl HttpClientConfig {
    /// Small footprint for one-off tools: 10s timeout, 1 MiB bodies, no cap.
    #[must_use]
    pub fn minimal() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            max_body_size: 1 << 20,
            max_in_flight: None,
            buffer_capacity: 256,
            pool_idle_timeout: Some(Duration::from_secs(30)),
            pool_max_idle_per_host: 8,
            ..Self::default()
        }
    }

    /// Client for the token renewal endpoint, derived from the API client's
    /// settings.
    ///
    /// Same backend, so timeout, user agent, roots and transport are shared.
    /// Renewal replies are a few hundred bytes and rare, so the body limit,
    /// pool and cap are small.
    #[must_use]
    pub fn renewal_endpoint(api: &HttpClientConfig) -> Self {
        Self {
            request_timeout: api.request_timeout,
            max_body_size: 64 << 10,
            user_agent: api.user_agent.clone(),
            default_headers: accept_json(),
            max_in_flight: Some(10),
            transport: api.transport,
            tls_roots: api.tls_roots,
            buffer_capacity: 256,
            pool_idle_timeout: Some(Duration::from_secs(60)),
            pool_max_idle_per_host: 4,
        }
    }

    /// Local mock servers: plain HTTP, no cap, short idle timeout.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            transport: TransportSecurity::AllowInsecureHttp,
            pool_idle_timeout: Some(Duration::from_secs(10)),
            pool_max_idle_per_host: 4,
            ..Self::minimal()
        }
    }
}
