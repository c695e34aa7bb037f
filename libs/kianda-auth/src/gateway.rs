use std::sync::Arc;

use bytes::Bytes;
use http::Method;
use kianda_http::{HttpClient, HttpClientBuilder, HttpClientConfig, HttpResponse, RequestBuilder};
use serde::Serialize;
use tower::ServiceExt;
use url::Url;

use crate::config::GatewayConfig;
use crate::error::{ConfigError, GatewayError};
use crate::layer::TokenRenewalLayer;
use crate::redirect::{LoginRedirect, NoopLoginRedirect};
use crate::renewal::TokenRenewer;
use crate::store::{CredentialStore, MemoryCredentialStore, TokenKind};

/// Authenticated entry point to the school API.
///
/// Every request built here goes through [`TokenRenewalLayer`]: it carries
/// the stored access token, and a 401 is recovered by one renewal and one
/// replay. Paths are relative to the configured base URL.
///
/// `AuthGateway` is cheap to clone; clones share the client and the store.
///
/// ```ignore
/// let gateway = AuthGateway::builder(GatewayConfig::new("http://localhost:8000")?)
///     .store(Arc::new(FileCredentialStore::default_location()?))
///     .build()?;
///
/// let students: Vec<Student> = gateway
///     .get("/api/students/")
///     .send()
///     .await?
///     .json()
///     .await?;
/// ```
#[derive(Clone)]
pub struct AuthGateway {
    config: Arc<GatewayConfig>,
    store: Arc<dyn CredentialStore>,
    client: HttpClient,
}

impl std::fmt::Debug for AuthGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthGateway")
            .field("base_url", &self.config.base_url.as_str())
            .field("refresh_path", &self.config.refresh_path)
            .finish_non_exhaustive()
    }
}

impl AuthGateway {
    #[must_use]
    pub fn builder(config: GatewayConfig) -> AuthGatewayBuilder {
        AuthGatewayBuilder {
            config,
            store: None,
            redirect: None,
        }
    }

    /// Gateway over `store` with no login-redirect handling.
    ///
    /// # Errors
    /// Returns [`ConfigError`] for invalid configuration or if an HTTP client
    /// cannot be built.
    pub fn new(config: GatewayConfig, store: Arc<dyn CredentialStore>) -> Result<Self, ConfigError> {
        Self::builder(config).store(store).build()
    }

    pub fn request(&self, method: Method, path: &str) -> GatewayRequest {
        let inner = self
            .url(path)
            .map(|url| self.client.request(method, url.as_str()));
        GatewayRequest { inner }
    }

    pub fn get(&self, path: &str) -> GatewayRequest {
        self.request(Method::GET, path)
    }

    pub fn post(&self, path: &str) -> GatewayRequest {
        self.request(Method::POST, path)
    }

    pub fn put(&self, path: &str) -> GatewayRequest {
        self.request(Method::PUT, path)
    }

    pub fn patch(&self, path: &str) -> GatewayRequest {
        self.request(Method::PATCH, path)
    }

    pub fn delete(&self, path: &str) -> GatewayRequest {
        self.request(Method::DELETE, path)
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.config.base_url
    }

    #[must_use]
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Absolute URL for a base-relative `path`.
    ///
    /// # Errors
    /// Returns [`GatewayError::InvalidPath`] unless `path` starts with a single `/`.
    pub fn url(&self, path: &str) -> Result<Url, GatewayError> {
        self.config
            .join(path)
            .map_err(|reason| GatewayError::InvalidPath {
                path: path.to_owned(),
                reason,
            })
    }

    /// `true` if an access token is stored.
    ///
    /// # Errors
    /// Returns [`GatewayError::Credentials`] if the store cannot be read.
    pub fn is_authenticated(&self) -> Result<bool, GatewayError> {
        self.store
            .get(TokenKind::Access)
            .map(|token| token.is_some())
            .map_err(GatewayError::Credentials)
    }
}

/// Builder for [`AuthGateway`].
#[must_use]
pub struct AuthGatewayBuilder {
    config: GatewayConfig,
    store: Option<Arc<dyn CredentialStore>>,
    redirect: Option<Arc<dyn LoginRedirect>>,
}

impl AuthGatewayBuilder {
    /// Credential store (default: a fresh [`MemoryCredentialStore`]).
    pub fn store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Receiver of the login-redirect signal (default: [`NoopLoginRedirect`]).
    pub fn login_redirect(mut self, redirect: impl LoginRedirect + 'static) -> Self {
        self.redirect = Some(Arc::new(redirect));
        self
    }

    /// Like [`login_redirect`](Self::login_redirect), for an already shared receiver.
    pub fn shared_login_redirect(mut self, redirect: Arc<dyn LoginRedirect>) -> Self {
        self.redirect = Some(redirect);
        self
    }

    /// Build the gateway.
    ///
    /// # Errors
    /// Returns [`ConfigError`] for invalid configuration or if either HTTP
    /// client cannot be built.
    pub fn build(self) -> Result<AuthGateway, ConfigError> {
        self.config.validate()?;

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryCredentialStore::new()));
        let redirect = self
            .redirect
            .unwrap_or_else(|| Arc::new(NoopLoginRedirect));

        let renewer = TokenRenewer::new(
            self.config.refresh_url()?,
            HttpClientConfig::renewal_endpoint(&self.config.http),
            Arc::clone(&store),
        )?;
        let layer = TokenRenewalLayer::new(Arc::clone(&store), renewer, redirect);

        let client = HttpClientBuilder::with_config(self.config.http.clone())
            .with_auth_layer(move |svc| {
                tower::ServiceBuilder::new()
                    .layer(layer)
                    .service(svc)
                    .boxed_clone()
            })
            .build()
            .map_err(ConfigError::Http)?;

        tracing::debug!(base_url = %self.config.base_url, "auth gateway ready");

        Ok(AuthGateway {
            config: Arc::new(self.config),
            store,
            client,
        })
    }
}

/// Request built by [`AuthGateway`]; nothing is sent until [`send`](Self::send).
#[must_use = "GatewayRequest does nothing until .send() is called"]
pub struct GatewayRequest {
    inner: Result<RequestBuilder, GatewayError>,
}

impl GatewayRequest {
    pub fn header(self, name: &str, value: &str) -> Self {
        Self {
            inner: self.inner.map(|rb| rb.header(name, value)),
        }
    }

    /// JSON body with `Content-Type: application/json`.
    ///
    /// # Errors
    /// Returns the deferred path error, a deferred header error, or a JSON
    /// serialization error.
    pub fn json<T: Serialize + ?Sized>(self, body: &T) -> Result<Self, GatewayError> {
        let rb = self.inner?.json(body)?;
        Ok(Self { inner: Ok(rb) })
    }

    pub fn body_bytes(self, body: Bytes) -> Self {
        Self {
            inner: self.inner.map(|rb| rb.body_bytes(body)),
        }
    }

    /// Send the request.
    ///
    /// Resolves to `Ok` for every HTTP status, including a 401 that could not
    /// be recovered because no session was stored or the replay was also
    /// rejected.
    ///
    /// # Errors
    /// - [`GatewayError::SessionExpired`] when renewal failed; both tokens are
    ///   already cleared and the login redirect has fired
    /// - [`GatewayError::Http`] for transport and request-building failures
    /// - [`GatewayError::Credentials`] if the store could not be read
    /// - [`GatewayError::InvalidPath`] for a path that is not base-relative
    pub async fn send(self) -> Result<HttpResponse, GatewayError> {
        Ok(self.inner?.send().await?)
    }
}
