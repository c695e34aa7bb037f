use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use http::{Request, Response, StatusCode};
use http_body_util::Full;
use kianda_http::HttpError;
use kianda_utils::SecretString;
use tower::{Layer, Service, ServiceExt};

use crate::descriptor::{Attempt, RequestDescriptor};
use crate::error::{CredentialError, RenewalError};
use crate::redirect::LoginRedirect;
use crate::renewal::TokenRenewer;
use crate::store::{CredentialStore, TokenKind};

/// Tower layer that attaches the stored access token to every request and
/// recovers from a single 401 by renewing the token and replaying.
///
/// Per request:
/// - `Authorization: Bearer <access>` when an access token is stored
/// - any response other than 401, and any transport error, passes through
/// - 401 without both tokens stored, or on the replay, passes through
/// - 401 otherwise: renew, then replay once with the new token and return
///   whatever the replay produces
/// - renewal failure: clear both tokens, signal the login redirect, and fail
///   with [`HttpError::Auth`] wrapping the [`RenewalError`]
#[derive(Clone)]
pub struct TokenRenewalLayer {
    shared: Arc<Shared>,
}

struct Shared {
    store: Arc<dyn CredentialStore>,
    renewer: TokenRenewer,
    redirect: Arc<dyn LoginRedirect>,
}

impl TokenRenewalLayer {
    #[must_use]
    pub fn new(
        store: Arc<dyn CredentialStore>,
        renewer: TokenRenewer,
        redirect: Arc<dyn LoginRedirect>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                store,
                renewer,
                redirect,
            }),
        }
    }
}

impl std::fmt::Debug for TokenRenewalLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenRenewalLayer")
            .field("renewer", &self.shared.renewer)
            .finish_non_exhaustive()
    }
}

impl<S> Layer<S> for TokenRenewalLayer {
    type Service = TokenRenewalService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TokenRenewalService {
            inner,
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Service created by [`TokenRenewalLayer`].
#[derive(Clone)]
pub struct TokenRenewalService<S> {
    inner: S,
    shared: Arc<Shared>,
}

impl<S> TokenRenewalService<S> {
    #[must_use]
    pub fn new(inner: S, layer: &TokenRenewalLayer) -> Self {
        layer.layer(inner)
    }
}

impl<S, ResBody> Service<Request<Full<Bytes>>> for TokenRenewalService<S>
where
    S: Service<Request<Full<Bytes>>, Response = Response<ResBody>, Error = HttpError>
        + Clone
        + Send
        + 'static,
    S::Future: Send,
    ResBody: Send + 'static,
{
    type Response = Response<ResBody>;
    type Error = HttpError;
    type Future = Pin<Box<dyn Future<Output = Result<Response<ResBody>, HttpError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Full<Bytes>>) -> Self::Future {
        // Clone-swap: the instance that was polled ready serves this call
        let clone = self.inner.clone();
        let inner = std::mem::replace(&mut self.inner, clone);
        let shared = Arc::clone(&self.shared);

        Box::pin(async move { shared.execute(inner, req).await })
    }
}

impl Shared {
    async fn execute<S, ResBody>(
        &self,
        mut inner: S,
        req: Request<Full<Bytes>>,
    ) -> Result<Response<ResBody>, HttpError>
    where
        S: Service<Request<Full<Bytes>>, Response = Response<ResBody>, Error = HttpError>,
    {
        let descriptor = RequestDescriptor::from_request(req);
        let attempt = Attempt::Original;

        let access = self.read(TokenKind::Access)?;
        let response = inner
            .call(descriptor.to_request(attempt, access.as_ref())?)
            .await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let Some(refresh) = self.renewable(attempt)? else {
            tracing::debug!(
                method = %descriptor.method(),
                uri = %descriptor.uri(),
                "401 without a renewable session; passing through"
            );
            return Ok(response);
        };
        drop(response);

        tracing::debug!(
            method = %descriptor.method(),
            uri = %descriptor.uri(),
            "401 received; renewing access token"
        );

        let token = match self.renewer.renew_with(&refresh).await {
            Ok(token) => token,
            Err(err) => return Err(self.end_session(&descriptor, err)),
        };

        tracing::info!(
            method = %descriptor.method(),
            uri = %descriptor.uri(),
            "access token renewed; replaying request"
        );

        let replay = descriptor.to_request(Attempt::Replay, Some(&token))?;
        inner.ready().await?.call(replay).await
    }

    /// The refresh token to renew with, if a 401 on `attempt` is recoverable.
    fn renewable(&self, attempt: Attempt) -> Result<Option<SecretString>, HttpError> {
        if !attempt.may_renew() {
            return Ok(None);
        }
        if self.read(TokenKind::Access)?.is_none() {
            return Ok(None);
        }
        self.read(TokenKind::Refresh)
    }

    fn read(&self, kind: TokenKind) -> Result<Option<SecretString>, HttpError> {
        self.store.get(kind).map_err(credential_failure)
    }

    /// Terminal renewal failure: clear, signal once, surface the renewal error.
    fn end_session(&self, descriptor: &RequestDescriptor, err: RenewalError) -> HttpError {
        tracing::warn!(
            method = %descriptor.method(),
            uri = %descriptor.uri(),
            error = %err,
            "access token renewal failed; clearing session"
        );
        if let Err(clear_err) = self.store.clear_all() {
            tracing::error!(error = %clear_err, "failed to clear stored credentials");
        }
        self.redirect.redirect_to_login(&err);
        HttpError::Auth(Box::new(err))
    }
}

fn credential_failure(err: CredentialError) -> HttpError {
    tracing::error!(error = %err, "credential store read failed");
    HttpError::Auth(Box::new(err))
}
