use std::sync::Arc;

use kianda_http::{HttpClient, HttpClientBuilder, HttpClientConfig, HttpError};
use kianda_utils::SecretString;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ConfigError, RenewalError};
use crate::http_error::format_http_error;
use crate::store::{CredentialStore, TokenKind};

const CONTEXT: &str = "token renewal";

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

#[derive(Deserialize)]
struct RefreshResponse {
    #[serde(default)]
    access: Option<String>,
}

/// Exchanges the refresh token for a new access token.
///
/// Talks to `POST <base><refresh_path>` through its own [`HttpClient`], which
/// has no auth layer: renewal requests carry no `Authorization` header and
/// can never trigger another renewal.
///
/// Concurrent calls are not coalesced. Each 401 renews on its own; a new
/// access token is stored only while the refresh token it was obtained with
/// is still the stored one, so a renewal that outlives a logout or a failed
/// renewal cannot bring back half a session.
pub struct TokenRenewer {
    client: HttpClient,
    endpoint: Url,
    store: Arc<dyn CredentialStore>,
}

impl std::fmt::Debug for TokenRenewer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenRenewer")
            .field("endpoint", &self.endpoint.as_str())
            .finish_non_exhaustive()
    }
}

impl TokenRenewer {
    /// Build a renewer for `endpoint`.
    ///
    /// # Errors
    /// Returns [`ConfigError::Http`] if the HTTP client cannot be built.
    pub fn new(
        endpoint: Url,
        http_config: HttpClientConfig,
        store: Arc<dyn CredentialStore>,
    ) -> Result<Self, ConfigError> {
        let client = HttpClientBuilder::with_config(http_config)
            .build()
            .map_err(ConfigError::Http)?;
        Ok(Self {
            client,
            endpoint,
            store,
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Renew using the refresh token currently in the store.
    ///
    /// # Errors
    /// [`RenewalError::MissingRefreshToken`] if none is stored, otherwise as
    /// [`renew_with`](Self::renew_with).
    pub async fn renew(&self) -> Result<SecretString, RenewalError> {
        let refresh = self
            .store
            .get(TokenKind::Refresh)
            .map_err(RenewalError::Store)?
            .ok_or(RenewalError::MissingRefreshToken)?;
        self.renew_with(&refresh).await
    }

    /// Exchange `refresh_token` for a new access token and store it through
    /// [`CredentialStore::replace_access`].
    ///
    /// The refresh token itself is never modified here.
    ///
    /// # Errors
    /// - [`RenewalError::Transport`] if no response arrived
    /// - [`RenewalError::Rejected`] for a non-2xx status
    /// - [`RenewalError::InvalidResponse`] if `access` is missing, empty, or the
    ///   body is not JSON
    /// - [`RenewalError::SessionEnded`] if `refresh_token` is no longer the
    ///   stored one when the response arrives
    /// - [`RenewalError::Store`] if the new token cannot be stored
    pub async fn renew_with(
        &self,
        refresh_token: &SecretString,
    ) -> Result<SecretString, RenewalError> {
        let body = RefreshRequest {
            refresh: refresh_token.expose(),
        };

        let response = self
            .client
            .post(self.endpoint.as_str())
            .json(&body)
            .map_err(|e| RenewalError::Transport(format_http_error(&e, CONTEXT)))?
            .send()
            .await
            .map_err(|e| RenewalError::Transport(format_http_error(&e, CONTEXT)))?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(%status, "renewal endpoint rejected refresh token");
            return Err(RenewalError::Rejected { status });
        }

        let bytes = response.bytes().await.map_err(|e| match e {
            HttpError::BodyTooLarge { limit, .. } => RenewalError::InvalidResponse(
                format!("response exceeds {limit} bytes"),
            ),
            other => RenewalError::Transport(format_http_error(&other, CONTEXT)),
        })?;

        let parsed: RefreshResponse = serde_json::from_slice(&bytes)
            .map_err(|e| {
                RenewalError::InvalidResponse(format_http_error(&HttpError::Json(e), CONTEXT))
            })?;

        let access = match parsed.access {
            Some(token) if !token.trim().is_empty() => SecretString::new(token),
            Some(_) => return Err(RenewalError::InvalidResponse("empty access token".into())),
            None => return Err(RenewalError::InvalidResponse("missing access field".into())),
        };

        let stored = self
            .store
            .replace_access(refresh_token, access.clone())
            .map_err(RenewalError::Store)?;
        if !stored {
            tracing::debug!("session ended during renewal; discarding new access token");
            return Err(RenewalError::SessionEnded);
        }

        Ok(access)
    }
}
