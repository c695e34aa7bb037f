use std::path::PathBuf;

use kianda_http::HttpError;
use thiserror::Error;

/// Failure reading or writing the credential store.
///
/// Token values never appear in these messages.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CredentialError {
    #[error("credential file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("credential file {path} is not valid JSON: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no data directory available for the credential file")]
    NoDataDir,
}

/// Why an access token could not be renewed.
///
/// Every variant is terminal for the request that triggered renewal: the
/// gateway clears both tokens and signals a login redirect.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RenewalError {
    /// No refresh token was stored when renewal was attempted.
    #[error("no refresh token available")]
    MissingRefreshToken,

    /// The renewal request never produced a response.
    ///
    /// The message comes from [`format_http_error`](crate::format_http_error)
    /// and carries no response body.
    #[error("{0}")]
    Transport(String),

    /// The renewal endpoint answered with a non-2xx status.
    #[error("token renewal rejected with HTTP {status}")]
    Rejected { status: http::StatusCode },

    /// 2xx response without a usable `access` field.
    #[error("invalid token renewal response: {0}")]
    InvalidResponse(String),

    /// The refresh token used for renewal was cleared or replaced before the
    /// new access token could be stored. Nothing was written.
    #[error("session ended while the access token was being renewed")]
    SessionEnded,

    /// The new access token could not be written to the store.
    #[error("failed to store renewed access token: {0}")]
    Store(#[source] CredentialError),
}

/// Gateway configuration errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("invalid refresh path '{0}': must start with '/'")]
    InvalidRefreshPath(String),

    #[error("failed to build HTTP client: {0}")]
    Http(#[source] HttpError),
}

/// Error returned by [`GatewayRequest::send`](crate::GatewayRequest::send).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GatewayError {
    /// Transport or request-building failure.
    #[error(transparent)]
    Http(HttpError),

    /// A 401 could not be recovered by renewal; stored tokens were cleared
    /// and the login redirect was signalled.
    #[error("session expired: {0}")]
    SessionExpired(#[source] RenewalError),

    /// The credential store could not be read.
    #[error("credential store error: {0}")]
    Credentials(#[source] CredentialError),

    /// The path is not a base-relative path such as `/api/students/`.
    #[error("invalid request path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },
}

impl GatewayError {
    /// `true` when the caller should send the user back to the login route.
    #[must_use]
    pub fn is_session_expired(&self) -> bool {
        matches!(self, Self::SessionExpired(_))
    }
}

impl From<HttpError> for GatewayError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::Auth(source) => match source.downcast::<RenewalError>() {
                Ok(renewal) => Self::SessionExpired(*renewal),
                Err(source) => match source.downcast::<CredentialError>() {
                    Ok(credentials) => Self::Credentials(*credentials),
                    Err(other) => Self::Http(HttpError::Auth(other)),
                },
            },
            other => Self::Http(other),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn renewal_failure_becomes_session_expired() {
        let err = GatewayError::from(HttpError::Auth(Box::new(RenewalError::Rejected {
            status: http::StatusCode::UNAUTHORIZED,
        })));
        assert!(err.is_session_expired());
        assert_eq!(
            err.to_string(),
            "session expired: token renewal rejected with HTTP 401 Unauthorized"
        );
    }

    #[test]
    fn credential_failure_becomes_credentials() {
        let err = GatewayError::from(HttpError::Auth(Box::new(CredentialError::NoDataDir)));
        assert!(matches!(err, GatewayError::Credentials(CredentialError::NoDataDir)));
    }

    #[test]
    fn other_http_errors_pass_through() {
        let err = GatewayError::from(HttpError::Overloaded);
        assert!(matches!(err, GatewayError::Http(HttpError::Overloaded)));
        assert!(!err.is_session_expired());
    }

    #[test]
    fn invalid_response_renders() {
        let e = RenewalError::InvalidResponse("missing access".into());
        assert_eq!(e.to_string(), "invalid token renewal response: missing access");
    }
}
