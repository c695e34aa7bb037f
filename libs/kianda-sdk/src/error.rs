use http::StatusCode;
use kianda_auth::{CredentialError, GatewayError};
use kianda_http::HttpError;
use thiserror::Error;

/// Errors returned by the school API calls.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    /// The request could not be sent, or the session could not be renewed.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// The API answered with a non-2xx status.
    #[error("HTTP {status}: {body_preview}")]
    Status {
        status: StatusCode,
        body_preview: String,
    },

    /// The response body could not be read or decoded.
    #[error("invalid response: {0}")]
    InvalidResponse(#[source] HttpError),

    /// A user object without an `id`.
    #[error("user ID not found in {0} response")]
    MissingUserId(&'static str),

    /// The login response lacked a usable access or refresh token.
    #[error("login response missing {0}")]
    MissingToken(&'static str),

    /// `GET /api/auth/csrf/` returned no `csrfToken`.
    #[error("CSRF token not found in response")]
    MissingCsrfToken,

    /// The credential store could not be updated.
    #[error("credential store error: {0}")]
    Credentials(#[from] CredentialError),
}

impl ApiError {
    /// `true` when the session ended and the user must log in again.
    #[must_use]
    pub fn is_session_expired(&self) -> bool {
        matches!(self, Self::Gateway(e) if e.is_session_expired())
    }

    /// HTTP status for [`ApiError::Status`].
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<HttpError> for ApiError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::HttpStatus {
                status,
                body_preview,
                ..
            } => Self::Status {
                status,
                body_preview,
            },
            other => Self::InvalidResponse(other),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use kianda_auth::RenewalError;

    #[test]
    fn http_status_maps_to_status() {
        let err = ApiError::from(HttpError::HttpStatus {
            status: StatusCode::BAD_REQUEST,
            body_preview: r#"{"score":["required"]}"#.into(),
            content_type: None,
        });
        assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
        assert!(!err.is_session_expired());
    }

    #[test]
    fn session_expired_is_detected() {
        let err = ApiError::from(GatewayError::SessionExpired(
            RenewalError::MissingRefreshToken,
        ));
        assert!(err.is_session_expired());
        assert_eq!(err.status(), None);
    }
}
