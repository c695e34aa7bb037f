//! Login, logout, and the current user.

use http::header::{COOKIE, SET_COOKIE};
use kianda_auth::TokenPair;
use kianda_utils::SecretString;
use serde::{Deserialize, Serialize};

use crate::client::{SchoolClient, read_json};
use crate::error::ApiError;
use crate::models::{Profile, User, UserPayload};

const CSRF_PATH: &str = "/api/auth/csrf/";
const LOGIN_PATH: &str = "/api/auth/login/";
const LOGOUT_PATH: &str = "/api/auth/logout/";
const USER_PATH: &str = "/api/auth/user/";
const PROFILE_PATH: &str = "/api/auth/profile/";
const CSRF_COOKIE: &str = "csrftoken";

/// CSRF material required by the login endpoint.
#[derive(Debug, Clone)]
pub struct CsrfToken {
    /// Value for the `X-CSRFToken` header.
    pub token: SecretString,
    /// `csrftoken` cookie from `Set-Cookie`, if the server sent one.
    pub cookie: Option<SecretString>,
}

#[derive(Deserialize)]
struct CsrfResponse {
    #[serde(rename = "csrfToken", default)]
    csrf_token: Option<String>,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    #[serde(default)]
    access: Option<String>,
    #[serde(default)]
    refresh: Option<String>,
    #[serde(default)]
    user: Option<UserPayload>,
}

fn non_blank(value: Option<String>, what: &'static str) -> Result<SecretString, ApiError> {
    value
        .map(SecretString::from)
        .filter(|token| !token.is_blank())
        .ok_or(ApiError::MissingToken(what))
}

/// Value of `name` among the response's `Set-Cookie` headers.
fn cookie_value(headers: &http::HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|cookie| cookie.split(';').next())
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim().to_owned())
}

impl SchoolClient {
    /// `GET /api/auth/csrf/`.
    ///
    /// # Errors
    /// [`ApiError::MissingCsrfToken`] if the body has no `csrfToken`, or any
    /// request/status error.
    pub async fn csrf_token(&self) -> Result<CsrfToken, ApiError> {
        let response = self.gateway().get(CSRF_PATH).send().await?;
        let cookie = cookie_value(response.headers(), CSRF_COOKIE).map(SecretString::from);
        let body: CsrfResponse = read_json(response).await?;
        let token = body
            .csrf_token
            .map(SecretString::from)
            .filter(|t| !t.is_blank())
            .ok_or(ApiError::MissingCsrfToken)?;
        Ok(CsrfToken { token, cookie })
    }

    /// Log in with email and password and store the returned token pair.
    ///
    /// Any stored session is discarded first, so a rejected password comes
    /// back as [`ApiError::Status`] instead of triggering a renewal. Tokens
    /// are stored only once the response has carried a user with an id.
    ///
    /// # Errors
    /// - [`ApiError::Status`] for rejected credentials
    /// - [`ApiError::MissingUserId`] / [`ApiError::MissingToken`] for an
    ///   incomplete response (nothing is stored)
    /// - [`ApiError::Credentials`] if the store cannot be written
    pub async fn login(&self, email: &str, password: &SecretString) -> Result<User, ApiError> {
        self.gateway().store().clear_all()?;

        let csrf = self.csrf_token().await?;
        let mut request = self
            .gateway()
            .post(LOGIN_PATH)
            .header("x-csrftoken", csrf.token.expose());
        if let Some(cookie) = &csrf.cookie {
            request = request.header(COOKIE.as_str(), &format!("{CSRF_COOKIE}={}", cookie.expose()));
        }

        let response = request
            .json(&LoginRequest {
                email,
                password: password.expose(),
            })?
            .send()
            .await?;
        let body: LoginResponse = read_json(response).await?;

        let user = body
            .user
            .ok_or(ApiError::MissingUserId("login"))?
            .into_user("login")?;
        let pair = TokenPair::new(
            non_blank(body.access, "access token")?,
            non_blank(body.refresh, "refresh token")?,
        );
        self.gateway().store().set_pair(pair)?;

        tracing::info!(user_id = user.id, role = ?user.role, "logged in");
        Ok(user)
    }

    /// `POST /api/auth/logout/`, then clear both tokens.
    ///
    /// The server call is best effort: its failure is logged and the local
    /// session is cleared regardless.
    ///
    /// # Errors
    /// [`ApiError::Credentials`] if the store cannot be cleared.
    pub async fn logout(&self) -> Result<(), ApiError> {
        match self.gateway().post(LOGOUT_PATH).send().await {
            Ok(response) if response.status().is_success() => {
                tracing::debug!("server session closed");
            }
            Ok(response) => {
                tracing::warn!(status = %response.status(), "logout request rejected; clearing local session");
            }
            Err(err) => {
                tracing::warn!(error = %err, "logout request failed; clearing local session");
            }
        }
        self.gateway().store().clear_all()?;
        Ok(())
    }

    /// `GET /api/auth/user/`.
    ///
    /// # Errors
    /// [`ApiError::MissingUserId`] if the user object has no id, or any
    /// request/status error.
    pub async fn current_user(&self) -> Result<User, ApiError> {
        let response = self.gateway().get(USER_PATH).send().await?;
        let payload: UserPayload = read_json(response).await?;
        payload.into_user("user")
    }

    /// `GET /api/auth/profile/`.
    ///
    /// # Errors
    /// Any request/status/decode error.
    pub async fn profile(&self) -> Result<Profile, ApiError> {
        let response = self.gateway().get(PROFILE_PATH).send().await?;
        read_json(response).await
    }

    /// `PUT /api/auth/profile/`; returns the profile as saved.
    ///
    /// # Errors
    /// Any request/status/decode error.
    pub async fn update_profile(&self, profile: &Profile) -> Result<Profile, ApiError> {
        let response = self
            .gateway()
            .put(PROFILE_PATH)
            .json(profile)?
            .send()
            .await?;
        read_json(response).await
    }
}
