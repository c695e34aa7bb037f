use kianda_auth::AuthGateway;
use kianda_http::HttpResponse;
use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// Typed client for the school API.
///
/// All calls go through the [`AuthGateway`], so they carry the stored access
/// token and recover from an expired one transparently. Endpoint groups live
/// in their own modules as further `impl SchoolClient` blocks.
#[derive(Debug, Clone)]
pub struct SchoolClient {
    gateway: AuthGateway,
}

impl SchoolClient {
    #[must_use]
    pub fn new(gateway: AuthGateway) -> Self {
        Self { gateway }
    }

    #[must_use]
    pub fn gateway(&self) -> &AuthGateway {
        &self.gateway
    }
}

/// Decode a 2xx JSON body; anything else becomes [`ApiError::Status`].
pub async fn read_json<T: DeserializeOwned>(response: HttpResponse) -> Result<T, ApiError> {
    Ok(response.json().await?)
}
