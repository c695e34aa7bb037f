#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! Authenticated request gateway for the KiandaOS school API.
//!
//! [`AuthGateway`] sends base-relative requests with the stored access token
//! as a bearer credential. When the API answers 401 and a refresh token is
//! stored, the gateway renews the access token once through
//! `POST <base>/api/auth/refresh/` and replays the request with the new
//! token. If renewal fails, both tokens are cleared, the [`LoginRedirect`]
//! fires, and the request fails with [`GatewayError::SessionExpired`].
//!
//! The pieces are usable on their own: [`TokenRenewalLayer`] fits the auth
//! slot of any [`kianda_http::HttpClientBuilder`], and [`TokenRenewer`]
//! performs a single renewal.

mod config;
mod descriptor;
mod error;
mod gateway;
mod http_error;
mod layer;
mod redirect;
mod renewal;
pub mod store;

pub use config::{DEFAULT_REFRESH_PATH, GatewayConfig};
pub use descriptor::{Attempt, RequestDescriptor};
pub use error::{ConfigError, CredentialError, GatewayError, RenewalError};
pub use gateway::{AuthGateway, AuthGatewayBuilder, GatewayRequest};
pub use http_error::format_http_error;
pub use layer::{TokenRenewalLayer, TokenRenewalService};
pub use redirect::{
    ChannelLoginRedirect, LOGIN_ROUTE, LoginRedirect, LoginRequired, NoopLoginRedirect,
};
pub use renewal::TokenRenewer;
pub use store::{CredentialStore, FileCredentialStore, MemoryCredentialStore, TokenKind, TokenPair};

pub use kianda_utils::SecretString;
