#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! JSON-over-HTTP client used by the KiandaOS gateway and CLI.
//!
//! Requests go through one tower stack per client. From the outside in it
//! buffers, sheds load past [`HttpClientConfig::max_in_flight`], hands the
//! request to the auth slot if one is installed
//! ([`HttpClientBuilder::with_auth_layer`]), applies the request timeout, adds
//! default headers and decompresses the reply. Connections are pooled by
//! hyper over rustls.
//!
//! Any status the server answers with is an `Ok(HttpResponse)` from
//! [`RequestBuilder::send`]; the caller decides what a 401 or 404 means.
//! The decoding readers such as [`HttpResponse::json`] turn non-2xx into
//! [`HttpError::HttpStatus`]. No request is ever retried or redirected here.
//!
//! ```ignore
//! let client = kianda_http::HttpClient::builder()
//!     .timeout(std::time::Duration::from_secs(10))
//!     .build()?;
//! let me: serde_json::Value = client
//!     .get("https://school.example.com/api/auth/user/")
//!     .header("authorization", "Bearer T1")
//!     .send()
//!     .await?
//!     .json()
//!     .await?;
//! ```

mod builder;
mod client;
mod config;
mod error;
mod layers;
mod request;
mod response;
mod tls;

pub use builder::{HttpClientBuilder, InnerService};
pub use client::HttpClient;
pub use config::{DEFAULT_USER_AGENT, HttpClientConfig, TlsRootConfig, TransportSecurity};
pub use error::{HttpError, UrlProblem};
pub use layers::{DefaultHeadersLayer, DefaultHeadersService};
pub use request::RequestBuilder;
pub use response::{ERROR_BODY_PREVIEW_LIMIT, HttpResponse, ResponseBody};
