#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! Typed calls for the KiandaOS school API.
//!
//! [`SchoolClient`] sits on an [`kianda_auth::AuthGateway`]: login stores the
//! token pair, and every later call is authenticated and renewed by the
//! gateway.

mod attendance;
mod client;
mod courses;
mod error;
mod grades;
mod models;
mod session;

pub use client::SchoolClient;
pub use error::ApiError;
pub use grades::GradeSubmission;
pub use models::{Profile, Role, User};
pub use session::CsrfToken;
