#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Small helpers shared by the KiandaOS client crates.

#[cfg(feature = "duration-serde")]
pub mod duration_serde;
mod secret_string;

pub use secret_string::SecretString;
