//! `serde` adapter for human-readable durations (`"30s"`, `"1m 30s"`).
//!
//! ```
//! use serde::Deserialize;
//! use std::time::Duration;
//!
//! #[derive(Deserialize)]
//! struct Timeouts {
//!     #[serde(with = "kianda_utils::duration_serde")]
//!     request: Duration,
//! }
//!
//! let t: Timeouts = serde_json::from_str(r#"{"request": "1m 30s"}"#).unwrap();
//! assert_eq!(t.request, Duration::from_secs(90));
//! ```

use std::fmt;
use std::time::Duration;

use serde::{Deserializer, Serializer, de};

/// Serialize a `Duration` as a humantime string.
///
/// # Errors
/// Propagates serializer errors.
pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_str(&humantime::format_duration(*value))
}

/// Deserialize a `Duration` from a humantime string.
///
/// # Errors
/// Fails when the input is not a string or cannot be parsed as a duration.
pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    struct DurationVisitor;

    impl de::Visitor<'_> for DurationVisitor {
        type Value = Duration;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a duration such as \"30s\" or \"1m 30s\"")
        }

        fn visit_str<E>(self, v: &str) -> Result<Duration, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v).map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))
        }
    }

    deserializer.deserialize_str(DurationVisitor)
}
