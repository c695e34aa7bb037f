use kianda_http::HttpClientConfig;
use url::Url;

use crate::error::ConfigError;

/// Default renewal endpoint, relative to the base URL.
pub const DEFAULT_REFRESH_PATH: &str = "/api/auth/refresh/";

/// Configuration for an [`AuthGateway`](crate::AuthGateway).
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Backend root, e.g. `http://localhost:8000`. Request paths are appended to it.
    pub base_url: Url,

    /// Renewal endpoint path (default: `/api/auth/refresh/`).
    pub refresh_path: String,

    /// Transport settings for API requests. The renewal client derives its
    /// own settings from these via [`HttpClientConfig::renewal_endpoint`].
    pub http: HttpClientConfig,
}

impl GatewayConfig {
    /// Configuration with default renewal path and transport settings.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidBaseUrl`] if `base_url` does not parse
    /// or is not an `http`/`https` URL with a host.
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            refresh_path: DEFAULT_REFRESH_PATH.to_owned(),
            http: HttpClientConfig::default(),
        })
    }

    /// Configuration for local mock servers: plain HTTP allowed, no concurrency limit.
    ///
    /// # Errors
    /// Same as [`GatewayConfig::new`].
    pub fn for_testing(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            http: HttpClientConfig::for_testing(),
            ..Self::new(base_url)?
        })
    }

    /// Check the parts that `Url` parsing does not.
    ///
    /// # Errors
    /// Returns [`ConfigError`] for a relative refresh path or a base URL
    /// without host.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.refresh_path.starts_with('/') {
            return Err(ConfigError::InvalidRefreshPath(self.refresh_path.clone()));
        }
        check_base_url(&self.base_url)
    }

    /// Absolute URL of `path` under the base URL.
    ///
    /// Plain concatenation, so a base URL with a path prefix keeps it:
    /// `https://host/school` + `/api/x/` is `https://host/school/api/x/`.
    ///
    /// # Errors
    /// Returns the reason the path was rejected.
    pub fn join(&self, path: &str) -> Result<Url, String> {
        if !path.starts_with('/') {
            return Err("path must start with '/'".to_owned());
        }
        if path.starts_with("//") {
            return Err("path must not start with '//'".to_owned());
        }
        let base = self.base_url.as_str().trim_end_matches('/');
        Url::parse(&format!("{base}{path}")).map_err(|e| e.to_string())
    }

    /// Absolute URL of the renewal endpoint.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidRefreshPath`] if the path cannot be joined.
    pub fn refresh_url(&self) -> Result<Url, ConfigError> {
        self.join(&self.refresh_path)
            .map_err(|_| ConfigError::InvalidRefreshPath(self.refresh_path.clone()))
    }
}

fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::InvalidBaseUrl {
        url: raw.to_owned(),
        reason: e.to_string(),
    })?;
    check_base_url(&url)?;
    Ok(url)
}

fn check_base_url(url: &Url) -> Result<(), ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidBaseUrl {
        url: url.to_string(),
        reason: reason.to_owned(),
    };
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host"));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(invalid("must not carry a query or fragment"));
    }
    Ok(())
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = GatewayConfig::new("http://localhost:8000").unwrap();
        assert_eq!(config.refresh_path, DEFAULT_REFRESH_PATH);
        assert_eq!(
            config.refresh_url().unwrap().as_str(),
            "http://localhost:8000/api/auth/refresh/"
        );
        config.validate().unwrap();
    }

    #[test]
    fn join_keeps_base_prefix() {
        let config = GatewayConfig::new("https://portal.example.com/school/").unwrap();
        assert_eq!(
            config.join("/api/students/").unwrap().as_str(),
            "https://portal.example.com/school/api/students/"
        );
    }

    #[test]
    fn join_rejects_relative_and_protocol_relative() {
        let config = GatewayConfig::new("http://localhost:8000").unwrap();
        assert!(config.join("api/students/").is_err());
        assert!(config.join("//evil.example.com/").is_err());
    }

    #[test]
    fn rejects_bad_base_urls() {
        assert!(matches!(
            GatewayConfig::new("localhost:8000"),
            Err(ConfigError::InvalidBaseUrl { .. })
        ));
        assert!(matches!(
            GatewayConfig::new("ftp://files.example.com"),
            Err(ConfigError::InvalidBaseUrl { .. })
        ));
        assert!(matches!(
            GatewayConfig::new("https://example.com/?x=1"),
            Err(ConfigError::InvalidBaseUrl { .. })
        ));
    }

    #[test]
    fn relative_refresh_path_fails_validation() {
        let config = GatewayConfig {
            refresh_path: "api/auth/refresh/".to_owned(),
            ..GatewayConfig::new("http://localhost:8000").unwrap()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidRefreshPath(_))
        ));
    }
}
