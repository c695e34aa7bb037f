use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use kianda_auth::{DEFAULT_REFRESH_PATH, GatewayConfig};
use kianda_http::TransportSecurity;
use serde::{Deserialize, Serialize};
use url::{Host, Url};

/// Environment prefix; `KIANDA__API__BASE_URL` sets `api.base_url`.
pub const ENV_PREFIX: &str = "KIANDA__";

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Effective CLI configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub credentials: CredentialsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub refresh_path: String,
    #[serde(with = "kianda_utils::duration_serde")]
    pub timeout: Duration,
    pub user_agent: Option<String>,
    /// Plain `http://` backends. Unset means allowed for loopback hosts only.
    pub allow_insecure_http: Option<bool>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            refresh_path: DEFAULT_REFRESH_PATH.to_owned(),
            timeout: Duration::from_secs(30),
            user_agent: None,
            allow_insecure_http: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    /// Token file; defaults to `<data_dir>/kianda/credentials.json`.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset and no `-v` is given.
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_owned(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Defaults, then the YAML file, then `KIANDA__*` variables.
    ///
    /// # Errors
    /// Fails if the file is missing or any layer does not fit the schema.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(AppConfig::default()));
        if let Some(path) = path {
            if !path.is_file() {
                anyhow::bail!("config file does not exist: {}", path.display());
            }
            figment = figment.merge(Yaml::file(path));
        }
        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("invalid configuration")
    }

    pub fn apply_cli_overrides(&mut self, base_url: Option<&str>) {
        if let Some(url) = base_url {
            url.clone_into(&mut self.api.base_url);
        }
    }

    /// # Errors
    /// Fails if the config cannot be rendered.
    pub fn to_yaml(&self) -> Result<String> {
        serde_saphyr::to_string(self).context("failed to render configuration")
    }

    /// Gateway settings derived from the `api` section.
    ///
    /// # Errors
    /// Fails on an invalid base URL or refresh path.
    pub fn gateway_config(&self) -> Result<GatewayConfig> {
        let mut config = GatewayConfig::new(&self.api.base_url)?;
        config.refresh_path.clone_from(&self.api.refresh_path);
        config.http.request_timeout = self.api.timeout;
        if let Some(agent) = &self.api.user_agent {
            config.http.user_agent.clone_from(agent);
        }
        let insecure = self
            .api
            .allow_insecure_http
            .unwrap_or_else(|| is_loopback(&config.base_url));
        if insecure {
            config.http.transport = TransportSecurity::AllowInsecureHttp;
        }
        config.validate()?;
        Ok(config)
    }
}

fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(Host::Ipv4(ip)) => IpAddr::V4(ip).is_loopback(),
        Some(Host::Ipv6(ip)) => IpAddr::V6(ip).is_loopback(),
        None => false,
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_point_at_local_backend() {
        let config = AppConfig::default();
        let gateway = config.gateway_config().unwrap();
        assert_eq!(gateway.base_url.as_str(), "http://localhost:8000/");
        assert_eq!(gateway.refresh_path, "/api/auth/refresh/");
        assert_eq!(gateway.http.transport, TransportSecurity::AllowInsecureHttp);
    }

    #[test]
    fn remote_http_requires_opt_in() {
        let mut config = AppConfig::default();
        config.apply_cli_overrides(Some("http://portal.example.com"));
        let gateway = config.gateway_config().unwrap();
        assert_eq!(gateway.http.transport, TransportSecurity::TlsOnly);

        config.api.allow_insecure_http = Some(true);
        let gateway = config.gateway_config().unwrap();
        assert_eq!(gateway.http.transport, TransportSecurity::AllowInsecureHttp);
    }

    #[test]
    fn yaml_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "api:\n  base_url: https://portal.example.com/school\n  timeout: 5s\nlogging:\n  json: true"
        )
        .unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.api.base_url, "https://portal.example.com/school");
        assert_eq!(config.api.timeout, Duration::from_secs(5));
        assert!(config.logging.json);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = AppConfig::load(Some(Path::new("/nonexistent/kianda.yaml"))).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn rejects_non_http_base_url() {
        let mut config = AppConfig::default();
        config.apply_cli_overrides(Some("ftp://portal.example.com"));
        assert!(config.gateway_config().is_err());
    }

    #[test]
    fn yaml_dump_uses_human_durations() {
        let yaml = AppConfig::default().to_yaml().unwrap();
        assert!(yaml.contains("base_url"));
        assert!(yaml.contains("30s"));
    }
}
