//! Client configuration.
//!
//! The base origin lives here and nowhere else; callers only ever pass
//! relative paths.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use url::Url;

pub const ENV_API_BASE: &str = "BACKOFFICE_API_BASE";
pub const ENV_SESSION_DIR: &str = "BACKOFFICE_SESSION_DIR";

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid base_url {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    pub base_url: String,
    /// Directory for the persisted session. `None` keeps it in memory.
    pub session_dir: Option<PathBuf>,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            session_dir: None,
            user_agent: concat!("backoffice-core/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ClientConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Apply `BACKOFFICE_API_BASE` and `BACKOFFICE_SESSION_DIR` when set.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(base) = lookup(ENV_API_BASE).filter(|v| !v.is_empty()) {
            self.base_url = base;
        }
        if let Some(dir) = lookup(ENV_SESSION_DIR).filter(|v| !v.is_empty()) {
            self.session_dir = Some(PathBuf::from(dir));
        }
        self.validate()
    }

    /// Require an absolute http(s) URL with a host, stored in its
    /// normalized form without a trailing `/`.
    fn validate(mut self) -> Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidBaseUrl {
            url: self.base_url.clone(),
            reason,
        };
        let url = Url::parse(&self.base_url).map_err(|e| invalid(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme {:?}", url.scheme())));
        }
        if url.host_str().map_or(true, str::is_empty) {
            return Err(invalid("missing host".to_string()));
        }
        self.base_url = url.as_str().trim_end_matches('/').to_string();
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_local_backend() {
        let config = ClientConfig::from_toml_str("").unwrap();
        assert_eq!(config.base_url, "http://127.0.0.1:8000");
        assert!(config.session_dir.is_none());
        assert!(config.user_agent.starts_with("backoffice-core/"));
    }

    #[test]
    fn toml_values_are_read_and_trailing_slash_trimmed() {
        let config = ClientConfig::from_toml_str(
            r#"
            base_url = "https://shop.example/"
            session_dir = "/var/lib/backoffice"
            "#,
        )
        .unwrap();
        assert_eq!(config.base_url, "https://shop.example");
        assert_eq!(config.session_dir, Some(PathBuf::from("/var/lib/backoffice")));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = ClientConfig::from_toml_str("base_uri = \"http://x\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn base_url_needs_a_scheme() {
        let err = ClientConfig::from_toml_str("base_url = \"127.0.0.1:8000\"").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBaseUrl { .. }));
    }

    #[test]
    fn base_url_needs_a_host() {
        for raw in ["base_url = \"http://\"", "base_url = \"ftp://shop.example\""] {
            let err = ClientConfig::from_toml_str(raw).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidBaseUrl { .. }), "{raw}");
        }
    }

    #[test]
    fn base_url_is_normalized() {
        let config =
            ClientConfig::from_toml_str("base_url = \"HTTPS://Shop.Example/api/\"").unwrap();
        assert_eq!(config.base_url, "https://shop.example/api");
    }

    #[test]
    fn overrides_win_over_file_values() {
        let config = ClientConfig::default()
            .with_overrides(|key| match key {
                ENV_API_BASE => Some("http://10.0.0.5:9000".to_string()),
                ENV_SESSION_DIR => Some("/tmp/sessions".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.base_url, "http://10.0.0.5:9000");
        assert_eq!(config.session_dir, Some(PathBuf::from("/tmp/sessions")));
    }

    #[test]
    fn empty_overrides_are_ignored() {
        let config = ClientConfig::default()
            .with_overrides(|_| Some(String::new()))
            .unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = ClientConfig::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
