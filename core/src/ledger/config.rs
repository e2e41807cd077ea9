//! Ledger API client configuration.
//!
//! Defaults point at the local development backend. Override through the
//! environment or build a [`LedgerConfig`] directly (tests point it at a
//! mock server).

use std::time::Duration;
use url::Url;

use crate::config::{DEFAULT_API_URL, DEFAULT_REQUEST_TIMEOUT};

/// Connection settings for the ledger API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Base URL including the version prefix, e.g. `http://localhost:8000/api/v1`.
    pub base_url: Url,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl LedgerConfig {
    /// The local development backend.
    pub fn local() -> Result<Self, ConfigError> {
        Self::new(DEFAULT_API_URL)
    }

    /// Configuration for an explicit base URL with the default timeout.
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: parse_url("base_url", base_url)?,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `FLEXSAVE_API_URL` (default: `http://localhost:8000/api/v1`)
    /// - `FLEXSAVE_TIMEOUT_SECS` (default: 30)
    pub fn from_env() -> Result<Self, ConfigError> {
        let timeout = std::env::var("FLEXSAVE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT);

        Ok(Self {
            base_url: env_url("FLEXSAVE_API_URL", DEFAULT_API_URL)?,
            timeout,
        })
    }

    /// `{base_url}{path}` with exactly one slash between them.
    pub(crate) fn endpoint_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

fn parse_url(name: &str, raw: &str) -> Result<Url, ConfigError> {
    let url =
        Url::parse(raw).map_err(|e| ConfigError::InvalidUrl(name.to_string(), e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::InvalidUrl(
            name.to_string(),
            format!("unsupported scheme '{other}'"),
        )),
    }
}

fn env_url(var: &str, default: &str) -> Result<Url, ConfigError> {
    let raw = std::env::var(var).unwrap_or_else(|_| default.to_string());
    parse_url(var, &raw)
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
    #[error("{0} environment variable is required")]
    Missing(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_points_at_local_backend() {
        let cfg = LedgerConfig::local().unwrap();
        assert_eq!(cfg.base_url.as_str(), "http://localhost:8000/api/v1");
        assert_eq!(cfg.timeout, Duration::from_secs(30));
    }

    #[test]
    fn endpoint_url_joins_cleanly() {
        let cfg = LedgerConfig::new("http://127.0.0.1:9000/api/v1/").unwrap();
        assert_eq!(cfg.endpoint_url("/vaults/"), "http://127.0.0.1:9000/api/v1/vaults/");
        let bare = LedgerConfig::new("http://127.0.0.1:9000").unwrap();
        assert_eq!(bare.endpoint_url("users/me"), "http://127.0.0.1:9000/users/me");
    }

    #[test]
    fn env_url_uses_default_when_var_absent() {
        let url = env_url("FLEXSAVE_NONEXISTENT_VAR_4821", "https://example.com").unwrap();
        assert_eq!(url.as_str(), "https://example.com/");
    }

    #[test]
    fn rejects_bad_urls() {
        assert!(LedgerConfig::new("not a url").is_err());
        assert!(matches!(
            LedgerConfig::new("ftp://example.com"),
            Err(ConfigError::InvalidUrl(_, _))
        ));
    }
}
