// crates/core/src/config.rs
//! Client and tracker configuration.

use std::time::Duration;

/// Delay between status requests while a job is in progress.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub const DEFAULT_API_URL: &str = "http://localhost:9130";

/// Configuration for the list service client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// LISTS_API_URL env var. Base URL the `/lists/...` paths hang off.
    pub base_url: String,
    /// LISTS_TENANT env var, sent as `X-Okapi-Tenant`.
    pub tenant: Option<String>,
    /// LISTS_TOKEN env var, sent as `X-Okapi-Token`.
    pub token: Option<String>,
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var("LISTS_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.into()),
            tenant: non_empty_env("LISTS_TENANT"),
            token: non_empty_env("LISTS_TOKEN"),
            request_timeout: env_u64("LISTS_REQUEST_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT),
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            tenant: None,
            token: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = Some(tenant.into());
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

/// Configuration for a job tracker's poll loop.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub poll_interval: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval: env_u64("LISTS_POLL_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_POLL_INTERVAL),
        }
    }
}

impl TrackerConfig {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Positive integer from the environment; zero and garbage fall back to defaults.
fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|v| *v > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for key in [
            "LISTS_API_URL",
            "LISTS_TENANT",
            "LISTS_TOKEN",
            "LISTS_REQUEST_TIMEOUT_SECS",
            "LISTS_POLL_INTERVAL_MS",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_defaults_without_env() {
        clear_env();
        let client = ClientConfig::default();
        assert_eq!(client.base_url, DEFAULT_API_URL);
        assert!(client.tenant.is_none());
        assert_eq!(client.request_timeout, DEFAULT_REQUEST_TIMEOUT);
        assert_eq!(TrackerConfig::default().poll_interval, DEFAULT_POLL_INTERVAL);
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        clear_env();
        std::env::set_var("LISTS_API_URL", "https://folio.example.org");
        std::env::set_var("LISTS_TENANT", "diku");
        std::env::set_var("LISTS_TOKEN", "  ");
        std::env::set_var("LISTS_POLL_INTERVAL_MS", "250");
        let client = ClientConfig::default();
        assert_eq!(client.base_url, "https://folio.example.org");
        assert_eq!(client.tenant.as_deref(), Some("diku"));
        assert!(client.token.is_none());
        assert_eq!(TrackerConfig::default().poll_interval, Duration::from_millis(250));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_invalid_interval_falls_back() {
        clear_env();
        std::env::set_var("LISTS_POLL_INTERVAL_MS", "0");
        assert_eq!(TrackerConfig::default().poll_interval, DEFAULT_POLL_INTERVAL);
        std::env::set_var("LISTS_POLL_INTERVAL_MS", "soon");
        assert_eq!(TrackerConfig::default().poll_interval, DEFAULT_POLL_INTERVAL);
        clear_env();
    }

    #[test]
    fn test_builders() {
        let config = ClientConfig::new("http://x").with_tenant("t").with_token("k");
        assert_eq!(config.tenant.as_deref(), Some("t"));
        assert_eq!(config.token.as_deref(), Some("k"));
        let tracker = TrackerConfig { poll_interval: DEFAULT_POLL_INTERVAL }
            .with_poll_interval(Duration::from_secs(1));
        assert_eq!(tracker.poll_interval, Duration::from_secs(1));
    }
}
