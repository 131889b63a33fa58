//! Connection settings for the dashboard backend.

use std::time::Duration;

use reqwest::Url;

use crate::error::{Result, WatchError};

pub const DEFAULT_API_URL: &str = "http://localhost:8080/api/v1";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub const ENV_API_URL: &str = "YAKD_API_URL";
pub const ENV_POLL_INTERVAL_MS: &str = "YAKD_POLL_INTERVAL_MS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchConfig {
    /// Backend API base, e.g. `http://host:8080/api/v1`.
    pub api_url: String,
    /// Delay between the end of one liveness cycle and the start of the next.
    pub poll_interval: Duration,
    /// Applies to probe requests and to opening the watch stream, never to
    /// the stream body.
    pub request_timeout: Duration,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl WatchConfig {
    /// Defaults overridden by `YAKD_API_URL` and `YAKD_POLL_INTERVAL_MS`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut cfg = Self::default();
        if let Some(url) = lookup(ENV_API_URL).filter(|s| !s.trim().is_empty()) {
            cfg.api_url = url.trim().to_string();
        }
        if let Some(raw) = lookup(ENV_POLL_INTERVAL_MS) {
            let ms: u64 = raw.trim().parse().map_err(|_| {
                WatchError::Config(format!("{ENV_POLL_INTERVAL_MS}={raw:?} is not a number of milliseconds"))
            })?;
            cfg.poll_interval = Duration::from_millis(ms);
        }
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.api_url)
            .map_err(|e| WatchError::Config(format!("api url {:?}: {e}", self.api_url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(WatchError::Config(format!("api url {:?} must be http(s)", self.api_url)));
        }
        if self.poll_interval.is_zero() {
            return Err(WatchError::Config("poll interval must be positive".into()));
        }
        Ok(())
    }

    pub fn watch_url(&self) -> String {
        self.endpoint("watch")
    }

    pub fn groups_url(&self) -> String {
        self.endpoint("apis/groups")
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.api_url.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k: &str| map.get(k).cloned()
    }

    #[test]
    fn env_overrides_defaults() {
        let cfg = WatchConfig::from_lookup(lookup(&[
            (ENV_API_URL, "https://yakd.example/api/v1/"),
            (ENV_POLL_INTERVAL_MS, "250"),
        ]))
        .unwrap();
        assert_eq!(cfg.poll_interval, Duration::from_millis(250));
        assert_eq!(cfg.watch_url(), "https://yakd.example/api/v1/watch");
        assert_eq!(cfg.groups_url(), "https://yakd.example/api/v1/apis/groups");

        let defaults = WatchConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(defaults, WatchConfig::default());
    }

    #[test]
    fn rejects_bad_values() {
        assert!(WatchConfig::from_lookup(lookup(&[(ENV_POLL_INTERVAL_MS, "soon")])).is_err());
        assert!(WatchConfig::from_lookup(lookup(&[(ENV_POLL_INTERVAL_MS, "0")])).is_err());
        assert!(WatchConfig::from_lookup(lookup(&[(ENV_API_URL, "ftp://x")])).is_err());
        assert!(WatchConfig::default().with_api_url("not a url").validate().is_err());
    }
}
