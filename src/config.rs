//! Client configuration.
//!
//! The base URL and app name come from the environment with compiled
//! defaults; the request timeout is a fixed constant. Whether a 401 clears
//! the stored token is a policy flag rather than hardwired behavior, since
//! callers embedding the client may prefer to handle logout themselves.

use std::time::Duration;

/// Environment variable overriding the API base URL.
pub const BASE_URL_ENV: &str = "LINKFEED_BASE_URL";

/// Environment variable overriding the app name.
pub const APP_NAME_ENV: &str = "LINKFEED_APP_NAME";

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "https://linked-posts.routemisr.com";

/// Fixed per-request timeout. Requests exceeding it fail as network errors.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for an [`crate::api::ApiClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL all request paths are resolved against.
    pub base_url: String,
    /// Display name of the embedding application.
    pub app_name: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// When `true`, an HTTP 401 clears the stored token automatically.
    pub logout_on_401: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            app_name: "linkfeed".to_string(),
            timeout: REQUEST_TIMEOUT,
            logout_on_401: true,
        }
    }
}

impl ClientConfig {
    /// Reads configuration from the environment, falling back to defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var(BASE_URL_ENV) {
            if !url.trim().is_empty() {
                config.base_url = url;
            }
        }
        if let Ok(name) = std::env::var(APP_NAME_ENV) {
            if !name.trim().is_empty() {
                config.app_name = name;
            }
        }
        config
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub fn with_logout_on_401(mut self, enabled: bool) -> Self {
        self.logout_on_401 = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert!(config.logout_on_401);
    }

    #[test]
    fn test_builders() {
        let config = ClientConfig::default()
            .with_base_url("http://localhost:8000")
            .with_logout_on_401(false);
        assert_eq!(config.base_url, "http://localhost:8000");
        assert!(!config.logout_on_401);
    }
}
