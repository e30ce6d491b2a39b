//! Proxy configuration.

use std::net::SocketAddr;
use std::time::Duration;

/// Configuration for the device-flow proxy.
///
/// Constructed once at startup (by the CLI or a test harness) and
/// carried inside the shared application state; read-only afterwards.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Address to bind the HTTP listener to.
    pub bind_addr: SocketAddr,
    /// Public URL the proxy is reachable on; used to build
    /// `verification_uri` and the upstream `redirect_uri`.
    pub base_url: String,
    /// Upstream OAuth 2.0 authorization endpoint.
    pub authorization_endpoint: String,
    /// Upstream OAuth 2.0 token endpoint.
    pub token_endpoint: String,
    /// Minimum seconds a device must wait between token polls.
    pub poll_interval_secs: u64,
    /// Lifetime in seconds of a freshly issued flow.
    pub expires_in_secs: u64,
    /// Cadence in seconds of the expired-entry sweeper.
    pub purge_interval_secs: u64,
    /// Timeout in seconds for reading a request body.
    pub read_timeout_secs: u64,
    /// Timeout in seconds for running a handler and writing its
    /// response.
    pub write_timeout_secs: u64,
    /// Bounded window in seconds for draining in-flight requests on
    /// shutdown.
    pub grace_timeout_secs: u64,
    /// Skip TLS certificate verification on the upstream token
    /// exchange. Local development only.
    pub insecure_skip_verify: bool,
}

impl Default for ProxyConfig {
    #[allow(clippy::expect_used)]
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".parse().expect("valid default address"),
            base_url: "https://localhost:8080".to_string(),
            authorization_endpoint: "https://localhost:4444/oauth2/auth".to_string(),
            token_endpoint: "https://localhost:4444/oauth2/token".to_string(),
            poll_interval_secs: 5,
            expires_in_secs: 300,
            purge_interval_secs: 600,
            read_timeout_secs: 5,
            write_timeout_secs: 10,
            grace_timeout_secs: 15,
            insecure_skip_verify: false,
        }
    }
}

impl ProxyConfig {
    /// Lifetime of a freshly issued flow.
    #[must_use]
    pub fn expires_in(&self) -> Duration {
        Duration::from_secs(self.expires_in_secs)
    }

    /// Sweeper cadence.
    #[must_use]
    pub fn purge_interval(&self) -> Duration {
        Duration::from_secs(self.purge_interval_secs)
    }

    /// Request-body read timeout.
    #[must_use]
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    /// Handler-plus-response-write timeout.
    #[must_use]
    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }

    /// Shutdown drain window.
    #[must_use]
    pub fn grace_timeout(&self) -> Duration {
        Duration::from_secs(self.grace_timeout_secs)
    }

    /// URL of the proxy's own user-code entry page.
    #[must_use]
    pub fn verification_uri(&self) -> String {
        format!("{}/device", self.base_url.trim_end_matches('/'))
    }

    /// Redirect URI registered with the upstream. Must be bit-exact
    /// between the authorization request and the token exchange.
    #[must_use]
    pub fn redirect_uri(&self) -> String {
        format!("{}/auth/redirect", self.base_url.trim_end_matches('/'))
    }
}

/// Validates configuration and emits warnings for missing or suspicious
/// values. Nothing here is fatal; the proxy serves whatever it is given.
pub fn validate_config(config: &ProxyConfig) {
    if url::Url::parse(&config.base_url).is_err() {
        tracing::warn!(base_url = %config.base_url, "base_url does not parse as a URL");
    }

    if url::Url::parse(&config.authorization_endpoint).is_err() {
        tracing::warn!(
            authorization_endpoint = %config.authorization_endpoint,
            "authorization_endpoint does not parse as a URL — browser redirects will fail"
        );
    }

    if url::Url::parse(&config.token_endpoint).is_err() {
        tracing::warn!(
            token_endpoint = %config.token_endpoint,
            "token_endpoint does not parse as a URL — token exchanges will fail"
        );
    }

    if config.insecure_skip_verify {
        tracing::warn!(
            "TLS verification of the upstream token endpoint is DISABLED — local development only"
        );
    }

    if config.base_url == "https://localhost:8080" {
        tracing::info!(
            "base_url is the default (https://localhost:8080) — set it to your public URL for production"
        );
    }

    if config.expires_in_secs < config.poll_interval_secs {
        tracing::warn!(
            expires_in = config.expires_in_secs,
            poll_interval = config.poll_interval_secs,
            "flows expire faster than the advertised poll interval — devices may never collect"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ProxyConfig::default();
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.poll_interval_secs, 5);
        assert_eq!(config.expires_in_secs, 300);
        assert_eq!(config.purge_interval_secs, 600);
        assert!(!config.insecure_skip_verify);
    }

    #[test]
    fn test_derived_uris() {
        let config = ProxyConfig::default();
        assert_eq!(config.verification_uri(), "https://localhost:8080/device");
        assert_eq!(config.redirect_uri(), "https://localhost:8080/auth/redirect");
    }

    #[test]
    fn test_derived_uris_trailing_slash() {
        let config = ProxyConfig {
            base_url: "https://proxy.example.com/".to_string(),
            ..ProxyConfig::default()
        };
        assert_eq!(config.verification_uri(), "https://proxy.example.com/device");
        assert_eq!(
            config.redirect_uri(),
            "https://proxy.example.com/auth/redirect"
        );
    }

    #[test]
    fn test_duration_conversions() {
        let config = ProxyConfig::default();
        assert_eq!(config.expires_in(), Duration::from_secs(300));
        assert_eq!(config.purge_interval(), Duration::from_secs(600));
        assert_eq!(config.read_timeout(), Duration::from_secs(5));
        assert_eq!(config.write_timeout(), Duration::from_secs(10));
        assert_eq!(config.grace_timeout(), Duration::from_secs(15));
    }
}
