//! Configuration for the feed proxy
//!
//! Loaded from `<config_dir>/homebase/feed.toml` (or `--config` /
//! `HOMEBASE_CONFIG`). Every field has a built-in default so a missing or
//! partial file still starts the service.
//!
//! ```toml
//! bind = "127.0.0.1"
//! port = 5730
//!
//! [location]
//! lat = 42.8808
//! lon = -85.5228
//! radius_nm = 80
//!
//! [sources]
//! priority = "local_then_remote"   # or "remote_only", "local_only"
//! local_urls = ["http://127.0.0.1:8080/data/aircraft.json"]
//! remote_base = "https://api.adsb.lol/v2/point"
//! remote_enabled = true
//!
//! [auth]
//! role_header = "x-homebase-role"
//! allowed_roles = ["LineTech", "LineOps"]
//! ```

use homebase_common::config::LoggingConfig;
use serde::Deserialize;
use std::time::Duration;

/// Feed proxy configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Listen address
    pub bind: String,
    /// HTTP server port
    pub port: u16,
    pub location: LocationConfig,
    pub sources: SourcesConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 5730,
            location: LocationConfig::default(),
            sources: SourcesConfig::default(),
            auth: AuthConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Default query point used when a request omits `lat`/`lon`/`radius`
///
/// Set these to the receiver location.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    pub lat: f64,
    pub lon: f64,
    /// Nautical miles, clamped to 1..=250 at request time
    pub radius_nm: i64,
}

impl Default for LocationConfig {
    fn default() -> Self {
        // KGRR
        Self {
            lat: 42.8808,
            lon: -85.5228,
            radius_nm: 80,
        }
    }
}

/// Source ordering policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourcePriority {
    /// Local receiver mirrors first, remote aggregator as fallback
    LocalThenRemote,
    /// Remote aggregator only (isolation/testing)
    RemoteOnly,
    /// Local receiver mirrors only
    LocalOnly,
}

/// Upstream source configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub priority: SourcePriority,
    /// Local receiver `aircraft.json` URLs, tried in order
    pub local_urls: Vec<String>,
    /// Remote aggregator point endpoint; `/{lat}/{lon}/{radius}` is appended
    pub remote_base: String,
    /// Disable the remote fallback without touching `priority`
    pub remote_enabled: bool,
    pub local_timeout_secs: u64,
    pub remote_timeout_secs: u64,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            priority: SourcePriority::LocalThenRemote,
            local_urls: vec![
                "http://127.0.0.1:8080/data/aircraft.json".to_string(),
                "http://localhost:8080/data/aircraft.json".to_string(),
                "http://127.0.0.1:8080/skyaware/data/aircraft.json".to_string(),
                "http://localhost:8080/skyaware/data/aircraft.json".to_string(),
            ],
            remote_base: "https://api.adsb.lol/v2/point".to_string(),
            remote_enabled: true,
            local_timeout_secs: 4,
            remote_timeout_secs: 8,
        }
    }
}

impl SourcesConfig {
    pub fn local_timeout(&self) -> Duration {
        Duration::from_secs(self.local_timeout_secs)
    }

    pub fn remote_timeout(&self) -> Duration {
        Duration::from_secs(self.remote_timeout_secs)
    }
}

/// Role gate applied in front of the feed endpoint
///
/// The identity provider authenticates the caller and forwards its role in
/// `role_header`. An empty `allowed_roles` disables the gate.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub role_header: String,
    pub allowed_roles: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            role_header: "x-homebase-role".to_string(),
            allowed_roles: vec!["LineTech".to_string(), "LineOps".to_string()],
        }
    }
}

impl AuthConfig {
    /// Gate disabled (no roles configured)
    pub fn is_disabled(&self) -> bool {
        self.allowed_roles.is_empty()
    }

    pub fn permits(&self, role: &str) -> bool {
        self.allowed_roles.iter().any(|r| r == role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use homebase_common::config::parse_toml;

    #[test]
    fn test_defaults() {
        let config = FeedConfig::default();
        assert_eq!(config.port, 5730);
        assert_eq!(config.sources.priority, SourcePriority::LocalThenRemote);
        assert_eq!(config.sources.local_urls.len(), 4);
        assert_eq!(config.sources.local_timeout(), Duration::from_secs(4));
        assert_eq!(config.sources.remote_timeout(), Duration::from_secs(8));
        assert!(config.auth.permits("LineOps"));
        assert!(!config.auth.permits("Guest"));
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: FeedConfig = parse_toml(
            r#"
            port = 9000

            [sources]
            priority = "remote_only"

            [auth]
            allowed_roles = []
            "#,
        )
        .unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.bind, "127.0.0.1");
        assert_eq!(config.sources.priority, SourcePriority::RemoteOnly);
        assert_eq!(config.sources.remote_base, "https://api.adsb.lol/v2/point");
        assert!(config.auth.is_disabled());
        assert_eq!(config.location.radius_nm, 80);
    }

    #[test]
    fn test_unknown_priority_rejected() {
        let result: homebase_common::Result<FeedConfig> =
            parse_toml("[sources]\npriority = \"parallel\"");
        assert!(result.is_err());
    }
}
