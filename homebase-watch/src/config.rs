//! Configuration for the watch client
//!
//! Loaded from `<config_dir>/homebase/watch.toml` (or `--config` /
//! `HOMEBASE_CONFIG`). Every field has a built-in default.
//!
//! ```toml
//! feed_url = "http://127.0.0.1:5730/api/feed"
//! poll_interval_secs = 5
//! altitude_threshold_ft = 2294
//!
//! [rings]
//! radii_sm = [5, 10, 15, 20]
//!
//! [geofence]
//! ring_center = [-85.5228, 42.8808]
//!
//! [enrichment]
//! lookup_url = "http://127.0.0.1:8088/aircraft_lookup"
//! max_entries = 4096
//! ```

use homebase_common::config::LoggingConfig;
use homebase_common::geo::GeoPoint;
use homebase_common::units::{feet_to_meters, statute_miles_to_meters};
use serde::Deserialize;
use std::time::Duration;

use crate::error::{WatchError, WatchResult};

/// Watch client configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Feed proxy endpoint
    pub feed_url: String,
    /// Header carrying the caller role expected by the feed's role gate
    pub feed_role_header: String,
    pub feed_role: String,
    pub feed_timeout_secs: u64,
    pub poll_interval_secs: u64,
    /// Alert threshold as entered by the operator (feet)
    pub altitude_threshold_ft: f64,
    /// Fraction of the heading delta applied per render (0..=1]
    pub heading_easing: f64,
    pub rings: RingsConfig,
    pub geofence: GeofenceConfig,
    pub enrichment: EnrichmentConfig,
    pub logging: LoggingConfig,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            feed_url: "http://127.0.0.1:5730/api/feed".to_string(),
            feed_role_header: "x-homebase-role".to_string(),
            feed_role: "LineOps".to_string(),
            feed_timeout_secs: 10,
            poll_interval_secs: 5,
            altitude_threshold_ft: 2294.0,
            heading_easing: 0.35,
            rings: RingsConfig::default(),
            geofence: GeofenceConfig::default(),
            enrichment: EnrichmentConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl WatchConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn feed_timeout(&self) -> Duration {
        Duration::from_secs(self.feed_timeout_secs)
    }

    pub fn altitude_threshold_m(&self) -> f64 {
        feet_to_meters(self.altitude_threshold_ft)
    }

    /// Reject values the client cannot run with
    pub fn validate(&self) -> WatchResult<()> {
        if !(self.heading_easing > 0.0 && self.heading_easing <= 1.0) {
            return Err(WatchError::Config(format!(
                "heading_easing must be within (0, 1], got {}",
                self.heading_easing
            )));
        }
        if !self.altitude_threshold_ft.is_finite() {
            return Err(WatchError::Config(
                "altitude_threshold_ft must be a finite number".to_string(),
            ));
        }
        if self.geofence.polygon.is_some() && self.geofence.ring_center.is_some() {
            return Err(WatchError::Config(
                "geofence.polygon and geofence.ring_center are mutually exclusive".to_string(),
            ));
        }
        self.rings.radii_m()?;
        Ok(())
    }
}

/// Alert ring radii
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RingsConfig {
    /// Statute miles; the outermost ring is the containment boundary
    pub radii_sm: Vec<f64>,
}

impl Default for RingsConfig {
    fn default() -> Self {
        Self {
            radii_sm: vec![5.0, 10.0, 15.0, 20.0],
        }
    }
}

impl RingsConfig {
    /// Radii in meters, ascending
    pub fn radii_m(&self) -> WatchResult<Vec<f64>> {
        if self.radii_sm.is_empty() {
            return Err(WatchError::Config("rings.radii_sm is empty".to_string()));
        }
        if let Some(bad) = self.radii_sm.iter().find(|r| !(r.is_finite() && **r > 0.0)) {
            return Err(WatchError::Config(format!(
                "ring radius must be positive, got {}",
                bad
            )));
        }
        let mut radii: Vec<f64> = self
            .radii_sm
            .iter()
            .map(|r| statute_miles_to_meters(*r))
            .collect();
        radii.sort_by(f64::total_cmp);
        Ok(radii)
    }
}

/// Region active at startup
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GeofenceConfig {
    /// `[lon, lat]` vertices
    pub polygon: Option<Vec<[f64; 2]>>,
    /// `[lon, lat]` ring center
    pub ring_center: Option<[f64; 2]>,
}

impl GeofenceConfig {
    pub fn polygon_points(&self) -> Option<Vec<GeoPoint>> {
        self.polygon
            .as_ref()
            .map(|v| v.iter().map(|[lon, lat]| GeoPoint::new(*lon, *lat)).collect())
    }

    pub fn ring_center_point(&self) -> Option<GeoPoint> {
        self.ring_center.map(|[lon, lat]| GeoPoint::new(lon, lat))
    }
}

/// Aircraft metadata lookups
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// Metadata service endpoint, queried as `{lookup_url}?icao=<id>`.
    /// Lookups are disabled when unset.
    pub lookup_url: Option<String>,
    pub timeout_secs: u64,
    /// Minimum spacing between outgoing requests
    pub min_interval_ms: u64,
    /// Resolved entries kept before least-recently-used eviction
    pub max_entries: usize,
    /// Re-resolve entries older than this; unset keeps them for the process lifetime
    pub ttl_secs: Option<u64>,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            lookup_url: None,
            timeout_secs: 10,
            min_interval_ms: 250,
            max_entries: 4096,
            ttl_secs: None,
        }
    }
}

impl EnrichmentConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl_secs.map(Duration::from_secs)
    }
}
