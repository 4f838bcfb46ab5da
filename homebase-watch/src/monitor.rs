//! Watch state owned by the polling loop
//!
//! [`Monitor`] holds the geofence, the alert ledger, the marker layer and
//! the heading smoother. The polling loop is its only writer.

use chrono::{DateTime, Utc};
use homebase_common::units::{feet_to_meters, meters_to_feet};
use homebase_common::FeedSnapshot;

use crate::alerts::{AlertChanges, AlertLedger};
use crate::commands::{Command, HELP};
use crate::config::WatchConfig;
use crate::enrichment::AircraftMetadata;
use crate::error::{WatchError, WatchResult};
use crate::geofence::{Geofence, GeofenceEngine, GeofenceState};
use crate::render::{HeadingSmoother, MarkerLayer};

/// Explicit client-side state
#[derive(Debug, Clone)]
pub struct Monitor {
    geofence: GeofenceEngine,
    ledger: AlertLedger,
    layer: MarkerLayer,
    headings: HeadingSmoother,
    last_snapshot: Option<(i64, String)>,
}

impl Monitor {
    pub fn new(geofence: GeofenceEngine, threshold_m: f64, heading_easing: f64) -> Self {
        Self {
            geofence,
            ledger: AlertLedger::new(threshold_m),
            layer: MarkerLayer::new(),
            headings: HeadingSmoother::new(heading_easing),
            last_snapshot: None,
        }
    }

    /// Build from configuration, activating any configured region
    pub fn from_config(config: &WatchConfig) -> WatchResult<Self> {
        config.validate()?;

        let mut geofence = GeofenceEngine::new(config.rings.radii_m()?)?;
        if let Some(polygon) = config.geofence.polygon_points() {
            geofence.set_polygon(&polygon)?;
        } else if let Some(center) = config.geofence.ring_center_point() {
            geofence.set_rings(center)?;
        }

        Ok(Self::new(
            geofence,
            config.altitude_threshold_m(),
            config.heading_easing,
        ))
    }

    /// Render a completed snapshot and run alert accounting
    pub fn apply_snapshot(&mut self, snapshot: &FeedSnapshot, now: DateTime<Utc>) -> AlertChanges {
        self.layer.render(&snapshot.states, &mut self.headings);
        self.last_snapshot = Some((snapshot.time, snapshot.source.clone()));
        self.ledger.evaluate(&snapshot.states, &self.geofence, now)
    }

    /// Apply a resolved registration to markers and open alerts
    pub fn apply_metadata(&mut self, id: &str, metadata: &AircraftMetadata) -> bool {
        let marker = self.layer.apply_metadata(id, metadata);
        let alert = self.ledger.apply_metadata(id, metadata);
        marker || alert
    }

    /// Execute one operator command, returning the text to show
    ///
    /// Any change to the active region empties the ledger.
    pub fn handle_command(&mut self, command: Command) -> WatchResult<String> {
        let reply = match command {
            Command::Polygon(vertices) => {
                self.geofence.set_polygon(&vertices)?;
                self.ledger.clear();
                format!("polygon active ({} vertices)", self.polygon_vertex_count())
            }
            Command::Draw => {
                self.geofence.begin_polygon();
                self.ledger.clear();
                "drawing: add vertices with `vertex lon,lat`, then `finish`".to_string()
            }
            Command::Vertex(point) => {
                let count = self.geofence.add_vertex(point)?;
                format!("vertex {} at {},{}", count, point.lon, point.lat)
            }
            Command::Finish => {
                self.geofence.finish_polygon()?;
                self.ledger.clear();
                format!("polygon active ({} vertices)", self.polygon_vertex_count())
            }
            Command::Rings => {
                self.geofence.arm_rings();
                self.ledger.clear();
                "rings armed: place them with `center lon,lat`".to_string()
            }
            Command::Center(center) => {
                self.geofence.place_rings(center)?;
                self.ledger.clear();
                format!("rings active at {},{}", center.lon, center.lat)
            }
            Command::Clear => {
                self.geofence.clear();
                self.ledger.clear();
                "geofence cleared".to_string()
            }
            Command::Threshold(feet) => {
                if self.ledger.set_threshold_m(feet_to_meters(feet)) {
                    format!("threshold {} ft, alerts reset", feet)
                } else {
                    format!("threshold unchanged at {} ft", feet)
                }
            }
            Command::Status => self.status_lines().join("\n"),
            Command::Aircraft(id) => self
                .layer
                .card(&id)
                .ok_or_else(|| {
                    WatchError::Command(format!("aircraft '{}' is not in the current snapshot", id))
                })?
                .join("\n"),
            Command::Help => HELP.to_string(),
        };
        Ok(reply)
    }

    /// Distinct vertices of the stored polygon
    fn polygon_vertex_count(&self) -> usize {
        match self.geofence.active() {
            Some(Geofence::Polygon(vertices)) => vertices.len(),
            _ => 0,
        }
    }

    /// Alert summary, oldest alert first
    pub fn status_lines(&self) -> Vec<String> {
        let region = match self.geofence.state() {
            GeofenceState::Idle => "none".to_string(),
            GeofenceState::Drawing { vertices } => format!("drawing ({} vertices)", vertices.len()),
            GeofenceState::RingArmed => "rings armed".to_string(),
            GeofenceState::PolygonActive(Geofence::Polygon(v)) => {
                format!("polygon ({} vertices)", v.len())
            }
            GeofenceState::RingActive(Geofence::Rings { center, radii_m }) => format!(
                "rings at {},{} ({} rings)",
                center.lon,
                center.lat,
                radii_m.len()
            ),
            GeofenceState::PolygonActive(_) | GeofenceState::RingActive(_) => "active".to_string(),
        };

        let mut lines = vec![format!(
            "region: {} | threshold: {:.0} ft | aircraft: {} | alerts: {}",
            region,
            meters_to_feet(self.ledger.threshold_m()),
            self.layer.len(),
            self.ledger.len()
        )];

        if self.geofence.active().is_none() {
            lines.push("Draw a fence or activate rings.".to_string());
        } else if self.ledger.is_empty() {
            lines.push("No alerts.".to_string());
        }

        for record in self.ledger.records() {
            lines.push(format!(
                "  {} {:>6.0} ft  since {}",
                record.label,
                meters_to_feet(record.altitude_m),
                record.first_seen_at.format("%H:%M:%S")
            ));
        }
        lines
    }

    pub fn geofence(&self) -> &GeofenceEngine {
        &self.geofence
    }

    pub fn ledger(&self) -> &AlertLedger {
        &self.ledger
    }

    pub fn layer(&self) -> &MarkerLayer {
        &self.layer
    }

    /// `(time, source)` of the last applied snapshot
    pub fn last_snapshot(&self) -> Option<(i64, &str)> {
        self.last_snapshot
            .as_ref()
            .map(|(time, source)| (*time, source.as_str()))
    }
}
