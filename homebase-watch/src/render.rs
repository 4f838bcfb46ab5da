//! Headless marker layer
//!
//! Converts canonical state vectors into display markers: feet and knots
//! again, a speed colour band, altitude-faded opacity, a climb/descent
//! symbol and a label that switches from the hex id to the registration
//! once one is known. [`MarkerLayer::card`] gives the detail view of one
//! aircraft with its registry data.

use homebase_common::geo::GeoPoint;
use homebase_common::units::{meters_to_feet, ms_to_fpm, ms_to_knots};
use homebase_common::StateVector;
use std::collections::{HashMap, HashSet};

use crate::enrichment::AircraftMetadata;

/// Upper edge of the slow band (knots)
pub const SLOW_BAND_MAX_KT: f64 = 120.0;
/// Upper edge of the medium band (knots)
pub const MEDIUM_BAND_MAX_KT: f64 = 320.0;
/// Altitude at which the opacity floor is reached (feet)
pub const OPACITY_CEILING_FT: f64 = 40_000.0;
pub const MIN_OPACITY: f64 = 0.35;
/// Vertical rate beyond which a climb/descent symbol is shown (ft/min)
pub const CLIMB_SYMBOL_FPM: f64 = 200.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeedBand {
    Slow,
    Medium,
    Fast,
}

impl SpeedBand {
    /// Unknown speed renders as slow
    pub fn from_knots(knots: Option<f64>) -> Self {
        match knots {
            Some(kt) if kt >= MEDIUM_BAND_MAX_KT => SpeedBand::Fast,
            Some(kt) if kt >= SLOW_BAND_MAX_KT => SpeedBand::Medium,
            _ => SpeedBand::Slow,
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            SpeedBand::Slow => "#2ea9ff",
            SpeedBand::Medium => "#ffd000",
            SpeedBand::Fast => "#ff3b3b",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Climbing,
    Descending,
}

impl Trend {
    pub fn from_fpm(fpm: Option<f64>) -> Option<Self> {
        match fpm {
            Some(v) if v > CLIMB_SYMBOL_FPM => Some(Trend::Climbing),
            Some(v) if v < -CLIMB_SYMBOL_FPM => Some(Trend::Descending),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Trend::Climbing => "▲",
            Trend::Descending => "▼",
        }
    }
}

/// Opacity fades with altitude down to a floor; unknown altitude is opaque
pub fn altitude_opacity(altitude_ft: Option<f64>) -> f64 {
    match altitude_ft {
        Some(ft) => (1.0 - ft / OPACITY_CEILING_FT).clamp(MIN_OPACITY, 1.0),
        None => 1.0,
    }
}

/// Per-aircraft eased heading
///
/// Each render moves the displayed heading `easing` of the way towards the
/// reported track along the shorter arc.
#[derive(Debug, Clone)]
pub struct HeadingSmoother {
    easing: f64,
    headings: HashMap<String, f64>,
}

impl HeadingSmoother {
    pub fn new(easing: f64) -> Self {
        Self {
            easing,
            headings: HashMap::new(),
        }
    }

    /// Smoothed heading in `[0, 360)`; a missing track renders as 0
    pub fn smooth(&mut self, id: &str, track: Option<f64>) -> f64 {
        let Some(target) = track.filter(|t| t.is_finite()) else {
            return 0.0;
        };
        let previous = self.headings.get(id).copied().unwrap_or(target);

        let mut delta = target - previous;
        if delta > 180.0 {
            delta -= 360.0;
        }
        if delta < -180.0 {
            delta += 360.0;
        }
        let eased = (previous + delta * self.easing).rem_euclid(360.0);

        self.headings.insert(id.to_string(), eased);
        eased
    }

    /// Forget aircraft not in `ids`
    pub fn retain(&mut self, ids: &HashSet<&str>) {
        self.headings.retain(|id, _| ids.contains(id.as_str()));
    }

    pub fn len(&self) -> usize {
        self.headings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headings.is_empty()
    }
}

/// One aircraft as displayed
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub id: String,
    /// Registration when known, else uppercase id
    pub label: String,
    pub callsign: String,
    pub position: GeoPoint,
    pub altitude_ft: Option<f64>,
    pub speed_kt: Option<f64>,
    pub heading_deg: f64,
    pub vertical_fpm: Option<f64>,
    pub on_ground: bool,
    pub speed_band: SpeedBand,
    pub opacity: f64,
    pub trend: Option<Trend>,
}

impl Marker {
    /// Two-line label text, e.g. `N123AB / 2000 ft ▲`
    pub fn caption(&self) -> String {
        let altitude = self
            .altitude_ft
            .map(|ft| format!("{:.0} ft", ft))
            .unwrap_or_else(|| "--- ft".to_string());
        match self.trend {
            Some(trend) => format!("{} / {} {}", self.label, altitude, trend.symbol()),
            None => format!("{} / {}", self.label, altitude),
        }
    }
}

/// Markers for the latest completed snapshot
#[derive(Debug, Clone, Default)]
pub struct MarkerLayer {
    markers: Vec<Marker>,
    metadata: HashMap<String, AircraftMetadata>,
}

impl MarkerLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every marker with the given snapshot's aircraft
    pub fn render(&mut self, states: &[StateVector], headings: &mut HeadingSmoother) {
        self.markers = states
            .iter()
            .map(|state| {
                let altitude_ft = state.best_altitude().map(meters_to_feet);
                let speed_kt = state.velocity.map(ms_to_knots);
                let vertical_fpm = state.vertical_rate.map(ms_to_fpm);
                Marker {
                    id: state.id.clone(),
                    label: self.label_for(&state.id),
                    callsign: state.callsign.clone(),
                    position: state.position(),
                    altitude_ft,
                    speed_kt,
                    heading_deg: headings.smooth(&state.id, state.track),
                    vertical_fpm,
                    on_ground: state.on_ground,
                    speed_band: SpeedBand::from_knots(speed_kt),
                    opacity: altitude_opacity(altitude_ft),
                    trend: Trend::from_fpm(vertical_fpm),
                }
            })
            .collect();

        let ids: HashSet<&str> = states.iter().map(|s| s.id.as_str()).collect();
        headings.retain(&ids);
    }

    /// Remember the registry data and relabel the marker if displayed
    ///
    /// Returns whether a label changed.
    pub fn apply_metadata(&mut self, id: &str, metadata: &AircraftMetadata) -> bool {
        self.metadata.insert(id.to_string(), metadata.clone());

        let Some(registration) = metadata.registration.as_deref() else {
            return false;
        };
        match self.markers.iter_mut().find(|m| m.id == id) {
            Some(marker) if marker.label != registration => {
                marker.label = registration.to_string();
                true
            }
            _ => false,
        }
    }

    fn label_for(&self, id: &str) -> String {
        self.metadata
            .get(id)
            .and_then(|m| m.registration.clone())
            .unwrap_or_else(|| id.to_uppercase())
    }

    pub fn metadata(&self, id: &str) -> Option<&AircraftMetadata> {
        self.metadata.get(id)
    }

    /// Detail card for a displayed aircraft
    ///
    /// Title is the registration, else the callsign, else the uppercase id.
    /// Speed is in knots and the heading is the smoothed one.
    pub fn card(&self, id: &str) -> Option<Vec<String>> {
        let marker = self.get(id)?;
        let metadata = self.metadata.get(id);

        let title = metadata
            .and_then(|m| m.registration.clone())
            .or_else(|| Some(marker.callsign.trim().to_string()).filter(|c| !c.is_empty()))
            .unwrap_or_else(|| marker.id.to_uppercase());

        let mut lines = vec![title];
        if let Some(m) = metadata {
            let details: Vec<&str> = [&m.typecode, &m.manufacturer, &m.model]
                .into_iter()
                .filter_map(|v| v.as_deref())
                .collect();
            if !details.is_empty() {
                lines.push(details.join(" • "));
            }
        }

        let or_na = |v: Option<f64>, unit: &str| {
            v.map(|v| format!("{:.0} {}", v, unit))
                .unwrap_or_else(|| "N/A".to_string())
        };
        lines.push(format!("  Altitude: {}", or_na(marker.altitude_ft, "ft")));
        lines.push(format!("  Speed:    {}", or_na(marker.speed_kt, "kt")));
        lines.push(format!("  Heading:  {:.0}°", marker.heading_deg));
        lines.push(format!(
            "  Vertical: {}",
            marker
                .vertical_fpm
                .map(|v| format!("{:+.0} ft/min", v))
                .unwrap_or_else(|| "---".to_string())
        ));
        Some(lines)
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn get(&self, id: &str) -> Option<&Marker> {
        self.markers.iter().find(|m| m.id == id)
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(id: &str) -> StateVector {
        StateVector {
            id: id.to_string(),
            callsign: id.to_string(),
            origin_country: "N/A".to_string(),
            time_position: 0,
            last_contact: 0,
            longitude: -85.5,
            latitude: 42.9,
            baro_altitude: Some(609.6),
            on_ground: false,
            velocity: Some(77.1666),
            track: Some(90.0),
            vertical_rate: Some(3.2512),
            geo_altitude: Some(609.6),
            squawk: None,
            spi: false,
            position_source: "dump1090".to_string(),
        }
    }

    #[test]
    fn test_speed_bands() {
        assert_eq!(SpeedBand::from_knots(None), SpeedBand::Slow);
        assert_eq!(SpeedBand::from_knots(Some(119.9)), SpeedBand::Slow);
        assert_eq!(SpeedBand::from_knots(Some(120.0)), SpeedBand::Medium);
        assert_eq!(SpeedBand::from_knots(Some(319.0)), SpeedBand::Medium);
        assert_eq!(SpeedBand::from_knots(Some(450.0)), SpeedBand::Fast);
    }

    #[test]
    fn test_opacity() {
        assert_eq!(altitude_opacity(None), 1.0);
        assert_eq!(altitude_opacity(Some(0.0)), 1.0);
        assert!((altitude_opacity(Some(20_000.0)) - 0.5).abs() < 1e-9);
        assert_eq!(altitude_opacity(Some(38_000.0)), MIN_OPACITY);
    }

    #[test]
    fn test_trend() {
        assert_eq!(Trend::from_fpm(Some(640.0)), Some(Trend::Climbing));
        assert_eq!(Trend::from_fpm(Some(-201.0)), Some(Trend::Descending));
        assert_eq!(Trend::from_fpm(Some(200.0)), None);
        assert_eq!(Trend::from_fpm(None), None);
    }

    #[test]
    fn test_heading_eases_along_short_arc() {
        let mut smoother = HeadingSmoother::new(0.35);
        assert_eq!(smoother.smooth("a1", Some(350.0)), 350.0);

        // 350 -> 10 is +20 the short way
        let eased = smoother.smooth("a1", Some(10.0));
        assert!((eased - 357.0).abs() < 1e-9);

        let eased = smoother.smooth("a1", Some(10.0));
        assert!((eased - (357.0 + 13.0 * 0.35 - 360.0)).abs() < 1e-9);

        assert_eq!(smoother.smooth("b2", None), 0.0);
        assert_eq!(smoother.smooth("b2", Some(f64::NAN)), 0.0);
    }

    #[test]
    fn test_render_display_units() {
        let mut layer = MarkerLayer::new();
        let mut smoother = HeadingSmoother::new(0.35);
        layer.render(&[state("a1b2c3")], &mut smoother);

        let marker = layer.get("a1b2c3").unwrap();
        assert_eq!(marker.label, "A1B2C3");
        assert!((marker.altitude_ft.unwrap() - 2000.0).abs() < 1e-6);
        assert!((marker.speed_kt.unwrap() - 150.0).abs() < 1e-6);
        assert!((marker.vertical_fpm.unwrap() - 640.0).abs() < 1e-6);
        assert_eq!(marker.speed_band, SpeedBand::Medium);
        assert_eq!(marker.trend, Some(Trend::Climbing));
        assert_eq!(marker.heading_deg, 90.0);
        assert_eq!(marker.caption(), "A1B2C3 / 2000 ft ▲");
    }

    #[test]
    fn test_registration_label_survives_rerender() {
        let mut layer = MarkerLayer::new();
        let mut smoother = HeadingSmoother::new(0.35);
        layer.render(&[state("a1b2c3")], &mut smoother);

        let metadata = AircraftMetadata {
            registration: Some("N123AB".to_string()),
            ..AircraftMetadata::default()
        };
        assert!(layer.apply_metadata("a1b2c3", &metadata));
        assert_eq!(layer.get("a1b2c3").unwrap().label, "N123AB");

        layer.render(&[state("a1b2c3"), state("d4e5f6")], &mut smoother);
        assert_eq!(layer.get("a1b2c3").unwrap().label, "N123AB");
        assert_eq!(layer.get("d4e5f6").unwrap().label, "D4E5F6");
    }

    #[test]
    fn test_card_with_and_without_metadata() {
        let mut layer = MarkerLayer::new();
        let mut smoother = HeadingSmoother::new(0.35);
        let mut plain = state("d4e5f6");
        plain.callsign = "DAL123".to_string();
        plain.vertical_rate = None;
        layer.render(&[state("a1b2c3"), plain], &mut smoother);

        let card = layer.card("d4e5f6").unwrap();
        assert_eq!(card[0], "DAL123");
        assert_eq!(card[1], "  Altitude: 2000 ft");
        assert_eq!(card[4], "  Vertical: ---");

        layer.apply_metadata(
            "a1b2c3",
            &AircraftMetadata {
                registration: Some("N123AB".to_string()),
                manufacturer: Some("Cessna".to_string()),
                model: Some("172S".to_string()),
                typecode: Some("C172".to_string()),
            },
        );
        let card = layer.card("a1b2c3").unwrap();
        assert_eq!(
            card,
            vec![
                "N123AB".to_string(),
                "C172 • Cessna • 172S".to_string(),
                "  Altitude: 2000 ft".to_string(),
                "  Speed:    150 kt".to_string(),
                "  Heading:  90°".to_string(),
                "  Vertical: +640 ft/min".to_string(),
            ]
        );

        assert!(layer.card("ffffff").is_none());
    }

    #[test]
    fn test_render_drops_departed_headings() {
        let mut layer = MarkerLayer::new();
        let mut smoother = HeadingSmoother::new(0.35);
        layer.render(&[state("a1"), state("b2")], &mut smoother);
        assert_eq!(smoother.len(), 2);

        layer.render(&[state("b2")], &mut smoother);
        assert_eq!(layer.len(), 1);
        assert_eq!(smoother.len(), 1);
    }
}
