//! Alert ledger
//!
//! An aircraft violates when its altitude (geometric, else barometric) is at
//! or below the threshold and the active geofence contains it. One record
//! per continuous violation episode: created the first time the id
//! violates, left alone while it keeps violating, removed once it stops.

use chrono::{DateTime, Utc};
use homebase_common::StateVector;
use std::collections::HashMap;

use crate::enrichment::AircraftMetadata;
use crate::geofence::GeofenceEngine;

/// One open violation episode
#[derive(Debug, Clone, PartialEq)]
pub struct AlertRecord {
    pub aircraft_id: String,
    /// Uppercase id until a registration is known
    pub label: String,
    /// Altitude (meters) when the episode opened
    pub altitude_m: f64,
    pub first_seen_at: DateTime<Utc>,
}

/// Ids whose episodes opened or closed during one evaluation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlertChanges {
    pub opened: Vec<String>,
    pub closed: Vec<String>,
}

impl AlertChanges {
    pub fn is_empty(&self) -> bool {
        self.opened.is_empty() && self.closed.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct AlertLedger {
    threshold_m: f64,
    records: HashMap<String, AlertRecord>,
}

impl AlertLedger {
    pub fn new(threshold_m: f64) -> Self {
        Self {
            threshold_m,
            records: HashMap::new(),
        }
    }

    pub fn threshold_m(&self) -> f64 {
        self.threshold_m
    }

    /// Change the threshold; any change starts fresh episode accounting
    ///
    /// Returns whether the ledger was reset.
    pub fn set_threshold_m(&mut self, threshold_m: f64) -> bool {
        if threshold_m == self.threshold_m {
            return false;
        }
        self.threshold_m = threshold_m;
        self.records.clear();
        true
    }

    /// Altitude-and-containment test for one aircraft
    pub fn violates(&self, state: &StateVector, geofence: &GeofenceEngine) -> bool {
        state
            .best_altitude()
            .is_some_and(|alt| alt <= self.threshold_m)
            && geofence.contains(state.position())
    }

    /// Apply one snapshot
    pub fn evaluate(
        &mut self,
        states: &[StateVector],
        geofence: &GeofenceEngine,
        now: DateTime<Utc>,
    ) -> AlertChanges {
        let mut changes = AlertChanges::default();
        let mut violating: HashMap<&str, &StateVector> = HashMap::new();

        for state in states {
            if self.violates(state, geofence) {
                violating.insert(state.id.as_str(), state);
            }
        }

        self.records.retain(|id, _| {
            let keep = violating.contains_key(id.as_str());
            if !keep {
                changes.closed.push(id.clone());
            }
            keep
        });

        for state in states {
            let Some(&violator) = violating.get(state.id.as_str()) else {
                continue;
            };
            if self.records.contains_key(&violator.id) {
                continue;
            }
            self.records.insert(
                violator.id.clone(),
                AlertRecord {
                    aircraft_id: violator.id.clone(),
                    label: violator.id.to_uppercase(),
                    altitude_m: violator.best_altitude().unwrap_or_default(),
                    first_seen_at: now,
                },
            );
            changes.opened.push(violator.id.clone());
        }

        changes.closed.sort();
        changes
    }

    /// Replace the placeholder label with the registration, in place
    ///
    /// Returns whether a label changed.
    pub fn apply_metadata(&mut self, id: &str, metadata: &AircraftMetadata) -> bool {
        let (Some(record), Some(registration)) =
            (self.records.get_mut(id), metadata.registration.as_deref())
        else {
            return false;
        };
        if record.label == registration {
            return false;
        }
        record.label = registration.to_string();
        true
    }

    /// Empty the ledger (geofence cleared or replaced)
    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn get(&self, id: &str) -> Option<&AlertRecord> {
        self.records.get(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Open records, oldest first
    pub fn records(&self) -> Vec<&AlertRecord> {
        let mut records: Vec<&AlertRecord> = self.records.values().collect();
        records.sort_by(|a, b| {
            a.first_seen_at
                .cmp(&b.first_seen_at)
                .then_with(|| a.aircraft_id.cmp(&b.aircraft_id))
        });
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use homebase_common::geo::GeoPoint;

    fn state(id: &str, lon: f64, lat: f64, alt_m: Option<f64>) -> StateVector {
        StateVector {
            id: id.to_string(),
            callsign: id.to_string(),
            origin_country: "N/A".to_string(),
            time_position: 0,
            last_contact: 0,
            longitude: lon,
            latitude: lat,
            baro_altitude: alt_m,
            on_ground: false,
            velocity: None,
            track: None,
            vertical_rate: None,
            geo_altitude: alt_m,
            squawk: None,
            spi: false,
            position_source: "dump1090".to_string(),
        }
    }

    fn fence() -> GeofenceEngine {
        let mut engine = GeofenceEngine::new(vec![1000.0]).unwrap();
        engine
            .set_polygon(&[
                GeoPoint::new(0.0, 0.0),
                GeoPoint::new(4.0, 0.0),
                GeoPoint::new(0.0, 4.0),
            ])
            .unwrap();
        engine
    }

    #[test]
    fn test_three_polls_one_record_then_clear() {
        let geofence = fence();
        let mut ledger = AlertLedger::new(700.0);
        let t0 = Utc::now();
        let snapshot = vec![state("a1b2c3", 1.0, 1.0, Some(500.0))];

        let first = ledger.evaluate(&snapshot, &geofence, t0);
        assert_eq!(first.opened, vec!["a1b2c3".to_string()]);
        ledger.evaluate(&snapshot, &geofence, t0 + Duration::seconds(5));
        let third = ledger.evaluate(&snapshot, &geofence, t0 + Duration::seconds(10));
        assert!(third.is_empty());

        assert_eq!(ledger.len(), 1);
        let record = ledger.get("a1b2c3").unwrap();
        assert_eq!(record.label, "A1B2C3");
        assert_eq!(record.first_seen_at, t0);
        assert_eq!(record.altitude_m, 500.0);

        ledger.clear();
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_altitude_gate() {
        let geofence = fence();
        let ledger = AlertLedger::new(700.0);

        assert!(ledger.violates(&state("a", 1.0, 1.0, Some(700.0)), &geofence));
        assert!(!ledger.violates(&state("b", 1.0, 1.0, Some(700.1)), &geofence));
        assert!(!ledger.violates(&state("c", 1.0, 1.0, None), &geofence));
        assert!(!ledger.violates(&state("d", 9.0, 9.0, Some(100.0)), &geofence));
    }

    #[test]
    fn test_geo_altitude_preferred() {
        let geofence = fence();
        let ledger = AlertLedger::new(700.0);
        let mut sv = state("a", 1.0, 1.0, Some(500.0));
        sv.geo_altitude = Some(900.0);
        assert!(!ledger.violates(&sv, &geofence));
    }

    #[test]
    fn test_episode_closes_when_no_longer_violating() {
        let geofence = fence();
        let mut ledger = AlertLedger::new(700.0);
        let t0 = Utc::now();

        ledger.evaluate(&[state("a1", 1.0, 1.0, Some(500.0))], &geofence, t0);
        let changes = ledger.evaluate(&[state("a1", 1.0, 1.0, Some(900.0))], &geofence, t0);
        assert_eq!(changes.closed, vec!["a1".to_string()]);
        assert!(ledger.is_empty());

        let t1 = t0 + Duration::seconds(30);
        ledger.evaluate(&[state("a1", 1.0, 1.0, Some(500.0))], &geofence, t1);
        assert_eq!(ledger.get("a1").unwrap().first_seen_at, t1, "new episode");
    }

    #[test]
    fn test_no_containment_without_fence() {
        let geofence = GeofenceEngine::new(vec![1000.0]).unwrap();
        let mut ledger = AlertLedger::new(700.0);
        ledger.evaluate(&[state("a1", 1.0, 1.0, Some(100.0))], &geofence, Utc::now());
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_threshold_change_resets() {
        let geofence = fence();
        let mut ledger = AlertLedger::new(700.0);
        ledger.evaluate(&[state("a1", 1.0, 1.0, Some(500.0))], &geofence, Utc::now());

        assert!(!ledger.set_threshold_m(700.0));
        assert_eq!(ledger.len(), 1);

        assert!(ledger.set_threshold_m(800.0));
        assert!(ledger.is_empty());
        assert_eq!(ledger.threshold_m(), 800.0);
    }

    #[test]
    fn test_label_upgrade_in_place() {
        let geofence = fence();
        let mut ledger = AlertLedger::new(700.0);
        let t0 = Utc::now();
        ledger.evaluate(&[state("a1b2c3", 1.0, 1.0, Some(500.0))], &geofence, t0);

        let metadata = AircraftMetadata {
            registration: Some("N123AB".to_string()),
            ..AircraftMetadata::default()
        };
        assert!(ledger.apply_metadata("a1b2c3", &metadata));
        assert!(!ledger.apply_metadata("a1b2c3", &metadata));
        assert!(!ledger.apply_metadata("ffffff", &metadata));

        ledger.evaluate(&[state("a1b2c3", 1.0, 1.0, Some(400.0))], &geofence, t0);
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.get("a1b2c3").unwrap().label, "N123AB");
    }

    #[test]
    fn test_metadata_without_registration_keeps_placeholder() {
        let geofence = fence();
        let mut ledger = AlertLedger::new(700.0);
        ledger.evaluate(&[state("a1", 1.0, 1.0, Some(500.0))], &geofence, Utc::now());

        let metadata = AircraftMetadata {
            model: Some("172".to_string()),
            ..AircraftMetadata::default()
        };
        assert!(!ledger.apply_metadata("a1", &metadata));
        assert_eq!(ledger.get("a1").unwrap().label, "A1");
    }

    #[test]
    fn test_records_ordered_by_first_seen() {
        let geofence = fence();
        let mut ledger = AlertLedger::new(700.0);
        let t0 = Utc::now();
        ledger.evaluate(&[state("bbb", 1.0, 1.0, Some(500.0))], &geofence, t0);
        ledger.evaluate(
            &[
                state("aaa", 1.0, 1.0, Some(500.0)),
                state("bbb", 1.0, 1.0, Some(500.0)),
            ],
            &geofence,
            t0 + Duration::seconds(5),
        );

        let ids: Vec<&str> = ledger.records().iter().map(|r| r.aircraft_id.as_str()).collect();
        assert_eq!(ids, vec!["bbb", "aaa"]);
    }
}
