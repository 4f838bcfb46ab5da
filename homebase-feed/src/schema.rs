//! Declared upstream schemas
//!
//! Every upstream has a fixed schema tag. The tag decides where the
//! aircraft list lives and which static field table maps source fields to
//! canonical fields. Nothing is inferred from whichever key happens to be
//! present: a payload that matches none of the declared list keys is
//! [`SourceError::UnrecognizedSchema`].

use homebase_common::units::Conversion;
use serde_json::{Map, Value};

use crate::error::SourceError;

/// Supported upstream payload shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceSchema {
    /// dump1090 / readsb `aircraft.json`
    LocalReceiver,
    /// ADSB.lol style `/v2/point` response
    RemoteAggregator,
}

/// Canonical fields fed from upstream data
///
/// Time fields, `sensors` and `spi` are not upstream-sourced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanonicalField {
    Id,
    Callsign,
    OriginCountry,
    Latitude,
    Longitude,
    BaroAltitude,
    GeoAltitude,
    Velocity,
    Track,
    VerticalRate,
    Squawk,
    OnGround,
}

/// One row of a schema's field table
#[derive(Debug, Clone, Copy)]
pub struct FieldMapping {
    pub field: CanonicalField,
    /// Source field names, first present non-null wins
    pub sources: &'static [&'static str],
    pub conversion: Conversion,
}

const fn map(
    field: CanonicalField,
    sources: &'static [&'static str],
    conversion: Conversion,
) -> FieldMapping {
    FieldMapping {
        field,
        sources,
        conversion,
    }
}

use CanonicalField as F;
use Conversion as C;

static LOCAL_RECEIVER_FIELDS: &[FieldMapping] = &[
    map(F::Id, &["hex"], C::Identity),
    map(F::Callsign, &["flight"], C::Identity),
    map(F::OriginCountry, &[], C::Identity),
    map(F::Latitude, &["lat"], C::Identity),
    map(F::Longitude, &["lon"], C::Identity),
    map(F::BaroAltitude, &["alt_baro"], C::FeetToMeters),
    map(F::GeoAltitude, &["alt_geom"], C::FeetToMeters),
    map(F::Velocity, &["gs"], C::KnotsToMetersPerSecond),
    map(F::Track, &["track"], C::Identity),
    map(F::VerticalRate, &["baro_rate", "geom_rate"], C::FeetPerMinuteToMetersPerSecond),
    map(F::Squawk, &["squawk"], C::Identity),
    map(F::OnGround, &["ground"], C::Identity),
];

static REMOTE_AGGREGATOR_FIELDS: &[FieldMapping] = &[
    map(F::Id, &["hex", "icao", "icao24"], C::Identity),
    map(F::Callsign, &["flight", "callsign"], C::Identity),
    map(F::OriginCountry, &["country"], C::Identity),
    map(F::Latitude, &["lat"], C::Identity),
    map(F::Longitude, &["lon"], C::Identity),
    map(F::BaroAltitude, &["alt_baro"], C::FeetToMeters),
    map(F::GeoAltitude, &["alt_geom"], C::FeetToMeters),
    map(F::Velocity, &["gs"], C::KnotsToMetersPerSecond),
    map(F::Track, &["track"], C::Identity),
    map(F::VerticalRate, &["baro_rate", "geom_rate"], C::FeetPerMinuteToMetersPerSecond),
    map(F::Squawk, &["squawk"], C::Identity),
    map(F::OnGround, &["ground"], C::Identity),
];

impl SourceSchema {
    /// Keys that may hold the aircraft list, in priority order
    pub fn list_keys(self) -> &'static [&'static str] {
        match self {
            SourceSchema::LocalReceiver => &["aircraft"],
            SourceSchema::RemoteAggregator => &["ac", "aircraft", "data"],
        }
    }

    /// Static field table for this schema
    pub fn fields(self) -> &'static [FieldMapping] {
        match self {
            SourceSchema::LocalReceiver => LOCAL_RECEIVER_FIELDS,
            SourceSchema::RemoteAggregator => REMOTE_AGGREGATOR_FIELDS,
        }
    }

    pub fn mapping(self, field: CanonicalField) -> Option<&'static FieldMapping> {
        self.fields().iter().find(|m| m.field == field)
    }

    /// `position_source` tag stamped on every record from this schema
    pub fn position_source(self) -> &'static str {
        match self {
            SourceSchema::LocalReceiver => "dump1090",
            SourceSchema::RemoteAggregator => "adsblol",
        }
    }

    /// Pull the raw aircraft list out of a decoded payload
    ///
    /// Declared list keys are tried in priority order; the first one holding
    /// an array (possibly empty) wins. A key that is present with any other
    /// value is skipped.
    pub fn extract(self, payload: Value) -> Result<Vec<Value>, SourceError> {
        let Value::Object(mut root) = payload else {
            return Err(SourceError::UnrecognizedSchema { keys: Vec::new() });
        };

        let key = self
            .list_keys()
            .iter()
            .find(|k| matches!(root.get(**k), Some(Value::Array(_))));

        match key.and_then(|k| root.remove(*k)) {
            Some(Value::Array(list)) => Ok(list),
            _ => Err(SourceError::UnrecognizedSchema {
                keys: root.keys().cloned().collect(),
            }),
        }
    }
}

/// First present, non-null source value for a mapping
pub fn lookup<'a>(record: &'a Map<String, Value>, mapping: &FieldMapping) -> Option<&'a Value> {
    mapping
        .sources
        .iter()
        .filter_map(|name| record.get(*name))
        .find(|v| !v.is_null())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_local_extracts_aircraft_key() {
        let list = SourceSchema::LocalReceiver
            .extract(json!({"now": 1.0, "aircraft": [{"hex": "abc"}]}))
            .unwrap();
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_local_does_not_accept_remote_keys() {
        let err = SourceSchema::LocalReceiver
            .extract(json!({"ac": [{"hex": "abc"}]}))
            .unwrap_err();
        assert_eq!(err, SourceError::UnrecognizedSchema { keys: vec!["ac".to_string()] });
    }

    #[test]
    fn test_remote_key_priority() {
        let list = SourceSchema::RemoteAggregator
            .extract(json!({"data": [1, 2, 3], "ac": [{"hex": "abc"}]}))
            .unwrap();
        assert_eq!(list, vec![json!({"hex": "abc"})]);
    }

    #[test]
    fn test_remote_falls_through_declared_keys_only() {
        let list = SourceSchema::RemoteAggregator
            .extract(json!({"data": [{"hex": "abc"}]}))
            .unwrap();
        assert_eq!(list.len(), 1);

        let err = SourceSchema::RemoteAggregator
            .extract(json!({"planes": [{"hex": "abc"}], "msg": "No error"}))
            .unwrap_err();
        match err {
            SourceError::UnrecognizedSchema { mut keys } => {
                keys.sort();
                assert_eq!(keys, vec!["msg".to_string(), "planes".to_string()]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_root_array_is_not_guessed() {
        let err = SourceSchema::RemoteAggregator
            .extract(json!([{"hex": "abc"}]))
            .unwrap_err();
        assert_eq!(err, SourceError::UnrecognizedSchema { keys: vec![] });
    }

    #[test]
    fn test_list_key_with_wrong_type_unrecognized() {
        assert!(SourceSchema::LocalReceiver
            .extract(json!({"aircraft": {"hex": "abc"}}))
            .is_err());
    }

    #[test]
    fn test_remote_skips_keys_without_a_list() {
        let list = SourceSchema::RemoteAggregator
            .extract(json!({"ac": null, "aircraft": [{"hex": "abc", "lat": 1.0, "lon": 1.0}]}))
            .unwrap();
        assert_eq!(list, vec![json!({"hex": "abc", "lat": 1.0, "lon": 1.0})]);

        let list = SourceSchema::RemoteAggregator
            .extract(json!({"ac": "x", "data": [{"hex": "def"}]}))
            .unwrap();
        assert_eq!(list, vec![json!({"hex": "def"})]);

        let err = SourceSchema::RemoteAggregator
            .extract(json!({"ac": null, "aircraft": {"hex": "abc"}}))
            .unwrap_err();
        assert_eq!(
            err,
            SourceError::UnrecognizedSchema {
                keys: vec!["ac".to_string(), "aircraft".to_string()]
            }
        );
    }

    #[test]
    fn test_empty_list_is_recognized() {
        let list = SourceSchema::LocalReceiver.extract(json!({"aircraft": []})).unwrap();
        assert!(list.is_empty());
    }

    #[test]
    fn test_every_schema_maps_every_field_once() {
        let all = [
            F::Id,
            F::Callsign,
            F::OriginCountry,
            F::Latitude,
            F::Longitude,
            F::BaroAltitude,
            F::GeoAltitude,
            F::Velocity,
            F::Track,
            F::VerticalRate,
            F::Squawk,
            F::OnGround,
        ];
        for schema in [SourceSchema::LocalReceiver, SourceSchema::RemoteAggregator] {
            for field in all {
                let count = schema.fields().iter().filter(|m| m.field == field).count();
                assert_eq!(count, 1, "{:?} {:?}", schema, field);
            }
        }
    }

    #[test]
    fn test_lookup_skips_null_and_missing() {
        let record = json!({"hex": null, "icao": "ABC123"});
        let mapping = SourceSchema::RemoteAggregator.mapping(F::Id).unwrap();
        assert_eq!(
            lookup(record.as_object().unwrap(), mapping),
            Some(&json!("ABC123"))
        );

        let mapping = SourceSchema::LocalReceiver.mapping(F::Id).unwrap();
        assert_eq!(lookup(record.as_object().unwrap(), mapping), None);
    }

    #[test]
    fn test_unit_conversions_declared() {
        let schema = SourceSchema::LocalReceiver;
        assert_eq!(schema.mapping(F::Velocity).unwrap().conversion, C::KnotsToMetersPerSecond);
        assert_eq!(schema.mapping(F::BaroAltitude).unwrap().conversion, C::FeetToMeters);
        assert_eq!(schema.mapping(F::Track).unwrap().conversion, C::Identity);
    }
}
