//! Raw record → canonical [`StateVector`]
//!
//! Null-safe coercion rules:
//! - missing or non-coercible values become `None`, never zero or ""
//! - numbers may arrive as JSON numbers or numeric strings
//! - `alt_baro: "ground"` marks the aircraft on ground, altitude stays null
//! - records without a usable id, latitude or longitude are dropped
//!
//! Duplicate ids within one payload are last-write-wins; the surviving
//! record keeps the slot of the first occurrence.

use homebase_common::geo::{valid_lat, valid_lon};
use homebase_common::state::UNKNOWN_COUNTRY;
use homebase_common::StateVector;
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::schema::{lookup, CanonicalField, SourceSchema};

/// Marker readsb uses in `alt_baro` for surface positions
const GROUND_MARKER: &str = "ground";

/// Normalize a raw aircraft list
///
/// `now` is the retrieval instant stamped into `time_position` and
/// `last_contact`.
pub fn normalize(schema: SourceSchema, records: &[Value], now: i64) -> Vec<StateVector> {
    let mut states: Vec<StateVector> = Vec::with_capacity(records.len());
    let mut slot_by_id: HashMap<String, usize> = HashMap::new();

    for record in records {
        let Some(state) = normalize_record(schema, record, now) else {
            continue;
        };

        match slot_by_id.get(&state.id) {
            Some(&slot) => states[slot] = state,
            None => {
                slot_by_id.insert(state.id.clone(), states.len());
                states.push(state);
            }
        }
    }

    states
}

/// Normalize one raw record, `None` when it must be dropped
pub fn normalize_record(schema: SourceSchema, record: &Value, now: i64) -> Option<StateVector> {
    let record = record.as_object()?;

    let id = text(schema, record, CanonicalField::Id)?.to_lowercase();
    if id.is_empty() {
        return None;
    }

    let latitude = number(schema, record, CanonicalField::Latitude).filter(|v| valid_lat(*v))?;
    let longitude = number(schema, record, CanonicalField::Longitude).filter(|v| valid_lon(*v))?;

    let callsign = text(schema, record, CanonicalField::Callsign)
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| id.clone());

    let origin_country = text(schema, record, CanonicalField::OriginCountry)
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| UNKNOWN_COUNTRY.to_string());

    let baro_altitude = number(schema, record, CanonicalField::BaroAltitude);
    let geo_altitude = number(schema, record, CanonicalField::GeoAltitude).or(baro_altitude);

    let reports_ground = schema
        .mapping(CanonicalField::BaroAltitude)
        .and_then(|m| lookup(record, m))
        .and_then(Value::as_str)
        .is_some_and(|s| s.trim().eq_ignore_ascii_case(GROUND_MARKER));

    let on_ground = flag(schema, record, CanonicalField::OnGround).unwrap_or(false) || reports_ground;

    Some(StateVector {
        id,
        callsign,
        origin_country,
        time_position: now,
        last_contact: now,
        longitude,
        latitude,
        baro_altitude,
        on_ground,
        velocity: number(schema, record, CanonicalField::Velocity),
        track: number(schema, record, CanonicalField::Track),
        vertical_rate: number(schema, record, CanonicalField::VerticalRate),
        geo_altitude,
        squawk: text(schema, record, CanonicalField::Squawk).filter(|s| !s.is_empty()),
        spi: false,
        position_source: schema.position_source().to_string(),
    })
}

/// Mapped numeric field in canonical units
fn number(schema: SourceSchema, record: &Map<String, Value>, field: CanonicalField) -> Option<f64> {
    let mapping = schema.mapping(field)?;
    let raw = lookup(record, mapping).and_then(coerce_f64)?;
    Some(mapping.conversion.apply(raw))
}

/// Mapped string field, trimmed
fn text(schema: SourceSchema, record: &Map<String, Value>, field: CanonicalField) -> Option<String> {
    let mapping = schema.mapping(field)?;
    lookup(record, mapping).and_then(coerce_string)
}

fn flag(schema: SourceSchema, record: &Map<String, Value>, field: CanonicalField) -> Option<bool> {
    let mapping = schema.mapping(field)?;
    lookup(record, mapping).and_then(coerce_bool)
}

pub(crate) fn coerce_f64(value: &Value) -> Option<f64> {
    let v = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    v.is_finite().then_some(v)
}

pub(crate) fn coerce_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|v| v != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}
