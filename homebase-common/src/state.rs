//! Canonical state vector and feed snapshot
//!
//! A [`StateVector`] travels as a 17-element JSON array in a fixed order so
//! consumers written against the OpenSky `states` layout read it unchanged:
//!
//! | idx | field | idx | field |
//! |-----|-------|-----|-------|
//! | 0 | id (icao24) | 9 | velocity (m/s) |
//! | 1 | callsign | 10 | track (deg) |
//! | 2 | origin country | 11 | vertical rate (m/s) |
//! | 3 | time position | 12 | sensors (always null) |
//! | 4 | last contact | 13 | geo altitude (m) |
//! | 5 | longitude | 14 | squawk |
//! | 6 | latitude | 15 | spi |
//! | 7 | baro altitude (m) | 16 | position source |
//! | 8 | on ground | | |

use serde::de::{self, SeqAccess, Visitor};
use serde::ser::SerializeTuple;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::geo::GeoPoint;

/// Number of positional fields in the wire layout
pub const STATE_VECTOR_FIELDS: usize = 17;

/// Origin country placeholder when the upstream does not report one
pub const UNKNOWN_COUNTRY: &str = "N/A";

/// One aircraft at one snapshot time, in canonical SI units
#[derive(Debug, Clone, PartialEq)]
pub struct StateVector {
    /// 24-bit transponder address, lowercase hex
    pub id: String,
    /// Trimmed callsign, `id` when the upstream has none
    pub callsign: String,
    pub origin_country: String,
    /// Unix seconds of snapshot retrieval
    pub time_position: i64,
    /// Unix seconds of snapshot retrieval
    pub last_contact: i64,
    pub longitude: f64,
    pub latitude: f64,
    /// Barometric altitude in meters
    pub baro_altitude: Option<f64>,
    pub on_ground: bool,
    /// Ground speed in meters/second
    pub velocity: Option<f64>,
    /// True track in degrees
    pub track: Option<f64>,
    /// Vertical rate in meters/second
    pub vertical_rate: Option<f64>,
    /// Geometric altitude in meters (falls back to baro altitude)
    pub geo_altitude: Option<f64>,
    pub squawk: Option<String>,
    pub spi: bool,
    /// Tag of the upstream that produced this record
    pub position_source: String,
}

impl StateVector {
    /// Aircraft position
    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(self.longitude, self.latitude)
    }

    /// Altitude used for threshold checks: geometric preferred, else barometric
    pub fn best_altitude(&self) -> Option<f64> {
        self.geo_altitude.or(self.baro_altitude)
    }
}

impl Serialize for StateVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut row = serializer.serialize_tuple(STATE_VECTOR_FIELDS)?;
        row.serialize_element(&self.id)?;
        row.serialize_element(&self.callsign)?;
        row.serialize_element(&self.origin_country)?;
        row.serialize_element(&self.time_position)?;
        row.serialize_element(&self.last_contact)?;
        row.serialize_element(&self.longitude)?;
        row.serialize_element(&self.latitude)?;
        row.serialize_element(&self.baro_altitude)?;
        row.serialize_element(&self.on_ground)?;
        row.serialize_element(&self.velocity)?;
        row.serialize_element(&self.track)?;
        row.serialize_element(&self.vertical_rate)?;
        row.serialize_element(&Option::<()>::None)?; // sensors
        row.serialize_element(&self.geo_altitude)?;
        row.serialize_element(&self.squawk)?;
        row.serialize_element(&self.spi)?;
        row.serialize_element(&self.position_source)?;
        row.end()
    }
}

struct StateVectorVisitor;

impl<'de> Visitor<'de> for StateVectorVisitor {
    type Value = StateVector;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "a {}-element state vector array", STATE_VECTOR_FIELDS)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<StateVector, A::Error> {
        macro_rules! field {
            ($idx:expr) => {
                seq.next_element()?
                    .ok_or_else(|| de::Error::invalid_length($idx, &self))?
            };
        }

        let id: String = field!(0);
        let callsign: Option<String> = field!(1);
        let origin_country: Option<String> = field!(2);
        let time_position: i64 = field!(3);
        let last_contact: i64 = field!(4);
        let longitude: f64 = field!(5);
        let latitude: f64 = field!(6);
        let baro_altitude: Option<f64> = field!(7);
        let on_ground: Option<bool> = field!(8);
        let velocity: Option<f64> = field!(9);
        let track: Option<f64> = field!(10);
        let vertical_rate: Option<f64> = field!(11);
        let _sensors: de::IgnoredAny = field!(12);
        let geo_altitude: Option<f64> = field!(13);
        let squawk: Option<String> = field!(14);
        let spi: Option<bool> = field!(15);
        let position_source: Option<String> = field!(16);

        Ok(StateVector {
            callsign: callsign.unwrap_or_else(|| id.clone()),
            id,
            origin_country: origin_country.unwrap_or_else(|| UNKNOWN_COUNTRY.to_string()),
            time_position,
            last_contact,
            longitude,
            latitude,
            baro_altitude,
            on_ground: on_ground.unwrap_or(false),
            velocity,
            track,
            vertical_rate,
            geo_altitude,
            squawk,
            spi: spi.unwrap_or(false),
            position_source: position_source.unwrap_or_default(),
        })
    }
}

impl<'de> Deserialize<'de> for StateVector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_tuple(STATE_VECTOR_FIELDS, StateVectorVisitor)
    }
}

/// The payload served by the feed proxy for one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedSnapshot {
    /// Unix seconds when the snapshot was assembled
    pub time: i64,
    /// Tag of the upstream source that produced `states`
    pub source: String,
    pub states: Vec<StateVector>,
}
