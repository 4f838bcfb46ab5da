//! Unit reconciliation
//!
//! Canonical units for every [`StateVector`](crate::StateVector) are SI:
//! meters for altitude, meters/second for speed and vertical rate, degrees
//! for track. Upstream payloads report feet, knots and feet/minute; the
//! watch client displays feet and knots again. Every scale factor used for
//! either direction lives here and nowhere else.

/// Knots to meters per second
pub const KNOTS_TO_MS: f64 = 0.514444;

/// Feet to meters
pub const FEET_TO_METERS: f64 = 0.3048;

/// Feet per minute to meters per second
pub const FPM_TO_MS: f64 = 0.00508;

/// Statute miles to meters
pub const STATUTE_MILES_TO_METERS: f64 = 1609.34;

/// Conversion applied to one mapped upstream field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    /// Value already in canonical units
    Identity,
    /// Ground speed reported in knots
    KnotsToMetersPerSecond,
    /// Altitude reported in feet
    FeetToMeters,
    /// Climb rate reported in feet/minute
    FeetPerMinuteToMetersPerSecond,
}

impl Conversion {
    /// Convert an upstream value to canonical units
    pub fn apply(self, value: f64) -> f64 {
        match self {
            Conversion::Identity => value,
            Conversion::KnotsToMetersPerSecond => value * KNOTS_TO_MS,
            Conversion::FeetToMeters => value * FEET_TO_METERS,
            Conversion::FeetPerMinuteToMetersPerSecond => value * FPM_TO_MS,
        }
    }
}

/// Meters to feet (display boundary)
pub fn meters_to_feet(meters: f64) -> f64 {
    meters / FEET_TO_METERS
}

/// Feet to meters (operator input boundary)
pub fn feet_to_meters(feet: f64) -> f64 {
    feet * FEET_TO_METERS
}

/// Meters per second to knots (display boundary)
pub fn ms_to_knots(ms: f64) -> f64 {
    ms / KNOTS_TO_MS
}

/// Meters per second to feet per minute (display boundary)
pub fn ms_to_fpm(ms: f64) -> f64 {
    ms / FPM_TO_MS
}

/// Statute miles to meters (ring radius configuration)
pub fn statute_miles_to_meters(miles: f64) -> f64 {
    miles * STATUTE_MILES_TO_METERS
}
