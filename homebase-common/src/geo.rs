//! Geodesy helpers
//!
//! Positions are `(lon, lat)` in decimal degrees, matching the GeoJSON
//! ordering used by the map client when a polygon is drawn.

use serde::{Deserialize, Serialize};

/// Mean earth radius in meters (same constant the map client's distance uses)
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Planar tolerance for "point lies on an edge"
const EDGE_EPSILON: f64 = 1e-12;

/// A geographic position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lon: f64,
    pub lat: f64,
}

impl GeoPoint {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Both coordinates finite and within the valid lon/lat ranges
    pub fn is_valid(&self) -> bool {
        valid_lat(self.lat) && valid_lon(self.lon)
    }
}

/// Latitude is finite and within [-90, 90]
pub fn valid_lat(lat: f64) -> bool {
    lat.is_finite() && (-90.0..=90.0).contains(&lat)
}

/// Longitude is finite and within [-180, 180]
pub fn valid_lon(lon: f64) -> bool {
    lon.is_finite() && (-180.0..=180.0).contains(&lon)
}

/// Great-circle distance in meters (haversine)
pub fn haversine_distance(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

/// Point-in-polygon with an inclusive boundary
///
/// `ring` is the vertex ring; closing the ring (repeating the first vertex)
/// is optional. Points on an edge or vertex count as inside.
pub fn polygon_contains(ring: &[GeoPoint], point: GeoPoint) -> bool {
    if ring.len() < 3 {
        return false;
    }

    let n = ring.len();
    for i in 0..n {
        if on_segment(ring[i], ring[(i + 1) % n], point) {
            return true;
        }
    }

    // Even-odd ray cast towards +lon
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (pi, pj) = (ring[i], ring[j]);
        if (pi.lat > point.lat) != (pj.lat > point.lat) {
            let cross_lon = pi.lon + (point.lat - pi.lat) * (pj.lon - pi.lon) / (pj.lat - pi.lat);
            if point.lon < cross_lon {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

fn on_segment(a: GeoPoint, b: GeoPoint, p: GeoPoint) -> bool {
    let cross = (b.lon - a.lon) * (p.lat - a.lat) - (b.lat - a.lat) * (p.lon - a.lon);
    if cross.abs() > EDGE_EPSILON {
        return false;
    }
    p.lon >= a.lon.min(b.lon) - EDGE_EPSILON
        && p.lon <= a.lon.max(b.lon) + EDGE_EPSILON
        && p.lat >= a.lat.min(b.lat) - EDGE_EPSILON
        && p.lat <= a.lat.max(b.lat) + EDGE_EPSILON
}
