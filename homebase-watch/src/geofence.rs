//! Geofence engine
//!
//! One active region at a time, either a drawn polygon or alert rings
//! around a chosen center:
//!
//! ```text
//! Idle ──begin_polygon──▶ Drawing ──finish_polygon──▶ PolygonActive
//!  │                                                        │
//!  └──arm_rings──▶ RingArmed ──place_rings──▶ RingActive    │
//!                                                 │         │
//!                       clear (from any state) ◀──┴─────────┘
//! ```
//!
//! Starting either path while the other region is active replaces it.
//! Only `PolygonActive` and `RingActive` contain anything.

use homebase_common::geo::{haversine_distance, polygon_contains, GeoPoint};
use thiserror::Error;

/// Minimum distinct vertices for a polygon
pub const MIN_POLYGON_VERTICES: usize = 3;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeofenceError {
    #[error("not drawing a polygon")]
    NotDrawing,

    #[error("polygon needs at least 3 distinct vertices, have {0}")]
    TooFewVertices(usize),

    #[error("rings are not armed")]
    NotArmed,

    #[error("invalid position lon={lon} lat={lat}")]
    InvalidPoint { lon: f64, lat: f64 },

    #[error("ring radii must be positive and non-empty")]
    InvalidRadii,
}

/// An active alert region
#[derive(Debug, Clone, PartialEq)]
pub enum Geofence {
    Polygon(Vec<GeoPoint>),
    Rings { center: GeoPoint, radii_m: Vec<f64> },
}

impl Geofence {
    /// Inclusive containment
    ///
    /// Rings contain a point when its great-circle distance from the center
    /// is at most the outermost radius.
    pub fn contains(&self, point: GeoPoint) -> bool {
        match self {
            Geofence::Polygon(vertices) => polygon_contains(vertices, point),
            Geofence::Rings { center, radii_m } => radii_m
                .iter()
                .copied()
                .reduce(f64::max)
                .is_some_and(|outer| haversine_distance(*center, point) <= outer),
        }
    }
}

/// Engine state
#[derive(Debug, Clone, PartialEq)]
pub enum GeofenceState {
    Idle,
    Drawing { vertices: Vec<GeoPoint> },
    PolygonActive(Geofence),
    RingArmed,
    RingActive(Geofence),
}

/// Geofence state machine
#[derive(Debug, Clone)]
pub struct GeofenceEngine {
    state: GeofenceState,
    ring_radii_m: Vec<f64>,
}

impl GeofenceEngine {
    /// `ring_radii_m` are the radii used whenever rings are placed
    pub fn new(ring_radii_m: Vec<f64>) -> Result<Self, GeofenceError> {
        if ring_radii_m.is_empty() || ring_radii_m.iter().any(|r| !(r.is_finite() && *r > 0.0)) {
            return Err(GeofenceError::InvalidRadii);
        }
        Ok(Self {
            state: GeofenceState::Idle,
            ring_radii_m,
        })
    }

    pub fn state(&self) -> &GeofenceState {
        &self.state
    }

    pub fn ring_radii_m(&self) -> &[f64] {
        &self.ring_radii_m
    }

    /// The region used for containment, if any
    pub fn active(&self) -> Option<&Geofence> {
        match &self.state {
            GeofenceState::PolygonActive(fence) | GeofenceState::RingActive(fence) => Some(fence),
            _ => None,
        }
    }

    pub fn contains(&self, point: GeoPoint) -> bool {
        self.active().is_some_and(|fence| fence.contains(point))
    }

    /// Start drawing; drops whatever region was active
    pub fn begin_polygon(&mut self) {
        self.state = GeofenceState::Drawing {
            vertices: Vec::new(),
        };
    }

    pub fn add_vertex(&mut self, vertex: GeoPoint) -> Result<usize, GeofenceError> {
        let point = checked(vertex)?;
        match &mut self.state {
            GeofenceState::Drawing { vertices } => {
                vertices.push(point);
                Ok(vertices.len())
            }
            _ => Err(GeofenceError::NotDrawing),
        }
    }

    /// Close the drawn polygon and activate it
    ///
    /// Stays in `Drawing` when there are too few distinct vertices.
    pub fn finish_polygon(&mut self) -> Result<(), GeofenceError> {
        let GeofenceState::Drawing { vertices } = &self.state else {
            return Err(GeofenceError::NotDrawing);
        };
        let ring = polygon_ring(vertices)?;
        self.state = GeofenceState::PolygonActive(Geofence::Polygon(ring));
        Ok(())
    }

    /// Draw and activate a polygon in one step
    pub fn set_polygon(&mut self, vertices: &[GeoPoint]) -> Result<(), GeofenceError> {
        for v in vertices {
            checked(*v)?;
        }
        let ring = polygon_ring(vertices)?;
        self.state = GeofenceState::PolygonActive(Geofence::Polygon(ring));
        Ok(())
    }

    /// Wait for a ring center; drops whatever region was active
    pub fn arm_rings(&mut self) {
        self.state = GeofenceState::RingArmed;
    }

    /// Place armed rings at `center`
    pub fn place_rings(&mut self, center: GeoPoint) -> Result<(), GeofenceError> {
        if self.state != GeofenceState::RingArmed {
            return Err(GeofenceError::NotArmed);
        }
        self.set_rings(center)
    }

    /// Arm and place rings in one step
    pub fn set_rings(&mut self, center: GeoPoint) -> Result<(), GeofenceError> {
        let center = checked(center)?;
        self.state = GeofenceState::RingActive(Geofence::Rings {
            center,
            radii_m: self.ring_radii_m.clone(),
        });
        Ok(())
    }

    pub fn clear(&mut self) {
        self.state = GeofenceState::Idle;
    }
}

fn checked(point: GeoPoint) -> Result<GeoPoint, GeofenceError> {
    if point.is_valid() {
        Ok(point)
    } else {
        Err(GeofenceError::InvalidPoint {
            lon: point.lon,
            lat: point.lat,
        })
    }
}

/// Vertices with consecutive duplicates and an explicit closing vertex removed
fn polygon_ring(vertices: &[GeoPoint]) -> Result<Vec<GeoPoint>, GeofenceError> {
    let mut ring: Vec<GeoPoint> = Vec::with_capacity(vertices.len());
    for v in vertices {
        if ring.last() != Some(v) {
            ring.push(*v);
        }
    }
    if ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }

    let mut distinct = ring.clone();
    distinct.sort_by(|a, b| a.lon.total_cmp(&b.lon).then(a.lat.total_cmp(&b.lat)));
    distinct.dedup();
    if distinct.len() < MIN_POLYGON_VERTICES {
        return Err(GeofenceError::TooFewVertices(distinct.len()));
    }
    Ok(ring)
}
