//! Geographic primitives for grid searches.

use serde::{Deserialize, Serialize};

pub const MAX_LATITUDE: f64 = 90.0;
pub const MAX_LONGITUDE: f64 = 180.0;

/// Axis-aligned search area in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl BoundingBox {
    /// `true` when both axes are ordered (`min <= max`) and every edge is a
    /// real coordinate: latitude in `[-90, 90]`, longitude in `[-180, 180]`.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        let lat_ok = |v: f64| (-MAX_LATITUDE..=MAX_LATITUDE).contains(&v);
        let lng_ok = |v: f64| (-MAX_LONGITUDE..=MAX_LONGITUDE).contains(&v);
        lat_ok(self.min_lat)
            && lat_ok(self.max_lat)
            && lng_ok(self.min_lng)
            && lng_ok(self.max_lng)
            && self.min_lat <= self.max_lat
            && self.min_lng <= self.max_lng
    }

    #[must_use]
    pub fn contains(&self, point: GridPoint) -> bool {
        (self.min_lat..=self.max_lat).contains(&point.lat)
            && (self.min_lng..=self.max_lng).contains(&point.lng)
    }

    /// Midpoint of the box; used when a caller supplies no explicit center.
    #[must_use]
    pub fn center(&self) -> GridPoint {
        GridPoint {
            lat: (self.min_lat + self.max_lat) / 2.0,
            lng: (self.min_lng + self.max_lng) / 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GridPoint {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        (-MAX_LATITUDE..=MAX_LATITUDE).contains(&self.lat)
            && (-MAX_LONGITUDE..=MAX_LONGITUDE).contains(&self.lng)
    }
}
