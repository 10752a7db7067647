//! Coordinates and great-circle distance

use serde::{Deserialize, Serialize};

/// Mean Earth radius in meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A geographic position with optional altitude in meters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<f64>,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng, alt: None }
    }

    pub fn with_alt(lat: f64, lng: f64, alt: f64) -> Self {
        Self { lat, lng, alt: Some(alt) }
    }

    /// Check latitude, longitude and altitude ranges
    pub fn validate(&self) -> Result<(), String> {
        if !(-90.0..=90.0).contains(&self.lat) {
            return Err(format!("latitude {} outside [-90, 90]", self.lat));
        }
        if !(-180.0..=180.0).contains(&self.lng) {
            return Err(format!("longitude {} outside [-180, 180]", self.lng));
        }
        if let Some(alt) = self.alt
            && !(alt >= 0.0)
        {
            return Err(format!("altitude {alt} must be >= 0"));
        }
        Ok(())
    }

    pub fn lat_lng(&self) -> LatLng {
        LatLng {
            lat: self.lat,
            lng: self.lng,
        }
    }
}

/// A resolved location without altitude
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Haversine distance between two points in meters
///
/// When both points carry an altitude, the altitude difference is combined
/// with the horizontal distance: `sqrt(h^2 + dalt^2)`.
pub fn distance(a: &Coordinate, b: &Coordinate) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlng = (b.lng - a.lng).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    let horizontal = EARTH_RADIUS_M * c;

    match (a.alt, b.alt) {
        (Some(alt_a), Some(alt_b)) => {
            let dalt = alt_b - alt_a;
            (horizontal * horizontal + dalt * dalt).sqrt()
        }
        _ => horizontal,
    }
}

/// Sum of leg distances along `points` in the given order
pub fn path_distance<'a>(points: impl IntoIterator<Item = &'a Coordinate>) -> f64 {
    let mut total = 0.0;
    let mut prev: Option<&Coordinate> = None;
    for point in points {
        if let Some(p) = prev {
            total += distance(p, point);
        }
        prev = Some(point);
    }
    total
}
