//! Phase 2 output: location names mapped to coordinates

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::geo::LatLng;

/// Synthetic key for the caller-supplied start position
pub const START_POSITION_KEY: &str = "start_position";

/// Synthetic key for the n-th (1-based) area-of-interest point
pub fn aoi_point_key(n: usize) -> String {
    format!("aoi_point_{n}")
}

/// A location that resolved to coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedLocation {
    pub name: String,
    pub coordinates: LatLng,
}

/// Insertion-ordered map of location name to an optional coordinate
///
/// `None` marks a lookup that failed. Inserting a name that is already
/// present keeps the first entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeocodedLocations {
    entries: Vec<(String, Option<LatLng>)>,
}

impl GeocodedLocations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `name`, returning false if it was already present
    pub fn insert(&mut self, name: impl Into<String>, coords: Option<LatLng>) -> bool {
        let name = name.into();
        if self.contains(&name) {
            debug!(%name, "insert: duplicate location name, keeping first entry");
            return false;
        }
        self.entries.push((name, coords));
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    pub fn get(&self, name: &str) -> Option<Option<LatLng>> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, c)| *c)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn successes(&self) -> usize {
        self.entries.iter().filter(|(_, c)| c.is_some()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<LatLng>)> {
        self.entries.iter().map(|(n, c)| (n.as_str(), *c))
    }

    /// Resolved entries only, in insertion order
    pub fn resolved(&self) -> Vec<NamedLocation> {
        self.entries
            .iter()
            .filter_map(|(name, coords)| {
                coords.map(|coordinates| NamedLocation {
                    name: name.clone(),
                    coordinates,
                })
            })
            .collect()
    }
}
