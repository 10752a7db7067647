//! Phase 1 output: the structural reading of a mission objective

use serde::{Deserialize, Serialize};

fn default_mission_type() -> String {
    "custom".to_string()
}

fn default_complexity() -> String {
    "moderate".to_string()
}

fn default_step_type() -> String {
    "waypoint".to_string()
}

/// A place the mission touches, named well enough to geocode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyLocation {
    pub name: String,
    #[serde(default)]
    pub purpose: String,
    #[serde(default)]
    pub priority: String,
}

/// One recommended step of the flight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaypointStep {
    #[serde(rename = "type", default = "default_step_type")]
    pub kind: String,
    #[serde(default)]
    pub purpose: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_reference: Option<String>,
}

/// Typed result of the structure-analysis LLM call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureAnalysis {
    #[serde(default = "default_mission_type")]
    pub mission_type: String,
    #[serde(default)]
    pub key_locations: Vec<KeyLocation>,
    #[serde(default)]
    pub waypoint_sequence: Vec<WaypointStep>,
    #[serde(default = "default_complexity")]
    pub estimated_complexity: String,
    #[serde(default)]
    pub considerations: Vec<String>,
}

impl StructureAnalysis {
    /// Key location names worth geocoding, in the order the model gave them
    ///
    /// Blank names are skipped.
    pub fn location_names(&self) -> impl Iterator<Item = &str> {
        self.key_locations
            .iter()
            .map(|l| l.name.trim())
            .filter(|name| !name.is_empty())
    }
}
