//! Typed decoding of the detailed-planning response

use std::collections::HashSet;

use serde::Deserialize;
use tracing::{debug, warn};
use uuid::Uuid;

use super::error::PhaseError;
use crate::domain::{Coordinate, Waypoint, WaypointType};

/// Waypoint as the model writes it
#[derive(Debug, Clone, Deserialize)]
pub struct RawWaypoint {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: WaypointType,
    pub position: Coordinate,
    pub order: u32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub loiter_time: Option<f64>,
    #[serde(default)]
    pub radius: Option<f64>,
    #[serde(default)]
    pub camera_action: Option<String>,
}

/// Plan payload as the model writes it
#[derive(Debug, Clone, Deserialize)]
pub struct RawPlan {
    pub mission_name: String,
    pub mission_description: String,
    pub waypoints: Vec<RawWaypoint>,
    pub estimated_duration: f64,
    pub total_distance: f64,
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// A decoded plan whose waypoints passed validation
#[derive(Debug, Clone)]
pub struct DecodedPlan {
    pub name: String,
    pub description: String,
    pub waypoints: Vec<Waypoint>,
    pub estimated_duration: f64,
    pub total_distance: f64,
    pub warnings: Vec<String>,
}

fn non_negative(field: &str, value: Option<f64>) -> Result<(), String> {
    match value {
        Some(v) if !(v >= 0.0) => Err(format!("{field} must be >= 0, got {v}")),
        _ => Ok(()),
    }
}

impl RawWaypoint {
    /// Validate and convert, generating an id when none was given
    fn into_waypoint(self, index: usize) -> Result<Waypoint, PhaseError> {
        let invalid = |msg: String| PhaseError::InvalidPlan(format!("waypoint {index}: {msg}"));
        self.position.validate().map_err(invalid)?;
        non_negative("speed", self.speed).map_err(invalid)?;
        non_negative("loiter_time", self.loiter_time).map_err(invalid)?;
        non_negative("radius", self.radius).map_err(invalid)?;

        let id = self
            .id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        Ok(Waypoint {
            id,
            kind: self.kind,
            position: self.position,
            order: self.order,
            name: self.name,
            speed: self.speed,
            loiter_time: self.loiter_time,
            radius: self.radius,
            camera_action: self.camera_action,
        })
    }
}

impl RawPlan {
    /// Convert every waypoint, failing on the first invalid one
    ///
    /// A repeated waypoint id is replaced with a fresh one so ids stay unique
    /// within the plan, and the replacement is noted in the plan warnings.
    pub fn decode(self) -> Result<DecodedPlan, PhaseError> {
        debug!(waypoints = self.waypoints.len(), "decode: called");
        if self.waypoints.is_empty() {
            return Err(PhaseError::InvalidPlan("plan contains no waypoints".to_string()));
        }

        let mut warnings = self.warnings;
        let mut seen = HashSet::new();
        let mut waypoints = Vec::with_capacity(self.waypoints.len());
        for (i, raw) in self.waypoints.into_iter().enumerate() {
            let mut waypoint = raw.into_waypoint(i + 1)?;
            if !seen.insert(waypoint.id.clone()) {
                let replacement = Uuid::new_v4().to_string();
                warn!(duplicate = %waypoint.id, %replacement, "decode: duplicate waypoint id replaced");
                warnings.push(format!(
                    "Waypoint {} reused id '{}'; assigned {}",
                    i + 1,
                    waypoint.id,
                    replacement
                ));
                waypoint.id = replacement.clone();
                seen.insert(replacement);
            }
            waypoints.push(waypoint);
        }

        Ok(DecodedPlan {
            name: self.mission_name,
            description: self.mission_description,
            waypoints,
            estimated_duration: self.estimated_duration,
            total_distance: self.total_distance,
            warnings,
        })
    }
}
