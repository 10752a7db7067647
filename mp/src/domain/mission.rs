//! Mission request, waypoint and plan types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::geo::Coordinate;
use super::geocoded::NamedLocation;
use super::structure::StructureAnalysis;

/// Mission priority
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            other => Err(format!("unknown priority '{other}' (expected low, medium or high)")),
        }
    }
}

/// Natural-language mission objective
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionObjective {
    pub description: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<Vec<String>>,
}

impl MissionObjective {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            priority: Priority::default(),
            constraints: None,
        }
    }

    /// Constraints joined for prompting, if any are present
    pub fn constraints_line(&self) -> Option<String> {
        self.constraints
            .as_ref()
            .filter(|c| !c.is_empty())
            .map(|c| c.join(", "))
    }
}

/// Drone specifications
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DroneCapabilities {
    /// Maximum altitude in meters
    pub max_altitude: f64,
    /// Maximum speed in m/s
    pub max_speed: f64,
    /// Maximum flight time in minutes
    pub flight_time: f64,
    pub has_camera: bool,
    pub has_gimbal: bool,
    /// Payload capacity in kg
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_capacity: Option<f64>,
}

impl Default for DroneCapabilities {
    fn default() -> Self {
        Self {
            max_altitude: 120.0,
            max_speed: 15.0,
            flight_time: 30.0,
            has_camera: true,
            has_gimbal: true,
            payload_capacity: None,
        }
    }
}

/// Environmental conditions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConditions {
    /// Wind speed in m/s
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wind_speed: Option<f64>,
    /// Wind direction in degrees (0-360)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wind_direction: Option<f64>,
    /// Temperature in Celsius
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Visibility in meters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_fly_zones: Option<Vec<serde_json::Value>>,
}

/// A request to plan one mission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionPlanRequest {
    pub objective: MissionObjective,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_position: Option<Coordinate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area_of_interest: Option<Vec<Coordinate>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drone_capabilities: Option<DroneCapabilities>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<EnvironmentConditions>,
    /// Waypoints the detailed plan should build on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub existing_waypoints: Option<Vec<Waypoint>>,
    /// LLM model override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default)]
    pub include_reasoning: bool,
}

impl MissionPlanRequest {
    pub fn new(objective: MissionObjective) -> Self {
        Self {
            objective,
            start_position: None,
            area_of_interest: None,
            drone_capabilities: None,
            environment: None,
            existing_waypoints: None,
            model: None,
            include_reasoning: false,
        }
    }

    /// Check value ranges that serde cannot express
    pub fn validate(&self) -> Result<(), String> {
        if self.objective.description.trim().is_empty() {
            return Err("objective description must not be empty".to_string());
        }
        if let Some(start) = &self.start_position {
            start.validate().map_err(|e| format!("start_position: {e}"))?;
        }
        for (i, point) in self.area_of_interest.iter().flatten().enumerate() {
            point.validate().map_err(|e| format!("area_of_interest[{i}]: {e}"))?;
        }
        if let Some(env) = &self.environment
            && let Some(direction) = env.wind_direction
            && !(0.0..=360.0).contains(&direction)
        {
            return Err(format!("wind_direction {direction} must be within [0, 360]"));
        }
        Ok(())
    }
}

/// Waypoint action type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaypointType {
    #[default]
    Waypoint,
    Takeoff,
    Land,
    Loiter,
    Survey,
    Orbit,
}

impl WaypointType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WaypointType::Waypoint => "waypoint",
            WaypointType::Takeoff => "takeoff",
            WaypointType::Land => "land",
            WaypointType::Loiter => "loiter",
            WaypointType::Survey => "survey",
            WaypointType::Orbit => "orbit",
        }
    }
}

/// One navigational instruction in a mission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: WaypointType,
    pub position: Coordinate,
    /// Sequence position; authoritative over container order
    pub order: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Target speed in m/s
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    /// Time to loiter in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loiter_time: Option<f64>,
    /// Radius for orbit/loiter in meters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera_action: Option<String>,
}

impl Waypoint {
    /// Human label: the name if set, otherwise the type
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(self.kind.as_str())
    }
}

/// Traceability data attached to a finished plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanMetadata {
    pub objective: MissionObjective,
    /// Model identifier used for planning
    pub generated_by: String,
    #[serde(default)]
    pub warnings: Vec<String>,
    pub structure_analysis: StructureAnalysis,
    /// Only the locations that resolved
    #[serde(default)]
    pub geocoded_locations: Vec<NamedLocation>,
    /// Great-circle length of the waypoint path in meters
    pub computed_distance: f64,
}

/// The terminal artifact of a pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionPlan {
    pub id: String,
    pub name: String,
    pub description: String,
    pub waypoints: Vec<Waypoint>,
    /// Estimated duration in minutes
    pub estimated_duration: f64,
    /// Total distance in meters
    pub total_distance: f64,
    pub created_at: DateTime<Utc>,
    pub metadata: PlanMetadata,
}

impl MissionPlan {
    /// Waypoints sorted by their `order` field
    pub fn ordered_waypoints(&self) -> Vec<&Waypoint> {
        let mut waypoints: Vec<&Waypoint> = self.waypoints.iter().collect();
        waypoints.sort_by_key(|w| w.order);
        waypoints
    }
}

/// Non-streamed response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionPlanResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<MissionPlan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warnings: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MissionPlanResponse {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            plan: None,
            reasoning: None,
            warnings: None,
            error: Some(error.into()),
        }
    }
}
