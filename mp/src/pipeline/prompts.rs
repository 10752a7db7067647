//! Prompts for the two LLM phases and the planner chat
//!
//! System prompts are compiled in from `.pmt` files; user prompts are built
//! from the request and the earlier phase results.

use serde_json::{Value, json};
use tracing::debug;

use crate::domain::{DroneCapabilities, EnvironmentConditions, GeocodedLocations, MissionPlanRequest, StructureAnalysis};

/// System prompt for the structure-analysis call
pub const STRUCTURE_SYSTEM_PROMPT: &str = include_str!("../../prompts/structure.pmt");

/// System prompt for the detailed-planning call
pub const DETAILED_SYSTEM_PROMPT: &str = include_str!("../../prompts/detailed.pmt");

/// System prompt for planner chat
pub const CHAT_SYSTEM_PROMPT: &str = include_str!("../../prompts/chat.pmt");

/// Schema name sent with the structured-output constraint
pub const PLAN_SCHEMA_NAME: &str = "detailed_mission_plan";

/// Placeholder for a location that could not be resolved
pub const GEOCODING_FAILED: &str = "GEOCODING FAILED - use fallback coordinates";

fn yes_no(flag: bool) -> &'static str {
    if flag { "Yes" } else { "No" }
}

fn push_capabilities(parts: &mut Vec<String>, cap: &DroneCapabilities) {
    parts.push("\n**Drone Capabilities**:".to_string());
    parts.push(format!("  - Max Altitude: {}m", cap.max_altitude));
    parts.push(format!("  - Max Speed: {}m/s", cap.max_speed));
    parts.push(format!("  - Flight Time: {} minutes", cap.flight_time));
    parts.push(format!("  - Camera: {}", yes_no(cap.has_camera)));
    parts.push(format!("  - Gimbal: {}", yes_no(cap.has_gimbal)));
    if let Some(payload) = cap.payload_capacity.filter(|p| *p > 0.0) {
        parts.push(format!("  - Payload Capacity: {payload}kg"));
    }
}

fn push_environment(parts: &mut Vec<String>, env: &EnvironmentConditions) {
    parts.push("\n**Environmental Conditions**:".to_string());
    if let Some(wind_speed) = env.wind_speed {
        parts.push(format!("  - Wind Speed: {wind_speed}m/s"));
    }
    if let Some(wind_direction) = env.wind_direction {
        parts.push(format!("  - Wind Direction: {wind_direction}°"));
    }
    if let Some(temperature) = env.temperature {
        parts.push(format!("  - Temperature: {temperature}°C"));
    }
    if let Some(visibility) = env.visibility {
        parts.push(format!("  - Visibility: {visibility}m"));
    }
    if let Some(zones) = env.no_fly_zones.as_ref().filter(|z| !z.is_empty()) {
        parts.push(format!("  - No-Fly Zones: {} defined", zones.len()));
    }
}

/// User prompt for the structure-analysis call
pub fn build_structure_prompt(request: &MissionPlanRequest) -> String {
    debug!("build_structure_prompt: called");
    let objective = &request.objective;
    let mut parts = vec![
        "Analyze the following drone mission request and identify the structure:".to_string(),
        format!("**Objective**: {}", objective.description),
        format!("**Priority**: {}", objective.priority),
    ];

    if let Some(constraints) = objective.constraints_line() {
        parts.push(format!("**Constraints**: {constraints}"));
    }

    if let Some(start) = &request.start_position {
        parts.push(format!(
            "\n**Start Position**: Lat: {}, Lng: {}, Alt: {}m",
            start.lat,
            start.lng,
            start.alt.unwrap_or(0.0)
        ));
    }

    if let Some(points) = request.area_of_interest.as_ref().filter(|p| !p.is_empty()) {
        parts.push("\n**Area of Interest**:".to_string());
        for (i, point) in points.iter().enumerate() {
            parts.push(format!("  Point {}: Lat: {}, Lng: {}", i + 1, point.lat, point.lng));
        }
    }

    if let Some(cap) = &request.drone_capabilities {
        push_capabilities(&mut parts, cap);
    }
    if let Some(env) = &request.environment {
        push_environment(&mut parts, env);
    }

    parts.push("\nIdentify key locations, waypoint types needed, and mission structure.".to_string());
    parts.join("\n")
}

/// User prompt for the detailed-planning call
pub fn build_detailed_prompt(
    request: &MissionPlanRequest,
    analysis: &StructureAnalysis,
    locations: &GeocodedLocations,
) -> String {
    debug!(locations = locations.len(), "build_detailed_prompt: called");
    let objective = &request.objective;
    let mut parts = vec![
        "Create a detailed drone mission plan based on the following analysis and coordinates:".to_string(),
        format!("\n**Original Objective**: {}", objective.description),
        format!("**Priority**: {}", objective.priority),
    ];

    parts.push("\n**Mission Structure Analysis**:".to_string());
    parts.push(format!("  - Mission Type: {}", analysis.mission_type));
    parts.push(format!("  - Complexity: {}", analysis.estimated_complexity));
    if !analysis.considerations.is_empty() {
        parts.push(format!("  - Considerations: {}", analysis.considerations.join(", ")));
    }

    parts.push("\n**Precise Coordinates for Key Locations**:".to_string());
    for (name, coords) in locations.iter() {
        match coords {
            Some(c) => parts.push(format!("  - {name}: Lat: {:.6}, Lng: {:.6}", c.lat, c.lng)),
            None => parts.push(format!("  - {name}: {GEOCODING_FAILED}")),
        }
    }

    if !analysis.waypoint_sequence.is_empty() {
        parts.push("\n**Recommended Waypoint Sequence**:".to_string());
        for (i, step) in analysis.waypoint_sequence.iter().enumerate() {
            let purpose = if step.purpose.is_empty() { "No description" } else { &step.purpose };
            parts.push(format!("  {}. {}: {}", i + 1, step.kind.to_uppercase(), purpose));
            if let Some(reference) = step.location_reference.as_ref().filter(|r| !r.is_empty()) {
                parts.push(format!("     Location: {reference}"));
            }
        }
    }

    if let Some(existing) = request.existing_waypoints.as_ref().filter(|w| !w.is_empty()) {
        parts.push("\n**Existing Waypoints to Incorporate**:".to_string());
        let mut ordered: Vec<_> = existing.iter().collect();
        ordered.sort_by_key(|w| w.order);
        for wp in ordered {
            let p = &wp.position;
            parts.push(format!(
                "  {}. {} ({}): Lat: {:.6}, Lng: {:.6}, Alt: {}m",
                wp.order,
                wp.label(),
                wp.kind.as_str(),
                p.lat,
                p.lng,
                p.alt.unwrap_or(0.0)
            ));
        }
    }

    if let Some(constraints) = objective.constraints_line() {
        parts.push(format!("\n**Constraints**: {constraints}"));
    }
    if let Some(cap) = &request.drone_capabilities {
        push_capabilities(&mut parts, cap);
    }
    if let Some(env) = &request.environment {
        push_environment(&mut parts, env);
    }

    parts.push("\nUse the precise coordinates provided above to create an optimized mission plan.".to_string());
    parts.push("Ensure waypoints follow logical sequence and maintain safety margins.".to_string());
    parts.push("Calculate realistic timing and distances based on drone capabilities.".to_string());
    parts.join("\n")
}

/// JSON schema for the detailed-planning response
pub fn plan_response_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "mission_name": {"type": "string"},
            "mission_description": {"type": "string"},
            "waypoints": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "id": {"type": "string"},
                        "type": {"type": "string", "enum": ["takeoff", "waypoint", "loiter", "survey", "orbit", "land"]},
                        "position": {
                            "type": "object",
                            "properties": {
                                "lat": {"type": "number"},
                                "lng": {"type": "number"},
                                "alt": {"type": "number"}
                            },
                            "required": ["lat", "lng", "alt"]
                        },
                        "order": {"type": "integer"},
                        "name": {"type": "string"},
                        "speed": {"type": "number"},
                        "loiter_time": {"type": "number"},
                        "radius": {"type": "number"},
                        "camera_action": {"type": "string"}
                    },
                    "required": ["id", "type", "position", "order"]
                }
            },
            "estimated_duration": {"type": "number"},
            "total_distance": {"type": "number"},
            "warnings": {"type": "array", "items": {"type": "string"}}
        },
        "required": ["mission_name", "mission_description", "waypoints", "estimated_duration", "total_distance"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Coordinate, LatLng, MissionObjective, Priority, Waypoint, WaypointType};
    use serde_json::json;

    fn request() -> MissionPlanRequest {
        let mut objective = MissionObjective::new("Inspect the Golden Gate Bridge towers");
        objective.priority = Priority::High;
        objective.constraints = Some(vec!["Stay below 100m".to_string()]);
        let mut request = MissionPlanRequest::new(objective);
        request.start_position = Some(Coordinate::new(37.8, -122.47));
        request.area_of_interest = Some(vec![Coordinate::new(37.81, -122.48)]);
        request.drone_capabilities = Some(DroneCapabilities::default());
        request.environment = Some(EnvironmentConditions {
            wind_speed: Some(6.5),
            no_fly_zones: Some(vec![json!({"name": "SFO"})]),
            ..Default::default()
        });
        request
    }

    #[test]
    fn test_system_prompts_embedded() {
        assert!(STRUCTURE_SYSTEM_PROMPT.contains("key_locations"));
        assert!(DETAILED_SYSTEM_PROMPT.contains("RESPOND WITH ONLY THE JSON"));
        assert!(CHAT_SYSTEM_PROMPT.starts_with("You are an expert drone mission planner assistant."));
    }

    #[test]
    fn test_structure_prompt_sections() {
        let prompt = build_structure_prompt(&request());
        assert!(prompt.contains("**Objective**: Inspect the Golden Gate Bridge towers"));
        assert!(prompt.contains("**Priority**: high"));
        assert!(prompt.contains("**Constraints**: Stay below 100m"));
        assert!(prompt.contains("**Start Position**: Lat: 37.8, Lng: -122.47, Alt: 0m"));
        assert!(prompt.contains("  Point 1: Lat: 37.81, Lng: -122.48"));
        assert!(prompt.contains("  - Camera: Yes"));
        assert!(prompt.contains("  - Wind Speed: 6.5m/s"));
        assert!(prompt.contains("  - No-Fly Zones: 1 defined"));
        assert!(!prompt.contains("Payload"));
    }

    #[test]
    fn test_structure_prompt_minimal() {
        let prompt = build_structure_prompt(&MissionPlanRequest::new(MissionObjective::new("Fly")));
        assert!(!prompt.contains("Constraints"));
        assert!(!prompt.contains("Drone Capabilities"));
        assert!(prompt.ends_with("mission structure."));
    }

    #[test]
    fn test_detailed_prompt_flags_unresolved_locations() {
        let analysis: StructureAnalysis = serde_json::from_value(json!({
            "mission_type": "inspection",
            "waypoint_sequence": [
                {"type": "takeoff", "purpose": "Launch", "location_reference": "Fort Point"},
                {"type": "orbit", "purpose": ""}
            ],
            "considerations": ["Wind", "Traffic"]
        }))
        .unwrap();
        let mut locations = GeocodedLocations::new();
        locations.insert("start_position", Some(LatLng::new(37.8, -122.47)));
        locations.insert("Fort Point", None);

        let prompt = build_detailed_prompt(&request(), &analysis, &locations);
        assert!(prompt.contains("  - Mission Type: inspection"));
        assert!(prompt.contains("  - Complexity: moderate"));
        assert!(prompt.contains("  - Considerations: Wind, Traffic"));
        assert!(prompt.contains("  - start_position: Lat: 37.800000, Lng: -122.470000"));
        assert!(prompt.contains("  - Fort Point: GEOCODING FAILED - use fallback coordinates"));
        assert!(prompt.contains("  1. TAKEOFF: Launch\n     Location: Fort Point"));
        assert!(prompt.contains("  2. ORBIT: No description"));
        assert!(!prompt.contains("Existing Waypoints"));
    }

    #[test]
    fn test_detailed_prompt_lists_existing_waypoints() {
        let mut request = request();
        request.existing_waypoints = Some(vec![
            Waypoint {
                id: "land-1".to_string(),
                kind: WaypointType::Land,
                position: Coordinate::new(37.805, -122.475),
                order: 2,
                name: None,
                speed: None,
                loiter_time: None,
                radius: None,
                camera_action: None,
            },
            Waypoint {
                id: "tower-1".to_string(),
                kind: WaypointType::Orbit,
                position: Coordinate::with_alt(37.8108, -122.4773, 120.0),
                order: 1,
                name: Some("South tower".to_string()),
                speed: Some(4.0),
                loiter_time: None,
                radius: Some(25.0),
                camera_action: None,
            },
        ]);
        let analysis: StructureAnalysis = serde_json::from_value(json!({"mission_type": "inspection"})).unwrap();

        let prompt = build_detailed_prompt(&request, &analysis, &GeocodedLocations::new());
        assert!(prompt.contains(
            "**Existing Waypoints to Incorporate**:\n  1. South tower (orbit): Lat: 37.810800, Lng: -122.477300, Alt: 120m\n  2. land (land): Lat: 37.805000, Lng: -122.475000, Alt: 0m"
        ));
    }

    #[test]
    fn test_plan_schema_requires_waypoints() {
        let schema = plan_response_schema();
        let required = schema["required"].as_array().unwrap();
        assert!(required.contains(&json!("waypoints")));
        assert_eq!(schema["properties"]["waypoints"]["items"]["properties"]["type"]["enum"][0], "takeoff");
    }
}
