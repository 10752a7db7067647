//! Domain types for mission planning
//!
//! Request and plan types, the typed phase results that flow between pipeline
//! phases, and coordinate math.

mod geo;
mod geocoded;
mod mission;
mod structure;

pub use geo::{Coordinate, EARTH_RADIUS_M, LatLng, distance, path_distance};
pub use geocoded::{GeocodedLocations, NamedLocation, START_POSITION_KEY, aoi_point_key};
pub use mission::{
    DroneCapabilities, EnvironmentConditions, MissionObjective, MissionPlan, MissionPlanRequest, MissionPlanResponse,
    PlanMetadata, Priority, Waypoint, WaypointType,
};
pub use structure::{KeyLocation, StructureAnalysis, WaypointStep};
