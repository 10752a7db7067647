//! MissionPlanner - streaming LLM drone mission planner
//!
//! Turns a natural-language mission objective into a validated flight plan in
//! three phases: an LLM reads the structure of the mission, the named places
//! are geocoded, and a second LLM call lays out the waypoints. Progress is
//! streamed to the caller as ordered chunks.
//!
//! # Modules
//!
//! - [`pipeline`] - Planning runs, chunk sequencing and the phase state machine
//! - [`llm`] - Streaming LLM client trait and OpenRouter implementation
//! - [`geocode`] - Place-name resolution
//! - [`retry`] - Exponential backoff with failure classes
//! - [`extract`] - JSON object extraction from free-form model output
//! - [`domain`] - Mission, waypoint and coordinate types
//! - [`events`] - Run lifecycle events and the JSONL event log
//! - [`chat`] - Conversational planning assistant
//! - [`templates`] - Built-in mission templates
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod chat;
pub mod cli;
pub mod config;
pub mod domain;
pub mod events;
pub mod extract;
pub mod geocode;
pub mod llm;
pub mod pipeline;
pub mod retry;
pub mod templates;

// Re-export commonly used types
pub use chat::{ChatRequest, PlannerChat};
pub use config::{Config, GeocodingConfig, LlmConfig};
pub use domain::{
    Coordinate, DroneCapabilities, EnvironmentConditions, MissionObjective, MissionPlan, MissionPlanRequest,
    MissionPlanResponse, Priority, StructureAnalysis, Waypoint, WaypointType,
};
pub use extract::{ExtractError, extract_as, extract_json_object};
pub use geocode::{GeocodeError, Geocoder, GoogleGeocoder};
pub use llm::{CompletionRequest, CompletionResponse, LlmClient, LlmError, OpenRouterClient, create_client};
pub use pipeline::{ChunkType, MissionPlanner, PhaseError, PipelineState, PlanStream, StreamingChunk};
pub use retry::{Classify, FailureClass, RetryPolicy};
pub use templates::{MissionTemplate, TEMPLATES, find_template};

// Events module re-exports
pub use events::{
    EventBus, EventEmitter, EventLogEntry, EventLogger, PlannerEvent, create_event_bus, read_run_events,
    spawn_event_logger,
};
