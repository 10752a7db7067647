//! Integration tests for the planning pipeline
//!
//! These drive full runs through the public API with stub LLM and geocoder
//! implementations.

mod common;

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use missionplanner::domain::{Coordinate, MissionObjective, MissionPlan, MissionPlanRequest};
use missionplanner::events::{PlannerEvent, create_event_bus, read_run_events, spawn_event_logger};
use missionplanner::pipeline::{ChunkType, MissionPlanner, StreamingChunk};
use tempfile::TempDir;

use common::{PLAN_JSON, PLAN_WITHOUT_WAYPOINTS, STRUCTURE_JSON, ScriptedLlm, TableGeocoder, fast_retry};

fn field_request() -> MissionPlanRequest {
    let mut request = MissionPlanRequest::new(MissionObjective::new("Survey a 1km field north of a given point"));
    request.start_position = Some(Coordinate::with_alt(37.7749, -122.4194, 0.0));
    request
}

fn planner(llm: Arc<ScriptedLlm>, geocoder: Arc<TableGeocoder>) -> MissionPlanner {
    MissionPlanner::new(llm, geocoder).with_retry_policies(fast_retry(), fast_retry())
}

fn final_plan(chunks: &[StreamingChunk]) -> MissionPlan {
    let last = chunks.last().expect("run produced no chunks");
    assert_eq!(last.chunk_type, ChunkType::Plan);
    serde_json::from_value(last.data.as_ref().expect("plan chunk without data")["plan"].clone())
        .expect("plan chunk does not hold a MissionPlan")
}

// =============================================================================
// Sequencing
// =============================================================================

#[tokio::test]
async fn test_sequence_numbers_are_contiguous_with_one_final_chunk() {
    let llm = Arc::new(ScriptedLlm::new(&[STRUCTURE_JSON, PLAN_JSON]));
    let geocoder = Arc::new(TableGeocoder::everywhere(37.78, -122.42));
    let chunks = planner(llm, geocoder).generate(field_request()).collect_all().await;

    let sequences: Vec<u64> = chunks.iter().map(|c| c.sequence).collect();
    let expected: Vec<u64> = (0..chunks.len() as u64).collect();
    assert_eq!(sequences, expected);

    let finals: Vec<usize> = chunks
        .iter()
        .enumerate()
        .filter(|(_, c)| c.is_final)
        .map(|(i, _)| i)
        .collect();
    assert_eq!(finals, vec![chunks.len() - 1]);
}

#[tokio::test]
async fn test_phase_data_never_runs_ahead_of_summaries() {
    let llm = Arc::new(ScriptedLlm::new(&[STRUCTURE_JSON, PLAN_JSON]));
    let geocoder = Arc::new(TableGeocoder::everywhere(37.78, -122.42));
    let chunks = planner(llm, geocoder).generate(field_request()).collect_all().await;

    let structure_summary = chunks
        .iter()
        .position(|c| {
            c.chunk_type == ChunkType::Status && c.data.as_ref().is_some_and(|d| d.get("structure_data").is_some())
        })
        .expect("no structure summary");
    let geocoding_summary = chunks
        .iter()
        .position(|c| {
            c.chunk_type == ChunkType::Status
                && c.content
                    .as_deref()
                    .is_some_and(|t| t.starts_with("Geocoding complete"))
        })
        .expect("no geocoding summary");

    for (i, chunk) in chunks.iter().enumerate() {
        match chunk.phase() {
            Some(2) => assert!(i > structure_summary, "phase 2 chunk {i} before phase 1 summary"),
            Some(3) => assert!(i > geocoding_summary, "phase 3 chunk {i} before phase 2 summary"),
            _ => {}
        }
    }
}

#[tokio::test]
async fn test_stream_trait_yields_same_chunks() {
    let llm = Arc::new(ScriptedLlm::new(&[STRUCTURE_JSON, PLAN_JSON]));
    let geocoder = Arc::new(TableGeocoder::everywhere(37.78, -122.42));
    let stream = planner(llm, geocoder).generate(field_request());

    let chunks: Vec<StreamingChunk> = stream.collect().await;
    assert!(chunks.last().is_some_and(|c| c.is_final));
}

// =============================================================================
// End to end
// =============================================================================

#[tokio::test]
async fn test_end_to_end_field_survey() {
    let llm = Arc::new(ScriptedLlm::new(&[STRUCTURE_JSON, PLAN_JSON]));
    let geocoder = Arc::new(TableGeocoder::everywhere(37.78, -122.42));
    let chunks = planner(llm.clone(), geocoder.clone())
        .generate(field_request())
        .collect_all()
        .await;

    let count = |phase: u64| {
        chunks
            .iter()
            .filter(|c| c.chunk_type == ChunkType::Status && c.phase() == Some(phase))
            .count()
    };
    let is_waypoint = |c: &StreamingChunk| {
        c.chunk_type == ChunkType::Status && c.data.as_ref().is_some_and(|d| d.get("waypoint").is_some())
    };
    assert!(count(1) >= 1);
    assert!(count(2) >= 1);
    assert_eq!(chunks.iter().filter(|c| is_waypoint(*c)).count(), 3);

    let first_waypoint = chunks.iter().position(is_waypoint);
    let first_geocode_status = chunks.iter().position(|c| c.chunk_type == ChunkType::Status && c.phase() == Some(2));
    assert!(first_geocode_status < first_waypoint);

    let plan = final_plan(&chunks);
    assert_eq!(plan.waypoints.len(), 3);
    assert_eq!(plan.name, "North Field Survey");
    assert_eq!(plan.metadata.generated_by, "stub/model");
    // start position plus three named locations
    assert_eq!(plan.metadata.geocoded_locations.len(), 4);
    assert_eq!(llm.calls(), 2);
    assert_eq!(geocoder.lookups().len(), 3);
}

#[tokio::test]
async fn test_partial_geocoding_still_plans() {
    let llm = Arc::new(ScriptedLlm::new(&[STRUCTURE_JSON, PLAN_JSON]));
    let geocoder = Arc::new(TableGeocoder::new(&[
        ("North Field Gate", 37.780, -122.419),
        ("Irrigation Pond", 37.782, -122.418),
    ]));
    let request = MissionPlanRequest::new(MissionObjective::new("Survey the north field"));
    let chunks = planner(llm, geocoder).generate(request).collect_all().await;

    let plan = final_plan(&chunks);
    let mut names: Vec<&str> = plan
        .metadata
        .geocoded_locations
        .iter()
        .map(|l| l.name.as_str())
        .collect();
    names.sort();
    assert_eq!(names, vec!["Irrigation Pond", "North Field Gate"]);

    let summary = chunks
        .iter()
        .find_map(|c| c.content.as_deref().filter(|t| t.starts_with("Geocoding complete")));
    assert_eq!(summary, Some("Geocoding complete - 2/3 locations processed"));
}

#[tokio::test]
async fn test_generate_simple_returns_plan() {
    let llm = Arc::new(ScriptedLlm::new(&[STRUCTURE_JSON, PLAN_JSON]));
    let geocoder = Arc::new(TableGeocoder::everywhere(37.78, -122.42));
    let response = planner(llm, geocoder).generate_simple(field_request()).await;

    assert!(response.success);
    assert!(response.reasoning.is_none());
    let plan = response.plan.expect("successful response without plan");
    assert_eq!(plan.ordered_waypoints().first().map(|w| w.id.as_str()), Some("wp-1"));
    assert!(plan.metadata.computed_distance > 1000.0);
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn test_missing_waypoints_never_emits_plan() {
    let llm = Arc::new(ScriptedLlm::new(&[STRUCTURE_JSON, PLAN_WITHOUT_WAYPOINTS]));
    let geocoder = Arc::new(TableGeocoder::everywhere(37.78, -122.42));
    let chunks = planner(llm.clone(), geocoder).generate(field_request()).collect_all().await;

    assert!(chunks.iter().all(|c| c.chunk_type != ChunkType::Plan));
    let finals: Vec<&StreamingChunk> = chunks.iter().filter(|c| c.is_final).collect();
    assert_eq!(finals.len(), 1);
    assert_eq!(finals[0].chunk_type, ChunkType::Error);
    assert!(
        finals[0]
            .content
            .as_deref()
            .is_some_and(|t| t.starts_with("Detailed mission planning failed"))
    );
    // one structure call plus the full parse-retry budget
    assert_eq!(llm.calls(), 1 + 6);
}

#[tokio::test]
async fn test_unparseable_structure_fails_first_phase() {
    let llm = Arc::new(ScriptedLlm::new(&["I could not work out a structure for this mission."]));
    let geocoder = Arc::new(TableGeocoder::everywhere(37.78, -122.42));
    let chunks = planner(llm.clone(), geocoder.clone())
        .generate(field_request())
        .collect_all()
        .await;

    let last = chunks.last().expect("no chunks");
    assert_eq!(last.chunk_type, ChunkType::Error);
    assert!(
        last.content
            .as_deref()
            .is_some_and(|t| t.starts_with("Mission structure analysis failed"))
    );
    assert_eq!(llm.calls(), 6);
    assert!(geocoder.lookups().is_empty());
}

// =============================================================================
// Events
// =============================================================================

#[tokio::test]
async fn test_run_events_are_logged_to_jsonl() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let events = create_event_bus();
    let logger = spawn_event_logger(events.clone(), temp_dir.path());

    let llm = Arc::new(ScriptedLlm::new(&[STRUCTURE_JSON, PLAN_JSON]));
    let geocoder = Arc::new(TableGeocoder::everywhere(37.78, -122.42));
    let planner = planner(llm, geocoder).with_events(events.clone());
    let stream = planner.generate(field_request());
    let run_id = stream.run_id().to_string();
    let chunks = stream.collect_all().await;
    assert!(chunks.last().is_some_and(|c| c.chunk_type == ChunkType::Plan));

    drop(planner);
    drop(events);
    tokio::time::timeout(Duration::from_secs(5), logger)
        .await
        .expect("logger did not stop")
        .expect("logger task panicked");

    let entries = read_run_events(temp_dir.path(), &run_id).expect("Failed to read events");
    assert!(matches!(entries.first().map(|e| &e.event), Some(PlannerEvent::RunStarted { .. })));
    assert!(matches!(entries.last().map(|e| &e.event), Some(PlannerEvent::RunCompleted { .. })));
    let phases = entries
        .iter()
        .filter(|e| matches!(e.event, PlannerEvent::PhaseStarted { .. }))
        .count();
    assert_eq!(phases, 3);
}
