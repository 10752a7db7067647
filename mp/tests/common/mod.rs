//! Shared stubs for integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use missionplanner::domain::LatLng;
use missionplanner::geocode::Geocoder;
use missionplanner::llm::{CompletionRequest, CompletionResponse, FinishReason, LlmClient, LlmError, StreamChunk};
use missionplanner::retry::RetryPolicy;

pub const STRUCTURE_JSON: &str = r#"{
  "mission_type": "survey",
  "key_locations": [
    {"name": "North Field Gate", "purpose": "entry", "priority": "high"},
    {"name": "Irrigation Pond", "purpose": "survey target", "priority": "medium"},
    {"name": "Old Barn", "purpose": "landing", "priority": "low"}
  ],
  "waypoint_sequence": [
    {"type": "takeoff", "purpose": "launch"},
    {"type": "survey", "purpose": "cover the field", "location_reference": "Irrigation Pond"},
    {"type": "land", "purpose": "recover", "location_reference": "Old Barn"}
  ],
  "estimated_complexity": "simple",
  "considerations": ["Stay clear of the pond edge"]
}"#;

pub const PLAN_JSON: &str = r#"{
  "mission_name": "North Field Survey",
  "mission_description": "Survey the 1km field north of the start point",
  "waypoints": [
    {"id": "wp-1", "type": "takeoff", "position": {"lat": 37.7749, "lng": -122.4194, "alt": 0}, "order": 1},
    {"id": "wp-2", "type": "survey", "position": {"lat": 37.7839, "lng": -122.4194, "alt": 60}, "order": 2, "speed": 8},
    {"id": "wp-3", "type": "land", "position": {"lat": 37.7749, "lng": -122.4194, "alt": 0}, "order": 3}
  ],
  "estimated_duration": 600,
  "total_distance": 2000
}"#;

pub const PLAN_WITHOUT_WAYPOINTS: &str = r#"{
  "mission_name": "North Field Survey",
  "mission_description": "Survey the field",
  "estimated_duration": 600,
  "total_distance": 2000
}"#;

/// Replays fixed replies in order, each streamed as one delta plus a stop
pub struct ScriptedLlm {
    replies: Vec<String>,
    calls: AtomicUsize,
}

impl ScriptedLlm {
    pub fn new(replies: &[&str]) -> Self {
        Self {
            replies: replies.iter().map(|r| r.to_string()).collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn stream(
        &self,
        _request: CompletionRequest,
        chunk_tx: mpsc::Sender<StreamChunk>,
    ) -> Result<CompletionResponse, LlmError> {
        let idx = self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = self
            .replies
            .get(idx)
            .or(self.replies.last())
            .cloned()
            .ok_or_else(|| LlmError::InvalidResponse("no scripted reply".to_string()))?;

        let mut response = CompletionResponse::default();
        for chunk in [
            StreamChunk::ContentDelta(reply),
            StreamChunk::Finished {
                finish_reason: FinishReason::Stop,
            },
        ] {
            response.absorb(&chunk);
            let _ = chunk_tx.send(chunk).await;
        }
        Ok(response)
    }

    fn default_model(&self) -> &str {
        "stub/model"
    }
}

/// Resolves names from a table; anything else is not found
pub struct TableGeocoder {
    table: HashMap<String, LatLng>,
    fallback: Option<LatLng>,
    lookups: Mutex<Vec<String>>,
}

impl TableGeocoder {
    pub fn new(entries: &[(&str, f64, f64)]) -> Self {
        Self {
            table: entries
                .iter()
                .map(|(name, lat, lng)| (name.to_string(), LatLng::new(*lat, *lng)))
                .collect(),
            fallback: None,
            lookups: Mutex::new(Vec::new()),
        }
    }

    /// Resolves every name to the same point
    pub fn everywhere(lat: f64, lng: f64) -> Self {
        Self {
            table: HashMap::new(),
            fallback: Some(LatLng::new(lat, lng)),
            lookups: Mutex::new(Vec::new()),
        }
    }

    pub fn lookups(&self) -> Vec<String> {
        self.lookups.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Geocoder for TableGeocoder {
    async fn resolve(&self, name: &str) -> Option<LatLng> {
        if let Ok(mut lookups) = self.lookups.lock() {
            lookups.push(name.to_string());
        }
        self.table.get(name).copied().or(self.fallback)
    }
}

/// Retry schedule that keeps tests fast
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_retries: 5,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        backoff_factor: 2.0,
    }
}
