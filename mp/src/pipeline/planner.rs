//! The three-phase mission planning pipeline
//!
//! A run goes structure analysis -> geocoding -> detailed planning. Each run
//! executes in its own task and writes to its own [`ChunkSink`]; the caller
//! reads the chunks from the returned [`PlanStream`]. Dropping the stream
//! cancels the run.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use chrono::Utc;
use futures::StreamExt;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::chunk::{ChunkType, StreamingChunk};
use super::error::PhaseError;
use super::plan::{DecodedPlan, RawPlan};
use super::prompts::{
    DETAILED_SYSTEM_PROMPT, PLAN_SCHEMA_NAME, STRUCTURE_SYSTEM_PROMPT, build_detailed_prompt, build_structure_prompt,
    plan_response_schema,
};
use super::sequencer::{ChunkSink, ChunkSinkError};
use super::state::PipelineState;
use crate::config::Config;
use crate::domain::{
    GeocodedLocations, MissionPlan, MissionPlanRequest, MissionPlanResponse, PlanMetadata, START_POSITION_KEY,
    StructureAnalysis, aoi_point_key, path_distance,
};
use crate::events::{EventBus, EventEmitter, create_event_bus};
use crate::extract::extract_as;
use crate::geocode::Geocoder;
use crate::llm::{CompletionRequest, CompletionResponse, LlmClient, ResponseSchema, STREAM_CHANNEL_CAPACITY, StreamChunk};
use crate::retry::RetryPolicy;

/// Chunks buffered between a run and its consumer
pub const CHUNK_CHANNEL_CAPACITY: usize = 64;

const DEFAULT_MAX_CONCURRENT_GEOCODES: usize = 8;
const DEFAULT_MAX_TOKENS: u32 = 4096;

fn phase_data(phase: usize, progress: f64) -> Value {
    json!({
        "phase": phase,
        "total_phases": PipelineState::TOTAL_PHASES,
        "progress": progress,
    })
}

/// Builds and launches planning runs
#[derive(Clone)]
pub struct MissionPlanner {
    llm: Arc<dyn LlmClient>,
    geocoder: Arc<dyn Geocoder>,
    events: Arc<EventBus>,
    structure_retry: RetryPolicy,
    planning_retry: RetryPolicy,
    max_concurrent_geocodes: usize,
    max_tokens: u32,
}

impl MissionPlanner {
    pub fn new(llm: Arc<dyn LlmClient>, geocoder: Arc<dyn Geocoder>) -> Self {
        Self {
            llm,
            geocoder,
            events: create_event_bus(),
            structure_retry: RetryPolicy {
                base_delay: Duration::from_millis(1500),
                ..RetryPolicy::default()
            },
            planning_retry: RetryPolicy::default(),
            max_concurrent_geocodes: DEFAULT_MAX_CONCURRENT_GEOCODES,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    /// Planner with retry schedules and limits taken from configuration
    pub fn from_config(
        config: &Config,
        llm: Arc<dyn LlmClient>,
        geocoder: Arc<dyn Geocoder>,
        events: Arc<EventBus>,
    ) -> Self {
        Self::new(llm, geocoder)
            .with_events(events)
            .with_retry_policies(config.retry.structure.policy(), config.retry.planning.policy())
            .with_max_concurrent_geocodes(config.geocoding.max_concurrent)
            .with_max_tokens(config.llm.max_tokens)
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    pub fn with_retry_policies(mut self, structure: RetryPolicy, planning: RetryPolicy) -> Self {
        self.structure_retry = structure;
        self.planning_retry = planning;
        self
    }

    pub fn with_max_concurrent_geocodes(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent_geocodes = max_concurrent.max(1);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Start a run and return its chunk stream
    ///
    /// Must be called from within a tokio runtime.
    pub fn generate(&self, request: MissionPlanRequest) -> PlanStream {
        let run_id = Uuid::now_v7().to_string();
        debug!(%run_id, objective = %request.objective.description, "generate: called");

        let (tx, rx) = mpsc::channel(CHUNK_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();
        let model = request
            .model
            .clone()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| self.llm.default_model().to_string());

        let run = PlanRun {
            planner: self.clone(),
            request,
            model,
            sink: ChunkSink::new(tx, cancel.clone()),
            events: self.events.emitter_for(run_id.clone()),
            state: PipelineState::StructureAnalysis,
        };
        tokio::spawn(run.execute());

        PlanStream { rx, cancel, run_id }
    }

    /// Drive a run to completion and fold it into a single response
    pub async fn generate_simple(&self, request: MissionPlanRequest) -> MissionPlanResponse {
        debug!("generate_simple: called");
        let include_reasoning = request.include_reasoning;
        let mut stream = self.generate(request);

        let mut reasoning = String::new();
        let mut plan: Option<MissionPlan> = None;
        let mut failure: Option<String> = None;

        while let Some(chunk) = stream.recv().await {
            match chunk.chunk_type {
                ChunkType::Reasoning => reasoning.push_str(chunk.content.as_deref().unwrap_or_default()),
                ChunkType::Plan if chunk.is_final => {
                    let decoded = chunk
                        .data
                        .and_then(|mut data| data.get_mut("plan").map(Value::take))
                        .map(serde_json::from_value::<MissionPlan>);
                    match decoded {
                        Some(Ok(p)) => plan = Some(p),
                        Some(Err(e)) => failure = Some(format!("Failed to decode final plan: {e}")),
                        None => failure = Some("Final plan chunk carried no plan".to_string()),
                    }
                }
                ChunkType::Error if chunk.is_final => failure = chunk.content,
                _ => {}
            }
        }

        match plan {
            Some(plan) => MissionPlanResponse {
                success: true,
                warnings: Some(plan.metadata.warnings.clone()),
                plan: Some(plan),
                reasoning: include_reasoning.then_some(reasoning),
                error: None,
            },
            None => MissionPlanResponse::failure(failure.unwrap_or_else(|| "Failed to generate mission plan".to_string())),
        }
    }
}

/// Consumer side of a run
///
/// Yields chunks in sequence order and ends after the final chunk. Dropping
/// the stream cancels the run.
pub struct PlanStream {
    rx: mpsc::Receiver<StreamingChunk>,
    cancel: CancellationToken,
    run_id: String,
}

impl PlanStream {
    pub async fn recv(&mut self) -> Option<StreamingChunk> {
        self.rx.recv().await
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Stop the run; no chunk is produced after this returns
    pub fn cancel(&self) {
        debug!(run_id = %self.run_id, "cancel: called");
        self.cancel.cancel();
    }

    /// Token that cancels the run when triggered
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Read every remaining chunk
    pub async fn collect_all(mut self) -> Vec<StreamingChunk> {
        let mut chunks = Vec::new();
        while let Some(chunk) = self.recv().await {
            chunks.push(chunk);
        }
        chunks
    }
}

impl futures::Stream for PlanStream {
    type Item = StreamingChunk;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for PlanStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// State owned by one run
struct PlanRun {
    planner: MissionPlanner,
    request: MissionPlanRequest,
    model: String,
    sink: ChunkSink,
    events: EventEmitter,
    state: PipelineState,
}

impl PlanRun {
    fn run_id(&self) -> &str {
        self.events.run_id()
    }

    async fn execute(mut self) {
        let cancel = self.sink.cancellation_token().clone();
        let events = self.events.clone();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!(run_id = %events.run_id(), "execute: run cancelled");
                events.run_cancelled();
            }
            _ = self.drive() => {}
        }
    }

    async fn drive(&mut self) {
        info!(run_id = %self.run_id(), model = %self.model, "drive: run started");
        self.events.run_started(&self.request.objective.description);

        match self.run_phases().await {
            Ok(plan) => {
                info!(run_id = %self.run_id(), plan_id = %plan.id, waypoints = plan.waypoints.len(), "drive: run completed");
                self.events.run_completed(&plan.id, plan.waypoints.len());
            }
            Err(e) if e.is_stream_closed() => {
                info!(run_id = %self.run_id(), reason = %e, "drive: stream closed, stopping run");
                self.events.run_cancelled();
            }
            Err(e) => self.fail(e).await,
        }
    }

    async fn run_phases(&mut self) -> Result<MissionPlan, PhaseError> {
        self.request.validate().map_err(PhaseError::InvalidRequest)?;

        let analysis = self.structure_phase().await?;
        self.state.advance(PipelineState::Geocoding)?;

        let locations = self.geocoding_phase(&analysis).await?;
        self.state.advance(PipelineState::DetailedPlanning)?;

        let plan = self.planning_phase(analysis, &locations).await?;
        self.state.advance(PipelineState::Done)?;
        Ok(plan)
    }

    /// Emit the final error chunk for the current phase
    async fn fail(&mut self, failure: PhaseError) {
        let phase = self.state;
        let message = match &failure {
            PhaseError::InvalidRequest(_) => failure.to_string(),
            _ => format!("{}: {}", phase.failure_label(), failure),
        };
        error!(run_id = %self.run_id(), %phase, %message, "fail: run failed");

        if let Err(e) = self.state.advance(PipelineState::Failed) {
            warn!(error = %e, "fail: state already terminal");
        }
        self.events.run_failed(phase.name(), &message);

        let data = json!({
            "phase": phase.phase_index(),
            "total_phases": PipelineState::TOTAL_PHASES,
        });
        if let Err(e) = self.sink.emit(ChunkType::Error, Some(message), Some(data), true).await {
            debug!(error = %e, "fail: error chunk not delivered");
        }
    }

    fn on_retry(&self, phase: &str, attempt: u32, delay: Duration, e: &PhaseError) {
        self.events
            .retry_scheduled(phase, attempt, delay.as_millis() as u64, &e.to_string());
    }

    /// Forward reasoning deltas as `reasoning` chunks
    async fn forward_delta(&self, delta: StreamChunk, forward_reasoning: bool) -> Result<(), ChunkSinkError> {
        if forward_reasoning
            && let StreamChunk::ReasoningDelta(text) = delta
            && !text.is_empty()
        {
            self.sink.emit(ChunkType::Reasoning, Some(text), None, false).await?;
        }
        Ok(())
    }

    /// One LLM attempt; returns only once the finished signal arrived
    async fn call_llm(
        &self,
        phase: &str,
        request: &CompletionRequest,
        forward_reasoning: bool,
    ) -> Result<CompletionResponse, PhaseError> {
        debug!(%phase, model = %request.model, forward_reasoning, "call_llm: called");
        self.events
            .llm_call_started(phase, &request.model, request.prompt_chars());

        let (chunk_tx, mut chunk_rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        let call = self.planner.llm.stream(request.clone(), chunk_tx);
        tokio::pin!(call);

        let result = loop {
            tokio::select! {
                biased;
                Some(delta) = chunk_rx.recv() => self.forward_delta(delta, forward_reasoning).await?,
                result = &mut call => break result,
            }
        };
        while let Ok(delta) = chunk_rx.try_recv() {
            self.forward_delta(delta, forward_reasoning).await?;
        }

        let response = result?;
        self.events.llm_call_finished(
            phase,
            response.content.len(),
            response.reasoning.len(),
            response.finish_reason.as_ref().map(|f| f.as_str()),
        );
        if !response.is_finished() {
            warn!(%phase, content_len = response.content.len(), "call_llm: stream ended without finish signal");
            return Err(PhaseError::Unfinished);
        }
        debug!(%phase, content_len = response.content.len(), "call_llm: finished");
        Ok(response)
    }

    async fn attempt_structure(&self, request: &CompletionRequest) -> Result<StructureAnalysis, PhaseError> {
        let phase = PipelineState::StructureAnalysis.name();
        let response = self.call_llm(phase, request, false).await?;
        Ok(extract_as::<StructureAnalysis>(&response.content)?)
    }

    async fn attempt_planning(&self, request: &CompletionRequest, forward_reasoning: bool) -> Result<DecodedPlan, PhaseError> {
        let phase = PipelineState::DetailedPlanning.name();
        let response = self.call_llm(phase, request, forward_reasoning).await?;
        let raw = extract_as::<RawPlan>(&response.content)?;
        raw.decode()
    }

    async fn structure_phase(&self) -> Result<StructureAnalysis, PhaseError> {
        let phase = PipelineState::StructureAnalysis.name();
        info!(run_id = %self.run_id(), "structure_phase: started");
        self.events.phase_started(1, phase, PipelineState::TOTAL_PHASES);
        self.sink
            .status(
                "Phase 1/3: Analyzing mission structure and identifying key locations...",
                phase_data(1, 5.0),
            )
            .await?;

        let llm_request = CompletionRequest::from_prompt(&self.model, build_structure_prompt(&self.request))
            .with_system_prompt(STRUCTURE_SYSTEM_PROMPT)
            .with_max_tokens(self.planner.max_tokens);
        let request = &llm_request;
        let analysis = self
            .planner
            .structure_retry
            .run_observed(
                phase,
                |attempt, delay, e| self.on_retry(phase, attempt, delay, e),
                move || self.attempt_structure(request),
            )
            .await?;

        let count = analysis.key_locations.len();
        info!(run_id = %self.run_id(), locations = count, mission_type = %analysis.mission_type, "structure_phase: done");
        let mut data = phase_data(1, 25.0);
        data["structure_data"] = json!(analysis);
        self.sink
            .status(format!("Mission structure analyzed - {count} locations identified"), data)
            .await?;
        Ok(analysis)
    }

    async fn geocoding_phase(&self, analysis: &StructureAnalysis) -> Result<GeocodedLocations, PhaseError> {
        info!(run_id = %self.run_id(), "geocoding_phase: started");
        self.events
            .phase_started(2, PipelineState::Geocoding.name(), PipelineState::TOTAL_PHASES);
        self.sink
            .status("Phase 2/3: Geocoding locations and getting precise coordinates...", phase_data(2, 30.0))
            .await?;

        let mut locations = GeocodedLocations::new();
        if let Some(start) = &self.request.start_position {
            locations.insert(START_POSITION_KEY, Some(start.lat_lng()));
        }
        for (i, point) in self.request.area_of_interest.iter().flatten().enumerate() {
            locations.insert(aoi_point_key(i + 1), Some(point.lat_lng()));
        }

        let mut pending: Vec<String> = Vec::new();
        for name in analysis.location_names() {
            if locations.contains(name) || pending.iter().any(|p| p == name) {
                debug!(%name, "geocoding_phase: duplicate location name, keeping first entry");
                continue;
            }
            pending.push(name.to_string());
        }

        let total = locations.len() + pending.len();
        let mut successes = 0usize;

        for resolved in locations.resolved() {
            successes += 1;
            self.emit_location(&resolved.name, resolved.coordinates, successes, total).await?;
        }

        let geocoder = &self.planner.geocoder;
        let lookups: Vec<_> = pending
            .into_iter()
            .map(|name| async move {
                let coords = geocoder.resolve(&name).await;
                (name, coords)
            })
            .collect();
        let mut lookups = futures::stream::iter(lookups).buffer_unordered(self.planner.max_concurrent_geocodes);

        // Completion order, not discovery order
        while let Some((name, coords)) = lookups.next().await {
            self.events.location_resolved(&name, coords.is_some());
            match coords {
                Some(c) => {
                    debug!(%name, lat = c.lat, lng = c.lng, "geocoding_phase: resolved");
                    successes += 1;
                    self.emit_location(&name, c, successes, total).await?;
                }
                None => warn!(%name, "geocoding_phase: location not resolved"),
            }
            locations.insert(name, coords);
        }

        info!(run_id = %self.run_id(), successes, total, "geocoding_phase: done");
        self.sink
            .status(
                format!("Geocoding complete - {successes}/{total} locations processed"),
                phase_data(2, 55.0),
            )
            .await?;
        Ok(locations)
    }

    async fn emit_location(
        &self,
        name: &str,
        coords: crate::domain::LatLng,
        successes: usize,
        total: usize,
    ) -> Result<u64, ChunkSinkError> {
        let mut data = phase_data(2, 30.0 + 25.0 * successes as f64 / total as f64);
        data["location"] = json!({"name": name, "coordinates": coords});
        self.sink
            .emit(
                ChunkType::LocationGeocoded,
                Some(format!("Geocoded location: {name}")),
                Some(data),
                false,
            )
            .await
    }

    async fn planning_phase(
        &self,
        analysis: StructureAnalysis,
        locations: &GeocodedLocations,
    ) -> Result<MissionPlan, PhaseError> {
        let phase = PipelineState::DetailedPlanning.name();
        info!(run_id = %self.run_id(), "planning_phase: started");
        self.events.phase_started(3, phase, PipelineState::TOTAL_PHASES);
        self.sink
            .status(
                "Phase 3/3: Creating detailed mission plan with optimized waypoints...",
                phase_data(3, 60.0),
            )
            .await?;

        // Reasoning and structured output are mutually exclusive upstream
        let include_reasoning = self.request.include_reasoning;
        let mut llm_request =
            CompletionRequest::from_prompt(&self.model, build_detailed_prompt(&self.request, &analysis, locations))
                .with_system_prompt(DETAILED_SYSTEM_PROMPT)
                .with_reasoning(include_reasoning)
                .with_max_tokens(self.planner.max_tokens);
        if !include_reasoning {
            llm_request = llm_request.with_schema(ResponseSchema::new(PLAN_SCHEMA_NAME, plan_response_schema()));
        }

        let request = &llm_request;
        let decoded = self
            .planner
            .planning_retry
            .run_observed(
                phase,
                |attempt, delay, e| self.on_retry(phase, attempt, delay, e),
                move || self.attempt_planning(request, include_reasoning),
            )
            .await?;

        let total = decoded.waypoints.len();
        for (i, waypoint) in decoded.waypoints.iter().enumerate() {
            let n = i + 1;
            let mut data = phase_data(3, 70.0 + 20.0 * n as f64 / total as f64);
            data["waypoint"] = json!(waypoint);
            self.sink
                .status(format!("Generated waypoint {n}/{total}: {}", waypoint.label()), data)
                .await?;
        }

        let mut ordered: Vec<_> = decoded.waypoints.iter().collect();
        ordered.sort_by_key(|w| w.order);
        let computed_distance = path_distance(ordered.iter().map(|w| &w.position));

        let plan = MissionPlan {
            id: Uuid::new_v4().to_string(),
            name: decoded.name,
            description: decoded.description,
            waypoints: decoded.waypoints,
            estimated_duration: decoded.estimated_duration,
            total_distance: decoded.total_distance,
            created_at: Utc::now(),
            metadata: PlanMetadata {
                objective: self.request.objective.clone(),
                generated_by: self.model.clone(),
                warnings: decoded.warnings,
                structure_analysis: analysis,
                geocoded_locations: locations.resolved(),
                computed_distance,
            },
        };

        info!(
            run_id = %self.run_id(),
            plan_id = %plan.id,
            waypoints = total,
            duration = plan.estimated_duration,
            distance = plan.total_distance,
            "planning_phase: plan assembled"
        );
        let mut data = phase_data(3, 95.0);
        data["plan_summary"] = json!({
            "name": plan.name,
            "waypoints": total,
            "duration": plan.estimated_duration,
            "distance": plan.total_distance,
        });
        self.sink.status("Mission plan generation complete!", data).await?;

        self.sink
            .emit(
                ChunkType::Plan,
                Some(plan.name.clone()),
                Some(json!({"progress": 100.0, "plan": plan})),
                true,
            )
            .await?;
        Ok(plan)
    }
}
