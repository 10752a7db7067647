//! Event types for pipeline activity streaming
//!
//! These events describe what a planning run is doing:
//! - Run lifecycle (start, phase transitions, terminal outcome)
//! - LLM interactions (call start/finish, scheduled retries)
//! - Geocoding results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Core event enum - the vocabulary of planner activity
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PlannerEvent {
    // === Run Lifecycle ===
    /// A planning run has started
    RunStarted { run_id: String, objective: String },
    /// A pipeline phase has started
    PhaseStarted {
        run_id: String,
        phase_index: usize,
        phase_name: String,
        total_phases: usize,
    },
    /// The run produced a plan
    RunCompleted {
        run_id: String,
        plan_id: String,
        waypoints: usize,
    },
    /// The run ended with an error chunk
    RunFailed {
        run_id: String,
        phase: String,
        message: String,
    },
    /// The consumer cancelled the run
    RunCancelled { run_id: String },

    // === LLM Interactions ===
    /// An LLM call attempt has been sent
    LlmCallStarted {
        run_id: String,
        phase: String,
        model: String,
        prompt_chars: usize,
    },
    /// An LLM call attempt returned a finished stream
    LlmCallFinished {
        run_id: String,
        phase: String,
        content_chars: usize,
        reasoning_chars: usize,
        finish_reason: Option<String>,
    },
    /// A failed attempt will be retried after a delay
    RetryScheduled {
        run_id: String,
        phase: String,
        attempt: u32,
        delay_ms: u64,
        error: String,
    },

    // === Geocoding ===
    /// A location lookup finished
    LocationResolved {
        run_id: String,
        name: String,
        resolved: bool,
    },
}

impl PlannerEvent {
    /// Get the run ID for this event
    pub fn run_id(&self) -> &str {
        match self {
            PlannerEvent::RunStarted { run_id, .. }
            | PlannerEvent::PhaseStarted { run_id, .. }
            | PlannerEvent::RunCompleted { run_id, .. }
            | PlannerEvent::RunFailed { run_id, .. }
            | PlannerEvent::RunCancelled { run_id }
            | PlannerEvent::LlmCallStarted { run_id, .. }
            | PlannerEvent::LlmCallFinished { run_id, .. }
            | PlannerEvent::RetryScheduled { run_id, .. }
            | PlannerEvent::LocationResolved { run_id, .. } => run_id,
        }
    }

    /// Get the event type name
    pub fn event_type(&self) -> &'static str {
        match self {
            PlannerEvent::RunStarted { .. } => "RunStarted",
            PlannerEvent::PhaseStarted { .. } => "PhaseStarted",
            PlannerEvent::RunCompleted { .. } => "RunCompleted",
            PlannerEvent::RunFailed { .. } => "RunFailed",
            PlannerEvent::RunCancelled { .. } => "RunCancelled",
            PlannerEvent::LlmCallStarted { .. } => "LlmCallStarted",
            PlannerEvent::LlmCallFinished { .. } => "LlmCallFinished",
            PlannerEvent::RetryScheduled { .. } => "RetryScheduled",
            PlannerEvent::LocationResolved { .. } => "LocationResolved",
        }
    }

    /// True for the events that end a run
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PlannerEvent::RunCompleted { .. } | PlannerEvent::RunFailed { .. } | PlannerEvent::RunCancelled { .. }
        )
    }
}

/// A timestamped event log entry for file persistence
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventLogEntry {
    #[serde(rename = "ts")]
    pub timestamp: DateTime<Utc>,
    pub event: PlannerEvent,
}

impl EventLogEntry {
    /// Create a new log entry with current timestamp
    pub fn new(event: PlannerEvent) -> Self {
        Self {
            timestamp: Utc::now(),
            event,
        }
    }
}
