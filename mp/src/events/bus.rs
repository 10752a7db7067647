//! Event Bus - pub/sub for planner activity
//!
//! Uses a tokio broadcast channel. The pipeline emits through an
//! [`EventEmitter`] bound to one run; consumers (the JSONL logger, tests)
//! subscribe to the bus.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::debug;

use super::types::PlannerEvent;

/// Default channel capacity (events)
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1_024;

/// Central event bus for planner activity
pub struct EventBus {
    tx: broadcast::Sender<PlannerEvent>,
}

impl EventBus {
    /// Create a new event bus with the given capacity
    pub fn new(capacity: usize) -> Self {
        debug!(capacity, "EventBus::new: creating event bus");
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Create a new event bus with default capacity
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Emit an event to all subscribers
    ///
    /// Fire-and-forget: with no subscribers the event is dropped.
    pub fn emit(&self, event: PlannerEvent) {
        debug!(event_type = event.event_type(), run_id = event.run_id(), "EventBus::emit");
        let _ = self.tx.send(event);
    }

    /// Subscribe to events emitted after this call
    pub fn subscribe(&self) -> broadcast::Receiver<PlannerEvent> {
        debug!("EventBus::subscribe: new subscriber");
        self.tx.subscribe()
    }

    /// Create an emitter bound to one run
    pub fn emitter_for(&self, run_id: impl Into<String>) -> EventEmitter {
        let run_id = run_id.into();
        debug!(%run_id, "EventBus::emitter_for: creating emitter");
        EventEmitter {
            tx: self.tx.clone(),
            run_id,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

/// Handle for emitting events with a pre-set run ID
#[derive(Clone)]
pub struct EventEmitter {
    tx: broadcast::Sender<PlannerEvent>,
    run_id: String,
}

impl EventEmitter {
    /// An emitter whose events go nowhere
    pub fn disconnected(run_id: impl Into<String>) -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            run_id: run_id.into(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Emit a raw event
    pub fn emit(&self, event: PlannerEvent) {
        debug!(event_type = event.event_type(), "EventEmitter::emit");
        let _ = self.tx.send(event);
    }

    // === Convenience methods ===

    pub fn run_started(&self, objective: &str) {
        self.emit(PlannerEvent::RunStarted {
            run_id: self.run_id.clone(),
            objective: objective.to_string(),
        });
    }

    pub fn phase_started(&self, phase_index: usize, phase_name: &str, total_phases: usize) {
        self.emit(PlannerEvent::PhaseStarted {
            run_id: self.run_id.clone(),
            phase_index,
            phase_name: phase_name.to_string(),
            total_phases,
        });
    }

    pub fn run_completed(&self, plan_id: &str, waypoints: usize) {
        self.emit(PlannerEvent::RunCompleted {
            run_id: self.run_id.clone(),
            plan_id: plan_id.to_string(),
            waypoints,
        });
    }

    pub fn run_failed(&self, phase: &str, message: &str) {
        self.emit(PlannerEvent::RunFailed {
            run_id: self.run_id.clone(),
            phase: phase.to_string(),
            message: message.to_string(),
        });
    }

    pub fn run_cancelled(&self) {
        self.emit(PlannerEvent::RunCancelled {
            run_id: self.run_id.clone(),
        });
    }

    pub fn llm_call_started(&self, phase: &str, model: &str, prompt_chars: usize) {
        self.emit(PlannerEvent::LlmCallStarted {
            run_id: self.run_id.clone(),
            phase: phase.to_string(),
            model: model.to_string(),
            prompt_chars,
        });
    }

    pub fn llm_call_finished(
        &self,
        phase: &str,
        content_chars: usize,
        reasoning_chars: usize,
        finish_reason: Option<&str>,
    ) {
        self.emit(PlannerEvent::LlmCallFinished {
            run_id: self.run_id.clone(),
            phase: phase.to_string(),
            content_chars,
            reasoning_chars,
            finish_reason: finish_reason.map(str::to_string),
        });
    }

    pub fn retry_scheduled(&self, phase: &str, attempt: u32, delay_ms: u64, error: &str) {
        self.emit(PlannerEvent::RetryScheduled {
            run_id: self.run_id.clone(),
            phase: phase.to_string(),
            attempt,
            delay_ms,
            error: error.to_string(),
        });
    }

    pub fn location_resolved(&self, name: &str, resolved: bool) {
        self.emit(PlannerEvent::LocationResolved {
            run_id: self.run_id.clone(),
            name: name.to_string(),
            resolved,
        });
    }
}

/// Create an event bus wrapped in an Arc for shared ownership
pub fn create_event_bus() -> Arc<EventBus> {
    Arc::new(EventBus::with_default_capacity())
}
