//! Failures inside a pipeline phase

use thiserror::Error;

use super::sequencer::ChunkSinkError;
use super::state::InvalidTransition;
use crate::extract::ExtractError;
use crate::llm::LlmError;
use crate::retry::{Classify, FailureClass};

#[derive(Debug, Error)]
pub enum PhaseError {
    #[error("Invalid mission request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("LLM stream ended without a finish signal")]
    Unfinished,

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error("invalid plan: {0}")]
    InvalidPlan(String),

    #[error(transparent)]
    Sink(#[from] ChunkSinkError),

    #[error(transparent)]
    State(#[from] InvalidTransition),
}

impl PhaseError {
    /// The run can no longer write to its stream
    pub fn is_stream_closed(&self) -> bool {
        matches!(self, PhaseError::Sink(_))
    }
}

impl Classify for PhaseError {
    fn failure_class(&self) -> FailureClass {
        match self {
            PhaseError::Extract(_) | PhaseError::InvalidPlan(_) => FailureClass::Parse,
            PhaseError::Llm(e) if e.is_fatal() => FailureClass::Fatal,
            PhaseError::Llm(_) | PhaseError::Unfinished => FailureClass::Other,
            PhaseError::InvalidRequest(_) | PhaseError::Sink(_) | PhaseError::State(_) => FailureClass::Fatal,
        }
    }
}
