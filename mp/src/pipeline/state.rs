//! Forward-only phase state of a planning run

use std::fmt;

use thiserror::Error;

/// Where a run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    StructureAnalysis,
    Geocoding,
    DetailedPlanning,
    Done,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid pipeline transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: PipelineState,
    pub to: PipelineState,
}

impl PipelineState {
    pub const TOTAL_PHASES: usize = 3;

    /// 1-based phase number for the three working states
    pub fn phase_index(&self) -> Option<usize> {
        match self {
            PipelineState::StructureAnalysis => Some(1),
            PipelineState::Geocoding => Some(2),
            PipelineState::DetailedPlanning => Some(3),
            PipelineState::Done | PipelineState::Failed => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PipelineState::StructureAnalysis => "structure_analysis",
            PipelineState::Geocoding => "geocoding",
            PipelineState::DetailedPlanning => "detailed_planning",
            PipelineState::Done => "done",
            PipelineState::Failed => "failed",
        }
    }

    /// Prefix for the error chunk of a run that failed in this state
    pub fn failure_label(&self) -> &'static str {
        match self {
            PipelineState::StructureAnalysis => "Mission structure analysis failed",
            PipelineState::Geocoding => "Location geocoding failed",
            PipelineState::DetailedPlanning => "Detailed mission planning failed",
            PipelineState::Done | PipelineState::Failed => "Mission planning failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed)
    }

    fn successor(&self) -> Option<PipelineState> {
        match self {
            PipelineState::StructureAnalysis => Some(PipelineState::Geocoding),
            PipelineState::Geocoding => Some(PipelineState::DetailedPlanning),
            PipelineState::DetailedPlanning => Some(PipelineState::Done),
            PipelineState::Done | PipelineState::Failed => None,
        }
    }

    /// Move to `next`; only the next phase or `Failed` are reachable
    pub fn advance(&mut self, next: PipelineState) -> Result<(), InvalidTransition> {
        let allowed = match next {
            PipelineState::Failed => !self.is_terminal(),
            _ => self.successor() == Some(next),
        };
        if !allowed {
            return Err(InvalidTransition { from: *self, to: next });
        }
        *self = next;
        Ok(())
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
