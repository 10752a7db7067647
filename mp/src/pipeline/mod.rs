//! Streaming mission generation
//!
//! [`MissionPlanner`] turns a [`crate::domain::MissionPlanRequest`] into an
//! ordered stream of [`StreamingChunk`]s ending in exactly one final chunk:
//! a `plan` chunk on success, an `error` chunk otherwise.

mod chunk;
mod error;
mod plan;
mod planner;
pub mod prompts;
mod sequencer;
mod state;

pub use chunk::{ChunkType, StreamingChunk};
pub use error::PhaseError;
pub use plan::{DecodedPlan, RawPlan, RawWaypoint};
pub use planner::{CHUNK_CHANNEL_CAPACITY, MissionPlanner, PlanStream};
pub use sequencer::{ChunkSink, ChunkSinkError, Sequencer};
pub use state::{InvalidTransition, PipelineState};
