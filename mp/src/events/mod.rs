//! Event bus for live observability of planning runs
//!
//! Every pipeline run receives an [`EventEmitter`] bound to its run ID and
//! reports lifecycle, LLM and geocoding activity through it. Consumers
//! subscribe to the [`EventBus`]; the bundled [`EventLogger`] persists each
//! run to a JSONL file.
//!
//! ```text
//!   MissionPlanner run ──emit──▶ EventBus (broadcast) ──▶ EventLogger (.jsonl)
//!                                                    └──▶ other subscribers
//! ```

mod bus;
mod logger;
mod types;

pub use bus::{DEFAULT_CHANNEL_CAPACITY, EventBus, EventEmitter, create_event_bus};
pub use logger::{EventLogger, read_run_events, spawn_event_logger};
pub use types::{EventLogEntry, PlannerEvent};
