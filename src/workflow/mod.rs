//! # Workflow Orchestrator

pub mod orchestrator;
pub mod schedule;
pub mod sync;
pub mod types;

pub use orchestrator::{WorkflowOrchestrator, WorkflowSettings, NO_PLATES};
pub use schedule::next_run_after;
pub use sync::{DownstreamSync, NoopSync, SyncReport};
pub use types::{
    PlateResult, WorkflowMode, WorkflowReport, WorkflowRequest, SKIP_NO_NEXT_DAY_ACTION,
    SKIP_RECENTLY_SENT,
};
