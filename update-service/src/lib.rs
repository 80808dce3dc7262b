pub mod orchestrator;
pub mod status;
pub mod store;

pub use orchestrator::{run_scheduler, UpdateOrchestrator};
pub use status::{ProgressCounters, RefreshStatus, RunOutcome, RunState, TriggerOutcome};
pub use store::SnapshotStore;
