use chrono::{DateTime, Utc};
use loungewatch_core::RunMetadata;
use serde::Serialize;

/// Whether a refresh run is currently in flight. Terminal outcomes always
/// return the machine to `Idle`; the outcome itself is kept in
/// `RefreshStatus::last_outcome`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Running,
}

/// How the most recent run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Succeeded,
    Failed,
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressCounters {
    pub processed: usize,
    pub total: usize,
}

/// The queryable status record owned by the orchestrator. Mutated only
/// through whole-transition helpers, never field-by-field from outside.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefreshStatus {
    pub state: RunState,
    pub started_at: Option<DateTime<Utc>>,
    pub progress: Option<ProgressCounters>,
    pub last_outcome: Option<RunOutcome>,
    pub last_run: Option<RunMetadata>,
}

impl RefreshStatus {
    pub fn idle() -> Self {
        Self {
            state: RunState::Idle,
            started_at: None,
            progress: None,
            last_outcome: None,
            last_run: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state == RunState::Running
    }
}

/// Result of poking the orchestrator's guarded entry point.
#[derive(Debug, Clone)]
pub enum TriggerOutcome {
    /// The run executed to a terminal state.
    Completed(RunOutcome),
    /// A run was already in flight; carries its status snapshot.
    AlreadyRunning(RefreshStatus),
}
