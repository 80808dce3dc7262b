use crate::status::{ProgressCounters, RefreshStatus, RunOutcome, RunState, TriggerOutcome};
use crate::store::SnapshotStore;
use chrono::{DateTime, Utc};
use collector::{CollectionOutcome, CollectionPipeline};
use loungewatch_core::RunMetadata;
use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

/// Runs the collection pipeline end-to-end with single-flight guarding, a
/// hard timeout, atomic backup/restore of the snapshot file and a metadata
/// record per run.
///
/// States: Idle -> Running -> {Succeeded, Failed, TimedOut}, always
/// returning to Idle. Scheduled and on-demand triggers funnel through the
/// same guarded entry point; the Idle-to-Running transition under the
/// status lock is the single-flight gate, so a rejected trigger can never
/// observe a stale Idle state.
pub struct UpdateOrchestrator {
    pipeline: Arc<dyn CollectionPipeline>,
    store: SnapshotStore,
    run_timeout: Duration,
    status: RwLock<RefreshStatus>,
}

impl UpdateOrchestrator {
    pub fn new(
        pipeline: Arc<dyn CollectionPipeline>,
        store: SnapshotStore,
        run_timeout: Duration,
    ) -> Self {
        Self {
            pipeline,
            store,
            run_timeout,
            status: RwLock::new(RefreshStatus::idle()),
        }
    }

    /// Current status, with live progress counters while a run is in
    /// flight. Always answerable, mid-run included.
    pub fn status(&self) -> RefreshStatus {
        let mut status = self
            .status
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        if status.is_running() {
            let (processed, total) = self.pipeline.progress();
            status.progress = Some(ProgressCounters { processed, total });
        }
        status
    }

    /// Guarded entry point shared by the scheduler and on-demand triggers.
    /// If a run is already in flight the trigger is rejected with the
    /// current status instead of queueing.
    pub async fn run_once(&self) -> TriggerOutcome {
        let started_at = Utc::now();
        if !self.try_begin_run(started_at) {
            let status = self.status();
            info!("Update already in progress; rejecting trigger");
            return TriggerOutcome::AlreadyRunning(status);
        }
        info!("Starting Reddit data scrape...");

        let backup = match self.store.create_backup().await {
            Ok(backup) => backup,
            Err(e) => {
                let message = format!("failed to back up existing snapshot: {e}");
                error!("{}", message);
                let outcome = self
                    .finalize_failure(started_at, message, None, RunOutcome::Failed)
                    .await;
                return TriggerOutcome::Completed(outcome);
            }
        };

        let outcome = match tokio::time::timeout(self.run_timeout, self.pipeline.collect_latest())
            .await
        {
            Err(_elapsed) => {
                // Dropping the timed-out future cancels the in-flight work
                let message = format!(
                    "Scraper timed out after {} seconds",
                    self.run_timeout.as_secs()
                );
                error!("{}", message);
                self.finalize_failure(started_at, message, backup.as_deref(), RunOutcome::TimedOut)
                    .await
            }
            Ok(Err(e)) => {
                let message = format!("Scrape failed: {e}");
                error!("{}", message);
                self.finalize_failure(started_at, message, backup.as_deref(), RunOutcome::Failed)
                    .await
            }
            Ok(Ok(collection)) if collection.kept.is_empty() => {
                let message = "Scrape produced an empty corpus".to_string();
                error!("{}", message);
                self.finalize_failure(started_at, message, backup.as_deref(), RunOutcome::Failed)
                    .await
            }
            Ok(Ok(collection)) => self.finalize_success(started_at, collection, backup.as_deref()).await,
        };

        TriggerOutcome::Completed(outcome)
    }

    async fn finalize_success(
        &self,
        started_at: DateTime<Utc>,
        collection: CollectionOutcome,
        backup: Option<&Path>,
    ) -> RunOutcome {
        match self.store.write_snapshot(&collection.kept).await {
            Ok(size) => {
                if let Some(backup) = backup {
                    self.store.discard_backup(backup).await;
                }
                let ended_at = Utc::now();
                let metadata = self.build_metadata(
                    started_at,
                    ended_at,
                    true,
                    None,
                    size,
                    collection.kept.len(),
                    collection.kept.iter().filter(|c| c.has_tickers()).count(),
                );
                self.persist_metadata(&metadata).await;
                info!(
                    "Scrape completed successfully in {:.1}s ({} comments, {} with tickers)",
                    metadata.scrape_duration_seconds,
                    metadata.total_comments,
                    metadata.comments_with_tickers
                );
                self.transition_to_idle(RunOutcome::Succeeded, metadata);
                RunOutcome::Succeeded
            }
            Err(e) => {
                let message = format!("failed to write snapshot: {e}");
                error!("{}", message);
                self.finalize_failure(started_at, message, backup, RunOutcome::Failed)
                    .await
            }
        }
    }

    async fn finalize_failure(
        &self,
        started_at: DateTime<Utc>,
        error_message: String,
        backup: Option<&Path>,
        outcome: RunOutcome,
    ) -> RunOutcome {
        if let Some(backup) = backup {
            if let Err(e) = self.store.restore_backup(backup).await {
                error!("Could not restore backup {}: {}", backup.display(), e);
            }
        }

        let ended_at = Utc::now();
        let size = self.store.snapshot_size().await;
        let metadata =
            self.build_metadata(started_at, ended_at, false, Some(error_message), size, 0, 0);
        self.persist_metadata(&metadata).await;
        self.transition_to_idle(outcome, metadata);
        outcome
    }

    #[allow(clippy::too_many_arguments)]
    fn build_metadata(
        &self,
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
        success: bool,
        error_message: Option<String>,
        data_file_size_bytes: u64,
        total_comments: usize,
        comments_with_tickers: usize,
    ) -> RunMetadata {
        RunMetadata {
            data_file: self.store.data_path().display().to_string(),
            scrape_start_time: started_at,
            scrape_end_time: ended_at,
            scrape_duration_seconds: (ended_at - started_at).num_milliseconds() as f64 / 1000.0,
            success,
            error_message,
            data_file_size_bytes,
            total_comments,
            comments_with_tickers,
        }
    }

    async fn persist_metadata(&self, metadata: &RunMetadata) {
        // The metadata record is best-effort; a failed write must not turn
        // a finished run into a crash
        if let Err(e) = self.store.write_metadata(metadata).await {
            error!("Could not write run metadata: {}", e);
        }
    }

    /// Claim the single run slot. The Idle check and the Running write
    /// happen under one write lock, so a losing trigger always sees
    /// Running.
    fn try_begin_run(&self, started_at: DateTime<Utc>) -> bool {
        let mut status = self
            .status
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if status.is_running() {
            return false;
        }
        status.state = RunState::Running;
        status.started_at = Some(started_at);
        status.progress = Some(ProgressCounters {
            processed: 0,
            total: 0,
        });
        true
    }

    fn transition_to_idle(&self, outcome: RunOutcome, metadata: RunMetadata) {
        let mut status = self
            .status
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        status.state = RunState::Idle;
        status.started_at = None;
        status.progress = None;
        status.last_outcome = Some(outcome);
        status.last_run = Some(metadata);
    }
}

/// Fixed-interval trigger feeding the orchestrator's guarded entry point.
/// An interval tick that lands while a run is still in flight is skipped.
pub async fn run_scheduler(orchestrator: Arc<UpdateOrchestrator>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick fires immediately; consume it so the caller controls
    // whether an initial run happens
    ticker.tick().await;

    info!(
        "Scheduler started - updating every {} minutes",
        interval.as_secs() / 60
    );
    loop {
        ticker.tick().await;
        info!("Starting scheduled update");
        match orchestrator.run_once().await {
            TriggerOutcome::Completed(RunOutcome::Succeeded) => {
                info!("Scheduled update completed successfully")
            }
            TriggerOutcome::Completed(outcome) => {
                warn!("Scheduled update ended with {:?}", outcome)
            }
            TriggerOutcome::AlreadyRunning(_) => {
                warn!("Previous update still running; skipping this tick")
            }
        }
    }
}
