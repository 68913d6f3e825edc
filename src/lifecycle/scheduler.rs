//! Convergence scheduling.
//!
//! # Responsibilities
//! - Run a convergence on every interval tick, snapshot change, or admin request
//! - Load the runtime snapshot fresh for each run
//! - Publish the result of each run to the [`StatusBoard`]
//! - Stop on shutdown or on a fatal convergence error
//!
//! # Design Decisions
//! - The scheduler owns the [`Converger`] and its [`ConvergeState`], so runs
//!   never overlap
//! - Triggers that queue up during a run are coalesced into the next run

use chrono::Utc;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc};
use tokio::time::MissedTickBehavior;
use tracing::Instrument;
use uuid::Uuid;

use crate::converge::{
    ConvergeError, ConvergeOutcome, ConvergeState, ConvergeStatus, Converger, RunResult,
    StatusBoard,
};
use crate::observability::{metrics, spans};
use crate::source::load_runtime;

/// Why a convergence was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Startup,
    Interval,
    SourceChanged,
    Admin,
}

impl Trigger {
    pub fn label(&self) -> &'static str {
        match self {
            Trigger::Startup => "startup",
            Trigger::Interval => "interval",
            Trigger::SourceChanged => "source_changed",
            Trigger::Admin => "admin",
        }
    }
}

/// Serial convergence loop.
pub struct Scheduler {
    converger: Converger,
    state: ConvergeState,
    runtime_path: PathBuf,
    interval: Duration,
    board: StatusBoard,
    runs: u64,
}

impl Scheduler {
    pub fn new(
        converger: Converger,
        runtime_path: PathBuf,
        interval: Duration,
        board: StatusBoard,
    ) -> Self {
        Self {
            converger,
            state: ConvergeState::default(),
            runtime_path,
            interval,
            board,
            runs: 0,
        }
    }

    pub fn state(&self) -> ConvergeState {
        self.state
    }

    /// Run until `shutdown` fires or a convergence fails fatally.
    ///
    /// The first interval tick completes immediately, so the first run
    /// happens at startup.
    pub async fn run(
        mut self,
        mut triggers: mpsc::UnboundedReceiver<Trigger>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<ConvergeState, ConvergeError> {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            interval_secs = self.interval.as_secs(),
            runtime = %self.runtime_path.display(),
            "Scheduler started"
        );

        loop {
            let trigger = tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    tracing::info!("Scheduler stopping");
                    return Ok(self.state);
                }
                Some(trigger) = triggers.recv() => trigger,
                _ = ticker.tick() => Trigger::Interval,
            };

            // Bursts of file events or admin calls fold into this run.
            while triggers.try_recv().is_ok() {}

            if let Err(e) = self.run_once(trigger).await {
                if e.is_fatal() {
                    tracing::error!(error = %e, "Fatal convergence error, stopping scheduler");
                    return Err(e);
                }
            }
        }
    }

    /// Load the snapshot and converge once.
    ///
    /// Returns `Ok(None)` when the snapshot could not be loaded.
    pub async fn run_once(
        &mut self,
        trigger: Trigger,
    ) -> Result<Option<ConvergeOutcome>, ConvergeError> {
        let (run_id, span) = spans::converge_span(trigger.label());
        self.execute(run_id, trigger).instrument(span).await
    }

    async fn execute(
        &mut self,
        run_id: Uuid,
        trigger: Trigger,
    ) -> Result<Option<ConvergeOutcome>, ConvergeError> {
        let started_at = Utc::now();
        let start = Instant::now();
        self.runs += 1;

        let runtime = match load_runtime(&self.runtime_path).await {
            Ok(runtime) => runtime,
            Err(e) => {
                tracing::warn!(error = %e, "Runtime configuration unavailable, skipping convergence");
                metrics::record_converge("skipped", start);
                self.publish(run_id, trigger, started_at, RunResult::Skipped {
                    reason: e.to_string(),
                });
                return Ok(None);
            }
        };

        let result = self.converger.converge(&mut self.state, &runtime).await;

        match &result {
            Ok(outcome) => {
                tracing::info!(
                    outcome = outcome.label(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Convergence finished"
                );
                metrics::record_converge(outcome.label(), start);
                self.publish(run_id, trigger, started_at, RunResult::Succeeded {
                    outcome: outcome.clone(),
                });
            }
            Err(e) => {
                tracing::error!(
                    stage = e.stage(),
                    fatal = e.is_fatal(),
                    error = %e,
                    "Convergence failed"
                );
                metrics::record_converge("error", start);
                self.publish(run_id, trigger, started_at, RunResult::failed(e));
            }
        }

        result.map(Some)
    }

    fn publish(
        &self,
        run_id: Uuid,
        trigger: Trigger,
        started_at: chrono::DateTime<Utc>,
        last_result: RunResult,
    ) {
        self.board.publish(ConvergeStatus {
            runs: self.runs,
            first_converge_done: self.state.first_converge_done,
            last_run_id: Some(run_id),
            last_trigger: Some(trigger.label()),
            last_started_at: Some(started_at),
            last_finished_at: Some(Utc::now()),
            last_result,
            ..ConvergeStatus::default()
        });
    }
}
