//! Last-run status shared with the admin API.

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::converge::{ConvergeError, ConvergeOutcome};

/// Result of the most recent run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunResult {
    /// No run has finished yet.
    Pending,
    /// The runtime snapshot could not be loaded.
    Skipped { reason: String },
    Succeeded { outcome: ConvergeOutcome },
    Failed {
        stage: &'static str,
        error: String,
        fatal: bool,
    },
}

impl RunResult {
    pub fn failed(error: &ConvergeError) -> Self {
        RunResult::Failed {
            stage: error.stage(),
            error: error.to_string(),
            fatal: error.is_fatal(),
        }
    }
}

/// Snapshot published after every run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConvergeStatus {
    pub version: &'static str,
    pub runs: u64,
    pub first_converge_done: bool,
    pub last_run_id: Option<Uuid>,
    pub last_trigger: Option<&'static str>,
    pub last_started_at: Option<DateTime<Utc>>,
    pub last_finished_at: Option<DateTime<Utc>>,
    pub last_result: RunResult,
}

impl Default for ConvergeStatus {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            runs: 0,
            first_converge_done: false,
            last_run_id: None,
            last_trigger: None,
            last_started_at: None,
            last_finished_at: None,
            last_result: RunResult::Pending,
        }
    }
}

/// Lock-free holder for the latest [`ConvergeStatus`].
///
/// The scheduler is the only writer; readers never block it.
#[derive(Debug, Clone, Default)]
pub struct StatusBoard {
    inner: Arc<ArcSwap<ConvergeStatus>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Arc<ConvergeStatus> {
        self.inner.load_full()
    }

    pub fn publish(&self, status: ConvergeStatus) {
        self.inner.store(Arc::new(status));
    }
}
