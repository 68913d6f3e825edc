//! One convergence pass.
//!
//! # Responsibilities
//! - Render and verify a candidate configuration
//! - Try an in-place backend update first
//! - Otherwise commit the candidate and reload HAProxy
//!
//! # Design Decisions
//! - The first pass after startup always commits and reloads, so the running
//!   process is known to match the active file
//! - [`ConvergeState`] is owned by the caller; `&mut` keeps passes serialized

use serde::Serialize;
use std::path::PathBuf;

use crate::config::{ControllerConfig, HaproxyConfig, TimeoutConfig};
use crate::converge::drift::{self, DriftOutcome};
use crate::converge::error::ConvergeResult;
use crate::files::{self, CommitOutcome, ReloadOutcome};
use crate::observability::metrics;
use crate::render::{render, RenderedConfig};
use crate::source::{DesiredState, LocalInstance, ProxyConfiguration, RuntimeConfiguration};

/// State carried from one pass to the next.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConvergeState {
    /// Set once a pass has attempted a reload.
    pub first_converge_done: bool,
}

/// What a pass did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ConvergeOutcome {
    /// No HAProxy template has been published yet.
    NoConfiguration,
    /// Live process updated through the stats sockets.
    UpdatedLive { commands: usize },
    /// Restart was needed but the active file already matches.
    Unchanged,
    /// Active file committed (or kept) and HAProxy reloaded.
    Reconfigured {
        config_changed: bool,
        backup_file: Option<PathBuf>,
        reload: ReloadOutcome,
    },
}

impl ConvergeOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ConvergeOutcome::NoConfiguration => "no_configuration",
            ConvergeOutcome::UpdatedLive { .. } => "updated_live",
            ConvergeOutcome::Unchanged => "unchanged",
            ConvergeOutcome::Reconfigured { .. } => "reconfigured",
        }
    }
}

/// Drives HAProxy towards a runtime configuration.
#[derive(Debug, Clone)]
pub struct Converger {
    haproxy: HaproxyConfig,
    timeouts: TimeoutConfig,
    local: LocalInstance,
}

impl Converger {
    pub fn new(haproxy: HaproxyConfig, timeouts: TimeoutConfig, local: LocalInstance) -> Self {
        Self {
            haproxy,
            timeouts,
            local,
        }
    }

    pub fn from_config(config: &ControllerConfig) -> Self {
        Self::new(
            config.haproxy.clone(),
            config.timeouts.clone(),
            LocalInstance::new(config.instance.availability_zone.clone()),
        )
    }

    pub fn haproxy(&self) -> &HaproxyConfig {
        &self.haproxy
    }

    pub fn timeouts(&self) -> &TimeoutConfig {
        &self.timeouts
    }

    /// Run one pass against `runtime`.
    pub async fn converge(
        &self,
        state: &mut ConvergeState,
        runtime: &RuntimeConfiguration,
    ) -> ConvergeResult<ConvergeOutcome> {
        let Some(proxy) = runtime.haproxy.as_ref() else {
            tracing::warn!("HAProxy configuration is still missing");
            return Ok(ConvergeOutcome::NoConfiguration);
        };

        let rendered = self.build_and_verify(proxy, &runtime.service_backends).await?;

        let update = drift::update_backends(&self.haproxy, self.timeouts.socket(), &rendered.required)
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to update live backends"))?;

        match &update {
            DriftOutcome::RestartRequired(reason) => {
                tracing::info!(%reason, "HAProxy restart required");
            }
            DriftOutcome::InSync { commands } if state.first_converge_done => {
                tracing::debug!(commands = commands.len(), "HAProxy updated without restart");
                return Ok(ConvergeOutcome::UpdatedLive {
                    commands: commands.len(),
                });
            }
            DriftOutcome::InSync { .. } => {
                tracing::info!("First convergence, writing configuration and reloading");
            }
        }

        let commit = files::commit(&self.haproxy, &rendered.text, true).await?;
        let (config_changed, backup_file) = match commit {
            CommitOutcome::Applied(log) => (true, log.backup_file),
            CommitOutcome::Unchanged => (false, None),
        };

        if !config_changed && state.first_converge_done {
            tracing::debug!("Configuration unchanged, skipping reload");
            return Ok(ConvergeOutcome::Unchanged);
        }

        let reload = files::reload(&self.haproxy.reload_command, self.timeouts.reload()).await;
        state.first_converge_done = true;
        metrics::record_reload(reload.is_ok());
        let reload = reload?;

        Ok(ConvergeOutcome::Reconfigured {
            config_changed,
            backup_file,
            reload,
        })
    }

    async fn build_and_verify(
        &self,
        proxy: &ProxyConfiguration,
        desired: &DesiredState,
    ) -> ConvergeResult<RenderedConfig> {
        let rendered = render(&proxy.template, desired, &self.local)?;
        files::verify(&self.haproxy, proxy, &rendered.text, self.timeouts.syntax_check()).await?;
        Ok(rendered)
    }
}
