//! Drift detection between desired and live backends.
//!
//! # Responsibilities
//! - Decide whether the live process can be updated in place
//! - Compute the enable/disable commands that bring it in line
//! - Dispatch the batch to every stats socket
//!
//! # Design Decisions
//! - Any doubt resolves to "restart required": no live state, a failed read,
//!   a missing section or server, or nothing at all to keep enabled
//! - Servers whose nickname carries [`EXEMPTION_MARKER`] are never disabled
//! - Sections and servers are walked in sorted order, so batches are stable

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::config::HaproxyConfig;
use crate::files::marker;
use crate::haproxy::{
    read_status, resolve_sockets, send_commands, LiveBackendSnapshot, SocketError,
    MAINTENANCE_STATUS,
};
use crate::observability::metrics;
use crate::render::{nickname, RequiredServices};

/// Servers with this in their nickname are managed by hand.
pub const EXEMPTION_MARKER: &str = "nocheck-";

/// One admin command for the stats socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerCommand {
    Enable { section: String, nickname: String },
    Disable { section: String, nickname: String },
}

impl ServerCommand {
    pub fn action(&self) -> &'static str {
        match self {
            ServerCommand::Enable { .. } => "enable",
            ServerCommand::Disable { .. } => "disable",
        }
    }
}

impl fmt::Display for ServerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerCommand::Enable { section, nickname }
            | ServerCommand::Disable { section, nickname } => {
                write!(f, "{} server {}/{}", self.action(), section, nickname)
            }
        }
    }
}

/// Wire form of a batch: one newline-terminated command per line.
pub fn to_batch(commands: &[ServerCommand]) -> String {
    commands.iter().map(|c| format!("{c}\n")).collect()
}

/// Why the live process cannot be updated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RestartReason {
    /// No stats socket exists.
    NoLiveState,
    /// The stats socket could not be read.
    StatusUnavailable { error: String },
    /// A required service has no section in the running process.
    MissingSection { section: String },
    /// A desired endpoint has no server in its section.
    MissingServer { section: String, nickname: String },
    /// Nothing would stay enabled; refuse to disable a whole fleet.
    NothingEnabled,
}

impl fmt::Display for RestartReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestartReason::NoLiveState => write!(f, "no stats socket found"),
            RestartReason::StatusUnavailable { error } => {
                write!(f, "stats socket unavailable: {error}")
            }
            RestartReason::MissingSection { section } => {
                write!(f, "missing section {section}")
            }
            RestartReason::MissingServer { section, nickname } => {
                write!(f, "missing server {nickname} in section {section}")
            }
            RestartReason::NothingEnabled => write!(f, "no enabled backends"),
        }
    }
}

/// Decision computed from a live snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriftPlan {
    Restart(RestartReason),
    /// In-place update; empty when already in sync.
    Update(Vec<ServerCommand>),
}

/// Result of [`update_backends`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriftOutcome {
    RestartRequired(RestartReason),
    /// Live state matches desired state after `commands` were dispatched.
    InSync { commands: Vec<ServerCommand> },
}

impl DriftOutcome {
    pub fn restart_required(&self) -> bool {
        matches!(self, DriftOutcome::RestartRequired(_))
    }
}

/// Some stats sockets did not receive the batch. Sockets that did are not
/// rolled back.
#[derive(Debug, Error)]
#[error("failed to dispatch commands to {} of {attempted} stats sockets", .failures.len())]
pub struct DispatchError {
    pub attempted: usize,
    pub failures: Vec<SocketError>,
}

fn is_exempt(nickname: &str) -> bool {
    nickname.contains(EXEMPTION_MARKER)
}

/// Compare required services against a live snapshot.
pub fn plan(live: &LiveBackendSnapshot, required: &RequiredServices) -> DriftPlan {
    let mut enabled: BTreeSet<String> = BTreeSet::new();

    for (service, endpoints) in required.iter() {
        if endpoints.is_empty() {
            continue;
        }
        let Some(section) = live.get(service) else {
            return DriftPlan::Restart(RestartReason::MissingSection {
                section: service.clone(),
            });
        };
        for host_port in endpoints.keys() {
            let nick = nickname(service, host_port);
            if !section.contains_key(&nick) {
                return DriftPlan::Restart(RestartReason::MissingServer {
                    section: service.clone(),
                    nickname: nick,
                });
            }
            enabled.insert(nick);
        }
    }

    if enabled.is_empty() {
        return DriftPlan::Restart(RestartReason::NothingEnabled);
    }

    let mut commands = Vec::new();
    for (section, servers) in live {
        for (nick, status) in servers {
            let in_maintenance = status == MAINTENANCE_STATUS;
            if enabled.contains(nick) {
                if in_maintenance {
                    commands.push(ServerCommand::Enable {
                        section: section.clone(),
                        nickname: nick.clone(),
                    });
                }
            } else if !is_exempt(nick) && !in_maintenance {
                commands.push(ServerCommand::Disable {
                    section: section.clone(),
                    nickname: nick.clone(),
                });
            }
        }
    }

    DriftPlan::Update(commands)
}

/// Read live state, then either report that a restart is needed or bring
/// the live process in line through the stats sockets.
pub async fn update_backends(
    haproxy: &HaproxyConfig,
    socket_deadline: Duration,
    required: &RequiredServices,
) -> Result<DriftOutcome, DispatchError> {
    let live = match read_status(&haproxy.socket, socket_deadline).await {
        Ok(Some(live)) => live,
        Ok(None) => return Ok(DriftOutcome::RestartRequired(RestartReason::NoLiveState)),
        Err(e) => {
            tracing::warn!(error = %e, "Could not read live backend state");
            return Ok(DriftOutcome::RestartRequired(
                RestartReason::StatusUnavailable {
                    error: e.to_string(),
                },
            ));
        }
    };

    metrics::record_live_backends(live.values().map(|servers| servers.len()).sum());
    tracing::debug!(
        sections = live.len(),
        required = required.len(),
        "Comparing live backends with required services"
    );

    let commands = match plan(&live, required) {
        DriftPlan::Restart(reason) => return Ok(DriftOutcome::RestartRequired(reason)),
        DriftPlan::Update(commands) => commands,
    };

    if !commands.is_empty() {
        dispatch(haproxy, socket_deadline, &commands).await?;
    }

    Ok(DriftOutcome::InSync { commands })
}

async fn dispatch(
    haproxy: &HaproxyConfig,
    deadline: Duration,
    commands: &[ServerCommand],
) -> Result<(), DispatchError> {
    let batch = to_batch(commands);
    let sockets = resolve_sockets(&haproxy.socket).map_err(|e| DispatchError {
        attempted: 0,
        failures: vec![e],
    })?;

    tracing::info!(
        sockets = sockets.len(),
        commands = commands.len(),
        batch = %batch,
        "Running haproxy commands"
    );

    let mut failures = Vec::new();
    for path in &sockets {
        if let Err(e) = send_commands(path, &batch, deadline).await {
            tracing::error!(socket = %path.display(), error = %e, "Could not send commands");
            failures.push(e);
        }
    }

    for command in commands {
        metrics::record_socket_command(command.action());
    }
    marker::record(&haproxy.marker_file(), &batch).await;

    if failures.is_empty() {
        Ok(())
    } else {
        Err(DispatchError {
            attempted: sockets.len(),
            failures,
        })
    }
}
