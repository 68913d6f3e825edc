//! HAProxy convergence controller.
//!
//! Keeps a local HAProxy in line with the desired state published by the
//! configuration distribution side.
//!
//! # Architecture Overview
//!
//! ```text
//!   runtime.json ──▶ source ──▶ ┌────────────────────────────────────────┐
//!   (watch/tick)                │               converge                 │
//!                               │                                        │
//!                               │  render ──▶ verify ──▶ drift ──┐       │
//!                               │  (template)  (-c -f)   (stats) │       │
//!                               │                         in sync│       │
//!                               │                  ┌──────────────┘      │
//!                               │                  ▼                     │
//!                               │   enable/disable over sockets          │
//!                               │     or commit + reload                 │
//!                               └────────────────────────────────────────┘
//!                                      │                 │
//!                                      ▼                 ▼
//!                               haproxy.cfg        HAProxy process
//!
//!   Cross-cutting: config, lifecycle (scheduler, signals),
//!                  observability (logs, metrics), admin API
//! ```

use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use haproxy_converger::admin::{self, AdminState};
use haproxy_converger::config::load_config;
use haproxy_converger::converge::{Converger, StatusBoard};
use haproxy_converger::lifecycle::{signals, Scheduler, Shutdown, Trigger};
use haproxy_converger::observability;
use haproxy_converger::source::watcher::RuntimeWatcher;

#[derive(Parser)]
#[command(name = "haproxy-converger", version)]
#[command(about = "Converges a local HAProxy towards the published desired state")]
struct Args {
    /// Controller configuration file.
    #[arg(short, long, default_value = "/etc/haproxy-converger/config.toml")]
    config: PathBuf,

    /// Converge once and exit.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(&args.config)?;

    observability::logging::init(&config.observability)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "haproxy-converger starting");
    tracing::info!(
        config_path = %config.haproxy.config_path.display(),
        config_name = %config.haproxy.config_name,
        socket = %config.haproxy.socket,
        runtime = %config.source.runtime_config.display(),
        interval_secs = config.schedule.interval_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => observability::metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let board = StatusBoard::new();
    let mut scheduler = Scheduler::new(
        Converger::from_config(&config),
        config.source.runtime_config.clone(),
        config.schedule.interval(),
        board.clone(),
    );

    if args.once {
        let outcome = scheduler.run_once(Trigger::Startup).await?;
        tracing::info!(?outcome, "Single convergence complete");
        return Ok(());
    }

    let shutdown = Shutdown::new();
    let (trigger_tx, trigger_rx) = mpsc::unbounded_channel();

    // Dropping the watcher stops it; keep it for the life of main.
    let _watcher = if config.source.watch {
        match RuntimeWatcher::new(&config.source.runtime_config, trigger_tx.clone()).run() {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                tracing::warn!(error = %e, "Runtime watcher unavailable, relying on the interval");
                None
            }
        }
    } else {
        None
    };

    if config.admin.enabled {
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        let state = AdminState {
            board: board.clone(),
            haproxy: config.haproxy.clone(),
            socket_deadline: config.timeouts.socket(),
            api_key: config.admin.api_key.clone(),
            triggers: trigger_tx.clone(),
        };
        let admin_shutdown = shutdown.subscribe();
        tokio::spawn(async move {
            if let Err(e) = admin::serve(listener, state, admin_shutdown).await {
                tracing::error!(error = %e, "Admin API stopped");
            }
        });
    }

    tokio::spawn(signals::forward_termination(shutdown.clone()));

    let result = scheduler.run(trigger_rx, shutdown.subscribe()).await;
    shutdown.trigger();

    match result {
        Ok(state) => {
            tracing::info!(
                first_converge_done = state.first_converge_done,
                "Shutdown complete"
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!(stage = e.stage(), error = %e, "Exiting after fatal error");
            Err(e.into())
        }
    }
}
