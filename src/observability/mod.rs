//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Every convergence produces:
//!     → logging.rs (structured log events)
//!     → metrics.rs (runs, reloads, socket commands, live backends)
//!     → spans.rs (one span per run, tagged with a run id)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - The run id flows through every event of a convergence
//! - Metrics are no-ops until an exporter is installed

pub mod logging;
pub mod metrics;
pub mod spans;
