//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Scheduler (scheduler.rs):
//!     interval tick / snapshot change / admin request → one convergence
//!
//! Shutdown (shutdown.rs):
//!     Signal received → scheduler and admin API stop → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - A convergence in progress is never interrupted; shutdown is observed
//!   between runs
//! - A fatal convergence error stops the scheduler and the process

pub mod scheduler;
pub mod shutdown;
pub mod signals;

pub use scheduler::{Scheduler, Trigger};
pub use shutdown::Shutdown;
