//! HAProxy convergence controller library.

// Desired state and configuration
pub mod config;
pub mod source;

// Convergence pipeline
pub mod converge;
pub mod files;
pub mod haproxy;
pub mod render;

// Cross-cutting concerns
pub mod admin;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::ControllerConfig;
pub use converge::{ConvergeOutcome, ConvergeState, Converger};
pub use lifecycle::Shutdown;
