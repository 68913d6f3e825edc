//! Convergence of a running HAProxy towards the desired state.
//!
//! # Data Flow
//! ```text
//! RuntimeConfiguration
//!     → render (template + selectors, records required services)
//!     → verify (materialize files, haproxy -c -f)
//!     → drift.rs (show stat, plan, enable/disable over the sockets)
//!         in sync and not first pass → done
//!     → commit (backup + replace)
//!     → reload (first pass, or after an applied commit)
//!
//! status.rs: last run published for the admin API
//! ```

pub mod drift;
pub mod error;
pub mod orchestrator;
pub mod status;

pub use drift::{DispatchError, DriftOutcome, RestartReason, ServerCommand};
pub use error::{ConvergeError, ConvergeResult};
pub use orchestrator::{ConvergeOutcome, ConvergeState, Converger};
pub use status::{ConvergeStatus, RunResult, StatusBoard};
