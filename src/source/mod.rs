//! Desired-state source.
//!
//! # Data Flow
//! ```text
//! configuration distribution side
//!     → runtime.json (template, certs, files, service backends)
//!     → loader.rs (read & deserialize, once per convergence)
//!     → RuntimeConfiguration (immutable for the convergence)
//!
//! On change:
//!     watcher.rs detects a write/rename in the snapshot directory
//!     → Trigger::SourceChanged sent to the scheduler
//! ```
//!
//! # Design Decisions
//! - The snapshot is re-read for every convergence; nothing is cached
//! - A missing or unparsable snapshot skips the run, it never converges to empty

pub mod loader;
pub mod types;
pub mod watcher;

pub use loader::{load_runtime, SourceError};
pub use types::{
    DesiredState, EndpointInfo, LocalInstance, ProxyConfiguration, RuntimeConfiguration,
    ServiceConfiguration, ServiceEndpoints,
};
