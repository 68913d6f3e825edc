//! Configuration rendering subsystem.
//!
//! # Data Flow
//! ```text
//! ProxyConfiguration.template + DesiredState + LocalInstance
//!     → engine.rs (parse, execute with Endpoints / LocalEndpoints)
//!     → RenderedConfig { text, required }
//!         text     → files::verify (syntax check, commit)
//!         required → converge::drift (live reconciliation)
//! ```
//!
//! # Design Decisions
//! - Rendering is pure: no disk I/O, no sockets
//! - Required services are part of the return value, never a side channel
//! - Endpoint order is by nickname so identical input yields identical text

pub mod engine;
pub mod params;

pub use engine::{render, RenderError, RenderedConfig};
pub use params::{nickname, BackendParameters, RequiredServices};
