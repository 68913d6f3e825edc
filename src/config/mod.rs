//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ControllerConfig (validated, immutable)
//!     → split into Converger / Scheduler / admin settings at startup
//! ```
//!
//! # Design Decisions
//! - Controller config is loaded once; desired state is what changes at runtime
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::AdminConfig;
pub use schema::ControllerConfig;
pub use schema::HaproxyConfig;
pub use schema::ObservabilityConfig;
pub use schema::TimeoutConfig;
