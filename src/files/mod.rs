//! On-disk configuration management.
//!
//! # Data Flow
//! ```text
//! rendered candidate
//!     → verify.rs (certs.d/, static files, scratch copy, `haproxy -c -f`)
//!     → commit.rs (compare, hard-link backup, replace, touch marker)
//!     → reload.rs (reload command, only after an applied commit)
//!
//! marker.rs: haproxy-lastupdated.txt, touched by commits and
//!            rewritten by live backend updates
//! ```
//!
//! # Design Decisions
//! - The active file is only written after the candidate passed the check
//! - Subprocesses run without a shell and under a deadline

pub mod commit;
pub mod marker;
pub mod reload;
pub mod verify;

pub use commit::{commit, CommitError, CommitOutcome, ConfigChangeLog};
pub use reload::{reload, ReloadError, ReloadOutcome};
pub use verify::{verify, VerifyError};
