//! HAProxy stats socket protocol.
//!
//! # Data Flow
//! ```text
//! socket glob (e.g. /run/haproxy/admin-*.sock)
//!     → socket.rs resolve_sockets
//!     → first socket: "show stat\n" → CSV until EOF
//!     → stat.rs parse_stat → LiveBackendSnapshot
//!
//! command batch ("enable server s/n\n", "disable server s/n\n")
//!     → socket.rs send_commands (every socket, no reply read)
//! ```
//!
//! # Design Decisions
//! - Column positions of the stat CSV are fixed (0, 1, 17)
//! - Every round trip has a deadline
//! - Errors are typed; deciding what a failed read means is left to callers

pub mod socket;
pub mod stat;

pub use socket::{read_status, resolve_sockets, send_commands, SocketError};
pub use stat::{parse_stat, LiveBackendSnapshot, MAINTENANCE_STATUS};
