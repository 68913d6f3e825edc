//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! syntax check / reload command / stats socket round trip
//!     → timeouts.rs (enforce a deadline, map expiry to the caller's error)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - No retries inside a run; the next scheduled run is the retry

pub mod timeouts;
