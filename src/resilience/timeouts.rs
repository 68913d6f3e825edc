//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap subprocess and control-socket calls with a deadline
//! - Turn an elapsed deadline into the caller's own error type
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors are distinct from other errors
//! - Dropping the timed-out future must release its resources
//!   (children are spawned with `kill_on_drop`)

use std::future::Future;
use std::time::Duration;
use tokio::time;

/// Run `fut` with a deadline, mapping expiry through `on_timeout`.
pub async fn with_deadline<F, T, E>(
    deadline: Duration,
    fut: F,
    on_timeout: impl FnOnce() -> E,
) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
{
    match time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(on_timeout()),
    }
}
