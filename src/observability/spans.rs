//! Per-run spans.

use tracing::Span;
use uuid::Uuid;

/// Span wrapping one convergence, with a fresh run id.
pub fn converge_span(trigger: &'static str) -> (Uuid, Span) {
    let run_id = Uuid::new_v4();
    let span = tracing::info_span!("converge", %run_id, trigger);
    (run_id, span)
}
