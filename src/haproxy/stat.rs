//! `show stat` response parsing.
//!
//! The response is CSV with a fixed column layout. Only three columns matter
//! here: 0 (proxy/section name), 1 (server name) and 17 (status).

use std::collections::BTreeMap;

/// Section name -> server nickname -> status.
pub type LiveBackendSnapshot = BTreeMap<String, BTreeMap<String, String>>;

/// Status of a server put in maintenance.
pub const MAINTENANCE_STATUS: &str = "MAINT";

const SECTION_FIELD: usize = 0;
const NICKNAME_FIELD: usize = 1;
const STATUS_FIELD: usize = 17;

/// Parse a `show stat` response into per-server states.
///
/// Aggregate `FRONTEND`/`BACKEND` rows, comments and blank lines are skipped,
/// as are rows too short to carry a status column.
pub fn parse_stat(response: &str) -> LiveBackendSnapshot {
    let mut snapshot = LiveBackendSnapshot::new();

    for line in response.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() <= STATUS_FIELD {
            if !matches!(fields.get(NICKNAME_FIELD), Some(&"FRONTEND") | Some(&"BACKEND")) {
                tracing::debug!(line, "Skipping short stat row");
            }
            continue;
        }

        let nickname = fields[NICKNAME_FIELD];
        if nickname == "FRONTEND" || nickname == "BACKEND" {
            continue;
        }

        snapshot
            .entry(fields[SECTION_FIELD].to_string())
            .or_default()
            .insert(nickname.to_string(), fields[STATUS_FIELD].to_string());
    }

    snapshot
}
