//! Item exposure tracking.
//!
//! An exposure rate is the share of completed sessions that administered an
//! item. The table is shared across sessions and updated after each one
//! finishes; writers may race, and last-writer-wins is acceptable.

use std::collections::HashMap;

use crate::session::CatSession;

/// Item id → exposure rate in `[0, 1]`.
pub type ExposureTable = HashMap<String, f64>;

/// `times_administered / total_sessions`, or `0.0` when no session ran yet.
pub fn exposure_rate(_item_id: &str, times_administered: u64, total_sessions: u64) -> f64 {
    if total_sessions == 0 {
        return 0.0;
    }
    times_administered as f64 / total_sessions as f64
}

/// Fold one finished session into the table.
///
/// `total_sessions` counts sessions including this one. Each administered
/// item's previous count is recovered as `rate * (total_sessions - 1)` and
/// incremented; all other entries are copied unchanged. Counts stay
/// fractional so tables built against another denominator drift smoothly.
pub fn update_exposure_rates(
    rates: &ExposureTable,
    session: &CatSession,
    total_sessions: u64,
) -> ExposureTable {
    let mut updated = rates.clone();
    if total_sessions == 0 {
        return updated;
    }
    let previous_sessions = (total_sessions - 1) as f64;

    for item_id in &session.items_administered {
        let count = rate_of(&updated, item_id) * previous_sessions + 1.0;
        let rate = (count / total_sessions as f64).clamp(0.0, 1.0);
        updated.insert(item_id.clone(), rate);
    }

    updated
}

/// Look up an item's rate, treating unseen items as never shown.
pub fn rate_of(rates: &ExposureTable, item_id: &str) -> f64 {
    rates.get(item_id).copied().unwrap_or(0.0)
}
