//! Persistence for the dashboard filter state.

use crate::cache::SnapshotStore;
use gauge_core::{default_filters, FilterState, Timestamp};
use tracing::warn;

/// Key the filter state is stored under.
pub const FILTER_STORAGE_KEY: &str = "analytics_dashboard_filters";

/// Save `filters`. Failures are logged and otherwise ignored.
pub fn save_filters(store: &dyn SnapshotStore, filters: &FilterState) {
    let json = match serde_json::to_string(filters) {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, "failed to serialize filter state");
            return;
        }
    };
    if let Err(e) = store.set_item(FILTER_STORAGE_KEY, &json) {
        warn!(error = %e, "failed to save filter state");
    }
}

/// Load the saved filter state, or the defaults for `now` when nothing
/// usable is stored.
pub fn load_filters(store: &dyn SnapshotStore, now: Timestamp) -> FilterState {
    let raw = match store.get_item(FILTER_STORAGE_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return default_filters(now),
        Err(e) => {
            warn!(error = %e, "failed to read filter state");
            return default_filters(now);
        }
    };

    match serde_json::from_str::<FilterState>(&raw) {
        Ok(filters) if filters.date_range.start <= filters.date_range.end => filters,
        Ok(_) => {
            warn!("saved filter state has an inverted date range, using defaults");
            default_filters(now)
        }
        Err(e) => {
            warn!(error = %e, "saved filter state is unreadable, using defaults");
            default_filters(now)
        }
    }
}
