//! Sync engine metrics.
//!
//! # Metrics
//! - `liveconf_changes_total` (counter): field changes applied, by namespace
//! - `liveconf_dropped_updates_total` (counter): notifications discarded, by namespace and reason
//! - `liveconf_reconnects_total` (counter): monitor re-subscriptions scheduled, by namespace
//! - `liveconf_watched_keys` (gauge): keys currently bound to fields, by namespace
//!
//! Recording is a no-op until the host application installs a recorder.

use metrics::{counter, describe_counter, describe_gauge, gauge};

/// Applied field changes.
pub const CHANGES: &str = "liveconf_changes_total";

/// Change notifications dropped before reaching a field.
pub const DROPPED_UPDATES: &str = "liveconf_dropped_updates_total";

/// Scheduled monitor re-subscriptions.
pub const RECONNECTS: &str = "liveconf_reconnects_total";

/// Keys bound to fields.
pub const WATCHED_KEYS: &str = "liveconf_watched_keys";

/// Registers metric descriptions. Call once after installing a recorder.
pub fn register_metrics() {
    describe_counter!(CHANGES, "Total field changes applied from the store");
    describe_counter!(DROPPED_UPDATES, "Total change notifications dropped");
    describe_counter!(RECONNECTS, "Total monitor re-subscriptions scheduled");
    describe_gauge!(WATCHED_KEYS, "Number of keys bound to configuration fields");
}

pub fn record_change(namespace: &str) {
    counter!(CHANGES, "namespace" => namespace.to_string()).increment(1);
}

/// Records a dropped notification; `reason` is one of `storage`, `convert`
/// or `assign`.
pub fn record_dropped_update(namespace: &str, reason: &'static str) {
    let labels = [
        ("namespace", namespace.to_string()),
        ("reason", reason.to_string()),
    ];
    counter!(DROPPED_UPDATES, &labels).increment(1);
}

pub fn record_reconnect(namespace: &str) {
    counter!(RECONNECTS, "namespace" => namespace.to_string()).increment(1);
}

pub fn record_watched_keys(namespace: &str, count: usize) {
    gauge!(WATCHED_KEYS, "namespace" => namespace.to_string()).set(count as f64);
}
