//! Normalizer — canonical forms for labels, timeframes, and identifiers.
//!
//! Applied to setup-derived and outcome-derived values alike before any
//! comparison, filter, or join. All functions are pure.

/// Sentinel for an absent or empty snapshot label.
pub const NULL_LABEL: &str = "(null)";

/// Sentinel for an absent timeframe or unresolved dimension.
pub const UNKNOWN: &str = "unknown";

/// Lowercased label, or `"(null)"` when absent or empty.
pub fn normalize_label(label: Option<&str>) -> String {
    match label {
        Some(l) if !l.is_empty() => l.to_lowercase(),
        _ => NULL_LABEL.to_string(),
    }
}

/// Lowercased timeframe, or `"unknown"` when absent.
pub fn normalize_timeframe(timeframe: Option<&str>) -> String {
    timeframe.unwrap_or(UNKNOWN).to_lowercase()
}

/// Lowercased asset id. `None` means the record is unattributable and must be dropped.
pub fn normalize_asset(asset_id: Option<&str>) -> Option<String> {
    asset_id
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_lowercase)
}

/// Lowercased dimension value for grouping keys.
pub fn normalize_dimension(value: &str) -> String {
    value.to_lowercase()
}

/// `(snapshotId, setupId)` join key. Ids are opaque and compared exactly.
pub fn join_key(snapshot_id: &str, setup_id: &str) -> String {
    format!("{snapshot_id}|{setup_id}")
}

/// Parse a CLI/config label list entry: trimmed, lowercased, blank → `"(null)"`.
pub fn parse_label_filter(raw: &str) -> String {
    let trimmed = raw.trim().to_lowercase();
    if trimmed.is_empty() {
        NULL_LABEL.to_string()
    } else {
        trimmed
    }
}
