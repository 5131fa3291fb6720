//! Report generators.
//!
//! Each report is a pure function of [`LoadedRecords`] and a [`RunContext`].
//! The context fixes `generatedAt` once per run and carries the normalized
//! filter and decision policy, so every report applies the same admission
//! rules, resolver precedence, and rate formulas.

mod join_stats;
mod markdown;
mod outcome_analysis;
mod performance_breakdown;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use swinglab_core::normalize::{normalize_asset, normalize_label, normalize_timeframe};
use swinglab_core::{DecisionPolicy, Outcome};
use thiserror::Error;
use tracing::debug;

use crate::config::{ConfigError, ReportFilter};
use crate::loader::{load_window, LoadError, LoadedRecords, RecordStore};

pub use join_stats::{JoinStatsOverall, JoinStatsReport, JoinStatsRow};
pub use outcome_analysis::{
    AnalysisRow, Availability, OutcomeAnalysisReport, ReasonCount, SegmentCount,
};
pub use performance_breakdown::{
    decision_bucket_from_persisted, BreakdownBucket, BreakdownInsights,
    PerformanceBreakdownReport,
};

pub const REPORT_VERSION: &str = "v1";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// A versioned report artifact.
pub trait Report: Serialize {
    /// File name stem, e.g. `join-stats`.
    const STEM: &'static str;

    fn generated_at(&self) -> &str;

    fn render_markdown(&self) -> String;

    /// Build from loaded rows.
    fn build(records: &LoadedRecords, ctx: &RunContext) -> Self
    where
        Self: Sized;
}

/// Per-run inputs shared by every report.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// End of the lookback window.
    pub now: DateTime<Utc>,
    /// `now` as ISO-8601 UTC with milliseconds.
    pub generated_at: String,
    pub filter: ReportFilter,
    pub policy: DecisionPolicy,
}

impl RunContext {
    pub fn new(
        now: DateTime<Utc>,
        filter: ReportFilter,
        policy: DecisionPolicy,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            now,
            generated_at: now.to_rfc3339_opts(SecondsFormat::Millis, true),
            filter: filter.normalized()?,
            policy,
        })
    }
}

/// Load the window from `store` and build report `R`.
pub fn generate<R: Report>(store: &dyn RecordStore, ctx: &RunContext) -> Result<R, ReportError> {
    let records = load_window(store, ctx.now, ctx.filter.days)?;
    Ok(R::build(&records, ctx))
}

/// Filter echo written into every report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportParams {
    pub days: i64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub assets: Vec<String>,
    pub timeframes: Vec<String>,
    pub labels: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_closed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_open_only: Option<bool>,
    pub window_start: String,
    pub dataset_hash: String,
}

impl ReportParams {
    pub fn new(filter: &ReportFilter, records: &LoadedRecords) -> Self {
        Self {
            days: filter.days,
            assets: filter.assets.clone(),
            timeframes: filter.timeframes.clone(),
            labels: filter.labels.clone(),
            min_closed: None,
            include_open_only: None,
            window_start: records
                .window_start
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            dataset_hash: records.dataset_hash.clone(),
        }
    }
}

/// Normalized dimensions of an admitted outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Dimensions {
    pub asset_id: String,
    pub timeframe: String,
    pub label: String,
}

/// Normalize and filter one outcome. `None` drops it from every report:
/// label, asset, or timeframe outside the filter, or no asset id at all.
pub(crate) fn admit(outcome: &Outcome, filter: &ReportFilter) -> Option<Dimensions> {
    let label = normalize_label(outcome.label.as_deref());
    if !filter.accepts_label(&label) {
        return None;
    }
    let Some(asset_id) = normalize_asset(outcome.asset_id.as_deref()) else {
        debug!(outcome = %outcome.outcome_id, "dropping outcome without assetId");
        return None;
    };
    if !filter.accepts_asset(&asset_id) {
        return None;
    }
    let timeframe = normalize_timeframe(outcome.timeframe.as_deref());
    if !filter.accepts_timeframe(&timeframe) {
        return None;
    }
    Some(Dimensions {
        asset_id,
        timeframe,
        label,
    })
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn admission_normalizes_and_filters() {
        let filter = ReportFilter::default().normalized().unwrap();
        let mut o = outcome("o1", "snap", "s1", "EURUSD", "hit_tp");
        o.label = Some("EOD".into());
        let dims = admit(&o, &filter).unwrap();
        assert_eq!(dims.asset_id, "eurusd");
        assert_eq!(dims.timeframe, "1d");
        assert_eq!(dims.label, "eod");

        o.label = None;
        assert_eq!(admit(&o, &filter).unwrap().label, "(null)");

        o.label = Some("intraday".into());
        assert!(admit(&o, &filter).is_none());
    }

    #[test]
    fn empty_asset_is_dropped() {
        let filter = ReportFilter::default().normalized().unwrap();
        let mut o = outcome("o1", "snap", "s1", "", "hit_tp");
        assert!(admit(&o, &filter).is_none());
        o.asset_id = None;
        assert!(admit(&o, &filter).is_none());
    }

    #[test]
    fn missing_timeframe_is_unknown_and_filtered() {
        let filter = ReportFilter::default().normalized().unwrap();
        let mut o = outcome("o1", "snap", "s1", "gold", "hit_tp");
        o.timeframe = None;
        assert!(admit(&o, &filter).is_none());

        let filter = ReportFilter {
            timeframes: vec!["unknown".into()],
            ..Default::default()
        }
        .normalized()
        .unwrap();
        assert_eq!(admit(&o, &filter).unwrap().timeframe, "unknown");
    }

    #[test]
    fn generated_at_has_millis_and_z() {
        let ctx = ctx(ReportFilter::default());
        assert_eq!(ctx.generated_at, "2026-10-01T12:00:00.000Z");
    }
}
