//! SwingLab Runner — record loading, aggregation, and report publishing.
//!
//! This crate builds on `swinglab-core` to provide:
//! - Record stores (JSON export directory, HTTP export API, in-memory)
//! - Windowed loading with a deterministic dataset fingerprint
//! - Snapshot-item join matching and setup lookup
//! - Bucket aggregation, KPIs, flags, and insight selection
//! - Level plausibility and WATCH segment statistics
//! - The join-stats, outcome-analysis, and performance-breakdown reports
//! - Versioned artifact publishing with `-latest` aliases

pub mod artifacts;
pub mod buckets;
pub mod config;
pub mod insights;
pub mod join;
pub mod loader;
pub mod plausibility;
pub mod reports;
pub mod stats;

pub use artifacts::{ArtifactManager, ArtifactPaths};
pub use buckets::{AnalysisKey, BreakdownKey, BucketKey, Buckets, JoinKey, StatusCounts};
pub use config::{ConfigError, ReportFilter, StoreConfig, StoreKind, SwingLabConfig};
pub use insights::Insights;
pub use join::{JoinIndex, JoinTally, OutcomeSample, SetupIndex};
pub use loader::{
    load_window, HttpStore, JsonExportStore, LoadError, LoadedRecords, MemoryStore, RecordStore,
};
pub use plausibility::{LevelPlausibility, SegmentSummary, UpgradeCandidates};
pub use reports::{
    generate, JoinStatsReport, OutcomeAnalysisReport, PerformanceBreakdownReport, Report,
    ReportError, ReportParams, RunContext, REPORT_VERSION,
};
pub use stats::{Flag, FlagRules, Kpi, WinrateDefinition};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn loaded_records_is_send_sync() {
        assert_send::<LoadedRecords>();
        assert_sync::<LoadedRecords>();
    }

    #[test]
    fn stores_are_send_sync() {
        assert_send::<MemoryStore>();
        assert_sync::<MemoryStore>();
        assert_send::<JsonExportStore>();
        assert_sync::<JsonExportStore>();
        assert_send::<HttpStore>();
        assert_sync::<HttpStore>();
    }

    #[test]
    fn run_context_is_send_sync() {
        assert_send::<RunContext>();
        assert_sync::<RunContext>();
    }

    #[test]
    fn reports_are_send_sync() {
        assert_send::<JoinStatsReport>();
        assert_sync::<JoinStatsReport>();
        assert_send::<OutcomeAnalysisReport>();
        assert_sync::<OutcomeAnalysisReport>();
        assert_send::<PerformanceBreakdownReport>();
        assert_sync::<PerformanceBreakdownReport>();
    }

    #[test]
    fn kpi_is_send_sync() {
        assert_send::<Kpi>();
        assert_sync::<Kpi>();
    }

    #[test]
    fn errors_are_send_sync() {
        assert_send::<LoadError>();
        assert_sync::<LoadError>();
        assert_send::<ReportError>();
        assert_sync::<ReportError>();
    }
}
