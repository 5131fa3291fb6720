//! SwingLab Core — domain types and the pure classification layer.
//!
//! This crate contains everything that can be decided from a single record:
//! - Domain types (snapshots, setups, outcomes, outcome status)
//! - Normalization of labels, timeframes, and asset identifiers
//! - Dimension resolution (persisted → derived → missing) with diagnostics
//! - Decision policy and the TRADE/WATCH/BLOCKED classifier
//! - WATCH segment sub-classification and upgrade candidates
//! - Trade level parsing for risk/reward plausibility
//!
//! Nothing here performs IO. The runner crate owns loading, aggregation,
//! and report publishing.

pub mod decision;
pub mod domain;
pub mod levels;
pub mod normalize;
pub mod resolver;
pub mod watch_segment;

pub use decision::{classify_decision, Decision, DecisionCategory, DecisionPolicy, DecisionResult};
pub use domain::{Outcome, OutcomeStatus, Setup, Snapshot, SnapshotItem};
pub use levels::{LevelParseError, LevelValue, RrrBucket, TradeLevels};
pub use resolver::{
    Dimension, DimensionResolver, DimensionSource, DimensionSourceCounts, Resolved,
    ResolutionDiagnostics, ResolvedDimensions,
};
pub use watch_segment::{WatchScores, WatchSegment};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: domain and classifier types can cross the loader's
    /// worker threads.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<Setup>();
        require_sync::<Setup>();
        require_send::<Outcome>();
        require_sync::<Outcome>();
        require_send::<Snapshot>();
        require_sync::<Snapshot>();
        require_send::<SnapshotItem>();
        require_sync::<SnapshotItem>();
        require_send::<DecisionPolicy>();
        require_sync::<DecisionPolicy>();
        require_send::<DimensionResolver>();
        require_sync::<DimensionResolver>();
    }
}
