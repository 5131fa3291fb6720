//! Dimension Resolver — playbook / decision / grade per outcome.
//!
//! Precedence is strict and identical for every report:
//! 1. **Persisted**: present on the matched setup, else on the outcome row.
//! 2. **Derived** (playbook only, opt-in): asset-keyed fallback table, used only
//!    when the persisted value is absent, `"unknown"`, or the generic placeholder.
//! 3. **Missing**: defaults to `"unknown"`.
//!
//! Every resolution is tallied into [`ResolutionDiagnostics`], which the caller
//! owns and threads through the pipeline explicitly.

use serde::{Deserialize, Serialize};

use crate::domain::{Outcome, Setup};
use crate::normalize::UNKNOWN;

/// Placeholder playbook written by engines that could not pick a real one.
pub const GENERIC_PLAYBOOK_PLACEHOLDER: &str = "generic-swing-v0.1";

/// Result of resolving one dimension, tagged with where the value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved<T> {
    Persisted(T),
    Derived(T),
    Missing,
}

impl<T> Resolved<T> {
    pub fn source(&self) -> DimensionSource {
        match self {
            Resolved::Persisted(_) => DimensionSource::Persisted,
            Resolved::Derived(_) => DimensionSource::Derived,
            Resolved::Missing => DimensionSource::Missing,
        }
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Resolved::Persisted(v) | Resolved::Derived(v) => Some(v),
            Resolved::Missing => None,
        }
    }
}

impl Resolved<String> {
    /// The resolved value, or `"unknown"` for `Missing`.
    pub fn value_or_unknown(&self) -> String {
        self.value().cloned().unwrap_or_else(|| UNKNOWN.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DimensionSource {
    Persisted,
    Derived,
    Missing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Dimension {
    PlaybookId,
    Decision,
    Grade,
}

impl Dimension {
    pub const ALL: [Dimension; 3] = [Dimension::PlaybookId, Dimension::Decision, Dimension::Grade];

    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::PlaybookId => "playbookId",
            Dimension::Decision => "decision",
            Dimension::Grade => "grade",
        }
    }
}

/// Per-source counter for one dimension.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceTally {
    pub persisted: u64,
    pub derived: u64,
    pub missing: u64,
}

impl SourceTally {
    fn increment(&mut self, source: DimensionSource) {
        match source {
            DimensionSource::Persisted => self.persisted += 1,
            DimensionSource::Derived => self.derived += 1,
            DimensionSource::Missing => self.missing += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.persisted + self.derived + self.missing
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionSourceCounts {
    pub playbook_id: SourceTally,
    pub decision: SourceTally,
    pub grade: SourceTally,
}

impl DimensionSourceCounts {
    pub fn tally(&self, dimension: Dimension) -> &SourceTally {
        match dimension {
            Dimension::PlaybookId => &self.playbook_id,
            Dimension::Decision => &self.decision,
            Dimension::Grade => &self.grade,
        }
    }

    fn tally_mut(&mut self, dimension: Dimension) -> &mut SourceTally {
        match dimension {
            Dimension::PlaybookId => &mut self.playbook_id,
            Dimension::Decision => &mut self.decision,
            Dimension::Grade => &mut self.grade,
        }
    }
}

/// Diagnostics accumulated across all resolutions of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionDiagnostics {
    pub dimension_source_counts: DimensionSourceCounts,
    pub fallback_used_count: u64,
}

impl ResolutionDiagnostics {
    pub fn record(&mut self, dimension: Dimension, source: DimensionSource) {
        self.dimension_source_counts
            .tally_mut(dimension)
            .increment(source);
        if source == DimensionSource::Derived {
            self.fallback_used_count += 1;
        }
    }
}

/// All three dimensions for one outcome, with their source tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDimensions {
    pub playbook_id: Resolved<String>,
    pub decision: Resolved<String>,
    pub grade: Resolved<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DimensionResolver {
    allow_derived_playbook_fallback: bool,
}

impl DimensionResolver {
    pub fn new(allow_derived_playbook_fallback: bool) -> Self {
        Self {
            allow_derived_playbook_fallback,
        }
    }

    /// Resolve the playbook. `asset_id` must already be normalized.
    pub fn resolve_playbook(
        &self,
        setup: Option<&Setup>,
        outcome: &Outcome,
        asset_id: &str,
    ) -> Resolved<String> {
        let persisted = setup
            .and_then(Setup::persisted_playbook)
            .or_else(|| outcome.persisted_playbook());

        let is_placeholder = persisted.map_or(true, |p| {
            let p = p.to_lowercase();
            p == UNKNOWN || p == GENERIC_PLAYBOOK_PLACEHOLDER
        });

        if self.allow_derived_playbook_fallback && is_placeholder {
            if let Some(derived) = fallback_playbook_id(asset_id) {
                return Resolved::Derived(derived.to_string());
            }
        }

        match persisted {
            Some(p) => Resolved::Persisted(p.to_string()),
            None => Resolved::Missing,
        }
    }

    pub fn resolve_decision(&self, setup: Option<&Setup>, outcome: &Outcome) -> Resolved<String> {
        setup
            .and_then(Setup::persisted_decision)
            .or_else(|| outcome.persisted_decision())
            .map_or(Resolved::Missing, |d| Resolved::Persisted(d.to_string()))
    }

    pub fn resolve_grade(&self, setup: Option<&Setup>, outcome: &Outcome) -> Resolved<String> {
        setup
            .and_then(Setup::persisted_grade)
            .or_else(|| outcome.persisted_grade())
            .map_or(Resolved::Missing, |g| Resolved::Persisted(g.to_string()))
    }

    /// Resolve all three dimensions and record their sources.
    pub fn resolve_all(
        &self,
        setup: Option<&Setup>,
        outcome: &Outcome,
        asset_id: &str,
        diagnostics: &mut ResolutionDiagnostics,
    ) -> ResolvedDimensions {
        let playbook_id = self.resolve_playbook(setup, outcome, asset_id);
        let decision = self.resolve_decision(setup, outcome);
        let grade = self.resolve_grade(setup, outcome);

        diagnostics.record(Dimension::PlaybookId, playbook_id.source());
        diagnostics.record(Dimension::Decision, decision.source());
        diagnostics.record(Dimension::Grade, grade.source());

        ResolvedDimensions {
            playbook_id,
            decision,
            grade,
        }
    }
}

/// Static asset → playbook table used by the derived tier.
pub fn fallback_playbook_id(asset_id: &str) -> Option<&'static str> {
    let id = asset_id.to_lowercase();
    let playbook = match id.as_str() {
        "wti" => "energy-swing-v0.1",
        "silver" => "metals-swing-v0.1",
        "spx" => "spx-swing-v0.1",
        "dax" => "dax-swing-v0.1",
        "ndx" => "ndx-swing-v0.1",
        "dow" => "dow-swing-v0.1",
        "gold" => "gold-swing-v0.2",
        "btc" | "eth" => "crypto-swing-v0.1",
        "eurusd" => "eurusd-swing-v0.1",
        "gbpusd" => "gbpusd-swing-v0.1",
        "usdjpy" => "usdjpy-swing-v0.1",
        "eurjpy" => "eurjpy-swing-v0.1",
        "fx" => "fx-swing-v0.1",
        other if other.ends_with("usd") || other.ends_with("jpy") => "fx-swing-v0.1",
        _ => return None,
    };
    Some(playbook)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(asset: &str) -> Outcome {
        Outcome {
            outcome_id: "o1".into(),
            snapshot_id: "snap".into(),
            setup_id: "s1".into(),
            asset_id: Some(asset.into()),
            timeframe: Some("1d".into()),
            evaluation_timeframe: None,
            outcome_status: Some("hit_tp".into()),
            evaluated_at: None,
            playbook_id: None,
            decision: None,
            grade: None,
            setup_grade: None,
            setup_type: None,
            no_trade_reason: None,
            grade_rationale: None,
            label: Some("eod".into()),
        }
    }

    #[test]
    fn wti_derives_energy_playbook_when_allowed() {
        let resolver = DimensionResolver::new(true);
        let mut diag = ResolutionDiagnostics::default();
        let dims = resolver.resolve_all(None, &outcome("wti"), "wti", &mut diag);
        assert_eq!(
            dims.playbook_id,
            Resolved::Derived("energy-swing-v0.1".to_string())
        );
        assert_eq!(diag.fallback_used_count, 1);
        assert_eq!(diag.dimension_source_counts.playbook_id.derived, 1);
    }

    #[test]
    fn fallback_disabled_never_derives() {
        let resolver = DimensionResolver::new(false);
        let mut diag = ResolutionDiagnostics::default();
        let dims = resolver.resolve_all(None, &outcome("wti"), "wti", &mut diag);
        assert_eq!(dims.playbook_id, Resolved::Missing);
        assert_eq!(dims.playbook_id.value_or_unknown(), "unknown");
        assert_eq!(diag.fallback_used_count, 0);
        assert_eq!(diag.dimension_source_counts.playbook_id.missing, 1);
    }

    #[test]
    fn setup_value_wins_over_outcome_value() {
        let resolver = DimensionResolver::new(true);
        let setup = Setup {
            playbook_id: Some("gold-swing-v0.2".into()),
            grade: Some("A".into()),
            ..Default::default()
        };
        let mut row = outcome("gold");
        row.playbook_id = Some("outcome-playbook".into());
        row.grade = Some("B".into());
        assert_eq!(
            resolver.resolve_playbook(Some(&setup), &row, "gold"),
            Resolved::Persisted("gold-swing-v0.2".to_string())
        );
        assert_eq!(
            resolver.resolve_grade(Some(&setup), &row),
            Resolved::Persisted("A".to_string())
        );
    }

    #[test]
    fn outcome_value_used_when_setup_has_none() {
        let resolver = DimensionResolver::new(false);
        let mut row = outcome("spx");
        row.decision = Some("WATCH".into());
        assert_eq!(
            resolver.resolve_decision(Some(&Setup::default()), &row),
            Resolved::Persisted("WATCH".to_string())
        );
    }

    #[test]
    fn generic_placeholder_is_replaced_only_when_allowed() {
        let mut row = outcome("gold");
        row.playbook_id = Some("generic-swing-v0.1".into());

        let strict = DimensionResolver::new(false);
        assert_eq!(
            strict.resolve_playbook(None, &row, "gold"),
            Resolved::Persisted("generic-swing-v0.1".to_string())
        );

        let lenient = DimensionResolver::new(true);
        assert_eq!(
            lenient.resolve_playbook(None, &row, "gold"),
            Resolved::Derived("gold-swing-v0.2".to_string())
        );
    }

    #[test]
    fn placeholder_without_table_entry_stays_persisted() {
        let mut row = outcome("corn");
        row.playbook_id = Some("generic-swing-v0.1".into());
        let resolver = DimensionResolver::new(true);
        assert_eq!(
            resolver.resolve_playbook(None, &row, "corn"),
            Resolved::Persisted("generic-swing-v0.1".to_string())
        );
        assert_eq!(resolver.resolve_playbook(None, &outcome("corn"), "corn"), Resolved::Missing);
    }

    #[test]
    fn fallback_table_entries() {
        assert_eq!(fallback_playbook_id("gold"), Some("gold-swing-v0.2"));
        assert_eq!(fallback_playbook_id("ETH"), Some("crypto-swing-v0.1"));
        assert_eq!(fallback_playbook_id("audusd"), Some("fx-swing-v0.1"));
        assert_eq!(fallback_playbook_id("chfjpy"), Some("fx-swing-v0.1"));
        assert_eq!(fallback_playbook_id("eurusd"), Some("eurusd-swing-v0.1"));
        assert_eq!(fallback_playbook_id("corn"), None);
    }

    #[test]
    fn decision_and_grade_never_derive() {
        let resolver = DimensionResolver::new(true);
        let mut diag = ResolutionDiagnostics::default();
        let dims = resolver.resolve_all(None, &outcome("btc"), "btc", &mut diag);
        assert_eq!(dims.decision, Resolved::Missing);
        assert_eq!(dims.grade, Resolved::Missing);
        assert_eq!(diag.dimension_source_counts.decision.derived, 0);
        assert_eq!(diag.dimension_source_counts.grade.derived, 0);
    }
}
