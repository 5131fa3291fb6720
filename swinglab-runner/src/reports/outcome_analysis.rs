//! Swing outcome-analysis report.
//!
//! Groups outcomes by asset, timeframe, label, resolved playbook, decision,
//! grade, and alignment. Also reports which dimensions are populated at all,
//! where each resolved value came from, WATCH segment spread, and level
//! plausibility of the matched setups.
//!
//! Level plausibility counts each matched setup once; WATCH segments are
//! weighted by outcome.
//!
//! `closedCount` here counts every terminal status (TP, SL, expired,
//! ambiguous, invalid), the same as the performance breakdown.

use std::collections::HashSet;

use serde::Serialize;
use swinglab_core::normalize::{join_key, normalize_dimension};
use swinglab_core::{
    classify_decision, Decision, Dimension, DimensionResolver, DimensionSource, DimensionSourceCounts,
    OutcomeStatus, ResolutionDiagnostics, WatchScores,
};
use tracing::info;

use super::markdown::{notes_section, rate, table_header, table_row};
use super::{admit, Report, ReportParams, RunContext, REPORT_VERSION};
use crate::buckets::{AnalysisKey, Buckets, FrequencyList, StatusCounts, FREQUENCY_TOP};
use crate::join::{SetupIndex, SAMPLE_CAP};
use crate::loader::LoadedRecords;
use crate::plausibility::{
    LevelPlausibility, LevelStats, SegmentSummary, UpgradeCandidates, WatchStats,
};
use crate::stats::Kpi;

/// Whether each dimension was seen populated at least once in the window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Availability {
    pub playbook_id: bool,
    pub decision: bool,
    pub grade: bool,
    pub alignment: bool,
    pub reasons: bool,
    pub segments: bool,
    pub outcome_status: bool,
    pub tp_sl: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReasonCount {
    pub reason: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentCount {
    pub segment: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRow {
    pub key: AnalysisKey,
    #[serde(flatten)]
    pub kpi: Kpi,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub top_reasons: Vec<ReasonCount>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub top_segments: Vec<SegmentCount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Samples {
    pub matched_sample_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeAnalysisReport {
    pub version: String,
    pub generated_at: String,
    pub params: ReportParams,
    pub availability: Availability,
    pub overall: Kpi,
    pub by_key: Vec<AnalysisRow>,
    pub notes: Vec<String>,
    pub samples: Samples,
    pub dimension_source_counts: DimensionSourceCounts,
    pub fallback_used_count: u64,
    pub allow_derived_playbook_fallback: bool,
    pub watch_segments: Vec<SegmentSummary>,
    pub watch_upgrade_candidates: UpgradeCandidates,
    pub level_plausibility: LevelPlausibility,
}

#[derive(Debug, Default)]
struct AnalysisAccumulator {
    counts: StatusCounts,
    reasons: FrequencyList,
    segments: FrequencyList,
}

impl Report for OutcomeAnalysisReport {
    const STEM: &'static str = "swing-outcome-analysis";

    fn generated_at(&self) -> &str {
        &self.generated_at
    }

    fn build(records: &LoadedRecords, ctx: &RunContext) -> Self {
        let filter = &ctx.filter;
        let resolver = DimensionResolver::new(filter.allow_derived_playbook_fallback);
        let setups = SetupIndex::build(&records.snapshots);

        let mut diagnostics = ResolutionDiagnostics::default();
        let mut availability = Availability::default();
        let mut buckets: Buckets<AnalysisKey, AnalysisAccumulator> = Buckets::new();
        let mut watch = WatchStats::default();
        let mut levels = LevelStats::default();
        let mut levels_seen: HashSet<String> = HashSet::new();
        let mut matched_sample_ids = Vec::new();
        let mut weekly_outcomes = 0u64;

        for outcome in &records.outcomes {
            let Some(dims) = admit(outcome, filter) else {
                continue;
            };
            let setup = setups.get(outcome);
            let resolved = resolver.resolve_all(setup, outcome, &dims.asset_id, &mut diagnostics);
            let alignment = setup
                .and_then(|s| s.alignment_value())
                .map(normalize_dimension);
            let status = outcome.status();
            if dims.timeframe == "1w" {
                weekly_outcomes += 1;
            }

            // Segment for this row: computed for WATCH setups, else whatever was persisted.
            let mut segment: Option<String> = None;
            if let Some(setup) = setup {
                // One sample per setup, however many outcomes it produced.
                if levels_seen.insert(join_key(&outcome.snapshot_id, &outcome.setup_id)) {
                    levels.record(setup);
                }
                let result = classify_decision(
                    &ctx.policy,
                    resolved.grade.value().map(String::as_str),
                    Some(setup),
                    outcome,
                );
                if result.decision == Decision::Watch {
                    let scores = WatchScores::resolve(setup);
                    let computed = result.watch_segment.unwrap_or_else(|| scores.classify());
                    let candidate = ctx.policy.is_upgrade_candidate(setup, &scores);
                    let recorded = watch.record(setup, computed, &scores, candidate);
                    segment = Some(recorded.as_str().to_string());
                } else {
                    segment = setup.persisted_watch_segment().map(str::to_string);
                }
                if matched_sample_ids.len() < SAMPLE_CAP {
                    matched_sample_ids.push(outcome.outcome_id.clone());
                }
            }

            let key = AnalysisKey {
                asset_id: dims.asset_id,
                timeframe: dims.timeframe,
                label: dims.label,
                playbook_id: normalize_dimension(&resolved.playbook_id.value_or_unknown()),
                decision: normalize_dimension(&resolved.decision.value_or_unknown()),
                grade: normalize_dimension(&resolved.grade.value_or_unknown()),
                alignment: alignment.clone(),
            };
            let acc = buckets.entry(key);
            acc.counts.record(status);

            if let Some(setup) = setup {
                let reasons = setup.reasons();
                if !reasons.is_empty() {
                    availability.reasons = true;
                    for reason in reasons {
                        acc.reasons.record(reason);
                    }
                }
            }
            if let Some(segment) = &segment {
                availability.segments = true;
                acc.segments.record(segment);
            }

            availability.outcome_status |= status != OutcomeStatus::Unknown;
            availability.tp_sl |= matches!(status, OutcomeStatus::Tp | OutcomeStatus::Sl);
            availability.playbook_id |= resolved.playbook_id.source() == DimensionSource::Persisted;
            availability.decision |= resolved.decision.source() == DimensionSource::Persisted;
            availability.grade |= resolved.grade.source() == DimensionSource::Persisted;
            availability.alignment |= alignment.is_some();
        }

        let mut overall_counts = StatusCounts::default();
        let by_key = buckets.finalize(|key, acc| {
            overall_counts.merge(&acc.counts);
            AnalysisRow {
                key,
                kpi: Kpi::from_counts(&acc.counts),
                top_reasons: acc
                    .reasons
                    .top(FREQUENCY_TOP)
                    .into_iter()
                    .map(|(reason, count)| ReasonCount { reason, count })
                    .collect(),
                top_segments: acc
                    .segments
                    .top(FREQUENCY_TOP)
                    .into_iter()
                    .map(|(segment, count)| SegmentCount { segment, count })
                    .collect(),
            }
        });

        let mut notes = Vec::new();
        if filter.accepts_timeframe("1w") && weekly_outcomes == 0 {
            notes.push("Weekly timeframe present but no outcomes in window.".to_string());
        }
        if diagnostics.fallback_used_count > 0 {
            notes.push(format!(
                "Playbook resolver fallback used for {} outcomes (assetId-based).",
                diagnostics.fallback_used_count
            ));
        }
        if !by_key.is_empty() && !availability.tp_sl {
            notes.push("No TP/SL outcomes in window; winrate unavailable.".to_string());
        }

        info!(
            keys = by_key.len(),
            outcomes = overall_counts.total(),
            fallback_used = diagnostics.fallback_used_count,
            "outcome analysis built"
        );

        Self {
            version: REPORT_VERSION.to_string(),
            generated_at: ctx.generated_at.clone(),
            params: ReportParams::new(filter, records),
            availability,
            overall: Kpi::from_counts(&overall_counts),
            by_key,
            notes,
            samples: Samples { matched_sample_ids },
            dimension_source_counts: diagnostics.dimension_source_counts,
            fallback_used_count: diagnostics.fallback_used_count,
            allow_derived_playbook_fallback: filter.allow_derived_playbook_fallback,
            watch_segments: watch.segments(),
            watch_upgrade_candidates: watch.upgrade_candidates(),
            level_plausibility: levels.finish(),
        }
    }

    fn render_markdown(&self) -> String {
        let p = &self.params;
        let o = &self.overall;
        let mut md = format!(
            "# Swing Outcome Analysis (v1)\n\
Generated: {}, days={}, timeframes={}, labels={}, allowDerivedPlaybookFallback={}\n\n\
## Overall\n\
- outcomesTotal: {}\n\
- closed: {} | open: {} | unknown: {}\n\
- tp: {} | sl: {} | expired: {} | ambiguous: {} | invalid: {}\n\
- winrate tp/(tp+sl): {}\n\
- closeRate: {}\n\
- fallbackUsedCount: {}\n\n\
Status Legend: TP, SL, EXPIRED, AMBIGUOUS, INVALID, OPEN, UNKNOWN\n",
            self.generated_at,
            p.days,
            p.timeframes.join(","),
            p.labels.join(","),
            self.allow_derived_playbook_fallback,
            o.outcomes_total,
            o.closed_count,
            o.open_count,
            o.unknown_count,
            o.tp_count,
            o.sl_count,
            o.expired_count,
            o.ambiguous_count,
            o.invalid_count,
            rate(o.winrate_tp_sl),
            rate(o.close_rate),
            self.fallback_used_count,
        );

        let s = &self.dimension_source_counts;
        md.push_str("\n## Dimension Sources\n");
        md.push_str(&table_header(&[
            ("Dimension", false),
            ("Persisted", true),
            ("Derived", true),
            ("Missing", true),
        ]));
        for dimension in Dimension::ALL {
            let tally = s.tally(dimension);
            md.push_str(&table_row(&[
                dimension.as_str().to_string(),
                tally.persisted.to_string(),
                tally.derived.to_string(),
                tally.missing.to_string(),
            ]));
        }

        md.push_str("\n## By Asset/Timeframe/Label/Decision\n");
        md.push_str(&table_header(&[
            ("Asset", false),
            ("TF", false),
            ("Label", false),
            ("Playbook", false),
            ("Decision", false),
            ("Grade", false),
            ("Alignment", false),
            ("Outcomes", true),
            ("TP", true),
            ("SL", true),
            ("Winrate tp/(tp+sl)", true),
            ("CloseRate", true),
        ]));
        for row in &self.by_key {
            let k = &row.key;
            md.push_str(&table_row(&[
                k.asset_id.clone(),
                k.timeframe.clone(),
                k.label.clone(),
                k.playbook_id.clone(),
                k.decision.clone(),
                k.grade.clone(),
                k.alignment.clone().unwrap_or_else(|| "-".to_string()),
                row.kpi.outcomes_total.to_string(),
                row.kpi.tp_count.to_string(),
                row.kpi.sl_count.to_string(),
                rate(row.kpi.winrate_tp_sl),
                rate(row.kpi.close_rate),
            ]));
        }

        if !self.watch_segments.is_empty() {
            md.push_str("\n## Watch Segments\n");
            md.push_str(&table_header(&[
                ("Segment", false),
                ("Count", true),
                ("Pct", true),
                ("Avg Bias", true),
                ("Avg Trend", true),
                ("Avg SQ", true),
                ("Avg Conf", true),
            ]));
            for seg in &self.watch_segments {
                md.push_str(&table_row(&[
                    seg.segment.to_string(),
                    seg.count.to_string(),
                    rate(Some(seg.pct)),
                    rate(seg.avg_bias),
                    rate(seg.avg_trend),
                    rate(seg.avg_signal_quality),
                    rate(seg.avg_confidence),
                ]));
            }
            let u = &self.watch_upgrade_candidates;
            md.push_str(&format!(
                "\nUpgrade candidates: {} of {} WATCH_FAILS_TREND ({})\n",
                u.candidates_count,
                u.total_watch_fails_trend,
                rate(u.candidates_pct_of_watch_fails_trend),
            ));
        }

        let l = &self.level_plausibility;
        md.push_str(&format!(
            "\n## Level Plausibility\n\
- count: {} | parseErrors: {}\n\
- stop %: avg {} | p50 {} | p90 {}\n\
- target %: avg {} | p50 {} | p90 {}\n\
- avgRRR: {}\n\
- RRR buckets: <1={} | 1-1.5={} | 1.5-2={} | 2-3={} | >=3={}\n",
            l.count,
            l.parse_errors,
            rate(l.avg_stop_pct),
            rate(l.p50_stop_pct),
            rate(l.p90_stop_pct),
            rate(l.avg_target_pct),
            rate(l.p50_target_pct),
            rate(l.p90_target_pct),
            rate(l.avg_rrr),
            l.rrr_buckets.below_1,
            l.rrr_buckets.from_1_to_1_5,
            l.rrr_buckets.from_1_5_to_2,
            l.rrr_buckets.from_2_to_3,
            l.rrr_buckets.at_least_3,
        ));

        md.push_str(&notes_section("Notes", &self.notes));
        md
    }
}
