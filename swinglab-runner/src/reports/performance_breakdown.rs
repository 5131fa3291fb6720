//! Swing performance-breakdown report.
//!
//! Buckets by asset, timeframe, label, playbook, grade, and decision bucket,
//! flags thin or mostly-open buckets, and ranks them into insight lists.

use serde::Serialize;
use swinglab_core::normalize::normalize_dimension;
use swinglab_core::{classify_decision, DimensionResolver, DimensionSourceCounts, ResolutionDiagnostics};
use tracing::info;

use super::markdown::{rate, table_header, table_row};
use super::{admit, Report, ReportParams, RunContext, REPORT_VERSION};
use crate::buckets::{BreakdownKey, Buckets, StatusCounts};
use crate::insights;
use crate::join::SetupIndex;
use crate::loader::LoadedRecords;
use crate::stats::{Flag, FlagRules, Kpi};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakdownBucket {
    pub key: BreakdownKey,
    #[serde(flatten)]
    pub kpi: Kpi,
    pub flags: Vec<Flag>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakdownInsights {
    pub top_winrate: Vec<BreakdownBucket>,
    pub bottom_winrate: Vec<BreakdownBucket>,
    pub open_heavy: Vec<BreakdownBucket>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceBreakdownReport {
    pub version: String,
    pub generated_at: String,
    pub params: ReportParams,
    pub totals: Kpi,
    pub buckets: Vec<BreakdownBucket>,
    pub insights: BreakdownInsights,
    pub dimension_source_counts: DimensionSourceCounts,
    pub fallback_used_count: u64,
    pub notes: Vec<String>,
}

/// Decision bucket from persisted signals alone: the setup type, else a
/// non-empty no-trade reason. `None` when neither says anything.
pub fn decision_bucket_from_persisted(
    setup_type: Option<&str>,
    no_trade_reason: Option<&str>,
) -> Option<&'static str> {
    let bucket = match setup_type.map(str::to_uppercase).as_deref() {
        Some("TRADE" | "TRADE_A" | "TRADE_B") => "TRADE",
        Some("BLOCKED") => "BLOCKED",
        Some("WATCH" | "WATCH_PLUS" | "WATCH+") => "WATCH",
        Some("NO_TRADE") => "NO_TRADE",
        _ if no_trade_reason.is_some() => "NO_TRADE",
        _ => return None,
    };
    Some(bucket)
}

impl Report for PerformanceBreakdownReport {
    const STEM: &'static str = "swing-performance-breakdown";

    fn generated_at(&self) -> &str {
        &self.generated_at
    }

    fn build(records: &LoadedRecords, ctx: &RunContext) -> Self {
        let filter = &ctx.filter;
        let resolver = DimensionResolver::new(filter.allow_derived_playbook_fallback);
        let setups = SetupIndex::build(&records.snapshots);
        let rules = FlagRules {
            min_closed: filter.min_closed,
            include_open_only: filter.include_open_only,
        };

        let mut diagnostics = ResolutionDiagnostics::default();
        let mut buckets: Buckets<BreakdownKey, StatusCounts> = Buckets::new();
        let mut classified = 0u64;

        for outcome in &records.outcomes {
            let Some(dims) = admit(outcome, filter) else {
                continue;
            };
            let setup = setups.get(outcome);
            let resolved = resolver.resolve_all(setup, outcome, &dims.asset_id, &mut diagnostics);

            let setup_type = outcome
                .setup_type()
                .or_else(|| setup.and_then(|s| s.setup_type.as_deref()));
            let no_trade_reason = outcome
                .no_trade_reason()
                .or_else(|| setup.and_then(|s| s.no_trade_reason()));
            let decision_bucket = match decision_bucket_from_persisted(setup_type, no_trade_reason) {
                Some(bucket) => bucket,
                None => {
                    classified += 1;
                    classify_decision(
                        &ctx.policy,
                        resolved.grade.value().map(String::as_str),
                        setup,
                        outcome,
                    )
                    .decision
                    .as_str()
                }
            };

            let key = BreakdownKey {
                asset_id: dims.asset_id,
                timeframe: dims.timeframe,
                label: dims.label,
                playbook_id: normalize_dimension(&resolved.playbook_id.value_or_unknown()),
                grade: normalize_dimension(&resolved.grade.value_or_unknown()),
                decision_bucket: decision_bucket.to_string(),
            };
            buckets.entry(key).record(outcome.status());
        }

        let mut totals = StatusCounts::default();
        let finalized = buckets.finalize(|key, counts| {
            totals.merge(&counts);
            let kpi = Kpi::from_counts(&counts);
            let flags = rules.evaluate(&kpi);
            BreakdownBucket { key, kpi, flags }
        });

        let ranked = insights::select(&finalized, filter.min_closed, |b| &b.kpi);

        let mut buckets = finalized;
        buckets.sort_by(|a, b| b.kpi.outcomes_total.cmp(&a.kpi.outcomes_total));

        info!(
            buckets = buckets.len(),
            outcomes = totals.total(),
            classified,
            "performance breakdown built"
        );

        let mut params = ReportParams::new(filter, records);
        params.min_closed = Some(filter.min_closed);
        params.include_open_only = Some(filter.include_open_only);

        Self {
            version: REPORT_VERSION.to_string(),
            generated_at: ctx.generated_at.clone(),
            params,
            totals: Kpi::from_counts(&totals),
            buckets,
            insights: BreakdownInsights {
                top_winrate: ranked.top_winrate,
                bottom_winrate: ranked.bottom_winrate,
                open_heavy: ranked.open_heavy,
            },
            dimension_source_counts: diagnostics.dimension_source_counts,
            fallback_used_count: diagnostics.fallback_used_count,
            notes: vec![
                "Winrate = tp/(tp+sl) if tp+sl>0 else null".to_string(),
                "Closed = TP+SL+Expired+Ambiguous+Invalid".to_string(),
                "Open = OPEN; UNKNOWN counted separately".to_string(),
                format!(
                    "Flags: low-sample when closed < {}{}; mostly-open when closeRate < 0.2",
                    filter.min_closed,
                    if filter.include_open_only { " (suppressed by includeOpenOnly)" } else { "" }
                ),
            ],
        }
    }

    fn render_markdown(&self) -> String {
        let p = &self.params;
        let t = &self.totals;
        let mut md = format!(
            "# Swing Performance Breakdown (v1)\n\
Generated: {}, days={}, minClosed={}, tf={}, labels={}\n\n\
## Totals\n\
- outcomes: {}\n\
- closed: {} | open: {} | unknown: {}\n\
- tp: {} | sl: {} | expired: {} | ambiguous: {} | invalid: {}\n\
- winrate tp/(tp+sl): {} | closeRate: {}\n",
            self.generated_at,
            p.days,
            p.min_closed.unwrap_or_default(),
            p.timeframes.join(","),
            p.labels.join(","),
            t.outcomes_total,
            t.closed_count,
            t.open_count,
            t.unknown_count,
            t.tp_count,
            t.sl_count,
            t.expired_count,
            t.ambiguous_count,
            t.invalid_count,
            rate(t.winrate_tp_sl),
            rate(t.close_rate),
        );

        md.push_str("\n## Top Winrate (minClosed)\n");
        push_winrate_table(&mut md, &self.insights.top_winrate);
        md.push_str("\n## Bottom Winrate (minClosed)\n");
        push_winrate_table(&mut md, &self.insights.bottom_winrate);

        md.push_str("\n## Most Open-Heavy (closeRate ascending, outcomes>=10)\n");
        md.push_str(&table_header(&[
            ("Asset", false),
            ("TF", false),
            ("Label", false),
            ("Playbook", false),
            ("Decision", false),
            ("Grade", false),
            ("Outcomes", true),
            ("Closed", true),
            ("Open", true),
            ("Winrate tp/(tp+sl)", true),
            ("CloseRate", true),
        ]));
        for b in &self.insights.open_heavy {
            let mut cells = key_cells(&b.key);
            cells.extend([
                b.kpi.outcomes_total.to_string(),
                b.kpi.closed_count.to_string(),
                b.kpi.open_count.to_string(),
                rate(b.kpi.winrate_tp_sl),
                rate(b.kpi.close_rate),
            ]);
            md.push_str(&table_row(&cells));
        }

        md.push_str("\nNotes:\n");
        for note in &self.notes {
            md.push_str(&format!("- {note}\n"));
        }
        md
    }
}

fn key_cells(key: &BreakdownKey) -> Vec<String> {
    vec![
        key.asset_id.clone(),
        key.timeframe.clone(),
        key.label.clone(),
        key.playbook_id.clone(),
        key.decision_bucket.clone(),
        key.grade.clone(),
    ]
}

fn push_winrate_table(md: &mut String, buckets: &[BreakdownBucket]) {
    md.push_str(&table_header(&[
        ("Asset", false),
        ("TF", false),
        ("Label", false),
        ("Playbook", false),
        ("Decision", false),
        ("Grade", false),
        ("Outcomes", true),
        ("Closed", true),
        ("TP", true),
        ("SL", true),
        ("Winrate tp/(tp+sl)", true),
        ("CloseRate", true),
        ("Flags", false),
    ]));
    for b in buckets {
        let mut cells = key_cells(&b.key);
        cells.extend([
            b.kpi.outcomes_total.to_string(),
            b.kpi.closed_count.to_string(),
            b.kpi.tp_count.to_string(),
            b.kpi.sl_count.to_string(),
            rate(b.kpi.winrate_tp_sl),
            rate(b.kpi.close_rate),
            b.flags
                .iter()
                .map(Flag::as_str)
                .collect::<Vec<_>>()
                .join(","),
        ]);
        md.push_str(&table_row(&cells));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReportFilter;
    use crate::reports::fixtures::*;
    use swinglab_core::Outcome;

    fn graded(id: &str, asset: &str, status: &str, setup_type: &str) -> Outcome {
        let mut o = outcome(id, "snap", id, asset, status);
        o.setup_type = Some(setup_type.into());
        o.setup_grade = Some("A".into());
        o.playbook_id = Some("gold-swing-v0.2".into());
        o
    }

    fn filter(min_closed: u64) -> ReportFilter {
        ReportFilter {
            min_closed,
            ..Default::default()
        }
    }

    #[test]
    fn decision_bucket_mapping() {
        assert_eq!(decision_bucket_from_persisted(Some("trade_a"), None), Some("TRADE"));
        assert_eq!(decision_bucket_from_persisted(Some("WATCH+"), None), Some("WATCH"));
        assert_eq!(decision_bucket_from_persisted(Some("blocked"), None), Some("BLOCKED"));
        assert_eq!(decision_bucket_from_persisted(None, Some("stale")), Some("NO_TRADE"));
        assert_eq!(decision_bucket_from_persisted(Some("other"), None), None);
        assert_eq!(decision_bucket_from_persisted(None, None), None);
    }

    #[test]
    fn tp3_sl2_bucket_flags_follow_min_closed() {
        let outcomes: Vec<_> = ["hit_tp", "hit_tp", "hit_tp", "hit_sl", "hit_sl"]
            .iter()
            .enumerate()
            .map(|(i, s)| graded(&format!("o{i}"), "gold", s, "TRADE"))
            .collect();
        let recs = records(vec![], outcomes, vec![]);

        let report = PerformanceBreakdownReport::build(&recs, &ctx(filter(5)));
        assert_eq!(report.buckets.len(), 1);
        let b = &report.buckets[0];
        assert_eq!(b.kpi.winrate, Some(0.6));
        assert_eq!(b.kpi.close_rate, Some(1.0));
        assert!(b.flags.is_empty());
        assert_eq!(b.key.decision_bucket, "TRADE");
        assert_eq!(b.key.grade, "a");
        assert_eq!(report.insights.top_winrate.len(), 1);

        let report = PerformanceBreakdownReport::build(&recs, &ctx(filter(20)));
        assert_eq!(report.buckets[0].flags, vec![Flag::LowSample]);
        assert!(report.insights.top_winrate.is_empty());
    }

    #[test]
    fn thirty_outcomes_twenty_five_closed() {
        let mut outcomes = Vec::new();
        for i in 0..30 {
            let status = if i < 25 { "expired" } else { "open" };
            outcomes.push(graded(&format!("o{i}"), "wti", status, "WATCH"));
        }
        let report = PerformanceBreakdownReport::build(&records(vec![], outcomes, vec![]), &ctx(filter(20)));
        let b = &report.buckets[0];
        assert_eq!(b.kpi.close_rate, Some(0.8333));
        assert!(!b.flags.contains(&Flag::MostlyOpen));
        assert_eq!(report.insights.open_heavy.len(), 1);
    }

    #[test]
    fn unknown_setup_type_goes_through_classifier() {
        let mut o = outcome("o1", "snap", "s1", "gold", "open");
        o.grade = Some("B".into());
        let mut unexplained = outcome("o2", "snap", "s2", "gold", "open");
        unexplained.setup_type = Some("mystery".into());

        let report = PerformanceBreakdownReport::build(&records(vec![], vec![o, unexplained], vec![]), &ctx(filter(20)));
        let buckets: Vec<_> = report
            .buckets
            .iter()
            .map(|b| b.key.decision_bucket.as_str())
            .collect();
        assert!(buckets.contains(&"TRADE"));
        assert!(buckets.contains(&"BLOCKED"));
    }

    #[test]
    fn buckets_sorted_by_outcome_count() {
        let mut outcomes = vec![graded("o1", "btc", "hit_tp", "TRADE")];
        for i in 0..3 {
            outcomes.push(graded(&format!("g{i}"), "gold", "hit_sl", "TRADE"));
        }
        let report = PerformanceBreakdownReport::build(&records(vec![], outcomes, vec![]), &ctx(filter(1)));
        assert_eq!(report.buckets[0].key.asset_id, "gold");
        assert_eq!(report.buckets[1].key.asset_id, "btc");
        let sum: u64 = report.buckets.iter().map(|b| b.kpi.outcomes_total).sum();
        assert_eq!(sum, report.totals.outcomes_total);
    }

    #[test]
    fn json_and_markdown_shape() {
        let report = PerformanceBreakdownReport::build(
            &records(vec![], vec![graded("o1", "gold", "hit_tp", "TRADE")], vec![]),
            &ctx(filter(20)),
        );
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["totals"]["statusCounts"]["TP"], 1);
        assert_eq!(json["buckets"][0]["flags"][0], "low-sample");
        assert_eq!(json["buckets"][0]["key"]["decisionBucket"], "TRADE");
        assert_eq!(json["params"]["minClosed"], 20);
        assert!(json["insights"]["topWinrate"].as_array().unwrap().is_empty());

        let md = report.render_markdown();
        assert!(md.starts_with("# Swing Performance Breakdown (v1)"));
        assert!(md.contains("minClosed=20"));
        assert!(md.contains("Notes:\n- Winrate = tp/(tp+sl) if tp+sl>0 else null"));
    }
}
