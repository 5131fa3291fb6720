//! Join-stats report — how many outcomes can be traced back to a snapshot item.

use std::collections::HashSet;

use serde::Serialize;
use swinglab_core::normalize::{normalize_asset, normalize_label, normalize_timeframe};
use tracing::info;

use super::markdown::{rate, table_header, table_row};
use super::{admit, Report, ReportParams, RunContext, REPORT_VERSION};
use crate::buckets::{Buckets, JoinKey};
use crate::join::{JoinIndex, JoinSamples, JoinTally, OutcomeSample};
use crate::loader::LoadedRecords;
use crate::stats::join_rate;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinStatsRow {
    pub key: JoinKey,
    pub setups_total: u64,
    /// Distinct snapshots contributing setups to this key.
    pub snapshots_total: u64,
    pub outcomes_total: u64,
    pub matched_outcomes: u64,
    pub unmatched_outcomes: u64,
    pub join_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinStatsOverall {
    pub setups_total: u64,
    pub outcomes_total: u64,
    pub matched_outcomes: u64,
    pub unmatched_outcomes: u64,
    pub join_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinStatsReport {
    pub version: String,
    pub generated_at: String,
    pub params: ReportParams,
    pub overall: JoinStatsOverall,
    pub by_key: Vec<JoinStatsRow>,
    pub unmatched_samples: Vec<OutcomeSample>,
    pub matched_sample_ids: Vec<String>,
}

#[derive(Debug, Default)]
struct JoinAccumulator {
    setups: u64,
    snapshots: HashSet<String>,
    tally: JoinTally,
}

impl Report for JoinStatsReport {
    const STEM: &'static str = "join-stats";

    fn generated_at(&self) -> &str {
        &self.generated_at
    }

    fn build(records: &LoadedRecords, ctx: &RunContext) -> Self {
        let filter = &ctx.filter;
        let mut buckets: Buckets<JoinKey, JoinAccumulator> = Buckets::new();

        // Setups side: every in-window setup that passes the filters.
        for snapshot in &records.snapshots {
            let label = normalize_label(snapshot.label.as_deref());
            if !filter.accepts_label(&label) {
                continue;
            }
            for setup in &snapshot.setups {
                let Some(asset_id) = normalize_asset(setup.asset()) else {
                    continue;
                };
                let timeframe = normalize_timeframe(setup.timeframe_raw());
                if !filter.accepts_asset(&asset_id) || !filter.accepts_timeframe(&timeframe) {
                    continue;
                }
                let acc = buckets.entry(JoinKey {
                    asset_id,
                    timeframe,
                    label: label.clone(),
                });
                acc.setups += 1;
                acc.snapshots.insert(snapshot.id.clone());
            }
        }

        // Outcomes side: matched iff a snapshot item exists for the pair.
        let index = JoinIndex::from_items(&records.snapshot_items);
        let mut samples = JoinSamples::default();
        for outcome in &records.outcomes {
            let Some(dims) = admit(outcome, filter) else {
                continue;
            };
            let matched = index.contains(outcome);
            buckets
                .entry(JoinKey {
                    asset_id: dims.asset_id,
                    timeframe: dims.timeframe,
                    label: dims.label,
                })
                .tally
                .record(matched);
            samples.record(outcome, matched);
        }

        let by_key = buckets.finalize(|key, acc| JoinStatsRow {
            key,
            setups_total: acc.setups,
            snapshots_total: acc.snapshots.len() as u64,
            outcomes_total: acc.tally.total(),
            matched_outcomes: acc.tally.matched,
            unmatched_outcomes: acc.tally.unmatched,
            join_rate: join_rate(acc.tally.matched, acc.tally.total()),
        });

        let mut setups_total = 0;
        let mut tally = JoinTally::default();
        for row in &by_key {
            setups_total += row.setups_total;
            tally.merge(&JoinTally {
                matched: row.matched_outcomes,
                unmatched: row.unmatched_outcomes,
            });
        }

        info!(
            keys = by_key.len(),
            outcomes = tally.total(),
            matched = tally.matched,
            "join stats built"
        );

        Self {
            version: REPORT_VERSION.to_string(),
            generated_at: ctx.generated_at.clone(),
            params: ReportParams::new(filter, records),
            overall: JoinStatsOverall {
                setups_total,
                outcomes_total: tally.total(),
                matched_outcomes: tally.matched,
                unmatched_outcomes: tally.unmatched,
                join_rate: join_rate(tally.matched, tally.total()),
            },
            by_key,
            unmatched_samples: samples.unmatched,
            matched_sample_ids: samples.matched_ids,
        }
    }

    fn render_markdown(&self) -> String {
        let p = &self.params;
        let o = &self.overall;
        let mut md = format!(
            "# Phase-1 Join Stats (Swing, v1)\n\
Generated: {}, days={}, timeframes={}, labels={}\n\n\
## Overall Swing\n\
- setupsTotal: {}\n\
- outcomesTotal: {}\n\
- matchedOutcomes: {}\n\
- unmatchedOutcomes: {}\n\
- joinRate: {}\n",
            self.generated_at,
            p.days,
            p.timeframes.join(","),
            p.labels.join(","),
            o.setups_total,
            o.outcomes_total,
            o.matched_outcomes,
            o.unmatched_outcomes,
            rate(Some(o.join_rate)),
        );

        md.push_str("\n## Per Asset/Timeframe/Label\n");
        md.push_str(&table_header(&[
            ("Asset", false),
            ("TF", false),
            ("Label", false),
            ("Setups", true),
            ("Snapshots", true),
            ("Outcomes", true),
            ("Matched", true),
            ("Unmatched", true),
            ("JoinRate", true),
        ]));
        for row in &self.by_key {
            md.push_str(&table_row(&[
                row.key.asset_id.clone(),
                row.key.timeframe.clone(),
                row.key.label.clone(),
                row.setups_total.to_string(),
                row.snapshots_total.to_string(),
                row.outcomes_total.to_string(),
                row.matched_outcomes.to_string(),
                row.unmatched_outcomes.to_string(),
                rate(Some(row.join_rate)),
            ]));
        }

        md.push_str("\n## Unmatched Outcome Samples (max 10)\n");
        if self.unmatched_samples.is_empty() {
            md.push_str("(none)\n");
        } else {
            md.push_str(&table_header(&[
                ("Outcome", false),
                ("Snapshot", false),
                ("Setup", false),
                ("Asset", false),
                ("TF", false),
                ("EvalTF", false),
                ("Status", false),
                ("EvaluatedAt", false),
                ("Label", false),
            ]));
            for s in &self.unmatched_samples {
                let opt = |v: &Option<String>| v.clone().unwrap_or_default();
                md.push_str(&table_row(&[
                    s.outcome_id.clone(),
                    s.snapshot_id.clone(),
                    s.setup_id.clone(),
                    opt(&s.asset_id),
                    opt(&s.timeframe),
                    opt(&s.evaluation_timeframe),
                    opt(&s.outcome_status),
                    opt(&s.evaluated_at),
                    opt(&s.label),
                ]));
            }
        }

        md.push_str("\n## Matched Sample Ids (max 10)\n");
        if self.matched_sample_ids.is_empty() {
            md.push_str("(none)\n");
        } else {
            for id in &self.matched_sample_ids {
                md.push_str(&format!("- {id}\n"));
            }
        }
        md
    }
}
