//! Setup-level diagnostics for the outcome-analysis report.
//!
//! - Level plausibility: stop / target distance and risk-reward spread
//! - WATCH segment summary with average gating scores per segment
//! - Upgrade candidates among WATCH_FAILS_TREND setups
//!
//! A setup whose levels cannot be parsed is left out of the level section
//! and counted in `parseErrors`; every other section still sees it.

use serde::Serialize;
use swinglab_core::levels::has_any_level;
use swinglab_core::{RrrBucket, Setup, TradeLevels, WatchScores, WatchSegment};
use tracing::debug;

use crate::stats::round4;

// ── Running means ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
struct Mean {
    sum: f64,
    n: u64,
}

impl Mean {
    fn push(&mut self, value: Option<f64>) {
        if let Some(v) = value.filter(|v| v.is_finite()) {
            self.sum += v;
            self.n += 1;
        }
    }

    fn value(&self) -> Option<f64> {
        (self.n > 0).then(|| round4(self.sum / self.n as f64))
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct ScoreMeans {
    bias: Mean,
    trend: Mean,
    signal_quality: Mean,
    confidence: Mean,
}

impl ScoreMeans {
    fn push(&mut self, scores: &WatchScores) {
        self.bias.push(scores.bias);
        self.trend.push(scores.trend);
        self.signal_quality.push(scores.signal_quality);
        self.confidence.push(scores.confidence);
    }
}

/// Linear-interpolated percentile (`p` in 0..=100) of unsorted values.
pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let idx = (p / 100.0) * (sorted.len() - 1) as f64;
    let lower = idx.floor() as usize;
    let upper = idx.ceil() as usize;
    if lower == upper {
        return Some(sorted[lower]);
    }
    let weight = idx - lower as f64;
    Some(sorted[lower] * (1.0 - weight) + sorted[upper] * weight)
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

// ── Level plausibility ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RrrBucketCounts {
    #[serde(rename = "<1")]
    pub below_1: u64,
    #[serde(rename = "1-1.5")]
    pub from_1_to_1_5: u64,
    #[serde(rename = "1.5-2")]
    pub from_1_5_to_2: u64,
    #[serde(rename = "2-3")]
    pub from_2_to_3: u64,
    #[serde(rename = ">=3")]
    pub at_least_3: u64,
}

impl RrrBucketCounts {
    fn record(&mut self, bucket: RrrBucket) {
        match bucket {
            RrrBucket::Below1 => self.below_1 += 1,
            RrrBucket::From1To1_5 => self.from_1_to_1_5 += 1,
            RrrBucket::From1_5To2 => self.from_1_5_to_2 += 1,
            RrrBucket::From2To3 => self.from_2_to_3 += 1,
            RrrBucket::AtLeast3 => self.at_least_3 += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.below_1 + self.from_1_to_1_5 + self.from_1_5_to_2 + self.from_2_to_3 + self.at_least_3
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelPlausibility {
    pub count: u64,
    pub parse_errors: u64,
    pub avg_stop_pct: Option<f64>,
    pub p50_stop_pct: Option<f64>,
    pub p90_stop_pct: Option<f64>,
    pub avg_target_pct: Option<f64>,
    pub p50_target_pct: Option<f64>,
    pub p90_target_pct: Option<f64>,
    #[serde(rename = "avgRRR")]
    pub avg_rrr: Option<f64>,
    pub rrr_buckets: RrrBucketCounts,
}

/// Accumulates level distances for setups that carry levels.
#[derive(Debug, Clone, Default)]
pub struct LevelStats {
    stop_pcts: Vec<f64>,
    target_pcts: Vec<f64>,
    rrrs: Vec<f64>,
    parse_errors: u64,
    buckets: RrrBucketCounts,
}

impl LevelStats {
    /// Setups without any level field are not considered.
    pub fn record(&mut self, setup: &Setup) {
        if !has_any_level(setup) {
            return;
        }
        match TradeLevels::from_setup(setup) {
            Ok(levels) => {
                self.stop_pcts.push(levels.stop_pct());
                self.target_pcts.push(levels.target_pct());
                if let Some(rrr) = levels.rrr() {
                    self.rrrs.push(rrr);
                    self.buckets.record(RrrBucket::of(rrr));
                }
            }
            Err(err) => {
                debug!(setup = setup.reference_id().unwrap_or("?"), %err, "level parse error");
                self.parse_errors += 1;
            }
        }
    }

    pub fn finish(&self) -> LevelPlausibility {
        let r = |v: Option<f64>| v.map(round4);
        LevelPlausibility {
            count: self.stop_pcts.len() as u64,
            parse_errors: self.parse_errors,
            avg_stop_pct: r(mean(&self.stop_pcts)),
            p50_stop_pct: r(percentile(&self.stop_pcts, 50.0)),
            p90_stop_pct: r(percentile(&self.stop_pcts, 90.0)),
            avg_target_pct: r(mean(&self.target_pcts)),
            p50_target_pct: r(percentile(&self.target_pcts, 50.0)),
            p90_target_pct: r(percentile(&self.target_pcts, 90.0)),
            avg_rrr: r(mean(&self.rrrs)),
            rrr_buckets: self.buckets,
        }
    }
}

// ── Watch segments ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentSummary {
    pub segment: WatchSegment,
    pub count: u64,
    /// Share of all WATCH setups in this segment.
    pub pct: f64,
    pub avg_bias: Option<f64>,
    pub avg_trend: Option<f64>,
    pub avg_signal_quality: Option<f64>,
    pub avg_confidence: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeCandidates {
    pub total_watch_fails_trend: u64,
    pub candidates_count: u64,
    pub candidates_pct_of_watch_fails_trend: Option<f64>,
    pub avg_bias: Option<f64>,
    pub avg_trend: Option<f64>,
    pub avg_signal_quality: Option<f64>,
    pub avg_confidence: Option<f64>,
}

/// Per-segment counts and score means for WATCH setups.
#[derive(Debug, Clone, Default)]
pub struct WatchStats {
    segments: [(u64, ScoreMeans); 6],
    fails_trend: u64,
    candidates: u64,
    candidate_means: ScoreMeans,
}

impl WatchStats {
    /// Record one WATCH setup. A persisted segment on the setup wins over
    /// the computed one.
    pub fn record(
        &mut self,
        setup: &Setup,
        computed: WatchSegment,
        scores: &WatchScores,
        upgrade_candidate: bool,
    ) -> WatchSegment {
        let segment = setup
            .persisted_watch_segment()
            .and_then(WatchSegment::parse)
            .unwrap_or(computed);

        let slot = &mut self.segments[segment_index(segment)];
        slot.0 += 1;
        slot.1.push(scores);

        if segment == WatchSegment::FailsTrend {
            self.fails_trend += 1;
            if upgrade_candidate {
                self.candidates += 1;
                self.candidate_means.push(scores);
            }
        }
        segment
    }

    pub fn total(&self) -> u64 {
        self.segments.iter().map(|(n, _)| n).sum()
    }

    /// One row per segment with at least one member, in canonical segment order.
    pub fn segments(&self) -> Vec<SegmentSummary> {
        let total = self.total();
        WatchSegment::ALL
            .iter()
            .zip(self.segments.iter())
            .filter(|(_, (count, _))| *count > 0)
            .map(|(segment, (count, means))| SegmentSummary {
                segment: *segment,
                count: *count,
                pct: round4(*count as f64 / total as f64),
                avg_bias: means.bias.value(),
                avg_trend: means.trend.value(),
                avg_signal_quality: means.signal_quality.value(),
                avg_confidence: means.confidence.value(),
            })
            .collect()
    }

    pub fn upgrade_candidates(&self) -> UpgradeCandidates {
        let m = &self.candidate_means;
        UpgradeCandidates {
            total_watch_fails_trend: self.fails_trend,
            candidates_count: self.candidates,
            candidates_pct_of_watch_fails_trend: (self.fails_trend > 0)
                .then(|| round4(self.candidates as f64 / self.fails_trend as f64)),
            avg_bias: m.bias.value(),
            avg_trend: m.trend.value(),
            avg_signal_quality: m.signal_quality.value(),
            avg_confidence: m.confidence.value(),
        }
    }
}

fn segment_index(segment: WatchSegment) -> usize {
    WatchSegment::ALL
        .iter()
        .position(|s| *s == segment)
        .unwrap_or(WatchSegment::ALL.len() - 1)
}
