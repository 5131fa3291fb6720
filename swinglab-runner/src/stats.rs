//! Statistics Calculator — winrate, closeRate, joinRate, and bucket flags.
//!
//! Rates are derived from finished counters only, and rounded to four
//! decimals once, when the [`Kpi`] is built for persistence.

use serde::{Deserialize, Serialize};

use crate::buckets::StatusCounts;

/// Threshold below which a bucket is flagged `mostly-open` (strict).
pub const MOSTLY_OPEN_BELOW: f64 = 0.2;

pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// `tp / (tp + sl)`; `None` when no trade reached TP or SL.
pub fn winrate(tp: u64, sl: u64) -> Option<f64> {
    let decided = tp + sl;
    (decided > 0).then(|| tp as f64 / decided as f64)
}

/// `closed / total`; `None` for an empty group.
pub fn close_rate(closed: u64, total: u64) -> Option<f64> {
    (total > 0).then(|| closed as f64 / total as f64)
}

/// `matched / total`; `0` for an empty group.
pub fn join_rate(matched: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        round4(matched as f64 / total as f64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WinrateDefinition {
    #[serde(rename = "tp/(tp+sl)")]
    TpOverTpSl,
    #[serde(rename = "unavailable")]
    Unavailable,
}

/// Finalized statistics for one group of outcomes.
///
/// `winrate` and `winrateTpSl` carry the same value; both names are read by
/// existing dashboards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Kpi {
    pub outcomes_total: u64,
    pub closed_count: u64,
    pub open_count: u64,
    pub tp_count: u64,
    pub sl_count: u64,
    pub expired_count: u64,
    pub ambiguous_count: u64,
    pub invalid_count: u64,
    pub unknown_count: u64,
    pub winrate: Option<f64>,
    pub winrate_tp_sl: Option<f64>,
    pub winrate_definition: WinrateDefinition,
    pub close_rate: Option<f64>,
    pub status_counts: StatusCounts,
}

impl Kpi {
    pub fn from_counts(counts: &StatusCounts) -> Self {
        let closed = counts.closed();
        let total = counts.total();
        let winrate = winrate(counts.tp, counts.sl).map(round4);
        Self {
            outcomes_total: total,
            closed_count: closed,
            open_count: counts.open,
            tp_count: counts.tp,
            sl_count: counts.sl,
            expired_count: counts.expired,
            ambiguous_count: counts.ambiguous,
            invalid_count: counts.invalid,
            unknown_count: counts.unknown,
            winrate,
            winrate_tp_sl: winrate,
            winrate_definition: if winrate.is_some() {
                WinrateDefinition::TpOverTpSl
            } else {
                WinrateDefinition::Unavailable
            },
            close_rate: close_rate(closed, total).map(round4),
            status_counts: *counts,
        }
    }

    /// Unrounded closed share, used for flag thresholds.
    fn exact_close_rate(&self) -> f64 {
        close_rate(self.closed_count, self.outcomes_total).unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Flag {
    LowSample,
    MostlyOpen,
}

impl Flag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Flag::LowSample => "low-sample",
            Flag::MostlyOpen => "mostly-open",
        }
    }
}

/// Rule inputs for [`FlagRules::evaluate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagRules {
    pub min_closed: u64,
    pub include_open_only: bool,
}

impl FlagRules {
    /// `low-sample` when closed < minClosed (unless open-only buckets are
    /// explicitly included); `mostly-open` when closeRate < 0.2. Both may hold.
    pub fn evaluate(&self, kpi: &Kpi) -> Vec<Flag> {
        let mut flags = Vec::new();
        if !self.include_open_only && kpi.closed_count < self.min_closed {
            flags.push(Flag::LowSample);
        }
        if kpi.exact_close_rate() < MOSTLY_OPEN_BELOW {
            flags.push(Flag::MostlyOpen);
        }
        flags
    }
}
