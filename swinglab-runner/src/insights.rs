//! Insight Selector — top/bottom winrate and most open-heavy buckets.
//!
//! All rankings use a stable sort, so equal values keep their input order.

use std::cmp::Ordering;

use crate::stats::Kpi;

pub const INSIGHT_LIMIT: usize = 10;
/// Minimum outcomes for a bucket to appear in `openHeavy`.
pub const OPEN_HEAVY_MIN_OUTCOMES: u64 = 10;

/// Ranked views over a bucket list.
#[derive(Debug, Clone, PartialEq)]
pub struct Insights<T> {
    pub top_winrate: Vec<T>,
    pub bottom_winrate: Vec<T>,
    pub open_heavy: Vec<T>,
}

/// Rank `buckets`. `kpi` projects each bucket to its statistics.
///
/// Winrate rankings consider only buckets with `closedCount >= min_closed`;
/// an undefined winrate ranks as 0. `openHeavy` takes buckets with at least
/// [`OPEN_HEAVY_MIN_OUTCOMES`] outcomes, lowest closeRate first.
pub fn select<T: Clone>(buckets: &[T], min_closed: u64, kpi: impl Fn(&T) -> &Kpi) -> Insights<T> {
    let winrate_of = |b: &T| kpi(b).winrate.unwrap_or(0.0);
    let close_rate_of = |b: &T| kpi(b).close_rate.unwrap_or(0.0);

    let eligible: Vec<&T> = buckets
        .iter()
        .filter(|b| kpi(*b).closed_count >= min_closed)
        .collect();

    let mut top = eligible.clone();
    top.sort_by(|a, b| cmp_f64(winrate_of(*b), winrate_of(*a)));

    let mut bottom = eligible;
    bottom.sort_by(|a, b| cmp_f64(winrate_of(*a), winrate_of(*b)));

    let mut open_heavy: Vec<&T> = buckets
        .iter()
        .filter(|b| kpi(*b).outcomes_total >= OPEN_HEAVY_MIN_OUTCOMES)
        .collect();
    open_heavy.sort_by(|a, b| cmp_f64(close_rate_of(*a), close_rate_of(*b)));

    Insights {
        top_winrate: take(top),
        bottom_winrate: take(bottom),
        open_heavy: take(open_heavy),
    }
}

fn cmp_f64(a: f64, b: f64) -> Ordering {
    a.total_cmp(&b)
}

fn take<T: Clone>(ranked: Vec<&T>) -> Vec<T> {
    ranked.into_iter().take(INSIGHT_LIMIT).cloned().collect()
}
