//! Bucket Aggregator — composite keys and two-phase accumulation.
//!
//! Every report groups outcomes by a typed key. Accumulation and
//! finalization are separate phases: [`Buckets::entry`] only increments
//! counters, and rates are derived once in [`Buckets::finalize`] after all
//! records are consumed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use swinglab_core::OutcomeStatus;

// ── Status counts ────────────────────────────────────────────────────

/// One counter per outcome status class. Serializes as `{"TP": n, ...}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    #[serde(rename = "TP")]
    pub tp: u64,
    #[serde(rename = "SL")]
    pub sl: u64,
    #[serde(rename = "EXPIRED")]
    pub expired: u64,
    #[serde(rename = "AMBIGUOUS")]
    pub ambiguous: u64,
    #[serde(rename = "INVALID")]
    pub invalid: u64,
    #[serde(rename = "OPEN")]
    pub open: u64,
    #[serde(rename = "UNKNOWN")]
    pub unknown: u64,
}

impl StatusCounts {
    /// Route one outcome into exactly one counter.
    pub fn record(&mut self, status: OutcomeStatus) {
        match status {
            OutcomeStatus::Tp => self.tp += 1,
            OutcomeStatus::Sl => self.sl += 1,
            OutcomeStatus::Expired => self.expired += 1,
            OutcomeStatus::Ambiguous => self.ambiguous += 1,
            OutcomeStatus::Invalid => self.invalid += 1,
            OutcomeStatus::Open => self.open += 1,
            OutcomeStatus::Unknown => self.unknown += 1,
        }
    }

    pub fn get(&self, status: OutcomeStatus) -> u64 {
        match status {
            OutcomeStatus::Tp => self.tp,
            OutcomeStatus::Sl => self.sl,
            OutcomeStatus::Expired => self.expired,
            OutcomeStatus::Ambiguous => self.ambiguous,
            OutcomeStatus::Invalid => self.invalid,
            OutcomeStatus::Open => self.open,
            OutcomeStatus::Unknown => self.unknown,
        }
    }

    /// TP + SL + expired + ambiguous + invalid.
    pub fn closed(&self) -> u64 {
        self.tp + self.sl + self.expired + self.ambiguous + self.invalid
    }

    pub fn total(&self) -> u64 {
        self.closed() + self.open + self.unknown
    }

    pub fn merge(&mut self, other: &StatusCounts) {
        self.tp += other.tp;
        self.sl += other.sl;
        self.expired += other.expired;
        self.ambiguous += other.ambiguous;
        self.invalid += other.invalid;
        self.open += other.open;
        self.unknown += other.unknown;
    }
}

// ── Keys ─────────────────────────────────────────────────────────────

/// A composite grouping key.
///
/// Field values are normalized before the key is built, so two equal keys
/// always produce the same canonical string.
pub trait BucketKey: Clone {
    fn fields(&self) -> Vec<&str>;

    fn canonical(&self) -> String {
        self.fields().join("|")
    }
}

/// `{assetId, timeframe, label}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinKey {
    pub asset_id: String,
    pub timeframe: String,
    pub label: String,
}

impl BucketKey for JoinKey {
    fn fields(&self) -> Vec<&str> {
        vec![&self.asset_id, &self.timeframe, &self.label]
    }
}

/// Outcome-analysis key. A missing alignment serializes as `null` and
/// canonicalizes as `"null"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisKey {
    pub asset_id: String,
    pub timeframe: String,
    pub label: String,
    pub playbook_id: String,
    pub decision: String,
    pub grade: String,
    pub alignment: Option<String>,
}

impl BucketKey for AnalysisKey {
    fn fields(&self) -> Vec<&str> {
        vec![
            &self.asset_id,
            &self.timeframe,
            &self.label,
            &self.playbook_id,
            &self.decision,
            &self.grade,
            self.alignment.as_deref().unwrap_or("null"),
        ]
    }
}

/// Performance-breakdown key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakdownKey {
    pub asset_id: String,
    pub timeframe: String,
    pub label: String,
    pub playbook_id: String,
    pub grade: String,
    pub decision_bucket: String,
}

impl BucketKey for BreakdownKey {
    fn fields(&self) -> Vec<&str> {
        vec![
            &self.asset_id,
            &self.timeframe,
            &self.label,
            &self.playbook_id,
            &self.grade,
            &self.decision_bucket,
        ]
    }
}

// ── Accumulator ──────────────────────────────────────────────────────

/// Accumulators indexed by canonical key.
#[derive(Debug, Clone)]
pub struct Buckets<K, A> {
    entries: BTreeMap<String, (K, A)>,
}

impl<K, A> Default for Buckets<K, A> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<K: BucketKey, A: Default> Buckets<K, A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The accumulator for `key`, created empty on first touch.
    pub fn entry(&mut self, key: K) -> &mut A {
        let canonical = key.canonical();
        &mut self
            .entries
            .entry(canonical)
            .or_insert_with(|| (key, A::default()))
            .1
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Consume the accumulators, in canonical key order.
    pub fn finalize<R>(self, mut f: impl FnMut(K, A) -> R) -> Vec<R> {
        self.entries.into_values().map(|(k, a)| f(k, a)).collect()
    }
}

// ── Frequency lists ──────────────────────────────────────────────────

/// Distinct entries kept per list during accumulation.
pub const FREQUENCY_CAP: usize = 50;
/// Entries emitted per list.
pub const FREQUENCY_TOP: usize = 10;

/// Insertion-ordered counter of short strings (reasons, segments).
///
/// A value seen before increments its count. A new value is appended
/// while the list holds fewer than [`FREQUENCY_CAP`] entries, else ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrequencyList {
    entries: Vec<(String, u64)>,
}

impl FrequencyList {
    pub fn record(&mut self, value: &str) {
        if let Some(entry) = self.entries.iter_mut().find(|(v, _)| v == value) {
            entry.1 += 1;
        } else if self.entries.len() < FREQUENCY_CAP {
            self.entries.push((value.to_string(), 1));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Highest counts first; equal counts keep insertion order.
    pub fn top(&self, n: usize) -> Vec<(String, u64)> {
        let mut sorted = self.entries.clone();
        sorted.sort_by(|a, b| b.1.cmp(&a.1));
        sorted.truncate(n);
        sorted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(asset: &str, tf: &str, label: &str) -> JoinKey {
        JoinKey {
            asset_id: asset.into(),
            timeframe: tf.into(),
            label: label.into(),
        }
    }

    #[test]
    fn each_status_lands_in_one_counter() {
        let mut counts = StatusCounts::default();
        for status in OutcomeStatus::ALL {
            counts.record(status);
        }
        assert_eq!(counts.total(), 7);
        assert_eq!(counts.closed(), 5);
        for status in OutcomeStatus::ALL {
            assert_eq!(counts.get(status), 1);
        }
    }

    #[test]
    fn status_counts_serialize_with_class_names() {
        let mut counts = StatusCounts::default();
        counts.record(OutcomeStatus::Tp);
        let json = serde_json::to_value(counts).unwrap();
        assert_eq!(json["TP"], 1);
        assert_eq!(json["UNKNOWN"], 0);
    }

    #[test]
    fn analysis_key_null_alignment() {
        let k = AnalysisKey {
            asset_id: "gold".into(),
            timeframe: "1d".into(),
            label: "eod".into(),
            playbook_id: "gold-swing-v0.2".into(),
            decision: "watch".into(),
            grade: "b".into(),
            alignment: None,
        };
        assert_eq!(k.canonical(), "gold|1d|eod|gold-swing-v0.2|watch|b|null");
        assert!(serde_json::to_value(&k).unwrap()["alignment"].is_null());
    }

    #[test]
    fn buckets_accumulate_then_finalize_in_key_order() {
        let mut buckets: Buckets<JoinKey, u64> = Buckets::new();
        *buckets.entry(key("wti", "1d", "eod")) += 1;
        *buckets.entry(key("btc", "1d", "eod")) += 1;
        *buckets.entry(key("wti", "1d", "eod")) += 1;
        assert_eq!(buckets.len(), 2);

        let rows = buckets.finalize(|k, n| (k.asset_id, n));
        assert_eq!(rows, vec![("btc".to_string(), 1), ("wti".to_string(), 2)]);
    }

    #[test]
    fn insertion_order_does_not_change_result() {
        let mut a: Buckets<JoinKey, u64> = Buckets::new();
        let mut b: Buckets<JoinKey, u64> = Buckets::new();
        let keys = [key("a", "1d", "eod"), key("b", "1w", "(null)"), key("c", "1d", "morning")];
        for k in keys.iter() {
            *a.entry(k.clone()) += 1;
        }
        for k in keys.iter().rev() {
            *b.entry(k.clone()) += 1;
        }
        assert_eq!(
            a.finalize(|k, n| (k.canonical(), n)),
            b.finalize(|k, n| (k.canonical(), n))
        );
    }

    #[test]
    fn frequency_list_caps_and_sorts_stably() {
        let mut list = FrequencyList::default();
        for i in 0..60 {
            list.record(&format!("r{i}"));
        }
        list.record("r5");
        list.record("r59");
        let top = list.top(FREQUENCY_TOP);
        assert_eq!(top.len(), FREQUENCY_TOP);
        assert_eq!(top[0], ("r5".to_string(), 2));
        // r59 was past the cap, so it never entered.
        assert!(top.iter().all(|(v, _)| v != "r59"));
        assert_eq!(top[1], ("r0".to_string(), 1));
        assert_eq!(top[2], ("r1".to_string(), 1));
    }
}
