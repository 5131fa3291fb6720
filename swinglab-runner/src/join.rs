//! Join Matcher — does each outcome have a snapshot item behind it?
//!
//! [`JoinIndex`] is the existence set of `snapshotId|setupId` keys built from
//! the snapshot-item table. [`SetupIndex`] maps the same key to the setup
//! itself, for the reports that need setup fields.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use swinglab_core::normalize::join_key;
use swinglab_core::{Outcome, Setup, Snapshot, SnapshotItem};

/// Diagnostic samples are capped, never full-volume dumps.
pub const SAMPLE_CAP: usize = 10;

#[derive(Debug, Clone, Default)]
pub struct JoinIndex {
    keys: HashSet<String>,
}

impl JoinIndex {
    pub fn from_items(items: &[SnapshotItem]) -> Self {
        Self {
            keys: items
                .iter()
                .map(|item| join_key(&item.snapshot_id, &item.setup_id))
                .collect(),
        }
    }

    pub fn contains(&self, outcome: &Outcome) -> bool {
        self.keys
            .contains(&join_key(&outcome.snapshot_id, &outcome.setup_id))
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Setups of in-window snapshots, keyed by `snapshotId|setupId`.
#[derive(Debug, Default)]
pub struct SetupIndex<'a> {
    setups: HashMap<String, &'a Setup>,
}

impl<'a> SetupIndex<'a> {
    pub fn build(snapshots: &'a [Snapshot]) -> Self {
        let mut setups = HashMap::new();
        for snapshot in snapshots {
            for setup in &snapshot.setups {
                if let Some(id) = setup.reference_id() {
                    setups.insert(join_key(&snapshot.id, id), setup);
                }
            }
        }
        Self { setups }
    }

    pub fn get(&self, outcome: &Outcome) -> Option<&'a Setup> {
        self.setups
            .get(&join_key(&outcome.snapshot_id, &outcome.setup_id))
            .copied()
    }

    pub fn len(&self) -> usize {
        self.setups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.setups.is_empty()
    }
}

/// Matched / unmatched tallies for one group of outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JoinTally {
    pub matched: u64,
    pub unmatched: u64,
}

impl JoinTally {
    pub fn record(&mut self, matched: bool) {
        if matched {
            self.matched += 1;
        } else {
            self.unmatched += 1;
        }
    }

    pub fn total(&self) -> u64 {
        self.matched + self.unmatched
    }

    pub fn merge(&mut self, other: &JoinTally) {
        self.matched += other.matched;
        self.unmatched += other.unmatched;
    }
}

/// An unmatched outcome, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeSample {
    pub outcome_id: String,
    pub snapshot_id: String,
    pub setup_id: String,
    pub asset_id: Option<String>,
    pub timeframe: Option<String>,
    pub evaluation_timeframe: Option<String>,
    pub outcome_status: Option<String>,
    pub evaluated_at: Option<String>,
    pub label: Option<String>,
}

impl From<&Outcome> for OutcomeSample {
    fn from(o: &Outcome) -> Self {
        Self {
            outcome_id: o.outcome_id.clone(),
            snapshot_id: o.snapshot_id.clone(),
            setup_id: o.setup_id.clone(),
            asset_id: o.asset_id.clone(),
            timeframe: o.timeframe.clone(),
            evaluation_timeframe: o.evaluation_timeframe.clone(),
            outcome_status: o.outcome_status.clone(),
            evaluated_at: o.evaluated_at.map(|t| t.to_rfc3339()),
            label: o.label.clone(),
        }
    }
}

/// Capped sample collection: first [`SAMPLE_CAP`] matched ids and unmatched rows.
#[derive(Debug, Clone, Default)]
pub struct JoinSamples {
    pub matched_ids: Vec<String>,
    pub unmatched: Vec<OutcomeSample>,
}

impl JoinSamples {
    pub fn record(&mut self, outcome: &Outcome, matched: bool) {
        if matched {
            if self.matched_ids.len() < SAMPLE_CAP {
                self.matched_ids.push(outcome.outcome_id.clone());
            }
        } else if self.unmatched.len() < SAMPLE_CAP {
            self.unmatched.push(OutcomeSample::from(outcome));
        }
    }
}
