//! Outcome — the later-observed result of a setup, as written by the evaluation job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::non_blank;
use super::status::OutcomeStatus;

/// An outcome row, already inner-joined to its in-window snapshot.
///
/// `label` carries the snapshot's label from that join.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outcome {
    #[serde(alias = "id")]
    pub outcome_id: String,
    pub snapshot_id: String,
    pub setup_id: String,
    #[serde(default)]
    pub asset_id: Option<String>,
    #[serde(default)]
    pub timeframe: Option<String>,
    #[serde(default)]
    pub evaluation_timeframe: Option<String>,
    #[serde(default)]
    pub outcome_status: Option<String>,
    #[serde(default)]
    pub evaluated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub playbook_id: Option<String>,
    #[serde(default)]
    pub decision: Option<String>,
    #[serde(default)]
    pub grade: Option<String>,
    #[serde(default)]
    pub setup_grade: Option<String>,
    #[serde(default)]
    pub setup_type: Option<String>,
    #[serde(default)]
    pub no_trade_reason: Option<String>,
    #[serde(default)]
    pub grade_rationale: Option<Vec<String>>,
    #[serde(default)]
    pub label: Option<String>,
}

impl Outcome {
    pub fn status(&self) -> OutcomeStatus {
        OutcomeStatus::from_raw(self.outcome_status.as_deref())
    }

    pub fn persisted_playbook(&self) -> Option<&str> {
        non_blank(&self.playbook_id)
    }

    pub fn persisted_decision(&self) -> Option<&str> {
        non_blank(&self.decision)
    }

    /// `grade`, then `setupGrade`.
    pub fn persisted_grade(&self) -> Option<&str> {
        non_blank(&self.grade).or_else(|| non_blank(&self.setup_grade))
    }

    pub fn setup_type(&self) -> Option<&str> {
        non_blank(&self.setup_type)
    }

    pub fn no_trade_reason(&self) -> Option<&str> {
        non_blank(&self.no_trade_reason)
    }

    pub fn rationale(&self) -> &[String] {
        self.grade_rationale.as_deref().unwrap_or_default()
    }
}
