//! Outcome status classification.

use serde::{Deserialize, Serialize};

/// Canonical class of an outcome's raw status string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeStatus {
    Tp,
    Sl,
    Expired,
    Ambiguous,
    Invalid,
    Open,
    Unknown,
}

impl OutcomeStatus {
    pub const ALL: [OutcomeStatus; 7] = [
        OutcomeStatus::Tp,
        OutcomeStatus::Sl,
        OutcomeStatus::Expired,
        OutcomeStatus::Ambiguous,
        OutcomeStatus::Invalid,
        OutcomeStatus::Open,
        OutcomeStatus::Unknown,
    ];

    /// Map a raw status (case-insensitive). Absent or unrecognized → `Unknown`.
    pub fn from_raw(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return OutcomeStatus::Unknown;
        };
        match raw.trim().to_lowercase().as_str() {
            "hit_tp" | "tp" => OutcomeStatus::Tp,
            "hit_sl" | "sl" | "stopped" => OutcomeStatus::Sl,
            "expired" => OutcomeStatus::Expired,
            "ambiguous" => OutcomeStatus::Ambiguous,
            "invalid" => OutcomeStatus::Invalid,
            "open" | "pending" | "none" => OutcomeStatus::Open,
            _ => OutcomeStatus::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeStatus::Tp => "TP",
            OutcomeStatus::Sl => "SL",
            OutcomeStatus::Expired => "EXPIRED",
            OutcomeStatus::Ambiguous => "AMBIGUOUS",
            OutcomeStatus::Invalid => "INVALID",
            OutcomeStatus::Open => "OPEN",
            OutcomeStatus::Unknown => "UNKNOWN",
        }
    }

    /// Reached a terminal state: TP, SL, expired, ambiguous, or invalid.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OutcomeStatus::Open | OutcomeStatus::Unknown)
    }
}

impl std::fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
