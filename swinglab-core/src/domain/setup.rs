//! Setup — a generated trading signal as persisted inside a snapshot.
//!
//! Setups are produced by an external scoring engine and stored as loosely
//! shaped JSON. Several fields exist under more than one name depending on
//! which engine version wrote the snapshot. Every such alias is read through
//! an explicit accessor below so the precedence is defined in one place.

use serde::{Deserialize, Serialize};

use super::non_blank;
use crate::levels::LevelValue;

/// Ring scores computed by the scoring engine (0..=100 each).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Rings {
    pub trend_score: Option<f64>,
    pub event_score: Option<f64>,
    pub bias_score: Option<f64>,
    pub sentiment_score: Option<f64>,
    pub orderflow_score: Option<f64>,
    pub confidence_score: Option<f64>,
}

/// Persisted signal-quality block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SignalQualityField {
    pub score: Option<f64>,
    pub grade: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Validity {
    pub is_stale: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventModifier {
    pub classification: Option<String>,
}

impl EventModifier {
    /// True for classifications that knock a setup out entirely.
    pub fn is_critical(&self) -> bool {
        let class = self
            .classification
            .as_deref()
            .unwrap_or_default()
            .to_lowercase();
        class.contains("execution_critical")
            || class.contains("execution critical")
            || class.contains("blocked")
            || class.contains("knockout")
    }
}

/// A generated trading signal. Read-only input to the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Setup {
    // ── Identification ──
    pub id: Option<String>,
    pub setup_id: Option<String>,
    pub asset_id: Option<String>,
    pub symbol: Option<String>,
    pub asset_class: Option<String>,
    pub timeframe: Option<String>,
    pub timeframe_used: Option<String>,
    pub profile: Option<String>,
    pub direction: Option<String>,

    // ── Classification ──
    pub setup_grade: Option<String>,
    pub grade: Option<String>,
    pub setup_type: Option<String>,
    pub grade_rationale: Option<Vec<String>>,
    pub no_trade_reason: Option<String>,
    pub grade_debug_reason: Option<String>,
    pub setup_playbook_id: Option<String>,
    pub playbook_id: Option<String>,
    pub decision: Option<String>,
    pub setup_decision: Option<String>,
    pub decision_reasons: Option<Vec<String>>,
    pub alignment: Option<String>,
    pub derived_alignment: Option<String>,
    pub watch_segment: Option<String>,
    pub fx_watch_segment: Option<String>,

    // ── Scores ──
    pub bias_score: Option<f64>,
    pub trend_score: Option<f64>,
    pub confidence: Option<f64>,
    pub signal_quality: Option<SignalQualityField>,
    pub rings: Option<Rings>,

    // ── Levels ──
    pub entry_zone: Option<LevelValue>,
    pub stop_loss: Option<LevelValue>,
    pub take_profit: Option<LevelValue>,

    // ── Risk flags ──
    pub validity: Option<Validity>,
    pub event_modifier: Option<EventModifier>,
}

impl Setup {
    /// Asset identifier: `assetId`, then `symbol`.
    pub fn asset(&self) -> Option<&str> {
        non_blank(&self.asset_id).or_else(|| non_blank(&self.symbol))
    }

    /// Raw timeframe: `timeframeUsed`, then `timeframe`.
    pub fn timeframe_raw(&self) -> Option<&str> {
        non_blank(&self.timeframe_used).or_else(|| non_blank(&self.timeframe))
    }

    /// Identifier used by outcomes to reference this setup: `setupId`, then `id`.
    pub fn reference_id(&self) -> Option<&str> {
        non_blank(&self.setup_id).or_else(|| non_blank(&self.id))
    }

    /// Persisted playbook: `playbookId`, then `setupPlaybookId`.
    pub fn persisted_playbook(&self) -> Option<&str> {
        non_blank(&self.playbook_id).or_else(|| non_blank(&self.setup_playbook_id))
    }

    /// Playbook governing the decision policy: `setupPlaybookId`, then `playbookId`.
    pub fn policy_playbook(&self) -> Option<&str> {
        non_blank(&self.setup_playbook_id).or_else(|| non_blank(&self.playbook_id))
    }

    /// Persisted decision: `decision`, then `setupDecision`.
    pub fn persisted_decision(&self) -> Option<&str> {
        non_blank(&self.decision).or_else(|| non_blank(&self.setup_decision))
    }

    /// Upstream decision written by the streaming engine.
    pub fn upstream_decision(&self) -> Option<&str> {
        non_blank(&self.setup_decision)
    }

    /// Persisted grade: `grade`, then `setupGrade`.
    pub fn persisted_grade(&self) -> Option<&str> {
        non_blank(&self.grade).or_else(|| non_blank(&self.setup_grade))
    }

    /// Alignment: `alignment`, then `derivedAlignment`.
    pub fn alignment_value(&self) -> Option<&str> {
        non_blank(&self.alignment).or_else(|| non_blank(&self.derived_alignment))
    }

    /// Persisted WATCH segment: `watchSegment`, then `fxWatchSegment`.
    pub fn persisted_watch_segment(&self) -> Option<&str> {
        non_blank(&self.watch_segment).or_else(|| non_blank(&self.fx_watch_segment))
    }

    pub fn rationale(&self) -> &[String] {
        self.grade_rationale.as_deref().unwrap_or_default()
    }

    /// Decision reasons, falling back to the grade rationale when none were persisted.
    pub fn reasons(&self) -> &[String] {
        match self.decision_reasons.as_deref() {
            Some(reasons) if !reasons.is_empty() => reasons,
            _ => self.rationale(),
        }
    }

    pub fn no_trade_reason(&self) -> Option<&str> {
        non_blank(&self.no_trade_reason)
    }

    pub fn grade_debug_reason(&self) -> Option<&str> {
        non_blank(&self.grade_debug_reason)
    }

    pub fn is_stale(&self) -> bool {
        self.validity.as_ref().is_some_and(|v| v.is_stale)
    }

    pub fn has_critical_event(&self) -> bool {
        self.event_modifier
            .as_ref()
            .is_some_and(EventModifier::is_critical)
    }

    /// Parsed direction: `Some("LONG")`, `Some("SHORT")`, or `None` when unknown.
    pub fn direction_side(&self) -> Option<&'static str> {
        let raw = self.direction.as_deref().unwrap_or_default().to_lowercase();
        if raw.contains("short") || raw.contains("sell") {
            Some("SHORT")
        } else if raw.contains("long") || raw.contains("buy") {
            Some("LONG")
        } else {
            None
        }
    }

    /// No-trade reason, grade debug text, and rationale lines (non-blank only).
    pub fn text_blocks(&self) -> Vec<&str> {
        let mut blocks = Vec::new();
        blocks.extend(self.no_trade_reason());
        blocks.extend(self.grade_debug_reason());
        blocks.extend(
            self.rationale()
                .iter()
                .map(|s| s.as_str())
                .filter(|s| !s.trim().is_empty()),
        );
        blocks
    }
}
