//! Decision Classifier — TRADE / WATCH / BLOCKED.
//!
//! [`DecisionPolicy::evaluate`] is the grading policy applied to a single
//! setup. [`classify_decision`] wraps it for an outcome row: strong grades
//! short-circuit to TRADE, a matched setup goes through the policy, and an
//! unmatched outcome with enough text is rebuilt into a synthetic setup first.
//!
//! Both are pure. The same inputs always give the same result.

use serde::{Deserialize, Serialize};

use crate::domain::{Outcome, Setup};
use crate::levels::levels_complete;
use crate::watch_segment::{is_upgrade_candidate, WatchScores, WatchSegment};

const MAX_REASONS: usize = 3;
const CRYPTO_SWING_PLAYBOOK: &str = "crypto-swing-v0.1";
const INDEX_PLAYBOOK: &str = "spx-swing-v0.1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Trade,
    Watch,
    Blocked,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Trade => "TRADE",
            Decision::Watch => "WATCH",
            Decision::Blocked => "BLOCKED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_uppercase().as_str() {
            "TRADE" => Some(Decision::Trade),
            "WATCH" => Some(Decision::Watch),
            "BLOCKED" => Some(Decision::Blocked),
            _ => None,
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionCategory {
    Hard,
    Soft,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionResult {
    pub decision: Decision,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<DecisionCategory>,
    pub reasons: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watch_segment: Option<WatchSegment>,
}

impl DecisionResult {
    fn trade() -> Self {
        Self {
            decision: Decision::Trade,
            category: None,
            reasons: Vec::new(),
            watch_segment: None,
        }
    }

    fn watch(reasons: Vec<String>, watch_segment: Option<WatchSegment>) -> Self {
        Self {
            decision: Decision::Watch,
            category: Some(DecisionCategory::Soft),
            reasons,
            watch_segment,
        }
    }

    fn blocked(category: DecisionCategory, reasons: Vec<String>) -> Self {
        Self {
            decision: Decision::Blocked,
            category: Some(category),
            reasons,
            watch_segment: None,
        }
    }
}

/// Keyword lists and playbook gates driving [`DecisionPolicy::evaluate`].
///
/// Keywords are matched as lowercase substrings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionPolicy {
    pub watch_enabled_playbooks: Vec<String>,
    pub hard_reason_keywords: Vec<String>,
    pub soft_reason_keywords: Vec<String>,
    pub event_keywords: Vec<String>,
    pub index_assets: Vec<String>,
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        let strings = |items: &[&str]| -> Vec<String> {
            items.iter().map(|s| s.to_string()).collect()
        };
        Self {
            watch_enabled_playbooks: strings(&[
                "energy-swing-v0.1",
                "metals-swing-v0.1",
                "spx-swing-v0.1",
                "dax-swing-v0.1",
                "ndx-swing-v0.1",
                "dow-swing-v0.1",
                "gold-swing-v0.2",
                "crypto-swing-v0.1",
                "eurusd-swing-v0.1",
                "gbpusd-swing-v0.1",
                "usdjpy-swing-v0.1",
                "eurjpy-swing-v0.1",
                "fx-swing-v0.1",
            ]),
            hard_reason_keywords: strings(&[
                "execution critical",
                "execution_critical",
                "knockout",
                "stale",
                "levels missing",
                "invalid levels",
                "no levels",
            ]),
            soft_reason_keywords: strings(&[
                "alignment",
                "bias",
                "trend",
                "confidence",
                "signal quality",
                "signalquality",
                "regime",
                "orderflow",
                "sentiment",
                "rrr",
                "volatility",
            ]),
            event_keywords: strings(&["event", "conflict"]),
            index_assets: strings(&["spx", "sp500", "spx500", "dax", "ndx", "nasdaq"]),
        }
    }
}

impl DecisionPolicy {
    pub fn evaluate(&self, setup: &Setup) -> DecisionResult {
        let grade = setup.persisted_grade().map(str::to_uppercase);
        let strong_grade = is_strong_grade(grade.as_deref());
        let playbook = setup.policy_playbook().unwrap_or_default().to_lowercase();
        let is_index = self.is_index(setup, &playbook);

        if let Some(upstream) = setup.upstream_decision() {
            return self.normalize_upstream(setup, &upstream.to_uppercase(), strong_grade, is_index);
        }

        if strong_grade {
            return DecisionResult::trade();
        }

        let watch_enabled = self
            .watch_enabled_playbooks
            .iter()
            .any(|p| p.eq_ignore_ascii_case(&playbook));
        let hard = self.is_hard_knockout(setup);
        let soft = !hard && self.has_soft_reason(setup);
        let reasons = build_reasons(setup.no_trade_reason(), setup);

        let no_trade = setup.no_trade_reason().map(str::to_lowercase);
        let alignment_missing = no_trade.as_deref().is_some_and(|r| r.contains("alignment"));
        let direction = setup.direction_side();
        let scores = WatchScores::resolve(setup);

        if playbook == CRYPTO_SWING_PLAYBOOK
            && watch_enabled
            && !hard
            && (alignment_missing || no_trade.is_none())
        {
            let dir = fallback_direction(direction, &scores, 70.0);
            let reason = format!("Alignment derived (fallback {dir})");
            return DecisionResult::watch(build_reasons(Some(reason.as_str()), setup), None);
        }

        if is_index && watch_enabled && !hard && (alignment_missing || direction.is_some()) {
            let dir = fallback_direction(direction, &scores, 60.0);
            let reason = format!("Alignment derived (index fallback {dir})");
            return DecisionResult::watch(
                build_reasons(Some(reason.as_str()), setup),
                Some(scores.classify()),
            );
        }

        let category = if hard {
            DecisionCategory::Hard
        } else {
            DecisionCategory::Soft
        };

        if !watch_enabled {
            return DecisionResult::blocked(category, ensure(reasons, "Blocked (unspecified)"));
        }

        if soft {
            let segment = is_index.then(|| scores.classify());
            return DecisionResult::watch(ensure(reasons, "Watch (unspecified)"), segment);
        }

        DecisionResult::blocked(category, ensure(reasons, "Blocked (unspecified)"))
    }

    /// Stale, missing or unusable entry/stop/target levels, a critical event
    /// modifier, or a hard keyword in any reason text.
    pub fn is_hard_knockout(&self, setup: &Setup) -> bool {
        if setup.is_stale() {
            return true;
        }
        if !levels_complete(setup) {
            return true;
        }
        if setup.has_critical_event() {
            return true;
        }
        contains_keyword(&setup.text_blocks(), &self.hard_reason_keywords)
    }

    fn has_soft_reason(&self, setup: &Setup) -> bool {
        let mut texts: Vec<&str> = setup.no_trade_reason().into_iter().collect();
        texts.extend(setup.rationale().iter().map(String::as_str));
        contains_keyword(&texts, &self.soft_reason_keywords)
    }

    pub fn is_upgrade_candidate(&self, setup: &Setup, scores: &WatchScores) -> bool {
        is_upgrade_candidate(setup, scores, &self.event_keywords)
    }

    fn is_index(&self, setup: &Setup, playbook: &str) -> bool {
        let asset_class_index = setup
            .asset_class
            .as_deref()
            .is_some_and(|c| c.eq_ignore_ascii_case("index"));
        let asset = setup.asset().unwrap_or_default().to_lowercase();
        asset_class_index
            || playbook == INDEX_PLAYBOOK
            || self.index_assets.iter().any(|a| a.eq_ignore_ascii_case(&asset))
    }

    /// Streamed setups already carry a decision. Keep it, but never let an
    /// unexplained BLOCKED or an ungraded TRADE through unchanged.
    fn normalize_upstream(
        &self,
        setup: &Setup,
        upstream: &str,
        strong_grade: bool,
        is_index: bool,
    ) -> DecisionResult {
        let reasons: Vec<String> = setup
            .decision_reasons
            .as_deref()
            .unwrap_or_default()
            .iter()
            .filter(|r| !r.trim().is_empty())
            .take(MAX_REASONS)
            .cloned()
            .collect();
        let scores = WatchScores::resolve(setup);
        let segment = (is_index && upstream != "TRADE").then(|| scores.classify());

        if upstream == "BLOCKED" || upstream == "WATCH" {
            let alignment_mention = reasons.iter().any(|r| r.to_lowercase().contains("alignment"))
                || setup
                    .no_trade_reason()
                    .is_some_and(|r| r.to_lowercase().contains("alignment"));
            let direction = setup.direction_side();
            if is_index && (alignment_mention || direction.is_some()) {
                let dir = fallback_direction(direction, &scores, 60.0);
                let reason = format!("Alignment derived (index fallback {dir})");
                return DecisionResult::watch(replace_alignment_reasons(reasons, reason), segment);
            }
            if upstream == "WATCH" {
                return DecisionResult::watch(ensure(reasons, "Watch (unspecified)"), segment);
            }
            if reasons.is_empty() {
                return DecisionResult::watch(
                    vec!["Stream decision BLOCKED but no reasons (normalized to WATCH)".to_string()],
                    segment,
                );
            }
            return DecisionResult::blocked(DecisionCategory::Soft, reasons);
        }

        if upstream == "TRADE" && strong_grade {
            return DecisionResult::trade();
        }

        DecisionResult::watch(
            ensure(reasons, &format!("Stream decision {upstream} normalized to WATCH")),
            None,
        )
    }
}

/// Classify one outcome row.
///
/// `grade` is the resolved grade for the row; `setup` is the matched setup,
/// if the join succeeded.
pub fn classify_decision(
    policy: &DecisionPolicy,
    grade: Option<&str>,
    setup: Option<&Setup>,
    outcome: &Outcome,
) -> DecisionResult {
    if is_strong_grade(grade.map(str::to_uppercase).as_deref()) {
        return DecisionResult::trade();
    }

    if let Some(setup) = setup {
        return policy.evaluate(setup);
    }

    let no_trade_reason = outcome.no_trade_reason();
    if no_trade_reason.is_some() || !outcome.rationale().is_empty() {
        let synthetic = Setup {
            setup_grade: Some(grade.unwrap_or("NO_TRADE").to_string()),
            no_trade_reason: no_trade_reason.map(str::to_string),
            grade_rationale: Some(outcome.rationale().to_vec()),
            setup_playbook_id: outcome.persisted_playbook().map(str::to_string),
            ..Default::default()
        };
        return policy.evaluate(&synthetic);
    }

    DecisionResult::blocked(
        DecisionCategory::Soft,
        vec!["No setup or reason available".to_string()],
    )
}

fn is_strong_grade(grade: Option<&str>) -> bool {
    matches!(grade, Some("A") | Some("B"))
}

fn fallback_direction(direction: Option<&'static str>, scores: &WatchScores, bias_min: f64) -> &'static str {
    direction.unwrap_or_else(|| {
        let trend_long = scores.trend.is_some_and(|t| t >= 50.0);
        let bias_long = scores.bias.is_some_and(|b| b >= bias_min);
        if trend_long || bias_long {
            "LONG"
        } else {
            "SHORT"
        }
    })
}

/// Lead reason, rationale lines, then debug text; blank and duplicate lines
/// dropped, at most three kept.
fn build_reasons(lead: Option<&str>, setup: &Setup) -> Vec<String> {
    let candidates = lead
        .into_iter()
        .chain(setup.rationale().iter().map(String::as_str))
        .chain(setup.grade_debug_reason());
    let mut unique: Vec<String> = Vec::new();
    for reason in candidates {
        if reason.trim().is_empty() || unique.iter().any(|r| r == reason) {
            continue;
        }
        unique.push(reason.to_string());
        if unique.len() >= MAX_REASONS {
            break;
        }
    }
    unique
}

fn replace_alignment_reasons(reasons: Vec<String>, replacement: String) -> Vec<String> {
    let mut mapped: Vec<String> = reasons
        .into_iter()
        .map(|r| {
            if r.to_lowercase().contains("no default alignment") {
                replacement.clone()
            } else {
                r
            }
        })
        .collect();
    if !mapped.contains(&replacement) {
        mapped.insert(0, replacement);
    }
    mapped.dedup();
    mapped.truncate(MAX_REASONS);
    mapped
}

fn ensure(reasons: Vec<String>, fallback: &str) -> Vec<String> {
    if reasons.is_empty() {
        vec![fallback.to_string()]
    } else {
        reasons
    }
}

fn contains_keyword(texts: &[&str], keywords: &[String]) -> bool {
    texts.iter().any(|text| {
        let text = text.to_lowercase();
        keywords.iter().any(|kw| text.contains(&kw.to_lowercase()))
    })
}
