//! WATCH segment sub-classification.
//!
//! A WATCH decision is split by the first gating criterion it misses. The
//! check order is fixed: trend failures win over bias failures.

use serde::{Deserialize, Serialize};

use crate::domain::Setup;
use crate::levels::levels_complete;

pub const MIN_BIAS: f64 = 70.0;
pub const MIN_TREND: f64 = 50.0;
pub const MIN_SIGNAL_QUALITY: f64 = 55.0;
pub const MIN_CONFIDENCE: f64 = 60.0;

pub const UPGRADE_MIN_BIAS: f64 = 65.0;
pub const UPGRADE_MIN_SIGNAL_QUALITY: f64 = 55.0;
pub const UPGRADE_MIN_CONFIDENCE: f64 = 55.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WatchSegment {
    #[serde(rename = "WATCH_MEETS_REQUIREMENTS")]
    MeetsRequirements,
    #[serde(rename = "WATCH_FAILS_ONLY_CONFIDENCE")]
    FailsOnlyConfidence,
    #[serde(rename = "WATCH_FAILS_ONLY_SIGNAL_QUALITY")]
    FailsOnlySignalQuality,
    #[serde(rename = "WATCH_FAILS_TREND")]
    FailsTrend,
    #[serde(rename = "WATCH_FAILS_BIAS")]
    FailsBias,
    #[serde(rename = "WATCH_OTHER")]
    Other,
}

impl WatchSegment {
    pub const ALL: [WatchSegment; 6] = [
        WatchSegment::MeetsRequirements,
        WatchSegment::FailsOnlyConfidence,
        WatchSegment::FailsOnlySignalQuality,
        WatchSegment::FailsTrend,
        WatchSegment::FailsBias,
        WatchSegment::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WatchSegment::MeetsRequirements => "WATCH_MEETS_REQUIREMENTS",
            WatchSegment::FailsOnlyConfidence => "WATCH_FAILS_ONLY_CONFIDENCE",
            WatchSegment::FailsOnlySignalQuality => "WATCH_FAILS_ONLY_SIGNAL_QUALITY",
            WatchSegment::FailsTrend => "WATCH_FAILS_TREND",
            WatchSegment::FailsBias => "WATCH_FAILS_BIAS",
            WatchSegment::Other => "WATCH_OTHER",
        }
    }

    /// Parse a persisted segment name (case-insensitive).
    pub fn parse(raw: &str) -> Option<Self> {
        let upper = raw.trim().to_uppercase();
        Self::ALL.into_iter().find(|s| s.as_str() == upper)
    }
}

impl std::fmt::Display for WatchSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The four gating scores, each resolved through its own fallback chain.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WatchScores {
    pub bias: Option<f64>,
    pub trend: Option<f64>,
    pub signal_quality: Option<f64>,
    pub confidence: Option<f64>,
}

impl WatchScores {
    /// Explicit field, then the equivalent ring score, then (signal quality
    /// only) a value computed from the rings.
    pub fn resolve(setup: &Setup) -> Self {
        let rings = setup.rings.as_ref();
        Self {
            bias: setup.bias_score.or_else(|| rings.and_then(|r| r.bias_score)),
            trend: setup
                .trend_score
                .or_else(|| rings.and_then(|r| r.trend_score)),
            signal_quality: setup
                .signal_quality
                .as_ref()
                .and_then(|sq| sq.score)
                .or_else(|| computed_signal_quality(setup)),
            confidence: setup
                .confidence
                .or_else(|| rings.and_then(|r| r.confidence_score)),
        }
    }

    pub fn classify(&self) -> WatchSegment {
        let bias_ok = ge(self.bias, MIN_BIAS);
        let trend_ok = ge(self.trend, MIN_TREND);
        let sq_ok = ge(self.signal_quality, MIN_SIGNAL_QUALITY);
        let conf_ok = ge(self.confidence, MIN_CONFIDENCE);

        if bias_ok && trend_ok && sq_ok && conf_ok {
            WatchSegment::MeetsRequirements
        } else if bias_ok && trend_ok && sq_ok && lt(self.confidence, MIN_CONFIDENCE) {
            WatchSegment::FailsOnlyConfidence
        } else if bias_ok && trend_ok && conf_ok && lt(self.signal_quality, MIN_SIGNAL_QUALITY) {
            WatchSegment::FailsOnlySignalQuality
        } else if lt(self.trend, MIN_TREND) {
            WatchSegment::FailsTrend
        } else if lt(self.bias, MIN_BIAS) {
            WatchSegment::FailsBias
        } else {
            WatchSegment::Other
        }
    }

    fn meets_upgrade_thresholds(&self) -> bool {
        ge(self.bias, UPGRADE_MIN_BIAS)
            && ge(self.signal_quality, UPGRADE_MIN_SIGNAL_QUALITY)
            && ge(self.confidence, UPGRADE_MIN_CONFIDENCE)
    }
}

fn ge(value: Option<f64>, threshold: f64) -> bool {
    value.map_or(false, |v| v >= threshold)
}

fn lt(value: Option<f64>, threshold: f64) -> bool {
    value.map_or(false, |v| v < threshold)
}

/// A WATCH_FAILS_TREND setup that is otherwise clean enough to promote.
///
/// `event_keywords` are matched case-insensitively against the no-trade
/// reason and the grade debug text.
pub fn is_upgrade_candidate(setup: &Setup, scores: &WatchScores, event_keywords: &[String]) -> bool {
    if scores.classify() != WatchSegment::FailsTrend {
        return false;
    }
    if setup.is_stale() || !levels_complete(setup) || setup.has_critical_event() {
        return false;
    }
    let mentions_event = [setup.no_trade_reason(), setup.grade_debug_reason()]
        .into_iter()
        .flatten()
        .map(str::to_lowercase)
        .any(|text| event_keywords.iter().any(|kw| text.contains(&kw.to_lowercase())));
    !mentions_event && scores.meets_upgrade_thresholds()
}

/// Signal quality from ring scores. `None` when the setup has no rings.
pub fn computed_signal_quality(setup: &Setup) -> Option<f64> {
    let rings = setup.rings.as_ref()?;
    let clamp_pct = |v: Option<f64>| v.filter(|x| !x.is_nan()).map(|x| x.round().clamp(0.0, 100.0));

    let trend = clamp_pct(rings.trend_score);
    let bias = clamp_pct(rings.bias_score);
    let sentiment = clamp_pct(rings.sentiment_score);
    let orderflow = clamp_pct(rings.orderflow_score);
    let confidence = clamp_pct(rings.confidence_score.or(setup.confidence));
    let event = clamp_pct(rings.event_score);

    let inputs: Vec<f64> = [trend, bias, sentiment, orderflow, confidence]
        .into_iter()
        .flatten()
        .collect();
    let mut score = if inputs.is_empty() {
        50.0
    } else {
        inputs.iter().sum::<f64>() / inputs.len() as f64
    };

    if let (Some(t), Some(b)) = (trend, bias) {
        let delta = (t - b).abs();
        if delta > 30.0 {
            score -= 10.0;
        } else if t > 60.0 && b > 60.0 && delta < 15.0 {
            score += 5.0;
        }
    }
    match orderflow {
        Some(o) if o >= 65.0 => score += 3.0,
        Some(o) if o <= 40.0 => score -= 6.0,
        _ => {}
    }
    if event.is_some_and(|e| e >= 70.0) {
        score -= 7.0;
    }
    if sentiment.is_some_and(|s| s >= 80.0 || s <= 20.0) {
        score -= 4.0;
    }
    if confidence.is_some_and(|c| c <= 45.0) {
        score -= 5.0;
    }

    Some(score.round().clamp(0.0, 100.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EventModifier, Rings, SignalQualityField, Validity};
    use crate::levels::LevelValue;

    fn scores(bias: f64, trend: f64, sq: f64, conf: f64) -> WatchScores {
        WatchScores {
            bias: Some(bias),
            trend: Some(trend),
            signal_quality: Some(sq),
            confidence: Some(conf),
        }
    }

    fn clean_fails_trend_setup() -> Setup {
        Setup {
            bias_score: Some(68.0),
            trend_score: Some(40.0),
            confidence: Some(58.0),
            signal_quality: Some(SignalQualityField {
                score: Some(60.0),
                grade: None,
            }),
            entry_zone: Some(LevelValue::Text("100 - 101".into())),
            stop_loss: Some(LevelValue::Number(98.0)),
            take_profit: Some(LevelValue::Number(106.0)),
            ..Default::default()
        }
    }

    fn event_keywords() -> Vec<String> {
        vec!["event".to_string(), "conflict".to_string()]
    }

    #[test]
    fn meets_requirements() {
        assert_eq!(scores(70.0, 50.0, 55.0, 60.0).classify(), WatchSegment::MeetsRequirements);
    }

    #[test]
    fn fails_only_confidence() {
        assert_eq!(scores(75.0, 55.0, 60.0, 59.0).classify(), WatchSegment::FailsOnlyConfidence);
    }

    #[test]
    fn fails_only_signal_quality() {
        assert_eq!(scores(75.0, 55.0, 54.0, 65.0).classify(), WatchSegment::FailsOnlySignalQuality);
    }

    #[test]
    fn trend_failure_wins_over_bias_failure() {
        assert_eq!(scores(40.0, 40.0, 60.0, 60.0).classify(), WatchSegment::FailsTrend);
    }

    #[test]
    fn fails_bias() {
        assert_eq!(scores(60.0, 55.0, 60.0, 60.0).classify(), WatchSegment::FailsBias);
    }

    #[test]
    fn missing_scores_classify_as_other() {
        assert_eq!(WatchScores::default().classify(), WatchSegment::Other);
    }

    #[test]
    fn both_secondary_failures_fall_through() {
        // bias and trend pass, sq and conf both fail: not "only" anything.
        assert_eq!(scores(75.0, 55.0, 40.0, 40.0).classify(), WatchSegment::Other);
    }

    #[test]
    fn scores_fall_back_to_rings() {
        let setup = Setup {
            rings: Some(Rings {
                bias_score: Some(72.0),
                trend_score: Some(55.0),
                confidence_score: Some(61.0),
                ..Default::default()
            }),
            ..Default::default()
        };
        let s = WatchScores::resolve(&setup);
        assert_eq!(s.bias, Some(72.0));
        assert_eq!(s.trend, Some(55.0));
        assert_eq!(s.confidence, Some(61.0));
        assert!(s.signal_quality.is_some());
    }

    #[test]
    fn explicit_scores_win_over_rings() {
        let setup = Setup {
            bias_score: Some(80.0),
            rings: Some(Rings {
                bias_score: Some(10.0),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(WatchScores::resolve(&setup).bias, Some(80.0));
    }

    #[test]
    fn computed_signal_quality_applies_adjustments() {
        // avg(80, 40) = 60; conflict -10 → 50
        let conflict = Setup {
            rings: Some(Rings {
                trend_score: Some(80.0),
                bias_score: Some(40.0),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(computed_signal_quality(&conflict), Some(50.0));

        // avg(70, 70, 70) = 70; aligned +5, strong orderflow +3 → 78
        let aligned = Setup {
            rings: Some(Rings {
                trend_score: Some(70.0),
                bias_score: Some(70.0),
                orderflow_score: Some(70.0),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(computed_signal_quality(&aligned), Some(78.0));

        // no inputs → default 50; event risk -7 → 43
        let event_only = Setup {
            rings: Some(Rings {
                event_score: Some(90.0),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(computed_signal_quality(&event_only), Some(43.0));

        assert_eq!(computed_signal_quality(&Setup::default()), None);
    }

    #[test]
    fn upgrade_candidate_when_clean() {
        let setup = clean_fails_trend_setup();
        let s = WatchScores::resolve(&setup);
        assert_eq!(s.classify(), WatchSegment::FailsTrend);
        assert!(is_upgrade_candidate(&setup, &s, &event_keywords()));
    }

    #[test]
    fn stale_or_event_blocks_upgrade() {
        let mut stale = clean_fails_trend_setup();
        stale.validity = Some(Validity { is_stale: true });
        let s = WatchScores::resolve(&stale);
        assert!(!is_upgrade_candidate(&stale, &s, &event_keywords()));

        let mut critical = clean_fails_trend_setup();
        critical.event_modifier = Some(EventModifier {
            classification: Some("execution_critical".into()),
        });
        assert!(!is_upgrade_candidate(&critical, &s, &event_keywords()));

        let mut keyword = clean_fails_trend_setup();
        keyword.no_trade_reason = Some("Event window ahead".into());
        assert!(!is_upgrade_candidate(&keyword, &s, &event_keywords()));
    }

    #[test]
    fn missing_levels_block_upgrade() {
        let mut setup = clean_fails_trend_setup();
        setup.take_profit = None;
        let s = WatchScores::resolve(&setup);
        assert!(!is_upgrade_candidate(&setup, &s, &event_keywords()));
    }

    #[test]
    fn weak_bias_blocks_upgrade() {
        let mut setup = clean_fails_trend_setup();
        setup.bias_score = Some(60.0);
        let s = WatchScores::resolve(&setup);
        assert!(!is_upgrade_candidate(&setup, &s, &event_keywords()));
    }

    #[test]
    fn parses_persisted_segment_names() {
        assert_eq!(WatchSegment::parse("watch_fails_trend"), Some(WatchSegment::FailsTrend));
        assert_eq!(WatchSegment::parse("WATCH_VOLATILITY_HIGH"), None);
    }
}
