//! Property tests for the classification layer.
//!
//! Uses proptest to verify:
//! 1. Classifier idempotence: the same setup and outcome always classify the same
//! 2. Segment exclusivity: every score combination lands in exactly one segment
//! 3. Trend priority: a failing trend always wins over a failing bias
//! 4. Fallback gating: a disabled fallback never derives a playbook

use proptest::prelude::*;
use swinglab_core::domain::Rings;
use swinglab_core::{
    classify_decision, DecisionPolicy, Dimension, DimensionResolver, DimensionSource, Outcome,
    ResolutionDiagnostics, Setup, WatchScores, WatchSegment,
};

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_score() -> impl Strategy<Value = Option<f64>> {
    prop_oneof![
        1 => Just(None),
        4 => (0.0..100.0_f64).prop_map(|s| Some(s.round())),
    ]
}

fn arb_text() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        Just(None),
        Just(Some("Trend too weak".to_string())),
        Just(Some("Event conflict".to_string())),
        Just(Some("Stale data".to_string())),
        Just(Some("No default alignment".to_string())),
    ]
}

fn arb_grade() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        Just(None),
        Just(Some("A".to_string())),
        Just(Some("B".to_string())),
        Just(Some("NO_TRADE".to_string())),
    ]
}

fn arb_playbook() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        Just(None),
        Just(Some("gold-swing-v0.2".to_string())),
        Just(Some("crypto-swing-v0.1".to_string())),
        Just(Some("spx-swing-v0.1".to_string())),
        Just(Some("generic-swing-v0.1".to_string())),
    ]
}

fn arb_asset() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("wti".to_string()),
        Just("gold".to_string()),
        Just("btc".to_string()),
        Just("audusd".to_string()),
        Just("corn".to_string()),
        Just("spx".to_string()),
    ]
}

prop_compose! {
    fn arb_setup()(
        grade in arb_grade(),
        playbook in arb_playbook(),
        reason in arb_text(),
        bias in arb_score(),
        trend in arb_score(),
        ring_conf in arb_score(),
        direction in prop_oneof![Just(None), Just(Some("long".to_string())), Just(Some("short".to_string()))],
    ) -> Setup {
        Setup {
            setup_grade: grade,
            setup_playbook_id: playbook,
            no_trade_reason: reason,
            bias_score: bias,
            trend_score: trend,
            direction,
            rings: Some(Rings { confidence_score: ring_conf, ..Default::default() }),
            ..Default::default()
        }
    }
}

fn outcome_for(asset: &str, playbook: Option<String>, reason: Option<String>) -> Outcome {
    Outcome {
        outcome_id: "o-1".into(),
        snapshot_id: "snap-1".into(),
        setup_id: "s-1".into(),
        asset_id: Some(asset.to_string()),
        timeframe: Some("1d".into()),
        evaluation_timeframe: None,
        outcome_status: Some("hit_tp".into()),
        evaluated_at: None,
        playbook_id: playbook,
        decision: None,
        grade: None,
        setup_grade: None,
        setup_type: None,
        no_trade_reason: reason,
        grade_rationale: None,
        label: Some("eod".into()),
    }
}

// ── 1. Classifier Idempotence ────────────────────────────────────────

proptest! {
    #[test]
    fn classifier_is_idempotent(
        setup in arb_setup(),
        matched in any::<bool>(),
        grade in arb_grade(),
        asset in arb_asset(),
        reason in arb_text(),
    ) {
        let policy = DecisionPolicy::default();
        let outcome = outcome_for(&asset, setup.setup_playbook_id.clone(), reason);
        let matched_setup = matched.then_some(&setup);

        let first = classify_decision(&policy, grade.as_deref(), matched_setup, &outcome);
        // Interleave an unrelated call; the classifier holds no state.
        let _ = classify_decision(&policy, Some("A"), None, &outcome);
        let second = classify_decision(&policy, grade.as_deref(), matched_setup, &outcome);

        prop_assert_eq!(first, second);
    }

    #[test]
    fn reasons_never_exceed_three(setup in arb_setup()) {
        let result = DecisionPolicy::default().evaluate(&setup);
        prop_assert!(result.reasons.len() <= 3);
    }
}

// ── 2./3. Watch Segments ─────────────────────────────────────────────

proptest! {
    #[test]
    fn segment_is_stable_and_defined(
        bias in arb_score(),
        trend in arb_score(),
        sq in arb_score(),
        conf in arb_score(),
    ) {
        let scores = WatchScores { bias, trend, signal_quality: sq, confidence: conf };
        let segment = scores.classify();
        prop_assert!(WatchSegment::ALL.contains(&segment));
        prop_assert_eq!(segment, scores.classify());
    }

    #[test]
    fn failing_trend_beats_failing_bias(
        bias in 0.0..70.0_f64,
        trend in 0.0..50.0_f64,
        sq in arb_score(),
        conf in arb_score(),
    ) {
        let scores = WatchScores {
            bias: Some(bias),
            trend: Some(trend),
            signal_quality: sq,
            confidence: conf,
        };
        prop_assert_eq!(scores.classify(), WatchSegment::FailsTrend);
    }
}

#[test]
fn trend_40_bias_40_is_fails_trend() {
    let setup = Setup {
        bias_score: Some(40.0),
        trend_score: Some(40.0),
        ..Default::default()
    };
    assert_eq!(WatchScores::resolve(&setup).classify(), WatchSegment::FailsTrend);
}

// ── 4. Fallback Gating ───────────────────────────────────────────────

proptest! {
    #[test]
    fn disabled_fallback_never_derives(
        asset in arb_asset(),
        playbook in arb_playbook(),
        setup in proptest::option::of(arb_setup()),
    ) {
        let resolver = DimensionResolver::new(false);
        let mut diagnostics = ResolutionDiagnostics::default();
        let outcome = outcome_for(&asset, playbook, None);

        let dims = resolver.resolve_all(setup.as_ref(), &outcome, &asset, &mut diagnostics);

        prop_assert_ne!(dims.playbook_id.source(), DimensionSource::Derived);
        prop_assert_eq!(diagnostics.fallback_used_count, 0);
        prop_assert_eq!(diagnostics.dimension_source_counts.playbook_id.derived, 0);
    }

    #[test]
    fn every_resolution_is_tallied_once(
        asset in arb_asset(),
        playbook in arb_playbook(),
        allow in any::<bool>(),
    ) {
        let resolver = DimensionResolver::new(allow);
        let mut diagnostics = ResolutionDiagnostics::default();
        let outcome = outcome_for(&asset, playbook, None);
        resolver.resolve_all(None, &outcome, &asset, &mut diagnostics);

        let counts = &diagnostics.dimension_source_counts;
        for dimension in Dimension::ALL {
            prop_assert_eq!(counts.tally(dimension).total(), 1);
        }
        prop_assert_eq!(diagnostics.fallback_used_count, counts.playbook_id.derived);
    }
}
