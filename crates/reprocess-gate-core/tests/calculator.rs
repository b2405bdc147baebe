// crates/reprocess-gate-core/tests/calculator.rs
// ============================================================================
// Module: Completeness Calculator Tests
// Description: Tests for weighted completeness, readiness, and quality flags.
// Purpose: Validate scoring math and bounds across arbitrary inputs.
// Dependencies: reprocess-gate-core, proptest
// ============================================================================
//! ## Overview
//! Exercises [`CompletenessCalculator`] with hand-built statuses.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use proptest::prelude::*;
use reprocess_gate_core::CompletenessCalculator;
use reprocess_gate_core::DependencyKind;
use reprocess_gate_core::DependencyStatus;
use reprocess_gate_core::PhaseRole;
use reprocess_gate_core::RequirementName;
use reprocess_gate_core::ScoringWeights;
use reprocess_gate_core::StatusLevel;

/// Builds a status with the given completeness and level.
fn status(name: &str, required: bool, completeness_pct: f64, level: StatusLevel) -> DependencyStatus {
    DependencyStatus {
        requirement_name: RequirementName::new(name),
        kind: DependencyKind::PointInTime,
        required,
        weight: None,
        available: completeness_pct > 0.0,
        rows_found: u32::from(completeness_pct > 0.0),
        expected_rows: 1,
        completeness_pct,
        source_hash: None,
        hash_changed: None,
        last_updated: None,
        status: level,
        bootstrap_mode: false,
        stale: false,
        malformed_field: None,
    }
}

/// Calculator with analytics thresholds and default weights.
fn calculator() -> CompletenessCalculator {
    CompletenessCalculator::new(
        PhaseRole::AnalyticsAggregation.thresholds(),
        ScoringWeights::default(),
    )
}

// ============================================================================
// SECTION: Weighting
// ============================================================================

/// Tests required dependencies weigh twice as much by default.
#[test]
fn required_dependencies_weigh_more() {
    let statuses = vec![
        status("boxscore", true, 100.0, StatusLevel::Healthy),
        status("injury_report", false, 40.0, StatusLevel::Critical),
    ];

    let score = calculator().score(&statuses);

    assert!((score.completeness_pct - 80.0).abs() < 1e-9);
    assert!(score.production_ready);
    assert_eq!(score.quality_flags, vec!["low_volume:injury_report".to_string()]);
    assert!(score.critical_required.is_empty());
}

/// Tests an explicit requirement weight wins over defaults.
#[test]
fn explicit_weight_overrides_default() {
    let mut heavy = status("odds", false, 0.0, StatusLevel::Critical);
    heavy.weight = Some(3.0);
    let mut light = status("boxscore", true, 100.0, StatusLevel::Healthy);
    light.weight = Some(1.0);

    let score = calculator().score(&[light, heavy]);

    assert!((score.completeness_pct - 25.0).abs() < 1e-9);
    assert!(!score.production_ready);
}

/// Tests all-zero weights fall back to the plain mean.
#[test]
fn zero_weights_fall_back_to_mean() {
    let calculator = CompletenessCalculator::new(
        PhaseRole::RawIngest.thresholds(),
        ScoringWeights {
            required_weight: 0.0,
            optional_weight: 0.0,
        },
    );
    let statuses = vec![
        status("a", true, 90.0, StatusLevel::Healthy),
        status("b", false, 30.0, StatusLevel::Warning),
    ];

    let score = calculator.score(&statuses);

    assert!((score.completeness_pct - 60.0).abs() < 1e-9);
}

/// Tests an empty dependency list is fully complete.
#[test]
fn empty_statuses_score_full() {
    let score = calculator().score(&[]);

    assert!((score.completeness_pct - 100.0).abs() < f64::EPSILON);
    assert!(score.production_ready);
    assert!(score.quality_flags.is_empty());
}

/// Tests invalid weights are rejected.
#[test]
fn negative_weights_are_invalid() {
    let weights = ScoringWeights {
        required_weight: -1.0,
        optional_weight: 1.0,
    };
    assert!(weights.validate().is_err());
    assert!(ScoringWeights::default().validate().is_ok());
}

// ============================================================================
// SECTION: Readiness and Flags
// ============================================================================

/// Tests a CRITICAL required dependency blocks readiness.
#[test]
fn critical_required_blocks_readiness() {
    let statuses = vec![
        status("boxscore", true, 100.0, StatusLevel::Healthy),
        status("injury_report", true, 0.0, StatusLevel::Critical),
        status("odds", false, 100.0, StatusLevel::Healthy),
    ];

    let score = calculator().score(&statuses);

    assert!(!score.production_ready);
    assert_eq!(score.critical_required, vec![RequirementName::new("injury_report")]);
    assert_eq!(score.flags_joined(), "missing:injury_report");
}

/// Tests each status gets its most specific flag category.
#[test]
fn flags_use_most_specific_category() {
    let mut malformed = status("boxscore", true, 0.0, StatusLevel::Critical);
    malformed.malformed_field = Some("points".to_string());
    let mut early = status("L10_window", true, 100.0, StatusLevel::Warning);
    early.bootstrap_mode = true;
    let mut stale = status("odds", false, 100.0, StatusLevel::Warning);
    stale.stale = true;
    let healthy = status("schedule", true, 100.0, StatusLevel::Healthy);

    let score = calculator().score(&[malformed, early, stale, healthy]);

    assert_eq!(score.flags_joined(), "malformed:boxscore,early_season:L10_window,stale:odds");
}

// ============================================================================
// SECTION: Properties
// ============================================================================

/// Strategy for one arbitrary status.
fn status_strategy() -> impl Strategy<Value = DependencyStatus> {
    (
        any::<bool>(),
        prop_oneof![-500.0 .. 500.0_f64, Just(f64::NAN), Just(f64::INFINITY)],
        proptest::option::of(0.0 .. 50.0_f64),
    )
        .prop_map(|(required, pct, weight)| {
            let mut status = status("dep", required, pct, StatusLevel::Warning);
            status.weight = weight;
            status
        })
}

proptest! {
    /// Tests completeness stays within 0..=100 for arbitrary statuses.
    #[test]
    fn completeness_is_always_bounded(statuses in proptest::collection::vec(status_strategy(), 0 .. 12)) {
        let score = calculator().score(&statuses);
        prop_assert!(score.completeness_pct >= 0.0);
        prop_assert!(score.completeness_pct <= 100.0);
    }
}
