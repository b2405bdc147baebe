// crates/reprocess-gate-core/tests/gate.rs
// ============================================================================
// Module: Reprocess Gate Tests
// Description: End-to-end tests for evaluate, report, and force reset.
// Purpose: Validate journaling, breaker transitions, and refusal reasons.
// Dependencies: reprocess-gate-core, serde_json
// ============================================================================
//! ## Overview
//! Drives [`ReprocessGate`] over in-memory stores and a manual clock. The
//! dependency checker is wrapped with a call counter so fast-fail paths can
//! be asserted.

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

use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use reprocess_gate_core::AnalysisDate;
use reprocess_gate_core::AttemptLog;
use reprocess_gate_core::AttemptOutcome;
use reprocess_gate_core::BreakerPolicy;
use reprocess_gate_core::BreakerState;
use reprocess_gate_core::CheckContext;
use reprocess_gate_core::Clock;
use reprocess_gate_core::DependencyChecker;
use reprocess_gate_core::DependencyRequirement;
use reprocess_gate_core::DependencyStatus;
use reprocess_gate_core::EntityId;
use reprocess_gate_core::FieldProfile;
use reprocess_gate_core::GateAction;
use reprocess_gate_core::GateError;
use reprocess_gate_core::GateRefusal;
use reprocess_gate_core::GateSettings;
use reprocess_gate_core::InMemoryAttemptLog;
use reprocess_gate_core::InMemoryUpstreamStore;
use reprocess_gate_core::ManualClock;
use reprocess_gate_core::PhaseRole;
use reprocess_gate_core::ReportOutcome;
use reprocess_gate_core::ReprocessGate;
use reprocess_gate_core::RequirementName;
use reprocess_gate_core::ResolverError;
use reprocess_gate_core::ResolverSettings;
use reprocess_gate_core::ScoringWeights;
use reprocess_gate_core::SourceId;
use reprocess_gate_core::Timestamp;
use reprocess_gate_core::UpstreamResolver;
use reprocess_gate_core::UpstreamRow;
use reprocess_gate_core::WorkUnit;
use reprocess_gate_core::core::time::MILLIS_PER_HOUR;
use reprocess_gate_core::runtime::InMemoryAuditSink;
use serde_json::Value;
use serde_json::json;

/// Start time of the manual clock.
const T0: i64 = 1_731_240_000_000;
/// Processor under test.
const PROCESSOR: &str = "player_game_summary";

// ============================================================================
// SECTION: Harness
// ============================================================================

/// Dependency checker that counts invocations.
struct CountingChecker {
    /// Production resolver.
    inner: UpstreamResolver<InMemoryUpstreamStore>,
    /// Number of `check_all` calls.
    calls: Arc<AtomicUsize>,
}

impl DependencyChecker for CountingChecker {
    fn check_all(
        &self,
        context: &CheckContext,
        requirements: &[DependencyRequirement],
    ) -> Result<Vec<DependencyStatus>, ResolverError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.check_all(context, requirements)
    }
}

/// Gate type used by these tests.
type TestGate = ReprocessGate<CountingChecker, InMemoryAttemptLog, ManualClock>;

/// Gate plus handles on its collaborators.
struct Harness {
    /// Gate under test.
    gate: TestGate,
    /// Upstream rows.
    store: InMemoryUpstreamStore,
    /// Attempt log shared with the gate.
    log: InMemoryAttemptLog,
    /// Clock shared with the gate.
    clock: ManualClock,
    /// Checker call counter.
    calls: Arc<AtomicUsize>,
    /// Season start used by the resolver.
    season_start: Option<AnalysisDate>,
    /// Audit events.
    audit: Arc<InMemoryAuditSink>,
}

impl Harness {
    /// Builds a harness with analytics thresholds.
    fn new(season_start: Option<AnalysisDate>) -> Self {
        let store = InMemoryUpstreamStore::new();
        let log = InMemoryAttemptLog::new();
        let clock = ManualClock::new(Timestamp::from_unix_millis(T0));
        let calls = Arc::new(AtomicUsize::new(0));
        let audit = Arc::new(InMemoryAuditSink::new());
        let gate = build_gate(&store, &log, &clock, &calls, season_start).with_audit(audit.clone());
        Self {
            gate,
            store,
            log,
            clock,
            calls,
            season_start,
            audit,
        }
    }

    /// Builds a second gate instance over the same stores and clock.
    fn second_gate(&self) -> TestGate {
        build_gate(&self.store, &self.log, &self.clock, &self.calls, self.season_start)
    }

    /// Returns the number of checker calls so far.
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Inserts an upstream row for `entity` on `date`.
    fn insert(&self, source: &str, entity: &str, date: AnalysisDate, key: &str, payload: Value) {
        let Value::Object(record) = payload else {
            panic!("payload must be an object");
        };
        self.store
            .insert(UpstreamRow {
                source: SourceId::new(source),
                entity_id: EntityId::new(entity),
                analysis_date: date,
                row_key: key.to_string(),
                record,
                data_hash: None,
                updated_at: Timestamp::from_unix_millis(T0 - MILLIS_PER_HOUR),
            })
            .unwrap();
    }
}

/// Builds a gate over shared collaborators.
fn build_gate(
    store: &InMemoryUpstreamStore,
    log: &InMemoryAttemptLog,
    clock: &ManualClock,
    calls: &Arc<AtomicUsize>,
    season_start: Option<AnalysisDate>,
) -> TestGate {
    let thresholds = PhaseRole::AnalyticsAggregation.thresholds();
    let checker = CountingChecker {
        inner: UpstreamResolver::new(
            store.clone(),
            ResolverSettings {
                thresholds,
                season_start,
            },
        ),
        calls: Arc::clone(calls),
    };
    ReprocessGate::new(
        checker,
        log.clone(),
        clock.clone(),
        GateSettings {
            thresholds,
            breaker: BreakerPolicy::default(),
            weights: ScoringWeights::default(),
        },
    )
    .unwrap()
}

/// Returns the analysis date used by most tests.
fn game_day() -> AnalysisDate {
    AnalysisDate::from_ymd(2024, 11, 10).unwrap()
}

/// Returns a work unit for `entity` on `game_day`.
fn unit(entity: &str) -> WorkUnit {
    WorkUnit::new(PROCESSOR, entity, game_day())
}

/// Box score requirement hashed over points and minutes.
fn boxscore() -> DependencyRequirement {
    DependencyRequirement::point_in_time("boxscore", "nbac_gamebook")
        .with_field_profile(FieldProfile::new("boxscore", ["points", "minutes"]))
}

/// Injury report requirement.
fn injury_report() -> DependencyRequirement {
    DependencyRequirement::point_in_time("injury_report", "injury_report")
}

/// Returns `T0 + hours`.
fn at(hours: i64) -> Timestamp {
    Timestamp::from_unix_millis(T0 + hours * MILLIS_PER_HOUR)
}

/// Evaluates, expects RUN, and reports `outcome`.
fn run_and_report(harness: &Harness, work_unit: &WorkUnit, outcome: ReportOutcome) {
    let decision = harness.gate.evaluate(work_unit, &[boxscore()]).unwrap();
    assert_eq!(decision.action, GateAction::Run);
    harness.gate.report(work_unit, outcome).unwrap();
}

/// Evaluates the missing injury report three times, tripping the breaker.
fn trip_with_aborts(harness: &Harness, work_unit: &WorkUnit) {
    for _ in 0 .. 3 {
        let decision = harness.gate.evaluate(work_unit, &[injury_report()]).unwrap();
        assert_eq!(decision.action, GateAction::Abort);
    }
}

// ============================================================================
// SECTION: Scenarios
// ============================================================================

/// Tests a present, unchanged box score runs and reports unchanged upstream.
#[test]
fn boxscore_present_runs_and_detects_unchanged_upstream() {
    let harness = Harness::new(None);
    harness.insert("nbac_gamebook", "player-x", game_day(), "r1", json!({"points": 27, "minutes": 35}));
    let work_unit = unit("player-x");

    let first = harness.gate.evaluate(&work_unit, &[boxscore()]).unwrap();
    assert_eq!(first.action, GateAction::Run);
    assert!((first.completeness_pct - 100.0).abs() < f64::EPSILON);
    assert!(first.production_ready);
    assert!(first.reason.is_none());
    assert!(first.attempt_number.is_none());
    assert!(!first.upstream_unchanged());
    assert!(harness.log.attempts(&work_unit).unwrap().is_empty());

    let attempt = harness.gate.report(&work_unit, ReportOutcome::Success).unwrap();
    assert_eq!(attempt.attempt_number, 1);
    assert_eq!(attempt.outcome, AttemptOutcome::Success);
    assert!(attempt.source_hashes.contains_key(&RequirementName::new("boxscore")));

    harness.insert(
        "nbac_gamebook",
        "player-x",
        game_day(),
        "r1",
        json!({"points": 27, "minutes": 35, "scraped_at": "rescrape"}),
    );
    let second = harness.gate.evaluate(&work_unit, &[boxscore()]).unwrap();
    assert_eq!(second.action, GateAction::Run);
    assert_eq!(second.statuses[0].hash_changed, Some(false));
    assert!(second.upstream_unchanged());
}

/// Tests a missing required dependency aborts and trips only on the third abort.
#[test]
fn missing_injury_report_aborts_and_trips_on_third() {
    let harness = Harness::new(None);
    let work_unit = unit("player-y");

    let decision = harness.gate.evaluate(&work_unit, &[injury_report()]).unwrap();
    assert_eq!(decision.action, GateAction::Abort);
    assert_eq!(decision.reason.as_deref(), Some("missing_required_dependency:injury_report"));
    assert!(matches!(decision.refusal, Some(GateRefusal::DependencyCritical { .. })));
    assert_eq!(decision.attempt_number, Some(1));

    harness.clock.advance_hours(1);
    harness.gate.evaluate(&work_unit, &[injury_report()]).unwrap();
    harness.clock.advance_hours(1);
    harness.gate.evaluate(&work_unit, &[injury_report()]).unwrap();

    let attempts = harness.log.attempts(&work_unit).unwrap();
    let tripped: Vec<u64> = attempts
        .iter()
        .filter(|attempt| attempt.circuit_breaker_tripped)
        .map(|attempt| attempt.attempt_number)
        .collect();
    assert_eq!(tripped, vec![3]);
    assert!(attempts.iter().all(|attempt| attempt.outcome == AttemptOutcome::Failure));
    assert_eq!(attempts[2].circuit_breaker_until, Some(at(2 + 24)));
    assert_eq!(harness.calls(), 3);
}

/// Tests OPEN evaluations skip without consulting the checker.
#[test]
fn open_breaker_fast_fails_without_checking() {
    let harness = Harness::new(None);
    let work_unit = unit("player-y");
    trip_with_aborts(&harness, &work_unit);
    assert_eq!(harness.calls(), 3);

    for hour in 1 ..= 5 {
        harness.clock.advance_hours(1);
        let decision = harness.gate.evaluate(&work_unit, &[injury_report()]).unwrap();
        assert_eq!(decision.action, GateAction::Skip, "hour {hour}");
        assert_eq!(decision.reason.as_deref(), Some("circuit_breaker_open"));
        assert_eq!(decision.breaker.state, BreakerState::Open);
        assert!(decision.statuses.is_empty());
    }

    assert_eq!(harness.calls(), 3);
    let attempts = harness.log.attempts(&work_unit).unwrap();
    let skipped = &attempts[3];
    assert_eq!(skipped.outcome, AttemptOutcome::Skipped);
    assert!(skipped.circuit_breaker_tripped);
    assert_eq!(skipped.circuit_breaker_until, attempts[2].circuit_breaker_until);
}

/// Tests three reported failures open the breaker exactly once.
#[test]
fn three_reported_failures_open_once() {
    let harness = Harness::new(None);
    harness.insert("nbac_gamebook", "player-z", game_day(), "r1", json!({"points": 8, "minutes": 12}));
    let work_unit = unit("player-z");

    for _ in 0 .. 3 {
        run_and_report(&harness, &work_unit, ReportOutcome::Failure);
    }

    let attempts = harness.log.attempts(&work_unit).unwrap();
    assert_eq!(attempts.iter().filter(|attempt| attempt.circuit_breaker_tripped).count(), 1);
    assert!(attempts[2].circuit_breaker_tripped);
    assert!(attempts.iter().all(|attempt| attempt.skip_reason.as_deref() == Some("processing_failed")));
    let state = harness.gate.breaker_state(&work_unit.breaker_key()).unwrap();
    assert_eq!(state.state, BreakerState::Open);
    assert_eq!(state.consecutive_failures, 3);
}

/// Tests two failures followed by a success never trip.
#[test]
fn success_after_two_failures_resets() {
    let harness = Harness::new(None);
    harness.insert("nbac_gamebook", "player-z", game_day(), "r1", json!({"points": 8, "minutes": 12}));
    let work_unit = unit("player-z");

    run_and_report(&harness, &work_unit, ReportOutcome::Failure);
    run_and_report(&harness, &work_unit, ReportOutcome::Failure);
    run_and_report(&harness, &work_unit, ReportOutcome::Success);

    let attempts = harness.log.attempts(&work_unit).unwrap();
    assert!(attempts.iter().all(|attempt| !attempt.circuit_breaker_tripped));
    let state = harness.gate.breaker_state(&work_unit.breaker_key()).unwrap();
    assert_eq!(state.state, BreakerState::Closed);
    assert_eq!(state.consecutive_failures, 0);
}

/// Tests the HALF_OPEN probe re-opens with a doubled cooldown, then recovers.
#[test]
fn half_open_probe_failure_doubles_then_success_closes() {
    let harness = Harness::new(None);
    harness.insert("nbac_gamebook", "player-z", game_day(), "r1", json!({"points": 8, "minutes": 12}));
    let work_unit = unit("player-z");
    for _ in 0 .. 3 {
        run_and_report(&harness, &work_unit, ReportOutcome::Failure);
    }

    harness.clock.advance_hours(25);
    assert_eq!(
        harness.gate.breaker_state(&work_unit.breaker_key()).unwrap().state,
        BreakerState::HalfOpen
    );
    let calls_before = harness.calls();
    run_and_report(&harness, &work_unit, ReportOutcome::Failure);
    assert_eq!(harness.calls(), calls_before + 1);

    let probe = harness.log.attempts(&work_unit).unwrap().pop().unwrap();
    assert!(probe.circuit_breaker_tripped);
    assert_eq!(probe.circuit_breaker_until, Some(at(25 + 48)));
    assert_eq!(harness.gate.breaker_state(&work_unit.breaker_key()).unwrap().consecutive_trips, 2);

    harness.clock.advance_hours(49);
    run_and_report(&harness, &work_unit, ReportOutcome::Success);
    assert_eq!(
        harness.gate.breaker_state(&work_unit.breaker_key()).unwrap().state,
        BreakerState::Closed
    );
}

/// Tests the breaker spans dates for the same processor and entity.
#[test]
fn breaker_is_shared_across_dates() {
    let harness = Harness::new(None);
    trip_with_aborts(&harness, &unit("player-y"));
    let next_day = WorkUnit::new(PROCESSOR, "player-y", game_day().checked_add_days(1).unwrap());

    let decision = harness.gate.evaluate(&next_day, &[injury_report()]).unwrap();

    assert_eq!(decision.action, GateAction::Skip);
    assert_eq!(decision.attempt_number, Some(1));
    let other_entity = harness.gate.evaluate(&unit("player-q"), &[injury_report()]).unwrap();
    assert_eq!(other_entity.action, GateAction::Abort);
}

// ============================================================================
// SECTION: Reporting Rules
// ============================================================================

/// Tests a report after a journaled ABORT returns that row.
#[test]
fn report_after_abort_is_idempotent() {
    let harness = Harness::new(None);
    let work_unit = unit("player-y");
    let decision = harness.gate.evaluate(&work_unit, &[injury_report()]).unwrap();

    let reported = harness.gate.report(&work_unit, ReportOutcome::Failure).unwrap();
    let again = harness.gate.report(&work_unit, ReportOutcome::Failure).unwrap();

    assert_eq!(Some(reported.attempt_number), decision.attempt_number);
    assert_eq!(again.attempt_number, reported.attempt_number);
    assert_eq!(harness.log.attempts(&work_unit).unwrap().len(), 1);
}

/// Tests a report with no preceding evaluation records zero completeness.
#[test]
fn report_without_evaluation_records_zero_completeness() {
    let harness = Harness::new(None);
    let work_unit = unit("player-n");

    let attempt = harness.gate.report(&work_unit, ReportOutcome::Success).unwrap();

    assert_eq!(attempt.attempt_number, 1);
    assert!(attempt.completeness_pct.abs() < f64::EPSILON);
    assert!(attempt.source_hashes.is_empty());
}

/// Tests a failure reported while OPEN keeps the running cooldown.
#[test]
fn failure_while_open_carries_cooldown() {
    let harness = Harness::new(None);
    harness.insert("nbac_gamebook", "player-z", game_day(), "r1", json!({"points": 8, "minutes": 12}));
    let work_unit = unit("player-z");
    for _ in 0 .. 3 {
        run_and_report(&harness, &work_unit, ReportOutcome::Failure);
    }
    let until = harness.log.attempts(&work_unit).unwrap()[2].circuit_breaker_until;
    harness.clock.advance_hours(2);

    let attempt = harness.second_gate().report(&work_unit, ReportOutcome::Failure).unwrap();

    assert_eq!(attempt.attempt_number, 4);
    assert!(attempt.circuit_breaker_tripped);
    assert_eq!(attempt.circuit_breaker_until, until);
    assert_eq!(harness.gate.breaker_state(&work_unit.breaker_key()).unwrap().consecutive_trips, 1);
}

/// Tests reporting an ABORT through another instance does not count it twice.
#[test]
fn abort_reported_by_another_instance_counts_once() {
    let harness = Harness::new(None);
    let work_unit = unit("player-y");

    for cycle in 1 ..= 2_usize {
        let decision = harness.gate.evaluate(&work_unit, &[injury_report()]).unwrap();
        assert_eq!(decision.action, GateAction::Abort);
        let reported = harness.second_gate().report(&work_unit, ReportOutcome::Failure).unwrap();
        assert_eq!(Some(reported.attempt_number), decision.attempt_number);
        assert_eq!(harness.log.attempts(&work_unit).unwrap().len(), cycle);
    }

    let state = harness.gate.breaker_state(&work_unit.breaker_key()).unwrap();
    assert_eq!(state.state, BreakerState::Closed);
    assert_eq!(state.consecutive_failures, 2);

    let third = harness.gate.evaluate(&work_unit, &[injury_report()]).unwrap();
    harness.second_gate().report(&work_unit, ReportOutcome::Failure).unwrap();
    assert_eq!(third.action, GateAction::Abort);
    assert_eq!(
        harness.gate.breaker_state(&work_unit.breaker_key()).unwrap().state,
        BreakerState::Open
    );
    let skipped = harness.gate.evaluate(&work_unit, &[injury_report()]).unwrap();
    let reported = harness.second_gate().report(&work_unit, ReportOutcome::Failure).unwrap();
    assert_eq!(Some(reported.attempt_number), skipped.attempt_number);
    assert_eq!(reported.outcome, AttemptOutcome::Skipped);
    assert_eq!(harness.log.attempts(&work_unit).unwrap().len(), 4);
}

/// Tests a decision can be reported through another gate instance.
#[test]
fn report_decision_from_another_instance() {
    let harness = Harness::new(None);
    harness.insert("nbac_gamebook", "player-x", game_day(), "r1", json!({"points": 27, "minutes": 35}));
    let work_unit = unit("player-x");
    let decision = harness.gate.evaluate(&work_unit, &[boxscore()]).unwrap();

    let attempt =
        harness.second_gate().report_decision(&decision, ReportOutcome::Success).unwrap();

    assert_eq!(attempt.attempt_number, 1);
    assert!((attempt.completeness_pct - 100.0).abs() < f64::EPSILON);
    assert_eq!(attempt.source_hashes, decision.source_hashes);

    let aborted = harness.gate.evaluate(&unit("player-y"), &[injury_report()]).unwrap();
    let existing =
        harness.second_gate().report_decision(&aborted, ReportOutcome::Failure).unwrap();
    assert_eq!(Some(existing.attempt_number), aborted.attempt_number);
    assert_eq!(harness.log.attempts(&unit("player-y")).unwrap().len(), 1);
}

/// Tests a manual reset closes an OPEN breaker immediately.
#[test]
fn force_reset_closes_open_breaker() {
    let harness = Harness::new(None);
    let work_unit = unit("player-y");
    trip_with_aborts(&harness, &work_unit);

    let reset = harness.gate.force_reset(&work_unit).unwrap();

    assert_eq!(reset.outcome, AttemptOutcome::ManualReset);
    assert!(reset.manual_override_applied);
    assert!(!reset.circuit_breaker_tripped);
    assert_eq!(
        harness.gate.breaker_state(&work_unit.breaker_key()).unwrap().state,
        BreakerState::Closed
    );
    harness.insert("injury_report", "player-y", game_day(), "r1", json!({"status": "available"}));
    let decision = harness.gate.evaluate(&work_unit, &[injury_report()]).unwrap();
    assert_eq!(decision.action, GateAction::Run);
}

// ============================================================================
// SECTION: Refusal Reasons
// ============================================================================

/// Tests a malformed required record aborts with the offending field.
#[test]
fn malformed_required_record_aborts() {
    let harness = Harness::new(None);
    harness.insert("nbac_gamebook", "player-m", game_day(), "r1", json!({"points": 27}));

    let decision = harness.gate.evaluate(&unit("player-m"), &[boxscore()]).unwrap();

    assert_eq!(decision.action, GateAction::Abort);
    assert_eq!(decision.reason.as_deref(), Some("malformed_record:boxscore:minutes"));
}

/// Tests low overall completeness aborts even with no required dependency.
#[test]
fn low_completeness_aborts() {
    let harness = Harness::new(None);
    let odds = DependencyRequirement::point_in_time("odds", "odds").optional();

    let decision = harness.gate.evaluate(&unit("player-o"), &[odds]).unwrap();

    assert_eq!(decision.action, GateAction::Abort);
    assert_eq!(decision.reason.as_deref(), Some("insufficient_completeness"));
    assert_eq!(decision.quality_flags, vec!["missing:odds".to_string()]);
}

/// Tests early-season windows run in degraded mode with a flag.
#[test]
fn bootstrap_window_runs_with_early_season_flag() {
    let season_start = game_day().checked_sub_days(5).unwrap();
    let harness = Harness::new(Some(season_start));
    for day in 1 ..= 5 {
        let date = game_day().checked_sub_days(day).unwrap();
        harness.insert("games", "player-r", date, "g", json!({"points": day}));
    }
    let window = DependencyRequirement::historical_range("L10_window", "games", 10, 10);

    let decision = harness.gate.evaluate(&unit("player-r"), &[window]).unwrap();

    assert_eq!(decision.action, GateAction::Run);
    assert!(decision.statuses[0].bootstrap_mode);
    assert_eq!(decision.quality_flags, vec!["early_season:L10_window".to_string()]);
}

/// Tests duplicate requirement names are rejected before any check.
#[test]
fn duplicate_requirements_are_invalid() {
    let harness = Harness::new(None);

    let err = harness.gate.evaluate(&unit("player-x"), &[boxscore(), boxscore()]).unwrap_err();

    assert!(matches!(err, GateError::Invalid(_)));
    assert_eq!(harness.calls(), 0);
}

// ============================================================================
// SECTION: History and Audit
// ============================================================================

/// Tests attempt numbers are gapless and start at one.
#[test]
fn attempt_numbers_are_gapless() {
    let harness = Harness::new(None);
    harness.insert("nbac_gamebook", "player-x", game_day(), "r1", json!({"points": 27, "minutes": 35}));
    let work_unit = unit("player-x");

    run_and_report(&harness, &work_unit, ReportOutcome::Failure);
    harness.gate.evaluate(&work_unit, &[injury_report()]).unwrap();
    harness.gate.force_reset(&work_unit).unwrap();
    run_and_report(&harness, &work_unit, ReportOutcome::Success);

    let numbers: Vec<u64> =
        harness.gate.attempts(&work_unit).unwrap().iter().map(|a| a.attempt_number).collect();
    assert_eq!(numbers, vec![1, 2, 3, 4]);
}

/// Tests decisions and attempts are audited in order.
#[test]
fn audit_records_decisions_and_attempts() {
    let harness = Harness::new(None);
    let work_unit = unit("player-y");
    harness.gate.evaluate(&work_unit, &[injury_report()]).unwrap();
    harness.gate.force_reset(&work_unit).unwrap();

    let events = harness.audit.events();
    let names: Vec<&str> = events.iter().map(|event| event.event).collect();

    assert_eq!(names, vec!["gate_attempt", "gate_decision", "gate_reset"]);
    let decision = &events[1];
    assert_eq!(decision.reason.as_deref(), Some("missing_required_dependency:injury_report"));
    assert_eq!(decision.timestamp_ms, harness.clock.now().as_unix_millis());
}
