// crates/reprocess-gate-core/tests/timeouts.rs
// ============================================================================
// Module: Evaluation Timeout Tests
// Description: Tests for deadline-bounded evaluation.
// Purpose: Ensure a hung dependency check aborts instead of blocking.
// Dependencies: reprocess-gate-core
// ============================================================================
//! ## Overview
//! Uses a checker that sleeps to force the deadline path.

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
use std::thread;
use std::time::Duration;

use reprocess_gate_core::AnalysisDate;
use reprocess_gate_core::AttemptLog;
use reprocess_gate_core::AttemptOutcome;
use reprocess_gate_core::BreakerPolicy;
use reprocess_gate_core::CheckContext;
use reprocess_gate_core::DependencyChecker;
use reprocess_gate_core::DependencyRequirement;
use reprocess_gate_core::DependencyStatus;
use reprocess_gate_core::GateAction;
use reprocess_gate_core::GateSettings;
use reprocess_gate_core::InMemoryAttemptLog;
use reprocess_gate_core::ManualClock;
use reprocess_gate_core::PhaseRole;
use reprocess_gate_core::ReprocessGate;
use reprocess_gate_core::ResolverError;
use reprocess_gate_core::ScoringWeights;
use reprocess_gate_core::Timestamp;
use reprocess_gate_core::WorkUnit;
use reprocess_gate_core::runtime::InMemoryAuditSink;

/// Checker that sleeps before reporting no statuses.
struct SleepyChecker {
    /// Time spent per call.
    delay: Duration,
}

impl DependencyChecker for SleepyChecker {
    fn check_all(
        &self,
        _context: &CheckContext,
        _requirements: &[DependencyRequirement],
    ) -> Result<Vec<DependencyStatus>, ResolverError> {
        thread::sleep(self.delay);
        Ok(Vec::new())
    }
}

/// Builds a gate around a checker with the given delay.
fn gate(
    delay: Duration,
    audit: Arc<InMemoryAuditSink>,
) -> (Arc<ReprocessGate<SleepyChecker, InMemoryAttemptLog, ManualClock>>, InMemoryAttemptLog) {
    let log = InMemoryAttemptLog::new();
    let settings = GateSettings {
        thresholds: PhaseRole::Prediction.thresholds(),
        breaker: BreakerPolicy::default(),
        weights: ScoringWeights::default(),
    };
    let gate = ReprocessGate::new(
        SleepyChecker {
            delay,
        },
        log.clone(),
        ManualClock::new(Timestamp::from_unix_millis(1_731_240_000_000)),
        settings,
    )
    .unwrap()
    .with_audit(audit);
    (Arc::new(gate), log)
}

/// Returns the unit under test.
fn unit() -> WorkUnit {
    WorkUnit::new("player_prop_predictions", "player-77", AnalysisDate::from_ymd(2024, 11, 10).unwrap())
}

/// Tests a slow check aborts with `evaluation_timeout` and is journaled.
#[test]
fn slow_check_times_out() {
    let audit = Arc::new(InMemoryAuditSink::new());
    let (gate, log) = gate(Duration::from_secs(2), Arc::clone(&audit));

    let decision = gate.evaluate_with_timeout(&unit(), &[], Duration::from_millis(50)).unwrap();

    assert_eq!(decision.action, GateAction::Abort);
    assert_eq!(decision.reason.as_deref(), Some("evaluation_timeout"));
    let attempts = log.attempts(&unit()).unwrap();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].outcome, AttemptOutcome::Failure);
    assert!(audit.events().iter().any(|event| event.event == "gate_timeout"));
}

/// Tests a fast check completes normally.
#[test]
fn fast_check_runs() {
    let audit = Arc::new(InMemoryAuditSink::new());
    let (gate, log) = gate(Duration::ZERO, audit);

    let decision = gate.evaluate_with_timeout(&unit(), &[], Duration::from_secs(5)).unwrap();

    assert_eq!(decision.action, GateAction::Run);
    assert!(log.attempts(&unit()).unwrap().is_empty());
}
