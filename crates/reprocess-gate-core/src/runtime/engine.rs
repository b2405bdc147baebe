// crates/reprocess-gate-core/src/runtime/engine.rs
// ============================================================================
// Module: Reprocess Gate Engine
// Description: RUN / SKIP / ABORT evaluation, outcome reporting, and resets.
// Purpose: Single entry point every processor consults before and after work.
// Dependencies: crate::{core, interfaces, runtime}, thiserror
// ============================================================================

//! ## Overview
//! [`ReprocessGate::evaluate`] derives breaker state from the attempt log,
//! short-circuits with SKIP while the breaker is OPEN, and otherwise checks
//! dependencies and scores them. SKIP and ABORT verdicts are journaled right
//! away. RUN verdicts stay pending until the caller reports the outcome with
//! [`ReprocessGate::report`]; at most [`MAX_PENDING_RUNS`] unreported RUN
//! verdicts are held, oldest evicted first.
//!
//! Security posture: every input is validated and store failures surface as
//! errors; the gate never guesses RUN on a failed read.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::mpsc;
use std::sync::mpsc::RecvTimeoutError;
use std::thread;
use std::time::Duration;

use thiserror::Error;

use crate::core::attempt::AttemptDraft;
use crate::core::attempt::AttemptOutcome;
use crate::core::attempt::BreakerKey;
use crate::core::attempt::ReprocessAttempt;
use crate::core::attempt::WorkUnit;
use crate::core::breaker::BreakerHistory;
use crate::core::breaker::BreakerPolicy;
use crate::core::breaker::BreakerState;
use crate::core::breaker::CircuitBreakerState;
use crate::core::breaker::TripOutcome;
use crate::core::decision::Decision;
use crate::core::decision::GateAction;
use crate::core::decision::GateRefusal;
use crate::core::decision::PROCESSING_FAILED_REASON;
use crate::core::decision::ReportOutcome;
use crate::core::fingerprint::Fingerprint;
use crate::core::identifiers::RequirementName;
use crate::core::requirement::DependencyRequirement;
use crate::core::requirement::validate_requirements;
use crate::core::status::DependencyStatus;
use crate::core::status::PhaseThresholds;
use crate::core::time::Timestamp;
use crate::interfaces::AttemptLog;
use crate::interfaces::CheckContext;
use crate::interfaces::Clock;
use crate::interfaces::DependencyChecker;
use crate::interfaces::ResolverError;
use crate::interfaces::StoreError;
use crate::runtime::audit::GateAuditEvent;
use crate::runtime::audit::GateAuditSink;
use crate::runtime::audit::NoopAuditSink;
use crate::runtime::breaker::BreakerCache;
use crate::runtime::calculator::CompletenessCalculator;
use crate::runtime::calculator::Score;
use crate::runtime::calculator::ScoringWeights;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum unreported RUN verdicts held per gate instance.
pub const MAX_PENDING_RUNS: usize = 4096;

// ============================================================================
// SECTION: Settings
// ============================================================================

/// Gate tuning for one processor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateSettings {
    /// Phase thresholds.
    pub thresholds: PhaseThresholds,
    /// Breaker policy.
    pub breaker: BreakerPolicy,
    /// Completeness weights.
    pub weights: ScoringWeights,
}

impl GateSettings {
    /// Validates every component.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Invalid`] when any component is out of range.
    pub fn validate(&self) -> Result<(), GateError> {
        self.thresholds.validate().map_err(|err| GateError::Invalid(err.to_string()))?;
        self.breaker.validate().map_err(|err| GateError::Invalid(err.to_string()))?;
        self.weights.validate().map_err(|err| GateError::Invalid(err.to_string()))?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Gate errors.
#[derive(Debug, Error)]
pub enum GateError {
    /// Attempt log failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Dependency checks failed.
    #[error(transparent)]
    Resolver(#[from] ResolverError),
    /// Caller input is invalid.
    #[error("invalid gate input: {0}")]
    Invalid(String),
    /// Evaluation worker failed.
    #[error("gate worker error: {0}")]
    Worker(String),
}

// ============================================================================
// SECTION: Engine
// ============================================================================

/// RUN verdict awaiting the caller's outcome report.
#[derive(Debug, Clone)]
struct PendingRun {
    /// Completeness at evaluation time.
    completeness_pct: f64,
    /// Fingerprints observed at evaluation time.
    source_hashes: BTreeMap<RequirementName, Fingerprint>,
    /// Evaluation time, used for eviction order.
    evaluated_at: Timestamp,
}

/// Read-only result of an evaluation before anything is journaled.
#[derive(Debug)]
struct Assessment {
    /// Unit of work.
    work_unit: WorkUnit,
    /// Evaluation time.
    now: Timestamp,
    /// Breaker fold at evaluation time.
    history: BreakerHistory,
    /// Dependency statuses.
    statuses: Vec<DependencyStatus>,
    /// Aggregate score when dependencies were checked.
    score: Option<Score>,
    /// Refusal cause, if any.
    refusal: Option<GateRefusal>,
}

/// Reprocessing gate for one processor.
pub struct ReprocessGate<R, L, C> {
    /// Dependency checker.
    checker: R,
    /// Attempt log.
    log: L,
    /// Time source.
    clock: C,
    /// Gate settings.
    settings: GateSettings,
    /// Completeness calculator.
    calculator: CompletenessCalculator,
    /// Breaker history cache.
    cache: BreakerCache,
    /// Unreported RUN verdicts, per work unit.
    pending: Mutex<BTreeMap<WorkUnit, PendingRun>>,
    /// Audit sink.
    audit: Arc<dyn GateAuditSink>,
}

impl<R, L, C> ReprocessGate<R, L, C>
where
    R: DependencyChecker,
    L: AttemptLog,
    C: Clock,
{
    /// Creates a gate.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Invalid`] when the settings fail validation.
    pub fn new(checker: R, log: L, clock: C, settings: GateSettings) -> Result<Self, GateError> {
        settings.validate()?;
        Ok(Self {
            checker,
            log,
            clock,
            settings,
            calculator: CompletenessCalculator::new(settings.thresholds, settings.weights),
            cache: BreakerCache::new(),
            pending: Mutex::new(BTreeMap::new()),
            audit: Arc::new(NoopAuditSink),
        })
    }

    /// Replaces the audit sink.
    #[must_use]
    pub fn with_audit(mut self, audit: Arc<dyn GateAuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Returns the gate settings.
    #[must_use]
    pub const fn settings(&self) -> &GateSettings {
        &self.settings
    }

    /// Returns the attempt log.
    #[must_use]
    pub const fn log(&self) -> &L {
        &self.log
    }

    /// Evaluates a work unit against its requirements.
    ///
    /// # Errors
    ///
    /// Returns [`GateError`] when requirements are invalid or a store fails.
    pub fn evaluate(
        &self,
        work_unit: &WorkUnit,
        requirements: &[DependencyRequirement],
    ) -> Result<Decision, GateError> {
        let assessment = self.assess(work_unit, requirements, self.clock.now())?;
        self.commit(assessment)
    }

    /// Records the caller's outcome for the last evaluation of `work_unit`.
    ///
    /// A pending RUN verdict from this instance is journaled with its
    /// completeness and fingerprints. Otherwise, when the unit's latest row is
    /// a journaled SKIP or ABORT, that row is returned without appending
    /// another, whichever instance evaluated it. A RUN evaluated by another
    /// instance must be reported with [`ReprocessGate::report_decision`].
    ///
    /// # Errors
    ///
    /// Returns [`GateError`] when the log cannot be read or the attempt cannot
    /// be appended.
    pub fn report(
        &self,
        work_unit: &WorkUnit,
        outcome: ReportOutcome,
    ) -> Result<ReprocessAttempt, GateError> {
        let removed = self.pending_lock()?.remove(work_unit);
        if let Some(run) = removed {
            return self.record_outcome(work_unit, outcome, run.completeness_pct, run.source_hashes);
        }
        if let Some(journaled) = self.latest_refusal(work_unit)? {
            return Ok(journaled);
        }
        self.record_outcome(work_unit, outcome, 0.0, BTreeMap::new())
    }

    /// Records an outcome against a decision produced by another gate
    /// instance, such as one serialized by a separate process.
    ///
    /// # Errors
    ///
    /// Returns [`GateError`] when the journaled row cannot be found or the
    /// attempt cannot be appended.
    pub fn report_decision(
        &self,
        decision: &Decision,
        outcome: ReportOutcome,
    ) -> Result<ReprocessAttempt, GateError> {
        self.pending_lock()?.remove(&decision.work_unit);
        if let Some(number) = decision.attempt_number {
            return self
                .log
                .attempts(&decision.work_unit)?
                .into_iter()
                .find(|attempt| attempt.attempt_number == number)
                .ok_or_else(|| {
                    GateError::Invalid(format!(
                        "attempt {number} not found for {}/{}/{}",
                        decision.work_unit.processor_name,
                        decision.work_unit.entity_id,
                        decision.work_unit.analysis_date
                    ))
                });
        }
        self.record_outcome(
            &decision.work_unit,
            outcome,
            decision.completeness_pct,
            decision.source_hashes.clone(),
        )
    }

    /// Clears the breaker for a work unit's `(processor, entity)` immediately.
    ///
    /// # Errors
    ///
    /// Returns [`GateError`] when the reset row cannot be appended.
    pub fn force_reset(&self, work_unit: &WorkUnit) -> Result<ReprocessAttempt, GateError> {
        self.pending_lock()?.remove(work_unit);
        self.append(AttemptDraft {
            work_unit: work_unit.clone(),
            outcome: AttemptOutcome::ManualReset,
            completeness_pct: 0.0,
            skip_reason: None,
            circuit_breaker_tripped: false,
            circuit_breaker_until: None,
            manual_override_applied: true,
            attempted_at: self.clock.now(),
            source_hashes: BTreeMap::new(),
        })
    }

    /// Returns the current breaker state for a key.
    ///
    /// # Errors
    ///
    /// Returns [`GateError`] when the attempt log cannot be read.
    pub fn breaker_state(&self, key: &BreakerKey) -> Result<CircuitBreakerState, GateError> {
        Ok(self.cache.history(key, &self.log)?.state_at(self.clock.now()))
    }

    /// Returns a work unit's attempts ordered by attempt number.
    ///
    /// # Errors
    ///
    /// Returns [`GateError`] when the attempt log cannot be read.
    pub fn attempts(&self, work_unit: &WorkUnit) -> Result<Vec<ReprocessAttempt>, GateError> {
        Ok(self.log.attempts(work_unit)?)
    }

    /// Runs the read-only part of an evaluation.
    fn assess(
        &self,
        work_unit: &WorkUnit,
        requirements: &[DependencyRequirement],
        now: Timestamp,
    ) -> Result<Assessment, GateError> {
        validate_requirements(requirements).map_err(|err| GateError::Invalid(err.to_string()))?;
        let history = self.cache.history(&work_unit.breaker_key(), &self.log)?;
        let breaker = history.state_at(now);
        if breaker.state == BreakerState::Open {
            return Ok(Assessment {
                work_unit: work_unit.clone(),
                now,
                history,
                statuses: Vec::new(),
                score: None,
                refusal: Some(GateRefusal::CircuitOpen {
                    cooldown_until: breaker.cooldown_until,
                }),
            });
        }
        let context = CheckContext {
            work_unit: work_unit.clone(),
            now,
            previous_hashes: self.previous_hashes(work_unit)?,
        };
        let statuses = self.checker.check_all(&context, requirements)?;
        let score = self.calculator.score(&statuses);
        let refusal = self.refusal_for(&statuses, &score);
        Ok(Assessment {
            work_unit: work_unit.clone(),
            now,
            history,
            statuses,
            score: Some(score),
            refusal,
        })
    }

    /// Picks the refusal, if any, for a scored evaluation.
    fn refusal_for(&self, statuses: &[DependencyStatus], score: &Score) -> Option<GateRefusal> {
        if let Some((status, field)) = statuses.iter().find_map(|status| {
            status.malformed_field.as_ref().filter(|_| status.required).map(|field| (status, field))
        }) {
            return Some(GateRefusal::MalformedRecord {
                requirement: status.requirement_name.clone(),
                field: field.clone(),
            });
        }
        if let Some(requirement) = score.critical_required.first() {
            return Some(GateRefusal::DependencyCritical {
                requirement: requirement.clone(),
            });
        }
        if score.completeness_pct < self.settings.thresholds.critical_pct {
            return Some(GateRefusal::InsufficientCompleteness {
                completeness_pct: score.completeness_pct,
                critical_pct: self.settings.thresholds.critical_pct,
            });
        }
        None
    }

    /// Turns an assessment into a decision, journaling SKIP and ABORT.
    fn commit(&self, assessment: Assessment) -> Result<Decision, GateError> {
        let Assessment {
            work_unit,
            now,
            history,
            statuses,
            score,
            refusal,
        } = assessment;
        let (completeness_pct, production_ready, quality_flags) = score.map_or_else(
            || (0.0, false, Vec::new()),
            |score| (score.completeness_pct, score.production_ready, score.quality_flags),
        );
        let source_hashes: BTreeMap<RequirementName, Fingerprint> = statuses
            .iter()
            .filter_map(|status| {
                status.source_hash.clone().map(|hash| (status.requirement_name.clone(), hash))
            })
            .collect();
        let mut decision = Decision {
            work_unit: work_unit.clone(),
            action: refusal.as_ref().map_or(GateAction::Run, GateRefusal::action),
            reason: refusal.as_ref().map(ToString::to_string),
            refusal: refusal.clone(),
            completeness_pct,
            production_ready,
            quality_flags,
            statuses,
            breaker: history.state_at(now),
            source_hashes: source_hashes.clone(),
            evaluated_at: now,
            attempt_number: None,
        };

        match refusal {
            None => self.hold_run(work_unit, PendingRun {
                completeness_pct,
                source_hashes,
                evaluated_at: now,
            })?,
            Some(refusal) => {
                self.pending_lock()?.remove(&work_unit);
                let (outcome, trip) = match refusal {
                    GateRefusal::CircuitOpen {
                        ..
                    } => (
                        AttemptOutcome::Skipped,
                        TripOutcome {
                            tripped: true,
                            until: history.cooldown_until,
                        },
                    ),
                    _ => (AttemptOutcome::Failure, history.next_failure(&self.settings.breaker, now)),
                };
                let attempt = self.append(AttemptDraft {
                    work_unit: work_unit.clone(),
                    outcome,
                    completeness_pct,
                    skip_reason: Some(refusal.to_string()),
                    circuit_breaker_tripped: trip.tripped,
                    circuit_breaker_until: trip.until,
                    manual_override_applied: false,
                    attempted_at: now,
                    source_hashes,
                })?;
                decision.attempt_number = Some(attempt.attempt_number);
            }
        }
        self.audit.record(&GateAuditEvent::decision(&decision));
        Ok(decision)
    }

    /// Holds a RUN verdict, evicting the oldest once the map is full.
    fn hold_run(&self, work_unit: WorkUnit, run: PendingRun) -> Result<(), GateError> {
        let mut pending = self.pending_lock()?;
        pending.insert(work_unit, run);
        while pending.len() > MAX_PENDING_RUNS {
            let oldest = pending
                .iter()
                .min_by_key(|(_, run)| run.evaluated_at)
                .map(|(unit, _)| unit.clone());
            match oldest {
                Some(unit) => pending.remove(&unit),
                None => break,
            };
        }
        Ok(())
    }

    /// Returns the unit's latest row when the gate journaled it as a refusal.
    fn latest_refusal(&self, work_unit: &WorkUnit) -> Result<Option<ReprocessAttempt>, GateError> {
        Ok(self.log.attempts(work_unit)?.pop().filter(is_journaled_refusal))
    }

    /// Journals a reported outcome.
    fn record_outcome(
        &self,
        work_unit: &WorkUnit,
        outcome: ReportOutcome,
        completeness_pct: f64,
        source_hashes: BTreeMap<RequirementName, Fingerprint>,
    ) -> Result<ReprocessAttempt, GateError> {
        let now = self.clock.now();
        let (outcome, trip, skip_reason) = match outcome {
            ReportOutcome::Success => (
                AttemptOutcome::Success,
                TripOutcome {
                    tripped: false,
                    until: None,
                },
                None,
            ),
            ReportOutcome::Failure => {
                let history = self.cache.history(&work_unit.breaker_key(), &self.log)?;
                (
                    AttemptOutcome::Failure,
                    history.next_failure(&self.settings.breaker, now),
                    Some(PROCESSING_FAILED_REASON.to_string()),
                )
            }
        };
        self.append(AttemptDraft {
            work_unit: work_unit.clone(),
            outcome,
            completeness_pct,
            skip_reason,
            circuit_breaker_tripped: trip.tripped,
            circuit_breaker_until: trip.until,
            manual_override_applied: false,
            attempted_at: now,
            source_hashes,
        })
    }

    /// Appends a row, invalidates the breaker cache, and audits the attempt.
    fn append(&self, draft: AttemptDraft) -> Result<ReprocessAttempt, GateError> {
        let key = draft.work_unit.breaker_key();
        let appended = self.log.append(draft);
        self.cache.invalidate(&key)?;
        let attempt = appended?;
        let state = if attempt.circuit_breaker_tripped {
            BreakerState::Open
        } else {
            BreakerState::Closed
        };
        self.audit.record(&GateAuditEvent::attempt(&attempt, state));
        Ok(attempt)
    }

    /// Returns fingerprints from the last successful attempt of a work unit.
    fn previous_hashes(
        &self,
        work_unit: &WorkUnit,
    ) -> Result<BTreeMap<RequirementName, Fingerprint>, GateError> {
        Ok(self
            .log
            .attempts(work_unit)?
            .into_iter()
            .rev()
            .find(|attempt| attempt.outcome == AttemptOutcome::Success)
            .map(|attempt| attempt.source_hashes)
            .unwrap_or_default())
    }

    /// Locks the pending decision map.
    fn pending_lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, BTreeMap<WorkUnit, PendingRun>>, GateError> {
        self.pending
            .lock()
            .map_err(|_| GateError::Store(StoreError::Store("pending map mutex poisoned".into())))
    }
}

/// Returns true for SKIP and ABORT rows written by `evaluate`.
fn is_journaled_refusal(attempt: &ReprocessAttempt) -> bool {
    match attempt.outcome {
        AttemptOutcome::Skipped => true,
        AttemptOutcome::Failure => {
            attempt.skip_reason.as_deref().is_some_and(|reason| reason != PROCESSING_FAILED_REASON)
        }
        AttemptOutcome::Success | AttemptOutcome::ManualReset => false,
    }
}

impl<R, L, C> ReprocessGate<R, L, C>
where
    R: DependencyChecker + Send + Sync + 'static,
    L: AttemptLog + Send + Sync + 'static,
    C: Clock + Send + Sync + 'static,
{
    /// Evaluates on a worker thread and aborts when `timeout` passes first.
    ///
    /// On expiry the unit is journaled as `ABORT / evaluation_timeout` and the
    /// worker's late result is discarded.
    ///
    /// # Errors
    ///
    /// Returns [`GateError`] when the worker cannot start, a store fails, or
    /// requirements are invalid.
    pub fn evaluate_with_timeout(
        self: &Arc<Self>,
        work_unit: &WorkUnit,
        requirements: &[DependencyRequirement],
        timeout: Duration,
    ) -> Result<Decision, GateError> {
        let now = self.clock.now();
        let (sender, receiver) = mpsc::channel();
        let gate = Arc::clone(self);
        let unit = work_unit.clone();
        let requirements = requirements.to_vec();
        thread::Builder::new()
            .name("reprocess-gate-eval".to_string())
            .spawn(move || {
                let _ = sender.send(gate.assess(&unit, &requirements, now));
            })
            .map_err(|err| GateError::Worker(err.to_string()))?;
        match receiver.recv_timeout(timeout) {
            Ok(assessment) => self.commit(assessment?),
            Err(RecvTimeoutError::Timeout) => self.commit_timeout(work_unit, timeout),
            Err(RecvTimeoutError::Disconnected) => {
                Err(GateError::Worker("evaluation worker exited without a result".to_string()))
            }
        }
    }

    /// Journals an evaluation that exceeded its deadline.
    fn commit_timeout(&self, work_unit: &WorkUnit, timeout: Duration) -> Result<Decision, GateError> {
        let now = self.clock.now();
        let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        let history = self.cache.history(&work_unit.breaker_key(), &self.log)?;
        self.audit.record(&GateAuditEvent::timeout(work_unit, now, timeout_ms));
        self.commit(Assessment {
            work_unit: work_unit.clone(),
            now,
            history,
            statuses: Vec::new(),
            score: None,
            refusal: Some(GateRefusal::EvaluationTimeout {
                timeout_ms,
            }),
        })
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
