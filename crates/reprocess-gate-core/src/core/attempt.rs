// crates/reprocess-gate-core/src/core/attempt.rs
// ============================================================================
// Module: Reprocess Gate Attempt Records
// Description: Work units and the append-only reprocess attempt log rows.
// Purpose: Define the authoritative history the circuit breaker consults.
// Dependencies: crate::core, serde, thiserror
// ============================================================================

//! ## Overview
//! A [`WorkUnit`] names one `(processor, entity, date)` unit of gated work.
//! Every evaluation outcome is journaled as a [`ReprocessAttempt`]; rows are
//! append-only and never mutated. Attempt stores receive an [`AttemptDraft`]
//! and assign the next attempt number atomically.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::fingerprint::Fingerprint;
use crate::core::identifiers::EntityId;
use crate::core::identifiers::ProcessorName;
use crate::core::identifiers::RequirementName;
use crate::core::time::AnalysisDate;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Work Units
// ============================================================================

/// Identifies what is being gated.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WorkUnit {
    /// Processor requesting the gate.
    pub processor_name: ProcessorName,
    /// Entity key.
    pub entity_id: EntityId,
    /// Date under analysis.
    pub analysis_date: AnalysisDate,
}

impl WorkUnit {
    /// Creates a new work unit.
    #[must_use]
    pub fn new(
        processor_name: impl Into<ProcessorName>,
        entity_id: impl Into<EntityId>,
        analysis_date: AnalysisDate,
    ) -> Self {
        Self {
            processor_name: processor_name.into(),
            entity_id: entity_id.into(),
            analysis_date,
        }
    }

    /// Returns the key the circuit breaker is tracked under.
    #[must_use]
    pub fn breaker_key(&self) -> BreakerKey {
        BreakerKey {
            processor_name: self.processor_name.clone(),
            entity_id: self.entity_id.clone(),
        }
    }
}

/// Circuit breaker scope: one breaker per processor and entity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BreakerKey {
    /// Processor name.
    pub processor_name: ProcessorName,
    /// Entity key.
    pub entity_id: EntityId,
}

// ============================================================================
// SECTION: Attempt Rows
// ============================================================================

/// How an attempt resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// Work ran and succeeded.
    Success,
    /// Work failed or was aborted by the gate.
    Failure,
    /// Gate skipped the unit because the breaker was open.
    Skipped,
    /// Operator cleared the breaker.
    ManualReset,
}

impl AttemptOutcome {
    /// Returns a stable label for storage and logging.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Skipped => "skipped",
            Self::ManualReset => "manual_reset",
        }
    }

    /// Parses a stored label.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "success" => Some(Self::Success),
            "failure" => Some(Self::Failure),
            "skipped" => Some(Self::Skipped),
            "manual_reset" => Some(Self::ManualReset),
            _ => None,
        }
    }
}

/// Attempt row prior to number assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptDraft {
    /// Unit of work the attempt belongs to.
    pub work_unit: WorkUnit,
    /// Attempt resolution.
    pub outcome: AttemptOutcome,
    /// Completeness at attempt time.
    pub completeness_pct: f64,
    /// Reason the unit did not run successfully, if any.
    pub skip_reason: Option<String>,
    /// Whether this attempt leaves the breaker tripped.
    pub circuit_breaker_tripped: bool,
    /// Cooldown end when tripped.
    pub circuit_breaker_until: Option<Timestamp>,
    /// Whether an operator override produced this row.
    pub manual_override_applied: bool,
    /// Attempt time.
    pub attempted_at: Timestamp,
    /// Upstream fingerprints observed for point-in-time requirements.
    #[serde(default)]
    pub source_hashes: BTreeMap<RequirementName, Fingerprint>,
}

impl AttemptDraft {
    /// Validates the row invariants before it is appended.
    ///
    /// # Errors
    ///
    /// Returns [`AttemptError`] when completeness is out of range or the
    /// breaker fields contradict each other.
    pub fn validate(&self) -> Result<(), AttemptError> {
        if !self.completeness_pct.is_finite() || !(0.0 ..= 100.0).contains(&self.completeness_pct) {
            return Err(AttemptError::Invalid(format!(
                "completeness_pct {} outside [0, 100]",
                self.completeness_pct
            )));
        }
        match (self.circuit_breaker_tripped, self.circuit_breaker_until) {
            (true, None) => {
                return Err(AttemptError::Invalid(
                    "tripped attempt requires circuit_breaker_until".to_string(),
                ));
            }
            (true, Some(until)) if until <= self.attempted_at => {
                return Err(AttemptError::Invalid(
                    "circuit_breaker_until must be after attempted_at".to_string(),
                ));
            }
            (false, Some(_)) => {
                return Err(AttemptError::Invalid(
                    "circuit_breaker_until set on an untripped attempt".to_string(),
                ));
            }
            _ => {}
        }
        if self.manual_override_applied
            && (self.outcome != AttemptOutcome::ManualReset || self.circuit_breaker_tripped)
        {
            return Err(AttemptError::Invalid(
                "manual override rows must be untripped manual resets".to_string(),
            ));
        }
        Ok(())
    }

    /// Converts the draft into a persisted row with the assigned number.
    #[must_use]
    pub fn into_attempt(self, attempt_number: u64) -> ReprocessAttempt {
        ReprocessAttempt {
            processor_name: self.work_unit.processor_name,
            entity_id: self.work_unit.entity_id,
            analysis_date: self.work_unit.analysis_date,
            attempt_number,
            outcome: self.outcome,
            completeness_pct: self.completeness_pct,
            skip_reason: self.skip_reason,
            circuit_breaker_tripped: self.circuit_breaker_tripped,
            circuit_breaker_until: self.circuit_breaker_until,
            manual_override_applied: self.manual_override_applied,
            attempted_at: self.attempted_at,
            source_hashes: self.source_hashes,
        }
    }
}

/// Persisted, append-only attempt row.
///
/// # Invariants
/// - `attempt_number` strictly increases per work unit, starting at 1, with no gaps.
/// - `circuit_breaker_tripped` implies `circuit_breaker_until > attempted_at`.
/// - `completeness_pct` lies within `[0, 100]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReprocessAttempt {
    /// Processor name.
    pub processor_name: ProcessorName,
    /// Entity key.
    pub entity_id: EntityId,
    /// Date under analysis.
    pub analysis_date: AnalysisDate,
    /// Monotonic attempt number within the work unit.
    pub attempt_number: u64,
    /// Attempt resolution.
    pub outcome: AttemptOutcome,
    /// Completeness at attempt time.
    pub completeness_pct: f64,
    /// Reason the unit did not run successfully, if any.
    pub skip_reason: Option<String>,
    /// Whether this attempt leaves the breaker tripped.
    pub circuit_breaker_tripped: bool,
    /// Cooldown end when tripped.
    pub circuit_breaker_until: Option<Timestamp>,
    /// Whether an operator override produced this row.
    pub manual_override_applied: bool,
    /// Attempt time.
    pub attempted_at: Timestamp,
    /// Upstream fingerprints observed for point-in-time requirements.
    #[serde(default)]
    pub source_hashes: BTreeMap<RequirementName, Fingerprint>,
}

impl ReprocessAttempt {
    /// Returns the work unit this row belongs to.
    #[must_use]
    pub fn work_unit(&self) -> WorkUnit {
        WorkUnit {
            processor_name: self.processor_name.clone(),
            entity_id: self.entity_id.clone(),
            analysis_date: self.analysis_date,
        }
    }
}

/// Aggregated count of attempts per skip reason, for operational reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipReasonCount {
    /// Skip reason label.
    pub skip_reason: String,
    /// Number of attempts carrying the reason.
    pub count: u64,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised by invalid attempt rows.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttemptError {
    /// Row violates an attempt invariant.
    #[error("invalid attempt: {0}")]
    Invalid(String),
}
