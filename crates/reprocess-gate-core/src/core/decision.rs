// crates/reprocess-gate-core/src/core/decision.rs
// ============================================================================
// Module: Reprocess Gate Decisions
// Description: Gate actions, refusal causes, and caller-reported outcomes.
// Purpose: Carry the RUN / SKIP / ABORT verdict and its quality metadata.
// Dependencies: crate::core, serde, thiserror
// ============================================================================

//! ## Overview
//! A [`Decision`] is what `evaluate` hands back to a processor. Callers are
//! expected to persist `completeness_pct`, `production_ready`, and
//! `quality_flags` onto their own output rows so later gates can read the
//! confidence level without recomputing it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::attempt::WorkUnit;
use crate::core::breaker::CircuitBreakerState;
use crate::core::fingerprint::Fingerprint;
use crate::core::identifiers::RequirementName;
use crate::core::requirement::DependencyKind;
use crate::core::status::DependencyStatus;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Actions and Outcomes
// ============================================================================

/// Gate verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateAction {
    /// Proceed with the work.
    Run,
    /// Breaker is open; try again after the cooldown.
    Skip,
    /// Dependencies are not good enough; retry next cycle.
    Abort,
}

impl GateAction {
    /// Returns a stable label for logging.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Run => "run",
            Self::Skip => "skip",
            Self::Abort => "abort",
        }
    }
}

/// Outcome reported by the caller after attempting the work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportOutcome {
    /// Work succeeded.
    Success,
    /// Work failed.
    Failure,
}

/// Skip reason journaled when a RUN decision is reported as failed.
pub const PROCESSING_FAILED_REASON: &str = "processing_failed";

// ============================================================================
// SECTION: Refusals
// ============================================================================

/// Typed cause of a SKIP or ABORT; `Display` renders the reason string.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GateRefusal {
    /// Breaker is open and the cooldown has not passed.
    #[error("circuit_breaker_open")]
    CircuitOpen {
        /// Cooldown end.
        cooldown_until: Option<Timestamp>,
    },
    /// A required dependency is CRITICAL.
    #[error("missing_required_dependency:{requirement}")]
    DependencyCritical {
        /// Failing requirement.
        requirement: RequirementName,
    },
    /// Overall completeness fell below the phase critical threshold.
    #[error("insufficient_completeness")]
    InsufficientCompleteness {
        /// Weighted completeness.
        completeness_pct: f64,
        /// Critical threshold in force.
        critical_pct: f64,
    },
    /// A required dependency returned a record the hasher rejected.
    #[error("malformed_record:{requirement}:{field}")]
    MalformedRecord {
        /// Failing requirement.
        requirement: RequirementName,
        /// Missing profiled field.
        field: String,
    },
    /// Evaluation exceeded the caller's deadline.
    #[error("evaluation_timeout")]
    EvaluationTimeout {
        /// Deadline in milliseconds.
        timeout_ms: u64,
    },
}

impl GateRefusal {
    /// Returns the action this refusal maps to.
    #[must_use]
    pub const fn action(&self) -> GateAction {
        match self {
            Self::CircuitOpen {
                ..
            } => GateAction::Skip,
            _ => GateAction::Abort,
        }
    }
}

// ============================================================================
// SECTION: Decision
// ============================================================================

/// Result of one gate evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// Unit of work evaluated.
    pub work_unit: WorkUnit,
    /// Verdict.
    pub action: GateAction,
    /// Human-readable reason for SKIP or ABORT.
    pub reason: Option<String>,
    /// Typed cause for SKIP or ABORT.
    pub refusal: Option<GateRefusal>,
    /// Weighted completeness in `[0, 100]`.
    pub completeness_pct: f64,
    /// Whether the output can be treated as production-grade.
    pub production_ready: bool,
    /// One flag per non-HEALTHY dependency.
    pub quality_flags: Vec<String>,
    /// Per-requirement statuses (empty when the breaker short-circuited).
    pub statuses: Vec<DependencyStatus>,
    /// Breaker view at evaluation time.
    pub breaker: CircuitBreakerState,
    /// Point-in-time fingerprints observed.
    pub source_hashes: BTreeMap<RequirementName, Fingerprint>,
    /// Evaluation time.
    pub evaluated_at: Timestamp,
    /// Attempt number journaled for SKIP or ABORT decisions.
    pub attempt_number: Option<u64>,
}

impl Decision {
    /// Returns true when the caller should do the work.
    #[must_use]
    pub fn is_run(&self) -> bool {
        self.action == GateAction::Run
    }

    /// Returns true when every hashed point-in-time source matched its
    /// fingerprint from the last successful run.
    ///
    /// Callers use this for their own idempotency skip. Returns false when no
    /// source carried a comparable hash.
    #[must_use]
    pub fn upstream_unchanged(&self) -> bool {
        let mut hashed = self
            .statuses
            .iter()
            .filter(|status| {
                status.kind == DependencyKind::PointInTime && status.source_hash.is_some()
            })
            .peekable();
        if hashed.peek().is_none() {
            return false;
        }
        hashed.all(|status| status.hash_changed == Some(false))
    }

    /// Returns the quality flags joined for storage.
    #[must_use]
    pub fn flags_joined(&self) -> String {
        self.quality_flags.join(",")
    }
}
