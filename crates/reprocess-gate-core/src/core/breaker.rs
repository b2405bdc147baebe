// crates/reprocess-gate-core/src/core/breaker.rs
// ============================================================================
// Module: Reprocess Gate Circuit Breaker Model
// Description: Breaker policy and state derived from attempt history.
// Purpose: Turn repeated failures into a timed backoff without mutable state.
// Dependencies: crate::core, serde, thiserror
// ============================================================================

//! ## Overview
//! Breaker state is never stored on its own. [`BreakerHistory`] folds the
//! append-only attempt rows for one `(processor, entity)` in order, and
//! [`BreakerHistory::state_at`] applies the clock:
//!
//! - OPEN while the latest row is tripped and `now < cooldown_until`.
//! - HALF_OPEN once the cooldown has passed and no newer row resolved it.
//! - CLOSED otherwise.
//!
//! The fold is clock-independent, which lets hosts cache it and invalidate on
//! append.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::attempt::AttemptOutcome;
use crate::core::attempt::ReprocessAttempt;
use crate::core::time::MILLIS_PER_HOUR;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Policy
// ============================================================================

/// Default consecutive failures before the breaker trips.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;
/// Default cooldown for the first trip, in hours.
pub const DEFAULT_BASE_COOLDOWN_HOURS: u32 = 24;
/// Default cooldown cap, in hours.
pub const DEFAULT_MAX_COOLDOWN_HOURS: u32 = 168;

/// Largest doubling exponent applied before the cap takes over.
const MAX_BACKOFF_SHIFT: u32 = 32;

/// Circuit breaker tuning.
///
/// # Invariants
/// - `failure_threshold >= 1`.
/// - `0 < base_cooldown_hours <= max_cooldown_hours`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakerPolicy {
    /// Consecutive failures that trip the breaker.
    pub failure_threshold: u32,
    /// Cooldown applied to the first trip.
    pub base_cooldown_hours: u32,
    /// Upper bound on any cooldown.
    pub max_cooldown_hours: u32,
}

impl Default for BreakerPolicy {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            base_cooldown_hours: DEFAULT_BASE_COOLDOWN_HOURS,
            max_cooldown_hours: DEFAULT_MAX_COOLDOWN_HOURS,
        }
    }
}

impl BreakerPolicy {
    /// Validates the policy.
    ///
    /// # Errors
    ///
    /// Returns [`BreakerPolicyError`] when a bound is zero or inverted.
    pub fn validate(&self) -> Result<(), BreakerPolicyError> {
        if self.failure_threshold == 0 {
            return Err(BreakerPolicyError::Invalid(
                "failure_threshold must be at least 1".to_string(),
            ));
        }
        if self.base_cooldown_hours == 0 {
            return Err(BreakerPolicyError::Invalid(
                "base_cooldown_hours must be greater than zero".to_string(),
            ));
        }
        if self.max_cooldown_hours < self.base_cooldown_hours {
            return Err(BreakerPolicyError::Invalid(
                "max_cooldown_hours must be >= base_cooldown_hours".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the cooldown in milliseconds for the `trip`-th consecutive trip.
    ///
    /// The first trip uses the base cooldown; each further trip doubles it up
    /// to the cap.
    #[must_use]
    pub fn cooldown_for_trip(&self, trip: u32) -> i64 {
        let shift = trip.saturating_sub(1).min(MAX_BACKOFF_SHIFT);
        let hours = u64::from(self.base_cooldown_hours)
            .checked_shl(shift)
            .unwrap_or(u64::MAX)
            .min(u64::from(self.max_cooldown_hours));
        i64::try_from(hours).unwrap_or(i64::MAX).saturating_mul(MILLIS_PER_HOUR)
    }
}

/// Errors raised by invalid breaker policies.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BreakerPolicyError {
    /// Policy bound is invalid.
    #[error("invalid breaker policy: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Breaker State
// ============================================================================

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    /// Normal evaluation.
    #[default]
    Closed,
    /// Evaluation blocked until the cooldown passes.
    Open,
    /// Cooldown passed; the next evaluation is a probe.
    HalfOpen,
}

impl BreakerState {
    /// Returns a stable label for logging.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

/// Breaker view for one `(processor, entity)` at a given instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CircuitBreakerState {
    /// Current state.
    pub state: BreakerState,
    /// Failures since the last success or reset.
    pub consecutive_failures: u32,
    /// Trips since the last success or reset.
    pub consecutive_trips: u32,
    /// When the most recent trip happened.
    pub tripped_at: Option<Timestamp>,
    /// When the most recent cooldown ends.
    pub cooldown_until: Option<Timestamp>,
}

/// Breaker fields to journal on a failure attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TripOutcome {
    /// Whether the attempt leaves the breaker tripped.
    pub tripped: bool,
    /// Cooldown end when tripped.
    pub until: Option<Timestamp>,
}

// ============================================================================
// SECTION: History Fold
// ============================================================================

/// Clock-independent fold over a breaker key's attempt rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BreakerHistory {
    /// Failures since the last success or reset.
    pub consecutive_failures: u32,
    /// Trips since the last success or reset.
    pub consecutive_trips: u32,
    /// Whether the latest row left the breaker tripped.
    pub tripped: bool,
    /// When the most recent trip happened.
    pub tripped_at: Option<Timestamp>,
    /// When the most recent cooldown ends.
    pub cooldown_until: Option<Timestamp>,
    /// Number of rows folded.
    pub attempts_seen: u64,
}

impl BreakerHistory {
    /// Folds rows supplied in append order.
    #[must_use]
    pub fn from_attempts<'a, I>(attempts: I) -> Self
    where
        I: IntoIterator<Item = &'a ReprocessAttempt>,
    {
        let mut history = Self::default();
        for attempt in attempts {
            history.apply(attempt);
        }
        history
    }

    /// Applies one newly appended row.
    pub fn apply(&mut self, attempt: &ReprocessAttempt) {
        self.attempts_seen = self.attempts_seen.saturating_add(1);
        match attempt.outcome {
            AttemptOutcome::Success | AttemptOutcome::ManualReset => {
                let seen = self.attempts_seen;
                *self = Self {
                    attempts_seen: seen,
                    ..Self::default()
                };
            }
            AttemptOutcome::Failure => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                if attempt.circuit_breaker_tripped {
                    if attempt.circuit_breaker_until != self.cooldown_until {
                        self.consecutive_trips = self.consecutive_trips.saturating_add(1);
                        self.tripped_at = Some(attempt.attempted_at);
                        self.cooldown_until = attempt.circuit_breaker_until;
                    }
                    self.tripped = true;
                } else {
                    self.tripped = false;
                }
            }
            AttemptOutcome::Skipped => {
                self.tripped = attempt.circuit_breaker_tripped;
                if attempt.circuit_breaker_tripped && attempt.circuit_breaker_until.is_some() {
                    self.cooldown_until = attempt.circuit_breaker_until;
                }
            }
        }
    }

    /// Resolves the breaker state at `now`.
    #[must_use]
    pub fn state_at(&self, now: Timestamp) -> CircuitBreakerState {
        let state = if !self.tripped {
            BreakerState::Closed
        } else if self.cooldown_until.is_some_and(|until| now < until) {
            BreakerState::Open
        } else {
            BreakerState::HalfOpen
        };
        CircuitBreakerState {
            state,
            consecutive_failures: self.consecutive_failures,
            consecutive_trips: self.consecutive_trips,
            tripped_at: self.tripped_at,
            cooldown_until: self.cooldown_until,
        }
    }

    /// Computes the breaker fields for a failure recorded at `now`.
    ///
    /// A failure while OPEN keeps the running cooldown. Otherwise the breaker
    /// trips when this failure reaches the threshold, with the cooldown for
    /// the next trip in sequence.
    #[must_use]
    pub fn next_failure(&self, policy: &BreakerPolicy, now: Timestamp) -> TripOutcome {
        if self.state_at(now).state == BreakerState::Open {
            return TripOutcome {
                tripped: true,
                until: self.cooldown_until,
            };
        }
        if self.consecutive_failures.saturating_add(1) >= policy.failure_threshold {
            let trip = self.consecutive_trips.saturating_add(1);
            return TripOutcome {
                tripped: true,
                until: Some(now.saturating_add_millis(policy.cooldown_for_trip(trip))),
            };
        }
        TripOutcome {
            tripped: false,
            until: None,
        }
    }
}
