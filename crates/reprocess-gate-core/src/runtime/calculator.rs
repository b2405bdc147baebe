// crates/reprocess-gate-core/src/runtime/calculator.rs
// ============================================================================
// Module: Reprocess Gate Completeness Calculator
// Description: Weighted completeness, production readiness, and quality flags.
// Purpose: Fold per-requirement statuses into one decision-usable summary.
// Dependencies: crate::core, serde, thiserror
// ============================================================================

//! ## Overview
//! Required dependencies weigh more than optional ones by default; a
//! requirement's explicit weight always wins. The exact weights are a
//! deployment tuning parameter.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::identifiers::RequirementName;
use crate::core::status::DependencyStatus;
use crate::core::status::PhaseThresholds;

// ============================================================================
// SECTION: Weights
// ============================================================================

/// Default importance weight for required dependencies.
pub const DEFAULT_REQUIRED_WEIGHT: f64 = 2.0;
/// Default importance weight for optional dependencies.
pub const DEFAULT_OPTIONAL_WEIGHT: f64 = 1.0;

/// Importance weights applied when a requirement declares none.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    /// Weight of required dependencies.
    pub required_weight: f64,
    /// Weight of optional dependencies.
    pub optional_weight: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            required_weight: DEFAULT_REQUIRED_WEIGHT,
            optional_weight: DEFAULT_OPTIONAL_WEIGHT,
        }
    }
}

impl ScoringWeights {
    /// Validates the weights.
    ///
    /// # Errors
    ///
    /// Returns [`ScoringError`] when a weight is negative or not finite.
    pub fn validate(&self) -> Result<(), ScoringError> {
        for (label, weight) in
            [("required_weight", self.required_weight), ("optional_weight", self.optional_weight)]
        {
            if !weight.is_finite() || weight < 0.0 {
                return Err(ScoringError::Invalid(format!(
                    "{label} must be a finite, non-negative number"
                )));
            }
        }
        Ok(())
    }

    /// Returns the weight applied to `status`.
    #[must_use]
    pub fn weight_for(&self, status: &DependencyStatus) -> f64 {
        let weight = status.weight.unwrap_or(if status.required {
            self.required_weight
        } else {
            self.optional_weight
        });
        if weight.is_finite() && weight > 0.0 { weight } else { 0.0 }
    }
}

/// Errors raised by invalid scoring settings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScoringError {
    /// Weight is out of range.
    #[error("invalid scoring weights: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Score
// ============================================================================

/// Aggregate verdict over a set of dependency statuses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    /// Weighted completeness in `[0, 100]`.
    pub completeness_pct: f64,
    /// No required dependency is CRITICAL and completeness meets the healthy bar.
    pub production_ready: bool,
    /// One flag per non-HEALTHY status, in declaration order.
    pub quality_flags: Vec<String>,
    /// Required dependencies that are CRITICAL.
    pub critical_required: Vec<RequirementName>,
}

impl Score {
    /// Returns the quality flags joined for storage.
    #[must_use]
    pub fn flags_joined(&self) -> String {
        self.quality_flags.join(",")
    }
}

// ============================================================================
// SECTION: Calculator
// ============================================================================

/// Completeness and readiness calculator for one phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletenessCalculator {
    /// Phase thresholds.
    thresholds: PhaseThresholds,
    /// Importance weights.
    weights: ScoringWeights,
}

impl CompletenessCalculator {
    /// Creates a calculator.
    #[must_use]
    pub const fn new(thresholds: PhaseThresholds, weights: ScoringWeights) -> Self {
        Self {
            thresholds,
            weights,
        }
    }

    /// Returns the thresholds in force.
    #[must_use]
    pub const fn thresholds(&self) -> &PhaseThresholds {
        &self.thresholds
    }

    /// Scores a set of statuses.
    ///
    /// An empty set scores 100. When every weight is zero the plain mean is
    /// used instead.
    #[must_use]
    pub fn score(&self, statuses: &[DependencyStatus]) -> Score {
        let completeness_pct = self.weighted_completeness(statuses);
        let critical_required: Vec<RequirementName> = statuses
            .iter()
            .filter(|status| status.is_blocking())
            .map(|status| status.requirement_name.clone())
            .collect();
        let quality_flags = statuses.iter().filter_map(DependencyStatus::quality_flag).collect();
        Score {
            completeness_pct,
            production_ready: critical_required.is_empty()
                && completeness_pct >= self.thresholds.healthy_pct,
            quality_flags,
            critical_required,
        }
    }

    /// Computes the weighted completeness, clamped to `[0, 100]`.
    fn weighted_completeness(&self, statuses: &[DependencyStatus]) -> f64 {
        if statuses.is_empty() {
            return 100.0;
        }
        let (weighted_sum, total_weight) =
            statuses.iter().fold((0.0_f64, 0.0_f64), |(sum, total), status| {
                let weight = self.weights.weight_for(status);
                (sum + weight * clamp_pct(status.completeness_pct), total + weight)
            });
        let value = if total_weight > 0.0 {
            weighted_sum / total_weight
        } else {
            let sum: f64 = statuses.iter().map(|status| clamp_pct(status.completeness_pct)).sum();
            sum / f64::from(u32::try_from(statuses.len()).unwrap_or(u32::MAX))
        };
        clamp_pct(value)
    }
}

/// Clamps a percentage into `[0, 100]`, mapping NaN to zero.
fn clamp_pct(value: f64) -> f64 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 100.0) }
}
