// crates/reprocess-gate-core/src/core/status.rs
// ============================================================================
// Module: Reprocess Gate Dependency Status
// Description: Per-evaluation dependency health and phase thresholds.
// Purpose: Classify upstream completeness into HEALTHY, WARNING, or CRITICAL.
// Dependencies: crate::core, serde, thiserror
// ============================================================================

//! ## Overview
//! A [`DependencyStatus`] is created fresh on every evaluation and never
//! persisted directly; its completeness and hash are folded into the attempt
//! log. Thresholds rise through the pipeline: later phases feed user-facing
//! output and are held to a higher bar.
//!
//! | Phase role | Critical (abort) | Healthy |
//! |---|---|---|
//! | raw ingest | <30% | >=70% |
//! | analytics aggregation | <50% | >=80% |
//! | feature precompute | <60% | >=85% |
//! | prediction | <70% | >=90% |

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::fingerprint::Fingerprint;
use crate::core::identifiers::RequirementName;
use crate::core::requirement::DependencyKind;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Status Levels
// ============================================================================

/// Dependency health classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusLevel {
    /// Completeness at or above the healthy threshold.
    Healthy,
    /// Usable but degraded.
    Warning,
    /// Below the critical threshold or missing entirely.
    Critical,
}

// ============================================================================
// SECTION: Thresholds
// ============================================================================

/// Completeness thresholds for one pipeline phase.
///
/// # Invariants
/// - `0 <= critical_pct <= healthy_pct <= 100`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseThresholds {
    /// Completeness below this value is CRITICAL and aborts the unit.
    pub critical_pct: f64,
    /// Completeness at or above this value is HEALTHY and production-ready.
    pub healthy_pct: f64,
}

impl PhaseThresholds {
    /// Creates validated thresholds.
    ///
    /// # Errors
    ///
    /// Returns [`ThresholdError`] when the values are out of range or inverted.
    pub fn new(critical_pct: f64, healthy_pct: f64) -> Result<Self, ThresholdError> {
        let thresholds = Self {
            critical_pct,
            healthy_pct,
        };
        thresholds.validate()?;
        Ok(thresholds)
    }

    /// Validates the threshold pair.
    ///
    /// # Errors
    ///
    /// Returns [`ThresholdError`] when the values are out of range or inverted.
    pub fn validate(&self) -> Result<(), ThresholdError> {
        let in_range = |value: f64| value.is_finite() && (0.0 ..= 100.0).contains(&value);
        if !in_range(self.critical_pct) || !in_range(self.healthy_pct) {
            return Err(ThresholdError::OutOfRange {
                critical_pct: self.critical_pct,
                healthy_pct: self.healthy_pct,
            });
        }
        if self.critical_pct > self.healthy_pct {
            return Err(ThresholdError::Inverted {
                critical_pct: self.critical_pct,
                healthy_pct: self.healthy_pct,
            });
        }
        Ok(())
    }

    /// Classifies a completeness percentage.
    #[must_use]
    pub fn classify(&self, completeness_pct: f64) -> StatusLevel {
        if completeness_pct.is_nan() || completeness_pct < self.critical_pct {
            StatusLevel::Critical
        } else if completeness_pct >= self.healthy_pct {
            StatusLevel::Healthy
        } else {
            StatusLevel::Warning
        }
    }
}

/// Errors raised by invalid threshold pairs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ThresholdError {
    /// A threshold lies outside `[0, 100]`.
    #[error("thresholds must lie within [0, 100] (critical {critical_pct}, healthy {healthy_pct})")]
    OutOfRange {
        /// Critical threshold.
        critical_pct: f64,
        /// Healthy threshold.
        healthy_pct: f64,
    },
    /// Critical threshold exceeds healthy threshold.
    #[error("critical threshold {critical_pct} exceeds healthy threshold {healthy_pct}")]
    Inverted {
        /// Critical threshold.
        critical_pct: f64,
        /// Healthy threshold.
        healthy_pct: f64,
    },
}

/// Pipeline phase role used to pick default thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PhaseRole {
    /// Raw ingest of scraped data.
    RawIngest,
    /// Analytics aggregation.
    #[default]
    AnalyticsAggregation,
    /// Feature precompute.
    FeaturePrecompute,
    /// Prediction.
    Prediction,
}

impl PhaseRole {
    /// Returns the standardized thresholds for the phase.
    #[must_use]
    pub const fn thresholds(self) -> PhaseThresholds {
        let (critical_pct, healthy_pct) = match self {
            Self::RawIngest => (30.0, 70.0),
            Self::AnalyticsAggregation => (50.0, 80.0),
            Self::FeaturePrecompute => (60.0, 85.0),
            Self::Prediction => (70.0, 90.0),
        };
        PhaseThresholds {
            critical_pct,
            healthy_pct,
        }
    }

    /// Returns a stable label for the phase.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RawIngest => "raw_ingest",
            Self::AnalyticsAggregation => "analytics_aggregation",
            Self::FeaturePrecompute => "feature_precompute",
            Self::Prediction => "prediction",
        }
    }
}

// ============================================================================
// SECTION: Dependency Status
// ============================================================================

/// Result of checking one requirement for one unit of work.
///
/// # Invariants
/// - `completeness_pct` lies within `[0, 100]`.
/// - `source_hash` and `hash_changed` are only set for point-in-time checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyStatus {
    /// Requirement this status describes.
    pub requirement_name: RequirementName,
    /// Check pattern used.
    pub kind: DependencyKind,
    /// Whether the requirement hard-fails on CRITICAL.
    pub required: bool,
    /// Scoring weight override carried from the requirement.
    pub weight: Option<f64>,
    /// Whether any upstream rows were found.
    pub available: bool,
    /// Rows (or distinct periods) found.
    pub rows_found: u32,
    /// Rows (or periods) expected.
    pub expected_rows: u32,
    /// Completeness percentage in `[0, 100]`.
    pub completeness_pct: f64,
    /// Fingerprint over the matched rows.
    pub source_hash: Option<Fingerprint>,
    /// Whether the fingerprint differs from the last successful run.
    pub hash_changed: Option<bool>,
    /// Newest `updated_at` among the matched rows.
    pub last_updated: Option<Timestamp>,
    /// Health classification.
    pub status: StatusLevel,
    /// Whether the requirement was downgraded because history is still short.
    pub bootstrap_mode: bool,
    /// Whether the newest row exceeded the freshness bound.
    pub stale: bool,
    /// Profiled field that was missing from a matched row, if any.
    pub malformed_field: Option<String>,
}

impl DependencyStatus {
    /// Returns true when the status is HEALTHY.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.status == StatusLevel::Healthy
    }

    /// Returns true when a required dependency is CRITICAL.
    #[must_use]
    pub fn is_blocking(&self) -> bool {
        self.required && self.status == StatusLevel::Critical
    }

    /// Returns the quality flag for a non-HEALTHY status.
    #[must_use]
    pub fn quality_flag(&self) -> Option<String> {
        if self.is_healthy() {
            return None;
        }
        let category = if self.malformed_field.is_some() {
            "malformed"
        } else if self.rows_found == 0 && !self.bootstrap_mode {
            "missing"
        } else if self.bootstrap_mode {
            "early_season"
        } else if self.stale {
            "stale"
        } else {
            "low_volume"
        };
        Some(format!("{category}:{}", self.requirement_name))
    }
}
