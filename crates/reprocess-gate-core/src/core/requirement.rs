// crates/reprocess-gate-core/src/core/requirement.rs
// ============================================================================
// Module: Reprocess Gate Dependency Requirements
// Description: Static upstream requirement declarations per processor.
// Purpose: Describe what a processor needs before it may run.
// Dependencies: crate::core, serde, thiserror
// ============================================================================

//! ## Overview
//! Each processor declares its upstream needs once at startup as a list of
//! [`DependencyRequirement`] values. Two shapes are supported: point-in-time
//! requirements (same entity and date, compared by content hash) and
//! historical-range requirements (a sliding window measured by depth).
//! Cross-phase quality checks are plain point-in-time requirements aimed at an
//! earlier source; the resolver does not care how many phases back it is.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::fingerprint::FieldProfile;
use crate::core::identifiers::RequirementName;
use crate::core::identifiers::SourceId;

// ============================================================================
// SECTION: Requirement Types
// ============================================================================

/// Dependency check pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    /// Same-period existence with hash comparison.
    PointInTime,
    /// Sliding historical window evaluated by volume.
    HistoricalRange,
}

/// Source of the expected row count for a point-in-time requirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ExpectedRows {
    /// Constant expectation.
    Fixed {
        /// Expected row count.
        rows: u32,
    },
    /// Row count of a companion schedule source for the same entity and date.
    Schedule {
        /// Schedule source identifier.
        source: SourceId,
    },
}

/// Upstream requirement declared by a processor.
///
/// # Invariants
/// - Immutable once declared; validated with [`DependencyRequirement::validate`].
/// - `lookback_days` and `min_window_coverage` are set only for
///   [`DependencyKind::HistoricalRange`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyRequirement {
    /// Requirement name, unique per processor.
    pub name: RequirementName,
    /// Upstream source queried for rows.
    pub source: SourceId,
    /// Check pattern.
    pub kind: DependencyKind,
    /// Whether a CRITICAL status hard-fails the unit of work.
    pub required: bool,
    /// Minimum rows for a point-in-time requirement to be considered healthy.
    pub min_rows: u32,
    /// Expected row count for point-in-time completeness.
    pub expected_rows: ExpectedRows,
    /// Window length in days for historical requirements.
    pub lookback_days: Option<u32>,
    /// Minimum distinct periods expected in the historical window.
    pub min_window_coverage: Option<u32>,
    /// Fields hashed for change detection (point-in-time only).
    pub field_profile: Option<FieldProfile>,
    /// Importance weight override used by completeness scoring.
    pub weight: Option<f64>,
    /// Maximum age of the newest row before the dependency counts as stale.
    pub max_staleness_hours: Option<u32>,
}

impl DependencyRequirement {
    /// Declares a required point-in-time dependency expecting one row.
    #[must_use]
    pub fn point_in_time(name: impl Into<RequirementName>, source: impl Into<SourceId>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            kind: DependencyKind::PointInTime,
            required: true,
            min_rows: 1,
            expected_rows: ExpectedRows::Fixed {
                rows: 1,
            },
            lookback_days: None,
            min_window_coverage: None,
            field_profile: None,
            weight: None,
            max_staleness_hours: None,
        }
    }

    /// Declares a required historical-range dependency.
    #[must_use]
    pub fn historical_range(
        name: impl Into<RequirementName>,
        source: impl Into<SourceId>,
        lookback_days: u32,
        min_window_coverage: u32,
    ) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            kind: DependencyKind::HistoricalRange,
            required: true,
            min_rows: 1,
            expected_rows: ExpectedRows::Fixed {
                rows: min_window_coverage,
            },
            lookback_days: Some(lookback_days),
            min_window_coverage: Some(min_window_coverage),
            field_profile: None,
            weight: None,
            max_staleness_hours: None,
        }
    }

    /// Marks the requirement optional (soft-degrade on CRITICAL).
    #[must_use]
    pub const fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Sets the minimum healthy row count.
    #[must_use]
    pub const fn with_min_rows(mut self, min_rows: u32) -> Self {
        self.min_rows = min_rows;
        self
    }

    /// Sets the expected row count source.
    #[must_use]
    pub fn with_expected_rows(mut self, expected_rows: ExpectedRows) -> Self {
        self.expected_rows = expected_rows;
        self
    }

    /// Attaches a field profile used for change detection.
    #[must_use]
    pub fn with_field_profile(mut self, profile: FieldProfile) -> Self {
        self.field_profile = Some(profile);
        self
    }

    /// Overrides the scoring weight.
    #[must_use]
    pub const fn with_weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }

    /// Sets the freshness bound in hours.
    #[must_use]
    pub const fn with_max_staleness_hours(mut self, hours: u32) -> Self {
        self.max_staleness_hours = Some(hours);
        self
    }

    /// Validates the declaration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`RequirementError`] when fields contradict the declared kind
    /// or carry out-of-range values.
    pub fn validate(&self) -> Result<(), RequirementError> {
        if self.name.as_str().trim().is_empty() {
            return Err(RequirementError::Invalid("requirement name must be non-empty".to_string()));
        }
        if self.source.as_str().trim().is_empty() {
            return Err(self.invalid("source must be non-empty"));
        }
        if let Some(weight) = self.weight
            && (!weight.is_finite() || weight < 0.0)
        {
            return Err(self.invalid("weight must be a finite, non-negative number"));
        }
        if let Some(profile) = &self.field_profile {
            profile.validate().map_err(|err| self.invalid(&err.to_string()))?;
        }
        match self.kind {
            DependencyKind::PointInTime => {
                if self.lookback_days.is_some() || self.min_window_coverage.is_some() {
                    return Err(self.invalid("point_in_time requirements take no lookback window"));
                }
                match &self.expected_rows {
                    ExpectedRows::Fixed {
                        rows: 0,
                    } => Err(self.invalid("expected_rows must be greater than zero")),
                    ExpectedRows::Schedule {
                        source,
                    } if source.as_str().trim().is_empty() => {
                        Err(self.invalid("schedule source must be non-empty"))
                    }
                    _ => Ok(()),
                }
            }
            DependencyKind::HistoricalRange => {
                if !matches!(self.lookback_days, Some(days) if days > 0) {
                    return Err(self.invalid("historical_range requires lookback_days > 0"));
                }
                if !matches!(self.min_window_coverage, Some(depth) if depth > 0) {
                    return Err(self.invalid("historical_range requires min_window_coverage > 0"));
                }
                if self.field_profile.is_some() {
                    return Err(self.invalid("historical_range requirements are not hashed"));
                }
                Ok(())
            }
        }
    }

    /// Builds an invalid-declaration error scoped to this requirement.
    fn invalid(&self, message: &str) -> RequirementError {
        RequirementError::Invalid(format!("requirement `{}`: {message}", self.name))
    }
}

/// Validates a processor's full requirement list.
///
/// # Errors
///
/// Returns [`RequirementError`] when any declaration is invalid or names repeat.
pub fn validate_requirements(requirements: &[DependencyRequirement]) -> Result<(), RequirementError> {
    let mut names = BTreeSet::new();
    for requirement in requirements {
        requirement.validate()?;
        if !names.insert(requirement.name.as_str()) {
            return Err(RequirementError::Invalid(format!(
                "requirement `{}` is declared more than once",
                requirement.name
            )));
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised by invalid requirement declarations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequirementError {
    /// Declaration is malformed.
    #[error("invalid requirement: {0}")]
    Invalid(String),
}
