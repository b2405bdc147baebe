// crates/reprocess-gate-core/src/runtime/resolver.rs
// ============================================================================
// Module: Reprocess Gate Dependency Resolver
// Description: Point-in-time and historical-range checks against upstream rows.
// Purpose: Turn declared requirements into per-evaluation dependency statuses.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! [`UpstreamResolver`] is the production [`DependencyChecker`]. Point-in-time
//! requirements count rows for the same entity and date and fingerprint them
//! for change detection. Historical-range requirements count distinct periods
//! in a trailing window and are never hashed, since the window shifts daily.
//!
//! Early in a season the window cannot be full yet. Such requirements are
//! measured against what is obtainable so far and reported as WARNING with
//! `bootstrap_mode` set instead of CRITICAL.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::thread;

use crate::core::fingerprint::Fingerprint;
use crate::core::fingerprint::FingerprintError;
use crate::core::fingerprint::combine_fingerprints;
use crate::core::fingerprint::compute_fingerprint;
use crate::core::requirement::DependencyKind;
use crate::core::requirement::DependencyRequirement;
use crate::core::requirement::ExpectedRows;
use crate::core::status::DependencyStatus;
use crate::core::status::PhaseThresholds;
use crate::core::status::StatusLevel;
use crate::core::time::AnalysisDate;
use crate::core::time::MILLIS_PER_HOUR;
use crate::core::time::Timestamp;
use crate::interfaces::CheckContext;
use crate::interfaces::DependencyChecker;
use crate::interfaces::ResolverError;
use crate::interfaces::UpstreamRow;
use crate::interfaces::UpstreamStore;

// ============================================================================
// SECTION: Settings
// ============================================================================

/// Resolver tuning shared by every requirement of a processor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolverSettings {
    /// Phase thresholds used to classify completeness.
    pub thresholds: PhaseThresholds,
    /// First day of the current season or series, if tracked.
    pub season_start: Option<AnalysisDate>,
}

// ============================================================================
// SECTION: Resolver
// ============================================================================

/// Dependency checker backed by an [`UpstreamStore`].
#[derive(Debug, Clone)]
pub struct UpstreamResolver<U> {
    /// Upstream row store.
    store: U,
    /// Classification settings.
    settings: ResolverSettings,
}

impl<U: UpstreamStore> UpstreamResolver<U> {
    /// Creates a resolver over `store`.
    #[must_use]
    pub const fn new(store: U, settings: ResolverSettings) -> Self {
        Self {
            store,
            settings,
        }
    }

    /// Returns the resolver settings.
    #[must_use]
    pub const fn settings(&self) -> &ResolverSettings {
        &self.settings
    }

    /// Checks one requirement according to its kind.
    ///
    /// # Errors
    ///
    /// Returns [`ResolverError`] when upstream rows cannot be read.
    pub fn check(
        &self,
        requirement: &DependencyRequirement,
        context: &CheckContext,
    ) -> Result<DependencyStatus, ResolverError> {
        match requirement.kind {
            DependencyKind::PointInTime => self.check_point_in_time(requirement, context),
            DependencyKind::HistoricalRange => self.check_historical_range(requirement, context),
        }
    }

    /// Checks a same-period requirement and fingerprints the matched rows.
    ///
    /// # Errors
    ///
    /// Returns [`ResolverError`] when upstream rows cannot be read.
    pub fn check_point_in_time(
        &self,
        requirement: &DependencyRequirement,
        context: &CheckContext,
    ) -> Result<DependencyStatus, ResolverError> {
        let unit = &context.work_unit;
        let rows = self.store.rows_for(&requirement.source, &unit.entity_id, unit.analysis_date)?;
        let rows_found = count_u32(rows.len());
        let expected_rows = match &requirement.expected_rows {
            ExpectedRows::Fixed {
                rows,
            } => (*rows).max(1),
            ExpectedRows::Schedule {
                source,
            } => {
                let scheduled =
                    self.store.rows_for(source, &unit.entity_id, unit.analysis_date)?.len();
                if scheduled == 0 { requirement.min_rows.max(1) } else { count_u32(scheduled) }
            }
        };
        let completeness_pct = ratio_pct(rows_found, expected_rows);
        let last_updated = newest_update(&rows);
        let stale = is_stale(requirement, last_updated, context.now);

        let (source_hash, malformed_field) = fingerprint_rows(requirement, &rows)?;
        let hash_changed = source_hash.as_ref().and_then(|hash| {
            context.previous_hashes.get(&requirement.name).map(|previous| previous != hash)
        });

        let status = if malformed_field.is_some() || rows_found == 0 {
            StatusLevel::Critical
        } else {
            let level = self.settings.thresholds.classify(completeness_pct);
            if level == StatusLevel::Healthy && (rows_found < requirement.min_rows || stale) {
                StatusLevel::Warning
            } else {
                level
            }
        };

        Ok(DependencyStatus {
            requirement_name: requirement.name.clone(),
            kind: requirement.kind,
            required: requirement.required,
            weight: requirement.weight,
            available: rows_found > 0,
            rows_found,
            expected_rows,
            completeness_pct,
            source_hash,
            hash_changed,
            last_updated,
            status,
            bootstrap_mode: false,
            stale,
            malformed_field,
        })
    }

    /// Checks a sliding-window requirement by distinct periods found.
    ///
    /// # Errors
    ///
    /// Returns [`ResolverError`] when upstream rows cannot be read or the
    /// declaration lacks its window.
    pub fn check_historical_range(
        &self,
        requirement: &DependencyRequirement,
        context: &CheckContext,
    ) -> Result<DependencyStatus, ResolverError> {
        let unit = &context.work_unit;
        let (Some(lookback_days), Some(min_window_coverage)) =
            (requirement.lookback_days, requirement.min_window_coverage)
        else {
            return Err(ResolverError::Check(format!(
                "historical requirement `{}` has no window",
                requirement.name
            )));
        };
        let window_start = unit.analysis_date.checked_sub_days(lookback_days).ok_or_else(|| {
            ResolverError::Check(format!(
                "window for `{}` starts before the calendar range",
                requirement.name
            ))
        })?;
        let rows = self.store.rows_between(
            &requirement.source,
            &unit.entity_id,
            window_start,
            unit.analysis_date,
        )?;
        let periods: BTreeSet<AnalysisDate> = rows.iter().map(|row| row.analysis_date).collect();
        let rows_found = count_u32(periods.len());
        let last_updated = newest_update(&rows);
        let stale = is_stale(requirement, last_updated, context.now);

        let first_tracked =
            self.store.first_tracked_date(&requirement.source, &unit.entity_id)?;
        let history_start = match (self.settings.season_start, first_tracked) {
            (Some(season), Some(first)) => Some(season.max(first)),
            (season, first) => season.or(first),
        };
        let elapsed_days = history_start
            .map(|start| unit.analysis_date.days_since(start).max(0))
            .filter(|elapsed| *elapsed < i64::from(lookback_days));

        let (expected_rows, completeness_pct, status, bootstrap_mode) = match elapsed_days {
            Some(elapsed) => {
                let obtainable = obtainable_periods(min_window_coverage, elapsed, lookback_days);
                let completeness_pct =
                    if obtainable == 0 { 100.0 } else { ratio_pct(rows_found, obtainable) };
                if self.settings.thresholds.classify(completeness_pct) == StatusLevel::Critical {
                    (obtainable, completeness_pct, StatusLevel::Critical, false)
                } else {
                    (obtainable, completeness_pct, StatusLevel::Warning, true)
                }
            }
            None => {
                let completeness_pct = ratio_pct(rows_found, min_window_coverage);
                let status = if rows_found == 0 {
                    StatusLevel::Critical
                } else {
                    match self.settings.thresholds.classify(completeness_pct) {
                        StatusLevel::Healthy if stale => StatusLevel::Warning,
                        level => level,
                    }
                };
                (min_window_coverage, completeness_pct, status, false)
            }
        };

        Ok(DependencyStatus {
            requirement_name: requirement.name.clone(),
            kind: requirement.kind,
            required: requirement.required,
            weight: requirement.weight,
            available: rows_found > 0,
            rows_found,
            expected_rows,
            completeness_pct,
            source_hash: None,
            hash_changed: None,
            last_updated,
            status,
            bootstrap_mode,
            stale,
            malformed_field: None,
        })
    }
}

impl<U: UpstreamStore + Sync> DependencyChecker for UpstreamResolver<U> {
    fn check_all(
        &self,
        context: &CheckContext,
        requirements: &[DependencyRequirement],
    ) -> Result<Vec<DependencyStatus>, ResolverError> {
        if requirements.len() <= 1 {
            return requirements.iter().map(|requirement| self.check(requirement, context)).collect();
        }
        let results: Vec<Result<DependencyStatus, ResolverError>> = thread::scope(|scope| {
            let handles: Vec<_> = requirements
                .iter()
                .map(|requirement| scope.spawn(move || self.check(requirement, context)))
                .collect();
            handles
                .into_iter()
                .map(|handle| {
                    handle.join().unwrap_or_else(|_| {
                        Err(ResolverError::Check("dependency check worker panicked".to_string()))
                    })
                })
                .collect()
        });
        results.into_iter().collect()
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Fingerprints matched rows; returns the missing field instead of failing.
fn fingerprint_rows(
    requirement: &DependencyRequirement,
    rows: &[UpstreamRow],
) -> Result<(Option<Fingerprint>, Option<String>), ResolverError> {
    if rows.is_empty() {
        return Ok((None, None));
    }
    let mut fingerprints = Vec::with_capacity(rows.len());
    if let Some(profile) = &requirement.field_profile {
        for row in rows {
            match compute_fingerprint(&row.record, profile) {
                Ok(fingerprint) => fingerprints.push(fingerprint),
                Err(FingerprintError::MissingField(missing)) => {
                    return Ok((None, Some(missing.field)));
                }
                Err(err) => return Err(err.into()),
            }
        }
    } else {
        for row in rows {
            let Some(hash) = &row.data_hash else {
                return Ok((None, None));
            };
            fingerprints.push(hash.clone());
        }
    }
    if let [single] = fingerprints.as_slice() {
        return Ok((Some(single.clone()), None));
    }
    Ok((combine_fingerprints(&fingerprints)?, None))
}

/// Returns the realistic number of periods available after `elapsed` days.
fn obtainable_periods(min_window_coverage: u32, elapsed_days: i64, lookback_days: u32) -> u32 {
    let elapsed = u64::try_from(elapsed_days).unwrap_or(0);
    let lookback = u64::from(lookback_days).max(1);
    let scaled = u64::from(min_window_coverage).saturating_mul(elapsed).div_ceil(lookback);
    u32::try_from(scaled).unwrap_or(min_window_coverage).min(min_window_coverage)
}

/// Returns `found / expected` as a percentage capped at 100.
fn ratio_pct(found: u32, expected: u32) -> f64 {
    if expected == 0 {
        return 100.0;
    }
    (f64::from(found) / f64::from(expected) * 100.0).min(100.0)
}

/// Returns the newest writer timestamp among rows.
fn newest_update(rows: &[UpstreamRow]) -> Option<Timestamp> {
    rows.iter().map(|row| row.updated_at).max()
}

/// Returns true when the newest row is older than the requirement allows.
fn is_stale(
    requirement: &DependencyRequirement,
    last_updated: Option<Timestamp>,
    now: Timestamp,
) -> bool {
    match (requirement.max_staleness_hours, last_updated) {
        (Some(hours), Some(updated)) => {
            now.millis_since(updated) > i64::from(hours).saturating_mul(MILLIS_PER_HOUR)
        }
        _ => false,
    }
}

/// Saturates a row count into `u32`.
fn count_u32(count: usize) -> u32 {
    u32::try_from(count).unwrap_or(u32::MAX)
}
