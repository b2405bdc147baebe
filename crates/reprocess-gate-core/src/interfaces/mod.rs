// crates/reprocess-gate-core/src/interfaces/mod.rs
// ============================================================================
// Module: Reprocess Gate Interfaces
// Description: Backend-agnostic interfaces for upstream data, attempts, and time.
// Purpose: Define the contract surfaces used by the reprocess gate runtime.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! Interfaces define how the gate integrates with external systems without
//! embedding backend-specific details. The gate only reads upstream rows and
//! appends attempt rows; it never mutates upstream data. Implementations must
//! fail closed on missing or invalid data.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::attempt::AttemptDraft;
use crate::core::attempt::BreakerKey;
use crate::core::attempt::ReprocessAttempt;
use crate::core::attempt::SkipReasonCount;
use crate::core::attempt::WorkUnit;
use crate::core::fingerprint::Fingerprint;
use crate::core::fingerprint::FingerprintError;
use crate::core::fingerprint::Record;
use crate::core::identifiers::EntityId;
use crate::core::identifiers::ProcessorName;
use crate::core::identifiers::RequirementName;
use crate::core::identifiers::SourceId;
use crate::core::requirement::DependencyRequirement;
use crate::core::status::DependencyStatus;
use crate::core::time::AnalysisDate;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Upstream Store
// ============================================================================

/// One upstream row as written by the producing stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpstreamRow {
    /// Source the row belongs to.
    pub source: SourceId,
    /// Entity key.
    pub entity_id: EntityId,
    /// Period the row covers.
    pub analysis_date: AnalysisDate,
    /// Row key, unique within `(source, entity, date)`.
    pub row_key: String,
    /// Flat record payload.
    pub record: Record,
    /// Fingerprint persisted by the writer, when available.
    pub data_hash: Option<Fingerprint>,
    /// When the writer last touched the row.
    pub updated_at: Timestamp,
}

/// Upstream store errors.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Store I/O error.
    #[error("upstream store io error: {0}")]
    Io(String),
    /// Stored data is invalid.
    #[error("upstream store invalid data: {0}")]
    Invalid(String),
    /// Store reported an error.
    #[error("upstream store error: {0}")]
    Store(String),
}

/// Read-only access to upstream rows, partitioned by source, entity, and date.
pub trait UpstreamStore {
    /// Returns rows for one `(entity, date)` in a source.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError`] when the lookup fails.
    fn rows_for(
        &self,
        source: &SourceId,
        entity_id: &EntityId,
        date: AnalysisDate,
    ) -> Result<Vec<UpstreamRow>, UpstreamError>;

    /// Returns rows for an entity with `start <= date < end_exclusive`.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError`] when the range scan fails.
    fn rows_between(
        &self,
        source: &SourceId,
        entity_id: &EntityId,
        start: AnalysisDate,
        end_exclusive: AnalysisDate,
    ) -> Result<Vec<UpstreamRow>, UpstreamError>;

    /// Returns the earliest date with any row for the entity in a source.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError`] when the lookup fails.
    fn first_tracked_date(
        &self,
        source: &SourceId,
        entity_id: &EntityId,
    ) -> Result<Option<AnalysisDate>, UpstreamError>;
}

// ============================================================================
// SECTION: Attempt Log
// ============================================================================

/// Attempt log errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Store I/O error.
    #[error("attempt log io error: {0}")]
    Io(String),
    /// Store data is corrupted or fails integrity checks.
    #[error("attempt log corruption: {0}")]
    Corrupt(String),
    /// Store data version is incompatible.
    #[error("attempt log version mismatch: {0}")]
    VersionMismatch(String),
    /// Store data is invalid.
    #[error("attempt log invalid data: {0}")]
    Invalid(String),
    /// Store reported an error.
    #[error("attempt log error: {0}")]
    Store(String),
}

/// Append-only reprocess attempt log.
pub trait AttemptLog {
    /// Validates and appends a row, assigning the next attempt number for its
    /// work unit atomically.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] when the draft violates an attempt
    /// invariant, or another [`StoreError`] when persistence fails.
    fn append(&self, draft: AttemptDraft) -> Result<ReprocessAttempt, StoreError>;

    /// Returns a work unit's attempts ordered by attempt number.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn attempts(&self, work_unit: &WorkUnit) -> Result<Vec<ReprocessAttempt>, StoreError>;

    /// Returns every attempt for a breaker key in append order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn history(&self, key: &BreakerKey) -> Result<Vec<ReprocessAttempt>, StoreError>;

    /// Returns a processor's attempts with `start <= analysis_date < end_exclusive`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the range scan fails.
    fn attempts_between(
        &self,
        processor: &ProcessorName,
        start: AnalysisDate,
        end_exclusive: AnalysisDate,
    ) -> Result<Vec<ReprocessAttempt>, StoreError>;

    /// Returns attempt counts per skip reason for a processor, most frequent first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the aggregation fails.
    fn skip_reason_counts(
        &self,
        processor: &ProcessorName,
    ) -> Result<Vec<SkipReasonCount>, StoreError>;
}

// ============================================================================
// SECTION: Clock
// ============================================================================

/// Source of the current time for attempt stamping and breaker cooldowns.
pub trait Clock {
    /// Returns the current time.
    fn now(&self) -> Timestamp;
}

// ============================================================================
// SECTION: Dependency Checker
// ============================================================================

/// Inputs shared by every requirement check of one evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckContext {
    /// Unit of work being gated.
    pub work_unit: WorkUnit,
    /// Evaluation time.
    pub now: Timestamp,
    /// Fingerprints recorded by the last successful attempt of the work unit.
    pub previous_hashes: BTreeMap<RequirementName, Fingerprint>,
}

/// Dependency checker errors.
#[derive(Debug, Error)]
pub enum ResolverError {
    /// Upstream store failed.
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    /// Fingerprinting failed for a reason other than a missing field.
    #[error(transparent)]
    Fingerprint(#[from] FingerprintError),
    /// Requirement could not be checked.
    #[error("dependency check error: {0}")]
    Check(String),
}

/// Evaluates declared requirements against live upstream data.
pub trait DependencyChecker {
    /// Checks every requirement and returns statuses in declaration order.
    ///
    /// Implementations must not short-circuit on the first unhealthy status.
    ///
    /// # Errors
    ///
    /// Returns [`ResolverError`] when upstream data cannot be read.
    fn check_all(
        &self,
        context: &CheckContext,
        requirements: &[DependencyRequirement],
    ) -> Result<Vec<DependencyStatus>, ResolverError>;
}
