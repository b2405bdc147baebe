// crates/reprocess-gate-core/src/runtime/store.rs
// ============================================================================
// Module: Reprocess Gate In-Memory Stores
// Description: In-memory attempt log and upstream store plus shared wrappers.
// Purpose: Provide deterministic store implementations without external deps.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! In-memory implementations of [`AttemptLog`] and [`UpstreamStore`] for tests,
//! local runs, and embedding. Attempt numbers are assigned under the same lock
//! that appends the row, so concurrent appends never share a number.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;

use crate::core::attempt::AttemptDraft;
use crate::core::attempt::BreakerKey;
use crate::core::attempt::ReprocessAttempt;
use crate::core::attempt::SkipReasonCount;
use crate::core::attempt::WorkUnit;
use crate::core::identifiers::EntityId;
use crate::core::identifiers::ProcessorName;
use crate::core::identifiers::SourceId;
use crate::core::time::AnalysisDate;
use crate::interfaces::AttemptLog;
use crate::interfaces::StoreError;
use crate::interfaces::UpstreamError;
use crate::interfaces::UpstreamRow;
use crate::interfaces::UpstreamStore;

// ============================================================================
// SECTION: In-Memory Attempt Log
// ============================================================================

/// In-memory append-only attempt log.
#[derive(Debug, Default, Clone)]
pub struct InMemoryAttemptLog {
    /// Rows in append order.
    rows: Arc<Mutex<Vec<ReprocessAttempt>>>,
}

impl InMemoryAttemptLog {
    /// Creates an empty attempt log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every row in append order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the log lock is poisoned.
    pub fn all(&self) -> Result<Vec<ReprocessAttempt>, StoreError> {
        Ok(self.lock()?.clone())
    }

    /// Locks the row vector.
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<ReprocessAttempt>>, StoreError> {
        self.rows.lock().map_err(|_| StoreError::Store("attempt log mutex poisoned".to_string()))
    }
}

impl AttemptLog for InMemoryAttemptLog {
    fn append(&self, draft: AttemptDraft) -> Result<ReprocessAttempt, StoreError> {
        draft.validate().map_err(|err| StoreError::Invalid(err.to_string()))?;
        let mut rows = self.lock()?;
        let last = rows
            .iter()
            .filter(|row| is_same_unit(row, &draft.work_unit))
            .map(|row| row.attempt_number)
            .max()
            .unwrap_or(0);
        let attempt = draft.into_attempt(last + 1);
        rows.push(attempt.clone());
        drop(rows);
        Ok(attempt)
    }

    fn attempts(&self, work_unit: &WorkUnit) -> Result<Vec<ReprocessAttempt>, StoreError> {
        let mut attempts: Vec<ReprocessAttempt> =
            self.lock()?.iter().filter(|row| is_same_unit(row, work_unit)).cloned().collect();
        attempts.sort_by_key(|row| row.attempt_number);
        Ok(attempts)
    }

    fn history(&self, key: &BreakerKey) -> Result<Vec<ReprocessAttempt>, StoreError> {
        Ok(self
            .lock()?
            .iter()
            .filter(|row| row.processor_name == key.processor_name && row.entity_id == key.entity_id)
            .cloned()
            .collect())
    }

    fn attempts_between(
        &self,
        processor: &ProcessorName,
        start: AnalysisDate,
        end_exclusive: AnalysisDate,
    ) -> Result<Vec<ReprocessAttempt>, StoreError> {
        Ok(self
            .lock()?
            .iter()
            .filter(|row| {
                row.processor_name == *processor
                    && row.analysis_date >= start
                    && row.analysis_date < end_exclusive
            })
            .cloned()
            .collect())
    }

    fn skip_reason_counts(
        &self,
        processor: &ProcessorName,
    ) -> Result<Vec<SkipReasonCount>, StoreError> {
        let mut counts: BTreeMap<String, u64> = BTreeMap::new();
        for row in self.lock()?.iter().filter(|row| row.processor_name == *processor) {
            if let Some(reason) = &row.skip_reason {
                *counts.entry(reason.clone()).or_default() += 1;
            }
        }
        Ok(sorted_counts(counts))
    }
}

/// Returns true when `row` belongs to `work_unit`.
fn is_same_unit(row: &ReprocessAttempt, work_unit: &WorkUnit) -> bool {
    row.processor_name == work_unit.processor_name
        && row.entity_id == work_unit.entity_id
        && row.analysis_date == work_unit.analysis_date
}

/// Orders skip reason counts by frequency, then reason.
fn sorted_counts(counts: BTreeMap<String, u64>) -> Vec<SkipReasonCount> {
    let mut sorted: Vec<SkipReasonCount> = counts
        .into_iter()
        .map(|(skip_reason, count)| SkipReasonCount {
            skip_reason,
            count,
        })
        .collect();
    sorted.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.skip_reason.cmp(&b.skip_reason)));
    sorted
}

// ============================================================================
// SECTION: In-Memory Upstream Store
// ============================================================================

/// Rows for one `(source, entity)` keyed by date and row key.
type EntityRows = BTreeMap<(AnalysisDate, String), UpstreamRow>;

/// In-memory upstream row store.
#[derive(Debug, Default, Clone)]
pub struct InMemoryUpstreamStore {
    /// Rows partitioned by source and entity.
    rows: Arc<Mutex<BTreeMap<(SourceId, EntityId), EntityRows>>>,
}

impl InMemoryUpstreamStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a row keyed by `(source, entity, date, row_key)`.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError`] when the store lock is poisoned.
    pub fn insert(&self, row: UpstreamRow) -> Result<(), UpstreamError> {
        self.rows
            .lock()
            .map_err(|_| UpstreamError::Store("upstream store mutex poisoned".to_string()))?
            .entry((row.source.clone(), row.entity_id.clone()))
            .or_default()
            .insert((row.analysis_date, row.row_key.clone()), row);
        Ok(())
    }

    /// Collects rows for an entity whose date satisfies `keep`.
    fn collect(
        &self,
        source: &SourceId,
        entity_id: &EntityId,
        keep: impl Fn(AnalysisDate) -> bool,
    ) -> Result<Vec<UpstreamRow>, UpstreamError> {
        let guard = self
            .rows
            .lock()
            .map_err(|_| UpstreamError::Store("upstream store mutex poisoned".to_string()))?;
        Ok(guard
            .get(&(source.clone(), entity_id.clone()))
            .map(|rows| {
                rows.iter().filter(|((date, _), _)| keep(*date)).map(|(_, row)| row.clone()).collect()
            })
            .unwrap_or_default())
    }
}

impl UpstreamStore for InMemoryUpstreamStore {
    fn rows_for(
        &self,
        source: &SourceId,
        entity_id: &EntityId,
        date: AnalysisDate,
    ) -> Result<Vec<UpstreamRow>, UpstreamError> {
        self.collect(source, entity_id, |row_date| row_date == date)
    }

    fn rows_between(
        &self,
        source: &SourceId,
        entity_id: &EntityId,
        start: AnalysisDate,
        end_exclusive: AnalysisDate,
    ) -> Result<Vec<UpstreamRow>, UpstreamError> {
        self.collect(source, entity_id, |row_date| row_date >= start && row_date < end_exclusive)
    }

    fn first_tracked_date(
        &self,
        source: &SourceId,
        entity_id: &EntityId,
    ) -> Result<Option<AnalysisDate>, UpstreamError> {
        let guard = self
            .rows
            .lock()
            .map_err(|_| UpstreamError::Store("upstream store mutex poisoned".to_string()))?;
        Ok(guard
            .get(&(source.clone(), entity_id.clone()))
            .and_then(|rows| rows.keys().next().map(|(date, _)| *date)))
    }
}

// ============================================================================
// SECTION: Shared Store Wrappers
// ============================================================================

/// Shared attempt log backed by an `Arc` trait object.
#[derive(Clone)]
pub struct SharedAttemptLog {
    /// Inner log implementation.
    inner: Arc<dyn AttemptLog + Send + Sync>,
}

impl SharedAttemptLog {
    /// Wraps an attempt log in a shared, clonable wrapper.
    #[must_use]
    pub fn from_log(log: impl AttemptLog + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(log),
        }
    }

    /// Wraps an existing shared log.
    #[must_use]
    pub const fn new(log: Arc<dyn AttemptLog + Send + Sync>) -> Self {
        Self {
            inner: log,
        }
    }
}

impl AttemptLog for SharedAttemptLog {
    fn append(&self, draft: AttemptDraft) -> Result<ReprocessAttempt, StoreError> {
        self.inner.append(draft)
    }

    fn attempts(&self, work_unit: &WorkUnit) -> Result<Vec<ReprocessAttempt>, StoreError> {
        self.inner.attempts(work_unit)
    }

    fn history(&self, key: &BreakerKey) -> Result<Vec<ReprocessAttempt>, StoreError> {
        self.inner.history(key)
    }

    fn attempts_between(
        &self,
        processor: &ProcessorName,
        start: AnalysisDate,
        end_exclusive: AnalysisDate,
    ) -> Result<Vec<ReprocessAttempt>, StoreError> {
        self.inner.attempts_between(processor, start, end_exclusive)
    }

    fn skip_reason_counts(
        &self,
        processor: &ProcessorName,
    ) -> Result<Vec<SkipReasonCount>, StoreError> {
        self.inner.skip_reason_counts(processor)
    }
}

/// Shared upstream store backed by an `Arc` trait object.
#[derive(Clone)]
pub struct SharedUpstreamStore {
    /// Inner store implementation.
    inner: Arc<dyn UpstreamStore + Send + Sync>,
}

impl SharedUpstreamStore {
    /// Wraps an upstream store in a shared, clonable wrapper.
    #[must_use]
    pub fn from_store(store: impl UpstreamStore + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(store),
        }
    }
}

impl UpstreamStore for SharedUpstreamStore {
    fn rows_for(
        &self,
        source: &SourceId,
        entity_id: &EntityId,
        date: AnalysisDate,
    ) -> Result<Vec<UpstreamRow>, UpstreamError> {
        self.inner.rows_for(source, entity_id, date)
    }

    fn rows_between(
        &self,
        source: &SourceId,
        entity_id: &EntityId,
        start: AnalysisDate,
        end_exclusive: AnalysisDate,
    ) -> Result<Vec<UpstreamRow>, UpstreamError> {
        self.inner.rows_between(source, entity_id, start, end_exclusive)
    }

    fn first_tracked_date(
        &self,
        source: &SourceId,
        entity_id: &EntityId,
    ) -> Result<Option<AnalysisDate>, UpstreamError> {
        self.inner.first_tracked_date(source, entity_id)
    }
}
