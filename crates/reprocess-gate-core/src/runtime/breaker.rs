// crates/reprocess-gate-core/src/runtime/breaker.rs
// ============================================================================
// Module: Reprocess Gate Breaker Cache
// Description: Read-through cache of folded breaker history per breaker key.
// Purpose: Avoid refolding the attempt log on every evaluation.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! The attempt log stays the single source of truth. The cache only holds the
//! clock-independent [`BreakerHistory`] fold and drops a key whenever a row is
//! appended for it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::core::attempt::BreakerKey;
use crate::core::breaker::BreakerHistory;
use crate::interfaces::AttemptLog;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Cache
// ============================================================================

/// Cached folds plus per-key invalidation generations.
#[derive(Debug, Default)]
struct CacheEntries {
    /// Cached folds keyed by `(processor, entity)`.
    folds: BTreeMap<BreakerKey, BreakerHistory>,
    /// Bumped on every invalidation of a key.
    generations: BTreeMap<BreakerKey, u64>,
}

impl CacheEntries {
    /// Returns the current invalidation generation for `key`.
    fn generation(&self, key: &BreakerKey) -> u64 {
        self.generations.get(key).copied().unwrap_or(0)
    }
}

/// Read-through breaker history cache.
///
/// A miss folds the log outside the lock. The fold is only cached when no
/// invalidation for the key landed while the log was being read, so a read
/// racing an append never re-caches the pre-append history.
#[derive(Debug, Default)]
pub struct BreakerCache {
    /// Cache state.
    entries: Mutex<CacheEntries>,
}

impl BreakerCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the history for `key`, folding it from `log` on a miss.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the log cannot be read or the cache lock
    /// is poisoned.
    pub fn history<L: AttemptLog + ?Sized>(
        &self,
        key: &BreakerKey,
        log: &L,
    ) -> Result<BreakerHistory, StoreError> {
        let generation = {
            let entries = self.lock()?;
            if let Some(history) = entries.folds.get(key) {
                return Ok(history.clone());
            }
            entries.generation(key)
        };
        let history = BreakerHistory::from_attempts(&log.history(key)?);
        let mut entries = self.lock()?;
        if entries.generation(key) == generation {
            entries.folds.insert(key.clone(), history.clone());
        }
        Ok(history)
    }

    /// Drops the cached history for `key` and voids in-flight folds of it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the cache lock is poisoned.
    pub fn invalidate(&self, key: &BreakerKey) -> Result<(), StoreError> {
        let mut entries = self.lock()?;
        entries.folds.remove(key);
        let generation = entries.generations.entry(key.clone()).or_insert(0);
        *generation = generation.wrapping_add(1);
        Ok(())
    }

    /// Returns the number of cached keys.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the cache lock is poisoned.
    pub fn cached_keys(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.folds.len())
    }

    /// Locks the cache state.
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, CacheEntries>, StoreError> {
        self.entries
            .lock()
            .map_err(|_| StoreError::Store("breaker cache mutex poisoned".to_string()))
    }
}
