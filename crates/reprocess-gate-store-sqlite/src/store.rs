// crates/reprocess-gate-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Attempt Log and Upstream Store
// Description: Durable AttemptLog and UpstreamStore backed by SQLite WAL.
// Purpose: Persist reprocess attempts and upstream rows with fail-closed reads.
// Dependencies: reprocess-gate-core, rusqlite, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! [`SqliteAttemptLog`] stores one row per reprocess attempt and assigns
//! attempt numbers inside an `IMMEDIATE` transaction. [`SqliteUpstreamStore`]
//! stores upstream rows keyed by `(source, entity, date, row_key)` together
//! with the writer's fingerprint. Both open the same schema, so one database
//! file can back both.
//!
//! Security posture: database contents are untrusted. Rows that fail to
//! decode surface as corruption instead of being skipped.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::time::Duration;

use reprocess_gate_core::AnalysisDate;
use reprocess_gate_core::AttemptDraft;
use reprocess_gate_core::AttemptLog;
use reprocess_gate_core::AttemptOutcome;
use reprocess_gate_core::BreakerKey;
use reprocess_gate_core::EntityId;
use reprocess_gate_core::FieldProfile;
use reprocess_gate_core::Fingerprint;
use reprocess_gate_core::ProcessorName;
use reprocess_gate_core::Record;
use reprocess_gate_core::ReprocessAttempt;
use reprocess_gate_core::RequirementName;
use reprocess_gate_core::SkipReasonCount;
use reprocess_gate_core::SourceId;
use reprocess_gate_core::StoreError;
use reprocess_gate_core::Timestamp;
use reprocess_gate_core::UpstreamError;
use reprocess_gate_core::UpstreamRow;
use reprocess_gate_core::UpstreamStore;
use reprocess_gate_core::WorkUnit;
use reprocess_gate_core::compute_fingerprint;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::TransactionBehavior;
use rusqlite::params;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum serialized upstream record size accepted by the store.
pub const MAX_RECORD_BYTES: usize = 1024 * 1024;
/// Columns selected for attempt rows, in [`map_attempt_row`] order.
const ATTEMPT_COLUMNS: &str = "processor_name, entity_id, analysis_date, attempt_number, outcome, \
                               completeness_pct, skip_reason, circuit_breaker_tripped, \
                               circuit_breaker_until, manual_override_applied, attempted_at, \
                               source_hashes_json";
/// Columns selected for upstream rows, in [`map_upstream_row`] order.
const UPSTREAM_COLUMNS: &str =
    "source, entity_id, analysis_date, row_key, record_json, data_hash, updated_at";

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `synchronous` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration shared by the `SQLite` attempt log and upstream store.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
/// - `busy_timeout_ms` is interpreted as milliseconds.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl SqliteStoreConfig {
    /// Returns a config for `path` with default pragmas.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
///
/// # Invariants
/// - Error messages avoid embedding raw record payloads.
#[derive(Debug, Error, Clone)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Stored row failed to decode.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid input or configuration.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
    /// Record payload exceeded the size limit.
    #[error("sqlite store payload too large: {actual_bytes} bytes (max {max_bytes})")]
    TooLarge {
        /// Maximum allowed bytes.
        max_bytes: usize,
        /// Actual payload size in bytes.
        actual_bytes: usize,
    },
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message) => Self::Store(message),
            SqliteStoreError::Corrupt(message) => Self::Corrupt(message),
            SqliteStoreError::VersionMismatch(message) => Self::VersionMismatch(message),
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
            SqliteStoreError::TooLarge {
                max_bytes,
                actual_bytes,
            } => Self::Invalid(format!(
                "record exceeds size limit: {actual_bytes} bytes (max {max_bytes})"
            )),
        }
    }
}

impl From<SqliteStoreError> for UpstreamError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message) | SqliteStoreError::VersionMismatch(message) => {
                Self::Store(message)
            }
            SqliteStoreError::Corrupt(message) | SqliteStoreError::Invalid(message) => {
                Self::Invalid(message)
            }
            SqliteStoreError::TooLarge {
                max_bytes,
                actual_bytes,
            } => Self::Invalid(format!(
                "record exceeds size limit: {actual_bytes} bytes (max {max_bytes})"
            )),
        }
    }
}

/// Maps a `rusqlite` error into a store error.
fn db_error(error: rusqlite::Error) -> SqliteStoreError {
    SqliteStoreError::Db(error.to_string())
}

// ============================================================================
// SECTION: Database Handle
// ============================================================================

/// Shared, mutex-guarded connection with the schema initialized.
#[derive(Clone)]
struct SqliteDatabase {
    /// Connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteDatabase {
    /// Opens the database, applying pragmas and validating the schema.
    fn open(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(config)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Locks the connection.
    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SqliteStoreError> {
        self.connection.lock().map_err(|_| SqliteStoreError::Io("sqlite mutex poisoned".to_string()))
    }

    /// Verifies the store can execute a simple SQL statement.
    fn readiness(&self) -> Result<(), SqliteStoreError> {
        self.lock()?.execute_batch("SELECT 1").map_err(db_error)
    }
}

// ============================================================================
// SECTION: Attempt Log
// ============================================================================

/// `SQLite`-backed append-only attempt log.
///
/// # Invariants
/// - Attempt numbers are assigned inside an `IMMEDIATE` transaction.
/// - Rows are never updated or deleted.
#[derive(Clone)]
pub struct SqliteAttemptLog {
    /// Database handle.
    db: SqliteDatabase,
}

impl SqliteAttemptLog {
    /// Opens an `SQLite`-backed attempt log.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// initialized.
    pub fn new(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        Ok(Self {
            db: SqliteDatabase::open(config)?,
        })
    }

    /// Verifies the database is reachable.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the probe query fails.
    pub fn readiness(&self) -> Result<(), SqliteStoreError> {
        self.db.readiness()
    }

    /// Validates and appends a draft, assigning the next attempt number.
    fn append_attempt(&self, draft: AttemptDraft) -> Result<ReprocessAttempt, SqliteStoreError> {
        draft.validate().map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
        let source_hashes_json = serde_json::to_string(&draft.source_hashes)
            .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
        let mut connection = self.db.lock()?;
        let tx =
            connection.transaction_with_behavior(TransactionBehavior::Immediate).map_err(db_error)?;
        let last: i64 = tx
            .query_row(
                "SELECT COALESCE(MAX(attempt_number), 0) FROM reprocess_attempts WHERE \
                 processor_name = ?1 AND entity_id = ?2 AND analysis_date = ?3",
                params![
                    draft.work_unit.processor_name.as_str(),
                    draft.work_unit.entity_id.as_str(),
                    draft.work_unit.analysis_date.to_string()
                ],
                |row| row.get(0),
            )
            .map_err(db_error)?;
        let next = last.checked_add(1).ok_or_else(|| {
            SqliteStoreError::Corrupt("attempt number overflow".to_string())
        })?;
        let number = u64::try_from(next)
            .map_err(|_| SqliteStoreError::Corrupt(format!("invalid attempt number {last}")))?;
        let attempt = draft.into_attempt(number);
        tx.execute(
            "INSERT INTO reprocess_attempts (processor_name, entity_id, analysis_date, \
             attempt_number, outcome, completeness_pct, skip_reason, circuit_breaker_tripped, \
             circuit_breaker_until, manual_override_applied, attempted_at, source_hashes_json) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                attempt.processor_name.as_str(),
                attempt.entity_id.as_str(),
                attempt.analysis_date.to_string(),
                next,
                attempt.outcome.as_str(),
                attempt.completeness_pct,
                attempt.skip_reason.as_deref(),
                attempt.circuit_breaker_tripped,
                attempt.circuit_breaker_until.map(Timestamp::as_unix_millis),
                attempt.manual_override_applied,
                attempt.attempted_at.as_unix_millis(),
                source_hashes_json
            ],
        )
        .map_err(db_error)?;
        tx.commit().map_err(db_error)?;
        drop(connection);
        Ok(attempt)
    }

    /// Runs an attempt query and decodes every row.
    fn query_attempts(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<ReprocessAttempt>, SqliteStoreError> {
        let connection = self.db.lock()?;
        let mut stmt = connection.prepare_cached(sql).map_err(db_error)?;
        let rows = stmt
            .query_map(params, map_attempt_row)
            .map_err(db_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_error)?;
        drop(stmt);
        drop(connection);
        rows.into_iter().map(StoredAttempt::into_attempt).collect()
    }

    /// Aggregates skip reasons for a processor.
    fn query_skip_counts(
        &self,
        processor: &ProcessorName,
    ) -> Result<Vec<SkipReasonCount>, SqliteStoreError> {
        let connection = self.db.lock()?;
        let mut stmt = connection
            .prepare_cached(
                "SELECT skip_reason, COUNT(1) FROM reprocess_attempts WHERE processor_name = ?1 \
                 AND skip_reason IS NOT NULL GROUP BY skip_reason ORDER BY COUNT(1) DESC, \
                 skip_reason ASC",
            )
            .map_err(db_error)?;
        let rows = stmt
            .query_map(params![processor.as_str()], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })
            .map_err(db_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_error)?;
        drop(stmt);
        drop(connection);
        rows.into_iter()
            .map(|(skip_reason, count)| {
                let count = u64::try_from(count).map_err(|_| {
                    SqliteStoreError::Corrupt(format!("negative count for {skip_reason}"))
                })?;
                Ok(SkipReasonCount {
                    skip_reason,
                    count,
                })
            })
            .collect()
    }
}

impl AttemptLog for SqliteAttemptLog {
    fn append(&self, draft: AttemptDraft) -> Result<ReprocessAttempt, StoreError> {
        Ok(self.append_attempt(draft)?)
    }

    fn attempts(&self, work_unit: &WorkUnit) -> Result<Vec<ReprocessAttempt>, StoreError> {
        Ok(self.query_attempts(
            &format!(
                "SELECT {ATTEMPT_COLUMNS} FROM reprocess_attempts WHERE processor_name = ?1 AND \
                 entity_id = ?2 AND analysis_date = ?3 ORDER BY attempt_number"
            ),
            params![
                work_unit.processor_name.as_str(),
                work_unit.entity_id.as_str(),
                work_unit.analysis_date.to_string()
            ],
        )?)
    }

    fn history(&self, key: &BreakerKey) -> Result<Vec<ReprocessAttempt>, StoreError> {
        Ok(self.query_attempts(
            &format!(
                "SELECT {ATTEMPT_COLUMNS} FROM reprocess_attempts WHERE processor_name = ?1 AND \
                 entity_id = ?2 ORDER BY seq"
            ),
            params![key.processor_name.as_str(), key.entity_id.as_str()],
        )?)
    }

    fn attempts_between(
        &self,
        processor: &ProcessorName,
        start: AnalysisDate,
        end_exclusive: AnalysisDate,
    ) -> Result<Vec<ReprocessAttempt>, StoreError> {
        Ok(self.query_attempts(
            &format!(
                "SELECT {ATTEMPT_COLUMNS} FROM reprocess_attempts WHERE processor_name = ?1 AND \
                 analysis_date >= ?2 AND analysis_date < ?3 ORDER BY seq"
            ),
            params![processor.as_str(), start.to_string(), end_exclusive.to_string()],
        )?)
    }

    fn skip_reason_counts(
        &self,
        processor: &ProcessorName,
    ) -> Result<Vec<SkipReasonCount>, StoreError> {
        Ok(self.query_skip_counts(processor)?)
    }
}

/// Raw attempt columns before validation.
struct StoredAttempt {
    /// Processor column.
    processor_name: String,
    /// Entity column.
    entity_id: String,
    /// ISO date column.
    analysis_date: String,
    /// Attempt number column.
    attempt_number: i64,
    /// Outcome label column.
    outcome: String,
    /// Completeness column.
    completeness_pct: f64,
    /// Skip reason column.
    skip_reason: Option<String>,
    /// Breaker tripped flag.
    circuit_breaker_tripped: bool,
    /// Cooldown end in unix millis.
    circuit_breaker_until: Option<i64>,
    /// Manual override flag.
    manual_override_applied: bool,
    /// Attempt time in unix millis.
    attempted_at: i64,
    /// Fingerprints as a JSON object.
    source_hashes_json: String,
}

impl StoredAttempt {
    /// Decodes the stored columns into an attempt, failing closed on bad data.
    fn into_attempt(self) -> Result<ReprocessAttempt, SqliteStoreError> {
        let analysis_date = parse_date(&self.analysis_date)?;
        let attempt_number = u64::try_from(self.attempt_number).map_err(|_| {
            SqliteStoreError::Corrupt(format!("invalid attempt number {}", self.attempt_number))
        })?;
        let outcome = AttemptOutcome::parse(&self.outcome).ok_or_else(|| {
            SqliteStoreError::Corrupt(format!("unknown attempt outcome {}", self.outcome))
        })?;
        let source_hashes: BTreeMap<RequirementName, Fingerprint> =
            serde_json::from_str(&self.source_hashes_json)
                .map_err(|err| SqliteStoreError::Corrupt(format!("source hashes: {err}")))?;
        Ok(ReprocessAttempt {
            processor_name: ProcessorName::new(self.processor_name),
            entity_id: EntityId::new(self.entity_id),
            analysis_date,
            attempt_number,
            outcome,
            completeness_pct: self.completeness_pct,
            skip_reason: self.skip_reason,
            circuit_breaker_tripped: self.circuit_breaker_tripped,
            circuit_breaker_until: self.circuit_breaker_until.map(Timestamp::from_unix_millis),
            manual_override_applied: self.manual_override_applied,
            attempted_at: Timestamp::from_unix_millis(self.attempted_at),
            source_hashes,
        })
    }
}

/// Maps an attempt row selected with [`ATTEMPT_COLUMNS`].
fn map_attempt_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredAttempt> {
    Ok(StoredAttempt {
        processor_name: row.get(0)?,
        entity_id: row.get(1)?,
        analysis_date: row.get(2)?,
        attempt_number: row.get(3)?,
        outcome: row.get(4)?,
        completeness_pct: row.get(5)?,
        skip_reason: row.get(6)?,
        circuit_breaker_tripped: row.get(7)?,
        circuit_breaker_until: row.get(8)?,
        manual_override_applied: row.get(9)?,
        attempted_at: row.get(10)?,
        source_hashes_json: row.get(11)?,
    })
}

// ============================================================================
// SECTION: Upstream Store
// ============================================================================

/// `SQLite`-backed upstream row store.
///
/// # Invariants
/// - Rows are unique per `(source, entity, date, row_key)`; writes replace.
/// - Stored records never exceed [`MAX_RECORD_BYTES`].
#[derive(Clone)]
pub struct SqliteUpstreamStore {
    /// Database handle.
    db: SqliteDatabase,
}

impl SqliteUpstreamStore {
    /// Opens an `SQLite`-backed upstream store.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// initialized.
    pub fn new(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        Ok(Self {
            db: SqliteDatabase::open(config)?,
        })
    }

    /// Persists an upstream row, replacing any row with the same key.
    ///
    /// When `profile` is given the row's `data_hash` is recomputed from the
    /// record so readers can compare fingerprints without re-hashing.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Invalid`] when the record lacks a profiled
    /// field, [`SqliteStoreError::TooLarge`] when it exceeds the size limit,
    /// or a database error.
    pub fn put_row(
        &self,
        mut row: UpstreamRow,
        profile: Option<&FieldProfile>,
    ) -> Result<UpstreamRow, SqliteStoreError> {
        if let Some(profile) = profile {
            let fingerprint = compute_fingerprint(&row.record, profile)
                .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
            row.data_hash = Some(fingerprint);
        }
        let record_json = serde_json::to_vec(&row.record)
            .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
        ensure_record_size(record_json.len())?;
        self.db
            .lock()?
            .execute(
                "INSERT INTO upstream_rows (source, entity_id, analysis_date, row_key, \
                 record_json, data_hash, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) ON \
                 CONFLICT(source, entity_id, analysis_date, row_key) DO UPDATE SET record_json \
                 = excluded.record_json, data_hash = excluded.data_hash, updated_at = \
                 excluded.updated_at",
                params![
                    row.source.as_str(),
                    row.entity_id.as_str(),
                    row.analysis_date.to_string(),
                    row.row_key.as_str(),
                    record_json.as_slice(),
                    row.data_hash.as_ref().map(Fingerprint::as_str),
                    row.updated_at.as_unix_millis()
                ],
            )
            .map_err(db_error)?;
        Ok(row)
    }

    /// Runs an upstream row query and decodes every row.
    fn query_rows(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<UpstreamRow>, SqliteStoreError> {
        let connection = self.db.lock()?;
        let mut stmt = connection.prepare_cached(sql).map_err(db_error)?;
        let rows = stmt
            .query_map(params, map_upstream_row)
            .map_err(db_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_error)?;
        drop(stmt);
        drop(connection);
        rows.into_iter().map(StoredUpstreamRow::into_row).collect()
    }

    /// Returns the earliest stored date for an entity in a source.
    fn query_first_date(
        &self,
        source: &SourceId,
        entity_id: &EntityId,
    ) -> Result<Option<AnalysisDate>, SqliteStoreError> {
        let first: Option<String> = self
            .db
            .lock()?
            .query_row(
                "SELECT MIN(analysis_date) FROM upstream_rows WHERE source = ?1 AND entity_id = ?2",
                params![source.as_str(), entity_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_error)?
            .flatten();
        first.as_deref().map(parse_date).transpose()
    }
}

impl UpstreamStore for SqliteUpstreamStore {
    fn rows_for(
        &self,
        source: &SourceId,
        entity_id: &EntityId,
        date: AnalysisDate,
    ) -> Result<Vec<UpstreamRow>, UpstreamError> {
        Ok(self.query_rows(
            &format!(
                "SELECT {UPSTREAM_COLUMNS} FROM upstream_rows WHERE source = ?1 AND entity_id = \
                 ?2 AND analysis_date = ?3 ORDER BY row_key"
            ),
            params![source.as_str(), entity_id.as_str(), date.to_string()],
        )?)
    }

    fn rows_between(
        &self,
        source: &SourceId,
        entity_id: &EntityId,
        start: AnalysisDate,
        end_exclusive: AnalysisDate,
    ) -> Result<Vec<UpstreamRow>, UpstreamError> {
        Ok(self.query_rows(
            &format!(
                "SELECT {UPSTREAM_COLUMNS} FROM upstream_rows WHERE source = ?1 AND entity_id = \
                 ?2 AND analysis_date >= ?3 AND analysis_date < ?4 ORDER BY analysis_date, row_key"
            ),
            params![
                source.as_str(),
                entity_id.as_str(),
                start.to_string(),
                end_exclusive.to_string()
            ],
        )?)
    }

    fn first_tracked_date(
        &self,
        source: &SourceId,
        entity_id: &EntityId,
    ) -> Result<Option<AnalysisDate>, UpstreamError> {
        Ok(self.query_first_date(source, entity_id)?)
    }
}

/// Raw upstream columns before validation.
struct StoredUpstreamRow {
    /// Source column.
    source: String,
    /// Entity column.
    entity_id: String,
    /// ISO date column.
    analysis_date: String,
    /// Row key column.
    row_key: String,
    /// JSON record bytes.
    record_json: Vec<u8>,
    /// Writer fingerprint column.
    data_hash: Option<String>,
    /// Update time in unix millis.
    updated_at: i64,
}

impl StoredUpstreamRow {
    /// Decodes the stored columns into a row, failing closed on bad data.
    fn into_row(self) -> Result<UpstreamRow, SqliteStoreError> {
        ensure_record_size(self.record_json.len())?;
        let record: Record = serde_json::from_slice(&self.record_json).map_err(|err| {
            SqliteStoreError::Corrupt(format!("record for row {}: {err}", self.row_key))
        })?;
        Ok(UpstreamRow {
            source: SourceId::new(self.source),
            entity_id: EntityId::new(self.entity_id),
            analysis_date: parse_date(&self.analysis_date)?,
            row_key: self.row_key,
            record,
            data_hash: self.data_hash.map(Fingerprint::new),
            updated_at: Timestamp::from_unix_millis(self.updated_at),
        })
    }
}

/// Maps an upstream row selected with [`UPSTREAM_COLUMNS`].
fn map_upstream_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredUpstreamRow> {
    Ok(StoredUpstreamRow {
        source: row.get(0)?,
        entity_id: row.get(1)?,
        analysis_date: row.get(2)?,
        row_key: row.get(3)?,
        record_json: row.get(4)?,
        data_hash: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Parses a stored ISO date.
fn parse_date(value: &str) -> Result<AnalysisDate, SqliteStoreError> {
    AnalysisDate::from_str(value).map_err(|err| SqliteStoreError::Corrupt(err.to_string()))
}

/// Rejects record payloads over [`MAX_RECORD_BYTES`].
const fn ensure_record_size(actual_bytes: usize) -> Result<(), SqliteStoreError> {
    if actual_bytes > MAX_RECORD_BYTES {
        return Err(SqliteStoreError::TooLarge {
            max_bytes: MAX_RECORD_BYTES,
            actual_bytes,
        });
    }
    Ok(())
}

/// Creates the parent directory for the store file.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    if path.as_os_str().is_empty() {
        return Err(SqliteStoreError::Invalid("store path must not be empty".to_string()));
    }
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid(
                "store path contains an overlong component".to_string(),
            ));
        }
    }
    if path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection with secure defaults.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags).map_err(db_error)?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies `SQLite` pragmas required for durability.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteStoreConfig,
) -> Result<(), SqliteStoreError> {
    connection.busy_timeout(Duration::from_millis(config.busy_timeout_ms)).map_err(db_error)?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(db_error)?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(db_error)?;
    Ok(())
}

/// Initializes the `SQLite` schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction_with_behavior(TransactionBehavior::Immediate).map_err(db_error)?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(db_error)?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(db_error)?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(db_error)?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS reprocess_attempts (
                    seq INTEGER PRIMARY KEY AUTOINCREMENT,
                    processor_name TEXT NOT NULL,
                    entity_id TEXT NOT NULL,
                    analysis_date TEXT NOT NULL,
                    attempt_number INTEGER NOT NULL,
                    outcome TEXT NOT NULL,
                    completeness_pct REAL NOT NULL,
                    skip_reason TEXT,
                    circuit_breaker_tripped INTEGER NOT NULL,
                    circuit_breaker_until INTEGER,
                    manual_override_applied INTEGER NOT NULL,
                    attempted_at INTEGER NOT NULL,
                    source_hashes_json TEXT NOT NULL,
                    UNIQUE (processor_name, entity_id, analysis_date, attempt_number)
                );
                CREATE INDEX IF NOT EXISTS idx_reprocess_attempts_breaker
                    ON reprocess_attempts (processor_name, entity_id, seq);
                CREATE INDEX IF NOT EXISTS idx_reprocess_attempts_date
                    ON reprocess_attempts (processor_name, analysis_date);
                CREATE TABLE IF NOT EXISTS upstream_rows (
                    source TEXT NOT NULL,
                    entity_id TEXT NOT NULL,
                    analysis_date TEXT NOT NULL,
                    row_key TEXT NOT NULL,
                    record_json BLOB NOT NULL,
                    data_hash TEXT,
                    updated_at INTEGER NOT NULL,
                    PRIMARY KEY (source, entity_id, analysis_date, row_key)
                );",
            )
            .map_err(db_error)?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit().map_err(db_error)?;
    Ok(())
}
