// crates/reprocess-gate-store-sqlite/src/lib.rs
// ============================================================================
// Module: Reprocess Gate SQLite Store Library
// Description: Durable attempt log and upstream row store on SQLite.
// Purpose: Persist gate history across processes and restarts.
// Dependencies: reprocess-gate-core, rusqlite
// ============================================================================

//! ## Overview
//! `SQLite` implementations of the core [`AttemptLog`] and [`UpstreamStore`]
//! interfaces. Attempt rows are append-only; attempt numbers are assigned
//! inside an immediate transaction so concurrent writers never collide.
//!
//! [`AttemptLog`]: reprocess_gate_core::AttemptLog
//! [`UpstreamStore`]: reprocess_gate_core::UpstreamStore

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::MAX_RECORD_BYTES;
pub use store::SqliteAttemptLog;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
pub use store::SqliteUpstreamStore;
