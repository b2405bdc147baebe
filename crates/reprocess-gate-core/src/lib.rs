// crates/reprocess-gate-core/src/lib.rs
// ============================================================================
// Module: Reprocess Gate Core Library
// Description: Public API surface for the reprocess gate core.
// Purpose: Expose core types, interfaces, and runtime helpers.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Reprocess gate core decides, for every `(processor, entity, date)` unit of
//! work in a staged data pipeline, whether to RUN, SKIP, or ABORT. It checks
//! upstream dependencies, fingerprints meaningful content, scores
//! completeness, and derives a circuit breaker from an append-only attempt
//! log. It is storage-agnostic and integrates through explicit interfaces.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use interfaces::AttemptLog;
pub use interfaces::CheckContext;
pub use interfaces::Clock;
pub use interfaces::DependencyChecker;
pub use interfaces::ResolverError;
pub use interfaces::StoreError;
pub use interfaces::UpstreamError;
pub use interfaces::UpstreamRow;
pub use interfaces::UpstreamStore;
pub use runtime::CompletenessCalculator;
pub use runtime::GateAuditEvent;
pub use runtime::GateAuditSink;
pub use runtime::GateError;
pub use runtime::GateSettings;
pub use runtime::InMemoryAttemptLog;
pub use runtime::InMemoryUpstreamStore;
pub use runtime::ManualClock;
pub use runtime::ReprocessGate;
pub use runtime::ResolverSettings;
pub use runtime::Score;
pub use runtime::ScoringWeights;
pub use runtime::SharedAttemptLog;
pub use runtime::SharedUpstreamStore;
pub use runtime::SystemClock;
pub use runtime::UpstreamResolver;
