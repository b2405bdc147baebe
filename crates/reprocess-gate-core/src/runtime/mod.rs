// crates/reprocess-gate-core/src/runtime/mod.rs
// ============================================================================
// Module: Reprocess Gate Runtime
// Description: Resolver, calculator, breaker cache, engine, and helpers.
// Purpose: Execute gate evaluations against upstream and attempt stores.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! Runtime modules implement dependency resolution, scoring, and the gate
//! engine. Every caller surface goes through [`ReprocessGate`] so the
//! journaling rules stay in one place.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod audit;
pub mod breaker;
pub mod calculator;
pub mod clock;
pub mod engine;
pub mod resolver;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::FileAuditSink;
pub use audit::GateAuditEvent;
pub use audit::GateAuditSink;
pub use audit::InMemoryAuditSink;
pub use audit::NoopAuditSink;
pub use audit::StderrAuditSink;
pub use breaker::BreakerCache;
pub use calculator::CompletenessCalculator;
pub use calculator::Score;
pub use calculator::ScoringError;
pub use calculator::ScoringWeights;
pub use clock::ManualClock;
pub use clock::SystemClock;
pub use engine::GateError;
pub use engine::GateSettings;
pub use engine::ReprocessGate;
pub use resolver::ResolverSettings;
pub use resolver::UpstreamResolver;
pub use store::InMemoryAttemptLog;
pub use store::InMemoryUpstreamStore;
pub use store::SharedAttemptLog;
pub use store::SharedUpstreamStore;
