// crates/reprocess-gate-core/src/core/mod.rs
// ============================================================================
// Module: Reprocess Gate Core Types
// Description: Canonical data model for requirements, statuses, and attempts.
// Purpose: Provide stable, serializable types shared by every gate surface.
// Dependencies: serde, serde_jcs, sha2, time
// ============================================================================

//! ## Overview
//! Core types describe what a processor depends on, how healthy those
//! dependencies are, and the append-only attempt history the circuit breaker
//! is derived from. They carry no I/O.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod attempt;
pub mod breaker;
pub mod decision;
pub mod fingerprint;
pub mod identifiers;
pub mod requirement;
pub mod status;
pub mod time;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use attempt::AttemptDraft;
pub use attempt::AttemptError;
pub use attempt::AttemptOutcome;
pub use attempt::BreakerKey;
pub use attempt::ReprocessAttempt;
pub use attempt::SkipReasonCount;
pub use attempt::WorkUnit;
pub use breaker::BreakerHistory;
pub use breaker::BreakerPolicy;
pub use breaker::BreakerPolicyError;
pub use breaker::BreakerState;
pub use breaker::CircuitBreakerState;
pub use breaker::TripOutcome;
pub use decision::Decision;
pub use decision::GateAction;
pub use decision::GateRefusal;
pub use decision::ReportOutcome;
pub use fingerprint::FINGERPRINT_LEN;
pub use fingerprint::FieldProfile;
pub use fingerprint::Fingerprint;
pub use fingerprint::FingerprintError;
pub use fingerprint::MissingFieldError;
pub use fingerprint::ProfileError;
pub use fingerprint::Record;
pub use fingerprint::canonical_json_bytes;
pub use fingerprint::combine_fingerprints;
pub use fingerprint::compute_fingerprint;
pub use identifiers::EntityId;
pub use identifiers::ProcessorName;
pub use identifiers::RequirementName;
pub use identifiers::SourceId;
pub use requirement::DependencyKind;
pub use requirement::DependencyRequirement;
pub use requirement::ExpectedRows;
pub use requirement::RequirementError;
pub use requirement::validate_requirements;
pub use status::DependencyStatus;
pub use status::PhaseRole;
pub use status::PhaseThresholds;
pub use status::StatusLevel;
pub use status::ThresholdError;
pub use self::time::AnalysisDate;
pub use self::time::DateParseError;
pub use self::time::Timestamp;
