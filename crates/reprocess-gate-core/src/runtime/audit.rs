// crates/reprocess-gate-core/src/runtime/audit.rs
// ============================================================================
// Module: Reprocess Gate Audit Logging
// Description: Structured audit events for gate decisions and attempts.
// Purpose: Emit JSON-line logs without depending on a logging framework.
// Dependencies: crate::core, serde, serde_json
// ============================================================================

//! ## Overview
//! Every decision, journaled attempt, manual reset, and timeout produces one
//! [`GateAuditEvent`]. Sinks decide where the JSON line goes, so deployments
//! can route events into their own pipeline. Sink failures are swallowed and
//! never affect gate results.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use serde::Serialize;

use crate::core::attempt::AttemptOutcome;
use crate::core::attempt::ReprocessAttempt;
use crate::core::attempt::WorkUnit;
use crate::core::breaker::BreakerState;
use crate::core::decision::Decision;
use crate::core::decision::GateAction;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Events
// ============================================================================

/// Gate audit event payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GateAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event time from the gate clock.
    pub timestamp_ms: i64,
    /// Processor name.
    pub processor_name: String,
    /// Entity key.
    pub entity_id: String,
    /// Date under analysis.
    pub analysis_date: String,
    /// Decision action, for decision and timeout events.
    pub action: Option<GateAction>,
    /// Attempt outcome, for attempt and reset events.
    pub outcome: Option<AttemptOutcome>,
    /// Reason string when present.
    pub reason: Option<String>,
    /// Completeness percentage.
    pub completeness_pct: f64,
    /// Breaker state.
    pub breaker_state: BreakerState,
    /// Attempt number when a row was appended.
    pub attempt_number: Option<u64>,
    /// Whether the attempt left the breaker tripped.
    pub circuit_breaker_tripped: bool,
}

impl GateAuditEvent {
    /// Builds a `gate_decision` event.
    #[must_use]
    pub fn decision(decision: &Decision) -> Self {
        Self {
            event: "gate_decision",
            timestamp_ms: decision.evaluated_at.as_unix_millis(),
            action: Some(decision.action),
            outcome: None,
            reason: decision.reason.clone(),
            completeness_pct: decision.completeness_pct,
            breaker_state: decision.breaker.state,
            attempt_number: decision.attempt_number,
            circuit_breaker_tripped: false,
            ..Self::unit_fields(&decision.work_unit)
        }
    }

    /// Builds a `gate_attempt` event, or `gate_reset` for manual resets.
    #[must_use]
    pub fn attempt(attempt: &ReprocessAttempt, breaker_state: BreakerState) -> Self {
        let event = if attempt.outcome == AttemptOutcome::ManualReset {
            "gate_reset"
        } else {
            "gate_attempt"
        };
        Self {
            event,
            timestamp_ms: attempt.attempted_at.as_unix_millis(),
            action: None,
            outcome: Some(attempt.outcome),
            reason: attempt.skip_reason.clone(),
            completeness_pct: attempt.completeness_pct,
            breaker_state,
            attempt_number: Some(attempt.attempt_number),
            circuit_breaker_tripped: attempt.circuit_breaker_tripped,
            ..Self::unit_fields(&attempt.work_unit())
        }
    }

    /// Builds a `gate_timeout` event.
    #[must_use]
    pub fn timeout(work_unit: &WorkUnit, at: Timestamp, timeout_ms: u64) -> Self {
        Self {
            event: "gate_timeout",
            timestamp_ms: at.as_unix_millis(),
            action: Some(GateAction::Abort),
            reason: Some(format!("evaluation_timeout after {timeout_ms}ms")),
            ..Self::unit_fields(work_unit)
        }
    }

    /// Returns an event carrying only the work unit fields.
    fn unit_fields(work_unit: &WorkUnit) -> Self {
        Self {
            event: "",
            timestamp_ms: 0,
            processor_name: work_unit.processor_name.to_string(),
            entity_id: work_unit.entity_id.to_string(),
            analysis_date: work_unit.analysis_date.to_string(),
            action: None,
            outcome: None,
            reason: None,
            completeness_pct: 0.0,
            breaker_state: BreakerState::Closed,
            attempt_number: None,
            circuit_breaker_tripped: false,
        }
    }
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Audit sink for gate events.
pub trait GateAuditSink: Send + Sync {
    /// Records an audit event.
    fn record(&self, event: &GateAuditEvent);
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl GateAuditSink for StderrAuditSink {
    fn record(&self, event: &GateAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(io::stderr(), "{payload}");
        }
    }
}

/// Audit sink that appends JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl GateAuditSink for FileAuditSink {
    fn record(&self, event: &GateAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// Audit sink that drops every event.
pub struct NoopAuditSink;

impl GateAuditSink for NoopAuditSink {
    fn record(&self, _event: &GateAuditEvent) {}
}

/// Audit sink that keeps events in memory for assertions.
#[derive(Default)]
pub struct InMemoryAuditSink {
    /// Recorded events in order.
    events: Mutex<Vec<GateAuditEvent>>,
}

impl InMemoryAuditSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<GateAuditEvent> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }
}

impl GateAuditSink for InMemoryAuditSink {
    fn record(&self, event: &GateAuditEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
