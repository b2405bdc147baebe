// crates/reprocess-gate-core/src/runtime/clock.rs
// ============================================================================
// Module: Reprocess Gate Clocks
// Description: Wall-clock and manually driven clock implementations.
// Purpose: Keep time injection explicit so breaker cooldowns are replayable.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! [`SystemClock`] reads the host clock. [`ManualClock`] only moves when told
//! to, which makes cooldown expiry testable without sleeping.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use crate::core::time::MILLIS_PER_HOUR;
use crate::core::time::Timestamp;
use crate::interfaces::Clock;

// ============================================================================
// SECTION: Clocks
// ============================================================================

/// Clock backed by the host's system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let millis = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        Timestamp::from_unix_millis(i64::try_from(millis).unwrap_or(i64::MAX))
    }
}

/// Shared clock advanced explicitly by the host.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    /// Current time in unix epoch milliseconds.
    millis: Arc<AtomicI64>,
}

impl ManualClock {
    /// Creates a clock fixed at `start`.
    #[must_use]
    pub fn new(start: Timestamp) -> Self {
        Self {
            millis: Arc::new(AtomicI64::new(start.as_unix_millis())),
        }
    }

    /// Sets the current time.
    pub fn set(&self, now: Timestamp) {
        self.millis.store(now.as_unix_millis(), Ordering::SeqCst);
    }

    /// Moves the clock forward by `millis`.
    pub fn advance_millis(&self, millis: i64) {
        self.millis.fetch_add(millis, Ordering::SeqCst);
    }

    /// Moves the clock forward by whole hours.
    pub fn advance_hours(&self, hours: i64) {
        self.advance_millis(hours.saturating_mul(MILLIS_PER_HOUR));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_unix_millis(self.millis.load(Ordering::SeqCst))
    }
}
