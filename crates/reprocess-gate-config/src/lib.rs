// crates/reprocess-gate-config/src/lib.rs
// ============================================================================
// Module: Reprocess Gate Config Library
// Description: Canonical configuration model and validation for the gate.
// Purpose: Single source of truth for `reprocess-gate.toml`.
// Dependencies: reprocess-gate-core, reprocess-gate-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! This crate loads `reprocess-gate.toml`, validates it fail-closed, and turns
//! processor declarations into the settings and requirement lists the gate
//! consumes.

pub mod config;
pub mod examples;

pub use config::*;
pub use examples::config_toml_example;
