//! Config loading tests for reprocess-gate-config.
// crates/reprocess-gate-config/tests/config_loading.rs
// ============================================================================
// Module: Config Loading Tests
// Description: Validate file loading limits and error mapping.
// Purpose: Ensure config files are read fail-closed.
// ============================================================================

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::fs;

use reprocess_gate_config::ConfigError;
use reprocess_gate_config::ReprocessGateConfig;
use reprocess_gate_config::config_toml_example;

mod common;

type TestResult = Result<(), String>;

/// Tests a config file on disk loads and validates.
#[test]
fn load_reads_explicit_path() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let path = dir.path().join("reprocess-gate.toml");
    fs::write(&path, config_toml_example()).map_err(|err| err.to_string())?;

    let config = ReprocessGateConfig::load(Some(&path)).map_err(|err| err.to_string())?;

    if config.processors.len() != 2 {
        return Err(format!("expected 2 processors, got {}", config.processors.len()));
    }
    Ok(())
}

/// Tests a missing file is an I/O error.
#[test]
fn load_missing_file_is_io_error() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    match ReprocessGateConfig::load(Some(&dir.path().join("absent.toml"))) {
        Err(ConfigError::Io(_)) => Ok(()),
        other => Err(format!("expected io error, got {other:?}")),
    }
}

/// Tests oversized files are rejected before parsing.
#[test]
fn load_rejects_oversized_file() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let path = dir.path().join("big.toml");
    let padding = format!("# {}\n", "x".repeat(1024 * 1024));
    fs::write(&path, padding).map_err(|err| err.to_string())?;
    common::assert_invalid(ReprocessGateConfig::load(Some(&path)), "size limit")
}

/// Tests non-UTF-8 files are rejected.
#[test]
fn load_rejects_non_utf8() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let path = dir.path().join("binary.toml");
    fs::write(&path, [0xff_u8, 0xfe, 0x00]).map_err(|err| err.to_string())?;
    common::assert_invalid(ReprocessGateConfig::load(Some(&path)), "utf-8")
}

/// Tests overlong path components are rejected.
#[test]
fn load_rejects_long_path_component() -> TestResult {
    let path = std::path::PathBuf::from(format!("{}.toml", "a".repeat(300)));
    common::assert_invalid(ReprocessGateConfig::load(Some(&path)), "component too long")
}
