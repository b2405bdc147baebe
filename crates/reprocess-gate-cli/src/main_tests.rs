// crates/reprocess-gate-cli/src/main_tests.rs
// ============================================================================
// Module: CLI Main Tests
// Description: Unit tests for argument parsing, bounded reads, and commands.
// Purpose: Exercise each command end to end against a temporary SQLite store.
// Dependencies: reprocess-gate-cli main helpers, tempfile
// ============================================================================

//! ## Overview
//! Commands run through [`execute`] with a config pointing at a temporary
//! database; outputs are parsed back from canonical JSON.

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

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use clap::Parser;
use serde_json::Value;
use tempfile::TempDir;

use super::Cli;
use super::ReadLimitError;
use super::execute;
use super::read_bytes_with_limit;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Temporary workspace holding a config file and its database.
struct Workspace {
    /// Owns the directory for the test's lifetime.
    dir: TempDir,
    /// Config file path.
    config: PathBuf,
}

impl Workspace {
    /// Creates a workspace with a sqlite store and one processor.
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = dir.path().join("gate.db");
        let config = dir.path().join("reprocess-gate.toml");
        let toml = format!(
            r#"[store]
type = "sqlite"
path = '{}'

[audit]
enabled = false

[[field_profiles]]
name = "boxscore"
fields = ["points", "rebounds"]

[[processors]]
name = "player_game_summary"

[[processors.requirements]]
name = "boxscore"
source = "raw_boxscores"
kind = "point_in_time"
field_profile = "boxscore"
"#,
            db.display()
        );
        fs::write(&config, toml).expect("write config");
        Self {
            dir,
            config,
        }
    }

    /// Runs a command and parses its JSON output.
    fn run(&self, args: &[&str]) -> Value {
        let bytes = self.try_run(args).expect("command succeeds");
        serde_json::from_slice(&bytes).expect("json output")
    }

    /// Runs a command with `--config` prepended.
    fn try_run(&self, args: &[&str]) -> Result<Vec<u8>, String> {
        let config = self.config.display().to_string();
        let mut argv = vec!["reprocess-gate", "--config", config.as_str()];
        argv.extend_from_slice(args);
        let cli = Cli::try_parse_from(argv).map_err(|err| err.to_string())?;
        execute(cli).map_err(|err| err.to_string())
    }

    /// Writes a JSON file into the workspace.
    fn write_json(&self, name: &str, value: &Value) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, serde_json::to_vec(value).expect("serialize")).expect("write json");
        path
    }
}

/// Unit arguments for the test processor.
const UNIT: [&str; 6] =
    ["--processor", "player_game_summary", "--entity", "player-2544", "--date", "2024-11-10"];

/// Builds an argument vector from a command and the test unit.
fn with_unit<'a>(command: &'a str, extra: &[&'a str]) -> Vec<&'a str> {
    let mut args = vec![command];
    args.extend_from_slice(&UNIT);
    args.extend_from_slice(extra);
    args
}

/// Returns a path as an owned string argument.
fn arg(path: &Path) -> String {
    path.display().to_string()
}

// ============================================================================
// SECTION: Bounded Reads
// ============================================================================

/// Tests small files are read in full.
#[test]
fn read_bytes_with_limit_allows_small_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("small.bin");
    fs::write(&path, b"ok").unwrap();

    let bytes = read_bytes_with_limit(&path, 16).expect("read small file");
    assert_eq!(bytes, b"ok");
}

/// Tests files over the limit fail closed.
#[test]
fn read_bytes_with_limit_rejects_large_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("large.bin");
    let limit = 8_usize;
    fs::write(&path, vec![0_u8; limit + 1]).unwrap();

    match read_bytes_with_limit(&path, limit).expect_err("expected size limit failure") {
        ReadLimitError::TooLarge {
            size,
            limit: reported,
        } => {
            assert!(size > 8);
            assert_eq!(reported, limit);
        }
        ReadLimitError::Io(err) => panic!("unexpected IO error: {err}"),
    }
}

// ============================================================================
// SECTION: Parsing
// ============================================================================

/// Tests `report` needs a decision file or a full work unit.
#[test]
fn report_requires_unit_or_decision() {
    assert!(Cli::try_parse_from(["reprocess-gate", "report", "--outcome", "success"]).is_err());
    assert!(
        Cli::try_parse_from([
            "reprocess-gate",
            "report",
            "--outcome",
            "failure",
            "--decision",
            "d.json",
            "--processor",
            "p",
        ])
        .is_err()
    );
    assert!(
        Cli::try_parse_from(["reprocess-gate", "report", "--outcome", "success", "--decision", "d.json"])
            .is_ok()
    );
}

/// Tests malformed dates are rejected at parse time.
#[test]
fn malformed_date_is_rejected() {
    let result = Cli::try_parse_from([
        "reprocess-gate",
        "evaluate",
        "--processor",
        "p",
        "--entity",
        "e",
        "--date",
        "11/10/2024",
    ]);
    assert!(result.is_err());
}

// ============================================================================
// SECTION: Commands
// ============================================================================

/// Tests config validation lists processors and profiles.
#[test]
fn config_validate_summarizes() {
    let workspace = Workspace::new();
    let summary = workspace.run(&["config", "validate"]);
    assert_eq!(summary["status"], "ok");
    assert_eq!(summary["processors"], serde_json::json!(["player_game_summary"]));
    assert_eq!(summary["field_profiles"], serde_json::json!(["boxscore"]));
}

/// Tests a missing upstream aborts, and the abort shows up in failures.
#[test]
fn evaluate_without_upstream_aborts() {
    let workspace = Workspace::new();

    let decision = workspace.run(&with_unit("evaluate", &[]));
    assert_eq!(decision["action"], "abort");
    assert_eq!(decision["reason"], "missing_required_dependency:boxscore");
    assert_eq!(decision["attempt_number"], 1);

    let failures = workspace.run(&["failures", "--processor", "player_game_summary"]);
    assert_eq!(
        failures,
        serde_json::json!([{"count": 1, "skip_reason": "missing_required_dependency:boxscore"}])
    );
}

/// Tests ingest, evaluate, and report with a decision file.
#[test]
fn ingest_evaluate_report_round() {
    let workspace = Workspace::new();
    let record = workspace.write_json(
        "boxscore.json",
        &serde_json::json!({"points": 31, "rebounds": 9, "scraped_at": "2024-11-11T02:14:00Z"}),
    );
    let record_arg = arg(&record);

    let fingerprint = workspace.run(&["fingerprint", "--record", record_arg.as_str(), "--profile", "boxscore"]);
    let row = workspace.run(&[
        "ingest",
        "--source",
        "raw_boxscores",
        "--entity",
        "player-2544",
        "--date",
        "2024-11-10",
        "--row-key",
        "game-0022400201",
        "--record",
        record_arg.as_str(),
        "--profile",
        "boxscore",
    ]);
    assert_eq!(row["data_hash"], fingerprint["fingerprint"]);
    assert_eq!(fingerprint["fingerprint"].as_str().unwrap().len(), 16);

    let decision_path = workspace.dir.path().join("decision.json");
    let decision_arg = arg(&decision_path);
    let decision = workspace.run(&with_unit("evaluate", &["--decision-out", decision_arg.as_str()]));
    assert_eq!(decision["action"], "run");
    assert!(decision_path.exists());

    let attempt = workspace.run(&["report", "--outcome", "success", "--decision", decision_arg.as_str()]);
    assert_eq!(attempt["outcome"], "success");
    assert_eq!(attempt["attempt_number"], 1);
    assert_eq!(attempt["completeness_pct"], 100.0);
    assert_eq!(attempt["source_hashes"]["boxscore"], fingerprint["fingerprint"]);

    let again = workspace.run(&with_unit("evaluate", &[]));
    assert_eq!(again["action"], "run");
    assert_eq!(again["statuses"][0]["hash_changed"], false);

    let attempts = workspace.run(&with_unit("attempts", &[]));
    assert_eq!(attempts.as_array().map(Vec::len), Some(1));
}

/// Tests a report without a decision records completeness zero.
#[test]
fn report_without_decision_records_zero_completeness() {
    let workspace = Workspace::new();
    let attempt = workspace.run(&with_unit("report", &["--outcome", "failure"]));
    assert_eq!(attempt["outcome"], "failure");
    assert_eq!(attempt["skip_reason"], "processing_failed");
    assert_eq!(attempt["completeness_pct"], 0.0);
}

/// Tests reporting an ABORT by work unit does not add a second failure.
#[test]
fn report_by_unit_after_abort_counts_once() {
    let workspace = Workspace::new();
    let status_args =
        ["status", "--processor", "player_game_summary", "--entity", "player-2544"];

    for cycle in 1_u64 ..= 2 {
        let decision = workspace.run(&with_unit("evaluate", &[]));
        assert_eq!(decision["action"], "abort");
        let attempt = workspace.run(&with_unit("report", &["--outcome", "failure"]));
        assert_eq!(attempt["attempt_number"], decision["attempt_number"]);
        assert_eq!(attempt["skip_reason"], "missing_required_dependency:boxscore");
        assert_eq!(attempt["attempt_number"], cycle);
    }

    let status = workspace.run(&status_args);
    assert_eq!(status["state"], "closed");
    assert_eq!(status["consecutive_failures"], 2);
    assert_eq!(workspace.run(&with_unit("attempts", &[])).as_array().map(Vec::len), Some(2));
}

/// Tests repeated aborts open the breaker and a forced reset closes it.
#[test]
fn breaker_opens_and_force_reset_closes() {
    let workspace = Workspace::new();
    for _ in 0 .. 3 {
        assert_eq!(workspace.run(&with_unit("evaluate", &[]))["action"], "abort");
    }
    let status_args =
        ["status", "--processor", "player_game_summary", "--entity", "player-2544"];
    assert_eq!(workspace.run(&status_args)["state"], "open");

    let skipped = workspace.run(&with_unit("evaluate", &[]));
    assert_eq!(skipped["action"], "skip");
    assert_eq!(skipped["reason"], "circuit_breaker_open");

    let reset = workspace.run(&with_unit("force-reset", &[]));
    assert_eq!(reset["outcome"], "manual_reset");
    assert_eq!(reset["manual_override_applied"], true);
    assert_eq!(workspace.run(&status_args)["state"], "closed");
}

/// Tests stateful commands refuse the memory backend.
#[test]
fn memory_store_is_rejected() {
    let workspace = Workspace::new();
    fs::write(
        &workspace.config,
        "[[processors]]\nname = \"player_game_summary\"\n",
    )
    .unwrap();
    let error = workspace.try_run(&with_unit("evaluate", &[])).expect_err("memory store");
    assert!(error.contains("sqlite"), "{error}");
}

/// Tests unknown processors fail before touching the store.
#[test]
fn unknown_processor_is_rejected() {
    let workspace = Workspace::new();
    let error = workspace
        .try_run(&["status", "--processor", "nope", "--entity", "e"])
        .expect_err("unknown processor");
    assert!(error.contains("processor `nope` is not configured"), "{error}");
}
