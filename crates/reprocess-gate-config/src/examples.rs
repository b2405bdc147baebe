// crates/reprocess-gate-config/src/examples.rs
// ============================================================================
// Module: Config Examples
// Description: Canonical example configuration payloads.
// Purpose: Deterministic examples for docs and tooling.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Canonical example `reprocess-gate.toml`. The example must always pass
//! [`crate::ReprocessGateConfig::validate`]; dates are quoted strings.

/// Returns a canonical example `reprocess-gate.toml` configuration.
#[must_use]
pub fn config_toml_example() -> String {
    String::from(
        r#"[gate]
phase = "analytics_aggregation"
season_start = "2024-10-22"
evaluation_timeout_ms = 30000

[breaker]
failure_threshold = 3
base_cooldown_hours = 24
max_cooldown_hours = 168

[scoring]
required_weight = 2.0
optional_weight = 1.0

[store]
type = "sqlite"
path = "reprocess-gate.db"
journal_mode = "wal"
sync_mode = "full"
busy_timeout_ms = 5000

[audit]
enabled = true
path = "reprocess-gate-audit.jsonl"

[[field_profiles]]
name = "boxscore"
fields = ["points", "rebounds", "assists", "minutes"]

[field_profiles.defaults]
minutes = 0

[[field_profiles]]
name = "injury_report"
fields = ["status", "expected_return"]

[[processors]]
name = "player_game_summary"
phase = "analytics_aggregation"

[[processors.requirements]]
name = "boxscore"
source = "raw_boxscores"
kind = "point_in_time"
field_profile = "boxscore"
schedule_source = "raw_schedule"

[[processors.requirements]]
name = "injury_report"
source = "raw_injury_reports"
kind = "point_in_time"
required = false
field_profile = "injury_report"
max_staleness_hours = 12

[[processors]]
name = "player_rolling_features"
phase = "feature_precompute"

[[processors.requirements]]
name = "L10_window"
source = "player_game_summary"
kind = "historical_range"
lookback_days = 30
min_window_coverage = 10

[[processors.requirements]]
name = "summary_quality"
source = "player_game_summary"
kind = "point_in_time"
weight = 0.5
"#,
    )
}
