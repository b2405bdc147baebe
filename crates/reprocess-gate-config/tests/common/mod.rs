// crates/reprocess-gate-config/tests/common/mod.rs
// ============================================================================
// Module: Config Test Helpers
// Description: Shared helpers for config validation tests.
// Purpose: Reduce duplication across integration tests for reprocess-gate-config.
// ============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use reprocess_gate_config::ConfigError;
use reprocess_gate_config::ReprocessGateConfig;

/// Parses a TOML string into a `ReprocessGateConfig` without validation.
pub fn config_from_toml(toml_str: &str) -> Result<ReprocessGateConfig, toml::de::Error> {
    toml::from_str(toml_str)
}

/// Returns a minimal config with all defaults applied.
pub fn minimal_config() -> Result<ReprocessGateConfig, toml::de::Error> {
    config_from_toml("")
}

/// Wraps a requirement table body into a single-processor config.
pub fn processor_with_requirement(body: &str) -> String {
    format!(
        "[[processors]]\nname = \"player_game_summary\"\n\n[[processors.requirements]]\n{body}\n"
    )
}

/// Asserts a validation result failed with a message containing `needle`.
pub fn assert_invalid<T>(result: Result<T, ConfigError>, needle: &str) -> Result<(), String> {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(_) => Err("expected invalid config".to_string()),
    }
}
