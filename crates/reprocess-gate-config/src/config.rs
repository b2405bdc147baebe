// crates/reprocess-gate-config/src/config.rs
// ============================================================================
// Module: Reprocess Gate Configuration
// Description: Configuration loading and validation for the reprocess gate.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: reprocess-gate-core, reprocess-gate-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Missing or invalid configuration fails closed: a processor whose
//! requirements cannot be built is rejected at load time rather than at its
//! first evaluation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use reprocess_gate_core::AnalysisDate;
use reprocess_gate_core::BreakerPolicy;
use reprocess_gate_core::DependencyKind;
use reprocess_gate_core::DependencyRequirement;
use reprocess_gate_core::ExpectedRows;
use reprocess_gate_core::FieldProfile;
use reprocess_gate_core::GateSettings;
use reprocess_gate_core::PhaseRole;
use reprocess_gate_core::PhaseThresholds;
use reprocess_gate_core::ProcessorName;
use reprocess_gate_core::ResolverSettings;
use reprocess_gate_core::ScoringWeights;
use reprocess_gate_core::SourceId;
use reprocess_gate_core::validate_requirements;
use reprocess_gate_store_sqlite::SqliteStoreConfig;
use reprocess_gate_store_sqlite::SqliteStoreMode;
use reprocess_gate_store_sqlite::SqliteSyncMode;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "reprocess-gate.toml";
/// Environment variable used to override the config path.
pub(crate) const CONFIG_ENV_VAR: &str = "REPROCESS_GATE_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum number of processors in one config.
pub(crate) const MAX_PROCESSORS: usize = 512;
/// Maximum number of requirements per processor.
pub(crate) const MAX_REQUIREMENTS_PER_PROCESSOR: usize = 128;
/// Upper bound on the evaluation timeout.
pub(crate) const MAX_EVALUATION_TIMEOUT_MS: u64 = 60 * 60 * 1000;
/// Default `SQLite` busy timeout.
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

// ============================================================================
// SECTION: Top-Level Config
// ============================================================================

/// Reprocess gate configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReprocessGateConfig {
    /// Deployment-wide gate settings.
    #[serde(default)]
    pub gate: GateConfig,
    /// Circuit breaker tuning.
    #[serde(default)]
    pub breaker: BreakerConfig,
    /// Completeness scoring weights.
    #[serde(default)]
    pub scoring: ScoringConfig,
    /// Attempt log and upstream store backend.
    #[serde(default)]
    pub store: StoreConfig,
    /// Audit logging.
    #[serde(default)]
    pub audit: AuditConfig,
    /// Named field profiles referenced by requirements.
    #[serde(default)]
    pub field_profiles: Vec<FieldProfile>,
    /// Processor declarations.
    #[serde(default)]
    pub processors: Vec<ProcessorConfig>,
}

impl ReprocessGateConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml_str(content)
    }

    /// Parses and validates configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        if content.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.gate.validate()?;
        self.breaker.to_policy()?;
        self.scoring.to_weights()?;
        self.store.validate()?;
        self.audit.validate()?;
        let mut profile_names = BTreeSet::new();
        for profile in &self.field_profiles {
            profile.validate().map_err(|err| ConfigError::Invalid(err.to_string()))?;
            if !profile_names.insert(profile.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "field profile `{}` is declared more than once",
                    profile.name
                )));
            }
        }
        if self.processors.len() > MAX_PROCESSORS {
            return Err(ConfigError::Invalid(format!(
                "processors exceeds max entries ({MAX_PROCESSORS})"
            )));
        }
        let mut processor_names = BTreeSet::new();
        for processor in &self.processors {
            if processor.name.as_str().trim().is_empty() {
                return Err(ConfigError::Invalid("processor name must be non-empty".to_string()));
            }
            if !processor_names.insert(processor.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "processor `{}` is declared more than once",
                    processor.name
                )));
            }
            self.thresholds(processor)?;
            self.build_requirements(processor)?;
        }
        Ok(())
    }

    /// Returns the declaration for a processor.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the processor is not configured.
    pub fn processor(&self, name: &ProcessorName) -> Result<&ProcessorConfig, ConfigError> {
        self.processors
            .iter()
            .find(|processor| &processor.name == name)
            .ok_or_else(|| ConfigError::Invalid(format!("processor `{name}` is not configured")))
    }

    /// Returns the gate settings for a processor.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the processor is unknown or its settings
    /// are invalid.
    pub fn settings_for(&self, name: &ProcessorName) -> Result<GateSettings, ConfigError> {
        let processor = self.processor(name)?;
        Ok(GateSettings {
            thresholds: self.thresholds(processor)?,
            breaker: self.breaker.to_policy()?,
            weights: self.scoring.to_weights()?,
        })
    }

    /// Returns the resolver settings for a processor.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the processor is unknown or its
    /// thresholds are invalid.
    pub fn resolver_settings_for(
        &self,
        name: &ProcessorName,
    ) -> Result<ResolverSettings, ConfigError> {
        let processor = self.processor(name)?;
        Ok(ResolverSettings {
            thresholds: self.thresholds(processor)?,
            season_start: processor.season_start.or(self.gate.season_start),
        })
    }

    /// Returns the validated requirement list for a processor.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the processor is unknown or a requirement
    /// is invalid.
    pub fn requirements_for(
        &self,
        name: &ProcessorName,
    ) -> Result<Vec<DependencyRequirement>, ConfigError> {
        self.build_requirements(self.processor(name)?)
    }

    /// Returns the evaluation deadline, when one is configured.
    #[must_use]
    pub fn evaluation_timeout(&self) -> Option<Duration> {
        self.gate.evaluation_timeout_ms.map(Duration::from_millis)
    }

    /// Returns the `SQLite` store config, or `None` for the memory backend.
    #[must_use]
    pub fn sqlite_config(&self) -> Option<SqliteStoreConfig> {
        match (self.store.store_type, &self.store.path) {
            (StoreType::Sqlite, Some(path)) => Some(SqliteStoreConfig {
                path: path.clone(),
                busy_timeout_ms: self.store.busy_timeout_ms,
                journal_mode: self.store.journal_mode,
                sync_mode: self.store.sync_mode,
            }),
            _ => None,
        }
    }

    /// Looks up a field profile by name.
    #[must_use]
    pub fn field_profile(&self, name: &str) -> Option<&FieldProfile> {
        self.field_profiles.iter().find(|profile| profile.name == name)
    }

    /// Resolves thresholds: processor overrides, then deployment overrides
    /// (only when the processor keeps the deployment phase), then phase
    /// defaults.
    fn thresholds(&self, processor: &ProcessorConfig) -> Result<PhaseThresholds, ConfigError> {
        let (phase, critical, healthy) = match processor.phase {
            Some(phase) => (phase, processor.critical_pct, processor.healthy_pct),
            None => (
                self.gate.phase,
                processor.critical_pct.or(self.gate.critical_pct),
                processor.healthy_pct.or(self.gate.healthy_pct),
            ),
        };
        let defaults = phase.thresholds();
        PhaseThresholds::new(
            critical.unwrap_or(defaults.critical_pct),
            healthy.unwrap_or(defaults.healthy_pct),
        )
        .map_err(|err| ConfigError::Invalid(format!("processor `{}`: {err}", processor.name)))
    }

    /// Builds and validates a processor's requirement list.
    fn build_requirements(
        &self,
        processor: &ProcessorConfig,
    ) -> Result<Vec<DependencyRequirement>, ConfigError> {
        if processor.requirements.len() > MAX_REQUIREMENTS_PER_PROCESSOR {
            return Err(ConfigError::Invalid(format!(
                "processor `{}` exceeds max requirements ({MAX_REQUIREMENTS_PER_PROCESSOR})",
                processor.name
            )));
        }
        let requirements = processor
            .requirements
            .iter()
            .map(|requirement| requirement.to_requirement(self))
            .collect::<Result<Vec<_>, _>>()?;
        validate_requirements(&requirements)
            .map_err(|err| ConfigError::Invalid(format!("processor `{}`: {err}", processor.name)))?;
        Ok(requirements)
    }
}

// ============================================================================
// SECTION: Gate
// ============================================================================

/// Deployment-wide gate settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GateConfig {
    /// Phase role used for default thresholds.
    #[serde(default)]
    pub phase: PhaseRole,
    /// Critical threshold override.
    #[serde(default)]
    pub critical_pct: Option<f64>,
    /// Healthy threshold override.
    #[serde(default)]
    pub healthy_pct: Option<f64>,
    /// First day of the current season, used for bootstrap detection.
    #[serde(default)]
    pub season_start: Option<AnalysisDate>,
    /// Evaluation deadline in milliseconds.
    #[serde(default)]
    pub evaluation_timeout_ms: Option<u64>,
}

impl GateConfig {
    /// Validates gate settings.
    fn validate(&self) -> Result<(), ConfigError> {
        let defaults = self.phase.thresholds();
        PhaseThresholds::new(
            self.critical_pct.unwrap_or(defaults.critical_pct),
            self.healthy_pct.unwrap_or(defaults.healthy_pct),
        )
        .map_err(|err| ConfigError::Invalid(format!("gate: {err}")))?;
        if let Some(timeout) = self.evaluation_timeout_ms
            && (timeout == 0 || timeout > MAX_EVALUATION_TIMEOUT_MS)
        {
            return Err(ConfigError::Invalid(format!(
                "gate.evaluation_timeout_ms must be between 1 and {MAX_EVALUATION_TIMEOUT_MS}"
            )));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Breaker and Scoring
// ============================================================================

/// Circuit breaker tuning.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct BreakerConfig {
    /// Consecutive failures that trip the breaker.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Cooldown for the first trip, in hours.
    #[serde(default = "default_base_cooldown_hours")]
    pub base_cooldown_hours: u32,
    /// Cooldown cap, in hours.
    #[serde(default = "default_max_cooldown_hours")]
    pub max_cooldown_hours: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            base_cooldown_hours: default_base_cooldown_hours(),
            max_cooldown_hours: default_max_cooldown_hours(),
        }
    }
}

impl BreakerConfig {
    /// Converts into a validated breaker policy.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the policy bounds are invalid.
    pub fn to_policy(&self) -> Result<BreakerPolicy, ConfigError> {
        let policy = BreakerPolicy {
            failure_threshold: self.failure_threshold,
            base_cooldown_hours: self.base_cooldown_hours,
            max_cooldown_hours: self.max_cooldown_hours,
        };
        policy.validate().map_err(|err| ConfigError::Invalid(format!("breaker: {err}")))?;
        Ok(policy)
    }
}

/// Completeness scoring weights.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ScoringConfig {
    /// Weight of required dependencies.
    #[serde(default = "default_required_weight")]
    pub required_weight: f64,
    /// Weight of optional dependencies.
    #[serde(default = "default_optional_weight")]
    pub optional_weight: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            required_weight: default_required_weight(),
            optional_weight: default_optional_weight(),
        }
    }
}

impl ScoringConfig {
    /// Converts into validated scoring weights.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a weight is out of range.
    pub fn to_weights(&self) -> Result<ScoringWeights, ConfigError> {
        let weights = ScoringWeights {
            required_weight: self.required_weight,
            optional_weight: self.optional_weight,
        };
        weights.validate().map_err(|err| ConfigError::Invalid(format!("scoring: {err}")))?;
        Ok(weights)
    }
}

// ============================================================================
// SECTION: Store and Audit
// ============================================================================

/// Store backend type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreType {
    /// In-memory stores; nothing survives the process.
    #[default]
    Memory,
    /// `SQLite`-backed durable stores.
    Sqlite,
}

/// Attempt log and upstream store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Store backend type.
    #[serde(rename = "type", default)]
    pub store_type: StoreType,
    /// `SQLite` database path when using the sqlite backend.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` synchronous mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            store_type: StoreType::default(),
            path: None,
            busy_timeout_ms: default_busy_timeout_ms(),
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

impl StoreConfig {
    /// Validates store configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match self.store_type {
            StoreType::Memory => {
                if self.path.is_some() {
                    return Err(ConfigError::Invalid(
                        "memory store must not set path".to_string(),
                    ));
                }
                Ok(())
            }
            StoreType::Sqlite => {
                let path = self
                    .path
                    .as_ref()
                    .ok_or_else(|| ConfigError::Invalid("sqlite store requires path".to_string()))?;
                validate_store_path("store", path)
            }
        }
    }
}

/// Audit logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    /// Enables audit events.
    #[serde(default = "default_audit_enabled")]
    pub enabled: bool,
    /// Append-only JSON lines file; stderr when unset.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_audit_enabled(),
            path: None,
        }
    }
}

impl AuditConfig {
    /// Validates audit configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.path {
            validate_store_path("audit", path)?;
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Processors
// ============================================================================

/// One processor and its upstream requirements.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessorConfig {
    /// Processor name.
    pub name: ProcessorName,
    /// Phase override.
    #[serde(default)]
    pub phase: Option<PhaseRole>,
    /// Critical threshold override.
    #[serde(default)]
    pub critical_pct: Option<f64>,
    /// Healthy threshold override.
    #[serde(default)]
    pub healthy_pct: Option<f64>,
    /// Season start override.
    #[serde(default)]
    pub season_start: Option<AnalysisDate>,
    /// Requirement declarations.
    #[serde(default)]
    pub requirements: Vec<RequirementConfig>,
}

/// Requirement declaration as written in TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct RequirementConfig {
    /// Requirement name, unique per processor.
    pub name: String,
    /// Upstream source.
    pub source: String,
    /// Check pattern.
    pub kind: DependencyKind,
    /// Whether a CRITICAL status hard-fails the unit of work.
    #[serde(default = "default_required")]
    pub required: bool,
    /// Minimum healthy row count.
    #[serde(default)]
    pub min_rows: Option<u32>,
    /// Fixed expected row count.
    #[serde(default)]
    pub expected_rows: Option<u32>,
    /// Companion schedule source supplying the expected row count.
    #[serde(default)]
    pub schedule_source: Option<String>,
    /// Historical window length in days.
    #[serde(default)]
    pub lookback_days: Option<u32>,
    /// Minimum distinct periods expected in the window.
    #[serde(default)]
    pub min_window_coverage: Option<u32>,
    /// Name of a `[[field_profiles]]` entry.
    #[serde(default)]
    pub field_profile: Option<String>,
    /// Scoring weight override.
    #[serde(default)]
    pub weight: Option<f64>,
    /// Freshness bound in hours.
    #[serde(default)]
    pub max_staleness_hours: Option<u32>,
}

impl RequirementConfig {
    /// Builds a validated requirement, resolving profile references.
    fn to_requirement(
        &self,
        config: &ReprocessGateConfig,
    ) -> Result<DependencyRequirement, ConfigError> {
        let invalid =
            |message: &str| ConfigError::Invalid(format!("requirement `{}`: {message}", self.name));
        let mut requirement = match self.kind {
            DependencyKind::PointInTime => {
                DependencyRequirement::point_in_time(self.name.as_str(), self.source.as_str())
            }
            DependencyKind::HistoricalRange => DependencyRequirement::historical_range(
                self.name.as_str(),
                self.source.as_str(),
                self.lookback_days.unwrap_or(0),
                self.min_window_coverage.unwrap_or(0),
            ),
        };
        requirement.lookback_days = self.lookback_days;
        requirement.min_window_coverage = self.min_window_coverage;
        if !self.required {
            requirement = requirement.optional();
        }
        if let Some(min_rows) = self.min_rows {
            requirement = requirement.with_min_rows(min_rows);
        }
        match (self.expected_rows, &self.schedule_source) {
            (Some(_), Some(_)) => {
                return Err(invalid("expected_rows and schedule_source are mutually exclusive"));
            }
            (Some(rows), None) => {
                requirement = requirement.with_expected_rows(ExpectedRows::Fixed {
                    rows,
                });
            }
            (None, Some(source)) => {
                requirement = requirement.with_expected_rows(ExpectedRows::Schedule {
                    source: SourceId::new(source.as_str()),
                });
            }
            (None, None) => {
                if self.kind == DependencyKind::PointInTime
                    && let Some(min_rows) = self.min_rows
                {
                    requirement = requirement.with_expected_rows(ExpectedRows::Fixed {
                        rows: min_rows,
                    });
                }
            }
        }
        if let Some(profile_name) = &self.field_profile {
            let profile = config.field_profile(profile_name).ok_or_else(|| {
                invalid(&format!("references unknown field profile `{profile_name}`"))
            })?;
            requirement = requirement.with_field_profile(profile.clone());
        }
        if let Some(weight) = self.weight {
            requirement = requirement.with_weight(weight);
        }
        if let Some(hours) = self.max_staleness_hours {
            if hours == 0 {
                return Err(invalid("max_staleness_hours must be greater than zero"));
            }
            requirement = requirement.with_max_staleness_hours(hours);
        }
        requirement.validate().map_err(|err| ConfigError::Invalid(err.to_string()))?;
        Ok(requirement)
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error while reading config.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a configured file path against length constraints.
fn validate_store_path(field: &str, path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{field} path must be non-empty")));
    }
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} path exceeds max length")));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Default breaker failure threshold.
fn default_failure_threshold() -> u32 {
    BreakerPolicy::default().failure_threshold
}

/// Default first-trip cooldown.
fn default_base_cooldown_hours() -> u32 {
    BreakerPolicy::default().base_cooldown_hours
}

/// Default cooldown cap.
fn default_max_cooldown_hours() -> u32 {
    BreakerPolicy::default().max_cooldown_hours
}

/// Default weight of required dependencies.
fn default_required_weight() -> f64 {
    ScoringWeights::default().required_weight
}

/// Default weight of optional dependencies.
fn default_optional_weight() -> f64 {
    ScoringWeights::default().optional_weight
}

/// Default `SQLite` busy timeout.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

/// Audit events are on unless disabled.
const fn default_audit_enabled() -> bool {
    true
}

/// Requirements are required unless marked otherwise.
const fn default_required() -> bool {
    true
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test fixtures use explicit asserts and unwraps for clarity."
    )]

    use super::*;

    /// Tests store paths with oversized components are rejected.
    #[test]
    fn store_path_rejects_long_component() {
        let long = "a".repeat(MAX_PATH_COMPONENT_LENGTH + 1);
        let path = PathBuf::from(format!("data/{long}.db"));
        assert!(validate_store_path("store", &path).is_err());
        assert!(validate_store_path("store", Path::new("data/gate.db")).is_ok());
    }

    /// Tests an explicit path takes precedence over env and default.
    #[test]
    fn explicit_path_wins_resolution() {
        let resolved = resolve_path(Some(Path::new("custom.toml"))).unwrap();
        assert_eq!(resolved, PathBuf::from("custom.toml"));
    }

    /// Tests deployment overrides apply only to processors inheriting the phase.
    #[test]
    fn deployment_overrides_skip_processors_with_own_phase() {
        let config = ReprocessGateConfig {
            gate: GateConfig {
                critical_pct: Some(10.0),
                ..GateConfig::default()
            },
            ..ReprocessGateConfig::default()
        };
        let inherited = ProcessorConfig {
            name: ProcessorName::new("a"),
            phase: None,
            critical_pct: None,
            healthy_pct: None,
            season_start: None,
            requirements: Vec::new(),
        };
        let own_phase = ProcessorConfig {
            phase: Some(PhaseRole::Prediction),
            ..inherited.clone()
        };

        assert!((config.thresholds(&inherited).unwrap().critical_pct - 10.0).abs() < f64::EPSILON);
        assert!((config.thresholds(&own_phase).unwrap().critical_pct - 70.0).abs() < f64::EPSILON);
    }
}
