// crates/reprocess-gate-cli/src/main.rs
// ============================================================================
// Module: Reprocess Gate CLI Entry Point
// Description: Command dispatcher for gate evaluation and operator queries.
// Purpose: Expose evaluate, report, and reset to pipeline stages and operators.
// Dependencies: clap, reprocess-gate-config, reprocess-gate-core,
//               reprocess-gate-store-sqlite, serde, serde_jcs, thiserror
// ============================================================================

//! ## Overview
//! The reprocess gate CLI wires the `SQLite` stores and the configured
//! processor declarations into a [`ReprocessGate`] and runs one operation per
//! invocation. Results are written to stdout as canonical JSON (RFC 8785);
//! errors go to stderr with a failure exit code.
//!
//! Each invocation is its own process, so a `report` without `--decision`
//! has no pending evaluation to attach to and records completeness 0.
//! Pass the file written by `evaluate --decision-out` to keep completeness
//! and fingerprints on the reported row.

// ============================================================================
// SECTION: Modules
// ============================================================================

#[cfg(test)]
mod main_tests;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::fs::File;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use reprocess_gate_config::ReprocessGateConfig;
use reprocess_gate_core::AnalysisDate;
use reprocess_gate_core::AttemptLog;
use reprocess_gate_core::BreakerKey;
use reprocess_gate_core::Clock;
use reprocess_gate_core::DateParseError;
use reprocess_gate_core::Decision;
use reprocess_gate_core::EntityId;
use reprocess_gate_core::ProcessorName;
use reprocess_gate_core::Record;
use reprocess_gate_core::ReportOutcome;
use reprocess_gate_core::ReprocessGate;
use reprocess_gate_core::SourceId;
use reprocess_gate_core::SystemClock;
use reprocess_gate_core::Timestamp;
use reprocess_gate_core::UpstreamResolver;
use reprocess_gate_core::UpstreamRow;
use reprocess_gate_core::WorkUnit;
use reprocess_gate_core::compute_fingerprint;
use reprocess_gate_core::runtime::FileAuditSink;
use reprocess_gate_core::runtime::GateAuditSink;
use reprocess_gate_core::runtime::NoopAuditSink;
use reprocess_gate_core::runtime::StderrAuditSink;
use reprocess_gate_store_sqlite::MAX_RECORD_BYTES;
use reprocess_gate_store_sqlite::SqliteAttemptLog;
use reprocess_gate_store_sqlite::SqliteStoreConfig;
use reprocess_gate_store_sqlite::SqliteUpstreamStore;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum size of a serialized `Decision` input.
const MAX_DECISION_BYTES: usize = 4 * 1024 * 1024;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "reprocess-gate", version, disable_help_subcommand = true)]
struct Cli {
    /// Optional config file path (defaults to reprocess-gate.toml or env override).
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Decide RUN, SKIP, or ABORT for a unit of work.
    Evaluate(EvaluateCommand),
    /// Record the outcome of a unit of work.
    Report(ReportCommand),
    /// Clear the circuit breaker for a processor and entity.
    ForceReset(UnitArgs),
    /// Show the circuit breaker state for a processor and entity.
    Status(BreakerArgs),
    /// List attempts for a unit of work.
    Attempts(UnitArgs),
    /// Count journaled skip reasons for a processor.
    Failures(FailuresCommand),
    /// Fingerprint and persist an upstream row.
    Ingest(IngestCommand),
    /// Print the fingerprint of a record under a field profile.
    Fingerprint(FingerprintCommand),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate a reprocess gate configuration file.
    Validate,
    /// Print the canonical example configuration.
    Example,
}

/// Work unit selection shared by several commands.
#[derive(Args, Debug, Clone)]
struct UnitArgs {
    /// Processor name.
    #[arg(long, value_name = "NAME")]
    processor: String,
    /// Entity key.
    #[arg(long, value_name = "ID")]
    entity: String,
    /// Analysis date.
    #[arg(long, value_name = "YYYY-MM-DD", value_parser = parse_date)]
    date: AnalysisDate,
}

impl UnitArgs {
    /// Returns the selected work unit.
    fn work_unit(&self) -> WorkUnit {
        WorkUnit::new(self.processor.as_str(), self.entity.as_str(), self.date)
    }
}

/// Breaker selection.
#[derive(Args, Debug)]
struct BreakerArgs {
    /// Processor name.
    #[arg(long, value_name = "NAME")]
    processor: String,
    /// Entity key.
    #[arg(long, value_name = "ID")]
    entity: String,
}

/// Arguments for `evaluate`.
#[derive(Args, Debug)]
struct EvaluateCommand {
    /// Unit of work.
    #[command(flatten)]
    unit: UnitArgs,
    /// Also write the decision JSON to this file for a later `report`.
    #[arg(long, value_name = "PATH")]
    decision_out: Option<PathBuf>,
}

/// Arguments for `report`.
///
/// Without `--decision`, a unit whose latest row is a journaled SKIP or ABORT
/// reports that row; a RUN must be reported with `--decision`.
#[derive(Args, Debug)]
struct ReportCommand {
    /// Outcome of the work.
    #[arg(long, value_enum)]
    outcome: OutcomeArg,
    /// Decision JSON written by `evaluate --decision-out`.
    #[arg(long, value_name = "PATH", conflicts_with_all = ["processor", "entity", "date"])]
    decision: Option<PathBuf>,
    /// Processor name.
    #[arg(long, value_name = "NAME", required_unless_present = "decision")]
    processor: Option<String>,
    /// Entity key.
    #[arg(long, value_name = "ID", required_unless_present = "decision")]
    entity: Option<String>,
    /// Analysis date.
    #[arg(
        long,
        value_name = "YYYY-MM-DD",
        value_parser = parse_date,
        required_unless_present = "decision"
    )]
    date: Option<AnalysisDate>,
}

/// Reported outcome.
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
enum OutcomeArg {
    /// Work succeeded.
    Success,
    /// Work failed.
    Failure,
}

impl From<OutcomeArg> for ReportOutcome {
    fn from(value: OutcomeArg) -> Self {
        match value {
            OutcomeArg::Success => Self::Success,
            OutcomeArg::Failure => Self::Failure,
        }
    }
}

/// Arguments for `failures`.
#[derive(Args, Debug)]
struct FailuresCommand {
    /// Processor name.
    #[arg(long, value_name = "NAME")]
    processor: String,
}

/// Arguments for `ingest`.
#[derive(Args, Debug)]
struct IngestCommand {
    /// Upstream source identifier.
    #[arg(long, value_name = "SOURCE")]
    source: String,
    /// Entity key.
    #[arg(long, value_name = "ID")]
    entity: String,
    /// Period the row covers.
    #[arg(long, value_name = "YYYY-MM-DD", value_parser = parse_date)]
    date: AnalysisDate,
    /// Row key, unique within the source, entity, and date.
    #[arg(long, value_name = "KEY")]
    row_key: String,
    /// Path to a JSON object holding the record.
    #[arg(long, value_name = "PATH")]
    record: PathBuf,
    /// Field profile used to fingerprint the record.
    #[arg(long, value_name = "NAME")]
    profile: Option<String>,
    /// Row update time in unix milliseconds (defaults to now).
    #[arg(long, value_name = "MILLIS")]
    updated_at_ms: Option<i64>,
}

/// Arguments for `fingerprint`.
#[derive(Args, Debug)]
struct FingerprintCommand {
    /// Path to a JSON object holding the record.
    #[arg(long, value_name = "PATH")]
    record: PathBuf,
    /// Field profile name from the config.
    #[arg(long, value_name = "NAME")]
    profile: String,
}

// ============================================================================
// SECTION: Outputs
// ============================================================================

/// `config validate` output.
#[derive(Debug, Serialize)]
struct ConfigSummary {
    /// Validation status.
    status: &'static str,
    /// Configured processors.
    processors: Vec<String>,
    /// Configured field profiles.
    field_profiles: Vec<String>,
}

/// `fingerprint` output.
#[derive(Debug, Serialize)]
struct FingerprintOutput {
    /// Field profile applied.
    profile: String,
    /// Resulting fingerprint.
    fingerprint: String,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

/// Errors raised by bounded file reads.
#[derive(Debug)]
enum ReadLimitError {
    /// File I/O failure.
    Io(std::io::Error),
    /// File size exceeds the configured limit.
    TooLarge {
        /// Actual size in bytes.
        size: u64,
        /// Allowed limit in bytes.
        limit: usize,
    },
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    let cli = Cli::parse();
    match execute(cli) {
        Ok(bytes) => match write_stdout_bytes(&bytes) {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => emit_error(&format!("failed to write stdout: {err}")),
        },
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Runs a parsed command and returns its canonical JSON output.
fn execute(cli: Cli) -> CliResult<Vec<u8>> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Evaluate(command) => command_evaluate(config_path, &command),
        Commands::Report(command) => command_report(config_path, &command),
        Commands::ForceReset(unit) => command_force_reset(config_path, &unit),
        Commands::Status(command) => command_status(config_path, &command),
        Commands::Attempts(unit) => command_attempts(config_path, &unit),
        Commands::Failures(command) => command_failures(config_path, &command),
        Commands::Ingest(command) => command_ingest(config_path, &command),
        Commands::Fingerprint(command) => command_fingerprint(config_path, &command),
        Commands::Config {
            command,
        } => command_config(config_path, &command),
    }
}

// ============================================================================
// SECTION: Gate Commands
// ============================================================================

/// Gate over the `SQLite` stores.
type SqliteGate =
    ReprocessGate<UpstreamResolver<SqliteUpstreamStore>, SqliteAttemptLog, SystemClock>;

/// Executes `evaluate`.
fn command_evaluate(config_path: Option<&Path>, command: &EvaluateCommand) -> CliResult<Vec<u8>> {
    let config = load_config(config_path)?;
    let work_unit = command.unit.work_unit();
    let requirements = config
        .requirements_for(&work_unit.processor_name)
        .map_err(|err| CliError::new(err.to_string()))?;
    let gate = Arc::new(build_gate(&config, &work_unit.processor_name)?);
    let decision = match config.evaluation_timeout() {
        Some(timeout) => gate.evaluate_with_timeout(&work_unit, &requirements, timeout),
        None => gate.evaluate(&work_unit, &requirements),
    }
    .map_err(|err| CliError::new(format!("evaluation failed: {err}")))?;
    let bytes = canonical_json(&decision)?;
    if let Some(path) = &command.decision_out {
        fs::write(path, &bytes).map_err(|err| {
            CliError::new(format!("failed to write decision to {}: {err}", path.display()))
        })?;
    }
    Ok(bytes)
}

/// Executes `report`.
fn command_report(config_path: Option<&Path>, command: &ReportCommand) -> CliResult<Vec<u8>> {
    let config = load_config(config_path)?;
    let outcome = ReportOutcome::from(command.outcome);
    let attempt = if let Some(path) = &command.decision {
        let decision: Decision = read_json(path, "decision", MAX_DECISION_BYTES)?;
        let gate = build_gate(&config, &decision.work_unit.processor_name)?;
        gate.report_decision(&decision, outcome)
    } else {
        let (Some(processor), Some(entity), Some(date)) =
            (&command.processor, &command.entity, command.date)
        else {
            return Err(CliError::new(
                "report requires --decision or --processor, --entity, and --date".to_string(),
            ));
        };
        let work_unit = WorkUnit::new(processor.as_str(), entity.as_str(), date);
        let gate = build_gate(&config, &work_unit.processor_name)?;
        gate.report(&work_unit, outcome)
    }
    .map_err(|err| CliError::new(format!("report failed: {err}")))?;
    canonical_json(&attempt)
}

/// Executes `force-reset`.
fn command_force_reset(config_path: Option<&Path>, unit: &UnitArgs) -> CliResult<Vec<u8>> {
    let config = load_config(config_path)?;
    let work_unit = unit.work_unit();
    let gate = build_gate(&config, &work_unit.processor_name)?;
    let attempt = gate
        .force_reset(&work_unit)
        .map_err(|err| CliError::new(format!("force reset failed: {err}")))?;
    canonical_json(&attempt)
}

/// Executes `status`.
fn command_status(config_path: Option<&Path>, command: &BreakerArgs) -> CliResult<Vec<u8>> {
    let config = load_config(config_path)?;
    let processor = ProcessorName::new(command.processor.as_str());
    let gate = build_gate(&config, &processor)?;
    let key = BreakerKey {
        processor_name: processor,
        entity_id: EntityId::new(command.entity.as_str()),
    };
    let state = gate
        .breaker_state(&key)
        .map_err(|err| CliError::new(format!("breaker lookup failed: {err}")))?;
    canonical_json(&state)
}

/// Executes `attempts`.
fn command_attempts(config_path: Option<&Path>, unit: &UnitArgs) -> CliResult<Vec<u8>> {
    let config = load_config(config_path)?;
    let log = open_attempt_log(&config)?;
    let attempts = log
        .attempts(&unit.work_unit())
        .map_err(|err| CliError::new(format!("attempt lookup failed: {err}")))?;
    canonical_json(&attempts)
}

/// Executes `failures`.
fn command_failures(config_path: Option<&Path>, command: &FailuresCommand) -> CliResult<Vec<u8>> {
    let config = load_config(config_path)?;
    let log = open_attempt_log(&config)?;
    let counts = log
        .skip_reason_counts(&ProcessorName::new(command.processor.as_str()))
        .map_err(|err| CliError::new(format!("failure summary failed: {err}")))?;
    canonical_json(&counts)
}

// ============================================================================
// SECTION: Upstream Commands
// ============================================================================

/// Executes `ingest`.
fn command_ingest(config_path: Option<&Path>, command: &IngestCommand) -> CliResult<Vec<u8>> {
    let config = load_config(config_path)?;
    let profile = match &command.profile {
        Some(name) => Some(
            config
                .field_profile(name)
                .ok_or_else(|| CliError::new(format!("unknown field profile `{name}`")))?,
        ),
        None => None,
    };
    let record = read_record(&command.record)?;
    let store = SqliteUpstreamStore::new(&require_sqlite(&config)?)
        .map_err(|err| CliError::new(format!("failed to open upstream store: {err}")))?;
    let row = UpstreamRow {
        source: SourceId::new(command.source.as_str()),
        entity_id: EntityId::new(command.entity.as_str()),
        analysis_date: command.date,
        row_key: command.row_key.clone(),
        record,
        data_hash: None,
        updated_at: command
            .updated_at_ms
            .map_or_else(|| SystemClock.now(), Timestamp::from_unix_millis),
    };
    let stored = store
        .put_row(row, profile)
        .map_err(|err| CliError::new(format!("ingest failed: {err}")))?;
    canonical_json(&stored)
}

/// Executes `fingerprint`.
fn command_fingerprint(
    config_path: Option<&Path>,
    command: &FingerprintCommand,
) -> CliResult<Vec<u8>> {
    let config = load_config(config_path)?;
    let profile = config
        .field_profile(&command.profile)
        .ok_or_else(|| CliError::new(format!("unknown field profile `{}`", command.profile)))?;
    let record = read_record(&command.record)?;
    let fingerprint = compute_fingerprint(&record, profile)
        .map_err(|err| CliError::new(format!("fingerprint failed: {err}")))?;
    canonical_json(&FingerprintOutput {
        profile: profile.name.clone(),
        fingerprint: fingerprint.as_str().to_string(),
    })
}

// ============================================================================
// SECTION: Config Commands
// ============================================================================

/// Executes config subcommands.
fn command_config(config_path: Option<&Path>, command: &ConfigCommand) -> CliResult<Vec<u8>> {
    match command {
        ConfigCommand::Validate => {
            let config = load_config(config_path)?;
            canonical_json(&ConfigSummary {
                status: "ok",
                processors: config
                    .processors
                    .iter()
                    .map(|processor| processor.name.to_string())
                    .collect(),
                field_profiles: config
                    .field_profiles
                    .iter()
                    .map(|profile| profile.name.clone())
                    .collect(),
            })
        }
        ConfigCommand::Example => Ok(reprocess_gate_config::config_toml_example().into_bytes()),
    }
}

// ============================================================================
// SECTION: Wiring
// ============================================================================

/// Loads and validates configuration.
fn load_config(path: Option<&Path>) -> CliResult<ReprocessGateConfig> {
    ReprocessGateConfig::load(path)
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))
}

/// Returns the `SQLite` settings or fails for the memory backend.
fn require_sqlite(config: &ReprocessGateConfig) -> CliResult<SqliteStoreConfig> {
    config.sqlite_config().ok_or_else(|| {
        CliError::new(
            "the CLI persists attempts between runs and requires store.type = \"sqlite\""
                .to_string(),
        )
    })
}

/// Opens the attempt log.
fn open_attempt_log(config: &ReprocessGateConfig) -> CliResult<SqliteAttemptLog> {
    SqliteAttemptLog::new(&require_sqlite(config)?)
        .map_err(|err| CliError::new(format!("failed to open attempt log: {err}")))
}

/// Builds the audit sink selected by config.
fn audit_sink(config: &ReprocessGateConfig) -> CliResult<Arc<dyn GateAuditSink>> {
    if !config.audit.enabled {
        return Ok(Arc::new(NoopAuditSink));
    }
    match &config.audit.path {
        Some(path) => {
            let sink = FileAuditSink::new(path).map_err(|err| {
                CliError::new(format!("failed to open audit log {}: {err}", path.display()))
            })?;
            Ok(Arc::new(sink))
        }
        None => Ok(Arc::new(StderrAuditSink)),
    }
}

/// Builds a gate for one configured processor.
fn build_gate(config: &ReprocessGateConfig, processor: &ProcessorName) -> CliResult<SqliteGate> {
    let settings = config.settings_for(processor).map_err(|err| CliError::new(err.to_string()))?;
    let resolver_settings =
        config.resolver_settings_for(processor).map_err(|err| CliError::new(err.to_string()))?;
    let store_config = require_sqlite(config)?;
    let upstream = SqliteUpstreamStore::new(&store_config)
        .map_err(|err| CliError::new(format!("failed to open upstream store: {err}")))?;
    let log = SqliteAttemptLog::new(&store_config)
        .map_err(|err| CliError::new(format!("failed to open attempt log: {err}")))?;
    let gate = ReprocessGate::new(
        UpstreamResolver::new(upstream, resolver_settings),
        log,
        SystemClock,
        settings,
    )
    .map_err(|err| CliError::new(err.to_string()))?;
    Ok(gate.with_audit(audit_sink(config)?))
}

// ============================================================================
// SECTION: Input Helpers
// ============================================================================

/// Parses a `YYYY-MM-DD` argument.
fn parse_date(value: &str) -> Result<AnalysisDate, String> {
    value.parse().map_err(|err: DateParseError| err.to_string())
}

/// Reads a file from disk while enforcing a hard size limit.
fn read_bytes_with_limit(path: &Path, max_bytes: usize) -> Result<Vec<u8>, ReadLimitError> {
    let file = File::open(path).map_err(ReadLimitError::Io)?;
    let metadata = file.metadata().map_err(ReadLimitError::Io)?;
    let size = metadata.len();
    let limit = u64::try_from(max_bytes).map_err(|_| ReadLimitError::TooLarge {
        size,
        limit: max_bytes,
    })?;
    if size > limit {
        return Err(ReadLimitError::TooLarge {
            size,
            limit: max_bytes,
        });
    }

    let mut limited = file.take(limit.saturating_add(1));
    let mut bytes = Vec::new();
    limited.read_to_end(&mut bytes).map_err(ReadLimitError::Io)?;
    if bytes.len() > max_bytes {
        return Err(ReadLimitError::TooLarge {
            size: u64::try_from(bytes.len()).unwrap_or(u64::MAX),
            limit: max_bytes,
        });
    }
    Ok(bytes)
}

/// Reads and parses a bounded JSON file.
fn read_json<T: DeserializeOwned>(path: &Path, kind: &str, max_bytes: usize) -> CliResult<T> {
    let bytes = read_bytes_with_limit(path, max_bytes).map_err(|err| match err {
        ReadLimitError::Io(err) => {
            CliError::new(format!("failed to read {kind} {}: {err}", path.display()))
        }
        ReadLimitError::TooLarge {
            size,
            limit,
        } => CliError::new(format!(
            "{kind} {} is {size} bytes, exceeding the {limit} byte limit",
            path.display()
        )),
    })?;
    serde_json::from_slice(&bytes)
        .map_err(|err| CliError::new(format!("invalid {kind} {}: {err}", path.display())))
}

/// Reads a record file; the payload must be a JSON object.
fn read_record(path: &Path) -> CliResult<Record> {
    read_json(path, "record", MAX_RECORD_BYTES)
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Serializes a value as canonical JSON.
fn canonical_json<T: Serialize>(value: &T) -> CliResult<Vec<u8>> {
    serde_jcs::to_vec(value).map_err(|err| CliError::new(format!("failed to serialize output: {err}")))
}

/// Writes raw bytes and a trailing newline to stdout.
fn write_stdout_bytes(bytes: &[u8]) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    stdout.write_all(bytes)?;
    if !bytes.ends_with(b"\n") {
        stdout.write_all(b"\n")?;
    }
    stdout.flush()
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
