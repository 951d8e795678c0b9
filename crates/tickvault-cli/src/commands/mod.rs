mod delta;
mod delta_all;
mod holdings;
mod ingest;
mod ratio;
mod sql;

use serde_json::Value;
use tickvault_core::{DateRange, TradingDate};
use tickvault_warehouse::{Warehouse, WarehouseConfig, WarehouseError};

use crate::cli::{Cli, Command, HoldingsCommand};
use crate::envelope::{Envelope, EnvelopeError, SourceId};
use crate::error::CliError;
use crate::metadata::Metadata;

/// Envelope schema version stamped on every response.
const SCHEMA_VERSION: &str = "v1.0.0";

/// Wall-clock latency since `started`, saturating on overflow.
fn elapsed_ms(started: std::time::Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Outcome of one command before envelope assembly.
pub struct CommandResult {
    pub data: Value,
    pub warnings: Vec<String>,
    pub errors: Vec<EnvelopeError>,
    pub latency_ms: u64,
    pub cache_hit: bool,
    pub source_chain: Vec<SourceId>,
}

impl CommandResult {
    pub fn ok(data: Value, source_chain: Vec<SourceId>) -> Self {
        Self {
            data,
            warnings: Vec::new(),
            errors: Vec::new(),
            latency_ms: 0,
            cache_hit: false,
            source_chain,
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings.extend(warnings);
        self
    }

    pub fn with_errors(mut self, errors: Vec<EnvelopeError>) -> Self {
        self.errors.extend(errors);
        self
    }

    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    pub fn with_cache_hit(mut self, cache_hit: bool) -> Self {
        self.cache_hit = cache_hit;
        self
    }
}

pub async fn run(cli: &Cli) -> Result<Envelope<Value>, CliError> {
    let warehouse = open_warehouse(cli)?;

    let command_result = match &cli.command {
        Command::Ingest(args) => ingest::run(args, cli.offline, &warehouse).await?,
        Command::Holdings(args) => match &args.command {
            HoldingsCommand::Load(load_args) => holdings::run(load_args, &warehouse)?,
        },
        Command::Delta(args) => delta::run(args, &warehouse)?,
        Command::DeltaAll(args) => delta_all::run(args, &warehouse)?,
        Command::Ratio(args) => ratio::run(args, &warehouse)?,
        Command::Sql(args) => sql::run(args, &warehouse)?,
    };

    let CommandResult {
        data,
        warnings,
        errors,
        latency_ms,
        cache_hit,
        source_chain,
    } = command_result;

    let mut metadata = Metadata::new(source_chain, latency_ms, cache_hit)?;
    for warning in warnings {
        metadata.push_warning(warning);
    }

    let meta = metadata.into_envelope_meta(SCHEMA_VERSION)?;
    Envelope::with_errors(meta, data, errors).map_err(CliError::from)
}

fn open_warehouse(cli: &Cli) -> Result<Warehouse, CliError> {
    let config = match &cli.db {
        Some(path) => WarehouseConfig::at_path(path.clone()),
        None => WarehouseConfig::default(),
    };
    Warehouse::open(config)
        .map_err(|error| CliError::Command(format!("failed to open warehouse: {error}")))
}

/// Validate a start/end pair and hand back ISO spellings.
///
/// Accepts both date formats the domain parser knows; analytics SQL only
/// ever sees the ISO form.
fn parse_window(start: &str, end: &str) -> Result<(String, String), CliError> {
    let start = TradingDate::parse(start)?;
    let end = TradingDate::parse(end)?;
    let range = DateRange::new(start, end)?;
    Ok((range.start.format_iso(), range.end.format_iso()))
}

/// Map a typed analytics failure onto an envelope error, or surface
/// anything else as a command failure.
fn analytics_envelope_error(error: WarehouseError) -> Result<EnvelopeError, CliError> {
    let code = match &error {
        WarehouseError::InsufficientData { .. } => "analytics.insufficient_data",
        WarehouseError::ZeroDenominator { .. } => "analytics.zero_denominator",
        _ => return Err(CliError::Command(error.to_string())),
    };
    EnvelopeError::new(code, error.to_string())
        .map(|envelope_error| envelope_error.with_retryable(false))
        .map_err(CliError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_window_normalizes_day_first_spelling() {
        let (start, end) = parse_window("05-03-2024", "2024-03-28").expect("window should parse");
        assert_eq!(start, "2024-03-05");
        assert_eq!(end, "2024-03-28");
    }

    #[test]
    fn parse_window_rejects_inverted_range() {
        let err = parse_window("2024-03-28", "2024-01-02").expect_err("must fail");
        assert!(matches!(err, CliError::Validation(_)));
    }

    #[test]
    fn typed_analytics_failures_become_envelope_errors() {
        let error = WarehouseError::ZeroDenominator {
            ticker: String::from("AAPL"),
            start: String::from("2024-01-02"),
            end: String::from("2024-03-28"),
        };
        let envelope_error = analytics_envelope_error(error).expect("should map");
        assert_eq!(envelope_error.code, "analytics.zero_denominator");
        assert_eq!(envelope_error.retryable, Some(false));
    }

    #[test]
    fn untyped_warehouse_failures_stay_command_errors() {
        let error = WarehouseError::QueryRejected(String::from("nope"));
        let err = analytics_envelope_error(error).expect_err("must fail");
        assert!(matches!(err, CliError::Command(_)));
    }
}
