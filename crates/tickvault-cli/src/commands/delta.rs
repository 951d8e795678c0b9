use std::time::Instant;

use serde_json::{json, Value};
use tickvault_warehouse::{quantity_delta, Warehouse, WarehouseError};

use crate::cli::DeltaArgs;
use crate::envelope::SourceId;
use crate::error::CliError;

use super::CommandResult;

pub fn run(args: &DeltaArgs, warehouse: &Warehouse) -> Result<CommandResult, CliError> {
    let started = Instant::now();
    let (start, end) = super::parse_window(&args.start, &args.end)?;
    let source_chain = vec![SourceId::Warehouse];

    let outcome = warehouse
        .extract_holding_pair(&args.etf, &args.ticker, &start, &end)
        .and_then(|pair| quantity_delta(&pair).map(|delta| (pair, delta)));

    match outcome {
        Ok((pair, delta)) => {
            let data = json!({
                "etf": args.etf,
                "window": { "start": start, "end": end },
                "distinct_dates": pair.distinct_dates,
                "delta": delta,
            });
            Ok(CommandResult::ok(data, source_chain).with_latency(super::elapsed_ms(started)))
        }
        Err(error) => typed_failure(error, &args.etf, &start, &end, source_chain, started),
    }
}

/// Render a typed analytics failure as an envelope error with an empty
/// data payload; anything else propagates as a command failure.
pub(super) fn typed_failure(
    error: WarehouseError,
    etf: &str,
    start: &str,
    end: &str,
    source_chain: Vec<SourceId>,
    started: Instant,
) -> Result<CommandResult, CliError> {
    let envelope_error = super::analytics_envelope_error(error)?;
    let data: Value = json!({
        "etf": etf,
        "window": { "start": start, "end": end },
    });
    Ok(CommandResult::ok(data, source_chain)
        .with_errors(vec![envelope_error])
        .with_latency(super::elapsed_ms(started)))
}
