use std::time::Instant;

use serde_json::json;
use tickvault_warehouse::Warehouse;

use crate::cli::DeltaAllArgs;
use crate::envelope::SourceId;
use crate::error::CliError;

use super::CommandResult;

pub fn run(args: &DeltaAllArgs, warehouse: &Warehouse) -> Result<CommandResult, CliError> {
    let started = Instant::now();
    let (start, end) = super::parse_window(&args.start, &args.end)?;

    if args.limit == 0 {
        return Err(CliError::Command(String::from("--limit must be positive")));
    }

    let rows = warehouse
        .delta_all(&args.etf, &start, &end, args.limit)
        .map_err(|error| CliError::Command(error.to_string()))?;
    let count = rows.len();

    let data = json!({
        "etf": args.etf,
        "window": { "start": start, "end": end },
        "count": count,
        "rows": rows,
    });

    let mut result = CommandResult::ok(data, vec![SourceId::Warehouse]);
    if count == 0 {
        result = result.with_warning(format!(
            "no ticker of {} has two disclosure dates between {start} and {end}",
            args.etf
        ));
    }
    Ok(result.with_latency(super::elapsed_ms(started)))
}
