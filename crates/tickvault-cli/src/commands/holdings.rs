use std::time::Instant;

use serde_json::json;
use tickvault_core::{load_holdings_file, normalize_holdings, HoldingSnapshot};
use tickvault_warehouse::{holdings_table_name, HoldingRecord, Warehouse};

use crate::cli::HoldingsLoadArgs;
use crate::envelope::SourceId;
use crate::error::CliError;

use super::CommandResult;

pub fn run(args: &HoldingsLoadArgs, warehouse: &Warehouse) -> Result<CommandResult, CliError> {
    let started = Instant::now();
    let table = holdings_table_name(&args.etf)
        .map_err(|error| CliError::Command(error.to_string()))?;

    let raw = load_holdings_file(&args.file)
        .map_err(|error| CliError::Command(format!("holdings file rejected: {error}")))?;
    let snapshots = normalize_holdings(&raw)
        .map_err(|error| CliError::Command(format!("holdings normalization failed: {error}")))?;

    let unparsed_dates = snapshots
        .iter()
        .filter(|snapshot| snapshot.accrual_date.is_none())
        .count();

    let rows_written = warehouse
        .append_holdings(&args.etf, &holding_records(&snapshots))
        .map_err(|error| CliError::Command(format!("holdings append failed: {error}")))?;

    let data = json!({
        "etf": args.etf,
        "table": table,
        "rows_written": rows_written,
    });

    let mut result = CommandResult::ok(data, vec![SourceId::HoldingsFile, SourceId::Warehouse]);
    if unparsed_dates > 0 {
        result = result.with_warning(format!(
            "{unparsed_dates} row(s) carry an unparseable disclosure date; \
             their accrual date is stored as null"
        ));
    }
    Ok(result.with_latency(super::elapsed_ms(started)))
}

fn holding_records(snapshots: &[HoldingSnapshot]) -> Vec<HoldingRecord> {
    snapshots
        .iter()
        .map(|snapshot| HoldingRecord {
            date: snapshot.date.clone(),
            ticker: snapshot.ticker.clone(),
            name: snapshot.name.clone(),
            sector: snapshot.sector.clone(),
            asset_class: snapshot.asset_class.clone(),
            market_value: snapshot.market_value,
            weight: snapshot.weight,
            notional_value: snapshot.notional_value,
            quantity: snapshot.quantity,
            cusip: snapshot.cusip.clone(),
            isin: snapshot.isin.clone(),
            sedol: snapshot.sedol.clone(),
            accrual_date: snapshot.accrual_date.map(|date| date.format_iso()),
        })
        .collect()
}
