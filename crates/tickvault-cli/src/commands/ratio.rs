use std::time::Instant;

use serde_json::json;
use tickvault_warehouse::Warehouse;

use crate::cli::{RatioArgs, RatioCommand, RatioWindowArgs};
use crate::envelope::SourceId;
use crate::error::CliError;

use super::delta::typed_failure;
use super::CommandResult;

pub fn run(args: &RatioArgs, warehouse: &Warehouse) -> Result<CommandResult, CliError> {
    let started = Instant::now();
    let (window, variant) = match &args.command {
        RatioCommand::ProductDelta(window) => (window, "product-delta"),
        RatioCommand::Weighted(window) => (window, "weighted"),
    };
    let (start, end) = super::parse_window(&window.start, &window.end)?;
    let source_chain = vec![SourceId::Warehouse];

    let outcome = match &args.command {
        RatioCommand::ProductDelta(RatioWindowArgs { etf, ticker, .. }) => {
            warehouse.product_over_delta_ratio(etf, ticker, &start, &end)
        }
        RatioCommand::Weighted(RatioWindowArgs { etf, ticker, .. }) => {
            warehouse.weighted_product_ratio(etf, ticker, &start, &end)
        }
    };

    match outcome {
        Ok(ratio) => {
            let data = json!({
                "etf": window.etf,
                "variant": variant,
                "window": { "start": start, "end": end },
                "ratio": ratio,
            });
            Ok(CommandResult::ok(data, source_chain).with_latency(super::elapsed_ms(started)))
        }
        Err(error) => typed_failure(error, &window.etf, &start, &end, source_chain, started),
    }
}
