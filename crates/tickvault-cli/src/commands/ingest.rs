use std::sync::Arc;
use std::time::Instant;

use serde_json::json;
use tickvault_core::{
    Bar, ChartApiProvider, DateRange, IngestConfig, IngestCoordinator, IngestError, Ticker,
    TickerOutcome, TickerReport, TradingDate,
};
use tickvault_warehouse::{BarRecord, Warehouse};

use crate::cli::IngestArgs;
use crate::envelope::{EnvelopeError, SourceId};
use crate::error::CliError;

use super::CommandResult;

pub async fn run(
    args: &IngestArgs,
    offline: bool,
    warehouse: &Warehouse,
) -> Result<CommandResult, CliError> {
    let tickers = collect_tickers(args)?;
    if tickers.is_empty() {
        return Err(CliError::Command(String::from(
            "no tickers given; pass symbols or --file",
        )));
    }

    let range = DateRange::new(
        TradingDate::parse(&args.start)?,
        TradingDate::parse(&args.end)?,
    )?;

    let mut config = if offline {
        IngestConfig::offline()
    } else {
        IngestConfig::default()
    };
    config.fetch_width = args.concurrency.max(1);

    let provider = if offline {
        Arc::new(ChartApiProvider::default())
    } else {
        Arc::new(ChartApiProvider::live())
    };
    let coordinator = IngestCoordinator::new(provider, config);

    let started = Instant::now();
    let source_chain = vec![SourceId::ChartApi, SourceId::Warehouse];

    match coordinator.ingest_all(&tickers, range).await {
        Ok(dataset) => {
            let warnings = skip_warnings(&dataset.reports);
            let rows_written = warehouse
                .append_bars(&bar_records(&dataset.bars))
                .map_err(|error| CliError::Command(format!("bar append failed: {error}")))?;

            let data = json!({
                "window": { "start": range.start, "end": range.end },
                "rows_written": rows_written,
                "tickers_loaded": dataset.loaded_tickers(),
                "tickers": dataset.reports,
            });
            Ok(CommandResult::ok(data, source_chain)
                .with_warnings(warnings)
                .with_latency(super::elapsed_ms(started)))
        }
        Err(IngestError::NoUsableData { reports }) => {
            let message = format!(
                "all {} tickers failed or returned no data for {} to {}",
                reports.len(),
                range.start,
                range.end
            );
            let data = json!({
                "window": { "start": range.start, "end": range.end },
                "rows_written": 0,
                "tickers_loaded": 0,
                "tickers": reports,
            });
            Ok(CommandResult::ok(data, source_chain)
                .with_errors(vec![
                    EnvelopeError::new("ingest.no_usable_data", message)?.with_retryable(false),
                ])
                .with_latency(super::elapsed_ms(started)))
        }
    }
}

fn collect_tickers(args: &IngestArgs) -> Result<Vec<Ticker>, CliError> {
    let mut symbols: Vec<String> = args.tickers.clone();

    if let Some(path) = &args.file {
        let contents = std::fs::read_to_string(path)?;
        symbols.extend(
            contents
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(String::from),
        );
    }

    let mut tickers = Vec::with_capacity(symbols.len());
    for symbol in &symbols {
        let ticker = Ticker::parse(symbol)?;
        if !tickers.contains(&ticker) {
            tickers.push(ticker);
        }
    }
    Ok(tickers)
}

/// One warning line per ticker that contributed no rows.
fn skip_warnings(reports: &[TickerReport]) -> Vec<String> {
    reports
        .iter()
        .filter_map(|report| match &report.outcome {
            TickerOutcome::Loaded { .. } => None,
            TickerOutcome::NoData => {
                Some(format!("ticker {}: no data for window", report.ticker))
            }
            TickerOutcome::Failed { reason } => {
                Some(format!("ticker {} failed: {reason}", report.ticker))
            }
            TickerOutcome::Skipped => {
                Some(format!("ticker {}: skipped (deadline passed)", report.ticker))
            }
        })
        .collect()
}

fn bar_records(bars: &[Bar]) -> Vec<BarRecord> {
    bars.iter()
        .map(|bar| BarRecord {
            date: bar.date.format_iso(),
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
            ticker: bar.ticker.as_str().to_string(),
        })
        .collect()
}
