//! Shared fixtures for the tickvault behavior suites.

pub use std::sync::Arc;

pub use tickvault_core::{
    ChartApiProvider, DateRange, IngestConfig, IngestCoordinator, Ticker, TickerOutcome,
    TradingDate,
};
pub use tickvault_warehouse::{
    BarRecord, HoldingRecord, QueryGuardrails, Warehouse, WarehouseConfig, WarehouseError,
};

/// Warehouse backed by a database file inside the given temp directory.
pub fn open_temp_warehouse(dir: &tempfile::TempDir) -> Warehouse {
    Warehouse::open(WarehouseConfig {
        tickvault_home: dir.path().to_path_buf(),
        db_path: dir.path().join("warehouse.duckdb"),
        max_pool_size: 2,
    })
    .expect("warehouse open")
}

pub fn parse_tickers(symbols: &[&str]) -> Vec<Ticker> {
    symbols
        .iter()
        .map(|symbol| Ticker::parse(symbol).expect("ticker should parse"))
        .collect()
}

pub fn date_range(start: &str, end: &str) -> DateRange {
    DateRange::new(
        TradingDate::parse(start).expect("date should parse"),
        TradingDate::parse(end).expect("date should parse"),
    )
    .expect("range should build")
}

pub fn bar(date: &str, ticker: &str, close: f64) -> BarRecord {
    BarRecord {
        date: date.to_string(),
        open: Some(close - 0.5),
        high: Some(close + 1.0),
        low: Some(close - 1.0),
        close: Some(close),
        volume: Some(10_000),
        ticker: ticker.to_string(),
    }
}

pub fn holding(accrual: &str, ticker: &str, quantity: Option<f64>, mv: Option<f64>) -> HoldingRecord {
    HoldingRecord {
        date: Some(accrual.to_string()),
        ticker: Some(ticker.to_string()),
        name: Some(format!("{ticker} Inc")),
        asset_class: Some(String::from("Equity")),
        market_value: mv,
        quantity,
        accrual_date: Some(accrual.to_string()),
        ..HoldingRecord::default()
    }
}
