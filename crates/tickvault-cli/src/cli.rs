//! CLI argument definitions for tickvault.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ingest` | Fetch daily bars for a ticker list and append them to the warehouse |
//! | `holdings load` | Parse one ETF holdings disclosure file and append it |
//! | `delta` | Quantity delta for one ticker between two dates |
//! | `delta-all` | Quantity delta for every ticker of an ETF between two dates |
//! | `ratio` | Guarded product/delta ratios over a date window |
//! | `sql` | Read-only SQL against the local DuckDB warehouse |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--format` | `json` | Output format (json, ndjson, table) |
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--strict` | `false` | Treat warnings as errors |
//! | `--db` | tickvault home | Path to the warehouse database file |
//! | `--offline` | `false` | Deterministic provider, no network |
//!
//! # Examples
//!
//! ```bash
//! # Ingest a quarter of daily bars for two tickers
//! tickvault ingest --start 2024-01-02 --end 2024-03-28 AAPL MSFT
//!
//! # Load a holdings disclosure
//! tickvault holdings load --etf IVV --file disclosures/ivv-0503.csv
//!
//! # Point-in-time quantity delta
//! tickvault delta --etf IVV --ticker AAPL --start 2024-01-02 --end 2024-03-05
//!
//! # Query the warehouse
//! tickvault sql "SELECT DISTINCT \"Ticker\" FROM bars"
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Tickvault - market history ingestion and point-in-time analytics
///
/// Fetch daily OHLCV series, normalize ETF holdings disclosures, append
/// both to a local DuckDB warehouse, and answer point-in-time delta and
/// ratio questions over the stored history.
#[derive(Debug, Parser)]
#[command(
    name = "tickvault",
    author,
    version,
    about = "Market history ingestion and point-in-time analytics",
    long_about = "Tickvault ingests per-ticker daily bars and ETF holdings disclosures, \
normalizes them into a canonical schema, and appends them to a local DuckDB warehouse.\n\
\n\
  • Concurrent per-ticker fetch with partial-failure tolerance\n\
  • Append-only storage under a fixed schema contract\n\
  • Ranked-pair deltas and guarded ratio analytics\n\
  • Read-only SQL surface for ad-hoc inspection\n\
\n\
Use 'tickvault <command> --help' for command-specific help."
)]
pub struct Cli {
    /// Output format for results.
    ///
    /// - json: Single JSON object (default)
    /// - ndjson: One JSON object per line
    /// - table: ASCII table format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Treat warnings and errors as failures (exit code 5).
    ///
    /// Useful for CI/CD pipelines that need strict validation.
    #[arg(long, global = true, default_value_t = false)]
    pub strict: bool,

    /// Path to the warehouse database file.
    ///
    /// Defaults to `warehouse.duckdb` under `TICKVAULT_HOME` (or
    /// `~/.tickvault`).
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Run against the deterministic offline provider (no network).
    #[arg(long, global = true, default_value_t = false)]
    pub offline: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// ASCII table format for terminal display.
    Table,
    /// Single JSON object output.
    Json,
    /// Newline-delimited JSON (one object per line).
    Ndjson,
}

/// Available CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch daily bars for a ticker list and append them to the warehouse.
    ///
    /// Tickers are fetched concurrently under a bounded width. A ticker
    /// that fails or has no data is reported as a warning and excluded;
    /// the batch fails only when no ticker contributed rows.
    ///
    /// # Examples
    ///
    ///   tickvault ingest --start 2024-01-02 --end 2024-03-28 AAPL MSFT
    ///   tickvault ingest --start 2024-01-02 --end 2024-03-28 --file tickers.txt
    ///   tickvault ingest --start 2024-01-02 --end 2024-01-31 --concurrency 4 AAPL
    Ingest(IngestArgs),

    /// Holdings disclosure commands.
    Holdings(HoldingsArgs),

    /// Quantity delta for one ticker between two dates.
    ///
    /// Resolves the earliest- and latest-dated holdings rows inside the
    /// inclusive window and classifies the quantity change as Bought,
    /// Sold, or No Change.
    ///
    /// # Examples
    ///
    ///   tickvault delta --etf IVV --ticker AAPL --start 2024-01-02 --end 2024-03-05
    Delta(DeltaArgs),

    /// Quantity delta for every ticker of an ETF between two dates.
    ///
    /// Lists tickers by end-row market value descending; tickers with
    /// fewer than two disclosure dates in the window are omitted.
    ///
    /// # Examples
    ///
    ///   tickvault delta-all --etf IVV --start 2024-01-02 --end 2024-03-05 --limit 50
    DeltaAll(DeltaAllArgs),

    /// Guarded product/delta ratios over a date window.
    Ratio(RatioArgs),

    /// Run read-only SQL queries against the DuckDB warehouse.
    ///
    /// Only single SELECT-like statements are accepted; writes go
    /// through `ingest` and `holdings load`.
    ///
    /// # Security
    ///
    /// All queries run with guardrails:
    /// - Row limits (default: 10,000)
    /// - Query timeout (default: 5,000ms)
    ///
    /// # Examples
    ///
    ///   tickvault sql "SELECT COUNT(*) FROM bars"
    ///   tickvault sql "SELECT DISTINCT \"Ticker\" FROM bars" --max-rows 100
    Sql(SqlArgs),
}

/// Arguments for the `ingest` command.
#[derive(Debug, Args)]
pub struct IngestArgs {
    /// Window start date (YYYY-MM-DD or DD-MM-YYYY).
    #[arg(long)]
    pub start: String,

    /// Window end date, inclusive.
    #[arg(long)]
    pub end: String,

    /// Maximum simultaneous fetches.
    #[arg(long, default_value_t = 10)]
    pub concurrency: usize,

    /// Newline-delimited ticker file; merged with positional tickers.
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Ticker symbols to ingest.
    #[arg(num_args = 0..)]
    pub tickers: Vec<String>,
}

/// Arguments for the `holdings` command group.
#[derive(Debug, Args)]
pub struct HoldingsArgs {
    #[command(subcommand)]
    pub command: HoldingsCommand,
}

/// Holdings disclosure subcommands.
#[derive(Debug, Subcommand)]
pub enum HoldingsCommand {
    /// Parse one disclosure file and append it to the ETF's table.
    ///
    /// The file is headerless delimited text with twelve positional
    /// fields; currency formatting inside numeric fields is stripped
    /// during normalization.
    Load(HoldingsLoadArgs),
}

/// Arguments for `holdings load`.
#[derive(Debug, Args)]
pub struct HoldingsLoadArgs {
    /// ETF identifier; names the `holdings_<etf>` warehouse table.
    #[arg(long)]
    pub etf: String,

    /// Path to the disclosure file.
    #[arg(long)]
    pub file: PathBuf,
}

/// Arguments for the `delta` command.
#[derive(Debug, Args)]
pub struct DeltaArgs {
    /// ETF whose holdings table is queried.
    #[arg(long)]
    pub etf: String,

    /// Constituent ticker.
    #[arg(long)]
    pub ticker: String,

    /// Window start date, inclusive.
    #[arg(long)]
    pub start: String,

    /// Window end date, inclusive.
    #[arg(long)]
    pub end: String,
}

/// Arguments for the `delta-all` command.
#[derive(Debug, Args)]
pub struct DeltaAllArgs {
    /// ETF whose holdings table is queried.
    #[arg(long)]
    pub etf: String,

    /// Window start date, inclusive.
    #[arg(long)]
    pub start: String,

    /// Window end date, inclusive.
    #[arg(long)]
    pub end: String,

    /// Maximum number of tickers to list.
    #[arg(long, default_value_t = 100)]
    pub limit: usize,
}

/// Arguments for the `ratio` command group.
#[derive(Debug, Args)]
pub struct RatioArgs {
    #[command(subcommand)]
    pub command: RatioCommand,
}

/// Ratio subcommands.
#[derive(Debug, Subcommand)]
pub enum RatioCommand {
    /// `sum(product) / sum(delta)` over every row in the window.
    ///
    /// Fails with a zero-denominator error when the delta sum is zero,
    /// never returning Infinity or NaN.
    ProductDelta(RatioWindowArgs),

    /// `sum(product) / (end quantity - start quantity)`.
    ///
    /// The product sum covers the whole window; the denominator comes
    /// from the ranked boundary rows only.
    Weighted(RatioWindowArgs),
}

/// Shared arguments for both ratio variants.
#[derive(Debug, Args)]
pub struct RatioWindowArgs {
    /// ETF whose holdings table is queried.
    #[arg(long)]
    pub etf: String,

    /// Constituent ticker.
    #[arg(long)]
    pub ticker: String,

    /// Window start date, inclusive.
    #[arg(long)]
    pub start: String,

    /// Window end date, inclusive.
    #[arg(long)]
    pub end: String,
}

/// Arguments for the `sql` command.
#[derive(Debug, Args)]
pub struct SqlArgs {
    /// SQL query to execute (SELECT/CTE only).
    pub query: String,

    /// Maximum number of rows to return (prevents memory exhaustion).
    #[arg(long, default_value_t = 10_000)]
    pub max_rows: usize,

    /// Query timeout in milliseconds.
    #[arg(long, default_value_t = 5_000)]
    pub query_timeout_ms: u64,
}
