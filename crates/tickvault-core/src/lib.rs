//! # Tickvault Core
//!
//! Core contracts and ingestion pipeline for the Tickvault market-history
//! toolkit.
//!
//! ## Overview
//!
//! This crate provides the foundational components for Tickvault:
//!
//! - **Canonical domain models** for daily bars and ETF holdings
//! - **Raw table shape** shared by the provider and file parsers
//! - **Normalization** that reconciles messy upstream columns into
//!   canonical rows
//! - **Daily bar provider seam** with a chart-API client and a
//!   deterministic offline mode
//! - **Batch ingestion coordinator** with throttling, retries, and
//!   per-ticker outcome reporting
//!
//! ## Feature Flags
//!
//! | Flag | Description |
//! |------|-------------|
//! | `default` | Standard feature set |
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | Ingestion run configuration |
//! | [`domain`] | Domain models (Ticker, TradingDate, Bar, HoldingSnapshot) |
//! | [`error`] | Core error types |
//! | [`holdings`] | Holdings file parsing |
//! | [`http_client`] | HTTP client abstraction |
//! | [`ingest`] | Concurrent batch ingestion coordinator |
//! | [`normalize`] | Raw frame to canonical row normalization |
//! | [`provider`] | Daily bar provider seam and chart-API client |
//! | [`raw`] | Pre-normalization table shape |
//! | [`retry`] | Retry backoff policies |
//! | [`throttle`] | Rate limiting support |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tickvault_core::{
//!     ChartApiProvider, DateRange, IngestConfig, IngestCoordinator, Ticker, TradingDate,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Offline provider: deterministic frames, no network
//!     let provider = Arc::new(ChartApiProvider::default());
//!     let coordinator = IngestCoordinator::new(provider, IngestConfig::offline());
//!
//!     let tickers = vec![Ticker::parse("AAPL")?, Ticker::parse("MSFT")?];
//!     let range = DateRange::new(
//!         TradingDate::parse("2024-01-02")?,
//!         TradingDate::parse("2024-03-28")?,
//!     )?;
//!
//!     // Fetch, normalize, and combine in one call
//!     let dataset = coordinator.ingest_all(&tickers, range).await?;
//!     println!(
//!         "{} rows across {} tickers",
//!         dataset.row_count(),
//!         dataset.loaded_tickers()
//!     );
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  CLI / User     │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ Ingest          │────▶│ FetchGate +      │
//! │ Coordinator     │     │ RetryPolicy      │
//! └────────┬────────┘     └──────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ DailyBarProvider│────▶│ HTTP Client      │
//! │ (chart API)     │     │ (reqwest/none)   │
//! └────────┬────────┘     └──────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ RawTable →      │
//! │ Canonical Bars  │
//! └─────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! All operations return `Result` types with structured errors:
//!
//! ```rust
//! use tickvault_core::{FetchError, FetchErrorKind};
//!
//! fn handle_error(error: FetchError) {
//!     match error.kind() {
//!         FetchErrorKind::RateLimited => {
//!             // Wait for budget and retry
//!         }
//!         FetchErrorKind::Unavailable => {
//!             // Retry after backoff
//!         }
//!         FetchErrorKind::InvalidRequest => {
//!             // Report to user
//!         }
//!         _ => {}
//!     }
//! }
//! ```
//!
//! ## Security
//!
//! - The chart endpoint is unauthenticated; no credentials are read or stored
//! - Offline mode never opens a network connection
//! - Input validation on all domain types

pub mod config;
pub mod domain;
pub mod error;
pub mod holdings;
pub mod http_client;
pub mod ingest;
pub mod normalize;
pub mod provider;
pub mod raw;
pub mod retry;
pub mod throttle;

// Re-export commonly used types at crate root for convenience

// Ingestion configuration
pub use config::IngestConfig;

// Domain models
pub use domain::{Bar, DateRange, HoldingSnapshot, Ticker, TradingDate};

// Error types
pub use error::{CoreError, SchemaError, ValidationError};

// Holdings file parsing
pub use holdings::{load_holdings_file, parse_holdings_text};

// HTTP client types
pub use http_client::{
    HttpClient, HttpError, HttpRequest, HttpResponse, NoopHttpClient, ReqwestHttpClient,
};

// Batch ingestion
pub use ingest::{CombinedDataset, IngestCoordinator, IngestError, TickerOutcome, TickerReport};

// Normalization
pub use normalize::{
    normalize_bars, normalize_holdings, BAR_COLUMNS, HOLDING_COLUMNS, HOLDING_FILE_COLUMNS,
};

// Provider seam
pub use provider::{
    ChartApiProvider, DailyBarProvider, DailyBarsRequest, FetchError, FetchErrorKind,
};

// Raw table shape
pub use raw::{RawCell, RawLabel, RawTable};

// Retry logic
pub use retry::{Backoff, RetryPolicy};

// Throttling
pub use throttle::FetchGate;
