//! # Domain Models
//!
//! Canonical domain types for tickvault time series.
//!
//! ## Models
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Bar`] | Daily OHLCV record for one ticker and date |
//! | [`HoldingSnapshot`] | One ETF constituent row for one accrual date |
//! | [`DateRange`] | Inclusive calendar window |
//! | [`Ticker`] | Validated ticker symbol |
//! | [`TradingDate`] | Calendar date with ISO and day-first parsing |
//!
//! ## Validation
//!
//! Identity fields are validated at construction time:
//!
//! ```rust,ignore
//! use tickvault_core::{Bar, Ticker, TradingDate};
//!
//! let date = TradingDate::parse("2024-01-02")?;
//! let ticker = Ticker::parse("aapl")?;
//! let bar = Bar::new(date, Some(100.0), Some(105.0), Some(95.0), Some(102.0), Some(1000), ticker)?;
//! ```
//!
//! Measurement fields stay nullable end to end; malformed source values
//! coerce to null during normalization instead of failing construction.

mod models;
mod ticker;
mod trading_date;

pub use models::{Bar, DateRange, HoldingSnapshot};
pub use ticker::Ticker;
pub use trading_date::TradingDate;
