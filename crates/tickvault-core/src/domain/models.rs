use serde::{Deserialize, Serialize};

use crate::{Ticker, TradingDate, ValidationError};

/// Inclusive calendar window bounding a fetch or analytics request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: TradingDate,
    pub end: TradingDate,
}

impl DateRange {
    pub fn new(start: TradingDate, end: TradingDate) -> Result<Self, ValidationError> {
        if start > end {
            return Err(ValidationError::InvalidDateRange {
                start: start.format_iso(),
                end: end.format_iso(),
            });
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, date: TradingDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Canonical daily OHLCV record.
///
/// Price and volume fields are nullable; `date` and `ticker` never are.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub date: TradingDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<i64>,
    pub ticker: Ticker,
}

impl Bar {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        date: TradingDate,
        open: Option<f64>,
        high: Option<f64>,
        low: Option<f64>,
        close: Option<f64>,
        volume: Option<i64>,
        ticker: Ticker,
    ) -> Result<Self, ValidationError> {
        validate_optional_finite("open", open)?;
        validate_optional_finite("high", high)?;
        validate_optional_finite("low", low)?;
        validate_optional_finite("close", close)?;

        Ok(Self {
            date,
            open,
            high,
            low,
            close,
            volume,
            ticker,
        })
    }
}

/// One constituent row of an ETF holdings disclosure.
///
/// Every field is nullable: holdings files routinely carry cash lines and
/// placeholder rows with most cells blank. `date` keeps the disclosure's
/// own spelling; `accrual_date` is the parsed calendar date derived from
/// it, null when the spelling is unparseable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HoldingSnapshot {
    pub date: Option<String>,
    pub ticker: Option<String>,
    pub name: Option<String>,
    pub sector: Option<String>,
    pub asset_class: Option<String>,
    pub market_value: Option<f64>,
    pub weight: Option<f64>,
    pub notional_value: Option<f64>,
    pub quantity: Option<f64>,
    pub cusip: Option<String>,
    pub isin: Option<String>,
    pub sedol: Option<String>,
    pub accrual_date: Option<TradingDate>,
}

fn validate_optional_finite(
    field: &'static str,
    value: Option<f64>,
) -> Result<(), ValidationError> {
    if let Some(value) = value {
        if !value.is_finite() {
            return Err(ValidationError::NonFiniteValue { field });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(input: &str) -> TradingDate {
        TradingDate::parse(input).expect("date should parse")
    }

    #[test]
    fn rejects_inverted_range() {
        let err = DateRange::new(date("2024-02-01"), date("2024-01-01")).expect_err("must fail");
        assert!(matches!(err, ValidationError::InvalidDateRange { .. }));
    }

    #[test]
    fn range_window_is_inclusive() {
        let range =
            DateRange::new(date("2024-01-02"), date("2024-01-05")).expect("range should build");
        assert!(range.contains(date("2024-01-02")));
        assert!(range.contains(date("2024-01-05")));
        assert!(!range.contains(date("2024-01-06")));
    }

    #[test]
    fn rejects_non_finite_price() {
        let ticker = Ticker::parse("AAPL").expect("valid ticker");
        let err = Bar::new(
            date("2024-01-02"),
            Some(f64::NAN),
            None,
            None,
            None,
            None,
            ticker,
        )
        .expect_err("must fail");
        assert!(matches!(err, ValidationError::NonFiniteValue { .. }));
    }

    #[test]
    fn keeps_negative_prices() {
        let ticker = Ticker::parse("CL-F").expect("valid ticker");
        let bar = Bar::new(
            date("2020-04-20"),
            Some(-14.0),
            Some(-10.0),
            Some(-40.32),
            Some(-37.63),
            Some(248_529),
            ticker,
        )
        .expect("negative prices are storable");
        assert_eq!(bar.close, Some(-37.63));
    }
}
