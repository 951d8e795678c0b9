//! Point-in-time extraction and delta/ratio analytics.
//!
//! Every computation here works off the ranked-pair semantics: filter a
//! ticker's rows to an inclusive date window, rank the distinct dates
//! ascending, and treat the first physical row at rank 1 as the start
//! reference and the first physical row at the highest rank as the end
//! reference. Fewer than two distinct dates is always
//! [`WarehouseError::InsufficientData`]; duplicate rows sharing a date
//! are ranked as-is, so which physical row represents a tied date
//! follows store scan order.
//!
//! Ratio inputs (`delta`, `product`) are derived at query time from the
//! canonical holdings columns: per distinct accrual date,
//! `delta = quantity - lag(quantity)` and
//! `product = (market_value / quantity) * delta`. Both ratios check
//! their denominator before dividing; a zero or NULL denominator is
//! [`WarehouseError::ZeroDenominator`], never an Inf/NaN result.

use ::duckdb::ToSql;
use serde::{Deserialize, Serialize};

use crate::{holdings_table_name, AccessMode, Warehouse, WarehouseError};

/// Sign classification of a quantity delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeltaAction {
    Bought,
    Sold,
    #[serde(rename = "No Change")]
    NoChange,
}

impl DeltaAction {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bought => "Bought",
            Self::Sold => "Sold",
            Self::NoChange => "No Change",
        }
    }

    const fn classify(delta: f64) -> Self {
        if delta > 0.0 {
            Self::Bought
        } else if delta < 0.0 {
            Self::Sold
        } else {
            Self::NoChange
        }
    }
}

/// One ticker's quantity change between the ranked start and end rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeltaResult {
    pub ticker: String,
    pub start_date: String,
    pub end_date: String,
    pub start_quantity: f64,
    pub end_quantity: f64,
    pub delta: f64,
    pub action: DeltaAction,
}

/// One boundary row of a bar ranked pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarBoundary {
    pub date: String,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<i64>,
    pub ticker: String,
}

/// Earliest- and latest-ranked bar rows inside a window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarWindowPair {
    pub start: BarBoundary,
    pub end: BarBoundary,
    /// Number of distinct dates observed in the window.
    pub distinct_dates: usize,
}

/// One boundary row of a holdings ranked pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingBoundary {
    pub accrual_date: String,
    pub ticker: String,
    pub quantity: Option<f64>,
    pub market_value: Option<f64>,
    pub weight: Option<f64>,
}

/// Earliest- and latest-ranked holdings rows inside a window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingWindowPair {
    pub start: HoldingBoundary,
    pub end: HoldingBoundary,
    /// Number of distinct accrual dates observed in the window.
    pub distinct_dates: usize,
}

/// One row of the all-ticker delta listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeltaListingRow {
    pub ticker: String,
    pub market_value: Option<f64>,
    pub quantity: Option<f64>,
    pub delta: Option<f64>,
}

/// A guarded ratio with the terms it was computed from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatioResult {
    pub ticker: String,
    pub start_date: String,
    pub end_date: String,
    pub numerator: f64,
    pub denominator: f64,
    pub ratio: f64,
}

/// Classify the quantity change of a holdings ranked pair.
///
/// Pure over the extracted pair; a NULL quantity on either boundary
/// means the window cannot support a delta and fails as insufficient
/// data rather than defaulting to zero.
pub fn quantity_delta(pair: &HoldingWindowPair) -> Result<DeltaResult, WarehouseError> {
    let (Some(start_quantity), Some(end_quantity)) = (pair.start.quantity, pair.end.quantity)
    else {
        return Err(WarehouseError::InsufficientData {
            ticker: pair.start.ticker.clone(),
            start: pair.start.accrual_date.clone(),
            end: pair.end.accrual_date.clone(),
        });
    };

    let delta = end_quantity - start_quantity;
    Ok(DeltaResult {
        ticker: pair.end.ticker.clone(),
        start_date: pair.start.accrual_date.clone(),
        end_date: pair.end.accrual_date.clone(),
        start_quantity,
        end_quantity,
        delta,
        action: DeltaAction::classify(delta),
    })
}

impl Warehouse {
    /// Extract the ranked start/end bar rows for one ticker.
    ///
    /// # Errors
    /// [`WarehouseError::InsufficientData`] when the window holds fewer
    /// than two distinct dates for the ticker.
    pub fn extract_bar_pair(
        &self,
        ticker: &str,
        start_date: &str,
        end_date: &str,
    ) -> Result<BarWindowPair, WarehouseError> {
        let connection = self.manager.acquire(AccessMode::ReadOnly)?;

        let sql = "WITH windowed AS ( \
             SELECT CAST(\"Date\" AS VARCHAR) AS date_text, \"Open\", \"High\", \"Low\", \
                    \"Close\", \"Volume\", \"Ticker\", \
                    DENSE_RANK() OVER (ORDER BY \"Date\" ASC) AS date_rank \
             FROM bars \
             WHERE \"Ticker\" = ? \
               AND \"Date\" BETWEEN TRY_CAST(? AS DATE) AND TRY_CAST(? AS DATE) \
         ) \
         SELECT date_text, \"Open\", \"High\", \"Low\", \"Close\", \"Volume\", \"Ticker\", \
                date_rank, (SELECT MAX(date_rank) FROM windowed) AS max_rank \
         FROM windowed \
         WHERE date_rank = 1 OR date_rank = (SELECT MAX(date_rank) FROM windowed) \
         ORDER BY date_rank ASC";

        let params: [&dyn ToSql; 3] = [&ticker, &start_date, &end_date];
        let mut statement = connection.prepare(sql)?;
        let mut rows = statement.query(params.as_slice())?;

        let mut start: Option<BarBoundary> = None;
        let mut end: Option<BarBoundary> = None;
        let mut max_rank: i64 = 0;
        while let Some(row) = rows.next()? {
            let boundary = BarBoundary {
                date: row.get(0)?,
                open: row.get(1)?,
                high: row.get(2)?,
                low: row.get(3)?,
                close: row.get(4)?,
                volume: row.get(5)?,
                ticker: row.get(6)?,
            };
            let rank: i64 = row.get(7)?;
            max_rank = row.get(8)?;

            // First physical row per rank wins; later duplicates at the
            // same rank are ignored.
            if rank == 1 && start.is_none() {
                start = Some(boundary.clone());
            }
            if rank == max_rank && end.is_none() {
                end = Some(boundary);
            }
        }

        match (start, end) {
            (Some(start), Some(end)) if max_rank >= 2 => Ok(BarWindowPair {
                start,
                end,
                distinct_dates: usize::try_from(max_rank).unwrap_or(0),
            }),
            _ => Err(WarehouseError::InsufficientData {
                ticker: ticker.to_string(),
                start: start_date.to_string(),
                end: end_date.to_string(),
            }),
        }
    }

    /// Extract the ranked start/end holdings rows for one ticker of an
    /// ETF, ordered by accrual date.
    ///
    /// Rows whose disclosure date failed to parse carry a NULL accrual
    /// date and never enter the window.
    ///
    /// # Errors
    /// [`WarehouseError::InsufficientData`] when the window holds fewer
    /// than two distinct accrual dates for the ticker.
    pub fn extract_holding_pair(
        &self,
        etf: &str,
        ticker: &str,
        start_date: &str,
        end_date: &str,
    ) -> Result<HoldingWindowPair, WarehouseError> {
        let table = holdings_table_name(etf)?;
        let connection = self.manager.acquire(AccessMode::ReadOnly)?;

        let sql = format!(
            "WITH windowed AS ( \
                 SELECT CAST(\"Accrual_Date\" AS VARCHAR) AS accrual_text, \"Ticker\", \
                        \"Quantity\", \"Market_Value\", \"Weight\", \
                        DENSE_RANK() OVER (ORDER BY \"Accrual_Date\" ASC) AS date_rank \
                 FROM \"{table}\" \
                 WHERE \"Ticker\" = ? \
                   AND \"Accrual_Date\" BETWEEN TRY_CAST(? AS DATE) AND TRY_CAST(? AS DATE) \
             ) \
             SELECT accrual_text, \"Ticker\", \"Quantity\", \"Market_Value\", \"Weight\", \
                    date_rank, (SELECT MAX(date_rank) FROM windowed) AS max_rank \
             FROM windowed \
             WHERE date_rank = 1 OR date_rank = (SELECT MAX(date_rank) FROM windowed) \
             ORDER BY date_rank ASC"
        );

        let params: [&dyn ToSql; 3] = [&ticker, &start_date, &end_date];
        let mut statement = connection.prepare(sql.as_str())?;
        let mut rows = statement.query(params.as_slice())?;

        let mut start: Option<HoldingBoundary> = None;
        let mut end: Option<HoldingBoundary> = None;
        let mut max_rank: i64 = 0;
        while let Some(row) = rows.next()? {
            let boundary = HoldingBoundary {
                accrual_date: row.get(0)?,
                ticker: row.get(1)?,
                quantity: row.get(2)?,
                market_value: row.get(3)?,
                weight: row.get(4)?,
            };
            let rank: i64 = row.get(5)?;
            max_rank = row.get(6)?;

            if rank == 1 && start.is_none() {
                start = Some(boundary.clone());
            }
            if rank == max_rank && end.is_none() {
                end = Some(boundary);
            }
        }

        match (start, end) {
            (Some(start), Some(end)) if max_rank >= 2 => Ok(HoldingWindowPair {
                start,
                end,
                distinct_dates: usize::try_from(max_rank).unwrap_or(0),
            }),
            _ => Err(WarehouseError::InsufficientData {
                ticker: ticker.to_string(),
                start: start_date.to_string(),
                end: end_date.to_string(),
            }),
        }
    }

    /// `sum(product) / sum(delta)` for one ticker over a window.
    ///
    /// `delta` and `product` are derived per distinct accrual date (see
    /// the module docs); both sums skip NULL terms.
    ///
    /// # Errors
    /// [`WarehouseError::ZeroDenominator`] when the delta sum is zero or
    /// no row contributed one.
    pub fn product_over_delta_ratio(
        &self,
        etf: &str,
        ticker: &str,
        start_date: &str,
        end_date: &str,
    ) -> Result<RatioResult, WarehouseError> {
        let (numerator, denominator) = self.sum_derived_terms(etf, ticker, start_date, end_date)?;

        let Some(denominator) = denominator.filter(|sum| *sum != 0.0) else {
            return Err(WarehouseError::ZeroDenominator {
                ticker: ticker.to_string(),
                start: start_date.to_string(),
                end: end_date.to_string(),
            });
        };

        let numerator = numerator.unwrap_or(0.0);
        Ok(RatioResult {
            ticker: ticker.to_string(),
            start_date: start_date.to_string(),
            end_date: end_date.to_string(),
            numerator,
            denominator,
            ratio: numerator / denominator,
        })
    }

    /// `sum(product) / (end quantity - start quantity)` for one ticker.
    ///
    /// The product sum covers the whole window; the denominator comes
    /// from the ranked pair's boundary quantities only.
    ///
    /// # Errors
    /// [`WarehouseError::InsufficientData`] for a window with fewer than
    /// two distinct accrual dates; [`WarehouseError::ZeroDenominator`]
    /// when the boundary quantities are equal or either is NULL.
    pub fn weighted_product_ratio(
        &self,
        etf: &str,
        ticker: &str,
        start_date: &str,
        end_date: &str,
    ) -> Result<RatioResult, WarehouseError> {
        let pair = self.extract_holding_pair(etf, ticker, start_date, end_date)?;

        let custom_delta = match (pair.start.quantity, pair.end.quantity) {
            (Some(start_quantity), Some(end_quantity)) => end_quantity - start_quantity,
            _ => 0.0,
        };
        if custom_delta == 0.0 {
            return Err(WarehouseError::ZeroDenominator {
                ticker: ticker.to_string(),
                start: start_date.to_string(),
                end: end_date.to_string(),
            });
        }

        let (numerator, _) = self.sum_derived_terms(etf, ticker, start_date, end_date)?;
        let numerator = numerator.unwrap_or(0.0);

        Ok(RatioResult {
            ticker: ticker.to_string(),
            start_date: start_date.to_string(),
            end_date: end_date.to_string(),
            numerator,
            denominator: custom_delta,
            ratio: numerator / custom_delta,
        })
    }

    /// Quantity delta between the ranked boundary rows for every ticker
    /// in an ETF's holdings, ordered by end-row market value descending.
    ///
    /// Tickers with fewer than two distinct accrual dates in the window
    /// drop out of the pairing join; an empty listing is an empty result,
    /// not an error.
    pub fn delta_all(
        &self,
        etf: &str,
        start_date: &str,
        end_date: &str,
        limit: usize,
    ) -> Result<Vec<DeltaListingRow>, WarehouseError> {
        let table = holdings_table_name(etf)?;
        let connection = self.manager.acquire(AccessMode::ReadOnly)?;

        let sql = format!(
            "WITH windowed AS ( \
                 SELECT \"Ticker\" AS ticker, \"Accrual_Date\" AS accrual_date, \
                        \"Quantity\" AS quantity, \"Market_Value\" AS market_value \
                 FROM \"{table}\" \
                 WHERE \"Ticker\" IS NOT NULL \
                   AND \"Accrual_Date\" BETWEEN TRY_CAST(? AS DATE) AND TRY_CAST(? AS DATE) \
             ), \
             ranked AS ( \
                 SELECT *, \
                        DENSE_RANK() OVER (PARTITION BY ticker ORDER BY accrual_date ASC) \
                            AS date_rank \
                 FROM windowed \
             ), \
             bounds AS ( \
                 SELECT ticker, MAX(date_rank) AS max_rank FROM ranked GROUP BY ticker \
             ), \
             picked AS ( \
                 SELECT r.ticker, r.quantity, r.market_value, r.date_rank, b.max_rank, \
                        ROW_NUMBER() OVER (PARTITION BY r.ticker, r.date_rank) AS dup_seq \
                 FROM ranked r \
                 JOIN bounds b ON r.ticker = b.ticker \
                 WHERE b.max_rank >= 2 \
                   AND (r.date_rank = 1 OR r.date_rank = b.max_rank) \
             ) \
             SELECT s.ticker, \
                    e.market_value, \
                    e.quantity, \
                    e.quantity - s.quantity AS delta \
             FROM picked s \
             JOIN picked e \
               ON s.ticker = e.ticker \
              AND s.date_rank = 1 \
              AND e.date_rank = e.max_rank \
             WHERE s.dup_seq = 1 AND e.dup_seq = 1 \
             ORDER BY e.market_value DESC NULLS LAST, s.ticker ASC \
             LIMIT ?"
        );

        let limit = i64::try_from(limit.max(1)).unwrap_or(i64::MAX);
        let params: [&dyn ToSql; 3] = [&start_date, &end_date, &limit];
        let mut statement = connection.prepare(sql.as_str())?;
        let mut rows = statement.query(params.as_slice())?;

        let mut listing = Vec::new();
        while let Some(row) = rows.next()? {
            listing.push(DeltaListingRow {
                ticker: row.get(0)?,
                market_value: row.get(1)?,
                quantity: row.get(2)?,
                delta: row.get(3)?,
            });
        }
        Ok(listing)
    }

    /// Sum the derived `product` and `delta` terms for one ticker over a
    /// window. Either sum is NULL when no row contributed a term.
    fn sum_derived_terms(
        &self,
        etf: &str,
        ticker: &str,
        start_date: &str,
        end_date: &str,
    ) -> Result<(Option<f64>, Option<f64>), WarehouseError> {
        let table = holdings_table_name(etf)?;
        let connection = self.manager.acquire(AccessMode::ReadOnly)?;

        let sql = format!(
            "WITH per_date AS ( \
                 SELECT \"Accrual_Date\" AS accrual_date, \"Quantity\" AS quantity, \
                        \"Market_Value\" AS market_value, \
                        ROW_NUMBER() OVER (PARTITION BY \"Accrual_Date\") AS dup_seq \
                 FROM \"{table}\" \
                 WHERE \"Ticker\" = ? \
                   AND \"Accrual_Date\" BETWEEN TRY_CAST(? AS DATE) AND TRY_CAST(? AS DATE) \
             ), \
             derived AS ( \
                 SELECT quantity - LAG(quantity) OVER (ORDER BY accrual_date ASC) AS delta, \
                        CASE WHEN quantity IS NULL OR quantity = 0 THEN NULL \
                             ELSE market_value / quantity END AS unit_price \
                 FROM per_date \
                 WHERE dup_seq = 1 \
             ) \
             SELECT SUM(unit_price * delta) AS sum_product, SUM(delta) AS sum_delta \
             FROM derived"
        );

        let params: [&dyn ToSql; 3] = [&ticker, &start_date, &end_date];
        let mut statement = connection.prepare(sql.as_str())?;
        let result = statement.query_row(params.as_slice(), |row| {
            Ok((row.get::<_, Option<f64>>(0)?, row.get::<_, Option<f64>>(1)?))
        })?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BarRecord, HoldingRecord, WarehouseConfig};
    use tempfile::tempdir;

    fn open_warehouse(dir: &tempfile::TempDir) -> Warehouse {
        Warehouse::open(WarehouseConfig {
            tickvault_home: dir.path().to_path_buf(),
            db_path: dir.path().join("warehouse.duckdb"),
            max_pool_size: 2,
        })
        .expect("warehouse open")
    }

    fn bar(date: &str, ticker: &str, close: f64) -> BarRecord {
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

    fn holding(accrual: &str, ticker: &str, quantity: Option<f64>, mv: Option<f64>) -> HoldingRecord {
        HoldingRecord {
            date: Some(accrual.to_string()),
            ticker: Some(ticker.to_string()),
            quantity,
            market_value: mv,
            accrual_date: Some(accrual.to_string()),
            ..HoldingRecord::default()
        }
    }

    fn boundary(ticker: &str, date: &str, quantity: Option<f64>) -> HoldingBoundary {
        HoldingBoundary {
            accrual_date: date.to_string(),
            ticker: ticker.to_string(),
            quantity,
            market_value: None,
            weight: None,
        }
    }

    fn pair(start_quantity: Option<f64>, end_quantity: Option<f64>) -> HoldingWindowPair {
        HoldingWindowPair {
            start: boundary("AAPL", "2024-01-02", start_quantity),
            end: boundary("AAPL", "2024-02-02", end_quantity),
            distinct_dates: 2,
        }
    }

    #[test]
    fn classifies_bought_sold_and_no_change() {
        let bought = quantity_delta(&pair(Some(100.0), Some(150.0))).expect("delta");
        assert_eq!(bought.delta, 50.0);
        assert_eq!(bought.action, DeltaAction::Bought);

        let sold = quantity_delta(&pair(Some(150.0), Some(100.0))).expect("delta");
        assert_eq!(sold.delta, -50.0);
        assert_eq!(sold.action, DeltaAction::Sold);

        let flat = quantity_delta(&pair(Some(100.0), Some(100.0))).expect("delta");
        assert_eq!(flat.delta, 0.0);
        assert_eq!(flat.action, DeltaAction::NoChange);
    }

    #[test]
    fn null_boundary_quantity_is_insufficient_data() {
        let err = quantity_delta(&pair(None, Some(100.0))).expect_err("must fail");
        assert!(matches!(err, WarehouseError::InsufficientData { .. }));
    }

    #[test]
    fn no_change_action_serializes_with_a_space() {
        let rendered = serde_json::to_string(&DeltaAction::NoChange).expect("serialize");
        assert_eq!(rendered, "\"No Change\"");
        assert_eq!(DeltaAction::NoChange.as_str(), "No Change");
    }

    #[test]
    fn bar_pair_spans_min_and_max_dates() {
        let temp = tempdir().expect("tempdir");
        let warehouse = open_warehouse(&temp);
        warehouse
            .append_bars(&[
                bar("2024-01-03", "AAPL", 184.25),
                bar("2024-01-02", "AAPL", 185.64),
                bar("2024-01-05", "AAPL", 181.18),
                bar("2024-01-04", "MSFT", 368.80),
            ])
            .expect("append");

        let pair = warehouse
            .extract_bar_pair("AAPL", "2024-01-01", "2024-01-31")
            .expect("pair");
        assert_eq!(pair.start.date, "2024-01-02");
        assert_eq!(pair.end.date, "2024-01-05");
        assert_eq!(pair.distinct_dates, 3);
        assert_eq!(pair.end.close, Some(181.18));
    }

    #[test]
    fn single_date_window_is_insufficient() {
        let temp = tempdir().expect("tempdir");
        let warehouse = open_warehouse(&temp);
        warehouse
            .append_bars(&[bar("2024-01-02", "AAPL", 185.64)])
            .expect("append");

        let err = warehouse
            .extract_bar_pair("AAPL", "2024-01-01", "2024-01-31")
            .expect_err("must fail");
        match err {
            WarehouseError::InsufficientData { ticker, start, end } => {
                assert_eq!(ticker, "AAPL");
                assert_eq!(start, "2024-01-01");
                assert_eq!(end, "2024-01-31");
            }
            other => panic!("expected InsufficientData, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_dates_rank_once() {
        let temp = tempdir().expect("tempdir");
        let warehouse = open_warehouse(&temp);
        // Same two dates appended twice, as overlapping runs would
        let rows = vec![bar("2024-01-02", "AAPL", 185.64), bar("2024-01-03", "AAPL", 184.25)];
        warehouse.append_bars(&rows).expect("first append");
        warehouse.append_bars(&rows).expect("second append");

        let pair = warehouse
            .extract_bar_pair("AAPL", "2024-01-01", "2024-01-31")
            .expect("pair");
        assert_eq!(pair.distinct_dates, 2);
        assert_eq!(pair.start.date, "2024-01-02");
        assert_eq!(pair.end.date, "2024-01-03");
    }

    #[test]
    fn holding_pair_ranks_on_accrual_date() {
        let temp = tempdir().expect("tempdir");
        let warehouse = open_warehouse(&temp);
        warehouse
            .append_holdings(
                "IVV",
                &[
                    holding("2024-02-02", "AAPL", Some(150.0), Some(28_000.0)),
                    holding("2024-01-02", "AAPL", Some(100.0), Some(18_500.0)),
                    // Unparseable disclosure date: NULL accrual date,
                    // never enters a window
                    HoldingRecord {
                        date: Some("pending".to_string()),
                        ticker: Some("AAPL".to_string()),
                        quantity: Some(999.0),
                        ..HoldingRecord::default()
                    },
                ],
            )
            .expect("append");

        let pair = warehouse
            .extract_holding_pair("IVV", "AAPL", "2024-01-01", "2024-12-31")
            .expect("pair");
        assert_eq!(pair.start.accrual_date, "2024-01-02");
        assert_eq!(pair.start.quantity, Some(100.0));
        assert_eq!(pair.end.accrual_date, "2024-02-02");
        assert_eq!(pair.end.quantity, Some(150.0));
        assert_eq!(pair.distinct_dates, 2);

        let delta = quantity_delta(&pair).expect("delta");
        assert_eq!(delta.delta, 50.0);
        assert_eq!(delta.action, DeltaAction::Bought);
    }

    #[test]
    fn zero_delta_sum_is_a_zero_denominator_error() {
        let temp = tempdir().expect("tempdir");
        let warehouse = open_warehouse(&temp);
        // Quantity returns to its starting value: delta sum is zero
        warehouse
            .append_holdings(
                "IVV",
                &[
                    holding("2024-01-02", "AAPL", Some(100.0), Some(18_500.0)),
                    holding("2024-01-09", "AAPL", Some(120.0), Some(22_000.0)),
                    holding("2024-01-16", "AAPL", Some(100.0), Some(18_900.0)),
                ],
            )
            .expect("append");

        let err = warehouse
            .product_over_delta_ratio("IVV", "AAPL", "2024-01-01", "2024-01-31")
            .expect_err("must fail");
        assert!(matches!(err, WarehouseError::ZeroDenominator { .. }));
    }

    #[test]
    fn empty_window_is_a_zero_denominator_error() {
        let temp = tempdir().expect("tempdir");
        let warehouse = open_warehouse(&temp);
        warehouse.append_holdings("IVV", &[]).expect("materialize");

        let err = warehouse
            .product_over_delta_ratio("IVV", "AAPL", "2024-01-01", "2024-01-31")
            .expect_err("must fail");
        assert!(matches!(err, WarehouseError::ZeroDenominator { .. }));
    }

    #[test]
    fn product_over_delta_divides_summed_terms() {
        let temp = tempdir().expect("tempdir");
        let warehouse = open_warehouse(&temp);
        // Unit price 10 throughout: product = 10 * delta per date, so
        // the ratio folds back to 10
        warehouse
            .append_holdings(
                "IVV",
                &[
                    holding("2024-01-02", "AAPL", Some(100.0), Some(1_000.0)),
                    holding("2024-01-09", "AAPL", Some(150.0), Some(1_500.0)),
                    holding("2024-01-16", "AAPL", Some(130.0), Some(1_300.0)),
                ],
            )
            .expect("append");

        let result = warehouse
            .product_over_delta_ratio("IVV", "AAPL", "2024-01-01", "2024-01-31")
            .expect("ratio");
        assert_eq!(result.denominator, 30.0);
        assert!((result.ratio - 10.0).abs() < 1e-9);
    }

    #[test]
    fn weighted_ratio_requires_two_distinct_dates() {
        let temp = tempdir().expect("tempdir");
        let warehouse = open_warehouse(&temp);
        warehouse
            .append_holdings(
                "IVV",
                &[holding("2024-01-02", "AAPL", Some(100.0), Some(18_500.0))],
            )
            .expect("append");

        let err = warehouse
            .weighted_product_ratio("IVV", "AAPL", "2024-01-01", "2024-01-31")
            .expect_err("must fail");
        assert!(matches!(err, WarehouseError::InsufficientData { .. }));
    }

    #[test]
    fn weighted_ratio_divides_by_boundary_delta() {
        let temp = tempdir().expect("tempdir");
        let warehouse = open_warehouse(&temp);
        warehouse
            .append_holdings(
                "IVV",
                &[
                    holding("2024-01-02", "AAPL", Some(100.0), Some(1_000.0)),
                    holding("2024-01-09", "AAPL", Some(150.0), Some(1_500.0)),
                    holding("2024-01-16", "AAPL", Some(120.0), Some(1_200.0)),
                ],
            )
            .expect("append");

        let result = warehouse
            .weighted_product_ratio("IVV", "AAPL", "2024-01-01", "2024-01-31")
            .expect("ratio");
        // custom_delta = 120 - 100; product sum = 10*50 + 10*(-30)
        assert_eq!(result.denominator, 20.0);
        assert!((result.numerator - 200.0).abs() < 1e-9);
        assert!((result.ratio - 10.0).abs() < 1e-9);
    }

    #[test]
    fn weighted_ratio_guards_unchanged_boundary_quantity() {
        let temp = tempdir().expect("tempdir");
        let warehouse = open_warehouse(&temp);
        warehouse
            .append_holdings(
                "IVV",
                &[
                    holding("2024-01-02", "AAPL", Some(100.0), Some(1_000.0)),
                    holding("2024-01-16", "AAPL", Some(100.0), Some(1_050.0)),
                ],
            )
            .expect("append");

        let err = warehouse
            .weighted_product_ratio("IVV", "AAPL", "2024-01-01", "2024-01-31")
            .expect_err("must fail");
        assert!(matches!(err, WarehouseError::ZeroDenominator { .. }));
    }

    #[test]
    fn delta_all_lists_by_end_market_value_desc() {
        let temp = tempdir().expect("tempdir");
        let warehouse = open_warehouse(&temp);
        warehouse
            .append_holdings(
                "IVV",
                &[
                    holding("2024-01-02", "AAPL", Some(100.0), Some(18_500.0)),
                    holding("2024-02-02", "AAPL", Some(150.0), Some(28_000.0)),
                    holding("2024-01-02", "MSFT", Some(80.0), Some(29_500.0)),
                    holding("2024-02-02", "MSFT", Some(60.0), Some(22_100.0)),
                    // Only one date in the window: drops out of the pairing
                    holding("2024-01-02", "NVDA", Some(40.0), Some(19_700.0)),
                ],
            )
            .expect("append");

        let listing = warehouse
            .delta_all("IVV", "2024-01-01", "2024-02-28", 100)
            .expect("listing");
        assert_eq!(listing.len(), 2);
        assert_eq!(listing[0].ticker, "AAPL");
        assert_eq!(listing[0].delta, Some(50.0));
        assert_eq!(listing[1].ticker, "MSFT");
        assert_eq!(listing[1].delta, Some(-20.0));
    }

    #[test]
    fn delta_all_respects_limit_and_empty_window() {
        let temp = tempdir().expect("tempdir");
        let warehouse = open_warehouse(&temp);
        warehouse
            .append_holdings(
                "IVV",
                &[
                    holding("2024-01-02", "AAPL", Some(100.0), Some(18_500.0)),
                    holding("2024-02-02", "AAPL", Some(150.0), Some(28_000.0)),
                    holding("2024-01-02", "MSFT", Some(80.0), Some(29_500.0)),
                    holding("2024-02-02", "MSFT", Some(60.0), Some(22_100.0)),
                ],
            )
            .expect("append");

        let listing = warehouse
            .delta_all("IVV", "2024-01-01", "2024-02-28", 1)
            .expect("listing");
        assert_eq!(listing.len(), 1);

        let empty = warehouse
            .delta_all("IVV", "2025-01-01", "2025-02-28", 100)
            .expect("listing");
        assert!(empty.is_empty());
    }
}
