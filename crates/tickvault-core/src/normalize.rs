//! Schema reconciliation from raw provider tables to canonical rows.
//!
//! Provider frames arrive with duplicated columns, nested header tuples,
//! and mixed casing; holdings files carry currency formatting inside
//! numeric fields. Everything funnels through here so the rest of the
//! pipeline only ever sees the canonical column sets.
//!
//! Coercion policy: malformed numeric or date text coerces to null at the
//! cell level. Only an unresolvable identity column (ticker or date) is a
//! hard [`SchemaError`].

use crate::raw::{RawCell, RawLabel, RawTable};
use crate::{Bar, HoldingSnapshot, SchemaError, Ticker, TradingDate};

/// Canonical bar column set, in store order.
pub const BAR_COLUMNS: [&str; 7] = ["Date", "Open", "High", "Low", "Close", "Volume", "Ticker"];

/// Canonical holdings column set, in store order. `Accrual_Date` is
/// derived from `Date` during normalization and never appears in source
/// files.
pub const HOLDING_COLUMNS: [&str; 13] = [
    "Date",
    "Ticker",
    "Name",
    "Sector",
    "Asset_Class",
    "Market_Value",
    "Weight",
    "Notional_Value",
    "Quantity",
    "CUSIP",
    "ISIN",
    "SEDOL",
    "Accrual_Date",
];

/// Positional field order of a holdings disclosure file.
pub const HOLDING_FILE_COLUMNS: [&str; 12] = [
    "Date",
    "Ticker",
    "Name",
    "Sector",
    "Asset_Class",
    "Market_Value",
    "Weight",
    "Notional_Value",
    "Quantity",
    "CUSIP",
    "ISIN",
    "SEDOL",
];

/// Normalize a fetched frame into canonical bars for one ticker.
///
/// The ticker is stamped onto every row from the argument; any ticker
/// column in the input is ignored. Rows whose date cell cannot be parsed
/// are dropped, since a bar is keyed by its date.
pub fn normalize_bars(table: &RawTable, ticker: &Ticker) -> Result<Vec<Bar>, SchemaError> {
    let resolved = resolve_columns(table, &BAR_COLUMNS, flatten_bar_label);
    let date_index = resolved[0].ok_or(SchemaError::MissingRequiredColumn { column: "Date" })?;

    let mut bars = Vec::with_capacity(table.row_count());
    for row in table.rows() {
        let Some(date) = coerce_date(&row[date_index]) else {
            continue;
        };

        let cell = |slot: usize| resolved[slot].map(|index| &row[index]);
        let bar = Bar {
            date,
            open: cell(1).and_then(coerce_float),
            high: cell(2).and_then(coerce_float),
            low: cell(3).and_then(coerce_float),
            close: cell(4).and_then(coerce_float),
            volume: cell(5).and_then(coerce_int),
            ticker: ticker.clone(),
        };
        bars.push(bar);
    }

    Ok(bars)
}

/// Normalize a parsed holdings table into canonical snapshots.
///
/// `Accrual_Date` is derived by parsing each row's `Date` text; rows with
/// unparseable dates keep a null accrual date rather than failing.
pub fn normalize_holdings(table: &RawTable) -> Result<Vec<HoldingSnapshot>, SchemaError> {
    let resolved = resolve_columns(table, &HOLDING_FILE_COLUMNS, flatten_holding_label);
    let date_index = resolved[0].ok_or(SchemaError::MissingRequiredColumn { column: "Date" })?;
    let ticker_index =
        resolved[1].ok_or(SchemaError::MissingRequiredColumn { column: "Ticker" })?;

    let mut snapshots = Vec::with_capacity(table.row_count());
    for row in table.rows() {
        let text = |slot: usize| resolved[slot].and_then(|index| cell_to_text(&row[index]));
        let number = |slot: usize| resolved[slot].and_then(|index| coerce_float(&row[index]));

        let date = cell_to_text(&row[date_index]);
        let accrual_date = date.as_deref().and_then(|value| TradingDate::parse(value).ok());

        snapshots.push(HoldingSnapshot {
            date,
            ticker: cell_to_text(&row[ticker_index]),
            name: text(2),
            sector: text(3),
            asset_class: text(4),
            market_value: number(5),
            weight: number(6),
            notional_value: number(7),
            quantity: number(8),
            cusip: text(9),
            isin: text(10),
            sedol: text(11),
            accrual_date,
        });
    }

    Ok(snapshots)
}

/// Map each canonical column to the first source column that resolves to
/// it. Later duplicates are dropped, so `OPEN` and `open` collapse onto
/// whichever appeared first.
fn resolve_columns(
    table: &RawTable,
    canonical: &[&'static str],
    flatten: fn(&RawLabel) -> String,
) -> Vec<Option<usize>> {
    let mut resolved = vec![None; canonical.len()];
    for (index, label) in table.labels().iter().enumerate() {
        let flattened = flatten(label);
        let Some(slot) = canonical
            .iter()
            .position(|name| name.eq_ignore_ascii_case(&flattened))
        else {
            continue;
        };
        if resolved[slot].is_none() {
            resolved[slot] = Some(index);
        }
    }
    resolved
}

fn flatten_bar_label(label: &RawLabel) -> String {
    capitalize(label.flatten().trim())
}

fn flatten_holding_label(label: &RawLabel) -> String {
    label.flatten().trim().replace(' ', "_")
}

/// First letter uppercased, remainder lowercased, so `OPEN`, `open`, and
/// `Open` all land on the same spelling.
fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase(),
        None => String::new(),
    }
}

/// Coerce one cell to a finite float, stripping `$` and thousands
/// separators first. Anything unparseable becomes null.
pub fn coerce_float(cell: &RawCell) -> Option<f64> {
    match cell {
        RawCell::Null => None,
        RawCell::Float(value) => value.is_finite().then_some(*value),
        RawCell::Int(value) => Some(*value as f64),
        RawCell::Text(text) => strip_numeric_decorations(text)
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite()),
    }
}

/// Coerce one cell to an integer. Fractional values fail coercion and
/// become null.
pub fn coerce_int(cell: &RawCell) -> Option<i64> {
    match cell {
        RawCell::Null => None,
        RawCell::Int(value) => Some(*value),
        RawCell::Float(value) => {
            (value.is_finite() && value.fract() == 0.0).then_some(*value as i64)
        }
        RawCell::Text(text) => {
            let cleaned = strip_numeric_decorations(text);
            cleaned.parse::<i64>().ok().or_else(|| {
                cleaned
                    .parse::<f64>()
                    .ok()
                    .filter(|value| value.is_finite() && value.fract() == 0.0)
                    .map(|value| value as i64)
            })
        }
    }
}

fn coerce_date(cell: &RawCell) -> Option<TradingDate> {
    match cell {
        RawCell::Null | RawCell::Float(_) => None,
        RawCell::Int(seconds) => TradingDate::from_unix_timestamp(*seconds).ok(),
        RawCell::Text(text) => TradingDate::parse(text).ok(),
    }
}

fn cell_to_text(cell: &RawCell) -> Option<String> {
    match cell {
        RawCell::Null => None,
        RawCell::Text(text) => {
            if text.trim().is_empty() {
                None
            } else {
                Some(text.clone())
            }
        }
        RawCell::Float(value) => Some(value.to_string()),
        RawCell::Int(value) => Some(value.to_string()),
    }
}

fn strip_numeric_decorations(text: &str) -> String {
    text.trim()
        .chars()
        .filter(|ch| *ch != '$' && *ch != ',')
        .collect()
}
