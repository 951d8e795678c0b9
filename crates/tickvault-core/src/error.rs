use thiserror::Error;

/// Validation and contract errors exposed by `tickvault-core`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("ticker cannot be empty")]
    EmptyTicker,
    #[error("ticker length {len} exceeds max {max}")]
    TickerTooLong { len: usize, max: usize },
    #[error("ticker must start with an ASCII letter: '{ch}'")]
    TickerInvalidStart { ch: char },
    #[error("ticker contains invalid character '{ch}' at index {index}")]
    TickerInvalidChar { ch: char, index: usize },

    #[error("cannot parse calendar date from '{value}'")]
    InvalidDate { value: String },
    #[error("date range start {start} must not be after end {end}")]
    InvalidDateRange { start: String, end: String },

    #[error("field '{field}' must be finite")]
    NonFiniteValue { field: &'static str },
}

/// Normalization failures for required identity fields.
///
/// Malformed numeric or date text never raises; it coerces to null at the
/// cell level. A `SchemaError` is reserved for tables where a required
/// column itself cannot be resolved or a row cannot be shaped at all.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("required column '{column}' could not be resolved")]
    MissingRequiredColumn { column: &'static str },
    #[error("row has {found} cells, expected {expected}")]
    CellCountMismatch { expected: usize, found: usize },
    #[error("line {line} has {found} fields, expected at most {expected}")]
    RowTooWide { line: usize, expected: usize, found: usize },
}

/// Top-level error type for core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
