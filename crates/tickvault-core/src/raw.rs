//! Pre-normalization table shape shared by fetchers and file parsers.
//!
//! Provider payloads and holdings files arrive with inconsistent column
//! labels, nested header tuples, and loosely typed cells. [`RawTable`]
//! captures that shape faithfully so the normalizer can reconcile it in
//! one place.

use serde::{Deserialize, Serialize};

use crate::SchemaError;

/// One untyped cell as delivered by a provider or file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RawCell {
    Null,
    Text(String),
    Float(f64),
    Int(i64),
}

impl RawCell {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

/// Column label, either a plain name or a two-level header tuple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLabel {
    pub primary: String,
    pub secondary: Option<String>,
}

impl RawLabel {
    pub fn single(name: impl Into<String>) -> Self {
        Self {
            primary: name.into(),
            secondary: None,
        }
    }

    pub fn nested(primary: impl Into<String>, secondary: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            secondary: Some(secondary.into()),
        }
    }

    /// Collapse a header tuple to one label, preferring the non-empty
    /// primary component.
    pub fn flatten(&self) -> &str {
        if !self.primary.trim().is_empty() {
            return &self.primary;
        }
        match &self.secondary {
            Some(secondary) => secondary,
            None => "",
        }
    }
}

/// Column-labeled row set awaiting normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    labels: Vec<RawLabel>,
    rows: Vec<Vec<RawCell>>,
}

impl RawTable {
    pub fn new(labels: Vec<RawLabel>) -> Self {
        Self {
            labels,
            rows: Vec::new(),
        }
    }

    /// Append one row; its cell count must match the label count.
    pub fn push_row(&mut self, cells: Vec<RawCell>) -> Result<(), SchemaError> {
        if cells.len() != self.labels.len() {
            return Err(SchemaError::CellCountMismatch {
                expected: self.labels.len(),
                found: cells.len(),
            });
        }
        self.rows.push(cells);
        Ok(())
    }

    pub fn labels(&self) -> &[RawLabel] {
        &self.labels
    }

    pub fn rows(&self) -> &[Vec<RawCell>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
