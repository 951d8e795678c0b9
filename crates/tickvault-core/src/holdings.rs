//! Holdings disclosure file parsing.
//!
//! Disclosure files are headerless comma-delimited text with twelve
//! positional fields per row, matching [`HOLDING_FILE_COLUMNS`]. Fields
//! may be double-quoted to protect embedded commas, which security names
//! and formatted currency amounts routinely contain.

use std::path::Path;

use crate::normalize::HOLDING_FILE_COLUMNS;
use crate::raw::{RawCell, RawLabel, RawTable};
use crate::{CoreError, SchemaError};

/// Parse holdings file contents into a labeled raw table.
///
/// Blank lines are skipped. Rows with fewer than twelve fields are padded
/// with nulls; rows with more fail, naming the offending line.
pub fn parse_holdings_text(contents: &str) -> Result<RawTable, SchemaError> {
    let labels = HOLDING_FILE_COLUMNS
        .iter()
        .map(|name| RawLabel::single(*name))
        .collect();
    let mut table = RawTable::new(labels);

    for (index, line) in contents.lines().enumerate() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }

        let fields = split_delimited_fields(line);
        if fields.len() > HOLDING_FILE_COLUMNS.len() {
            return Err(SchemaError::RowTooWide {
                line: index + 1,
                expected: HOLDING_FILE_COLUMNS.len(),
                found: fields.len(),
            });
        }

        let mut cells: Vec<RawCell> = fields
            .into_iter()
            .map(|field| {
                if field.is_empty() {
                    RawCell::Null
                } else {
                    RawCell::Text(field)
                }
            })
            .collect();
        cells.resize(HOLDING_FILE_COLUMNS.len(), RawCell::Null);
        table.push_row(cells)?;
    }

    Ok(table)
}

/// Read and parse a holdings file from disk.
pub fn load_holdings_file(path: &Path) -> Result<RawTable, CoreError> {
    let contents = std::fs::read_to_string(path)?;
    Ok(parse_holdings_text(&contents)?)
}

/// Split one line on commas, honoring double-quote enclosures. A doubled
/// quote inside an enclosure is a literal quote character.
fn split_delimited_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            '"' if current.is_empty() => in_quotes = true,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    fields.push(current);
    fields
}
