//! CSV codec: decode text into a [`Table`], encode rows back to text.
//!
//! The decoder is line-based and lenient: blank lines are skipped, lines
//! whose field count does not match the header are dropped and reported,
//! parsing always continues. Quoting follows the doubled-quote convention
//! in both directions, so `parse -> stringify` round-trips values that
//! contain commas and quotes.
//!
//! # Example
//! ```ignore
//! use rowtag::codec::{parse_table, stringify_table};
//!
//! let outcome = parse_table("id,comment\n1,\"Great, thanks\"")?;
//! assert_eq!(outcome.table.rows()[0].value("comment"), "Great, thanks");
//!
//! let csv = stringify_table(outcome.table.rows());
//! assert_eq!(csv, "id,comment\n1,\"Great, thanks\"");
//! ```

use serde::Serialize;

use crate::error::{CsvError, CsvResult};
use crate::models::{Row, Table};

/// Result of decoding CSV text: the table plus the lines that were dropped.
#[derive(Debug, Clone)]
pub struct ParseOutcome {
    /// The parsed table.
    pub table: Table,
    /// Data lines dropped because their field count did not match the header.
    pub dropped: Vec<DroppedLine>,
}

/// A data line dropped during parsing, with enough context to report it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DroppedLine {
    /// 1-based line number in the source text (the header is line 1).
    pub line: usize,
    /// Field count the header requires.
    pub expected: usize,
    /// Field count the line actually had.
    pub found: usize,
}

// =============================================================================
// Decoding
// =============================================================================

/// Decode CSV text into a [`Table`].
///
/// The first line is the header. Fields are separated by commas outside
/// double quotes; inside quotes, `""` is a literal quote. Each field is
/// trimmed, then one layer of enclosing quotes is stripped.
///
/// # Errors
/// - [`CsvError::NoHeaders`] when the header line is missing or blank.
/// - [`CsvError::NoRows`] when no data line survives filtering.
pub fn parse_table(text: &str) -> CsvResult<ParseOutcome> {
    let mut lines = text.lines();

    let header_line = lines.next().ok_or(CsvError::NoHeaders)?;
    if header_line.trim().is_empty() {
        return Err(CsvError::NoHeaders);
    }

    let raw_headers: Vec<String> = split_line(header_line)
        .iter()
        .map(|f| clean_field(f))
        .collect();

    // A duplicated header collapses to one column, last value wins.
    let mut headers: Vec<String> = Vec::with_capacity(raw_headers.len());
    for h in &raw_headers {
        if !headers.contains(h) {
            headers.push(h.clone());
        }
    }

    let mut rows = Vec::new();
    let mut dropped = Vec::new();

    for (line_idx, line) in lines.enumerate() {
        let line_num = line_idx + 2; // +1 for 0-index, +1 for header

        let fields = split_line(line);
        // A single empty field is a blank line, not a row.
        if fields.len() == 1 && clean_field(&fields[0]).is_empty() {
            continue;
        }

        if fields.len() != raw_headers.len() {
            dropped.push(DroppedLine {
                line: line_num,
                expected: raw_headers.len(),
                found: fields.len(),
            });
            continue;
        }

        let row: Row = raw_headers
            .iter()
            .zip(fields.iter())
            .map(|(h, f)| (h.clone(), clean_field(f)))
            .collect();
        rows.push(row);
    }

    if rows.is_empty() {
        return Err(CsvError::NoRows);
    }

    Ok(ParseOutcome {
        table: Table::new(headers, rows),
        dropped,
    })
}

/// Quote state of the field splitter.
#[derive(Debug, Clone, Copy, PartialEq)]
enum QuoteState {
    Unquoted,
    Quoted,
}

/// Split one line into raw fields.
///
/// A comma separates fields only in the `Unquoted` state; a double quote
/// toggles the state. Inside quotes a doubled quote (`""`) is kept in the
/// field and does not toggle. Quote characters stay in the raw field;
/// [`clean_field`] strips them afterwards.
fn split_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut state = QuoteState::Unquoted;

    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match (state, c) {
            (QuoteState::Unquoted, ',') => {
                fields.push(std::mem::take(&mut current));
            }
            (QuoteState::Unquoted, '"') => {
                state = QuoteState::Quoted;
                current.push(c);
            }
            (QuoteState::Quoted, '"') => {
                if chars.peek() == Some(&'"') {
                    // escaped quote, stays inside the field
                    current.push_str("\"\"");
                    chars.next();
                } else {
                    state = QuoteState::Unquoted;
                    current.push(c);
                }
            }
            (_, c) => current.push(c),
        }
    }
    fields.push(current);

    fields
}

/// Clean one raw field: trim, strip one layer of enclosing quotes, collapse
/// escaped quotes.
fn clean_field(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        trimmed[1..trimmed.len() - 1].replace("\"\"", "\"")
    } else {
        trimmed.to_string()
    }
}

// =============================================================================
// Encoding
// =============================================================================

/// Encode rows back to CSV text.
///
/// The header line comes from the first row's key order. Values containing
/// a comma, quote or line break are wrapped in double quotes with inner
/// quotes doubled; everything else is written bare. Lines are joined with
/// `\n` and there is no trailing newline. An empty slice encodes to `""`.
pub fn stringify_table(rows: &[Row]) -> String {
    let first = match rows.first() {
        Some(row) => row,
        None => return String::new(),
    };

    let headers: Vec<&str> = first.keys().collect();
    let mut lines = Vec::with_capacity(rows.len() + 1);

    lines.push(
        headers
            .iter()
            .map(|h| escape_field(h))
            .collect::<Vec<_>>()
            .join(","),
    );

    for row in rows {
        lines.push(
            headers
                .iter()
                .map(|h| escape_field(row.value(h)))
                .collect::<Vec<_>>()
                .join(","),
        );
    }

    lines.join("\n")
}

/// Quote a value only when it needs it.
fn escape_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

// =============================================================================
// Tests
// =============================================================================
