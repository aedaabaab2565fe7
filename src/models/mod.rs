//! Domain models for the rowtag classification pipeline.
//!
//! This module contains the core data structures used throughout the pipeline:
//!
//! - [`Table`] - An immutable parsed dataset (headers + rows)
//! - [`Row`] - One record as an ordered header -> value mapping
//! - [`AnalysisMode`] - What kind of label to ask the model for
//! - [`PROCESSING_ERROR`] - Sentinel label written when a row fails

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// Sentinel label stored when a row could not be classified.
///
/// A failed row never aborts the job; it carries this value in the label
/// column so the output lines up one-to-one with the input.
pub const PROCESSING_ERROR: &str = "PROCESSING_ERROR";

/// Label column appended in sentiment mode.
pub const SENTIMENT_COLUMN: &str = "sentiment";

/// Label column appended in categorize mode.
pub const CATEGORY_COLUMN: &str = "category";

// =============================================================================
// Row
// =============================================================================

/// One record: an ordered mapping from header name to cell value.
///
/// Key order is the column order of the source file. A missing cell is the
/// empty string, never an absent key. Rows are value types; derived rows
/// (see [`Row::with_field`]) are fresh allocations, the original is untouched.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    fields: Vec<(String, String)>,
}

impl Row {
    /// Create an empty row.
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Insert a field, keeping insertion order.
    ///
    /// If the key already exists its value is replaced in place, so a
    /// duplicated header collapses to one column (last value wins).
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => self.fields.push((key, value)),
        }
    }

    /// Get a cell value, or `None` if the column is absent.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Get a cell value, treating an absent column as empty.
    pub fn value(&self, key: &str) -> &str {
        self.get(key).unwrap_or("")
    }

    /// Return a new row with `key` set to `value`.
    ///
    /// Appends the column at the end, or replaces the value in place when
    /// the column already exists.
    pub fn with_field(&self, key: &str, value: impl Into<String>) -> Self {
        let mut row = self.clone();
        row.insert(key, value);
        row
    }

    /// Column names in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    /// Cell values in column order.
    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(_, v)| v.as_str())
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FromIterator<(String, String)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (key, value) in iter {
            row.insert(key, value);
        }
        row
    }
}

// Serialized as a JSON object with keys in column order.
impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

// =============================================================================
// Table
// =============================================================================

/// A parsed dataset: ordered headers plus the rows that matched them.
///
/// Tables are immutable once built. Processing never mutates the input
/// table; it produces a new one with the label column appended.
#[derive(Debug, Clone, Serialize)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    /// Build a table from headers and rows.
    ///
    /// Every row must carry exactly the header key set, in header order.
    /// The codec and the processor are the only construction sites and
    /// both uphold this.
    pub fn new(headers: Vec<String>, rows: Vec<Row>) -> Self {
        debug_assert!(
            rows.iter()
                .all(|r| r.keys().eq(headers.iter().map(String::as_str))),
            "row keys must match table headers"
        );
        Self { headers, rows }
    }

    /// Column names in order.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// All rows in input order.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Consume the table, yielding its rows.
    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    /// Number of data rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no data rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Whether a column exists.
    pub fn has_column(&self, name: &str) -> bool {
        self.headers.iter().any(|h| h == name)
    }
}

// =============================================================================
// Analysis Mode
// =============================================================================

/// What kind of label to ask the model for.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum AnalysisMode {
    /// Fixed three-way sentiment: Positive / Negative / Neutral.
    Sentiment,
    /// Caller-defined classification into a closed category list.
    Categorize {
        /// Task description, e.g. "Classify the support ticket".
        prompt: String,
        /// Allowed category names.
        categories: Vec<String>,
    },
}

impl AnalysisMode {
    /// Build a categorize mode from a raw comma-separated category list.
    ///
    /// Pieces are trimmed; empty pieces are dropped, so `"a,, b ,"` yields
    /// `["a", "b"]`.
    pub fn categorize(prompt: impl Into<String>, raw_categories: &str) -> Self {
        let categories = raw_categories
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(String::from)
            .collect();
        Self::Categorize {
            prompt: prompt.into(),
            categories,
        }
    }

    /// Name of the label column this mode appends.
    pub fn output_column(&self) -> &'static str {
        match self {
            Self::Sentiment => SENTIMENT_COLUMN,
            Self::Categorize { .. } => CATEGORY_COLUMN,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
