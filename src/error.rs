//! Error types for the rowtag classification pipeline.
//!
//! This module defines one error type per pipeline stage:
//!
//! - [`CsvError`] - CSV decoding errors
//! - [`PromptError`] - Prompt construction errors
//! - [`EngineError`] - Chat engine errors
//! - [`ProcessError`] - Batch processing errors
//! - [`TransferError`] - Text source/sink errors
//! - [`ServerError`] - HTTP server errors
//!
//! Row-level failures ([`PromptError`], [`EngineError`]) never abort a job:
//! the processor converts them into the `PROCESSING_ERROR` sentinel and
//! moves on to the next row. Job-level failures ([`CsvError`],
//! [`ProcessError`], [`TransferError`]) propagate with `?`.

use thiserror::Error;

// =============================================================================
// CSV Decoding Errors
// =============================================================================

/// Errors while decoding CSV text into a table.
///
/// Lines with the wrong field count are not errors; they are dropped and
/// reported alongside the parsed table.
#[derive(Debug, Error)]
pub enum CsvError {
    /// No header line found.
    #[error("No header line found in CSV")]
    NoHeaders,

    /// No data rows survived filtering.
    #[error("No data rows found in CSV")]
    NoRows,
}

// =============================================================================
// Prompt Construction Errors
// =============================================================================

/// Errors while building a prompt for a single row.
#[derive(Debug, Error)]
pub enum PromptError {
    /// The selected cell is empty or whitespace-only.
    #[error("Selected cell is empty")]
    EmptyCell,
}

// =============================================================================
// Chat Engine Errors
// =============================================================================

/// Errors from the chat engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// Request exceeded the configured timeout.
    #[error("Request timed out after {0}s")]
    Timeout(u64),

    /// The endpoint answered with an error status.
    #[error("Engine API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// The endpoint answered 200 but the body was not a usable completion.
    #[error("Invalid engine response: {0}")]
    InvalidResponse(String),
}

// =============================================================================
// Batch Processing Errors
// =============================================================================

/// Job-level processing errors.
///
/// Per-row failures are not represented here; they become sentinel labels.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The selected column does not exist in the table headers.
    #[error("Column '{0}' not found in table")]
    UnknownColumn(String),
}

// =============================================================================
// Text Transfer Errors
// =============================================================================

/// Errors from text sources and sinks.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Failed to read input.
    #[error("Failed to read '{path}': {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    /// Failed to write output.
    #[error("Failed to write '{path}': {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind or serve.
    #[error("Server IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for CSV operations.
pub type CsvResult<T> = Result<T, CsvError>;

/// Result type for prompt construction.
pub type PromptResult<T> = Result<T, PromptError>;

/// Result type for chat engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Result type for batch processing.
pub type ProcessResult<T> = Result<T, ProcessError>;

/// Result type for text transfer operations.
pub type TransferResult<T> = Result<T, TransferError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
