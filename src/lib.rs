//! # Rowtag - CSV row classification with a local LLM
//!
//! Rowtag reads a CSV file, sends one chosen cell of every row to an
//! OpenAI-compatible chat endpoint (Ollama, LM Studio, llama.cpp, ...), and
//! writes the file back out with the model's single-word answer appended as
//! a new column.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   CSV File  │────▶│    Codec    │────▶│  Processor  │────▶│ Labeled CSV │
//! │  (ISO/UTF8) │     │  (auto-enc) │     │ (row by row)│     │  (+1 column)│
//! └─────────────┘     └─────────────┘     └──────┬──────┘     └─────────────┘
//!                                                │
//!                                         ┌──────▼──────┐
//!                                         │ Chat Engine │
//!                                         │ (local LLM) │
//!                                         └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rowtag::{parse_table, process, AnalysisMode, HttpChatEngine, ProcessOptions};
//!
//! #[tokio::main]
//! async fn main() {
//!     let parsed = parse_table("id,comment\n1,Great!").unwrap();
//!     let engine = HttpChatEngine::from_env();
//!     let outcome = process(
//!         &parsed.table,
//!         "comment",
//!         &AnalysisMode::Sentiment,
//!         &engine,
//!         ProcessOptions::default(),
//!         |done, total| println!("{}/{}", done, total),
//!     )
//!     .await
//!     .unwrap();
//!     println!("Labeled {} rows", outcome.completed);
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Domain models (Table, Row, AnalysisMode)
//! - [`codec`] - CSV parsing and serialization
//! - [`label`] - Model answer cleanup
//! - [`classify`] - Prompt construction per analysis mode
//! - [`engine`] - Chat engine trait and HTTP implementation
//! - [`process`] - Row-by-row batch processor
//! - [`io`] - Text sources, sinks, and encoding detection
//! - [`api`] - HTTP API server

// Core modules
pub mod error;
pub mod models;

// CSV codec
pub mod codec;

// Classification
pub mod classify;
pub mod label;

// Chat engine
pub mod engine;

// Batch processing
pub mod process;

// File I/O
pub mod io;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    CsvError,
    EngineError,
    ProcessError,
    PromptError,
    ServerError,
    TransferError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    AnalysisMode,
    Row,
    Table,
    CATEGORY_COLUMN,
    PROCESSING_ERROR,
    SENTIMENT_COLUMN,
};

// =============================================================================
// Re-exports - CSV Codec
// =============================================================================

pub use codec::{
    parse_table,
    stringify_table,
    DroppedLine,
    ParseOutcome,
};

// =============================================================================
// Re-exports - Classification
// =============================================================================

pub use classify::{build_prompt, PromptPair};
pub use label::clean_label;

// =============================================================================
// Re-exports - Chat Engine
// =============================================================================

pub use engine::{ChatEngine, HttpChatEngine, DEFAULT_ENGINE_URL, DEFAULT_MODEL};

// =============================================================================
// Re-exports - Processor
// =============================================================================

pub use process::{
    process,
    snapshots,
    JobOutcome,
    ProcessOptions,
    RowSnapshot,
};

// =============================================================================
// Re-exports - File I/O
// =============================================================================

pub use io::{
    decode_bytes,
    detect_encoding,
    processed_filename,
    processed_path,
    DecodedText,
    FsTextSink,
    FsTextSource,
    TextSink,
    TextSource,
};

// =============================================================================
// Re-exports - API
// =============================================================================

pub use api::types::{error_response, ClassifyResponse, JobStats};

// Server
pub mod server {
    pub use crate::api::server::{start_server, start_server_with_engine};
}
