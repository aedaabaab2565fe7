//! Sequential row classification with progress snapshots.
//!
//! For each row the processor builds a prompt, awaits one chat completion,
//! cleans the response into a label and merges it into a fresh row. Rows
//! are processed strictly one at a time: a local inference engine has no
//! request-level parallelism worth exploiting, so the completion call is
//! the only suspension point and output order always matches input order.
//!
//! Failures are isolated per row: an empty cell or an engine error turns
//! into the `PROCESSING_ERROR` sentinel and the loop keeps going. Only an
//! unknown column aborts a job, before any row runs.
//!
//! # Example
//!
//! ```rust,ignore
//! use rowtag::process::{process, ProcessOptions};
//!
//! let outcome = process(
//!     &table,
//!     "comment",
//!     &AnalysisMode::Sentiment,
//!     &engine,
//!     ProcessOptions::default(),
//!     |done, total| eprintln!("{}/{}", done, total),
//! )
//! .await?;
//! ```

use futures::stream::{self, Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::api::logs::log_warning;
use crate::classify::build_prompt;
use crate::engine::ChatEngine;
use crate::error::{ProcessError, ProcessResult};
use crate::label::clean_label;
use crate::models::{AnalysisMode, Row, Table, PROCESSING_ERROR};

/// Options for one classification run.
#[derive(Debug, Clone)]
pub struct ProcessOptions {
    /// Sampling temperature passed to the engine for every row.
    pub temperature: f32,
    /// Cooperative cancellation signal, checked between rows.
    pub cancel: CancellationToken,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            cancel: CancellationToken::new(),
        }
    }
}

/// One processed row, emitted as soon as it is done.
#[derive(Debug, Clone)]
pub struct RowSnapshot {
    /// 0-based index of the row in the input table.
    pub index: usize,
    /// Rows completed so far, including this one. Monotonic.
    pub completed: usize,
    /// Total rows in the input table.
    pub total: usize,
    /// The input row with the label column merged in.
    pub row: Row,
    /// The failure behind a sentinel label, if this row failed.
    pub error: Option<String>,
}

/// Final result of a classification run.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    /// Output table: all input columns plus the label column.
    pub table: Table,
    /// Rows actually processed. Equals `total` unless cancelled.
    pub completed: usize,
    /// Rows in the input table.
    pub total: usize,
    /// Rows that carry the sentinel label.
    pub failed: usize,
    /// Whether the run stopped early on the cancellation signal.
    pub cancelled: bool,
    /// Message of the most recent row failure.
    pub last_error: Option<String>,
}

/// Per-run state threaded through the snapshot stream.
struct ProcessingJob<'a> {
    table: &'a Table,
    column: &'a str,
    mode: &'a AnalysisMode,
    engine: &'a dyn ChatEngine,
    temperature: f32,
    cancel: CancellationToken,
    cursor: usize,
    total: usize,
}

// =============================================================================
// Snapshot stream
// =============================================================================

/// Classify rows lazily, one [`RowSnapshot`] per processed row.
///
/// Nothing runs until the stream is polled; dropping it abandons the
/// remaining rows. The cancellation signal is checked before each row, so
/// an in-flight completion finishes before the stream ends.
///
/// # Errors
/// [`ProcessError::UnknownColumn`] when `column` is not a table header.
pub fn snapshots<'a>(
    table: &'a Table,
    column: &'a str,
    mode: &'a AnalysisMode,
    engine: &'a dyn ChatEngine,
    options: ProcessOptions,
) -> ProcessResult<impl Stream<Item = RowSnapshot> + 'a> {
    if !table.has_column(column) {
        return Err(ProcessError::UnknownColumn(column.to_string()));
    }

    let job = ProcessingJob {
        table,
        column,
        mode,
        engine,
        temperature: options.temperature,
        cancel: options.cancel,
        cursor: 0,
        total: table.len(),
    };

    Ok(stream::unfold(job, |mut job| async move {
        if job.cursor >= job.total {
            return None;
        }
        if job.cancel.is_cancelled() {
            log_warning(format!(
                "Processing cancelled after {} of {} rows",
                job.cursor, job.total
            ));
            return None;
        }

        let index = job.cursor;
        let row = &job.table.rows()[index];
        let (label, error) = classify_row(
            job.mode,
            job.engine,
            row.value(job.column),
            job.temperature,
            index,
        )
        .await;

        let merged = row.with_field(job.mode.output_column(), label);
        job.cursor += 1;

        let snapshot = RowSnapshot {
            index,
            completed: job.cursor,
            total: job.total,
            row: merged,
            error,
        };
        Some((snapshot, job))
    }))
}

/// Classify one cell; failures become the sentinel, never an error.
async fn classify_row(
    mode: &AnalysisMode,
    engine: &dyn ChatEngine,
    cell: &str,
    temperature: f32,
    index: usize,
) -> (String, Option<String>) {
    let pair = match build_prompt(mode, cell) {
        Ok(pair) => pair,
        Err(e) => {
            log_warning(format!("Row {}: {}", index + 1, e));
            return (PROCESSING_ERROR.to_string(), Some(e.to_string()));
        }
    };

    match engine.complete(&pair.system, &pair.user, temperature).await {
        Ok(response) => (clean_label(&response), None),
        Err(e) => {
            log_warning(format!("Row {}: {}", index + 1, e));
            (PROCESSING_ERROR.to_string(), Some(e.to_string()))
        }
    }
}

// =============================================================================
// Driver
// =============================================================================

/// Classify every row and collect the outcome.
///
/// Drives [`snapshots`] to completion, invoking `on_progress(completed,
/// total)` after each row. Cancellation is not an error: the outcome keeps
/// the rows finished so far with `cancelled` set.
pub async fn process<F>(
    table: &Table,
    column: &str,
    mode: &AnalysisMode,
    engine: &dyn ChatEngine,
    options: ProcessOptions,
    mut on_progress: F,
) -> ProcessResult<JobOutcome>
where
    F: FnMut(usize, usize),
{
    let cancel = options.cancel.clone();
    let total = table.len();

    let stream = snapshots(table, column, mode, engine, options)?;
    futures::pin_mut!(stream);

    let mut output_rows = Vec::with_capacity(total);
    let mut failed = 0;
    let mut last_error = None;

    while let Some(snapshot) = stream.next().await {
        if let Some(err) = snapshot.error {
            failed += 1;
            last_error = Some(err);
        }
        output_rows.push(snapshot.row);
        on_progress(snapshot.completed, snapshot.total);
    }

    let completed = output_rows.len();
    let cancelled = cancel.is_cancelled() && completed < total;

    Ok(JobOutcome {
        table: Table::new(
            headers_with_label(table.headers(), mode.output_column()),
            output_rows,
        ),
        completed,
        total,
        failed,
        cancelled,
        last_error,
    })
}

/// Output headers: the input headers plus the label column, unless a
/// column of that name already exists (its values are replaced in place).
fn headers_with_label(headers: &[String], label_column: &str) -> Vec<String> {
    let mut out = headers.to_vec();
    if !headers.iter().any(|h| h == label_column) {
        out.push(label_column.to_string());
    }
    out
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{parse_table, stringify_table};
    use crate::error::{EngineError, EngineResult};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Engine double that pops scripted replies in order.
    struct MockEngine {
        replies: Mutex<VecDeque<EngineResult<String>>>,
        calls: AtomicUsize,
    }

    impl MockEngine {
        fn new(replies: Vec<EngineResult<String>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ChatEngine for MockEngine {
        async fn complete(&self, _: &str, _: &str, _: f32) -> EngineResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok("Neutral".to_string()))
        }
    }

    fn table(csv: &str) -> Table {
        parse_table(csv).unwrap().table
    }

    #[tokio::test]
    async fn test_row_count_and_order_preserved() {
        let input = table("id,comment\n1,Great\n2,Terrible\n3,Fine");
        let engine = MockEngine::new(vec![
            Ok("Positive".into()),
            Ok("Negative".into()),
            Ok("Neutral".into()),
        ]);

        let outcome = process(
            &input,
            "comment",
            &AnalysisMode::Sentiment,
            &engine,
            ProcessOptions::default(),
            |_, _| {},
        )
        .await
        .unwrap();

        assert_eq!(outcome.total, 3);
        assert_eq!(outcome.completed, 3);
        assert_eq!(outcome.failed, 0);
        assert!(!outcome.cancelled);
        assert_eq!(engine.calls(), 3);

        let rows = outcome.table.rows();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].value("id"), "1");
        assert_eq!(rows[0].value("sentiment"), "Positive");
        assert_eq!(rows[1].value("sentiment"), "Negative");
        assert_eq!(rows[2].value("sentiment"), "Neutral");
        assert_eq!(
            outcome.table.headers(),
            &["id", "comment", "sentiment"]
        );
    }

    #[tokio::test]
    async fn test_engine_failure_isolated_to_its_row() {
        let input = table("id,comment\n1,ok\n2,boom\n3,ok");
        let engine = MockEngine::new(vec![
            Ok("Positive".into()),
            Err(EngineError::Api {
                status: 500,
                message: "engine fell over".into(),
            }),
            Ok("Negative".into()),
        ]);

        let outcome = process(
            &input,
            "comment",
            &AnalysisMode::Sentiment,
            &engine,
            ProcessOptions::default(),
            |_, _| {},
        )
        .await
        .unwrap();

        let rows = outcome.table.rows();
        assert_eq!(rows[0].value("sentiment"), "Positive");
        assert_eq!(rows[1].value("sentiment"), PROCESSING_ERROR);
        assert_eq!(rows[2].value("sentiment"), "Negative");

        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.completed, 3);
        assert!(outcome.last_error.unwrap().contains("engine fell over"));
    }

    #[tokio::test]
    async fn test_empty_cell_never_reaches_engine() {
        let input = table("id,comment\n1,\"\"\n");
        let engine = MockEngine::new(vec![]);

        let outcome = process(
            &input,
            "comment",
            &AnalysisMode::Sentiment,
            &engine,
            ProcessOptions::default(),
            |_, _| {},
        )
        .await
        .unwrap();

        assert_eq!(engine.calls(), 0);
        assert_eq!(outcome.table.rows()[0].value("sentiment"), PROCESSING_ERROR);
        assert_eq!(outcome.failed, 1);
        assert!(outcome.last_error.is_some());
    }

    #[tokio::test]
    async fn test_unknown_column_rejected_up_front() {
        let input = table("id,comment\n1,hello");
        let engine = MockEngine::new(vec![]);

        let err = process(
            &input,
            "nope",
            &AnalysisMode::Sentiment,
            &engine,
            ProcessOptions::default(),
            |_, _| {},
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ProcessError::UnknownColumn(c) if c == "nope"));
        assert_eq!(engine.calls(), 0);
    }

    #[tokio::test]
    async fn test_progress_is_monotonic() {
        let input = table("id,comment\n1,a\n2,b\n3,c");
        let engine = MockEngine::new(vec![]);

        let mut seen = Vec::new();
        process(
            &input,
            "comment",
            &AnalysisMode::Sentiment,
            &engine,
            ProcessOptions::default(),
            |done, total| seen.push((done, total)),
        )
        .await
        .unwrap();

        assert_eq!(seen, vec![(1, 3), (2, 3), (3, 3)]);
    }

    #[tokio::test]
    async fn test_cancellation_keeps_finished_rows() {
        let input = table("id,comment\n1,a\n2,b\n3,c");
        let engine = MockEngine::new(vec![]);
        let options = ProcessOptions::default();
        let token = options.cancel.clone();

        let outcome = process(
            &input,
            "comment",
            &AnalysisMode::Sentiment,
            &engine,
            options,
            |done, _| {
                if done == 1 {
                    token.cancel();
                }
            },
        )
        .await
        .unwrap();

        assert!(outcome.cancelled);
        assert_eq!(outcome.completed, 1);
        assert_eq!(outcome.total, 3);
        assert_eq!(outcome.table.rows().len(), 1);
        assert_eq!(engine.calls(), 1);
    }

    #[tokio::test]
    async fn test_snapshots_are_lazy() {
        let input = table("id,comment\n1,a");
        let engine = MockEngine::new(vec![]);

        let stream = snapshots(
            &input,
            "comment",
            &AnalysisMode::Sentiment,
            &engine,
            ProcessOptions::default(),
        )
        .unwrap();
        drop(stream);

        assert_eq!(engine.calls(), 0);
    }

    #[tokio::test]
    async fn test_snapshot_stream_emits_merged_rows() {
        let input = table("id,comment\n1,meh\n2,wow");
        let engine = MockEngine::new(vec![Ok("Neutral".into()), Ok("Positive".into())]);

        let stream = snapshots(
            &input,
            "comment",
            &AnalysisMode::Sentiment,
            &engine,
            ProcessOptions::default(),
        )
        .unwrap();
        let collected: Vec<RowSnapshot> = stream.collect().await;

        assert_eq!(collected.len(), 2);
        assert_eq!(collected[0].index, 0);
        assert_eq!(collected[0].completed, 1);
        assert_eq!(collected[0].row.value("sentiment"), "Neutral");
        assert_eq!(collected[1].index, 1);
        assert_eq!(collected[1].row.value("comment"), "wow");
        assert_eq!(collected[1].row.value("sentiment"), "Positive");
    }

    #[tokio::test]
    async fn test_reasoning_markup_stripped_from_labels() {
        let input = table("id,comment\n1,loved it");
        let engine = MockEngine::new(vec![Ok(
            "<think>The reviewer is clearly happy.</think>\nPositive".into(),
        )]);

        let outcome = process(
            &input,
            "comment",
            &AnalysisMode::Sentiment,
            &engine,
            ProcessOptions::default(),
            |_, _| {},
        )
        .await
        .unwrap();

        assert_eq!(outcome.table.rows()[0].value("sentiment"), "Positive");
    }

    #[tokio::test]
    async fn test_existing_label_column_replaced_in_place() {
        let input = table("id,sentiment,comment\n1,stale,new text");
        let engine = MockEngine::new(vec![Ok("Negative".into())]);

        let outcome = process(
            &input,
            "comment",
            &AnalysisMode::Sentiment,
            &engine,
            ProcessOptions::default(),
            |_, _| {},
        )
        .await
        .unwrap();

        assert_eq!(
            outcome.table.headers(),
            &["id", "sentiment", "comment"]
        );
        assert_eq!(outcome.table.rows()[0].value("sentiment"), "Negative");
    }

    #[tokio::test]
    async fn test_categorize_mode_appends_category_column() {
        let input = table("id,ticket\n1,invoice is wrong");
        let engine = MockEngine::new(vec![Ok("billing".into())]);
        let mode = AnalysisMode::categorize("Classify the support ticket", "billing,bug");

        let outcome = process(
            &input,
            "ticket",
            &mode,
            &engine,
            ProcessOptions::default(),
            |_, _| {},
        )
        .await
        .unwrap();

        assert_eq!(outcome.table.headers(), &["id", "ticket", "category"]);
        assert_eq!(outcome.table.rows()[0].value("category"), "billing");
    }

    #[tokio::test]
    async fn test_end_to_end_sentiment_example() {
        let parsed = parse_table("id,comment\n1,Great!").unwrap();
        let engine = MockEngine::new(vec![Ok("Positive".into())]);

        let outcome = process(
            &parsed.table,
            "comment",
            &AnalysisMode::Sentiment,
            &engine,
            ProcessOptions::default(),
            |_, _| {},
        )
        .await
        .unwrap();

        let row = &outcome.table.rows()[0];
        assert_eq!(row.value("id"), "1");
        assert_eq!(row.value("comment"), "Great!");
        assert_eq!(row.value("sentiment"), "Positive");

        assert_eq!(
            stringify_table(outcome.table.rows()),
            "id,comment,sentiment\n1,Great!,Positive"
        );
    }
}
