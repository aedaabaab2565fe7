//! REST API types for the classify endpoint.
//!
//! The response carries both the stringified CSV (ready to save as
//! `processed_<name>`) and the structured rows, so clients can offer a
//! download and render a preview from one call.

use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::codec::stringify_table;
use crate::models::Row;
use crate::process::JobOutcome;

/// Response sent after a CSV was uploaded, classified and re-encoded.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifyResponse {
    /// Unique job identifier
    pub job_id: String,

    /// "complete" when every row got a label, "partial" otherwise
    pub status: String,

    /// Suggested artifact name: `processed_<original filename>`
    pub output_name: String,

    /// Name of the appended label column
    pub label_column: String,

    /// The full output table as CSV text
    pub csv: String,

    /// The output rows, label column included
    pub rows: Vec<Row>,

    /// Counters and metadata about the run
    pub stats: JobStats,
}

/// Statistics about one classification run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStats {
    /// Rows in the parsed table
    pub total_rows: usize,

    /// Rows that received a model label
    pub labeled_rows: usize,

    /// Rows that carry the sentinel label
    pub failed_rows: usize,

    /// Input lines dropped for a field-count mismatch
    pub dropped_lines: usize,

    /// Detected input encoding
    pub encoding: String,

    /// Most recent row failure, if any
    pub last_error: Option<String>,
}

impl ClassifyResponse {
    /// Build the response from a finished run.
    pub fn new(
        outcome: JobOutcome,
        label_column: &str,
        output_name: String,
        encoding: String,
        dropped_lines: usize,
    ) -> Self {
        let csv = stringify_table(outcome.table.rows());
        let status = if outcome.failed == 0 && !outcome.cancelled {
            "complete"
        } else {
            "partial"
        };

        Self {
            job_id: Uuid::new_v4().to_string(),
            status: status.to_string(),
            output_name,
            label_column: label_column.to_string(),
            csv,
            rows: outcome.table.into_rows(),
            stats: JobStats {
                total_rows: outcome.total,
                labeled_rows: outcome.completed - outcome.failed,
                failed_rows: outcome.failed,
                dropped_lines,
                encoding,
                last_error: outcome.last_error,
            },
        }
    }
}

/// Create an error response
pub fn error_response(error: &str) -> Value {
    json!({
        "jobId": Uuid::new_v4().to_string(),
        "status": "error",
        "error": error,
        "rows": [],
        "csv": "",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Table;

    fn outcome() -> JobOutcome {
        let rows: Vec<Row> = vec![
            [("id", "1"), ("comment", "Great!"), ("sentiment", "Positive")]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        ];
        JobOutcome {
            table: Table::new(
                vec!["id".into(), "comment".into(), "sentiment".into()],
                rows,
            ),
            completed: 1,
            total: 1,
            failed: 0,
            cancelled: false,
            last_error: None,
        }
    }

    #[test]
    fn test_response_complete() {
        let response = ClassifyResponse::new(
            outcome(),
            "sentiment",
            "processed_reviews.csv".into(),
            "utf-8".into(),
            0,
        );

        assert_eq!(response.status, "complete");
        assert_eq!(response.csv, "id,comment,sentiment\n1,Great!,Positive");
        assert_eq!(response.stats.labeled_rows, 1);
        assert_eq!(response.output_name, "processed_reviews.csv");
    }

    #[test]
    fn test_response_partial_on_failures() {
        let mut failed = outcome();
        failed.failed = 1;
        failed.last_error = Some("engine fell over".into());

        let response =
            ClassifyResponse::new(failed, "sentiment", "processed_x.csv".into(), "utf-8".into(), 0);

        assert_eq!(response.status, "partial");
        assert_eq!(response.stats.failed_rows, 1);
        assert_eq!(response.stats.labeled_rows, 0);
        assert_eq!(response.stats.last_error.as_deref(), Some("engine fell over"));
    }

    #[test]
    fn test_response_serializes_camel_case() {
        let response = ClassifyResponse::new(
            outcome(),
            "sentiment",
            "processed_reviews.csv".into(),
            "utf-8".into(),
            2,
        );

        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("jobId").is_some());
        assert!(json.get("labelColumn").is_some());
        assert_eq!(json["stats"]["droppedLines"], 2);
        assert_eq!(json["rows"][0]["sentiment"], "Positive");
    }

    #[test]
    fn test_error_response_shape() {
        let err = error_response("file is empty or invalid");
        assert_eq!(err["status"], "error");
        assert_eq!(err["error"], "file is empty or invalid");
    }
}
