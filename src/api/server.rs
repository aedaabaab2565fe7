//! HTTP server for the rowtag API.
//!
//! Provides REST endpoints for uploading a CSV and classifying one of its
//! columns. Progress is observable live on the SSE log stream while the
//! classify request is in flight.
//!
//! # API Endpoints
//!
//! | Method | Path              | Description                          |
//! |--------|-------------------|--------------------------------------|
//! | GET    | `/health`         | Health check                         |
//! | POST   | `/api/classify`   | Upload CSV, label one column         |
//! | GET    | `/api/logs`       | SSE stream for real-time logs        |

use axum::{
    extract::multipart::Field,
    extract::{Multipart, State},
    http::{header, Method, StatusCode},
    response::{sse::Event, Json, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::{log_info, log_success, log_warning, LOG_BROADCASTER};
use super::types::{error_response, ClassifyResponse};
use crate::codec::parse_table;
use crate::engine::{ChatEngine, HttpChatEngine};
use crate::error::{ServerError, ServerResult};
use crate::io::{decode_bytes, processed_filename};
use crate::models::AnalysisMode;
use crate::process::{process, ProcessOptions};

/// Shared handler state: one engine for all requests.
#[derive(Clone)]
struct AppState {
    engine: Arc<dyn ChatEngine>,
}

/// Start the HTTP server with an engine configured from the environment.
pub async fn start_server(port: u16) -> ServerResult<()> {
    let engine: Arc<dyn ChatEngine> = Arc::new(HttpChatEngine::from_env());
    start_server_with_engine(port, engine).await
}

/// Start the HTTP server with an explicit engine.
pub async fn start_server_with_engine(
    port: u16,
    engine: Arc<dyn ChatEngine>,
) -> ServerResult<()> {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE]);

    let app = Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/classify", post(classify_csv))
        .route("/api/logs", get(sse_logs))
        .layer(cors)
        .with_state(AppState { engine });

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    println!("🚀 rowtag server running on http://localhost:{}", port);
    println!("   POST /api/classify - Upload CSV and label one column");
    println!("   GET  /api/logs     - SSE log stream");
    println!("   GET  /health       - Health check");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await.map_err(ServerError::Io)?;

    Ok(())
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "rowtag",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "classify": "POST /api/classify",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(entry) => {
            let json = serde_json::to_string(&entry).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

type Rejection = (StatusCode, Json<Value>);

fn bad_request(msg: &str) -> Rejection {
    (StatusCode::BAD_REQUEST, Json(error_response(msg)))
}

async fn text_field(field: Field<'_>) -> Result<String, Rejection> {
    field
        .text()
        .await
        .map_err(|e| bad_request(&format!("Read error: {}", e)))
}

/// Classify endpoint: multipart upload with the file and the run options.
///
/// Fields: `file` (required), `column` (required), `mode` (`sentiment`
/// default, or `categorize`), `prompt` + `categories` (categorize only),
/// `temperature` (optional).
async fn classify_csv(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ClassifyResponse>, Rejection> {
    let mut file_data: Option<Vec<u8>> = None;
    let mut file_name: Option<String> = None;
    let mut column: Option<String> = None;
    let mut mode_name: Option<String> = None;
    let mut prompt: Option<String> = None;
    let mut categories: Option<String> = None;
    let mut temperature: f32 = 0.0;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(&format!("Multipart error: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "file" => {
                file_name = field.file_name().map(|s| s.to_string());
                file_data = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| bad_request(&format!("Read error: {}", e)))?
                        .to_vec(),
                );
            }
            "column" => column = Some(text_field(field).await?),
            "mode" => mode_name = Some(text_field(field).await?),
            "prompt" => prompt = Some(text_field(field).await?),
            "categories" => categories = Some(text_field(field).await?),
            "temperature" => {
                temperature = text_field(field)
                    .await?
                    .parse()
                    .map_err(|_| bad_request("Invalid temperature"))?;
            }
            _ => {}
        }
    }

    let bytes = file_data.ok_or_else(|| bad_request("No file provided"))?;
    let column = column.ok_or_else(|| bad_request("No column provided"))?;
    let mode = build_mode(mode_name.as_deref(), prompt, categories.as_deref())?;

    let original_name = file_name.unwrap_or_else(|| "upload.csv".to_string());
    log_info(format!(
        "📄 New upload: {} ({} bytes)",
        original_name,
        bytes.len()
    ));

    let decoded = decode_bytes(&bytes);
    log_success(format!("Detected encoding: {}", decoded.encoding));

    let parsed = parse_table(&decoded.text).map_err(|_| bad_request("file is empty or invalid"))?;
    for dropped in &parsed.dropped {
        log_warning(format!(
            "Line {} dropped: expected {} fields, found {}",
            dropped.line, dropped.expected, dropped.found
        ));
    }
    log_success(format!("Parsed {} rows", parsed.table.len()));
    log_info(format!(
        "🏷️  Labeling column '{}' into '{}'",
        column,
        mode.output_column()
    ));

    let options = ProcessOptions {
        temperature,
        ..Default::default()
    };
    let outcome = process(
        &parsed.table,
        &column,
        &mode,
        state.engine.as_ref(),
        options,
        |done, total| log_info(format!("Processed row {}/{}", done, total)),
    )
    .await
    .map_err(|e| bad_request(&e.to_string()))?;

    if outcome.failed > 0 {
        log_warning(format!(
            "{} of {} rows failed and carry the sentinel label",
            outcome.failed, outcome.total
        ));
    } else {
        log_success(format!("Labeled all {} rows", outcome.total));
    }

    let response = ClassifyResponse::new(
        outcome,
        mode.output_column(),
        processed_filename(&original_name),
        decoded.encoding,
        parsed.dropped.len(),
    );

    Ok(Json(response))
}

/// Resolve the analysis mode from the request fields.
fn build_mode(
    mode_name: Option<&str>,
    prompt: Option<String>,
    categories: Option<&str>,
) -> Result<AnalysisMode, Rejection> {
    match mode_name.filter(|m| !m.is_empty()).unwrap_or("sentiment") {
        "sentiment" => Ok(AnalysisMode::Sentiment),
        "categorize" => {
            let prompt =
                prompt.ok_or_else(|| bad_request("categorize mode requires a prompt"))?;
            let raw =
                categories.ok_or_else(|| bad_request("categorize mode requires categories"))?;
            let mode = AnalysisMode::categorize(prompt, raw);
            if let AnalysisMode::Categorize { ref categories, .. } = mode {
                if categories.is_empty() {
                    return Err(bad_request("categorize mode requires at least one category"));
                }
            }
            Ok(mode)
        }
        other => Err(bad_request(&format!("Unknown mode: {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_mode_defaults_to_sentiment() {
        assert_eq!(
            build_mode(None, None, None).unwrap(),
            AnalysisMode::Sentiment
        );
        assert_eq!(
            build_mode(Some(""), None, None).unwrap(),
            AnalysisMode::Sentiment
        );
    }

    #[test]
    fn test_build_mode_categorize() {
        let mode = build_mode(
            Some("categorize"),
            Some("Classify the ticket".into()),
            Some("billing, bug"),
        )
        .unwrap();

        match mode {
            AnalysisMode::Categorize { categories, .. } => {
                assert_eq!(categories, vec!["billing", "bug"]);
            }
            _ => panic!("expected categorize mode"),
        }
    }

    #[test]
    fn test_build_mode_rejects_missing_categories() {
        assert!(build_mode(Some("categorize"), Some("p".into()), None).is_err());
        assert!(build_mode(Some("categorize"), Some("p".into()), Some(" , ,")).is_err());
        assert!(build_mode(Some("made-up"), None, None).is_err());
    }
}
