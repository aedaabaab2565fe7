//! Chat engine boundary.
//!
//! The processor talks to the model through the [`ChatEngine`] trait and
//! never manages model lifecycle. [`HttpChatEngine`] implements it against
//! any OpenAI-compatible `chat/completions` endpoint, which is what the
//! usual local runtimes (Ollama, llama.cpp server, LM Studio) expose.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rowtag::engine::{ChatEngine, HttpChatEngine};
//!
//! let engine = HttpChatEngine::from_env().with_model("llama3.2");
//! let label = engine.complete("Answer with one word.", "Great!", 0.0).await?;
//! ```

use async_trait::async_trait;
use serde::Deserialize;
use std::env;
use std::time::Duration;

use crate::error::{EngineError, EngineResult};

/// Default endpoint: Ollama's OpenAI-compatible API on its standard port.
pub const DEFAULT_ENGINE_URL: &str = "http://localhost:11434/v1";

/// Default model name.
pub const DEFAULT_MODEL: &str = "llama3.2";

/// Default cap on completion tokens. Labels are short; this only stops
/// runaway reasoning output.
const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Default per-request timeout in seconds. Local engines can be slow on
/// first load, so this is generous.
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Single-turn chat completion capability.
///
/// Implementations must be ready to serve completions when handed to the
/// processor; model loading happens elsewhere.
#[async_trait]
pub trait ChatEngine: Send + Sync {
    /// Run one completion and return the raw response text.
    async fn complete(&self, system: &str, user: &str, temperature: f32) -> EngineResult<String>;
}

// =============================================================================
// HTTP Engine
// =============================================================================

/// Chat engine speaking the OpenAI `chat/completions` protocol.
#[derive(Clone)]
pub struct HttpChatEngine {
    client: reqwest::Client,
    base_url: String,
    model: String,
    max_tokens: u32,
    api_key: Option<String>,
    timeout: Duration,
}

/// `chat/completions` success body.
#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: String,
}

/// `chat/completions` error body.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

impl HttpChatEngine {
    /// Create an engine with explicit endpoint and model.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            model: model.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
            api_key: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Create an engine from environment variables, falling back to the
    /// local defaults.
    ///
    /// Reads `ROWTAG_ENGINE_URL`, `ROWTAG_ENGINE_MODEL`,
    /// `ROWTAG_ENGINE_API_KEY` and `ROWTAG_ENGINE_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        // Try loading .env file
        let _ = dotenvy::dotenv();

        let base_url =
            env::var("ROWTAG_ENGINE_URL").unwrap_or_else(|_| DEFAULT_ENGINE_URL.to_string());
        let model = env::var("ROWTAG_ENGINE_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        let mut engine = Self::new(base_url, model);

        if let Ok(key) = env::var("ROWTAG_ENGINE_API_KEY") {
            if !key.is_empty() {
                engine = engine.with_api_key(key);
            }
        }
        if let Some(secs) = env::var("ROWTAG_ENGINE_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            engine = engine.with_timeout(Duration::from_secs(secs));
        }

        engine
    }

    /// Set the endpoint base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the model to use.
    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    /// Set max completion tokens.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set a bearer token for endpoints that require one.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn request_error(&self, err: reqwest::Error) -> EngineError {
        if err.is_timeout() {
            EngineError::Timeout(self.timeout.as_secs())
        } else {
            EngineError::Request(err.to_string())
        }
    }
}

#[async_trait]
impl ChatEngine for HttpChatEngine {
    async fn complete(&self, system: &str, user: &str, temperature: f32) -> EngineResult<String> {
        let request_body = serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "temperature": temperature,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user }
            ]
        });

        let mut request = self
            .client
            .post(self.completions_url())
            .timeout(self.timeout)
            .json(&request_body);

        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| self.request_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.request_error(e))?;

        if !status.is_success() {
            // Prefer the structured error message when the body has one
            let message = match serde_json::from_str::<ErrorEnvelope>(&body) {
                Ok(envelope) => envelope.error.message,
                Err(_) => body,
            };
            return Err(EngineError::Api {
                status: status.as_u16(),
                message,
            });
        }

        parse_completion_body(&body)
    }
}

/// Extract the completion text from a success body.
fn parse_completion_body(body: &str) -> EngineResult<String> {
    let completion: ChatCompletion =
        serde_json::from_str(body).map_err(|e| EngineError::InvalidResponse(e.to_string()))?;

    let content = completion
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content)
        .unwrap_or_default();

    if content.is_empty() {
        return Err(EngineError::InvalidResponse(
            "completion has no content".to_string(),
        ));
    }

    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_completion_body() {
        let body = r#"{
            "id": "chatcmpl-1",
            "choices": [
                { "index": 0, "message": { "role": "assistant", "content": "Positive" } }
            ]
        }"#;

        assert_eq!(parse_completion_body(body).unwrap(), "Positive");
    }

    #[test]
    fn test_parse_completion_no_choices() {
        let body = r#"{ "choices": [] }"#;
        let err = parse_completion_body(body).unwrap_err();
        assert!(matches!(err, EngineError::InvalidResponse(_)));
    }

    #[test]
    fn test_parse_completion_empty_content() {
        let body = r#"{ "choices": [ { "message": { "content": "" } } ] }"#;
        let err = parse_completion_body(body).unwrap_err();
        assert!(matches!(err, EngineError::InvalidResponse(_)));
    }

    #[test]
    fn test_parse_completion_bad_json() {
        let err = parse_completion_body("not json").unwrap_err();
        assert!(matches!(err, EngineError::InvalidResponse(_)));
    }

    #[test]
    fn test_completions_url_joins_cleanly() {
        let engine = HttpChatEngine::new("http://localhost:11434/v1", "llama3.2");
        assert_eq!(
            engine.completions_url(),
            "http://localhost:11434/v1/chat/completions"
        );

        let engine = HttpChatEngine::new("http://localhost:11434/v1/", "llama3.2");
        assert_eq!(
            engine.completions_url(),
            "http://localhost:11434/v1/chat/completions"
        );
    }

    #[test]
    fn test_builders() {
        let engine = HttpChatEngine::new(DEFAULT_ENGINE_URL, DEFAULT_MODEL)
            .with_base_url("http://10.0.0.5:8080/v1")
            .with_model("qwen3")
            .with_max_tokens(64)
            .with_api_key("secret")
            .with_timeout(Duration::from_secs(5));

        assert_eq!(engine.base_url, "http://10.0.0.5:8080/v1");
        assert_eq!(engine.model, "qwen3");
        assert_eq!(engine.max_tokens, 64);
        assert_eq!(engine.api_key.as_deref(), Some("secret"));
        assert_eq!(engine.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_error_envelope_shape() {
        let body = r#"{ "error": { "message": "model 'nope' not found", "type": "invalid_request_error" } }"#;
        let envelope: ErrorEnvelope = serde_json::from_str(body).unwrap();
        assert_eq!(envelope.error.message, "model 'nope' not found");
    }
}
