//! Completion backends
//!
//! Every provider implements [`CompletionClient`]: it takes a rendered
//! [`CompletionRequest`] and returns the JSON object named by its schema.

pub mod claude;
pub mod gemini;
pub mod ollama;
pub mod openai;

pub use claude::ClaudeClient;
pub use gemini::GeminiClient;
pub use ollama::OllamaClient;
pub use openai::OpenAIClient;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

use crate::error::CompletionFailure;
use crate::prompt::{CompletionRequest, OutputSchema};

/// Schema-constrained text completion service.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<Value, CompletionFailure>;

    fn model_id(&self) -> &str;
}

/// Parse a model reply into the schema's JSON object.
///
/// Accepts bare JSON or JSON wrapped in prose or a ```json fence. Each `{` is
/// tried in order and the first object the schema accepts wins, so braces in the
/// surrounding prose do not hide the real reply.
pub fn parse_structured(text: &str, schema: &OutputSchema) -> Result<Value, CompletionFailure> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        schema.validate(&value).map_err(CompletionFailure::new)?;
        return Ok(value);
    }

    let mut parse_error = None;
    let mut schema_error = None;
    for (start, _) in trimmed.match_indices('{') {
        let mut values = serde_json::Deserializer::from_str(&trimmed[start..]).into_iter::<Value>();
        match values.next() {
            Some(Ok(value)) => match schema.validate(&value) {
                Ok(()) => return Ok(value),
                Err(e) => schema_error = schema_error.or(Some(e)),
            },
            Some(Err(e)) => parse_error = parse_error.or(Some(e)),
            None => {}
        }
    }

    Err(match (schema_error, parse_error) {
        (Some(e), _) => CompletionFailure::new(e),
        (None, Some(e)) => e.into(),
        (None, None) => CompletionFailure::new(format!("no JSON object in {} reply", schema.name)),
    })
}

/// Logging wrapper for completion clients
pub struct LoggingClient {
    inner: Arc<dyn CompletionClient>,
    model_id: String,
}

impl LoggingClient {
    pub fn new(inner: Arc<dyn CompletionClient>) -> Self {
        let model_id = inner.model_id().to_string();
        Self { inner, model_id }
    }
}

#[async_trait]
impl CompletionClient for LoggingClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<Value, CompletionFailure> {
        tracing::debug!(
            model = %self.model_id,
            flow = request.flow.as_str(),
            prompt_chars = request.prompt.chars().count(),
            "sending completion request"
        );

        let start = Instant::now();
        let result = self.inner.complete(request).await;
        let duration = start.elapsed();

        match &result {
            Ok(_) => {
                tracing::info!(
                    model = %self.model_id,
                    flow = request.flow.as_str(),
                    duration_ms = %duration.as_millis(),
                    "completion succeeded"
                );
            }
            Err(e) => {
                tracing::error!(
                    model = %self.model_id,
                    flow = request.flow.as_str(),
                    duration_ms = %duration.as_millis(),
                    error = %e,
                    "completion failed"
                );
            }
        }

        result
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
