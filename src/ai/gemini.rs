//! Google Gemini backend (Generative Language API)

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{parse_structured, CompletionClient};
use crate::error::CompletionFailure;
use crate::prompt::{CompletionRequest, OutputSchema};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    pub fn list_models() -> Vec<String> {
        vec![
            "gemini-2.0-flash".to_string(),
            "gemini-2.5-flash".to_string(),
            "gemini-2.5-pro".to_string(),
        ]
    }

    fn endpoint(&self) -> String {
        format!("{}/{}:generateContent", GEMINI_BASE_URL, self.model)
    }
}

/// Gemini takes an OpenAPI-style schema with upper-case type names.
fn response_schema(schema: &OutputSchema) -> Value {
    let mut properties = serde_json::Map::new();
    for field in schema.fields {
        properties.insert(
            field.name.to_string(),
            json!({ "type": "STRING", "description": field.description }),
        );
    }
    let required: Vec<&str> = schema.fields.iter().map(|f| f.name).collect();
    json!({
        "type": "OBJECT",
        "properties": properties,
        "required": required,
    })
}

#[async_trait]
impl CompletionClient for GeminiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<Value, CompletionFailure> {
        let body = GeminiRequest {
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart {
                    text: request.prompt.clone(),
                }],
            }],
            generation_config: GeminiGenerationConfig {
                response_mime_type: "application/json",
                response_schema: response_schema(&request.schema),
            },
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("Content-Type", "application/json")
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            if let Ok(error_resp) = serde_json::from_str::<GeminiErrorResponse>(&text) {
                return Err(CompletionFailure::new(format!(
                    "Gemini API error {}: {}",
                    status, error_resp.error.message
                )));
            }
            return Err(CompletionFailure::new(format!("Gemini API error {}: {}", status, text)));
        }

        let gemini_response: GeminiResponse = serde_json::from_str(&text)?;
        let reply = gemini_response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().map(|p| p.text).collect::<Vec<_>>().join(""))
            .ok_or_else(|| CompletionFailure::new("No candidates in Gemini response"))?;

        parse_structured(&reply, &request.schema)
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

// Gemini API types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    response_mime_type: &'static str,
    response_schema: Value,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiError,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::ANALYZE_OUTPUT;

    #[test]
    fn response_schema_uses_openapi_types() {
        let schema = response_schema(&ANALYZE_OUTPUT);
        assert_eq!(schema["type"], json!("OBJECT"));
        assert_eq!(schema["properties"]["suggestions"]["type"], json!("STRING"));
        assert_eq!(schema["required"], json!(["analysis", "suggestions"]));
    }

    #[test]
    fn reply_text_is_read_from_first_candidate() {
        let body = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"{\"answer\":"},{"text":"\"hi\"}"}]}}]}"#;
        let parsed: GeminiResponse = serde_json::from_str(body).unwrap();
        let content = parsed.candidates.into_iter().next().and_then(|c| c.content).unwrap();
        let text: String = content.parts.into_iter().map(|p| p.text).collect();
        assert_eq!(text, r#"{"answer":"hi"}"#);
    }
}
