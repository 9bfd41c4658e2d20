use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{parse_structured, CompletionClient};
use crate::error::CompletionFailure;
use crate::prompt::CompletionRequest;

const MAX_TOKENS: u32 = 4096;

#[derive(Serialize)]
struct ClaudeMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ClaudeRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ClaudeMessage<'a>>,
}

#[derive(Deserialize)]
struct ClaudeContent {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct ClaudeResponse {
    content: Vec<ClaudeContent>,
}

/// The Messages API has no schema mode; the prompt already carries the JSON
/// instructions and the reply is parsed leniently.
#[derive(Clone)]
pub struct ClaudeClient {
    client: Client,
    api_key: String,
    model: String,
}

impl ClaudeClient {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    pub fn list_models() -> Vec<String> {
        vec![
            "claude-sonnet-4-20250514".to_string(),
            "claude-3-5-sonnet-20241022".to_string(),
            "claude-3-5-haiku-20241022".to_string(),
        ]
    }

    fn request_body<'a>(&'a self, request: &'a CompletionRequest) -> ClaudeRequest<'a> {
        ClaudeRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            messages: vec![ClaudeMessage {
                role: "user",
                content: &request.prompt,
            }],
        }
    }
}

#[async_trait]
impl CompletionClient for ClaudeClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<Value, CompletionFailure> {
        let body = self.request_body(request);

        let response = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(CompletionFailure::new(format!("Claude API error {}: {}", status, text)));
        }

        let claude_response: ClaudeResponse = response.json().await?;
        let text: String = claude_response
            .content
            .into_iter()
            .map(|c| c.text)
            .collect::<Vec<_>>()
            .join("");

        parse_structured(&text, &request.schema)
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::analyze_request;
    use crate::sensor::SensorReading;
    use serde_json::json;

    #[test]
    fn request_sends_prompt_as_single_user_message() {
        let client = ClaudeClient::new("key", "claude-sonnet-4-20250514");
        let request = analyze_request(&SensorReading::default());

        let body = serde_json::to_value(client.request_body(&request)).unwrap();

        assert_eq!(body["model"], json!("claude-sonnet-4-20250514"));
        assert_eq!(body["max_tokens"], json!(4096));
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["role"], json!("user"));
        let content = messages[0]["content"].as_str().unwrap();
        assert_eq!(content, request.prompt);
        // No schema mode, so the JSON instructions ride in the prompt
        assert!(content.contains("\"suggestions\""));
    }

    #[test]
    fn reply_text_blocks_are_joined() {
        let body = r#"{"content":[{"type":"text","text":"{\"answer\":"},{"type":"text","text":"\"ok\"}"}]}"#;
        let parsed: ClaudeResponse = serde_json::from_str(body).unwrap();
        let text: String = parsed.content.into_iter().map(|c| c.text).collect();
        assert_eq!(text, r#"{"answer":"ok"}"#);
    }
}
