use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{parse_structured, CompletionClient};
use crate::error::CompletionFailure;
use crate::prompt::CompletionRequest;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    /// JSON schema the reply must follow.
    format: Value,
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
    #[allow(dead_code)]
    done: bool,
}

#[derive(Deserialize)]
struct OllamaModel {
    name: String,
}

#[derive(Deserialize)]
struct OllamaModelsResponse {
    models: Vec<OllamaModel>,
}

#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    pub async fn list_models(&self) -> anyhow::Result<Vec<String>> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!("Failed to list models: {}", response.status()));
        }

        let models_response: OllamaModelsResponse = response.json().await?;
        let model_names: Vec<String> = models_response
            .models
            .into_iter()
            .map(|model| model.name)
            .collect();

        Ok(model_names)
    }

    fn request_body<'a>(&'a self, request: &'a CompletionRequest) -> OllamaRequest<'a> {
        OllamaRequest {
            model: &self.model,
            prompt: &request.prompt,
            stream: false,
            format: request.schema.to_json_schema(),
        }
    }
}

#[async_trait]
impl CompletionClient for OllamaClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<Value, CompletionFailure> {
        let url = format!("{}/api/generate", self.base_url);

        let body = self.request_body(request);

        let response = self.client.post(&url).json(&body).send().await?;

        if !response.status().is_success() {
            return Err(CompletionFailure::new(format!(
                "Ollama request failed with status: {}. Make sure Ollama is running with: ollama serve",
                response.status()
            )));
        }

        let ollama_response: OllamaResponse = response.json().await?;
        parse_structured(&ollama_response.response, &request.schema)
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::ask_request;
    use crate::sensor::SensorReading;
    use crate::state::ConversationHistory;
    use serde_json::json;

    #[test]
    fn request_disables_streaming_and_sends_schema_as_format() {
        let client = OllamaClient::new("http://localhost:11434/", "llama3.2:latest");
        let request = ask_request("Why?", &SensorReading::default(), &ConversationHistory::seeded());

        let body = serde_json::to_value(client.request_body(&request)).unwrap();

        assert_eq!(body["model"], json!("llama3.2:latest"));
        assert_eq!(body["stream"], json!(false));
        assert_eq!(body["prompt"], json!(request.prompt));
        assert_eq!(body["format"]["type"], json!("object"));
        assert_eq!(body["format"]["required"], json!(["answer"]));
        assert_eq!(body["format"]["properties"]["answer"]["type"], json!("string"));
    }

    #[test]
    fn base_url_drops_trailing_slash() {
        let client = OllamaClient::new("http://localhost:11434/", "llama3.2:latest");
        assert_eq!(client.base_url, DEFAULT_OLLAMA_URL);
    }

    #[test]
    fn generate_reply_carries_text_in_response_field() {
        let body = r#"{"model":"llama3.2","response":"{\"answer\":\"hi\"}","done":true}"#;
        let parsed: OllamaResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.response, r#"{"answer":"hi"}"#);
    }
}
