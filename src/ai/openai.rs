use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{parse_structured, CompletionClient};
use crate::error::CompletionFailure;
use crate::prompt::CompletionRequest;

#[derive(Serialize)]
struct OpenAIMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAIMessage<'a>>,
    response_format: Value,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Clone)]
pub struct OpenAIClient {
    client: Client,
    api_key: String,
    model: String,
}

impl OpenAIClient {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    pub fn list_models() -> Vec<String> {
        vec![
            "gpt-4o".to_string(),
            "gpt-4o-mini".to_string(),
            "gpt-4-turbo".to_string(),
        ]
    }

    fn request_body<'a>(&'a self, request: &'a CompletionRequest) -> OpenAIRequest<'a> {
        let mut schema = request.schema.to_json_schema();
        schema["additionalProperties"] = json!(false);

        OpenAIRequest {
            model: &self.model,
            messages: vec![OpenAIMessage {
                role: "user",
                content: &request.prompt,
            }],
            response_format: json!({
                "type": "json_schema",
                "json_schema": {
                    "name": request.schema.name,
                    "schema": schema,
                    "strict": true,
                }
            }),
        }
    }
}

#[async_trait]
impl CompletionClient for OpenAIClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<Value, CompletionFailure> {
        let body = self.request_body(request);

        let response = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(CompletionFailure::new(format!("OpenAI API error {}: {}", status, text)));
        }

        let openai_response: OpenAIResponse = response.json().await?;
        let content = openai_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| CompletionFailure::new("OpenAI returned no content"))?;

        parse_structured(&content, &request.schema)
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

    #[test]
    fn request_uses_strict_json_schema() {
        let client = OpenAIClient::new("sk-test", "gpt-4o-mini");
        let request = analyze_request(&SensorReading::default());

        let body = serde_json::to_value(client.request_body(&request)).unwrap();

        assert_eq!(body["model"], json!("gpt-4o-mini"));
        assert_eq!(body["messages"][0]["role"], json!("user"));
        assert_eq!(body["messages"][0]["content"], json!(request.prompt));

        let format = &body["response_format"];
        assert_eq!(format["type"], json!("json_schema"));
        assert_eq!(format["json_schema"]["name"], json!("AnalyzeHeatStatusOutput"));
        assert_eq!(format["json_schema"]["strict"], json!(true));
        let schema = &format["json_schema"]["schema"];
        assert_eq!(schema["additionalProperties"], json!(false));
        assert_eq!(schema["required"], json!(["analysis", "suggestions"]));
    }
}
