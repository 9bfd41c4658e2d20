use std::sync::Arc;

use crate::ai::{ClaudeClient, CompletionClient, GeminiClient, LoggingClient, OllamaClient, OpenAIClient};
use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Gemini,
    Ollama,
    Claude,
    OpenAI,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Gemini => "gemini",
            Provider::Ollama => "ollama",
            Provider::Claude => "claude",
            Provider::OpenAI => "openai",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "gemini" | "google" => Some(Provider::Gemini),
            "ollama" => Some(Provider::Ollama),
            "claude" | "anthropic" => Some(Provider::Claude),
            "openai" => Some(Provider::OpenAI),
            _ => None,
        }
    }

    pub fn all() -> Vec<Provider> {
        vec![Provider::Gemini, Provider::Ollama, Provider::Claude, Provider::OpenAI]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::Gemini => "Gemini (Google)",
            Provider::Ollama => "Ollama (Local)",
            Provider::Claude => "Claude (Anthropic)",
            Provider::OpenAI => "ChatGPT (OpenAI)",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::Gemini => "gemini-2.0-flash",
            Provider::Ollama => "llama3.2:latest",
            Provider::Claude => "claude-sonnet-4-20250514",
            Provider::OpenAI => "gpt-4o-mini",
        }
    }

    /// Built-in model list. Ollama models are discovered at runtime instead.
    pub fn known_models(&self) -> Vec<String> {
        match self {
            Provider::Gemini => GeminiClient::list_models(),
            Provider::Claude => ClaudeClient::list_models(),
            Provider::OpenAI => OpenAIClient::list_models(),
            Provider::Ollama => vec![self.default_model().to_string()],
        }
    }

    pub fn needs_api_key(&self) -> bool {
        !matches!(self, Provider::Ollama)
    }
}

/// Build the logging-wrapped client for `provider`, or `None` if its API key
/// is not configured.
pub fn build_client(provider: Provider, model: &str, config: &Config) -> Option<Arc<dyn CompletionClient>> {
    let inner: Arc<dyn CompletionClient> = match provider {
        Provider::Gemini => Arc::new(GeminiClient::new(&config.gemini_key()?, model)),
        Provider::Ollama => Arc::new(OllamaClient::new(&config.ollama_url(), model)),
        Provider::Claude => Arc::new(ClaudeClient::new(&config.claude_key()?, model)),
        Provider::OpenAI => Arc::new(OpenAIClient::new(&config.openai_key()?, model)),
    };
    Some(Arc::new(LoggingClient::new(inner)))
}
