use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Result, anyhow};

use crate::ai::ollama::DEFAULT_OLLAMA_URL;
use crate::provider::Provider;

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub provider: Option<String>,
    pub default_model: Option<String>,
    pub ollama_url: Option<String>,
    pub gemini_api_key: Option<String>,
    pub claude_api_key: Option<String>,
    pub openai_api_key: Option<String>,
}

fn env_key(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|value| !value.trim().is_empty())
}

impl Config {
    pub fn new() -> Self {
        Self {
            provider: Some(Provider::Gemini.as_str().to_string()),
            ..Self::default()
        }
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(config_path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(config_path, config_content)?;
        Ok(())
    }

    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("busguardian"))
    }

    fn get_config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    pub fn provider(&self) -> Provider {
        self.provider
            .as_deref()
            .and_then(Provider::from_str)
            .unwrap_or(Provider::Gemini)
    }

    /// Stored model if set, otherwise the provider's default.
    pub fn model_for(&self, provider: Provider) -> String {
        match (&self.default_model, self.provider()) {
            (Some(model), stored) if stored == provider => model.clone(),
            _ => provider.default_model().to_string(),
        }
    }

    pub fn ollama_url(&self) -> String {
        self.ollama_url
            .clone()
            .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string())
    }

    // API keys: environment variables first, then config

    pub fn gemini_key(&self) -> Option<String> {
        env_key(&["GEMINI_API_KEY", "GOOGLE_API_KEY"]).or_else(|| self.gemini_api_key.clone())
    }

    pub fn claude_key(&self) -> Option<String> {
        env_key(&["ANTHROPIC_API_KEY"]).or_else(|| self.claude_api_key.clone())
    }

    pub fn openai_key(&self) -> Option<String> {
        env_key(&["OPENAI_API_KEY"]).or_else(|| self.openai_api_key.clone())
    }

    /// Where a provider's key comes from, for the provider picker.
    pub fn key_source(&self, provider: Provider) -> Option<&'static str> {
        let (env_names, stored): (&[&str], &Option<String>) = match provider {
            Provider::Ollama => return Some("local"),
            Provider::Gemini => (&["GEMINI_API_KEY", "GOOGLE_API_KEY"], &self.gemini_api_key),
            Provider::Claude => (&["ANTHROPIC_API_KEY"], &self.claude_api_key),
            Provider::OpenAI => (&["OPENAI_API_KEY"], &self.openai_api_key),
        };
        if env_key(env_names).is_some() {
            Some("env")
        } else if stored.is_some() {
            Some("config")
        } else {
            None
        }
    }

    /// Remember the provider and model picked in the dashboard.
    pub fn remember_selection(&mut self, provider: Provider, model: &str) {
        self.provider = Some(provider.as_str().to_string());
        self.default_model = Some(model.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::new());
        assert_eq!(config.provider(), Provider::Gemini);
    }

    #[test]
    fn save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::new();
        config.remember_selection(Provider::Ollama, "mistral:latest");
        config.ollama_url = Some("http://10.0.0.2:11434".to_string());
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.provider(), Provider::Ollama);
        assert_eq!(loaded.model_for(Provider::Ollama), "mistral:latest");
        assert_eq!(loaded.ollama_url(), "http://10.0.0.2:11434");
    }

    #[test]
    fn stored_model_only_applies_to_its_provider() {
        let mut config = Config::new();
        config.remember_selection(Provider::OpenAI, "gpt-4o");
        assert_eq!(config.model_for(Provider::OpenAI), "gpt-4o");
        assert_eq!(config.model_for(Provider::Gemini), "gemini-2.0-flash");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
