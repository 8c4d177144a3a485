//! Provider profiles: the configuration shape of one upstream model endpoint.

use crate::provider::CompletionOptions;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Provider type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    OpenAI,
    Ollama,
    #[serde(alias = "local")]
    LocalCustom,
    /// Replays `responses`; no network I/O
    Scripted,
}

/// Provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub provider_type: ProviderType,
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Model overrides per cost tier (`light`, `standard`, `premium`)
    #[serde(default)]
    pub tier_models: HashMap<String, String>,
    /// Scripted responses (scripted providers only)
    #[serde(default)]
    pub responses: Vec<String>,
    /// Base request options; per-call options override them
    #[serde(default)]
    pub default_options: CompletionOptions,
}

impl ProviderConfig {
    /// Validate provider configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.model.trim().is_empty() {
            return Err("Model cannot be empty".to_string());
        }
        if let Some(endpoint) = &self.endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(format!("Endpoint must be an http(s) URL: {}", endpoint));
            }
        }
        match self.provider_type {
            ProviderType::OpenAI if self.api_key.is_none() => {
                Err("OpenAI providers require an api_key".to_string())
            }
            ProviderType::LocalCustom if self.endpoint.is_none() => {
                Err("Local providers require an endpoint".to_string())
            }
            _ => {
                for tier in self.tier_models.keys() {
                    if !matches!(tier.as_str(), "light" | "standard" | "premium") {
                        return Err(format!("Unknown model tier: {}", tier));
                    }
                }
                Ok(())
            }
        }
    }

    /// Chat completions base URL for this provider
    pub fn resolved_endpoint(&self) -> String {
        match (&self.endpoint, self.provider_type) {
            (Some(endpoint), _) => endpoint.clone(),
            (None, ProviderType::Ollama) => "http://localhost:11434/v1".to_string(),
            (None, _) => "https://api.openai.com/v1".to_string(),
        }
    }
}
