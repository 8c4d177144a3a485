//! Model Provider Abstraction
//!
//! Unified interface for the upstream generative models that back `generative` content
//! sources. Providers speak an OpenAI-compatible chat format with tool calls; failures are
//! classified into rate-limit, authentication, invalid-request and timeout errors so the
//! failover coordinator can branch on kind alone.

use crate::error::ApiError;
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

pub mod profile;

pub use profile::{ProviderConfig, ProviderType};

/// Model cost tier requested by a content source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    Light,
    #[default]
    Standard,
    Premium,
}

impl ModelTier {
    pub fn as_str(self) -> &'static str {
        match self {
            ModelTier::Light => "light",
            ModelTier::Standard => "standard",
            ModelTier::Premium => "premium",
        }
    }
}

/// Chat message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

/// A tool the model may call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object
    pub parameters: serde_json::Value,
}

/// A tool invocation proposed by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// Chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    fn plain(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(MessageRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::plain(MessageRole::Assistant, content)
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            ..Self::plain(MessageRole::Tool, content)
        }
    }
}

/// Completion options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionOptions {
    pub temperature: Option<f32>, // 0.0-2.0, default: 1.0
    pub max_tokens: Option<u32>,
    pub top_p: Option<f32>,
    pub stop: Option<Vec<String>>,
    /// Tools offered to the model for this request
    #[serde(skip)]
    pub tools: Vec<ToolDefinition>,
    /// Cost tier; providers map it to a concrete model
    #[serde(skip)]
    pub tier: Option<ModelTier>,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: Some(1.0),
            max_tokens: None,
            top_p: None,
            stop: None,
            tools: Vec::new(),
            tier: None,
        }
    }
}

impl CompletionOptions {
    /// Fill every field this call leaves unset from `base`.
    pub fn or_defaults(self, base: &CompletionOptions) -> CompletionOptions {
        CompletionOptions {
            temperature: self.temperature.or(base.temperature),
            max_tokens: self.max_tokens.or(base.max_tokens),
            top_p: self.top_p.or(base.top_p),
            stop: self.stop.or_else(|| base.stop.clone()),
            tools: if self.tools.is_empty() {
                base.tools.clone()
            } else {
                self.tools
            },
            tier: self.tier.or(base.tier),
        }
    }
}

/// Token usage information
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    pub fn accumulate(&mut self, other: &TokenUsage) {
        self.prompt_tokens = self.prompt_tokens.saturating_add(other.prompt_tokens);
        self.completion_tokens = self.completion_tokens.saturating_add(other.completion_tokens);
        self.total_tokens = self.total_tokens.saturating_add(other.total_tokens);
    }
}

/// Completion response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub content: String,
    pub model: String,
    pub usage: TokenUsage,
    pub finish_reason: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
}

/// Model provider client trait
#[async_trait]
pub trait ModelProviderClient: Send + Sync {
    /// Generate a completion from a list of messages
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        options: CompletionOptions,
    ) -> Result<CompletionResponse, ApiError>;

    /// Single-turn generation from a system and user prompt
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: CompletionOptions,
    ) -> Result<CompletionResponse, ApiError> {
        self.complete(
            vec![
                ChatMessage::system(system_prompt),
                ChatMessage::user(user_prompt),
            ],
            options,
        )
        .await
    }

    /// Get the provider name
    fn provider_name(&self) -> &str;

    /// Get the model name
    fn model_name(&self) -> &str;
}

// OpenAI-compatible API request/response structures
#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<OpenAITool>,
    stream: bool,
}

#[derive(Serialize, Deserialize)]
struct OpenAIMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OpenAIToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Serialize)]
struct OpenAITool {
    #[serde(rename = "type")]
    kind: &'static str,
    function: OpenAIFunctionDef,
}

#[derive(Serialize)]
struct OpenAIFunctionDef {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Serialize, Deserialize)]
struct OpenAIToolCall {
    id: String,
    #[serde(rename = "type", default = "function_kind")]
    kind: String,
    function: OpenAIFunctionCall,
}

#[derive(Serialize, Deserialize)]
struct OpenAIFunctionCall {
    name: String,
    /// JSON-encoded arguments
    arguments: String,
}

fn function_kind() -> String {
    "function".to_string()
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    model: String,
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: OpenAIMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

// Helper function to convert MessageRole to string
fn role_to_string(role: MessageRole) -> &'static str {
    match role {
        MessageRole::System => "system",
        MessageRole::User => "user",
        MessageRole::Assistant => "assistant",
        MessageRole::Tool => "tool",
    }
}

fn to_openai_message(msg: ChatMessage) -> OpenAIMessage {
    let tool_calls = if msg.tool_calls.is_empty() {
        None
    } else {
        Some(
            msg.tool_calls
                .into_iter()
                .map(|call| OpenAIToolCall {
                    id: call.id,
                    kind: function_kind(),
                    function: OpenAIFunctionCall {
                        name: call.name,
                        arguments: call.arguments.to_string(),
                    },
                })
                .collect(),
        )
    };
    OpenAIMessage {
        role: role_to_string(msg.role).to_string(),
        content: Some(msg.content),
        tool_calls,
        tool_call_id: msg.tool_call_id,
    }
}

fn from_openai_tool_call(call: OpenAIToolCall) -> ToolCall {
    let arguments = serde_json::from_str(&call.function.arguments)
        .unwrap_or(serde_json::Value::String(call.function.arguments));
    ToolCall {
        id: call.id,
        name: call.function.name,
        arguments,
    }
}

/// Map an HTTP status to a classified provider error.
pub fn classify_status(provider: &str, status: u16, message: String, timeout: Duration) -> ApiError {
    let provider = provider.to_string();
    match status {
        401 | 403 => ApiError::ProviderAuthFailed {
            provider,
            status,
            message,
        },
        429 => ApiError::ProviderRateLimit {
            provider,
            status,
            message,
        },
        400 | 404 | 413 | 422 => ApiError::ProviderInvalidRequest {
            provider,
            status,
            message,
        },
        408 | 504 => ApiError::ProviderTimeout {
            provider,
            timeout_ms: timeout.as_millis() as u64,
        },
        _ => ApiError::ProviderError(format!(
            "{} request failed with status {}: {}",
            provider, status, message
        )),
    }
}

// Helper function to map transport errors to ApiError
fn map_http_error(provider: &str, error: reqwest::Error, timeout: Duration) -> ApiError {
    if let Some(status) = error.status() {
        classify_status(provider, status.as_u16(), error.to_string(), timeout)
    } else if error.is_timeout() {
        ApiError::ProviderTimeout {
            provider: provider.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        }
    } else if error.is_connect() {
        ApiError::ProviderError(format!("{} connection error: {}", provider, error))
    } else {
        ApiError::ProviderError(format!("{} HTTP error: {}", provider, error))
    }
}

const PROVIDER_HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

fn build_provider_http_client(request_timeout: Duration) -> Result<Client, ApiError> {
    Client::builder()
        .no_proxy()
        .connect_timeout(PROVIDER_HTTP_CONNECT_TIMEOUT)
        .timeout(request_timeout)
        .build()
        .map_err(|e| ApiError::ProviderError(format!("Failed to create HTTP client: {}", e)))
}

/// OpenAI-compatible chat completions client (OpenAI, Ollama, local servers)
pub struct OpenAICompatibleClient {
    client: Client,
    provider_name: String,
    model: String,
    tier_models: std::collections::HashMap<String, String>,
    default_options: CompletionOptions,
    api_key: Option<String>,
    endpoint: String,
    timeout: Duration,
}

impl OpenAICompatibleClient {
    pub fn new(
        provider_name: String,
        model: String,
        endpoint: String,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = build_provider_http_client(timeout)?;
        Ok(Self {
            client,
            provider_name,
            model,
            tier_models: Default::default(),
            default_options: CompletionOptions::default(),
            api_key,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    /// Models to use for specific cost tiers, keyed by tier name.
    pub fn with_tier_models(mut self, tier_models: std::collections::HashMap<String, String>) -> Self {
        self.tier_models = tier_models;
        self
    }

    /// Base options; per-call options override them field by field.
    pub fn with_default_options(mut self, default_options: CompletionOptions) -> Self {
        self.default_options = default_options;
        self
    }

    /// Build a client from a provider profile.
    pub fn from_config(
        name: &str,
        config: &ProviderConfig,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        Ok(Self::new(
            name.to_string(),
            config.model.clone(),
            config.resolved_endpoint(),
            config.api_key.clone(),
            timeout,
        )?
        .with_tier_models(config.tier_models.clone())
        .with_default_options(config.default_options.clone()))
    }

    fn model_for(&self, tier: Option<ModelTier>) -> String {
        tier.and_then(|t| self.tier_models.get(t.as_str()))
            .cloned()
            .unwrap_or_else(|| self.model.clone())
    }

    fn build_request(
        &self,
        messages: Vec<ChatMessage>,
        options: CompletionOptions,
    ) -> ChatCompletionRequest {
        let options = options.or_defaults(&self.default_options);
        ChatCompletionRequest {
            model: self.model_for(options.tier),
            messages: messages.into_iter().map(to_openai_message).collect(),
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            top_p: options.top_p,
            stop: options.stop,
            tools: options
                .tools
                .into_iter()
                .map(|tool| OpenAITool {
                    kind: "function",
                    function: OpenAIFunctionDef {
                        name: tool.name,
                        description: tool.description,
                        parameters: tool.parameters,
                    },
                })
                .collect(),
            stream: false,
        }
    }
}

#[async_trait]
impl ModelProviderClient for OpenAICompatibleClient {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        options: CompletionOptions,
    ) -> Result<CompletionResponse, ApiError> {
        let request = self.build_request(messages, options);

        let url = format!("{}/chat/completions", self.endpoint);
        let mut builder = self
            .client
            .post(&url)
            .header("Content-Type", "application/json");
        if let Some(api_key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", api_key));
        }
        let response = builder
            .json(&request)
            .send()
            .await
            .map_err(|e| map_http_error(&self.provider_name, e, self.timeout))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(classify_status(
                &self.provider_name,
                status,
                error_text,
                self.timeout,
            ));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ApiError::ProviderError(format!("Failed to parse response: {}", e)))?;

        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::ProviderError("No choices in response".to_string()))?;

        let usage = completion.usage.unwrap_or(Usage {
            prompt_tokens: 0,
            completion_tokens: 0,
            total_tokens: 0,
        });

        Ok(CompletionResponse {
            content: choice.message.content.unwrap_or_default(),
            model: completion.model,
            usage: TokenUsage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
                total_tokens: usage.total_tokens,
            },
            finish_reason: choice.finish_reason,
            tool_calls: choice
                .message
                .tool_calls
                .unwrap_or_default()
                .into_iter()
                .map(from_openai_tool_call)
                .collect(),
        })
    }

    fn provider_name(&self) -> &str {
        &self.provider_name
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Deterministic provider that replays a script of responses.
///
/// Used for offline runs (`provider_type = "scripted"`) and in tests. When the script is
/// exhausted the last entry repeats; an empty script always fails with a provider error.
pub struct ScriptedProvider {
    provider_name: String,
    model_name: String,
    script: Mutex<VecDeque<Result<CompletionResponse, ApiError>>>,
    last: Mutex<Option<Result<CompletionResponse, ApiError>>>,
    calls: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
}

impl ScriptedProvider {
    pub fn new(provider_name: impl Into<String>, model_name: impl Into<String>) -> Self {
        Self {
            provider_name: provider_name.into(),
            model_name: model_name.into(),
            script: Mutex::new(VecDeque::new()),
            last: Mutex::new(None),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Plain-text responses, in order.
    pub fn with_texts<I, S>(self, texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for text in texts {
            let response = self.text_response(text.into(), Vec::new());
            self.script.lock().push_back(Ok(response));
        }
        self
    }

    /// Responses that submit content through a tool call, in order.
    pub fn with_submissions<I, S>(self, texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for (idx, text) in texts.into_iter().enumerate() {
            let call = ToolCall {
                id: format!("call_{}", idx),
                name: crate::validation::SUBMIT_CONTENT_TOOL.to_string(),
                arguments: serde_json::json!({ "content": text.into() }),
            };
            let response = self.text_response(String::new(), vec![call]);
            self.script.lock().push_back(Ok(response));
        }
        self
    }

    /// Queue a failure.
    pub fn with_error(self, error: ApiError) -> Self {
        self.script.lock().push_back(Err(error));
        self
    }

    /// Number of `complete` calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Messages sent on each call.
    pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().clone()
    }

    fn text_response(&self, content: String, tool_calls: Vec<ToolCall>) -> CompletionResponse {
        CompletionResponse {
            content,
            model: self.model_name.clone(),
            usage: TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 20,
                total_tokens: 30,
            },
            finish_reason: Some("stop".to_string()),
            tool_calls,
        }
    }
}

#[async_trait]
impl ModelProviderClient for ScriptedProvider {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        _options: CompletionOptions,
    ) -> Result<CompletionResponse, ApiError> {
        self.calls.lock().push(messages);
        let next = self.script.lock().pop_front();
        match next {
            Some(result) => {
                *self.last.lock() = Some(result.clone());
                result
            }
            None => self.last.lock().clone().unwrap_or_else(|| {
                Err(ApiError::ProviderError(format!(
                    "{} has no scripted responses",
                    self.provider_name
                )))
            }),
        }
    }

    fn provider_name(&self) -> &str {
        &self.provider_name
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// Provider factory for creating provider clients
pub struct ProviderFactory;

impl ProviderFactory {
    pub fn create_client(
        name: &str,
        config: &ProviderConfig,
        timeout: Duration,
    ) -> Result<Arc<dyn ModelProviderClient>, ApiError> {
        config.validate().map_err(|e| {
            ApiError::ConfigError(format!("Provider '{}': {}", name, e))
        })?;
        match config.provider_type {
            ProviderType::Scripted => Ok(Arc::new(
                ScriptedProvider::new(name, config.model.clone())
                    .with_texts(config.responses.clone()),
            )),
            _ => Ok(Arc::new(OpenAICompatibleClient::from_config(
                name, config, timeout,
            )?)),
        }
    }
}
