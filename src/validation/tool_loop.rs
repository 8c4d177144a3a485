//! Tool-validation loop: negotiates generative output against display constraints.
//!
//! Wraps a provider. Every request advertises the `submit_content` tool; each proposal is
//! validated, and rejections go back to the model as the next turn until the content fits
//! or the attempt budget runs out. Provider failures propagate immediately so the failover
//! coordinator can classify them.

use crate::error::ApiError;
use crate::provider::{
    ChatMessage, CompletionOptions, CompletionResponse, ModelProviderClient, TokenUsage,
    ToolCall, ToolDefinition,
};
use crate::validation::{DisplayLimits, ValidationResult, SUBMIT_CONTENT_TOOL};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Checks one proposal.
pub type Validator = Arc<dyn Fn(&str) -> ValidationResult + Send + Sync>;

/// What to do when the attempt budget is exhausted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExhaustionPolicy {
    /// Fail the generation; the coordinator treats it like any other failure
    #[default]
    Raise,
    /// Accept the last proposal and let the renderer truncate it
    AcceptBestEffort,
}

/// Loop configuration
#[derive(Debug, Clone)]
pub struct ToolLoopConfig {
    pub max_attempts: usize,
    pub exhaustion_policy: ExhaustionPolicy,
    /// Timeout applied to each upstream call
    pub request_timeout: Duration,
}

impl Default for ToolLoopConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            exhaustion_policy: ExhaustionPolicy::Raise,
            request_timeout: Duration::from_secs(60),
        }
    }
}

/// Provider decorator enforcing display constraints on proposals.
pub struct ToolValidationLoop {
    inner: Arc<dyn ModelProviderClient>,
    validator: Validator,
    limits: DisplayLimits,
    config: ToolLoopConfig,
    attempts: AtomicUsize,
}

impl ToolValidationLoop {
    pub fn new(
        inner: Arc<dyn ModelProviderClient>,
        validator: Validator,
        limits: DisplayLimits,
        config: ToolLoopConfig,
    ) -> Self {
        Self {
            inner,
            validator,
            limits,
            config,
            attempts: AtomicUsize::new(0),
        }
    }

    /// Attempts used by the most recent `complete` call.
    pub fn attempts_used(&self) -> usize {
        self.attempts.load(Ordering::Relaxed)
    }

    pub fn submit_content_tool(limits: DisplayLimits) -> ToolDefinition {
        ToolDefinition {
            name: SUBMIT_CONTENT_TOOL.to_string(),
            description: format!(
                "Submit text for the display. It must fit in {} lines of {} characters after \
                 word-wrapping, using only letters, digits, spaces, the punctuation \
                 !@#$()-+&=;:'\"%,./? and color squares.",
                limits.max_lines, limits.max_line_length
            ),
            parameters: json!({
                "type": "object",
                "properties": {
                    "content": {
                        "type": "string",
                        "description": "Display text; use newlines to break lines explicitly"
                    }
                },
                "required": ["content"]
            }),
        }
    }

    async fn call_inner(
        &self,
        messages: Vec<ChatMessage>,
        options: CompletionOptions,
    ) -> Result<CompletionResponse, ApiError> {
        match tokio::time::timeout(
            self.config.request_timeout,
            self.inner.complete(messages, options),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ApiError::ProviderTimeout {
                provider: self.inner.provider_name().to_string(),
                timeout_ms: self.config.request_timeout.as_millis() as u64,
            }),
        }
    }
}

/// The proposal in a response and the tool call that carried it, if any.
fn extract_submission(response: &CompletionResponse) -> (String, Option<&ToolCall>) {
    let call = response
        .tool_calls
        .iter()
        .find(|call| call.name == SUBMIT_CONTENT_TOOL);
    match call {
        Some(call) => {
            let content = match &call.arguments {
                serde_json::Value::String(raw) => raw.clone(),
                args => args
                    .get("content")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
            };
            (content, Some(call))
        }
        None => (response.content.trim().to_string(), None),
    }
}

#[async_trait]
impl ModelProviderClient for ToolValidationLoop {
    async fn complete(
        &self,
        mut messages: Vec<ChatMessage>,
        mut options: CompletionOptions,
    ) -> Result<CompletionResponse, ApiError> {
        if !options.tools.iter().any(|t| t.name == SUBMIT_CONTENT_TOOL) {
            options.tools.push(Self::submit_content_tool(self.limits));
        }
        self.attempts.store(0, Ordering::Relaxed);

        let max_attempts = self.config.max_attempts.max(1);
        let mut usage = TokenUsage::default();
        let mut last: Option<(CompletionResponse, String, ValidationResult)> = None;

        for attempt in 1..=max_attempts {
            self.attempts.store(attempt, Ordering::Relaxed);
            let response = self.call_inner(messages.clone(), options.clone()).await?;
            usage.accumulate(&response.usage);

            let (proposal, carrier) = extract_submission(&response);
            let result = (self.validator)(&proposal);

            if result.valid {
                debug!(
                    provider = %self.inner.provider_name(),
                    attempt,
                    lines = result.line_count,
                    "Content accepted"
                );
                return Ok(CompletionResponse {
                    content: proposal,
                    model: response.model,
                    usage,
                    finish_reason: response.finish_reason,
                    tool_calls: Vec::new(),
                });
            }

            debug!(
                provider = %self.inner.provider_name(),
                attempt,
                max_attempts,
                errors = ?result.errors,
                "Content rejected"
            );

            let feedback = result.feedback(self.limits);
            let carrier_id = carrier.map(|call| call.id.clone());
            messages.push(ChatMessage::assistant(
                response.content.clone(),
                response.tool_calls.clone(),
            ));
            if response.tool_calls.is_empty() {
                messages.push(ChatMessage::user(feedback));
            } else {
                for call in &response.tool_calls {
                    if Some(&call.id) == carrier_id.as_ref() {
                        messages.push(ChatMessage::tool_result(call.id.clone(), feedback.clone()));
                    } else {
                        messages.push(ChatMessage::tool_result(
                            call.id.clone(),
                            format!(
                                "Unknown tool {}; call {} with the display text.",
                                call.name, SUBMIT_CONTENT_TOOL
                            ),
                        ));
                    }
                }
                if carrier_id.is_none() {
                    messages.push(ChatMessage::user(feedback));
                }
            }

            last = Some((response, proposal, result));
        }

        let (response, proposal, result) = last.ok_or_else(|| {
            ApiError::GenerationFailed("tool loop made no attempts".to_string())
        })?;

        match self.config.exhaustion_policy {
            ExhaustionPolicy::Raise => {
                warn!(
                    provider = %self.inner.provider_name(),
                    attempts = max_attempts,
                    "Content never satisfied display constraints"
                );
                Err(ApiError::ValidationExhausted {
                    attempts: max_attempts,
                    last_error: result.errors.join("; "),
                })
            }
            ExhaustionPolicy::AcceptBestEffort => {
                warn!(
                    provider = %self.inner.provider_name(),
                    attempts = max_attempts,
                    errors = ?result.errors,
                    "Accepting best-effort content after exhausting attempts"
                );
                Ok(CompletionResponse {
                    content: proposal,
                    model: response.model,
                    usage,
                    finish_reason: response.finish_reason,
                    tool_calls: Vec::new(),
                })
            }
        }
    }

    fn provider_name(&self) -> &str {
        self.inner.provider_name()
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}
