//! Built-in content sources and the templating helper they share.

use crate::charset;
use crate::error::ApiError;
use crate::frame::FeatureData;
use crate::provider::{CompletionOptions, ModelProviderClient, ModelTier};
use crate::source::{ContentMetadata, ContentSource, GeneratedContent, GenerationContext};
use async_trait::async_trait;

/// Value for one placeholder name, if known.
fn placeholder_value(name: &str, ctx: &GenerationContext) -> Option<String> {
    match name {
        "date" => Some(ctx.timestamp.format("%A %B %-d").to_string()),
        "time" => Some(ctx.timestamp.format("%-I:%M %p").to_string()),
        "event_type" => Some(
            ctx.event
                .as_ref()
                .map(|event| event.event_type.clone())
                .unwrap_or_default(),
        ),
        "weather" => Some(match &ctx.aux.weather {
            FeatureData::Available(weather) => match &weather.condition {
                Some(condition) => format!("{}F {}", weather.temperature, condition),
                None => format!("{}F", weather.temperature),
            },
            _ => String::new(),
        }),
        key => {
            let value = ctx.event.as_ref()?.payload.get(key)?;
            match value {
                serde_json::Value::String(s) => Some(s.clone()),
                serde_json::Value::Null => Some(String::new()),
                other => Some(other.to_string()),
            }
        }
    }
}

/// Replace `{name}` placeholders from the context.
///
/// Known names are `date`, `time`, `event_type`, `weather`, plus any top-level key of the
/// event payload. Unknown placeholders are left in place.
pub fn fill_placeholders(template: &str, ctx: &GenerationContext) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after.find('}');
        let name = close.map(|end| &after[..end]);
        match (close, name) {
            (Some(end), Some(name))
                if !name.is_empty()
                    && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') =>
            {
                match placeholder_value(name, ctx) {
                    Some(value) => out.push_str(&value),
                    None => out.push_str(&rest[open..open + end + 2]),
                }
                rest = &after[end + 1..];
            }
            _ => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Model-backed source driven by a system/user prompt pair.
pub struct PromptSource {
    system_prompt: String,
    user_prompt: String,
    tier: ModelTier,
}

impl PromptSource {
    pub fn new(system_prompt: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
            tier: ModelTier::Standard,
        }
    }

    pub fn with_tier(mut self, tier: ModelTier) -> Self {
        self.tier = tier;
        self
    }
}

#[async_trait]
impl ContentSource for PromptSource {
    async fn generate(
        &self,
        ctx: &GenerationContext,
        model: Option<&dyn ModelProviderClient>,
    ) -> Result<GeneratedContent, ApiError> {
        let model = model.ok_or_else(|| {
            ApiError::ProviderNotConfigured("prompt source needs a model".to_string())
        })?;
        let system_prompt = fill_placeholders(&self.system_prompt, ctx);
        let user_prompt = fill_placeholders(&self.user_prompt, ctx);
        let options = CompletionOptions {
            tier: Some(self.tier),
            temperature: None,
            ..CompletionOptions::default()
        };

        let response = model.generate(&system_prompt, &user_prompt, options).await?;
        let text = response.content.trim().to_string();
        if text.is_empty() {
            return Err(ApiError::GenerationFailed(format!(
                "{} returned empty content",
                model.provider_name()
            )));
        }

        Ok(GeneratedContent::text(text).with_metadata(ContentMetadata {
            model: Some(response.model),
            provider: Some(model.provider_name().to_string()),
            tier: Some(self.tier),
            tokens_used: Some(response.usage.total_tokens),
            system_prompt: Some(system_prompt),
            user_prompt: Some(user_prompt),
            ..ContentMetadata::default()
        }))
    }
}

/// Fixed text, optionally delivered pre-gridded.
pub struct StaticSource {
    text: String,
    as_layout: bool,
}

impl StaticSource {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            as_layout: false,
        }
    }

    /// Emit layout-mode content laid out over the whole grid.
    pub fn as_layout(mut self) -> Self {
        self.as_layout = true;
        self
    }
}

#[async_trait]
impl ContentSource for StaticSource {
    async fn generate(
        &self,
        _ctx: &GenerationContext,
        _model: Option<&dyn ModelProviderClient>,
    ) -> Result<GeneratedContent, ApiError> {
        Ok(if self.as_layout {
            GeneratedContent::from_layout(self.text.clone(), charset::text_to_layout(&self.text))
        } else {
            GeneratedContent::text(self.text.clone())
        })
    }
}

/// Renders the triggering event's payload into a template.
pub struct TemplateSource {
    template: String,
}

impl TemplateSource {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }
}

#[async_trait]
impl ContentSource for TemplateSource {
    async fn generate(
        &self,
        ctx: &GenerationContext,
        _model: Option<&dyn ModelProviderClient>,
    ) -> Result<GeneratedContent, ApiError> {
        let text = fill_placeholders(&self.template, ctx);
        if let Some(start) = text.find('{') {
            if text[start..].contains('}') {
                return Err(ApiError::GenerationFailed(format!(
                    "template has unresolved placeholders: {}",
                    text
                )));
            }
        }
        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(ApiError::GenerationFailed(
                "template rendered empty text".to_string(),
            ));
        }
        Ok(GeneratedContent::text(text))
    }
}
