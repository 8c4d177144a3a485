//! Content Sources
//!
//! The per-cycle data model (context in, generated content out), source registration
//! metadata, and the single capability every source implements. Shared behavior such as
//! prompt templating and constraint negotiation is composed from helpers and provider
//! decorators rather than inherited.

use crate::charset::Layout;
use crate::error::ApiError;
use crate::frame::AuxiliaryData;
use crate::provider::{ModelProviderClient, ModelTier};
use crate::validation::{validate_display_text, DisplayLimits, FormatOverrides, ValidationResult};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

pub mod builtin;
pub mod fallback;
pub mod registry;
pub mod selector;

pub use builtin::{fill_placeholders, PromptSource, StaticSource, TemplateSource};
pub use fallback::FallbackSource;
pub use registry::{GeneratorConfig, SourceConfig, SourceRegistry};
pub use selector::{
    RandomSource, SeededRandom, Selection, SelectionReason, SelectionStrategy, SequenceRandom,
    SourceSelector, ThreadRandom, UniformStrategy,
};

/// Cycle weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateClass {
    /// Full refresh: select, generate, render
    Major,
    /// Refresh the info row and color column of the cached render
    Minor,
}

/// External event that triggered a cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerEvent {
    pub event_type: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl TriggerEvent {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            payload: serde_json::Value::Null,
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

/// Immutable input to one cycle.
#[derive(Debug, Clone)]
pub struct GenerationContext {
    pub update: UpdateClass,
    pub timestamp: DateTime<FixedOffset>,
    pub event: Option<TriggerEvent>,
    pub cached: Option<GeneratedContent>,
    pub aux: AuxiliaryData,
}

impl GenerationContext {
    pub fn major(timestamp: DateTime<FixedOffset>) -> Self {
        Self {
            update: UpdateClass::Major,
            timestamp,
            event: None,
            cached: None,
            aux: AuxiliaryData::default(),
        }
    }

    pub fn minor(timestamp: DateTime<FixedOffset>) -> Self {
        Self {
            update: UpdateClass::Minor,
            ..Self::major(timestamp)
        }
    }

    pub fn with_event(mut self, event: TriggerEvent) -> Self {
        self.event = Some(event);
        self
    }

    pub fn with_cached(mut self, cached: GeneratedContent) -> Self {
        self.cached = Some(cached);
        self
    }

    pub fn with_aux(mut self, aux: AuxiliaryData) -> Self {
        self.aux = aux;
        self
    }
}

/// Whether content still needs layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    #[default]
    Text,
    /// Already gridded; rendered unchanged
    Layout,
}

/// Provenance of generated content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<ModelTier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u32>,
    /// Produced by the alternate provider after the preferred one failed
    #[serde(default)]
    pub failover: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_attempts: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Output of one source for one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedContent {
    pub text: String,
    pub mode: OutputMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<Layout>,
    #[serde(default)]
    pub metadata: ContentMetadata,
}

impl GeneratedContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            mode: OutputMode::Text,
            layout: None,
            metadata: ContentMetadata::default(),
        }
    }

    pub fn from_layout(text: impl Into<String>, layout: Layout) -> Self {
        Self {
            text: text.into(),
            mode: OutputMode::Layout,
            layout: Some(layout),
            metadata: ContentMetadata::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: ContentMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Precedence class; lower wins.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum PriorityClass {
    Notification = 0,
    #[default]
    Normal = 1,
    Fallback = 2,
}

impl PriorityClass {
    pub fn as_str(self) -> &'static str {
        match self {
            PriorityClass::Notification => "notification",
            PriorityClass::Normal => "normal",
            PriorityClass::Fallback => "fallback",
        }
    }
}

/// Whether a source needs an upstream model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Model-backed; output is negotiated through the tool-validation loop
    Generative,
    /// Computed locally; no model, no negotiation
    Programmatic,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Generative => "generative",
            SourceKind::Programmatic => "programmatic",
        }
    }
}

/// Registration metadata for a source.
#[derive(Debug, Clone)]
pub struct RegisteredSource {
    pub id: String,
    pub display_name: String,
    pub priority: PriorityClass,
    pub tier: ModelTier,
    pub framed: bool,
    /// Matched against `TriggerEvent::event_type`
    pub trigger: Option<Regex>,
    pub format: FormatOverrides,
    pub kind: SourceKind,
}

impl RegisteredSource {
    pub fn new(id: impl Into<String>, kind: SourceKind) -> Self {
        let id = id.into();
        Self {
            display_name: id.clone(),
            id,
            priority: PriorityClass::Normal,
            tier: ModelTier::Standard,
            framed: true,
            trigger: None,
            format: FormatOverrides::default(),
            kind,
        }
    }

    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    pub fn priority(mut self, priority: PriorityClass) -> Self {
        self.priority = priority;
        self
    }

    pub fn tier(mut self, tier: ModelTier) -> Self {
        self.tier = tier;
        self
    }

    pub fn framed(mut self, framed: bool) -> Self {
        self.framed = framed;
        self
    }

    pub fn trigger(mut self, pattern: Regex) -> Self {
        self.trigger = Some(pattern);
        self
    }

    pub fn format(mut self, format: FormatOverrides) -> Self {
        self.format = format;
        self
    }

    /// Display bounds for this source's text.
    pub fn limits(&self) -> DisplayLimits {
        DisplayLimits::for_source(self.framed, &self.format)
    }

    /// Whether this is a notification source whose trigger matches `event`.
    pub fn matches_event(&self, event: &TriggerEvent) -> bool {
        self.priority == PriorityClass::Notification
            && self
                .trigger
                .as_ref()
                .is_some_and(|pattern| pattern.is_match(&event.event_type))
    }
}

/// Capability every content source implements.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Produce content for one cycle. Generative sources receive the (already decorated)
    /// model; programmatic sources receive `None`.
    async fn generate(
        &self,
        ctx: &GenerationContext,
        model: Option<&dyn ModelProviderClient>,
    ) -> Result<GeneratedContent, ApiError>;

    /// Check proposed text against display bounds.
    fn validate(&self, text: &str, limits: DisplayLimits) -> ValidationResult {
        validate_display_text(text, limits)
    }
}

/// A registered source: metadata plus capability.
#[derive(Clone)]
pub struct SourceEntry {
    pub meta: RegisteredSource,
    pub source: Arc<dyn ContentSource>,
}

impl SourceEntry {
    pub fn new(meta: RegisteredSource, source: Arc<dyn ContentSource>) -> Self {
        Self { meta, source }
    }

    pub fn id(&self) -> &str {
        &self.meta.id
    }
}

impl std::fmt::Debug for SourceEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceEntry").field("meta", &self.meta).finish()
    }
}
