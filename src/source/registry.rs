//! Source registry: explicitly constructed, read-mostly table of content sources.

use crate::config::SplitflapConfig;
use crate::error::ApiError;
use crate::provider::ModelTier;
use crate::source::{
    PriorityClass, PromptSource, RegisteredSource, SourceEntry, SourceKind, StaticSource,
    TemplateSource,
};
use crate::validation::FormatOverrides;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Source definition as it appears in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub priority: PriorityClass,
    #[serde(default)]
    pub tier: ModelTier,
    #[serde(default = "default_framed")]
    pub framed: bool,
    /// Regex over the triggering event type; notification sources only
    #[serde(default)]
    pub trigger: Option<String>,
    #[serde(default)]
    pub format: FormatOverrides,
    pub generator: GeneratorConfig,
}

fn default_framed() -> bool {
    true
}

/// How a configured source produces content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GeneratorConfig {
    /// Model-backed prompt pair
    Prompt {
        system_prompt: String,
        user_prompt: String,
    },
    /// Fixed text, optionally pre-gridded
    Static {
        text: String,
        #[serde(default)]
        as_layout: bool,
    },
    /// Event payload rendered into a template
    Template { template: String },
}

impl GeneratorConfig {
    pub fn kind(&self) -> SourceKind {
        match self {
            GeneratorConfig::Prompt { .. } => SourceKind::Generative,
            _ => SourceKind::Programmatic,
        }
    }
}

impl SourceConfig {
    /// Build the registry entry for `id`.
    pub fn build(&self, id: &str) -> Result<SourceEntry, ApiError> {
        let trigger = match &self.trigger {
            Some(pattern) => Some(Regex::new(pattern).map_err(|e| {
                ApiError::ConfigError(format!("Source '{}': invalid trigger: {}", id, e))
            })?),
            None => None,
        };
        if self.priority == PriorityClass::Notification && trigger.is_none() {
            return Err(ApiError::ConfigError(format!(
                "Source '{}': notification sources need a trigger",
                id
            )));
        }

        let mut meta = RegisteredSource::new(id, self.generator.kind())
            .priority(self.priority)
            .tier(self.tier)
            .framed(self.framed)
            .format(self.format);
        meta.trigger = trigger;
        if let Some(name) = &self.display_name {
            meta = meta.display_name(name.clone());
        }

        let source: Arc<dyn crate::source::ContentSource> = match &self.generator {
            GeneratorConfig::Prompt {
                system_prompt,
                user_prompt,
            } => Arc::new(
                PromptSource::new(system_prompt.clone(), user_prompt.clone()).with_tier(self.tier),
            ),
            GeneratorConfig::Static { text, as_layout } => {
                let source = StaticSource::new(text.clone());
                Arc::new(if *as_layout { source.as_layout() } else { source })
            }
            GeneratorConfig::Template { template } => {
                Arc::new(TemplateSource::new(template.clone()))
            }
        };

        Ok(SourceEntry::new(meta, source))
    }
}

/// Registry of content sources, in registration order.
///
/// Built once during startup wiring and passed to the selector and orchestrator.
#[derive(Debug, Default)]
pub struct SourceRegistry {
    entries: Vec<Arc<SourceEntry>>,
    index: HashMap<String, usize>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source. Registering an id twice is a configuration error.
    pub fn register(&mut self, entry: SourceEntry) -> Result<(), ApiError> {
        if self.index.contains_key(entry.id()) {
            return Err(ApiError::DuplicateSource(entry.id().to_string()));
        }
        debug!(
            source = %entry.id(),
            priority = entry.meta.priority.as_str(),
            kind = entry.meta.kind.as_str(),
            "Registered content source"
        );
        self.index.insert(entry.id().to_string(), self.entries.len());
        self.entries.push(Arc::new(entry));
        Ok(())
    }

    /// Get a source by ID
    pub fn get(&self, source_id: &str) -> Option<&Arc<SourceEntry>> {
        self.index.get(source_id).map(|&idx| &self.entries[idx])
    }

    /// Get a source by ID or return an error
    pub fn get_or_error(&self, source_id: &str) -> Result<&Arc<SourceEntry>, ApiError> {
        self.get(source_id)
            .ok_or_else(|| ApiError::UnknownSource(source_id.to_string()))
    }

    /// All sources in registration order
    pub fn list_all(&self) -> Vec<&Arc<SourceEntry>> {
        self.entries.iter().collect()
    }

    /// Sources of one priority class, in registration order
    pub fn list_by_priority(&self, priority: PriorityClass) -> Vec<&Arc<SourceEntry>> {
        self.entries
            .iter()
            .filter(|entry| entry.meta.priority == priority)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Register every source defined in configuration, in id order.
    pub fn load_from_config(&mut self, config: &SplitflapConfig) -> Result<(), ApiError> {
        for (id, source_config) in &config.sources {
            self.register(source_config.build(id)?)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn static_entry(id: &str) -> SourceEntry {
        SourceEntry::new(
            RegisteredSource::new(id, SourceKind::Programmatic),
            Arc::new(StaticSource::new("HI")),
        )
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = SourceRegistry::new();
        registry.register(static_entry("b")).unwrap();
        registry.register(static_entry("a")).unwrap();
        assert_eq!(registry.len(), 2);
        assert!(registry.get("a").is_some());
        let ids: Vec<&str> = registry.list_all().iter().map(|e| e.id()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut registry = SourceRegistry::new();
        registry.register(static_entry("a")).unwrap();
        let err = registry.register(static_entry("a")).unwrap_err();
        assert!(matches!(err, ApiError::DuplicateSource(id) if id == "a"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unknown_source() {
        let registry = SourceRegistry::new();
        assert!(registry.is_empty());
        assert!(matches!(
            registry.get_or_error("nope"),
            Err(ApiError::UnknownSource(_))
        ));
    }

    #[test]
    fn test_source_config_from_toml() {
        let config: SourceConfig = toml::from_str(
            r#"
            display_name = "Doorbell"
            priority = "notification"
            trigger = "^doorbell"
            framed = false

            [generator]
            type = "template"
            template = "{name} IS AT THE DOOR"
            "#,
        )
        .unwrap();
        let entry = config.build("door").unwrap();
        assert_eq!(entry.meta.display_name, "Doorbell");
        assert_eq!(entry.meta.kind, SourceKind::Programmatic);
        assert!(!entry.meta.framed);
        assert!(entry.meta.trigger.is_some());
    }

    #[test]
    fn test_notification_without_trigger_rejected() {
        let config = SourceConfig {
            display_name: None,
            priority: PriorityClass::Notification,
            tier: ModelTier::Light,
            framed: true,
            trigger: None,
            format: FormatOverrides::default(),
            generator: GeneratorConfig::Static {
                text: "HI".to_string(),
                as_layout: false,
            },
        };
        assert!(matches!(config.build("x"), Err(ApiError::ConfigError(_))));
    }

    #[test]
    fn test_invalid_trigger_rejected() {
        let config: SourceConfig = toml::from_str(
            r#"
            priority = "notification"
            trigger = "("
            [generator]
            type = "static"
            text = "HI"
            "#,
        )
        .unwrap();
        assert!(matches!(config.build("x"), Err(ApiError::ConfigError(_))));
    }
}
