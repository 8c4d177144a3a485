//! Configuration System
//!
//! Layered configuration: merge-policy defaults, the global config file, an optional explicit
//! file, then `SPLITFLAP__`-prefixed environment variables. `validate` reports every problem
//! at once.

use crate::auxiliary::{ColorConfig, WeatherConfig};
use crate::charset::ROWS;
use crate::error::ApiError;
use crate::logging::LoggingConfig;
use crate::source::{GeneratorConfig, PriorityClass, SourceConfig};
use crate::validation::{ExhaustionPolicy, ToolLoopConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

pub use crate::provider::{ProviderConfig, ProviderType};

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;
pub use sources::global_file::global_config_path;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SplitflapConfig {
    /// Upstream model providers by name
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderConfig>,

    #[serde(default)]
    pub failover: FailoverConfig,

    /// Content sources by id; registered in id order
    #[serde(default)]
    pub sources: BTreeMap<String, SourceConfig>,

    #[serde(default)]
    pub validation: ValidationConfig,

    #[serde(default)]
    pub frame: FrameConfig,

    #[serde(default)]
    pub display: DisplayConfig,

    #[serde(default)]
    pub persistence: PersistenceConfig,

    #[serde(default)]
    pub timeouts: TimeoutConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Preferred and alternate provider names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FailoverConfig {
    #[serde(default)]
    pub preferred: Option<String>,
    #[serde(default)]
    pub alternate: Option<String>,
}

/// Tool-validation loop settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    #[serde(default)]
    pub exhaustion_policy: ExhaustionPolicy,
}

fn default_max_attempts() -> usize {
    3
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            exhaustion_policy: ExhaustionPolicy::default(),
        }
    }
}

/// Frame features.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameConfig {
    /// Offset applied to the cycle timestamp for the info row
    #[serde(default)]
    pub utc_offset_minutes: i32,
    #[serde(default)]
    pub weather: Option<WeatherConfig>,
    #[serde(default)]
    pub color: Option<ColorConfig>,
}

/// Physical display endpoint. Without an endpoint, layouts print to the console.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Generation record destination.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// JSON-lines file; records are dropped when unset
    #[serde(default)]
    pub records_path: Option<PathBuf>,
}

/// Per-call timeouts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Upstream model and display requests
    #[serde(default = "default_request_secs")]
    pub request_secs: u64,
    /// Weather and palette fetches
    #[serde(default = "default_aux_secs")]
    pub aux_secs: u64,
}

fn default_request_secs() -> u64 {
    60
}

fn default_aux_secs() -> u64 {
    5
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: default_request_secs(),
            aux_secs: default_aux_secs(),
        }
    }
}

impl TimeoutConfig {
    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }

    pub fn aux(&self) -> Duration {
        Duration::from_secs(self.aux_secs)
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    Provider(String, String),
    Source(String, String),
    Failover(String),
    System(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Provider(name, msg) => write!(f, "Provider '{}': {}", name, msg),
            ValidationError::Source(name, msg) => write!(f, "Source '{}': {}", name, msg),
            ValidationError::Failover(msg) => write!(f, "Failover: {}", msg),
            ValidationError::System(msg) => write!(f, "System: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl SplitflapConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        for (name, provider) in &self.providers {
            if let Err(e) = provider.validate() {
                errors.push(ValidationError::Provider(name.clone(), e));
            }
        }

        for (role, name) in [
            ("preferred", &self.failover.preferred),
            ("alternate", &self.failover.alternate),
        ] {
            if let Some(name) = name {
                if !self.providers.contains_key(name) {
                    errors.push(ValidationError::Failover(format!(
                        "{} provider '{}' is not defined",
                        role, name
                    )));
                }
            }
        }
        if self.failover.preferred.is_some() && self.failover.preferred == self.failover.alternate
        {
            errors.push(ValidationError::Failover(
                "alternate provider must differ from the preferred one".to_string(),
            ));
        }
        if self.failover.preferred.is_none() && self.failover.alternate.is_some() {
            errors.push(ValidationError::Failover(
                "alternate provider set without a preferred one".to_string(),
            ));
        }

        for (id, source) in &self.sources {
            if let Err(e) = source.build(id) {
                errors.push(ValidationError::Source(id.clone(), e.to_string()));
            }
            if matches!(source.generator, GeneratorConfig::Prompt { .. })
                && self.failover.preferred.is_none()
            {
                errors.push(ValidationError::Source(
                    id.clone(),
                    "prompt sources need failover.preferred".to_string(),
                ));
            }
        }
        if !self.sources.is_empty()
            && !self
                .sources
                .values()
                .any(|s| s.priority == PriorityClass::Normal)
        {
            errors.push(ValidationError::System(
                "at least one normal-priority source is required".to_string(),
            ));
        }

        if self.validation.max_attempts == 0 {
            errors.push(ValidationError::System(
                "validation.max_attempts must be at least 1".to_string(),
            ));
        }
        if let Some(color) = &self.frame.color {
            if color.palette.len() != ROWS {
                errors.push(ValidationError::System(format!(
                    "frame.color.palette needs {} colors, got {}",
                    ROWS,
                    color.palette.len()
                )));
            }
        }
        if self.frame.utc_offset_minutes.unsigned_abs() > 14 * 60 {
            errors.push(ValidationError::System(format!(
                "frame.utc_offset_minutes out of range: {}",
                self.frame.utc_offset_minutes
            )));
        }
        if self.timeouts.request_secs == 0 || self.timeouts.aux_secs == 0 {
            errors.push(ValidationError::System(
                "timeouts must be at least one second".to_string(),
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// `validate`, folded into a single configuration error.
    pub fn ensure_valid(&self) -> Result<(), ApiError> {
        self.validate().map_err(|errors| {
            let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            ApiError::ConfigError(format!(
                "Configuration validation failed:\n  {}",
                messages.join("\n  ")
            ))
        })
    }

    /// Tool-loop settings for the failover coordinator.
    pub fn tool_loop(&self) -> ToolLoopConfig {
        ToolLoopConfig {
            max_attempts: self.validation.max_attempts,
            exhaustion_policy: self.validation.exhaustion_policy,
            request_timeout: self.timeouts.request(),
        }
    }
}
