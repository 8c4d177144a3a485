//! Configuration loader: builds the layered `config` stack and deserializes it.

use super::merge::merge_policy;
use super::sources::global_file;
use super::SplitflapConfig;
use crate::error::ApiError;
use config::{Environment, File};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Loads `SplitflapConfig` from defaults, files and the environment.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    use_global: bool,
    use_env: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self {
            use_global: true,
            use_env: true,
        }
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip the global config file.
    pub fn without_global(mut self) -> Self {
        self.use_global = false;
        self
    }

    /// Skip `SPLITFLAP__` environment overrides.
    pub fn without_env(mut self) -> Self {
        self.use_env = false;
        self
    }

    /// Load and validate.
    ///
    /// Precedence (highest first): environment, `explicit` file, global file, defaults.
    /// An explicit path that does not exist is an error.
    pub fn load(&self, explicit: Option<&Path>) -> Result<SplitflapConfig, ApiError> {
        let mut builder = merge_policy::builder_with_defaults()?;

        if self.use_global {
            builder = global_file::add_to_builder(builder)?;
        }

        if let Some(path) = explicit {
            if !path.exists() {
                return Err(ApiError::ConfigError(format!(
                    "Configuration file not found: {}",
                    path.display()
                )));
            }
            debug!(config_path = %path.display(), "Loading configuration file");
            builder = builder.add_source(File::from(PathBuf::from(path)).required(true));
        }

        if self.use_env {
            builder = builder.add_source(
                Environment::with_prefix("SPLITFLAP")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );
        }

        let config: SplitflapConfig = builder.build()?.try_deserialize()?;

        config.ensure_valid()?;

        info!(
            providers = config.providers.len(),
            sources = config.sources.len(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Load a single file on top of the defaults, ignoring global file and environment.
    pub fn load_from_file(path: &Path) -> Result<SplitflapConfig, ApiError> {
        Self::new().without_global().without_env().load(Some(path))
    }
}
