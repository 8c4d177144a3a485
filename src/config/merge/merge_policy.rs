//! Merge rules: defaults first, then global file, explicit file, environment.

use config::builder::DefaultState;
use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("validation.max_attempts", 3)?
        .set_default("validation.exhaustion_policy", "raise")?
        .set_default("timeouts.request_secs", 60)?
        .set_default("timeouts.aux_secs", 5)?
        .set_default("frame.utc_offset_minutes", 0)?
        .set_default("logging.level", "info")?
        .set_default("logging.format", "text")?
        .set_default("logging.output", "stderr")
}
