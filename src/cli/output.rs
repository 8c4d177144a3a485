//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::ApiError;

/// Map domain errors to a string for CLI output.
pub fn map_error(e: &ApiError) -> String {
    if e.is_configuration_error() {
        format!("{}\nCheck the configuration file or SPLITFLAP__ environment overrides.", e)
    } else {
        e.to_string()
    }
}
