//! CLI subcommands.

pub mod catalog;
pub mod run;

use adpilot_config::{AppConfig, ConfigError};
use std::path::Path;

/// Load the config from `path`, or from the default location.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    match path {
        Some(path) => AppConfig::load_with_env(path),
        None => AppConfig::load(),
    }
}
