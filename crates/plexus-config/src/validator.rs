//! Configuration validation

use crate::error::{ConfigError, Result};
use crate::HostConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
const LOG_FORMATS: &[&str] = &["text", "json"];

/// Validate configuration
pub fn validate_config(config: &HostConfig) -> Result<()> {
    validate_plugins(config)?;
    validate_logging(config)?;
    Ok(())
}

fn validate_plugins(config: &HostConfig) -> Result<()> {
    let plugins = &config.plugins;

    if plugins.file_extension.is_empty() {
        return Err(ConfigError::invalid("plugins.file_extension cannot be empty"));
    }
    if plugins.file_extension.starts_with('.') {
        return Err(ConfigError::invalid(format!(
            "plugins.file_extension must not start with a dot: {}",
            plugins.file_extension
        )));
    }
    if plugins.core_plugin.is_empty() {
        return Err(ConfigError::invalid("plugins.core_plugin cannot be empty"));
    }
    if plugins.mandatory.iter().any(String::is_empty) {
        return Err(ConfigError::invalid("plugins.mandatory contains an empty name"));
    }

    if plugins.paths.is_empty() {
        tracing::warn!("No plugin paths configured");
    }
    for path in &plugins.paths {
        if !path.is_dir() {
            tracing::warn!(path = %path.display(), "Plugin path is not a directory");
        }
    }

    Ok(())
}

fn validate_logging(config: &HostConfig) -> Result<()> {
    let level = config.logging.level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        return Err(ConfigError::invalid(format!(
            "Invalid log level: {} (must be one of {})",
            config.logging.level,
            LOG_LEVELS.join(", ")
        )));
    }

    if !LOG_FORMATS.contains(&config.logging.format.as_str()) {
        return Err(ConfigError::invalid(format!(
            "Invalid log format: {} (must be text or json)",
            config.logging.format
        )));
    }

    Ok(())
}
