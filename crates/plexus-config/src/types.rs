//! Configuration types

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level host configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HostConfig {
    /// Plugin discovery and startup
    pub plugins: PluginHostConfig,

    /// Log output
    pub logging: LoggingConfig,
}

/// Plugin discovery settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PluginHostConfig {
    /// Directories scanned recursively for manifests
    #[serde(default)]
    pub paths: Vec<PathBuf>,

    /// Manifest file extension, without the dot
    #[serde(default = "default_file_extension")]
    pub file_extension: String,

    /// Plugin the host cannot run without
    #[serde(default = "default_core_plugin")]
    pub core_plugin: String,

    /// Further plugins that must reach Running
    #[serde(default)]
    pub mandatory: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_file_extension() -> String {
    "pluginspec".to_string()
}

fn default_core_plugin() -> String {
    "Core".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for PluginHostConfig {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            file_extension: default_file_extension(),
            core_plugin: default_core_plugin(),
            mandatory: Vec::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl PluginHostConfig {
    /// Core plugin followed by the other mandatory plugins, without repeats
    pub fn required_plugins(&self) -> Vec<String> {
        let mut names = vec![self.core_plugin.clone()];
        for name in &self.mandatory {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = HostConfig::default();
        assert!(config.plugins.paths.is_empty());
        assert_eq!(config.plugins.file_extension, "pluginspec");
        assert_eq!(config.plugins.core_plugin, "Core");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, "text");
    }

    #[test]
    fn test_required_plugins_deduplicates() {
        let plugins = PluginHostConfig {
            mandatory: vec!["Flight".to_string(), "Core".to_string(), "Flight".to_string()],
            ..Default::default()
        };
        assert_eq!(plugins.required_plugins(), vec!["Core", "Flight"]);
    }
}
