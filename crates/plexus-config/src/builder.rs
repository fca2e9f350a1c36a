//! Configuration builder

use crate::error::Result;
use crate::types::HostConfig;
use std::path::PathBuf;

/// Builder for constructing configuration programmatically
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: HostConfig,
}

impl ConfigBuilder {
    /// Create a builder seeded with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration
    pub fn from_config(config: HostConfig) -> Self {
        Self { config }
    }

    /// Add a plugin search directory
    pub fn plugin_path(mut self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if !self.config.plugins.paths.contains(&path) {
            self.config.plugins.paths.push(path);
        }
        self
    }

    /// Set the manifest file extension
    pub fn file_extension(mut self, extension: impl Into<String>) -> Self {
        self.config.plugins.file_extension = extension.into();
        self
    }

    /// Set the core plugin name
    pub fn core_plugin(mut self, name: impl Into<String>) -> Self {
        self.config.plugins.core_plugin = name.into();
        self
    }

    /// Require a plugin to reach Running
    pub fn mandatory(mut self, name: impl Into<String>) -> Self {
        self.config.plugins.mandatory.push(name.into());
        self
    }

    /// Set the log level
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    /// Set the log format
    pub fn log_format(mut self, format: impl Into<String>) -> Self {
        self.config.logging.format = format.into();
        self
    }

    /// Validate and build the configuration
    pub fn build(self) -> Result<HostConfig> {
        crate::validator::validate_config(&self.config)?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::new()
            .plugin_path("plugins")
            .plugin_path("plugins")
            .core_plugin("Kernel")
            .mandatory("Welcome")
            .log_level("debug")
            .build()
            .unwrap();

        assert_eq!(config.plugins.paths, vec![PathBuf::from("plugins")]);
        assert_eq!(config.plugins.core_plugin, "Kernel");
        assert_eq!(config.plugins.mandatory, vec!["Welcome"]);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_from_config_overrides() {
        let base = HostConfig::default();
        let config = ConfigBuilder::from_config(base)
            .log_format("json")
            .build()
            .unwrap();
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_builder_rejects_invalid() {
        let result = ConfigBuilder::new().file_extension("").build();
        assert!(result.is_err());
    }
}
