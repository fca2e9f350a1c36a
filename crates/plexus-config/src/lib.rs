//! # Plexus Configuration
//!
//! Host configuration with support for:
//! - Multiple formats (YAML, TOML, JSON)
//! - Environment variable expansion
//! - Layered files
//! - Validation
//! - Default values

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod builder;
pub mod error;
pub mod loader;
pub mod merger;
pub mod types;
pub mod validator;

pub use builder::ConfigBuilder;
pub use error::{ConfigError, Result};
pub use loader::{load_and_merge, load_config, load_from_file, load_from_str};
pub use merger::merge_configs;
pub use types::{HostConfig, LoggingConfig, PluginHostConfig};
pub use validator::validate_config;

use std::path::Path;

/// Load and validate configuration from a file
pub fn load<P: AsRef<Path>>(path: P) -> Result<HostConfig> {
    load_config(path)
}

/// Load configuration from a string
pub fn load_str(content: &str, format: ConfigFormat) -> Result<HostConfig> {
    load_from_str(content, format)
}

/// Configuration format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML format
    Yaml,
    /// TOML format
    Toml,
    /// JSON format
    Json,
}

impl ConfigFormat {
    /// Detect format from file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .ok_or_else(|| ConfigError::UnsupportedFormat(path.display().to_string()))?;

        match ext {
            "yaml" | "yml" => Ok(ConfigFormat::Yaml),
            "toml" => Ok(ConfigFormat::Toml),
            "json" => Ok(ConfigFormat::Json),
            _ => Err(ConfigError::UnsupportedFormat(ext.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_detect_format_from_path() {
        assert_eq!(
            ConfigFormat::from_path(&PathBuf::from("host.yml")).unwrap(),
            ConfigFormat::Yaml
        );
        assert_eq!(
            ConfigFormat::from_path(&PathBuf::from("host.toml")).unwrap(),
            ConfigFormat::Toml
        );
        assert_eq!(
            ConfigFormat::from_path(&PathBuf::from("host.json")).unwrap(),
            ConfigFormat::Json
        );
    }

    #[test]
    fn test_unsupported_format() {
        let err = ConfigFormat::from_path(&PathBuf::from("host.ini")).unwrap_err();
        assert_eq!(err.to_string(), "Unsupported config format: ini");
        assert!(ConfigFormat::from_path(&PathBuf::from("hostrc")).is_err());
    }
}
