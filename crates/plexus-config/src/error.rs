//! Configuration errors

use std::path::PathBuf;

/// Result type alias using [`ConfigError`]
pub type Result<T, E = ConfigError> = std::result::Result<T, E>;

/// Errors raised while loading or validating host configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        /// File that failed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The file extension does not name a known format
    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),

    /// The document failed to deserialize
    #[error("Failed to parse {format}: {message}")]
    Parse {
        /// Format name
        format: &'static str,
        /// Deserializer message
        message: String,
    },

    /// `${VAR}` referenced an unset variable with no default
    #[error("Environment variable '{0}' not set and no default provided")]
    MissingEnvVar(String),

    /// A value failed validation
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    /// Create a validation error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}
