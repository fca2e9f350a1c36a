//! Plugin error types

use std::fmt;

/// Error returned by a plugin from its lifecycle hooks
///
/// The host records the `Display` text verbatim on the plugin's record, so
/// messages should read well on their own.
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    /// Generic failure with a plugin-provided message
    #[error("{0}")]
    Failed(String),

    /// A command-line argument passed to the plugin was not understood
    #[error("Invalid argument '{argument}': {reason}")]
    InvalidArgument {
        /// The offending `key=value` string
        argument: String,
        /// Why it was rejected
        reason: String,
    },

    /// An object the plugin needs was not found in the object pool
    #[error("Required object '{0}' is not registered")]
    MissingObject(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for plugin operations
pub type Result<T> = std::result::Result<T, PluginError>;

impl PluginError {
    /// Create a new generic failure
    pub fn failed(msg: impl fmt::Display) -> Self {
        Self::Failed(msg.to_string())
    }

    /// Create a new invalid argument error
    pub fn invalid_argument(argument: impl fmt::Display, reason: impl fmt::Display) -> Self {
        Self::InvalidArgument {
            argument: argument.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create a new missing object error
    pub fn missing_object(name: impl fmt::Display) -> Self {
        Self::MissingObject(name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = PluginError::failed("test");
        assert!(matches!(err, PluginError::Failed(_)));

        let err = PluginError::invalid_argument("color=red", "unknown color");
        assert!(matches!(err, PluginError::InvalidArgument { .. }));

        let err = PluginError::missing_object("core.modes");
        assert!(matches!(err, PluginError::MissingObject(_)));
    }

    #[test]
    fn test_error_display() {
        let err = PluginError::failed("boom");
        assert_eq!(err.to_string(), "boom");

        let err = PluginError::invalid_argument("color=red", "unknown color");
        assert_eq!(err.to_string(), "Invalid argument 'color=red': unknown color");
    }
}
