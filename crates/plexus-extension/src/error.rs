//! Extension system error types

use std::fmt;

/// Reason reported to dependents of a plugin disabled with `-noload`
pub const DISABLED_BY_COMMAND_LINE: &str = "disabled by command line";

/// `name(version)` pair identifying a plugin in messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginRef {
    /// Plugin name
    pub name: String,
    /// Plugin version as written in the manifest
    pub version: String,
}

impl PluginRef {
    /// Create a new reference
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for PluginRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.version)
    }
}

fn format_chain(chain: &[PluginRef]) -> String {
    chain
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" depends on ")
}

/// Extension system error type
///
/// Every variant except [`ExtensionError::StatePrecondition`] and
/// [`ExtensionError::MissingInstance`] describes a user-facing condition and
/// is recorded verbatim on the affected plugin record.
#[derive(Debug, thiserror::Error)]
pub enum ExtensionError {
    /// Malformed XML
    #[error("Error parsing file {file}: {message}, at line {line}, column {column}")]
    Parse {
        /// Manifest path
        file: String,
        /// 1-based line
        line: u32,
        /// 1-based column
        column: u32,
        /// Parser message
        message: String,
    },

    /// Root element is not `<plugin>`
    #[error("Expected element '{0}' as top level element")]
    UnexpectedRootElement(String),

    /// Required attribute absent
    #[error("'{element}' misses attribute '{attribute}'")]
    MissingAttribute {
        /// Element name
        element: String,
        /// Attribute name
        attribute: String,
    },

    /// Attribute value malformed (e.g. a version string)
    #[error("'{0}' has invalid format")]
    InvalidFormat(String),

    /// Element not allowed at this position
    #[error("Error parsing file {file}: Invalid element '{element}', at line {line}, column {column}")]
    InvalidElement {
        /// Manifest path
        file: String,
        /// 1-based line
        line: u32,
        /// 1-based column
        column: u32,
        /// Element name
        element: String,
    },

    /// Non-whitespace text where only elements are allowed
    #[error("Error parsing file {file}: Unexpected token, at line {line}, column {column}")]
    UnexpectedToken {
        /// Manifest path
        file: String,
        /// 1-based line
        line: u32,
        /// 1-based column
        column: u32,
    },

    /// Two manifests declare the same plugin name
    #[error("Plugin '{name}' is already provided by {location}")]
    DuplicatePlugin {
        /// Plugin name
        name: String,
        /// Manifest of the plugin that was registered first
        location: String,
    },

    /// No plugin with a compatible version provides the dependency
    #[error("Could not resolve dependency '{name}({version})'")]
    UnresolvedDependency {
        /// Dependency name
        name: String,
        /// Required version
        version: String,
    },

    /// Dependency cycle, first element repeated at the end
    #[error("Circular dependency detected: {}", format_chain(.chain))]
    CircularDependency {
        /// Plugins on the cycle in dependency order
        chain: Vec<PluginRef>,
    },

    /// The module could not be loaded
    #[error("Could not load library: {0}")]
    LoadFailure(String),

    /// The module does not export a compatible declaration
    #[error("Plugin is not valid (does not derive from the plugin interface)")]
    InvalidPluginType,

    /// `initialize` returned an error
    #[error("Plugin initialization failed: {0}")]
    InitFailure(String),

    /// A dependency froze before reaching the stage this plugin needs
    #[error("Cannot load plugin because dependency failed to load: {name}({version}) Reason: {reason}")]
    DependencyFailed {
        /// Dependency name
        name: String,
        /// Dependency version
        version: String,
        /// The dependency's own error, chained verbatim
        reason: String,
    },

    /// Lifecycle step invoked from the wrong state (programmer error)
    #[error("{0}")]
    StatePrecondition(String),

    /// Record reached a stage without an instance (programmer error)
    #[error("Internal error: have no plugin instance to {0}")]
    MissingInstance(&'static str),

    /// `-test` named an unknown plugin
    #[error("Invalid test option, the plugin '{0}' does not exist.")]
    InvalidTestOption(String),

    /// `-noload` named an unknown plugin
    #[error("Invalid no-load option, the plugin '{0}' does not exist.")]
    InvalidNoLoadOption(String),

    /// `-pluginoption` matched no plugin
    #[error("No Plugin was found for given argument: {0}")]
    UnknownPluginArgument(String),

    /// A plugin the host cannot run without was not discovered
    #[error("Could not find '{name}.pluginspec' in {paths}")]
    RequiredPluginMissing {
        /// Plugin name
        name: String,
        /// Searched directories, comma separated
        paths: String,
    },

    /// A plugin the host cannot run without failed
    #[error("{reason}")]
    RequiredPluginFailed {
        /// Plugin name
        name: String,
        /// The plugin's own error
        reason: String,
    },

    /// Manifest could not be read
    #[error("Cannot open file {path} for reading: {source}")]
    Io {
        /// File path
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Result type for extension system operations
pub type Result<T> = std::result::Result<T, ExtensionError>;

impl ExtensionError {
    /// Create a new state precondition error
    pub fn state_precondition(msg: impl fmt::Display) -> Self {
        Self::StatePrecondition(msg.to_string())
    }

    /// Create a new unresolved dependency error
    pub fn unresolved(name: impl fmt::Display, version: impl fmt::Display) -> Self {
        Self::UnresolvedDependency {
            name: name.to_string(),
            version: version.to_string(),
        }
    }

    /// Create a new propagated dependency failure
    pub fn dependency_failed(
        name: impl fmt::Display,
        version: impl fmt::Display,
        reason: impl fmt::Display,
    ) -> Self {
        Self::DependencyFailed {
            name: name.to_string(),
            version: version.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Whether this error signals a bug in the caller rather than a broken plugin
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::StatePrecondition(_) | Self::MissingInstance(_))
    }
}
