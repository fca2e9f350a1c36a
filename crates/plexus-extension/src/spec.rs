//! Plugin records and their state lattice

use crate::error::{ExtensionError, Result};
use crate::loader::PluginInstance;
use crate::manifest::Manifest;
use crate::version::PluginVersion;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Lifecycle state of a plugin record
///
/// States only ever move forward. A record that fails keeps the state it
/// had reached and is marked with an error instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum PluginState {
    /// The manifest could not be read
    Invalid,
    /// The manifest was read successfully
    Read,
    /// All dependencies were found and ordered
    Resolved,
    /// The module was loaded and the plugin instance created
    Loaded,
    /// `initialize` succeeded
    Initialized,
    /// `extensions_initialized` was called
    Running,
    /// `about_to_shutdown` was called
    Stopped,
    /// The instance has been released
    Deleted,
}

impl fmt::Display for PluginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Invalid => "Invalid",
            Self::Read => "Read",
            Self::Resolved => "Resolved",
            Self::Loaded => "Loaded",
            Self::Initialized => "Initialized",
            Self::Running => "Running",
            Self::Stopped => "Stopped",
            Self::Deleted => "Deleted",
        };
        f.write_str(s)
    }
}

/// One discovered plugin: manifest, lifecycle state and instance
#[derive(Debug)]
pub struct PluginSpec {
    location: PathBuf,
    manifest: Option<Manifest>,
    state: PluginState,
    error: Option<ExtensionError>,
    disabled: bool,
    dependency_specs: Vec<usize>,
    pub(crate) arguments: Vec<String>,
    pub(crate) instance: Option<PluginInstance>,
}

impl PluginSpec {
    /// Read a manifest file into a new record
    ///
    /// Never fails: a manifest that cannot be read yields an `Invalid`
    /// record carrying the error.
    pub fn read(path: &Path) -> Self {
        match Manifest::read(path) {
            Ok(manifest) => Self::from_manifest(manifest, path),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Failed to read plugin manifest");
                Self::invalid(path, err)
            }
        }
    }

    /// Create a `Read` record from an already parsed manifest
    pub fn from_manifest(manifest: Manifest, location: impl Into<PathBuf>) -> Self {
        Self {
            location: location.into(),
            manifest: Some(manifest),
            state: PluginState::Read,
            error: None,
            disabled: false,
            dependency_specs: Vec::new(),
            arguments: Vec::new(),
            instance: None,
        }
    }

    /// Create an `Invalid` record
    pub fn invalid(location: impl Into<PathBuf>, error: ExtensionError) -> Self {
        Self {
            location: location.into(),
            manifest: None,
            state: PluginState::Invalid,
            error: Some(error),
            disabled: false,
            dependency_specs: Vec::new(),
            arguments: Vec::new(),
            instance: None,
        }
    }

    /// Turn a record that was never registered into an `Invalid` one
    pub(crate) fn into_invalid(mut self, error: ExtensionError) -> Self {
        warn!(plugin = %self.name(), error = %error, "Rejecting plugin manifest");
        self.state = PluginState::Invalid;
        self.error = Some(error);
        self
    }

    /// Plugin name, empty if the manifest could not be read
    pub fn name(&self) -> &str {
        self.manifest.as_ref().map_or("", |m| m.name.as_str())
    }

    /// Plugin version as written, empty if the manifest could not be read
    pub fn version(&self) -> &str {
        self.manifest.as_ref().map_or("", |m| m.version.as_str())
    }

    /// Parsed manifest
    pub fn manifest(&self) -> Option<&Manifest> {
        self.manifest.as_ref()
    }

    /// Path of the manifest file
    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Path of the module to load
    ///
    /// Relative module paths are resolved against the manifest's directory;
    /// without a `<module>` element the platform library name is used.
    pub fn library_path(&self) -> Option<PathBuf> {
        let manifest = self.manifest.as_ref()?;
        let dir = self.location.parent().unwrap_or_else(|| Path::new(""));
        Some(match &manifest.module {
            Some(module) => dir.join(module),
            None => dir.join(libloading::library_filename(&manifest.name)),
        })
    }

    /// Re-emit the manifest as XML
    pub fn to_manifest(&self) -> Option<String> {
        self.manifest.as_ref().map(Manifest::to_xml)
    }

    /// Current state
    pub fn state(&self) -> PluginState {
        self.state
    }

    /// First error recorded on this plugin
    pub fn error(&self) -> Option<&ExtensionError> {
        self.error.as_ref()
    }

    /// First error recorded on this plugin, rendered
    pub fn error_string(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }

    /// Whether an error was recorded
    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// Whether the plugin was excluded with `-noload`
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Whether the lifecycle stops advancing this record
    pub fn is_frozen(&self) -> bool {
        self.has_error() || self.disabled || self.state == PluginState::Invalid
    }

    /// Indices of the resolved dependencies, in manifest order
    pub fn dependency_specs(&self) -> &[usize] {
        &self.dependency_specs
    }

    /// Plugin-specific command-line arguments
    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    /// Whether a live plugin instance is held
    pub fn has_instance(&self) -> bool {
        self.instance.is_some()
    }

    /// Whether this plugin satisfies a dependency on `name` at `version`
    ///
    /// The names must match exactly and the requested version must lie
    /// between the manifest's `compatVersion` and `version`, inclusive.
    pub fn provides(&self, name: &str, version: &PluginVersion) -> bool {
        match &self.manifest {
            Some(m) if self.state != PluginState::Invalid => {
                m.name == name && m.compat_version <= *version && *version <= m.version
            }
            _ => false,
        }
    }

    /// Render the dependency failure reason seen by dependents
    pub(crate) fn failure_reason(&self) -> String {
        match &self.error {
            Some(err) => err.to_string(),
            None if self.disabled => crate::error::DISABLED_BY_COMMAND_LINE.to_string(),
            None => format!("state is {}", self.state),
        }
    }

    pub(crate) fn set_disabled(&mut self, disabled: bool) {
        self.disabled = disabled;
    }

    pub(crate) fn set_dependency_specs(&mut self, deps: Vec<usize>) {
        self.dependency_specs = deps;
    }

    /// Move to a later state
    pub(crate) fn advance(&mut self, state: PluginState) {
        debug_assert!(
            state > self.state,
            "plugin state must move forward ({} -> {})",
            self.state,
            state
        );
        self.state = state;
    }

    /// Record an error, keeping the first one if several occur
    pub(crate) fn fail(&mut self, error: ExtensionError) {
        if error.is_internal() {
            tracing::error!(plugin = %self.name(), error = %error, "Plugin lifecycle violated");
        } else {
            warn!(plugin = %self.name(), error = %error, "Plugin failed");
        }
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    /// Require the given state before performing `action`
    pub(crate) fn expect_state(&self, state: PluginState, action: &str) -> Result<()> {
        if self.state == state {
            Ok(())
        } else {
            Err(ExtensionError::state_precondition(format!(
                "{action} because state != {state}"
            )))
        }
    }

    /// Serializable view of this record
    pub fn snapshot(&self) -> PluginSnapshot {
        let manifest = self.manifest.as_ref();
        PluginSnapshot {
            name: self.name().to_string(),
            version: self.version().to_string(),
            compat_version: manifest.map(|m| m.compat_version.to_string()).unwrap_or_default(),
            vendor: manifest.map(|m| m.vendor.clone()).unwrap_or_default(),
            description: manifest.map(|m| m.description.clone()).unwrap_or_default(),
            location: self.location.display().to_string(),
            state: self.state,
            disabled: self.disabled,
            dependencies: manifest
                .map(|m| {
                    m.dependencies
                        .iter()
                        .map(|d| format!("{}({})", d.name, d.version))
                        .collect()
                })
                .unwrap_or_default(),
            error_string: self.error_string(),
        }
    }
}

/// Serializable summary of a plugin record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginSnapshot {
    /// Plugin name
    pub name: String,
    /// Plugin version
    pub version: String,
    /// Compatibility version
    pub compat_version: String,
    /// Vendor
    pub vendor: String,
    /// Description
    pub description: String,
    /// Manifest path
    pub location: String,
    /// Lifecycle state
    pub state: PluginState,
    /// Excluded with `-noload`
    pub disabled: bool,
    /// Declared dependencies as `name(version)`
    pub dependencies: Vec<String>,
    /// First recorded error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_string: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::PluginDependency;

    fn v(text: &str) -> PluginVersion {
        PluginVersion::parse(text).unwrap()
    }

    fn spec(name: &str, version: &str, compat: &str) -> PluginSpec {
        let mut manifest = Manifest::new(name, v(version));
        manifest.compat_version = v(compat);
        PluginSpec::from_manifest(manifest, format!("/plugins/{name}.pluginspec"))
    }

    #[test]
    fn test_state_order() {
        assert!(PluginState::Invalid < PluginState::Read);
        assert!(PluginState::Read < PluginState::Resolved);
        assert!(PluginState::Running < PluginState::Stopped);
        assert!(PluginState::Stopped < PluginState::Deleted);
    }

    #[test]
    fn test_provides_version_window() {
        let core = spec("Core", "1.5", "1.0");

        assert!(core.provides("Core", &v("1.0")));
        assert!(core.provides("Core", &v("1.2.3")));
        assert!(core.provides("Core", &v("1.5.0")));
        assert!(!core.provides("Core", &v("0.9")));
        assert!(!core.provides("Core", &v("1.6")));
        assert!(!core.provides("core", &v("1.0")));
    }

    #[test]
    fn test_invalid_record_provides_nothing() {
        let record = PluginSpec::invalid(
            "/plugins/Broken.pluginspec",
            ExtensionError::InvalidFormat("version".to_string()),
        );

        assert_eq!(record.state(), PluginState::Invalid);
        assert!(record.is_frozen());
        assert_eq!(record.name(), "");
        assert!(!record.provides("", &v("1.0")));
        assert_eq!(record.error_string().unwrap(), "'version' has invalid format");
    }

    #[test]
    fn test_fail_keeps_first_error() {
        let mut record = spec("A", "1.0", "1.0");
        assert!(!record.is_frozen());

        record.fail(ExtensionError::InitFailure("first".to_string()));
        record.fail(ExtensionError::InitFailure("second".to_string()));

        assert!(record.is_frozen());
        assert_eq!(record.error_string().unwrap(), "Plugin initialization failed: first");
        assert_eq!(record.state(), PluginState::Read);
    }

    #[test]
    fn test_disabled_reason() {
        let mut record = spec("A", "1.0", "1.0");
        record.set_disabled(true);

        assert!(record.is_frozen());
        assert!(!record.has_error());
        assert_eq!(record.failure_reason(), "disabled by command line");
    }

    #[test]
    fn test_expect_state_message() {
        let record = spec("A", "1.0", "1.0");
        let err = record
            .expect_state(PluginState::Resolved, "Loading the library failed")
            .unwrap_err();
        assert_eq!(err.to_string(), "Loading the library failed because state != Resolved");
        assert!(err.is_internal());
    }

    #[test]
    fn test_library_path() {
        let mut manifest = Manifest::new("Flight", v("1.0"));
        let record = PluginSpec::from_manifest(manifest.clone(), "/opt/plugins/Flight.pluginspec");
        assert_eq!(
            record.library_path().unwrap(),
            Path::new("/opt/plugins").join(libloading::library_filename("Flight"))
        );

        manifest.module = Some("lib/libflight.so".to_string());
        let record = PluginSpec::from_manifest(manifest, "/opt/plugins/Flight.pluginspec");
        assert_eq!(
            record.library_path().unwrap(),
            Path::new("/opt/plugins/lib/libflight.so")
        );
    }

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let mut manifest = Manifest::new("Widgets", v("1.0"));
        manifest
            .dependencies
            .push(PluginDependency::new("Core", v("1.0")));
        let mut record = PluginSpec::from_manifest(manifest, "/p/Widgets.pluginspec");
        record.fail(ExtensionError::unresolved("Core", "1.0"));

        let json = serde_json::to_value(record.snapshot()).unwrap();
        assert_eq!(json["name"], "Widgets");
        assert_eq!(json["compatVersion"], "1.0");
        assert_eq!(json["state"], "Read");
        assert_eq!(json["dependencies"][0], "Core(1.0)");
        assert_eq!(json["errorString"], "Could not resolve dependency 'Core(1.0)'");
    }
}
