//! Plugin manager owning the registry for the lifetime of the host

use crate::error::{ExtensionError, Result};
use crate::lifecycle::LifecycleCoordinator;
use crate::loader::PluginLoader;
use crate::manifest::Manifest;
use crate::options::{self, CommandLineOptions, TestSelection};
use crate::resolver;
use crate::spec::{PluginSnapshot, PluginSpec, PluginState};
use plexus_plugin_api::ObjectPool;
use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Default manifest file extension
pub const DEFAULT_FILE_EXTENSION: &str = "pluginspec";

/// Plugin manager for the whole plugin pipeline
///
/// Owns every [`PluginSpec`], the load order and the shared [`ObjectPool`].
/// The expected call sequence is:
///
/// 1. [`set_plugin_paths`](Self::set_plugin_paths) (or
///    [`add_manifest`](Self::add_manifest) + [`resolve`](Self::resolve))
/// 2. [`parse_options`](Self::parse_options)
/// 3. [`load_plugins`](Self::load_plugins)
/// 4. [`shutdown`](Self::shutdown), also run on drop
#[derive(Debug)]
pub struct PluginManager {
    specs: Vec<PluginSpec>,
    queue: Vec<usize>,
    objects: ObjectPool,
    loader: PluginLoader,
    file_extension: String,
    plugin_paths: Vec<PathBuf>,
    test_selection: TestSelection,
    started: bool,
    shut_down: bool,
}

impl PluginManager {
    /// Create a manager loading plugins from shared libraries
    pub fn new() -> Self {
        Self::with_loader(PluginLoader::new())
    }

    /// Create a manager with a custom loader
    pub fn with_loader(loader: PluginLoader) -> Self {
        Self {
            specs: Vec::new(),
            queue: Vec::new(),
            objects: ObjectPool::new(),
            loader,
            file_extension: DEFAULT_FILE_EXTENSION.to_string(),
            plugin_paths: Vec::new(),
            test_selection: TestSelection::None,
            started: false,
            shut_down: false,
        }
    }

    /// Get the loader
    pub fn loader(&self) -> &PluginLoader {
        &self.loader
    }

    /// Manifest file extension, without the dot
    pub fn file_extension(&self) -> &str {
        &self.file_extension
    }

    /// Set the manifest file extension used by discovery
    pub fn set_file_extension(&mut self, extension: impl Into<String>) {
        self.file_extension = extension.into();
    }

    /// Directories searched for manifests
    pub fn plugin_paths(&self) -> &[PathBuf] {
        &self.plugin_paths
    }

    /// Discover, read and resolve every manifest below `paths`
    pub fn set_plugin_paths<P: AsRef<Path>>(&mut self, paths: &[P]) {
        self.plugin_paths = paths.iter().map(|p| p.as_ref().to_path_buf()).collect();

        let mut files = Vec::new();
        for path in &self.plugin_paths {
            collect_manifests(path, &self.file_extension, &mut files);
        }
        info!(
            paths = self.plugin_paths.len(),
            manifests = files.len(),
            "Discovered plugin manifests"
        );

        for file in files {
            self.add_spec(PluginSpec::read(&file));
        }
        self.resolve();
    }

    /// Register an already parsed manifest, returning its index
    pub fn add_manifest(&mut self, manifest: Manifest, location: impl Into<PathBuf>) -> usize {
        self.add_spec(PluginSpec::from_manifest(manifest, location))
    }

    /// Register a record, returning its index
    ///
    /// A record whose name is already taken is registered as `Invalid`.
    pub fn add_spec(&mut self, spec: PluginSpec) -> usize {
        let spec = match self.existing(&spec) {
            Some(existing) => {
                let err = ExtensionError::DuplicatePlugin {
                    name: spec.name().to_string(),
                    location: existing.location().display().to_string(),
                };
                spec.into_invalid(err)
            }
            None => spec,
        };
        debug!(plugin = %spec.name(), state = %spec.state(), "Registered plugin record");
        self.specs.push(spec);
        self.specs.len() - 1
    }

    fn existing(&self, spec: &PluginSpec) -> Option<&PluginSpec> {
        if spec.state() == PluginState::Invalid {
            return None;
        }
        self.specs
            .iter()
            .find(|s| s.state() != PluginState::Invalid && s.name() == spec.name())
    }

    /// Resolve dependencies of every `Read` record and rebuild the load order
    pub fn resolve(&mut self) {
        self.queue = resolver::resolve(&mut self.specs);
    }

    /// Apply `-noload`, `-test` and `-pluginoption` directives
    pub fn parse_options(
        &mut self,
        options: &CommandLineOptions,
    ) -> std::result::Result<(), Vec<ExtensionError>> {
        let errors = options::apply(&mut self.specs, options, &mut self.test_selection);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Plugins selected for self-testing
    pub fn test_selection(&self) -> &TestSelection {
        &self.test_selection
    }

    /// Load, initialize and start every eligible plugin
    ///
    /// Only the first call has any effect.
    pub fn load_plugins(&mut self) {
        if self.started {
            warn!("Plugins were already loaded");
            return;
        }
        self.started = true;

        info!(plugins = self.queue.len(), "Loading plugins");
        LifecycleCoordinator::new(&mut self.specs, &self.queue, &mut self.objects)
            .start(&self.loader);

        let stats = self.stats();
        info!(
            running = stats.running,
            failed = stats.failed,
            disabled = stats.disabled,
            "Plugin loading finished"
        );
    }

    /// Stop and release every plugin in reverse load order
    ///
    /// Only the first call after [`load_plugins`](Self::load_plugins) has any
    /// effect.
    pub fn shutdown(&mut self) {
        if !self.started || self.shut_down {
            return;
        }
        self.shut_down = true;

        info!("Shutting down plugins");
        LifecycleCoordinator::new(&mut self.specs, &self.queue, &mut self.objects).shutdown();
    }

    /// All records, in discovery order
    pub fn plugins(&self) -> &[PluginSpec] {
        &self.specs
    }

    /// Look up a record by name
    pub fn plugin(&self, name: &str) -> Option<&PluginSpec> {
        self.specs
            .iter()
            .find(|s| s.state() != PluginState::Invalid && s.name() == name)
    }

    /// Resolved records in load order
    pub fn load_queue(&self) -> Vec<&PluginSpec> {
        self.queue.iter().map(|&i| &self.specs[i]).collect()
    }

    /// Objects published by running plugins
    pub fn objects(&self) -> &ObjectPool {
        &self.objects
    }

    /// Records that carry an error
    pub fn failed_plugins(&self) -> Vec<&PluginSpec> {
        self.specs.iter().filter(|s| s.has_error()).collect()
    }

    /// Whether any record carries an error
    pub fn has_errors(&self) -> bool {
        self.specs.iter().any(PluginSpec::has_error)
    }

    /// Check that `name` exists and has not failed
    pub fn check_required(&self, name: &str) -> Result<()> {
        let Some(spec) = self.plugin(name) else {
            let paths = self
                .plugin_paths
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ");
            return Err(ExtensionError::RequiredPluginMissing {
                name: name.to_string(),
                paths,
            });
        };
        match spec.error_string() {
            Some(reason) => Err(ExtensionError::RequiredPluginFailed {
                name: name.to_string(),
                reason,
            }),
            None => Ok(()),
        }
    }

    /// Names among `required` that did not reach `Running`
    pub fn not_running<'a>(&self, required: &'a [String]) -> Vec<&'a str> {
        required
            .iter()
            .filter(|name| {
                self.plugin(name)
                    .map_or(true, |s| s.state() != PluginState::Running)
            })
            .map(String::as_str)
            .collect()
    }

    /// Summary of every failed record, or `None` if nothing failed
    pub fn format_problems(&self) -> Option<String> {
        let failed = self.failed_plugins();
        if failed.is_empty() {
            return None;
        }

        let names = failed.iter().map(|s| display_name(s)).collect::<Vec<_>>();
        let mut out = format!(
            "Some problems were encountered whilst loading the following plugins: {}",
            names.join(", ")
        );
        for spec in failed {
            let _ = write!(
                out,
                "\n  {}: {}",
                display_name(spec),
                spec.error_string().unwrap_or_default()
            );
        }
        Some(out)
    }

    /// One line per plugin with name, version, compatibility version and location
    pub fn format_plugin_versions(&self) -> String {
        let width = self.specs.iter().map(|s| s.name().len()).max().unwrap_or(0);
        let mut out = String::new();
        for spec in &self.specs {
            let compat = spec
                .manifest()
                .map(|m| m.compat_version.to_string())
                .unwrap_or_default();
            let _ = writeln!(
                out,
                "  {:<width$}  {} ({}){}  {}",
                spec.name(),
                spec.version(),
                compat,
                if spec.is_disabled() { " disabled" } else { "" },
                spec.location().display(),
            );
        }
        out
    }

    /// Help text for every argument declared in a manifest
    pub fn format_plugin_options(&self) -> String {
        let mut out = String::new();
        for manifest in self.specs.iter().filter_map(PluginSpec::manifest) {
            if manifest.arguments.is_empty() {
                continue;
            }
            let _ = writeln!(out, "Plugin options for {}:", manifest.name);
            for arg in &manifest.arguments {
                let name = match &arg.parameter {
                    Some(parameter) => format!("{} <{}>", arg.name, parameter),
                    None => arg.name.clone(),
                };
                let _ = writeln!(out, "  {:<28}  {}", name, arg.description);
            }
        }
        out
    }

    /// Serializable view of every record
    pub fn snapshot(&self) -> Vec<PluginSnapshot> {
        self.specs.iter().map(PluginSpec::snapshot).collect()
    }

    /// Snapshot rendered as pretty JSON
    pub fn snapshot_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.snapshot())?)
    }

    /// Plugin statistics
    pub fn stats(&self) -> PluginStats {
        PluginStats {
            total: self.specs.len(),
            running: self
                .specs
                .iter()
                .filter(|s| s.state() == PluginState::Running)
                .count(),
            disabled: self.specs.iter().filter(|s| s.is_disabled()).count(),
            failed: self.specs.iter().filter(|s| s.has_error()).count(),
        }
    }

    /// Run the self-tests of the plugins selected with `-test`
    pub fn run_tests(&self) -> TestReport {
        let mut report = TestReport::default();
        let mut seen = HashSet::new();

        for &index in &self.queue {
            let spec = &self.specs[index];
            if !self.test_selection.includes(spec.name()) || !seen.insert(spec.name()) {
                continue;
            }
            let Some(instance) = spec.instance.as_ref().filter(|_| spec.state() == PluginState::Running)
            else {
                report.push(spec.name(), "load", Some(format!("plugin is {}", spec.state())));
                continue;
            };

            for test in instance.plugin().tests() {
                let outcome = test.run().err().map(|e| e.to_string());
                match &outcome {
                    None => info!(plugin = %spec.name(), test = %test.name(), "Test passed"),
                    Some(err) => {
                        warn!(plugin = %spec.name(), test = %test.name(), error = %err, "Test failed")
                    }
                }
                report.push(spec.name(), test.name(), outcome);
            }
        }
        report
    }
}

impl Default for PluginManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PluginManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn display_name(spec: &PluginSpec) -> String {
    if spec.name().is_empty() {
        spec.location().display().to_string()
    } else {
        spec.name().to_string()
    }
}

/// Recursively collect files with `extension` below `dir`, sorted per directory
fn collect_manifests(dir: &Path, extension: &str, out: &mut Vec<PathBuf>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            warn!(path = %dir.display(), error = %err, "Cannot read plugin directory");
            return;
        }
    };

    let mut paths: Vec<PathBuf> = entries.flatten().map(|e| e.path()).collect();
    paths.sort();

    for path in paths {
        if path.is_dir() {
            collect_manifests(&path, extension, out);
        } else if path.extension().and_then(|e| e.to_str()) == Some(extension) {
            out.push(path);
        }
    }
}

/// Plugin statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PluginStats {
    /// Total number of records
    pub total: usize,

    /// Number of running plugins
    pub running: usize,

    /// Number of plugins disabled on the command line
    pub disabled: usize,

    /// Number of records carrying an error
    pub failed: usize,
}

/// Result of one plugin self-test
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct TestOutcome {
    /// Plugin name
    pub plugin: String,
    /// Test name
    pub test: String,
    /// Failure message, `None` if the test passed
    pub error: Option<String>,
}

/// Results of [`PluginManager::run_tests`]
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct TestReport {
    /// Outcomes in execution order
    pub outcomes: Vec<TestOutcome>,
}

impl TestReport {
    fn push(&mut self, plugin: &str, test: &str, error: Option<String>) {
        self.outcomes.push(TestOutcome {
            plugin: plugin.to_string(),
            test: test.to_string(),
            error,
        });
    }

    /// Number of passed tests
    pub fn passed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.error.is_none()).count()
    }

    /// Number of failed tests
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.passed()
    }

    /// Whether every test passed
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }
}
