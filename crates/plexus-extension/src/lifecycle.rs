//! Lifecycle passes driving records from `Resolved` to `Running` and back down
//!
//! Startup runs three global passes over the load queue:
//!
//! 1. load every module, in dependency order
//! 2. `initialize` every plugin, in dependency order
//! 3. `extensions_initialized`, in reverse order, once every record has
//!    settled (reached `Initialized` or frozen)
//!
//! Shutdown calls `about_to_shutdown` on every running plugin in reverse
//! order, then releases all instances in reverse order.

use crate::error::{ExtensionError, Result};
use crate::loader::PluginLoader;
use crate::spec::{PluginSpec, PluginState};
use plexus_plugin_api::{ObjectPool, PluginContext};
use tracing::{debug, info};

impl PluginSpec {
    /// Load the module and create the instance
    pub(crate) fn load_library(&mut self, loader: &PluginLoader) -> Result<()> {
        self.expect_state(PluginState::Resolved, "Loading the library failed")?;
        let path = self.library_path().ok_or_else(|| {
            ExtensionError::state_precondition("Loading the library failed because manifest is missing")
        })?;

        let instance = loader.load(self.name(), &path)?;
        self.instance = Some(instance);
        self.advance(PluginState::Loaded);
        debug!(plugin = %self.name(), "Plugin loaded");
        Ok(())
    }

    /// Call `initialize` on the instance
    pub(crate) fn initialize_plugin(&mut self, objects: &mut ObjectPool) -> Result<()> {
        self.expect_state(PluginState::Loaded, "Initializing the plugin failed")?;
        let name = self.name().to_string();
        let instance = self
            .instance
            .as_mut()
            .ok_or(ExtensionError::MissingInstance("initialize"))?;

        let mut ctx = PluginContext::new(&name, &self.arguments, objects);
        if let Err(err) = instance.plugin_mut().initialize(&mut ctx) {
            objects.remove_owned_by(&name);
            return Err(ExtensionError::InitFailure(err.to_string()));
        }

        self.advance(PluginState::Initialized);
        debug!(plugin = %name, "Plugin initialized");
        Ok(())
    }

    /// Call `extensions_initialized` on the instance
    pub(crate) fn initialize_extensions(&mut self, objects: &mut ObjectPool) -> Result<()> {
        self.expect_state(
            PluginState::Initialized,
            "Cannot perform extensionsInitialized",
        )?;
        let name = self.name().to_string();
        let instance = self
            .instance
            .as_mut()
            .ok_or(ExtensionError::MissingInstance("perform extensionsInitialized"))?;

        let mut ctx = PluginContext::new(&name, &self.arguments, objects);
        instance.plugin_mut().extensions_initialized(&mut ctx);

        self.advance(PluginState::Running);
        info!(plugin = %name, version = %self.version(), "Plugin running");
        Ok(())
    }

    /// Call `about_to_shutdown` on the instance
    pub(crate) fn stop(&mut self, objects: &mut ObjectPool) -> Result<()> {
        self.expect_state(PluginState::Running, "Cannot perform aboutToShutdown")?;
        let name = self.name().to_string();
        let instance = self
            .instance
            .as_mut()
            .ok_or(ExtensionError::MissingInstance("perform aboutToShutdown"))?;

        let mut ctx = PluginContext::new(&name, &self.arguments, objects);
        instance.plugin_mut().about_to_shutdown(&mut ctx);

        self.advance(PluginState::Stopped);
        debug!(plugin = %name, "Plugin stopped");
        Ok(())
    }

    /// Release the instance and its pool objects
    ///
    /// Stopped plugins get `shutdown` first and become `Deleted`. Any other
    /// instance is dropped without hooks and the state is kept.
    pub(crate) fn kill(&mut self, objects: &mut ObjectPool) {
        let removed = objects.remove_owned_by(self.name());
        if removed > 0 {
            debug!(plugin = %self.name(), removed, "Released plugin objects");
        }

        let Some(mut instance) = self.instance.take() else {
            return;
        };
        if self.state() == PluginState::Stopped {
            instance.plugin_mut().shutdown();
            drop(instance);
            self.advance(PluginState::Deleted);
            debug!(plugin = %self.name(), "Plugin deleted");
        } else {
            drop(instance);
            debug!(plugin = %self.name(), state = %self.state(), "Released plugin without shutdown");
        }
    }
}

/// The first dependency of `index` that did not reach `required`
fn dependency_failure(
    specs: &[PluginSpec],
    index: usize,
    required: PluginState,
) -> Option<ExtensionError> {
    specs[index]
        .dependency_specs()
        .iter()
        .map(|&dep| &specs[dep])
        .find(|dep| dep.is_frozen() || dep.state() < required)
        .map(|dep| ExtensionError::dependency_failed(dep.name(), dep.version(), dep.failure_reason()))
}

/// Runs the global lifecycle passes over a resolved registry
#[derive(Debug)]
pub(crate) struct LifecycleCoordinator<'a> {
    specs: &'a mut [PluginSpec],
    queue: &'a [usize],
    objects: &'a mut ObjectPool,
}

impl<'a> LifecycleCoordinator<'a> {
    pub(crate) fn new(
        specs: &'a mut [PluginSpec],
        queue: &'a [usize],
        objects: &'a mut ObjectPool,
    ) -> Self {
        Self {
            specs,
            queue,
            objects,
        }
    }

    /// Load, initialize and start every eligible plugin
    pub(crate) fn start(&mut self, loader: &PluginLoader) {
        self.load_pass(loader);
        self.initialize_pass();
        if self.settled() {
            debug!("All plugins settled");
        }
        self.extensions_pass();
    }

    fn load_pass(&mut self, loader: &PluginLoader) {
        for &index in self.queue {
            if self.specs[index].is_frozen() {
                continue;
            }
            let result = match dependency_failure(self.specs, index, PluginState::Loaded) {
                Some(err) => Err(err),
                None => self.specs[index].load_library(loader),
            };
            if let Err(err) = result {
                self.specs[index].fail(err);
            }
        }
    }

    fn initialize_pass(&mut self) {
        for &index in self.queue {
            if self.specs[index].is_frozen() {
                continue;
            }
            let result = match dependency_failure(self.specs, index, PluginState::Initialized) {
                Some(err) => Err(err),
                None => self.specs[index].initialize_plugin(self.objects),
            };
            if let Err(err) = result {
                self.specs[index].fail(err);
            }
        }
    }

    /// Barrier between `initialize` and `extensions_initialized`
    ///
    /// Every queued record must be `Initialized` or frozen. Stragglers are
    /// frozen so the extensions pass never sees them.
    fn settled(&mut self) -> bool {
        let mut settled = true;
        for &index in self.queue {
            let spec = &self.specs[index];
            if spec.is_frozen() || spec.state() == PluginState::Initialized {
                continue;
            }
            let err = ExtensionError::state_precondition(format!(
                "Plugin '{}' did not settle before extensionsInitialized (state {})",
                spec.name(),
                spec.state()
            ));
            self.specs[index].fail(err);
            settled = false;
        }
        settled
    }

    fn extensions_pass(&mut self) {
        for &index in self.queue.iter().rev() {
            if self.specs[index].is_frozen() {
                continue;
            }
            if let Err(err) = self.specs[index].initialize_extensions(self.objects) {
                self.specs[index].fail(err);
            }
        }
    }

    /// Stop and release every plugin, dependents first
    pub(crate) fn shutdown(&mut self) {
        for &index in self.queue.iter().rev() {
            if self.specs[index].state() != PluginState::Running {
                continue;
            }
            if let Err(err) = self.specs[index].stop(self.objects) {
                self.specs[index].fail(err);
            }
        }
        for &index in self.queue.iter().rev() {
            self.specs[index].kill(self.objects);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::StaticModules;
    use crate::manifest::{Manifest, PluginDependency};
    use crate::resolver::resolve;
    use crate::version::PluginVersion;
    use plexus_plugin_api::testing::{CallLog, MockPlugin};

    fn v(text: &str) -> PluginVersion {
        PluginVersion::parse(text).unwrap()
    }

    fn spec(name: &str, deps: &[&str]) -> PluginSpec {
        let mut manifest = Manifest::new(name, v("1.0"));
        for dep in deps {
            manifest.dependencies.push(PluginDependency::new(*dep, v("1.0")));
        }
        PluginSpec::from_manifest(manifest, format!("/plugins/{name}.pluginspec"))
    }

    fn loader(log: &CallLog, names: &[&str], failing: &[&str]) -> PluginLoader {
        let mut statics = StaticModules::new();
        for name in names {
            let log = log.clone();
            let name = name.to_string();
            let fails = failing.contains(&name.as_str());
            statics.register(name.clone(), move || {
                let plugin = MockPlugin::new(name.clone(), log.clone());
                Box::new(if fails { plugin.failing_with("boom") } else { plugin })
            });
        }
        PluginLoader::with_static_modules(statics)
    }

    #[test]
    fn test_start_and_shutdown_order() {
        let log = CallLog::new();
        let mut specs = vec![spec("C", &["B"]), spec("B", &["A"]), spec("A", &[])];
        let queue = resolve(&mut specs);
        let mut objects = ObjectPool::new();
        let loader = loader(&log, &["A", "B", "C"], &[]);

        let mut coordinator = LifecycleCoordinator::new(&mut specs, &queue, &mut objects);
        coordinator.start(&loader);

        assert!(specs.iter().all(|s| s.state() == PluginState::Running));
        assert_eq!(log.plugins_for("initialize"), vec!["A", "B", "C"]);
        assert_eq!(log.plugins_for("extensionsInitialized"), vec!["C", "B", "A"]);

        LifecycleCoordinator::new(&mut specs, &queue, &mut objects).shutdown();

        assert!(specs.iter().all(|s| s.state() == PluginState::Deleted));
        assert!(specs.iter().all(|s| !s.has_instance()));
        assert_eq!(log.plugins_for("aboutToShutdown"), vec!["C", "B", "A"]);
        assert_eq!(log.plugins_for("shutdown"), vec!["C", "B", "A"]);
        assert!(log.position("C:shutdown").unwrap() < log.position("C:drop").unwrap());
    }

    #[test]
    fn test_init_failure_freezes_dependents_at_loaded() {
        let log = CallLog::new();
        let mut specs = vec![spec("E", &[]), spec("D", &["E"]), spec("Other", &[])];
        let queue = resolve(&mut specs);
        let mut objects = ObjectPool::new();
        let loader = loader(&log, &["E", "D", "Other"], &["E"]);

        LifecycleCoordinator::new(&mut specs, &queue, &mut objects).start(&loader);

        assert_eq!(specs[0].state(), PluginState::Loaded);
        assert_eq!(
            specs[0].error_string().unwrap(),
            "Plugin initialization failed: boom"
        );
        assert_eq!(specs[1].state(), PluginState::Loaded);
        assert_eq!(
            specs[1].error_string().unwrap(),
            "Cannot load plugin because dependency failed to load: E(1.0) Reason: Plugin initialization failed: boom"
        );
        assert_eq!(specs[2].state(), PluginState::Running);
        assert!(!log.contains("D:initialize"));

        LifecycleCoordinator::new(&mut specs, &queue, &mut objects).shutdown();

        // Frozen instances are dropped without hooks and keep their state.
        assert_eq!(specs[1].state(), PluginState::Loaded);
        assert!(!specs[1].has_instance());
        assert!(log.contains("D:drop"));
        assert!(!log.contains("D:shutdown"));
        assert_eq!(specs[2].state(), PluginState::Deleted);
    }

    #[test]
    fn test_missing_module_freezes_at_resolved() {
        let log = CallLog::new();
        let mut specs = vec![spec("Ghost", &[]), spec("Needs", &["Ghost"])];
        let queue = resolve(&mut specs);
        let mut objects = ObjectPool::new();
        let loader = loader(&log, &["Needs"], &[]);

        LifecycleCoordinator::new(&mut specs, &queue, &mut objects).start(&loader);

        assert_eq!(specs[0].state(), PluginState::Resolved);
        assert!(matches!(specs[0].error(), Some(ExtensionError::LoadFailure(_))));
        assert_eq!(specs[1].state(), PluginState::Resolved);
        assert!(specs[1]
            .error_string()
            .unwrap()
            .contains("Ghost(1.0) Reason: Could not load library"));
    }

    #[test]
    fn test_preconditions() {
        let mut record = spec("A", &[]);
        let mut objects = ObjectPool::new();

        let err = record.load_library(&PluginLoader::new()).unwrap_err();
        assert_eq!(err.to_string(), "Loading the library failed because state != Resolved");

        let err = record.initialize_plugin(&mut objects).unwrap_err();
        assert_eq!(err.to_string(), "Initializing the plugin failed because state != Loaded");

        let err = record.initialize_extensions(&mut objects).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot perform extensionsInitialized because state != Initialized"
        );
        assert_eq!(record.state(), PluginState::Read);
    }

    #[test]
    fn test_disabled_plugin_cascades() {
        let log = CallLog::new();
        let mut specs = vec![spec("X", &[]), spec("Y", &["X"]), spec("Z", &[])];
        let queue = resolve(&mut specs);
        specs[0].set_disabled(true);
        let mut objects = ObjectPool::new();
        let loader = loader(&log, &["X", "Y", "Z"], &[]);

        LifecycleCoordinator::new(&mut specs, &queue, &mut objects).start(&loader);

        assert_eq!(specs[0].state(), PluginState::Resolved);
        assert!(!specs[0].has_error());
        assert_eq!(
            specs[1].error_string().unwrap(),
            "Cannot load plugin because dependency failed to load: X(1.0) Reason: disabled by command line"
        );
        assert_eq!(specs[2].state(), PluginState::Running);
        assert!(!log.contains("X:initialize"));
    }
}
