//! # Example Core Plugin
//!
//! Publishes the mode registry other plugins add their modes to, and
//! activates one of those modes once every plugin has finished wiring.
//!
//! The registry is a plain [`ModeRegistry`] so plugins can use it without
//! linking against this crate.
//!
//! The host looks for the built library next to `Core.pluginspec`, under the
//! platform library name for `Core` (`libCore.so`, `Core.dll`,
//! `libCore.dylib`). The cargo library target carries that name, so the
//! build output can be placed beside the manifest as is.

#![allow(non_snake_case)]

use plexus_plugin_api::prelude::*;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Object pool name of the mode registry
pub const MODE_REGISTRY: &str = "core.modes";

/// Mode names, in registration order
pub type ModeRegistry = Mutex<Vec<String>>;

/// Add `name` to `registry`; returns `false` if it is already there
pub fn register_mode(registry: &ModeRegistry, name: &str) -> bool {
    let mut modes = lock(registry);
    if modes.iter().any(|m| m == name) {
        return false;
    }
    modes.push(name.to_string());
    true
}

fn lock(registry: &ModeRegistry) -> MutexGuard<'_, Vec<String>> {
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Core plugin
#[derive(Debug, Default)]
pub struct CorePlugin {
    modes: Arc<ModeRegistry>,
    preferred_mode: Option<String>,
    current_mode: Option<String>,
}

impl CorePlugin {
    /// Create a new core plugin
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry this plugin publishes
    pub fn modes(&self) -> &Arc<ModeRegistry> {
        &self.modes
    }

    /// Mode activated after startup
    pub fn current_mode(&self) -> Option<&str> {
        self.current_mode.as_deref()
    }

    fn activate(&mut self, name: &str) -> bool {
        if !lock(&self.modes).iter().any(|m| m == name) {
            return false;
        }
        self.current_mode = Some(name.to_string());
        true
    }
}

impl Plugin for CorePlugin {
    fn initialize(&mut self, ctx: &mut PluginContext<'_>) -> Result<(), PluginError> {
        if let Some(mode) = ctx.argument("mode") {
            if mode.is_empty() {
                return Err(PluginError::invalid_argument("mode", "a mode name is required"));
            }
            self.preferred_mode = Some(mode.to_string());
        }
        if ctx.argument("-reset").or_else(|| ctx.argument("reset")).is_some() {
            lock(&self.modes).clear();
        }

        ctx.add_object(MODE_REGISTRY, Arc::clone(&self.modes));
        info!("Core plugin initialized");
        Ok(())
    }

    fn extensions_initialized(&mut self, _ctx: &mut PluginContext<'_>) {
        let target = match &self.preferred_mode {
            Some(mode) => Some(mode.clone()),
            None => lock(&self.modes).first().cloned(),
        };

        match target {
            Some(mode) if self.activate(&mode) => info!(mode = %mode, "Mode activated"),
            Some(mode) => warn!(mode = %mode, "Requested mode is not registered"),
            None => warn!("No modes registered"),
        }
    }

    fn about_to_shutdown(&mut self, _ctx: &mut PluginContext<'_>) {
        debug!(current = ?self.current_mode, "Core plugin stopping");
    }

    fn tests(&self) -> Vec<PluginTest> {
        vec![PluginTest::new("mode_registration", || {
            let registry = ModeRegistry::default();
            if !register_mode(&registry, "Edit") {
                return Err(PluginError::failed("could not register a new mode"));
            }
            if register_mode(&registry, "Edit") {
                return Err(PluginError::failed("registered the same mode twice"));
            }
            Ok(())
        })]
    }
}

plexus_plugin_api::export_plugin!(CorePlugin::new());

#[cfg(test)]
mod tests {
    use super::*;

    fn context<'a>(args: &'a [String], objects: &'a mut ObjectPool) -> PluginContext<'a> {
        PluginContext::new("Core", args, objects)
    }

    #[test]
    fn test_declaration_is_compatible() {
        assert!(plexus_plugin_declaration.is_compatible());
    }

    #[test]
    fn test_library_name_matches_manifest() {
        let manifest = include_str!("../Core.pluginspec");
        let name = format!("<plugin name=\"{}\"", env!("CARGO_CRATE_NAME"));
        assert!(manifest.contains(&name));
        assert!(!manifest.contains("<module"));
    }

    #[test]
    fn test_register_mode() {
        let registry = ModeRegistry::default();
        assert!(register_mode(&registry, "Welcome"));
        assert!(!register_mode(&registry, "Welcome"));
        assert!(register_mode(&registry, "Flight"));
        assert_eq!(*registry.lock().unwrap(), vec!["Welcome", "Flight"]);
    }

    #[test]
    fn test_initialize_publishes_registry() {
        let mut objects = ObjectPool::new();
        let mut plugin = CorePlugin::new();

        plugin.initialize(&mut context(&[], &mut objects)).unwrap();

        let published = objects.get::<ModeRegistry>(MODE_REGISTRY).unwrap();
        assert!(Arc::ptr_eq(&published, plugin.modes()));
    }

    #[test]
    fn test_preferred_mode_is_activated() {
        let args = vec!["mode=Flight".to_string()];
        let mut objects = ObjectPool::new();
        let mut plugin = CorePlugin::new();
        plugin.initialize(&mut context(&args, &mut objects)).unwrap();

        register_mode(plugin.modes(), "Welcome");
        register_mode(plugin.modes(), "Flight");
        plugin.extensions_initialized(&mut context(&args, &mut objects));

        assert_eq!(plugin.current_mode(), Some("Flight"));
    }

    #[test]
    fn test_first_mode_is_default() {
        let mut objects = ObjectPool::new();
        let mut plugin = CorePlugin::new();
        plugin.initialize(&mut context(&[], &mut objects)).unwrap();

        register_mode(plugin.modes(), "Welcome");
        plugin.extensions_initialized(&mut context(&[], &mut objects));

        assert_eq!(plugin.current_mode(), Some("Welcome"));
    }

    #[test]
    fn test_unknown_preferred_mode_is_ignored() {
        let args = vec!["mode=Setup".to_string()];
        let mut objects = ObjectPool::new();
        let mut plugin = CorePlugin::new();
        plugin.initialize(&mut context(&args, &mut objects)).unwrap();

        register_mode(plugin.modes(), "Welcome");
        plugin.extensions_initialized(&mut context(&args, &mut objects));

        assert_eq!(plugin.current_mode(), None);
    }

    #[test]
    fn test_empty_mode_argument_fails() {
        let args = vec!["mode".to_string()];
        let mut objects = ObjectPool::new();
        let mut plugin = CorePlugin::new();

        let err = plugin.initialize(&mut context(&args, &mut objects)).unwrap_err();
        assert!(matches!(err, PluginError::InvalidArgument { .. }));
        assert!(objects.is_empty());
    }

    #[test]
    fn test_self_tests_pass() {
        let tests = CorePlugin::new().tests();
        assert_eq!(tests.len(), 1);
        assert!(tests.iter().all(|t| t.run().is_ok()));
    }
}
