//! # Example Welcome Plugin
//!
//! Registers the "Welcome" mode with the core plugin's mode registry.
//!
//! The library target is named `Welcome` so the build output matches the
//! platform library name the host derives from the manifest.

#![allow(non_snake_case)]

use plexus_plugin_api::prelude::*;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// Mode this plugin contributes
pub const WELCOME_MODE: &str = "Welcome";

/// Object pool name of the greeting text
pub const GREETING: &str = "welcome.greeting";

/// Published by the core plugin under `core.modes`
type ModeRegistry = Mutex<Vec<String>>;

const MODE_REGISTRY: &str = "core.modes";

/// Welcome plugin
#[derive(Debug, Default)]
pub struct WelcomePlugin {
    modes: Option<Arc<ModeRegistry>>,
    registered: bool,
}

impl WelcomePlugin {
    /// Create a new welcome plugin
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the welcome mode was added to the registry
    pub fn is_registered(&self) -> bool {
        self.registered
    }
}

impl Plugin for WelcomePlugin {
    fn initialize(&mut self, ctx: &mut PluginContext<'_>) -> Result<(), PluginError> {
        let modes = ctx
            .object::<ModeRegistry>(MODE_REGISTRY)
            .ok_or_else(|| PluginError::missing_object(MODE_REGISTRY))?;
        self.modes = Some(modes);

        let greeting = ctx
            .argument("greeting")
            .unwrap_or("Welcome to Plexus")
            .to_string();
        ctx.add_object(GREETING, Arc::new(greeting));
        Ok(())
    }

    fn extensions_initialized(&mut self, _ctx: &mut PluginContext<'_>) {
        let Some(modes) = &self.modes else {
            return;
        };
        let mut modes = modes.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if modes.iter().any(|m| m == WELCOME_MODE) {
            warn!(mode = WELCOME_MODE, "Mode already registered");
            return;
        }
        modes.push(WELCOME_MODE.to_string());
        self.registered = true;
        info!(mode = WELCOME_MODE, "Mode registered");
    }

    fn shutdown(&mut self) {
        self.modes = None;
    }
}

plexus_plugin_api::export_plugin!(WelcomePlugin::new());

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_with_registry() -> (ObjectPool, Arc<ModeRegistry>) {
        let registry = Arc::new(ModeRegistry::default());
        let mut objects = ObjectPool::new();
        objects.add("Core", MODE_REGISTRY, registry.clone());
        (objects, registry)
    }

    #[test]
    fn test_declaration_is_compatible() {
        assert!(plexus_plugin_declaration.is_compatible());
    }

    #[test]
    fn test_library_name_matches_manifest() {
        let manifest = include_str!("../Welcome.pluginspec");
        let name = format!("<plugin name=\"{}\"", env!("CARGO_CRATE_NAME"));
        assert!(manifest.contains(&name));
        assert!(!manifest.contains("<module"));
    }

    #[test]
    fn test_registers_welcome_mode() {
        let (mut objects, registry) = pool_with_registry();
        let mut plugin = WelcomePlugin::new();

        plugin
            .initialize(&mut PluginContext::new("Welcome", &[], &mut objects))
            .unwrap();
        plugin.extensions_initialized(&mut PluginContext::new("Welcome", &[], &mut objects));

        assert!(plugin.is_registered());
        assert_eq!(*registry.lock().unwrap(), vec![WELCOME_MODE]);
    }

    #[test]
    fn test_greeting_argument() {
        let (mut objects, _registry) = pool_with_registry();
        let args = vec!["greeting=Hello".to_string()];
        let mut plugin = WelcomePlugin::new();

        plugin
            .initialize(&mut PluginContext::new("Welcome", &args, &mut objects))
            .unwrap();

        let greeting = objects.get::<String>(GREETING).unwrap();
        assert_eq!(greeting.as_str(), "Hello");
    }

    #[test]
    fn test_missing_registry_fails() {
        let mut objects = ObjectPool::new();
        let mut plugin = WelcomePlugin::new();

        let err = plugin
            .initialize(&mut PluginContext::new("Welcome", &[], &mut objects))
            .unwrap_err();

        assert_eq!(err.to_string(), "Required object 'core.modes' is not registered");
    }
}
