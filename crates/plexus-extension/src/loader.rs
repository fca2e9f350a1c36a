//! Plugin module loading
//!
//! A plugin module is found in one of two places:
//!
//! - **Static modules** are compiled into the host and registered by name with
//!   [`StaticModules::register`]. They are mainly used by tests and by
//!   applications that link their core plugins directly.
//! - **Dynamic modules** are shared libraries next to the manifest. They must
//!   export a [`PluginDeclaration`] under [`DECLARATION_SYMBOL`], which the
//!   [`export_plugin!`](plexus_plugin_api::export_plugin) macro does.
//!
//! Both paths validate the declaration's marker and API version before any
//! plugin code runs.

use crate::error::{ExtensionError, Result};
use libloading::Library;
use plexus_plugin_api::{Plugin, PluginDeclaration, API_VERSION, DECLARATION_SYMBOL, MAGIC};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

/// A live plugin instance, exclusively owned by its record
///
/// For dynamic modules the library handle is kept alive for as long as the
/// instance exists and is unloaded after the instance has been dropped.
#[derive(Debug)]
pub struct PluginInstance {
    plugin: Box<dyn Plugin>,
    // Must stay declared after `plugin`: fields drop in declaration order.
    library: Option<Library>,
}

impl PluginInstance {
    fn new(plugin: Box<dyn Plugin>, library: Option<Library>) -> Self {
        Self {
            plugin,
            library,
        }
    }

    /// Access the plugin
    pub fn plugin(&self) -> &dyn Plugin {
        self.plugin.as_ref()
    }

    /// Mutable access to the plugin
    pub fn plugin_mut(&mut self) -> &mut dyn Plugin {
        self.plugin.as_mut()
    }

    /// Whether the instance came from a shared library
    pub fn is_dynamic(&self) -> bool {
        self.library.is_some()
    }
}

type StaticFactory = Box<dyn Fn() -> Box<dyn Plugin> + Send + Sync>;

struct StaticModule {
    magic: u32,
    api_version: u32,
    create: StaticFactory,
}

/// Table of plugin factories compiled into the host
#[derive(Default)]
pub struct StaticModules {
    modules: HashMap<String, StaticModule>,
}

impl fmt::Debug for StaticModules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.modules.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("StaticModules").field("modules", &names).finish()
    }
}

impl StaticModules {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory for the plugin `name`
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn Plugin> + Send + Sync + 'static,
    {
        self.modules.insert(
            name.into(),
            StaticModule {
                magic: MAGIC,
                api_version: API_VERSION,
                create: Box::new(factory),
            },
        );
    }

    /// Register an exported declaration for the plugin `name`
    ///
    /// The declaration is validated when the plugin is loaded, exactly as if
    /// it had been read from a shared library.
    pub fn register_declaration(&mut self, name: impl Into<String>, declaration: PluginDeclaration) {
        self.modules.insert(
            name.into(),
            StaticModule {
                magic: declaration.magic,
                api_version: declaration.api_version,
                create: Box::new(move || declaration.instantiate()),
            },
        );
    }

    /// Whether a module is registered for `name`
    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// Number of registered modules
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Check if the table is empty
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    fn instantiate(&self, name: &str) -> Option<Result<Box<dyn Plugin>>> {
        let module = self.modules.get(name)?;
        if module.magic != MAGIC || module.api_version != API_VERSION {
            return Some(Err(ExtensionError::InvalidPluginType));
        }
        Some(Ok((module.create)()))
    }
}

/// Creates plugin instances from static or dynamic modules
#[derive(Debug, Default)]
pub struct PluginLoader {
    statics: StaticModules,
}

impl PluginLoader {
    /// Create a loader that only loads shared libraries
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a loader that prefers the given static modules
    pub fn with_static_modules(statics: StaticModules) -> Self {
        Self { statics }
    }

    /// Static module table
    pub fn static_modules(&self) -> &StaticModules {
        &self.statics
    }

    /// Mutable static module table
    pub fn static_modules_mut(&mut self) -> &mut StaticModules {
        &mut self.statics
    }

    /// Instantiate the plugin `name`
    ///
    /// A static module registered under `name` wins; otherwise the shared
    /// library at `library_path` is loaded.
    pub fn load(&self, name: &str, library_path: &Path) -> Result<PluginInstance> {
        if let Some(plugin) = self.statics.instantiate(name) {
            debug!(plugin = %name, "Instantiating static plugin module");
            return Ok(PluginInstance::new(plugin?, None));
        }

        info!(plugin = %name, path = %library_path.display(), "Loading plugin library");
        load_dynamic(library_path)
    }
}

#[allow(unsafe_code)]
fn load_dynamic(path: &Path) -> Result<PluginInstance> {
    // SAFETY: loading a library runs its initializers. Plugin libraries are
    // installed alongside their manifests and are trusted like the host itself.
    let library =
        unsafe { Library::new(path) }.map_err(|e| ExtensionError::LoadFailure(e.to_string()))?;

    // SAFETY: `export_plugin!` exports the symbol as a `PluginDeclaration`
    // static; the pointer is read once while `library` is alive, and the
    // marker fields are checked before the factory is called.
    let declaration: PluginDeclaration = unsafe {
        let symbol = library
            .get::<*const PluginDeclaration>(DECLARATION_SYMBOL.as_bytes())
            .map_err(|_| ExtensionError::InvalidPluginType)?;
        let ptr: *const PluginDeclaration = *symbol;
        if ptr.is_null() {
            return Err(ExtensionError::InvalidPluginType);
        }
        ptr.read()
    };

    if !declaration.is_compatible() {
        return Err(ExtensionError::InvalidPluginType);
    }

    let plugin = declaration.instantiate();
    Ok(PluginInstance::new(plugin, Some(library)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use plexus_plugin_api::{PluginContext, PluginError};

    #[derive(Debug)]
    struct Dummy;

    impl Plugin for Dummy {
        fn initialize(&mut self, _ctx: &mut PluginContext<'_>) -> std::result::Result<(), PluginError> {
            Ok(())
        }

        fn extensions_initialized(&mut self, _ctx: &mut PluginContext<'_>) {}
    }

    fn create_dummy() -> Box<dyn Plugin> {
        Box::new(Dummy)
    }

    #[test]
    fn test_static_module_is_preferred() {
        let mut statics = StaticModules::new();
        statics.register("Dummy", || Box::new(Dummy));
        let loader = PluginLoader::with_static_modules(statics);

        let instance = loader.load("Dummy", Path::new("/nonexistent/libdummy.so")).unwrap();
        assert!(!instance.is_dynamic());
    }

    #[test]
    fn test_incompatible_declaration_is_rejected() {
        let mut declaration = PluginDeclaration::new(create_dummy);
        declaration.api_version = API_VERSION + 1;

        let mut loader = PluginLoader::new();
        loader
            .static_modules_mut()
            .register_declaration("Old", declaration);

        let err = loader.load("Old", Path::new("")).unwrap_err();
        assert!(matches!(err, ExtensionError::InvalidPluginType));
        assert_eq!(
            err.to_string(),
            "Plugin is not valid (does not derive from the plugin interface)"
        );
    }

    #[test]
    fn test_bad_magic_is_rejected() {
        let mut declaration = PluginDeclaration::new(create_dummy);
        declaration.magic = 0;

        let mut statics = StaticModules::new();
        statics.register_declaration("Fake", declaration);
        let loader = PluginLoader::with_static_modules(statics);

        assert!(matches!(
            loader.load("Fake", Path::new("")),
            Err(ExtensionError::InvalidPluginType)
        ));
    }

    #[test]
    fn test_missing_library_is_load_failure() {
        let loader = PluginLoader::new();
        let err = loader
            .load("Ghost", Path::new("/nonexistent/libghost.so"))
            .unwrap_err();

        assert!(matches!(err, ExtensionError::LoadFailure(_)));
        assert!(err.to_string().starts_with("Could not load library: "));
    }

    #[test]
    fn test_non_library_file_is_load_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(libloading::library_filename("garbage"));
        std::fs::write(&path, b"not a shared library").unwrap();

        let err = PluginLoader::new().load("garbage", &path).unwrap_err();
        assert!(matches!(err, ExtensionError::LoadFailure(_)));
    }

    #[test]
    fn test_static_modules_debug_lists_names() {
        let mut statics = StaticModules::new();
        statics.register("B", || Box::new(Dummy));
        statics.register("A", || Box::new(Dummy));

        assert_eq!(statics.len(), 2);
        assert!(statics.contains("A"));
        assert_eq!(format!("{statics:?}"), r#"StaticModules { modules: ["A", "B"] }"#);
    }
}
