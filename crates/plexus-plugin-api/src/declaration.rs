//! Export declaration read by the host when loading a plugin module

use crate::plugin::Plugin;

/// Marker every declaration starts with ("PLXS")
pub const MAGIC: u32 = 0x504c_5853;

/// Version of the plugin ABI; bumped on any change to [`Plugin`]
pub const API_VERSION: u32 = 1;

/// Symbol name the declaration is exported under
pub const DECLARATION_SYMBOL: &str = "plexus_plugin_declaration";

/// Factory creating a fresh plugin instance
pub type PluginFactory = fn() -> Box<dyn Plugin>;

/// Declaration a plugin module exports for the host
///
/// Use [`export_plugin!`](crate::export_plugin) rather than building one by
/// hand in a shared library.
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct PluginDeclaration {
    /// Always [`MAGIC`]
    pub magic: u32,

    /// [`API_VERSION`] the module was built against
    pub api_version: u32,

    /// Instance factory
    pub create: PluginFactory,
}

impl PluginDeclaration {
    /// Create a declaration for the current API version
    pub const fn new(create: PluginFactory) -> Self {
        Self {
            magic: MAGIC,
            api_version: API_VERSION,
            create,
        }
    }

    /// Check the marker and API version against this host
    pub fn is_compatible(&self) -> bool {
        self.magic == MAGIC && self.api_version == API_VERSION
    }

    /// Create a new plugin instance
    pub fn instantiate(&self) -> Box<dyn Plugin> {
        (self.create)()
    }
}

/// Export a plugin from a `cdylib` crate
///
/// ```rust,ignore
/// plexus_plugin_api::export_plugin!(CorePlugin::new());
/// ```
#[macro_export]
macro_rules! export_plugin {
    ($constructor:expr) => {
        #[no_mangle]
        #[allow(non_upper_case_globals)]
        pub static plexus_plugin_declaration: $crate::PluginDeclaration = {
            fn __plexus_create() -> ::std::boxed::Box<dyn $crate::Plugin> {
                ::std::boxed::Box::new($constructor)
            }
            $crate::PluginDeclaration::new(__plexus_create)
        };
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::PluginContext;
    use crate::error::Result;

    #[derive(Debug)]
    struct NoopPlugin;

    impl Plugin for NoopPlugin {
        fn initialize(&mut self, _ctx: &mut PluginContext<'_>) -> Result<()> {
            Ok(())
        }

        fn extensions_initialized(&mut self, _ctx: &mut PluginContext<'_>) {}
    }

    fn create_noop() -> Box<dyn Plugin> {
        Box::new(NoopPlugin)
    }

    #[test]
    fn test_declaration_compatible() {
        let decl = PluginDeclaration::new(create_noop);
        assert!(decl.is_compatible());
        assert_eq!(format!("{:?}", decl.instantiate()), "NoopPlugin");
    }

    #[test]
    fn test_declaration_incompatible() {
        let mut decl = PluginDeclaration::new(create_noop);
        decl.api_version = API_VERSION + 1;
        assert!(!decl.is_compatible());

        let mut decl = PluginDeclaration::new(create_noop);
        decl.magic = 0;
        assert!(!decl.is_compatible());
    }

    #[test]
    fn test_symbol_name() {
        assert_eq!(DECLARATION_SYMBOL, "plexus_plugin_declaration");
    }
}
