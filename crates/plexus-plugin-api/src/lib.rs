//! # Plexus Plugin API
//!
//! This crate provides the SDK for writing plugins hosted by the Plexus
//! extension system.
//!
//! A plugin is a shared library that exports one [`PluginDeclaration`]
//! (see [`export_plugin!`]). The host reads the declaration, checks its
//! API marker and calls the factory to obtain a [`Plugin`] instance, which
//! it then drives through the lifecycle:
//!
//! 1. [`Plugin::initialize`] in dependency order
//! 2. [`Plugin::extensions_initialized`] once every plugin is initialized
//! 3. [`Plugin::about_to_shutdown`] and [`Plugin::shutdown`] in reverse order
//!
//! ## Example
//!
//! ```rust,no_run
//! use plexus_plugin_api::prelude::*;
//!
//! #[derive(Debug, Default)]
//! struct MyPlugin;
//!
//! impl Plugin for MyPlugin {
//!     fn initialize(&mut self, ctx: &mut PluginContext<'_>) -> Result<(), PluginError> {
//!         ctx.add_object("my-plugin.greeting", std::sync::Arc::new(String::from("hello")));
//!         Ok(())
//!     }
//!
//!     fn extensions_initialized(&mut self, _ctx: &mut PluginContext<'_>) {}
//! }
//!
//! plexus_plugin_api::export_plugin!(MyPlugin::default());
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod context;
pub mod declaration;
pub mod error;
pub mod plugin;

#[cfg(feature = "testing")]
pub mod testing;

// Re-export commonly used types
pub use context::{ObjectPool, PluginContext};
pub use declaration::{PluginDeclaration, PluginFactory, API_VERSION, DECLARATION_SYMBOL, MAGIC};
pub use error::PluginError;
pub use plugin::{Plugin, PluginTest};

/// Prelude module with commonly used types
pub mod prelude {
    pub use crate::context::{ObjectPool, PluginContext};
    pub use crate::declaration::PluginDeclaration;
    pub use crate::error::PluginError;
    pub use crate::plugin::{Plugin, PluginTest};
}
