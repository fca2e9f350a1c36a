//! # Plexus Extension System
//!
//! Discovery, dependency resolution and lifecycle management for Plexus
//! plugins.
//!
//! ## Features
//!
//! - **Manifests**: `*.pluginspec` XML files describing each plugin
//! - **Resolution**: version-checked dependencies, cycle detection and a
//!   topological load order
//! - **Loading**: shared libraries or compiled-in static modules, validated
//!   against the plugin API version
//! - **Lifecycle**: initialize, a barrier, extensions initialized, shutdown
//! - **Failure isolation**: a broken plugin freezes itself and its dependents
//!   while unrelated plugins keep running
//!
//! ## Example
//!
//! ```rust,no_run
//! use plexus_extension::prelude::*;
//!
//! let mut manager = PluginManager::new();
//! manager.set_plugin_paths(&["/usr/lib/plexus/plugins"]);
//!
//! let options = CommandLineOptions {
//!     no_load: vec!["Welcome".to_string()],
//!     ..Default::default()
//! };
//! if let Err(errors) = manager.parse_options(&options) {
//!     for error in errors {
//!         eprintln!("{error}");
//!     }
//! }
//!
//! manager.load_plugins();
//! if let Some(problems) = manager.format_problems() {
//!     eprintln!("{problems}");
//! }
//! manager.shutdown();
//! ```

#![deny(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod error;
mod lifecycle;
pub mod loader;
pub mod manager;
pub mod manifest;
pub mod options;
mod resolver;
pub mod spec;
pub mod version;

pub use error::{ExtensionError, PluginRef, Result, DISABLED_BY_COMMAND_LINE};
pub use loader::{PluginInstance, PluginLoader, StaticModules};
pub use manager::{
    PluginManager, PluginStats, TestOutcome, TestReport, DEFAULT_FILE_EXTENSION,
};
pub use manifest::{Manifest, PluginArgumentDescription, PluginDependency};
pub use options::{CommandLineOptions, TestSelection, TEST_ALL};
pub use spec::{PluginSnapshot, PluginSpec, PluginState};
pub use version::PluginVersion;

// Re-export plugin API types for convenience
pub use plexus_plugin_api::{
    export_plugin, ObjectPool, Plugin, PluginContext, PluginDeclaration, PluginError, PluginTest,
};

/// Prelude module with commonly used types
pub mod prelude {
    pub use crate::error::{ExtensionError, Result};
    pub use crate::loader::{PluginLoader, StaticModules};
    pub use crate::manager::PluginManager;
    pub use crate::options::CommandLineOptions;
    pub use crate::spec::{PluginSpec, PluginState};
    pub use plexus_plugin_api::prelude::*;
}
