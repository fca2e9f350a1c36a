//! Configuration file merging
//!
//! Later files override earlier files. Search paths and mandatory plugins
//! accumulate across layers; scalar settings take the last layer's value.

use crate::error::{ConfigError, Result};
use crate::types::{HostConfig, PluginHostConfig};

/// Merge configurations in order
pub fn merge_configs(configs: Vec<HostConfig>) -> Result<HostConfig> {
    let mut configs = configs.into_iter();
    let base = configs
        .next()
        .ok_or_else(|| ConfigError::invalid("No configurations to merge"))?;

    Ok(configs.fold(base, merge_two_configs))
}

fn merge_two_configs(mut base: HostConfig, overlay: HostConfig) -> HostConfig {
    base.plugins = merge_plugin_config(base.plugins, overlay.plugins);
    base.logging = overlay.logging;
    base
}

fn merge_plugin_config(base: PluginHostConfig, overlay: PluginHostConfig) -> PluginHostConfig {
    PluginHostConfig {
        paths: append_unique(base.paths, overlay.paths),
        file_extension: overlay.file_extension,
        core_plugin: overlay.core_plugin,
        mandatory: append_unique(base.mandatory, overlay.mandatory),
    }
}

fn append_unique<T: PartialEq>(mut base: Vec<T>, overlay: Vec<T>) -> Vec<T> {
    for item in overlay {
        if !base.contains(&item) {
            base.push(item);
        }
    }
    base
}
