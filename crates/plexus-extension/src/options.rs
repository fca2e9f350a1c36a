//! Command-line directives addressed to individual plugins

use crate::error::ExtensionError;
use crate::spec::{PluginSpec, PluginState};
use serde::Serialize;
use tracing::debug;

/// Keyword selecting every plugin for `-test`
pub const TEST_ALL: &str = "all";

/// Plugin directives collected from the command line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandLineOptions {
    /// Plugins to disable (`-noload <name>`)
    pub no_load: Vec<String>,
    /// Plugins whose self-tests run (`-test <name|all>`)
    pub test: Vec<String>,
    /// Per-plugin options (`-pluginoption <name,key=value>` or `<key=value>`)
    pub plugin_options: Vec<String>,
}

impl CommandLineOptions {
    /// Whether any directive was given
    pub fn is_empty(&self) -> bool {
        self.no_load.is_empty() && self.test.is_empty() && self.plugin_options.is_empty()
    }
}

/// Which plugins run their self-tests
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "mode", content = "plugins")]
pub enum TestSelection {
    /// Test mode is off
    #[default]
    None,
    /// Every running plugin
    All,
    /// The named plugins
    Plugins(Vec<String>),
}

impl TestSelection {
    /// Whether test mode is on
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::None)
    }

    /// Whether `name` is selected
    pub fn includes(&self, name: &str) -> bool {
        match self {
            Self::None => false,
            Self::All => true,
            Self::Plugins(names) => names.iter().any(|n| n == name),
        }
    }

    fn add(&mut self, name: &str) {
        match self {
            Self::All => {}
            Self::None => *self = Self::Plugins(vec![name.to_string()]),
            Self::Plugins(names) => {
                if !names.iter().any(|n| n == name) {
                    names.push(name.to_string());
                }
            }
        }
    }
}

/// Apply the directives to the registry
///
/// Every directive is checked; all errors are collected rather than stopping
/// at the first one.
pub(crate) fn apply(
    specs: &mut [PluginSpec],
    options: &CommandLineOptions,
    selection: &mut TestSelection,
) -> Vec<ExtensionError> {
    let mut errors = Vec::new();

    for name in &options.no_load {
        match find(specs, name) {
            Some(index) => {
                specs[index].set_disabled(true);
                debug!(plugin = %name, "Plugin disabled on the command line");
            }
            None => errors.push(ExtensionError::InvalidNoLoadOption(name.clone())),
        }
    }

    for name in &options.test {
        if name == TEST_ALL {
            *selection = TestSelection::All;
        } else if find(specs, name).is_some() {
            selection.add(name);
        } else {
            errors.push(ExtensionError::InvalidTestOption(name.clone()));
        }
    }

    for option in &options.plugin_options {
        if let Err(err) = apply_plugin_option(specs, option) {
            errors.push(err);
        }
    }

    errors
}

fn find(specs: &[PluginSpec], name: &str) -> Option<usize> {
    specs
        .iter()
        .position(|spec| spec.state() != PluginState::Invalid && spec.name() == name)
}

/// Route one `-pluginoption` value to its plugin
///
/// `name,key=value` targets the plugin `name`. A bare `key=value` goes to
/// every plugin declaring `key` (with or without a leading dash) in its
/// manifest argument list.
fn apply_plugin_option(specs: &mut [PluginSpec], option: &str) -> Result<(), ExtensionError> {
    if let Some((name, value)) = option.split_once(',') {
        if !name.contains('=') {
            let index = find(specs, name)
                .ok_or_else(|| ExtensionError::UnknownPluginArgument(option.to_string()))?;
            specs[index].arguments.push(value.to_string());
            return Ok(());
        }
    }

    let key = option.split_once('=').map_or(option, |(key, _)| key);
    let key = key.trim_start_matches('-');
    let mut matched = false;
    for spec in specs.iter_mut().filter(|s| s.state() != PluginState::Invalid) {
        let declares = spec.manifest().is_some_and(|m| {
            m.arguments
                .iter()
                .any(|arg| arg.name.trim_start_matches('-') == key)
        });
        if declares {
            spec.arguments.push(option.to_string());
            matched = true;
        }
    }

    if matched {
        Ok(())
    } else {
        Err(ExtensionError::UnknownPluginArgument(option.to_string()))
    }
}
