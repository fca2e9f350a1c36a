//! Command-line arguments

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use plexus_config::{ConfigBuilder, HostConfig};
use plexus_extension::CommandLineOptions;
use std::ffi::OsString;
use std::path::PathBuf;

/// Long options that may also be spelled with a single dash
const LEGACY_LONG: &[&str] = &[
    "noload",
    "test",
    "pluginoption",
    "help",
    "version",
    "config",
    "plugin-path",
    "log-level",
    "json",
];

/// Long options that consume the following argument
const TAKES_VALUE: &[&str] = &[
    "noload",
    "test",
    "pluginoption",
    "config",
    "plugin-path",
    "log-level",
];

#[derive(Debug, Parser)]
#[command(name = "plexus")]
#[command(about = "Plexus extension host", long_about = None)]
#[command(disable_help_flag = true, disable_version_flag = true)]
pub(crate) struct Cli {
    /// Configuration file (YAML, TOML or JSON); repeat to layer files
    #[arg(short, long, env = "PLEXUS_CONFIG", value_name = "FILE")]
    pub(crate) config: Vec<PathBuf>,

    /// Additional directory searched for plugin manifests
    #[arg(long = "plugin-path", value_name = "DIR")]
    pub(crate) plugin_paths: Vec<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL")]
    pub(crate) log_level: Option<String>,

    /// Do not load the given plugin or anything depending on it
    #[arg(long = "noload", value_name = "PLUGIN")]
    pub(crate) no_load: Vec<String>,

    /// Run the self-tests of a plugin, or of every plugin with "all"
    #[arg(long = "test", value_name = "PLUGIN|all")]
    pub(crate) test: Vec<String>,

    /// Pass an option to a plugin
    #[arg(
        short = 'p',
        long = "pluginoption",
        value_name = "[PLUGIN,]KEY=VALUE",
        allow_hyphen_values = true
    )]
    pub(crate) plugin_options: Vec<String>,

    /// Print the plugin table as JSON
    #[arg(long)]
    pub(crate) json: bool,

    /// Print version information for the host and every plugin
    #[arg(short = 'v', long, action = ArgAction::SetTrue)]
    pub(crate) version: bool,

    /// Print help, including the options plugins accept
    #[arg(short = 'h', long, action = ArgAction::SetTrue)]
    pub(crate) help: bool,
}

impl Cli {
    /// Parse the process arguments
    pub(crate) fn parse_args() -> Self {
        Self::parse_from(normalize_args(std::env::args_os()))
    }

    /// Plugin directives for the manager
    pub(crate) fn plugin_directives(&self) -> CommandLineOptions {
        CommandLineOptions {
            no_load: self.no_load.clone(),
            test: self.test.clone(),
            plugin_options: self.plugin_options.clone(),
        }
    }

    /// Load and merge the configuration files in order, then apply
    /// command-line overrides
    pub(crate) fn host_config(&self) -> Result<HostConfig> {
        let base = match self.config.as_slice() {
            [] => HostConfig::default(),
            [path] => plexus_config::load(path)
                .with_context(|| format!("Failed to load {}", path.display()))?,
            paths => plexus_config::load_and_merge(paths.to_vec())
                .context("Failed to load layered configuration")?,
        };

        let mut builder = ConfigBuilder::from_config(base);
        for path in &self.plugin_paths {
            builder = builder.plugin_path(path);
        }
        if let Some(level) = &self.log_level {
            builder = builder.log_level(level);
        }

        let mut config = builder.build()?;
        if config.plugins.paths.is_empty() {
            config.plugins.paths.push(default_plugin_path());
        }
        Ok(config)
    }
}

/// `plugins/` next to the executable
fn default_plugin_path() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("plugins")))
        .unwrap_or_else(|| PathBuf::from("plugins"))
}

/// Rewrite `-noload` style options to their `--noload` form
///
/// Values of options that take one are passed through untouched, so
/// `-pluginoption -reset` keeps `-reset` as the value.
pub(crate) fn normalize_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    let mut out = Vec::new();
    let mut expect_value = false;
    let mut passthrough = false;

    for (position, arg) in args.into_iter().enumerate() {
        if position == 0 || passthrough || expect_value {
            expect_value = false;
            out.push(arg);
            continue;
        }

        let Some(text) = arg.to_str() else {
            out.push(arg);
            continue;
        };
        if text == "--" {
            passthrough = true;
            out.push(arg);
            continue;
        }

        let long = text
            .strip_prefix("--")
            .or_else(|| text.strip_prefix('-').filter(|rest| !rest.starts_with('-')));
        match long {
            Some(rest) if text.starts_with("--") || LEGACY_LONG.contains(&name_of(rest)) => {
                let name = name_of(rest);
                expect_value = TAKES_VALUE.contains(&name) && !rest.contains('=');
                out.push(format!("--{rest}").into());
            }
            _ => {
                expect_value = text == "-p" || text == "-c";
                out.push(arg);
            }
        }
    }
    out
}

fn name_of(option: &str) -> &str {
    option.split_once('=').map_or(option, |(name, _)| name)
}
