//! Plexus CLI

mod cli;

use anyhow::{Context, Result};
use clap::CommandFactory;
use cli::Cli;
use plexus_config::LoggingConfig;
use plexus_extension::{PluginManager, TestReport};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Exit code for unusable command-line options
const EXIT_USAGE: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse_args();

    match run(&cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("plexus: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<ExitCode> {
    let config = cli.host_config()?;
    init_tracing(&config.logging)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting Plexus");

    let mut manager = PluginManager::new();
    manager.set_file_extension(config.plugins.file_extension.as_str());
    manager.set_plugin_paths(config.plugins.paths.as_slice());

    if let Err(errors) = manager.parse_options(&cli.plugin_directives()) {
        for err in &errors {
            eprintln!("plexus: {err}");
        }
        eprintln!();
        print_help(&manager);
        return Ok(ExitCode::from(EXIT_USAGE));
    }

    if cli.version {
        println!("Plexus {}", env!("CARGO_PKG_VERSION"));
        print!("{}", manager.format_plugin_versions());
        return Ok(ExitCode::SUCCESS);
    }
    if cli.help {
        print_help(&manager);
        return Ok(ExitCode::SUCCESS);
    }

    manager
        .check_required(&config.plugins.core_plugin)
        .context("Core plugin is not usable")?;

    manager.load_plugins();
    if let Some(problems) = manager.format_problems() {
        tracing::warn!("{problems}");
    }

    if manager.test_selection().is_enabled() {
        let report = manager.run_tests();
        print_report(&report, cli.json)?;
        manager.shutdown();
        return Ok(exit_code(report.is_success()));
    }

    let required = config.plugins.required_plugins();
    let missing = manager.not_running(&required);
    if !missing.is_empty() {
        tracing::error!(plugins = ?missing, "Mandatory plugins are not running");
    }

    if cli.json {
        println!("{}", manager.snapshot_json()?);
    } else if missing.is_empty() {
        wait_for_interrupt(&manager)?;
    }

    manager.shutdown();
    tracing::info!("Plexus stopped");
    Ok(exit_code(missing.is_empty()))
}

/// Block until Ctrl-C
fn wait_for_interrupt(manager: &PluginManager) -> Result<()> {
    let stats = manager.stats();
    tracing::info!(
        running = stats.running,
        total = stats.total,
        "Plexus is running, press Ctrl-C to stop"
    );

    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create signal runtime")?
        .block_on(tokio::signal::ctrl_c())
        .context("Failed to listen for Ctrl-C")?;

    tracing::info!("Interrupt received");
    Ok(())
}

fn print_help(manager: &PluginManager) {
    println!("{}", Cli::command().render_help());
    let plugin_options = manager.format_plugin_options();
    if !plugin_options.is_empty() {
        println!();
        print!("{plugin_options}");
    }
}

fn print_report(report: &TestReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    for outcome in &report.outcomes {
        match &outcome.error {
            None => println!("PASS {}::{}", outcome.plugin, outcome.test),
            Some(err) => println!("FAIL {}::{}: {}", outcome.plugin, outcome.test, err),
        }
    }
    println!("{} passed, {} failed", report.passed(), report.failed());
    Ok(())
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let level: tracing::Level = logging
        .level
        .parse()
        .with_context(|| format!("Invalid log level: {}", logging.level))?;

    let registry = tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(level.into()));

    match logging.format.as_str() {
        "json" => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()?,
        _ => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()?,
    }

    Ok(())
}
