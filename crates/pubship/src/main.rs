//! pubship CLI
#![deny(unsafe_code)]

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use owo_colors::OwoColorize;
use pubship::{Cli, commands};
use pubship_core::config::{ConfigLoader, find_project_config};
use pubship_core::runner::SystemRunner;
use pubship_core::ship::ShipError;
use tracing::debug;

mod observability;

fn main() -> ExitCode {
    let cli = Cli::parse();
    cli.color.apply();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => report(&err),
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    if let Some(ref dir) = cli.chdir {
        std::env::set_current_dir(dir)
            .with_context(|| format!("failed to change directory to {}", dir.display()))?;
    }

    let cwd = std::env::current_dir().context("failed to determine current directory")?;
    let cwd = camino::Utf8PathBuf::try_from(cwd).map_err(|e| {
        anyhow::anyhow!(
            "current directory is not valid UTF-8: {}",
            e.into_path_buf().display()
        )
    })?;
    let mut loader = ConfigLoader::new().with_project_search(&cwd);
    if let Some(ref config_path) = cli.config {
        let config_path = camino::Utf8PathBuf::try_from(config_path.clone()).map_err(|e| {
            anyhow::anyhow!(
                "config path is not valid UTF-8: {}",
                e.into_path_buf().display()
            )
        })?;
        loader = loader.with_file(&config_path);
    }
    let config = loader.load().context("failed to load configuration")?;

    let obs_config = observability::ObservabilityConfig::new(config.log_dir.clone());
    let env_filter = observability::env_filter(cli.quiet, cli.verbose, config.log_level.as_str());
    let _guard = observability::init_observability(&obs_config, env_filter)
        .context("failed to initialize logging/tracing")?;

    debug!(
        verbose = cli.verbose,
        quiet = cli.quiet,
        json = cli.json,
        color = ?cli.color,
        chdir = ?cli.chdir,
        project_config = ?find_project_config(&cwd),
        "CLI initialized"
    );

    let result =
        commands::ship::cmd_ship(cli.ship, cli.json, &config, &cwd, &SystemRunner);
    if let Err(ref err) = result {
        tracing::error!(error = %format!("{err:#}"), "fatal error");
    }
    result
}

/// Print `err` and map it to the process exit code.
///
/// A rejected instruction prints the usage line and exits 1. A failed
/// external command exits with that command's own code.
fn report(err: &anyhow::Error) -> ExitCode {
    let ship_err = err.downcast_ref::<ShipError>();

    if let Some(ShipError::Usage { argument, usage }) = ship_err {
        eprintln!("{}", format!("Invalid version argument: {argument}").red());
        eprintln!("USAGE: {usage}");
        return ExitCode::FAILURE;
    }

    eprintln!("{} {err:#}", "error:".red().bold());
    let code = ship_err.map_or(1, ShipError::exit_code);
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
