use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use crate::config::{LaunchConfig, Overrides, discover_config};
use crate::console::{pause_for, prepare_console};
use crate::launcher::{Launcher, PREFLIGHT_FAILURE};
use crate::preflight::run_preflight;
use crate::probe::{current_os, probe_interpreter};
use crate::process::SystemRunner;

/// Exit code for configuration and usage errors.
const CONFIG_FAILURE: i32 = 2;

#[derive(Debug, Parser)]
#[command(
    name = "venv-launcher",
    version,
    about = "Check a Python virtual environment and run the project's entry point in it"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
    /// Project directory (defaults to the current directory)
    #[arg(long, global = true)]
    project_dir: Option<PathBuf>,
    /// Virtual environment directory, relative to the project
    #[arg(long = "venv", global = true)]
    venv_dir: Option<PathBuf>,
    /// Entry-point script, relative to the project
    #[arg(long = "entry", global = true)]
    entry_point: Option<PathBuf>,
    /// Path to a launcher.json config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Do not wait for Enter before exiting
    #[arg(long, global = true)]
    no_pause: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the pre-flight checks and launch the entry point (default)
    Run,
    /// Run the pre-flight checks only and print the activated environment as JSON
    Check {
        /// Emit compact JSON instead of pretty output
        #[arg(long)]
        raw: bool,
    },
    /// Run the pre-flight checks and print interpreter diagnostics as JSON
    Probe {
        /// Emit compact JSON instead of pretty output
        #[arg(long)]
        raw: bool,
    },
}

pub fn run() -> i32 {
    // Must run before clap prints usage or parse errors.
    let os = current_os();
    prepare_console(&os);
    let cli = Cli::parse();

    match dispatch(cli, &os) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            CONFIG_FAILURE
        }
    }
}

fn dispatch(cli: Cli, os: &str) -> anyhow::Result<i32> {
    let cwd = std::env::current_dir().context("resolving current directory")?;
    let file = discover_config(cli.config.as_deref(), &cwd)?;
    let overrides = Overrides {
        project_dir: cli.project_dir,
        venv_dir: cli.venv_dir,
        entry_point: cli.entry_point,
        no_pause: cli.no_pause,
    };
    let config = LaunchConfig::resolve(file, overrides, &cwd).context("invalid configuration")?;
    let runner = SystemRunner;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            let mut pause = pause_for(config.pause);
            Ok(Launcher::new(config, os, &runner, pause.as_mut()).run())
        }
        Commands::Check { raw } => {
            let preflight = match run_preflight(&config, os, std::env::var_os("PATH"), |_| {}) {
                Ok(preflight) => preflight,
                Err(err) => {
                    eprintln!("[ERROR] {err}");
                    return Ok(PREFLIGHT_FAILURE);
                }
            };
            print_json(&preflight, raw)?;
            Ok(0)
        }
        Commands::Probe { raw } => {
            let preflight = match run_preflight(&config, os, std::env::var_os("PATH"), |_| {}) {
                Ok(preflight) => preflight,
                Err(err) => {
                    eprintln!("[ERROR] {err}");
                    return Ok(PREFLIGHT_FAILURE);
                }
            };
            let report = probe_interpreter(&preflight.env, &preflight.project_dir, &runner);
            print_json(&report, raw)?;
            Ok(0)
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T, raw: bool) -> anyhow::Result<()> {
    if raw {
        println!("{}", serde_json::to_string(value)?);
    } else {
        println!("{}", serde_json::to_string_pretty(value)?);
    }
    Ok(())
}
