// SPDX-License-Identifier: MIT
//
// employer: runs a workshop of forking and threading employees.
//
// - `process` (default) loads the configuration, optionally queues jobs from a
//   JSON file and works the queue until SIGINT/SIGTERM.
// - `configure` writes a default configuration file.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use employer::{MemoryBackend, Workshop, WorkshopConfig};
use log::info;

mod jobs;
mod signals;

const DEFAULT_CONFIG: &str = "config/employer.json";

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path of the workshop configuration
    #[arg(long, global = true, value_name = "FILE", default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    /// JSON array of job records to queue before processing starts
    #[arg(long, global = true, value_name = "FILE")]
    jobs: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
enum Command {
    /// Process jobs until interrupted (default)
    Process,
    /// Generate a configuration file
    Configure,
}

fn validate_args(args: &Args) -> Result<(), String> {
    if args.command == Some(Command::Configure) && args.jobs.is_some() {
        return Err("--jobs can only be used with process".into());
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if let Err(e) = validate_args(&args) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }

    match args.command.unwrap_or(Command::Process) {
        Command::Process => process(&args.config, args.jobs.as_deref()),
        Command::Configure => configure(&args.config),
    }
}

fn process(config_path: &Path, jobs_path: Option<&Path>) -> anyhow::Result<()> {
    if !config_path.exists() {
        eprintln!("{} does not exist.", config_path.display());
        std::process::exit(1);
    }
    let config = WorkshopConfig::load(config_path)?;

    let mut workshop = Workshop::new(&config, jobs::registry(), Box::new(MemoryBackend::new()))?;
    if let Some(jobs_path) = jobs_path {
        jobs::seed(workshop.pipeline(), jobs_path)?;
    }
    signals::install(workshop.stop_handle()).context("cannot install signal handlers")?;

    info!("Starting employer");
    workshop.run()?;
    info!("Stopping employer after {} stop signal(s)", signals::received());
    Ok(())
}

fn configure(config_path: &Path) -> anyhow::Result<()> {
    if config_path.exists() {
        eprintln!("{} already exists.", config_path.display());
        std::process::exit(1);
    }
    if let Some(dir) = config_path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("cannot create {}", dir.display()))?;
    }
    let json = WorkshopConfig::default().to_json_pretty()?;
    fs::write(config_path, json + "\n")
        .with_context(|| format!("cannot write {}", config_path.display()))?;
    info!("Wrote {}", config_path.display());
    Ok(())
}
