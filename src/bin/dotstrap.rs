// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use dotstrap::{
    path::default_config_path, playbook::PlaybookOptions, Bootstrap, Options, Settings,
    SystemSyscall,
};

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::{io::IsTerminal, path::PathBuf, process::exit};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "\n  dotstrap [options]\n  dotstrap [options] <dotstrap-command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, global = true, value_name = "path")]
    pub config: Option<PathBuf>,

    /// Prompt for privilege escalation password when running the playbook.
    #[arg(short = 'K', long, global = true)]
    pub ask_become_pass: bool,

    /// Dry-run the playbook without changing anything.
    #[arg(long, global = true)]
    pub check: bool,

    /// Do not draw progress bars.
    #[arg(long, global = true)]
    pub no_progress: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    async fn run(self) -> Result<()> {
        let settings = load_settings(self.config.clone())?;
        let options = Options {
            playbook: PlaybookOptions {
                ask_become_pass: self.ask_become_pass,
                check: self.check,
            },
            progress: !self.no_progress && std::io::stderr().is_terminal(),
        };
        let bootstrap = Bootstrap::new(settings, SystemSyscall, options);

        match self.command.unwrap_or(Command::Bootstrap) {
            Command::Bootstrap => run_bootstrap(&bootstrap).await,
            Command::Update => run_update(&bootstrap),
            Command::Check => run_check(&bootstrap),
            Command::Config => run_config(&bootstrap),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Install prerequisites, fetch repositories, and run the playbook (default).
    Bootstrap,

    /// Refresh installed packages without fetching any repository.
    Update,

    /// Show what is installed and what the next run would include.
    Check,

    /// Print effective configuration.
    Config,
}

#[tokio::main]
async fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_timer(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run().await {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

async fn run() -> Result<()> {
    Cli::parse().run().await
}

fn load_settings(path: Option<PathBuf>) -> Result<Settings> {
    let settings = match path {
        Some(path) => Settings::load(path, true)?,
        None => Settings::load(default_config_path()?, false)?,
    };

    Ok(settings)
}

async fn run_bootstrap(bootstrap: &Bootstrap) -> Result<()> {
    let report = bootstrap.run().await?;
    if report.is_converged() {
        info!("nothing changed, machine already converged");
    }

    Ok(())
}

fn run_update(bootstrap: &Bootstrap) -> Result<()> {
    bootstrap.update()?;
    Ok(())
}

fn run_check(bootstrap: &Bootstrap) -> Result<()> {
    print!("{}", bootstrap.check());
    Ok(())
}

fn run_config(bootstrap: &Bootstrap) -> Result<()> {
    print!("{}", bootstrap.settings());
    Ok(())
}
