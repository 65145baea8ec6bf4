//! CLI argument parsing with clap derive

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::app::{AppContext, OutputFlags};
use crate::commands;

/// Provision infrastructure modules, validate them, and tear them down
#[derive(Parser)]
#[command(
    name = "stackcheck",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Apply, validate and destroy every module in the suite
    Run(commands::run::RunArgs),

    /// Show the apply order without provisioning anything
    Plan(commands::SuiteArgs),

    /// Destroy modules left behind by interrupted runs
    Cleanup(commands::cleanup::CleanupArgs),

    /// Show version
    Version,
}

impl Cli {
    /// Whether JSON output was requested, for error formatting in `main`.
    #[must_use]
    pub fn wants_json(&self) -> bool {
        self.json
    }

    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails before producing a report.
    pub async fn run(self) -> Result<ExitCode> {
        let Cli {
            no_color,
            quiet,
            json,
            command,
        } = self;
        let app = AppContext::new(&OutputFlags {
            no_color,
            quiet,
            json,
        });

        match command {
            Command::Run(args) => commands::run::run(&app, &args).await,
            Command::Plan(args) => commands::plan::run(&app, &args),
            Command::Cleanup(args) => commands::cleanup::run(&app, &args).await,
            Command::Version => {
                commands::version::run(&app);
                Ok(ExitCode::SUCCESS)
            }
        }
    }
}
