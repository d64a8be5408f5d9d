//! Command-line interface for stored reports.

use anyhow::Result;
use clap::{Parser, Subcommand};

pub mod commands;
mod output;

use commands::list::ListArgs;
use commands::run::RunArgs;

/// Parameterized SQL reports: run stored definitions and export the output.
#[derive(Parser)]
#[command(name = "reports", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a stored report and print the output
    Run(RunArgs),
    /// List stored report definitions
    List(ListArgs),
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Run(args) => commands::run::execute(args).await,
            Commands::List(args) => commands::list::execute(args).await,
        }
    }
}
