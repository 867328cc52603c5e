//! pagesnap CLI - Command-line interface
//!
//! Offline tooling around the pagesnap library: checking screenshot requests
//! before they are submitted and managing the configuration file.

mod commands;
mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::config::ConfigCommands;
use error::CliError;

#[derive(Parser)]
#[command(name = "pagesnap")]
#[command(version = pagesnap::VERSION)]
#[command(about = "Screenshot job scheduler tooling", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a screenshot request and print the resulting job plan
    Validate {
        /// Path to a JSON request file, or '-' to read from stdin
        request: PathBuf,

        /// Print compact JSON instead of pretty-printed output
        #[arg(long)]
        compact: bool,

        /// Mirror log output (e.g. device fallback warnings) to stdout
        #[arg(long)]
        verbose: bool,
    },

    /// View or modify the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();

    let result: Result<(), CliError> = match cli.command {
        Commands::Validate {
            request,
            compact,
            verbose,
        } => commands::validate::run(&request, compact, verbose),
        Commands::Config { command } => commands::config::run(command),
    };

    if let Err(e) = result {
        e.exit();
    }
}
