use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use diagnostics::{LogLevel, error, init_with_default};

use cmd::commands::{cat_command, run_command};
use cmd::common::{TableChoice, resolve_config};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(name = "medalpond")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Log run progress (info level) unless MEDALPOND_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,
    /// YAML configuration file (defaults to MEDALPOND_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Directory holding datasets/ and outputs/ when no configuration is given
    #[arg(long, global = true)]
    root: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Upsert the reference and results tables, then rebuild the denormalized table
    Run,
    /// Print a persisted table
    Cat {
        /// Table to print
        #[arg(value_enum)]
        table: TableChoice,
        /// Print at most this many rows
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_with_default(if cli.verbose { LogLevel::Info } else { LogLevel::Off });

    let result = resolve_config(cli.config.as_deref(), cli.root.as_deref()).and_then(|config| {
        match cli.command {
            Commands::Run => run_command(config, None).map(|_| ()),
            Commands::Cat { table, limit } => cat_command(&config, table, limit, None),
        }
    });

    if let Err(e) = &result {
        let message = format!("{e:#}");
        error!("medalpond failed: {message}", message: message);
    }
    result
}
