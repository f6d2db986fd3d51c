//! Waveplan CLI - conversion planning from the command line.
//!
//! Reads dependency graph payloads produced by a codebase analyzer and writes
//! a wave-scheduled conversion plan.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

mod cli;

/// Waveplan: risk-ordered, wave-scheduled conversion planning.
#[derive(Parser)]
#[command(name = "waveplan")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a conversion plan and write it to the output directory
    Plan(cli::plan::PlanArgs),

    /// Check graph payloads for integrity problems and report import cycles
    Validate {
        /// Graph payload files (JSON)
        #[arg(required = true)]
        graphs: Vec<PathBuf>,
    },

    /// Print the JSON Schema of the graph payload
    Schema,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Plan(args) => cli::plan::run(&args),
        Commands::Validate { graphs } => cli::validate::run(&graphs),
        Commands::Schema => cli::schema::run(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {e}", "error".red().bold());
            // Show cause chain for nested errors
            for cause in e.chain().skip(1) {
                eprintln!("  {}: {cause}", "caused by".dimmed());
            }
            if let Some(err) = e.downcast_ref::<waveplan::Error>()
                && !err.is_input_error()
            {
                eprintln!(
                    "  {}: this is a bug in waveplan, not a problem with the input",
                    "note".yellow()
                );
            }
            ExitCode::from(cli::exit_code(&e))
        }
    }
}
