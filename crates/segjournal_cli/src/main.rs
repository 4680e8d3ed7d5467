//! segjournal CLI
//!
//! Command-line tools for inspecting and maintaining segjournal journals.
//!
//! # Commands
//!
//! - `inspect` - Display segments, index ranges and sizes
//! - `verify` - Check every frame checksum and segment contiguity
//! - `dump` - Print frames for debugging
//! - `compact` - Delete segments below an index

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// segjournal command-line journal tools.
#[derive(Parser)]
#[command(name = "segjournal")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the journal directory
    #[arg(global = true, short, long, default_value = ".")]
    path: PathBuf,

    /// Journal name; segment files are named `{name}-{id}.log`
    #[arg(global = true, short, long, default_value = "journal")]
    name: String,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Output format for reporting commands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Human-readable text
    Text,
    /// Pretty-printed JSON
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Display segments, index ranges and sizes
    Inspect {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Check every frame checksum and segment contiguity
    Verify,

    /// Print frames for debugging
    Dump {
        /// First index to print
        #[arg(long, default_value = "1")]
        from: u64,

        /// Maximum number of frames to print
        #[arg(short, long)]
        limit: Option<usize>,

        /// Number of payload bytes to show as hex (0 to hide)
        #[arg(long, default_value = "16")]
        hex: usize,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Delete every segment below the one holding an index
    Compact {
        /// Index to compact up to
        #[arg(short, long)]
        index: u64,

        /// Dry run - show what would be done
        #[arg(short, long)]
        dry_run: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Inspect { format } => {
            commands::inspect::run(&cli.path, &cli.name, format)?;
        }
        Commands::Verify => {
            commands::verify::run(&cli.path, &cli.name)?;
        }
        Commands::Dump {
            from,
            limit,
            hex,
            format,
        } => {
            commands::dump::run(&cli.path, &cli.name, from, limit, hex, format)?;
        }
        Commands::Compact { index, dry_run } => {
            commands::compact::run(&cli.path, &cli.name, index, dry_run)?;
        }
    }

    Ok(())
}
