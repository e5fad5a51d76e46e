//! DackBox CLI
//!
//! Command-line tools for inspecting DackBox file stores.
//!
//! # Commands
//!
//! - `inspect` - Display row and graph statistics
//! - `refs` - Print the forward or backward refs of a key
//! - `verify` - Decode every graph row and check edge symmetry
//! - `dirty` - List keys waiting for secondary indexing
//! - `compact` - Rewrite the store log

mod commands;
mod error;
mod keys;

use clap::{Parser, Subcommand, ValueEnum};
use dackbox_core::Config;
use error::{CliError, CliResult};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// DackBox command-line store tools.
#[derive(Parser)]
#[command(name = "dackbox")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    /// Prefix of the persisted graph rows
    #[arg(global = true, long, default_value = "graph")]
    graph_prefix: String,

    /// Prefix of the dirty-key rows
    #[arg(global = true, long, default_value = "dirty")]
    dirty_prefix: String,

    #[command(subcommand)]
    command: Commands,
}

/// Output format of the reporting commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// Pretty-printed JSON
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Display row and graph statistics
    Inspect {
        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Print the refs of a key (write the bucket separator as \0)
    Refs {
        /// The key to look up
        key: String,

        /// Print the keys referencing KEY instead of the keys it references
        #[arg(long)]
        to: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Decode every graph row and check edge symmetry
    Verify,

    /// List keys waiting for secondary indexing
    Dirty {
        /// Acknowledge every listed key afterwards
        #[arg(long)]
        ack: bool,
    },

    /// Rewrite the store log as a single record
    Compact,
}

impl Cli {
    fn config(&self) -> Config {
        Config::new()
            .graph_prefix(self.graph_prefix.as_bytes())
            .dirty_prefix(self.dirty_prefix.as_bytes())
    }

    fn path(&self, command: &'static str) -> CliResult<PathBuf> {
        self.path
            .clone()
            .ok_or(CliError::MissingPath { command })
    }
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

    let config = cli.config();
    match &cli.command {
        Commands::Inspect { format } => {
            let path = cli.path("inspect")?;
            commands::inspect::run(&path, &config, *format)?;
        }
        Commands::Refs { key, to, format } => {
            let path = cli.path("refs")?;
            let key = keys::parse_key(key)?;
            commands::refs::run(&path, &config, &key, *to, *format)?;
        }
        Commands::Verify => {
            let path = cli.path("verify")?;
            commands::verify::run(&path, &config)?;
        }
        Commands::Dirty { ack } => {
            let path = cli.path("dirty")?;
            commands::dirty::run(&path, &config, *ack)?;
        }
        Commands::Compact => {
            let path = cli.path("compact")?;
            commands::compact::run(&path)?;
        }
    }

    Ok(())
}
