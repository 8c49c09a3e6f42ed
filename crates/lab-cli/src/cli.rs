use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// lab — multi-participant conversation engine and task scheduler.
#[derive(Debug, Parser)]
#[command(name = "lab-cli", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start a conversation from a preset file and stream its events to stdout.
    Run {
        /// Path to a preset TOML document.
        preset: PathBuf,
        /// Topic/objective for this conversation, overriding the preset's own.
        #[arg(long)]
        topic: String,
        /// Thread id to use (generated if omitted).
        #[arg(long)]
        id: Option<String>,
        /// Resume from an existing checkpoint instead of starting fresh.
        #[arg(long)]
        resume: bool,
        /// Number of iterations to run before stopping.
        #[arg(long, default_value_t = 10)]
        rounds: i64,
        /// Print each event as a JSON line instead of a human-readable summary.
        #[arg(long)]
        json: bool,
    },
    /// Run diagnostic checks against the current configuration.
    Doctor,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Task scheduler utilities.
    #[command(subcommand)]
    Tasks(TasksCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

#[derive(Debug, Subcommand)]
pub enum TasksCommand {
    /// Parse a tasks TOML file and report, for each task, whether it is
    /// due right now. Does not execute any pipeline (no concrete
    /// source/sink adapters are compiled into this binary).
    Validate {
        /// Path to a tasks TOML document.
        path: PathBuf,
    },
}
