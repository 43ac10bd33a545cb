//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Quaymaster - host-side container reconciliation agent.
#[derive(Parser, Debug)]
#[command(name = "quaymaster")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the agent configuration file.
    #[arg(short, long, global = true, env = "QUAYMASTER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new agent configuration.
    Init {
        /// Directory to initialize (defaults to current directory).
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Force overwrite existing files.
        #[arg(short, long)]
        force: bool,
    },

    /// Validate the agent configuration (and the delta file, if configured).
    Validate {
        /// Show all warnings, not just errors.
        #[arg(short, long)]
        warnings: bool,
    },

    /// Compute and display the plan for a delta without applying it.
    Plan {
        /// Path to the desired-state delta document.
        #[arg(short, long)]
        delta: PathBuf,
    },

    /// Run a single reconciliation pass for a delta.
    Apply {
        /// Path to the desired-state delta document.
        #[arg(short, long)]
        delta: PathBuf,
    },

    /// Show the local container inventory with derived identities.
    Status,

    /// Watch the delta file and reconcile on every change.
    Run {
        /// Path to the desired-state delta document (overrides config).
        #[arg(short, long)]
        delta: Option<PathBuf>,

        /// Poll interval in seconds (overrides config).
        #[arg(short, long)]
        interval: Option<u64>,
    },
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
