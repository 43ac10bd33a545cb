//! CLI module for the quaymaster agent.
//!
//! This module provides the command-line interface for running and
//! inspecting the reconciliation agent.

mod commands;
mod output;

pub use commands::{Cli, Commands, OutputFormat};
pub use output::OutputFormatter;
