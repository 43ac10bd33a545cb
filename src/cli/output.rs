//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying plans,
//! inventory, and pass outcomes in text or JSON form.

use colored::Colorize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::agent::PassSummary;
use crate::planner::ReconciliationPlan;
use crate::runtime::{LocalContainerRecord, RuntimeState};

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Plan action row for table display.
#[derive(Tabled)]
struct PlanActionRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Container")]
    container: String,
    #[tabled(rename = "Image")]
    image: String,
}

/// Inventory row for table display.
#[derive(Tabled)]
struct InventoryRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Tag")]
    tag: String,
    #[tabled(rename = "Image")]
    image: String,
    #[tabled(rename = "ID")]
    id: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a reconciliation plan for display.
    #[must_use]
    pub fn format_plan(&self, plan: &ReconciliationPlan) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(plan).unwrap_or_default(),
            OutputFormat::Text => Self::format_plan_text(plan),
        }
    }

    /// Formats a plan as text.
    fn format_plan_text(plan: &ReconciliationPlan) -> String {
        if plan.is_empty() {
            return format!(
                "{} No changes required - containers match the desired state.\n",
                "✓".green()
            );
        }

        let mut output = String::from("\nReconciliation Plan\n\n");

        let mut rows: Vec<PlanActionRow> = Vec::with_capacity(plan.action_count());

        for identity in &plan.to_stop {
            rows.push(PlanActionRow {
                index: rows.len() + 1,
                action: "-stop".red().to_string(),
                container: identity.name.clone(),
                image: Self::truncate(&identity.image, 40),
            });
        }

        for entry in &plan.to_start {
            rows.push(PlanActionRow {
                index: rows.len() + 1,
                action: "+start".green().to_string(),
                container: entry.name.clone(),
                image: Self::truncate(&entry.spec.image_reference(), 40),
            });
        }

        let table = Table::new(rows).to_string();
        output.push_str(&table);
        output.push('\n');

        let _ = write!(
            output,
            "\nPlan: {} to stop, {} to start\n",
            plan.stop_count().to_string().red(),
            plan.start_count().to_string().green()
        );

        output
    }

    /// Formats the local container inventory for display.
    #[must_use]
    pub fn format_inventory(&self, records: &[LocalContainerRecord]) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(records).unwrap_or_default(),
            OutputFormat::Text => Self::format_inventory_text(records),
        }
    }

    /// Formats inventory as text.
    fn format_inventory_text(records: &[LocalContainerRecord]) -> String {
        if records.is_empty() {
            return String::from("No containers found.\n");
        }

        let rows: Vec<InventoryRow> = records
            .iter()
            .map(|record| {
                let identity = record.identity();
                InventoryRow {
                    name: identity.name,
                    state: Self::format_runtime_state(record.state),
                    tag: identity.tag.unwrap_or_else(|| String::from("-")),
                    image: Self::truncate(&identity.image, 40),
                    id: Self::truncate(&record.id, 12),
                }
            })
            .collect();

        let mut output = Table::new(rows).to_string();
        output.push('\n');

        let running = records.iter().filter(|r| r.is_running()).count();
        let _ = write!(
            output,
            "\n{} containers, {} running\n",
            records.len(),
            running
        );

        output
    }

    /// Formats a pass summary.
    #[must_use]
    pub fn format_summary(&self, summary: &PassSummary) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(summary).unwrap_or_default(),
            OutputFormat::Text => {
                let status = if summary.succeeded() {
                    format!("{} Reconciliation pass completed", "✓".green())
                } else {
                    format!("{} Reconciliation pass failed", "✗".red())
                };

                let mut output = format!("{status}\n\n");
                let _ = writeln!(output, "   Pass: {}", summary.pass_id);
                let _ = writeln!(output, "   Delta: {}", &summary.delta_hash[..8]);
                let _ = writeln!(output, "   Stopped: {}", summary.stopped);
                let _ = writeln!(output, "   Started: {}", summary.started);
                let _ = writeln!(output, "   Failed: {}", summary.failed);

                if !summary.errors.is_empty() {
                    let _ = write!(output, "\n{} Errors:\n", "⚠".yellow());
                    for error in &summary.errors {
                        let _ = writeln!(output, "   - {error}");
                    }
                }

                output
            }
        }
    }

    /// Formats a runtime state with color.
    fn format_runtime_state(state: RuntimeState) -> String {
        match state {
            RuntimeState::Running => "running".green().to_string(),
            RuntimeState::Restarting => "restarting".yellow().to_string(),
            RuntimeState::Exited | RuntimeState::Dead => state.to_string().red().to_string(),
            RuntimeState::Paused | RuntimeState::Removing => state.to_string().yellow().to_string(),
            RuntimeState::Unknown => "unknown".dimmed().to_string(),
        }
    }

    /// Truncates a string to a maximum length.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.len() <= max_len {
            s.to_string()
        } else {
            format!("{}...", &s[..max_len - 3])
        }
    }
}
