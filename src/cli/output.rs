//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying plans and run
//! results to the user in text or JSON form.

use colored::Colorize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::document::DesiredDocument;
use crate::planner::{Action, Plan};
use crate::report::{OperationStatus, RunResult};

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Plan operation row for table display.
#[derive(Tabled)]
struct PlanRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Identity")]
    identity: String,
}

/// Per-kind result row for table display.
#[derive(Tabled)]
struct ResultRow {
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Succeeded")]
    succeeded: usize,
    #[tabled(rename = "Failed")]
    failed: usize,
    #[tabled(rename = "Skipped")]
    skipped: usize,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a plan for display.
    #[must_use]
    pub fn format_plan(&self, plan: &Plan, detailed: bool) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(plan).unwrap_or_default(),
            OutputFormat::Text => Self::format_plan_text(plan, detailed),
        }
    }

    /// Formats a plan as text.
    fn format_plan_text(plan: &Plan, detailed: bool) -> String {
        if plan.is_empty() {
            return format!("{} No changes required - tenant is up to date.\n", "✓".green());
        }

        let mut output = String::new();

        let rows: Vec<PlanRow> = plan
            .operations
            .iter()
            .enumerate()
            .map(|(i, op)| PlanRow {
                index: i + 1,
                action: Self::format_action(op.action),
                kind: op.kind.to_string(),
                identity: Self::truncate(op.identity.as_str(), 40),
            })
            .collect();

        let table = Table::new(rows).to_string();
        output.push_str(&table);
        output.push('\n');

        let _ = write!(
            output,
            "\nPlan: {} to create, {} to update, {} to delete\n",
            plan.count(Action::Create).to_string().green(),
            plan.count(Action::Update).to_string().yellow(),
            plan.count(Action::Delete).to_string().red()
        );

        if detailed {
            output.push_str("\nDependencies:\n");
            for (i, op) in plan.operations.iter().enumerate() {
                if op.depends_on.is_empty() {
                    let _ = writeln!(output, "   {}. {op} (no prerequisites)", i + 1);
                } else {
                    let deps: Vec<String> =
                        op.depends_on.iter().map(|d| (d + 1).to_string()).collect();
                    let _ = writeln!(output, "   {}. {op} (after {})", i + 1, deps.join(", "));
                }
            }
        }

        output
    }

    /// Formats a run result for display.
    #[must_use]
    pub fn format_result(&self, result: &RunResult) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(result).unwrap_or_default(),
            OutputFormat::Text => Self::format_result_text(result),
        }
    }

    /// Formats a run result as text.
    fn format_result_text(result: &RunResult) -> String {
        let status = if result.success() {
            format!("{} Deploy successful", "✓".green())
        } else {
            format!("{} Deploy finished with problems", "✗".red())
        };

        let mut output = format!("{status}\n\n");
        let _ = writeln!(output, "   Run: {}", result.run_id);
        let _ = writeln!(output, "   Succeeded: {}", result.succeeded());
        let _ = writeln!(output, "   Failed: {}", result.failed());
        let _ = writeln!(output, "   Skipped: {}", result.skipped());

        let rows: Vec<ResultRow> = result
            .per_kind()
            .into_iter()
            .map(|(kind, summary)| ResultRow {
                kind: kind.to_string(),
                succeeded: summary.succeeded,
                failed: summary.failed,
                skipped: summary.skipped,
            })
            .collect();

        if !rows.is_empty() {
            output.push('\n');
            output.push_str(&Table::new(rows).to_string());
            output.push('\n');
        }

        let problems: Vec<String> = result
            .outcomes
            .iter()
            .filter_map(|outcome| match &outcome.status {
                OperationStatus::Succeeded => None,
                OperationStatus::Failed(reason) => Some(format!(
                    "{} {} '{}': {reason}",
                    outcome.action, outcome.kind, outcome.identity
                )),
                OperationStatus::Skipped(reason) => Some(format!(
                    "{} {} '{}': skipped ({reason})",
                    outcome.action, outcome.kind, outcome.identity
                )),
            })
            .collect();

        if !problems.is_empty() {
            let _ = write!(output, "\n{} Problems:\n", "⚠".yellow());
            for problem in &problems {
                let _ = writeln!(output, "   - {problem}");
            }
        }

        output
    }

    /// Formats a validated document summary.
    #[must_use]
    pub fn format_document(&self, document: &DesiredDocument) -> String {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(document).unwrap_or_default()
            }
            OutputFormat::Text => {
                let mut output = format!("{} Document is valid.\n\nSections:\n", "✓".green());
                for kind in document.kinds() {
                    let _ = writeln!(
                        output,
                        "   {kind}: {} record(s)",
                        document.records(kind).len()
                    );
                }
                output
            }
        }
    }

    /// Formats an action with color.
    fn format_action(action: Action) -> String {
        match action {
            Action::Create => "+create".green().to_string(),
            Action::Update => "~update".yellow().to_string(),
            Action::Delete => "-delete".red().to_string(),
        }
    }

    /// Truncates a string to a maximum number of characters.
    ///
    /// Counts characters rather than bytes so multibyte identities never
    /// split mid-character.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{head}...")
        }
    }
}
