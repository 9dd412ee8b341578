//! Run results: per-operation outcomes and per-kind aggregation.
//!
//! The run result is the only artifact surfaced to the caller after an
//! apply. It is accumulated while the executor drains the plan and is
//! read-only once the run completes.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::document::{Identity, ResourceKind};
use crate::planner::Action;

/// Why an operation was skipped rather than executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    /// An operation this one depends on did not succeed.
    UpstreamFailure,
    /// The run was cancelled before this operation was dispatched.
    Cancelled,
}

/// Terminal status of one operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "status", content = "reason")]
pub enum OperationStatus {
    /// The remote mutation was applied.
    Succeeded,
    /// The remote call failed after any retries.
    Failed(String),
    /// The operation was never dispatched.
    Skipped(SkipReason),
}

/// Outcome of a single planned operation.
#[derive(Debug, Clone, Serialize)]
pub struct OperationOutcome {
    /// Kind of the operation.
    pub kind: ResourceKind,
    /// Action of the operation.
    pub action: Action,
    /// Identity of the affected record.
    pub identity: Identity,
    /// Terminal status.
    pub status: OperationStatus,
    /// Remote call attempts made (0 for skipped operations).
    pub attempts: u32,
}

/// Per-kind aggregation of outcomes.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct KindSummary {
    /// Operations that succeeded.
    pub succeeded: usize,
    /// Operations that failed.
    pub failed: usize,
    /// Operations that were skipped.
    pub skipped: usize,
}

/// The aggregate result of one apply run.
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    /// Unique identifier for this run.
    pub run_id: Uuid,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub finished_at: DateTime<Utc>,
    /// Per-operation outcomes in plan order.
    pub outcomes: Vec<OperationOutcome>,
}

impl RunResult {
    /// Creates a result for a run that finished now.
    #[must_use]
    pub fn new(started_at: DateTime<Utc>, outcomes: Vec<OperationOutcome>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at,
            finished_at: Utc::now(),
            outcomes,
        }
    }

    /// Returns the number of succeeded operations.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == OperationStatus::Succeeded)
            .count()
    }

    /// Returns the number of failed operations.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, OperationStatus::Failed(_)))
            .count()
    }

    /// Returns the number of skipped operations.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, OperationStatus::Skipped(_)))
            .count()
    }

    /// Returns true if every operation succeeded.
    #[must_use]
    pub fn success(&self) -> bool {
        self.failed() == 0 && self.skipped() == 0
    }

    /// Aggregates outcomes per kind.
    #[must_use]
    pub fn per_kind(&self) -> BTreeMap<ResourceKind, KindSummary> {
        let mut summary: BTreeMap<ResourceKind, KindSummary> = BTreeMap::new();
        for outcome in &self.outcomes {
            let entry = summary.entry(outcome.kind).or_default();
            match &outcome.status {
                OperationStatus::Succeeded => entry.succeeded += 1,
                OperationStatus::Failed(_) => entry.failed += 1,
                OperationStatus::Skipped(_) => entry.skipped += 1,
            }
        }
        summary
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::UpstreamFailure => "upstream-failure",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for RunResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Run {}: {} succeeded, {} failed, {} skipped",
            self.run_id,
            self.succeeded(),
            self.failed(),
            self.skipped()
        )?;
        for outcome in &self.outcomes {
            match &outcome.status {
                OperationStatus::Succeeded => {}
                OperationStatus::Failed(reason) => writeln!(
                    f,
                    "  failed: {} {} '{}': {reason}",
                    outcome.action, outcome.kind, outcome.identity
                )?,
                OperationStatus::Skipped(reason) => writeln!(
                    f,
                    "  skipped: {} {} '{}' ({reason})",
                    outcome.action, outcome.kind, outcome.identity
                )?,
            }
        }
        Ok(())
    }
}
