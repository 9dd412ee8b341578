//! Plan and operation types.
//!
//! A plan is the full ordered sequence of operations across all kinds,
//! topologically valid with respect to the declared dependency edges.
//! Operations are immutable once planned; only their execution status
//! mutates, and that lives in the run result.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::document::{Identity, ResourceKind};

/// The remote effect an operation performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Create a record that exists in desired state only.
    Create,
    /// Update a record whose normalized payload differs.
    Update,
    /// Delete a record absent from desired state (fully-managed kinds only).
    Delete,
}

/// A single planned operation against the remote.
#[derive(Debug, Clone, Serialize)]
pub struct Operation {
    /// Kind the operation applies to.
    pub kind: ResourceKind,
    /// The remote effect.
    pub action: Action,
    /// Natural identity of the affected record.
    pub identity: Identity,
    /// Payload for create/update; `None` for delete.
    pub payload: Option<Value>,
    /// Short fingerprint of the normalized payload, for display.
    pub fingerprint: Option<String>,
    /// Indices of operations that must complete before this one.
    ///
    /// Always refer to earlier positions in the plan.
    pub depends_on: Vec<usize>,
}

impl Operation {
    /// Returns a human-readable description of the operation.
    #[must_use]
    pub fn description(&self) -> String {
        format!("{} {} '{}'", self.action, self.kind, self.identity)
    }
}

/// The ordered, dependency-valid sequence of operations for one run.
#[derive(Debug, Serialize)]
pub struct Plan {
    /// When the plan was computed.
    pub created_at: DateTime<Utc>,
    /// Operations in execution order.
    pub operations: Vec<Operation>,
}

impl Plan {
    /// Creates an empty plan (nothing to do).
    #[must_use]
    pub fn empty() -> Self {
        Self {
            created_at: Utc::now(),
            operations: vec![],
        }
    }

    /// Returns true if the plan contains no operations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Returns the number of operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Returns the number of operations with the given action.
    #[must_use]
    pub fn count(&self, action: Action) -> usize {
        self.operations
            .iter()
            .filter(|op| op.action == action)
            .count()
    }

    /// Returns operations eligible to start immediately (no dependencies).
    #[must_use]
    pub fn ready_operations(&self) -> Vec<&Operation> {
        self.operations
            .iter()
            .filter(|op| op.depends_on.is_empty())
            .collect()
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())?;
        if let Some(fp) = &self.fingerprint {
            write!(f, " ({fp})")?;
        }
        Ok(())
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.operations.is_empty() {
            return write!(f, "No changes required");
        }

        writeln!(f, "Plan ({} operations):", self.operations.len())?;
        for (i, op) in self.operations.iter().enumerate() {
            writeln!(f, "  {i}. {op}")?;
        }
        Ok(())
    }
}
