//! Cross-kind dependency scheduling.
//!
//! Linearizes the per-kind operation lists into a single plan that is
//! topologically valid with respect to the declared dependency edges:
//! creates/updates of a dependency kind precede those of dependent kinds,
//! and deletes run in reverse. Ties between unrelated kinds preserve the
//! input order, which is the document's declaration order, so plans are
//! deterministic and reproducible.

use std::collections::HashMap;
use tracing::debug;

use crate::document::ResourceKind;
use crate::error::{PlanError, Result};
use crate::registry::spec_of;

use super::plan::{Action, Operation, Plan};

/// Orders per-kind operation lists into an executable plan.
#[derive(Debug, Default)]
pub struct Scheduler;

impl Scheduler {
    /// Creates a new scheduler.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Linearizes per-kind operations into a plan.
    ///
    /// The output order is fully determined by the dependency edges and the
    /// order of the `per_kind` entries; unrelated kinds keep their given
    /// order.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::CyclicDependency`] if the declared edges form a
    /// cycle. No partial plan is produced.
    pub fn schedule(&self, per_kind: Vec<(ResourceKind, Vec<Operation>)>) -> Result<Plan> {
        let kinds: Vec<ResourceKind> = per_kind.iter().map(|(kind, _)| *kind).collect();
        let order = topological_order(&kinds, |kind| spec_of(kind).depends_on.to_vec())?;

        let mut by_kind: HashMap<ResourceKind, Vec<Operation>> = per_kind.into_iter().collect();

        let mut operations: Vec<Operation> = Vec::new();
        // First indices of each kind's delete and create/update segments,
        // used to wire cross-kind dependency edges.
        let mut delete_range: HashMap<ResourceKind, (usize, usize)> = HashMap::new();
        let mut upsert_range: HashMap<ResourceKind, (usize, usize)> = HashMap::new();

        // Deletes in reverse topological order: a dependent kind's deletes
        // run before the deletes of the kinds it depends on.
        for kind in order.iter().rev() {
            let start = operations.len();
            if let Some(ops) = by_kind.get_mut(kind) {
                operations.extend(
                    ops.iter()
                        .filter(|op| op.action == Action::Delete)
                        .cloned(),
                );
            }
            if operations.len() > start {
                delete_range.insert(*kind, (start, operations.len()));
            }
        }

        // Creates and updates in topological order.
        for kind in &order {
            let start = operations.len();
            if let Some(ops) = by_kind.get_mut(kind) {
                operations.extend(
                    ops.iter()
                        .filter(|op| op.action != Action::Delete)
                        .cloned(),
                );
            }
            if operations.len() > start {
                upsert_range.insert(*kind, (start, operations.len()));
            }
        }

        // Wire dependency edges. A delete depends on the deletes of every
        // kind that depends on its kind; a create/update depends on the
        // creates/updates of every kind its kind depends on.
        let dependents: HashMap<ResourceKind, Vec<ResourceKind>> = {
            let mut map: HashMap<ResourceKind, Vec<ResourceKind>> = HashMap::new();
            for kind in &kinds {
                for dep in spec_of(*kind).depends_on {
                    map.entry(*dep).or_default().push(*kind);
                }
            }
            map
        };

        for index in 0..operations.len() {
            let (kind, action) = (operations[index].kind, operations[index].action);
            let mut depends_on = Vec::new();

            if action == Action::Delete {
                if let Some(deps) = dependents.get(&kind) {
                    for dependent in deps {
                        if let Some(&(start, end)) = delete_range.get(dependent) {
                            depends_on.extend(start..end);
                        }
                    }
                }
            } else {
                for dep in spec_of(kind).depends_on {
                    if let Some(&(start, end)) = upsert_range.get(dep) {
                        depends_on.extend(start..end);
                    }
                }
            }

            operations[index].depends_on = depends_on;
        }

        debug!("Scheduled {} operations", operations.len());

        Ok(Plan {
            created_at: chrono::Utc::now(),
            operations,
        })
    }
}

/// Computes a topological order of kinds under the given dependency edges.
///
/// Uses Kahn's algorithm; ties are broken by the input declaration order so
/// the result is deterministic.
///
/// # Errors
///
/// Returns [`PlanError::CyclicDependency`] naming the kinds on the cycle.
pub fn topological_order(
    kinds: &[ResourceKind],
    depends_on: impl Fn(ResourceKind) -> Vec<ResourceKind>,
) -> Result<Vec<ResourceKind>> {
    let mut in_degree: HashMap<ResourceKind, usize> =
        kinds.iter().map(|k| (*k, 0)).collect();
    let mut dependents: HashMap<ResourceKind, Vec<ResourceKind>> = HashMap::new();

    for kind in kinds {
        for dep in depends_on(*kind) {
            // Edges to kinds outside the set impose no ordering here.
            if !in_degree.contains_key(&dep) {
                continue;
            }
            dependents.entry(dep).or_default().push(*kind);
            if let Some(degree) = in_degree.get_mut(kind) {
                *degree += 1;
            }
        }
    }

    let mut order = Vec::with_capacity(kinds.len());
    let mut remaining: Vec<ResourceKind> = kinds.to_vec();

    while !remaining.is_empty() {
        // Pick the first zero-degree kind in declaration order; ties are
        // therefore deterministic.
        let Some(position) = remaining.iter().position(|k| in_degree[k] == 0) else {
            let stuck: Vec<&str> = remaining.iter().map(|k| k.as_str()).collect();
            return Err(PlanError::CyclicDependency {
                cycle: stuck.join(" -> "),
            }
            .into());
        };
        let kind = remaining.remove(position);
        order.push(kind);

        if let Some(deps) = dependents.get(&kind) {
            for dependent in deps {
                if let Some(degree) = in_degree.get_mut(dependent) {
                    *degree -= 1;
                }
            }
        }
    }

    Ok(order)
}
