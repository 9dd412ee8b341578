//! Per-kind diff computation.
//!
//! Compares a kind's desired and current record collections keyed by the
//! kind's natural identity and emits the create/update/delete operations
//! needed to converge them. Duplicate desired identities fail closed before
//! any operation is emitted.

use std::collections::HashMap;
use tracing::{debug, warn};

use crate::document::{Identity, Record, short_fingerprint};
use crate::error::{Result, ValidationError};
use crate::registry::ResourceHandler;

use super::plan::{Action, Operation};

/// Computes per-kind operation lists from desired vs. current state.
#[derive(Debug, Default)]
pub struct DiffPlanner;

impl DiffPlanner {
    /// Creates a new diff planner.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Plans the operations for one kind.
    ///
    /// Emitted order: deletes in current order, then creates and updates in
    /// desired declaration order. The scheduler linearizes across kinds.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::DuplicateIdentity`] if two desired records
    /// share an identity, or [`ValidationError::InvalidRecord`] if a record
    /// has no extractable identity.
    pub fn plan_kind(
        &self,
        handler: &dyn ResourceHandler,
        desired: &[Record],
        current: &[Record],
    ) -> Result<Vec<Operation>> {
        let spec = handler.spec();

        if spec.singleton {
            return Self::plan_singleton(handler, desired, current);
        }

        // Positional kinds carry an explicit order field derived from the
        // desired declaration order, so a reorder surfaces as updates rather
        // than delete+recreate.
        let desired_owned: Vec<Record>;
        let desired = if spec.positional {
            desired_owned = desired
                .iter()
                .enumerate()
                .map(|(i, r)| r.with_field("order", serde_json::json!(i + 1)))
                .collect();
            desired_owned.as_slice()
        } else {
            desired
        };

        let mut desired_ids: Vec<Identity> = Vec::with_capacity(desired.len());
        let mut desired_by_id: HashMap<Identity, &Record> = HashMap::with_capacity(desired.len());
        for record in desired {
            let identity = handler.identity_of(record)?;
            if desired_by_id.insert(identity.clone(), record).is_some() {
                return Err(ValidationError::DuplicateIdentity {
                    kind: spec.kind,
                    identity: identity.as_str().to_string(),
                }
                .into());
            }
            desired_ids.push(identity);
        }

        // Remote duplicates are collapsed onto the first copy so the plan
        // never carries two operations for one identity.
        let mut current_by_id: HashMap<Identity, &Record> = HashMap::with_capacity(current.len());
        let mut current_ids: Vec<Identity> = Vec::with_capacity(current.len());
        for record in current {
            let identity = handler.identity_of(record)?;
            if current_by_id.contains_key(&identity) {
                warn!(
                    "{}: remote returned duplicate '{identity}', ignoring extra copy",
                    spec.kind
                );
                continue;
            }
            current_by_id.insert(identity.clone(), record);
            current_ids.push(identity);
        }

        let mut operations = Vec::new();

        // Deletes first: remote records absent from the document, only for
        // fully-managed kinds. Unmanaged extras are left untouched.
        if spec.fully_managed && spec.supports_delete {
            for identity in &current_ids {
                if !desired_by_id.contains_key(identity) {
                    debug!("{}: '{identity}' absent from document, deleting", spec.kind);
                    operations.push(Operation {
                        kind: spec.kind,
                        action: Action::Delete,
                        identity: identity.clone(),
                        payload: None,
                        fingerprint: None,
                        depends_on: vec![],
                    });
                }
            }
        }

        for identity in &desired_ids {
            let record = desired_by_id[identity];
            let normalized = handler.normalize(record);

            match current_by_id.get(identity) {
                None => {
                    debug!("{}: '{identity}' missing on remote, creating", spec.kind);
                    operations.push(Operation {
                        kind: spec.kind,
                        action: Action::Create,
                        identity: identity.clone(),
                        payload: Some(record.as_value().clone()),
                        fingerprint: Some(short_fingerprint(&normalized)),
                        depends_on: vec![],
                    });
                }
                Some(existing) if handler.normalize(existing) != normalized => {
                    debug!("{}: '{identity}' differs, updating", spec.kind);
                    operations.push(Operation {
                        kind: spec.kind,
                        action: Action::Update,
                        identity: identity.clone(),
                        payload: Some(record.as_value().clone()),
                        fingerprint: Some(short_fingerprint(&normalized)),
                        depends_on: vec![],
                    });
                }
                Some(_) => {}
            }
        }

        Ok(operations)
    }

    /// Plans a singleton kind: update-or-noop, never create or delete.
    fn plan_singleton(
        handler: &dyn ResourceHandler,
        desired: &[Record],
        current: &[Record],
    ) -> Result<Vec<Operation>> {
        let spec = handler.spec();

        let Some(record) = desired.first() else {
            return Ok(vec![]);
        };

        let identity = handler.identity_of(record)?;
        let normalized = handler.normalize(record);

        let unchanged = current
            .first()
            .is_some_and(|existing| handler.normalize(existing) == normalized);

        if unchanged {
            return Ok(vec![]);
        }

        Ok(vec![Operation {
            kind: spec.kind,
            action: Action::Update,
            identity,
            payload: Some(record.as_value().clone()),
            fingerprint: Some(short_fingerprint(&normalized)),
            depends_on: vec![],
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::ResourceKind;
    use crate::registry::{KindHandler, spec_of};
    use serde_json::json;

    fn records(values: &[serde_json::Value]) -> Vec<Record> {
        values.iter().cloned().map(Record::new).collect()
    }

    fn handler(kind: ResourceKind) -> KindHandler {
        KindHandler::new(spec_of(kind))
    }

    #[test]
    fn test_create_when_remote_empty() {
        let planner = DiffPlanner::new();
        let h = handler(ResourceKind::Rules);
        let ops = planner
            .plan_kind(&h, &records(&[json!({ "name": "r1", "order": 1 })]), &[])
            .unwrap();

        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].action, Action::Create);
        assert_eq!(ops[0].identity.as_str(), "r1");
        assert!(ops[0].payload.is_some());
    }

    #[test]
    fn test_noop_when_converged() {
        let planner = DiffPlanner::new();
        let h = handler(ResourceKind::Rules);
        let desired = records(&[json!({ "name": "r1", "order": 1 })]);
        let current = records(&[json!({ "name": "r1", "order": 1, "id": "rul_1" })]);

        let ops = planner.plan_kind(&h, &desired, &current).unwrap();
        assert!(ops.is_empty());
    }

    #[test]
    fn test_update_when_payload_differs() {
        let planner = DiffPlanner::new();
        let h = handler(ResourceKind::Hooks);
        let desired = records(&[json!({ "name": "h1", "script": "new()" })]);
        let current = records(&[json!({ "name": "h1", "script": "old()", "id": "hk_1" })]);

        let ops = planner.plan_kind(&h, &desired, &current).unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].action, Action::Update);
    }

    #[test]
    fn test_unmanaged_kind_never_deletes() {
        let planner = DiffPlanner::new();
        let h = handler(ResourceKind::Hooks);
        let current = records(&[json!({ "name": "h1", "script": "x" })]);

        let ops = planner.plan_kind(&h, &[], &current).unwrap();
        assert!(ops.is_empty());
    }

    #[test]
    fn test_fully_managed_kind_deletes_extras() {
        let planner = DiffPlanner::new();
        let h = handler(ResourceKind::Rules);
        let current = records(&[json!({ "name": "stale", "order": 1 })]);

        let ops = planner.plan_kind(&h, &[], &current).unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].action, Action::Delete);
        assert_eq!(ops[0].identity.as_str(), "stale");
    }

    #[test]
    fn test_duplicate_remote_identity_deleted_once() {
        let planner = DiffPlanner::new();
        let h = handler(ResourceKind::Rules);
        let current = records(&[
            json!({ "name": "dup", "order": 1 }),
            json!({ "name": "dup", "order": 2 }),
        ]);

        let ops = planner.plan_kind(&h, &[], &current).unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].action, Action::Delete);
        assert_eq!(ops[0].identity.as_str(), "dup");
    }

    #[test]
    fn test_duplicate_remote_identity_compared_against_first_copy() {
        let planner = DiffPlanner::new();
        let h = handler(ResourceKind::Hooks);
        let desired = records(&[json!({ "name": "h1", "script": "x" })]);
        let current = records(&[
            json!({ "name": "h1", "script": "x" }),
            json!({ "name": "h1", "script": "stale" }),
        ]);

        let ops = planner.plan_kind(&h, &desired, &current).unwrap();
        assert!(ops.is_empty());
    }

    #[test]
    fn test_duplicate_identity_fails_closed() {
        let planner = DiffPlanner::new();
        let h = handler(ResourceKind::Rules);
        let desired = records(&[
            json!({ "name": "r1", "order": 1 }),
            json!({ "name": "r1", "order": 2 }),
        ]);

        let result = planner.plan_kind(&h, &desired, &[]);
        assert!(matches!(
            result,
            Err(crate::error::SyncError::Validation(
                ValidationError::DuplicateIdentity { .. }
            ))
        ));
    }

    #[test]
    fn test_reorder_is_batch_of_updates() {
        let planner = DiffPlanner::new();
        let h = handler(ResourceKind::Rules);
        // Desired swaps the order of the two remote rules.
        let desired = records(&[
            json!({ "name": "b", "script": "s" }),
            json!({ "name": "a", "script": "s" }),
        ]);
        let current = records(&[
            json!({ "name": "a", "script": "s", "order": 1, "id": "rul_a" }),
            json!({ "name": "b", "script": "s", "order": 2, "id": "rul_b" }),
        ]);

        let ops = planner.plan_kind(&h, &desired, &current).unwrap();
        assert_eq!(ops.len(), 2);
        assert!(ops.iter().all(|op| op.action == Action::Update));
        // Each update carries the explicit order field.
        let b = ops.iter().find(|op| op.identity.as_str() == "b").unwrap();
        assert_eq!(b.payload.as_ref().unwrap()["order"], json!(1));
        let a = ops.iter().find(|op| op.identity.as_str() == "a").unwrap();
        assert_eq!(a.payload.as_ref().unwrap()["order"], json!(2));
    }

    #[test]
    fn test_rename_is_delete_plus_create() {
        let planner = DiffPlanner::new();
        let h = handler(ResourceKind::Rules);
        let desired = records(&[json!({ "name": "after", "script": "s" })]);
        let current = records(&[json!({ "name": "before", "script": "s", "order": 1 })]);

        let ops = planner.plan_kind(&h, &desired, &current).unwrap();
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].action, Action::Delete);
        assert_eq!(ops[0].identity.as_str(), "before");
        assert_eq!(ops[1].action, Action::Create);
        assert_eq!(ops[1].identity.as_str(), "after");
    }

    #[test]
    fn test_singleton_update_or_noop() {
        let planner = DiffPlanner::new();
        let h = handler(ResourceKind::TenantSettings);
        let desired = records(&[json!({ "friendly_name": "Acme" })]);
        let current = records(&[json!({ "friendly_name": "Acme Old" })]);

        let ops = planner.plan_kind(&h, &desired, &current).unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].action, Action::Update);

        let ops = planner.plan_kind(&h, &desired, &desired).unwrap();
        assert!(ops.is_empty());
    }

    #[test]
    fn test_singleton_absent_is_noop() {
        let planner = DiffPlanner::new();
        let h = handler(ResourceKind::TenantSettings);
        let current = records(&[json!({ "friendly_name": "Acme" })]);

        let ops = planner.plan_kind(&h, &[], &current).unwrap();
        assert!(ops.is_empty());
    }
}
