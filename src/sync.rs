//! The synchronization engine.
//!
//! Ties the phases of a run together: validate the desired-state document,
//! fetch the remote snapshot, diff per kind, schedule across kinds, and
//! apply. `dump` runs the reverse direction, turning the remote snapshot
//! back into a desired-state document.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use crate::context::Context;
use crate::document::{DesiredDocument, Record, ResourceKind};
use crate::error::{Result, SyncError, ValidationError};
use crate::planner::{ApplyExecutor, DiffPlanner, Plan, Scheduler};
use crate::registry::{Registry, spec_of};
use crate::remote::{ManagementClient, SnapshotFetcher};
use crate::report::RunResult;

/// The engine for one-direction synchronization runs.
pub struct SyncEngine {
    registry: Registry,
    client: Arc<dyn ManagementClient>,
}

impl SyncEngine {
    /// Creates an engine over the given client with the built-in registry.
    #[must_use]
    pub fn new(client: Arc<dyn ManagementClient>) -> Self {
        Self {
            registry: Registry::builtin(),
            client,
        }
    }

    /// Validates the desired-state document without touching the remote.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] for a record with a missing identity
    /// field, a duplicate identity within a kind, or a singleton kind
    /// declared with more than one record.
    pub fn validate(&self, document: &DesiredDocument) -> Result<()> {
        validate_document(&self.registry, document)
    }

    /// Computes the plan for the context's document without applying it.
    ///
    /// The fetched snapshot is stored on the context for inspection.
    ///
    /// # Errors
    ///
    /// Returns an error if validation, the snapshot fetch, or planning
    /// fails. No remote mutation is attempted.
    pub async fn plan(&self, ctx: &mut Context) -> Result<Plan> {
        self.validate(&ctx.document)?;

        let kinds = self.kinds_to_sync(&ctx.document);
        if kinds.is_empty() {
            info!("Document declares no managed kinds, nothing to plan");
            return Ok(Plan::empty());
        }

        let fetcher = SnapshotFetcher::new(Arc::clone(&self.client), ctx.config.retry);
        let snapshot = fetcher.fetch(&kinds).await?;

        let planner = DiffPlanner::new();
        let mut per_kind = Vec::with_capacity(kinds.len());
        for &kind in &kinds {
            let handler = self
                .registry
                .handler(kind)
                .ok_or_else(|| SyncError::internal(format!("No handler for kind {kind}")))?;
            let operations = planner.plan_kind(
                handler,
                handler.extract_desired(&ctx.document),
                handler.extract_current(&snapshot),
            )?;
            per_kind.push((kind, operations));
        }

        ctx.snapshot = Some(snapshot);

        let plan = Scheduler::new().schedule(per_kind)?;
        info!(
            "Planned {} operation(s) across {} kind(s)",
            plan.len(),
            kinds.len()
        );
        Ok(plan)
    }

    /// Plans and applies the context's document against the remote.
    ///
    /// The run result is stored on the context and returned. A run with
    /// failed or skipped operations is still an `Ok` return; per-operation
    /// status lives in the result.
    ///
    /// # Errors
    ///
    /// Returns an error if validation, the snapshot fetch, or planning
    /// fails before any mutation is attempted.
    pub async fn deploy(&self, ctx: &mut Context) -> Result<RunResult> {
        let plan = self.plan(ctx).await?;

        let executor = ApplyExecutor::new(
            Arc::clone(&self.client),
            ctx.config.retry,
            ctx.config.concurrency,
        );
        let result = executor.apply(&plan, &ctx.cancel).await;

        info!(
            "Run {} finished: {} succeeded, {} failed, {} skipped",
            result.run_id,
            result.succeeded(),
            result.failed(),
            result.skipped()
        );

        ctx.result = Some(result.clone());
        Ok(result)
    }

    /// Fetches the remote state of every kind and renders it as a
    /// desired-state document.
    ///
    /// Remote-generated fields are stripped and positional kinds are sorted
    /// by their order field, so a dump followed by a deploy plans no
    /// changes.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot fetch fails for any kind.
    pub async fn dump(&self, ctx: &mut Context) -> Result<DesiredDocument> {
        let kinds: Vec<ResourceKind> = self.registry.kinds().collect();

        let fetcher = SnapshotFetcher::new(Arc::clone(&self.client), ctx.config.retry);
        let snapshot = fetcher.fetch(&kinds).await?;

        let mut document = DesiredDocument::new();
        for handler in self.registry.handlers() {
            let current = handler.extract_current(&snapshot);
            if current.is_empty() {
                continue;
            }

            let mut records: Vec<Record> = current
                .iter()
                .map(|record| Record::new(handler.normalize(record)))
                .collect();

            if handler.spec().positional {
                records.sort_by_key(order_of);
            }

            document.insert(handler.kind(), records);
        }

        ctx.snapshot = Some(snapshot);
        Ok(document)
    }

    /// Returns the kinds this run must fetch and diff: those the document
    /// declares, in declaration order, plus fully-managed kinds, whose
    /// omission means delete-all.
    fn kinds_to_sync(&self, document: &DesiredDocument) -> Vec<ResourceKind> {
        let mut kinds: Vec<ResourceKind> = document.kinds().collect();
        for kind in self.registry.kinds() {
            if spec_of(kind).fully_managed && !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        kinds
    }
}

/// Validates a desired-state document against a registry, without a client.
///
/// # Errors
///
/// Returns a [`ValidationError`] for a record with a missing identity field,
/// a duplicate identity within a kind, or a singleton kind declared with
/// more than one record.
pub fn validate_document(registry: &Registry, document: &DesiredDocument) -> Result<()> {
    for kind in document.kinds() {
        let handler = registry
            .handler(kind)
            .ok_or_else(|| SyncError::internal(format!("No handler for kind {kind}")))?;
        let records = handler.extract_desired(document);

        if handler.spec().singleton && records.len() > 1 {
            return Err(ValidationError::invalid_record(
                kind,
                "<section>",
                "singleton kind declared more than once",
            )
            .into());
        }

        let mut seen = HashSet::with_capacity(records.len());
        for record in records {
            let identity = handler.identity_of(record)?;
            if !seen.insert(identity.clone()) {
                return Err(ValidationError::DuplicateIdentity {
                    kind,
                    identity: identity.as_str().to_string(),
                }
                .into());
            }
        }
    }
    Ok(())
}

fn order_of(record: &Record) -> i64 {
    record
        .as_value()
        .get("order")
        .and_then(Value::as_i64)
        .unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncConfig;
    use crate::error::RemoteError;
    use crate::remote::{MockManagementClient, Page, RetryPolicy};
    use serde_json::json;

    fn quick_config() -> SyncConfig {
        SyncConfig::new("https://x", "t").with_retry(RetryPolicy {
            max_attempts: 2,
            base_delay_ms: 1,
            max_delay_ms: 2,
        })
    }

    fn empty_page() -> Page {
        Page {
            records: vec![],
            next_cursor: None,
        }
    }

    fn document(sections: &[(&str, Value)]) -> DesiredDocument {
        DesiredDocument::from_sections(
            sections
                .iter()
                .map(|(name, value)| ((*name).to_string(), value.clone())),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_deploy_creates_missing_record() {
        let mut mock = MockManagementClient::new();
        mock.expect_list().returning(|_, _| Ok(empty_page()));
        mock.expect_create()
            .times(1)
            .returning(|_, payload| Ok(payload));

        let engine = SyncEngine::new(Arc::new(mock));
        let doc = document(&[("rules", json!([{ "name": "r1", "script": "x" }]))]);
        let mut ctx = Context::new(quick_config(), doc);

        let result = engine.deploy(&mut ctx).await.unwrap();
        assert!(result.success());
        assert_eq!(result.succeeded(), 1);
        assert!(ctx.result.is_some());
        assert!(ctx.snapshot.is_some());
    }

    #[tokio::test]
    async fn test_converged_state_plans_nothing() {
        let mut mock = MockManagementClient::new();
        mock.expect_list().returning(|kind, _| {
            if kind == ResourceKind::Rules {
                Ok(Page {
                    records: vec![Record::new(
                        json!({ "name": "r1", "script": "x", "order": 1, "id": "rul_1" }),
                    )],
                    next_cursor: None,
                })
            } else {
                Ok(empty_page())
            }
        });

        let engine = SyncEngine::new(Arc::new(mock));
        let doc = document(&[("rules", json!([{ "name": "r1", "script": "x" }]))]);
        let mut ctx = Context::new(quick_config(), doc);

        let plan = engine.plan(&mut ctx).await.unwrap();
        assert!(plan.is_empty());
    }

    #[tokio::test]
    async fn test_omitted_unmanaged_kind_left_untouched() {
        let mut mock = MockManagementClient::new();
        // Only the fully-managed kinds are fetched; a hook existing on the
        // remote is never listed, let alone deleted.
        mock.expect_list()
            .withf(|kind, _| *kind != ResourceKind::Hooks)
            .returning(|_, _| Ok(empty_page()));

        let engine = SyncEngine::new(Arc::new(mock));
        let mut ctx = Context::new(quick_config(), DesiredDocument::new());

        let plan = engine.plan(&mut ctx).await.unwrap();
        assert!(plan.is_empty());
    }

    #[tokio::test]
    async fn test_omitted_fully_managed_kind_deletes_extras() {
        let mut mock = MockManagementClient::new();
        mock.expect_list().returning(|kind, _| {
            if kind == ResourceKind::ClientGrants {
                Ok(Page {
                    records: vec![Record::new(json!({ "audience": "api", "id": "cg_1" }))],
                    next_cursor: None,
                })
            } else {
                Ok(empty_page())
            }
        });

        let engine = SyncEngine::new(Arc::new(mock));
        let mut ctx = Context::new(quick_config(), DesiredDocument::new());

        let plan = engine.plan(&mut ctx).await.unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.operations[0].kind, ResourceKind::ClientGrants);
    }

    #[tokio::test]
    async fn test_plan_follows_document_declaration_order() {
        let mut mock = MockManagementClient::new();
        mock.expect_list().returning(|_, _| Ok(empty_page()));

        let engine = SyncEngine::new(Arc::new(mock));
        // Pages before hooks, the reverse of the builtin ordering. With no
        // edge between them the plan keeps the document's order.
        let doc = document(&[
            ("pages", json!([{ "name": "login", "html": "<form/>" }])),
            ("hooks", json!([{ "name": "h1", "script": "x" }])),
        ]);
        let mut ctx = Context::new(quick_config(), doc);

        let plan = engine.plan(&mut ctx).await.unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.operations[0].kind, ResourceKind::Pages);
        assert_eq!(plan.operations[1].kind, ResourceKind::Hooks);
    }

    #[tokio::test]
    async fn test_duplicate_identity_fails_before_any_remote_call() {
        let mock = MockManagementClient::new();
        let engine = SyncEngine::new(Arc::new(mock));
        let doc = document(&[(
            "rules",
            json!([{ "name": "r1", "script": "a" }, { "name": "r1", "script": "b" }]),
        )]);
        let mut ctx = Context::new(quick_config(), doc);

        let err = engine.deploy(&mut ctx).await.unwrap_err();
        assert!(matches!(
            err,
            SyncError::Validation(ValidationError::DuplicateIdentity { .. })
        ));
        assert!(ctx.result.is_none());
    }

    #[tokio::test]
    async fn test_fetch_failure_aborts_before_mutation() {
        let mut mock = MockManagementClient::new();
        mock.expect_list().returning(|kind, _| {
            if kind == ResourceKind::Rules {
                Err(RemoteError::api_error(500, "boom").into())
            } else {
                Ok(empty_page())
            }
        });

        let engine = SyncEngine::new(Arc::new(mock));
        let doc = document(&[("rules", json!([{ "name": "r1", "script": "x" }]))]);
        let mut ctx = Context::new(quick_config(), doc);

        assert!(engine.deploy(&mut ctx).await.is_err());
        assert!(ctx.result.is_none());
    }

    #[tokio::test]
    async fn test_dump_strips_remote_fields_and_sorts_positional() {
        let mut mock = MockManagementClient::new();
        mock.expect_list().returning(|kind, _| {
            if kind == ResourceKind::Rules {
                Ok(Page {
                    records: vec![
                        Record::new(json!({ "name": "b", "order": 2, "id": "rul_b" })),
                        Record::new(json!({ "name": "a", "order": 1, "id": "rul_a" })),
                    ],
                    next_cursor: None,
                })
            } else {
                Ok(empty_page())
            }
        });

        let engine = SyncEngine::new(Arc::new(mock));
        let mut ctx = Context::new(quick_config(), DesiredDocument::new());

        let doc = engine.dump(&mut ctx).await.unwrap();
        let rules = doc.records(ResourceKind::Rules);
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].field_str("name"), Some("a"));
        assert_eq!(rules[1].field_str("name"), Some("b"));
        assert!(rules[0].as_value().get("id").is_none());
        assert!(!doc.contains(ResourceKind::Hooks));
    }
}
