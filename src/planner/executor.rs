//! Plan execution with bounded concurrency.
//!
//! Drains a plan by dispatching operations whose dependencies have all
//! succeeded, never running more than the configured number at once. Each
//! operation runs under the retry policy. A failure marks every transitive
//! dependent as skipped; cancellation stops dispatch but lets in-flight
//! operations finish.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::context::CancelToken;
use crate::document::{Identity, ResourceKind};
use crate::remote::{ManagementClient, RetryPolicy, is_exhausted, with_retry};
use crate::report::{OperationOutcome, OperationStatus, RunResult, SkipReason};

use super::plan::{Action, Operation, Plan};

/// Executes plans against the remote.
pub struct ApplyExecutor {
    client: Arc<dyn ManagementClient>,
    retry: RetryPolicy,
    concurrency: usize,
}

impl ApplyExecutor {
    /// Creates an executor over the given client.
    ///
    /// A concurrency bound of zero is clamped to one.
    #[must_use]
    pub fn new(client: Arc<dyn ManagementClient>, retry: RetryPolicy, concurrency: usize) -> Self {
        Self {
            client,
            retry,
            concurrency: concurrency.max(1),
        }
    }

    /// Applies every operation in the plan and returns the per-operation
    /// outcomes.
    ///
    /// Apply never aborts mid-run: each operation ends as succeeded, failed,
    /// or skipped, and the aggregate is reported in the run result.
    pub async fn apply(&self, plan: &Plan, cancel: &CancelToken) -> RunResult {
        let started_at = Utc::now();
        let total = plan.operations.len();

        let mut outcomes: Vec<Option<OperationOutcome>> = vec![None; total];
        let mut dispatched = vec![false; total];
        let mut in_flight: JoinSet<(usize, OperationOutcome)> = JoinSet::new();

        loop {
            // Skip operations whose dependencies did not succeed. Dependencies
            // always point backwards, so one in-order pass cascades fully.
            for index in 0..total {
                if outcomes[index].is_some() || dispatched[index] {
                    continue;
                }
                let op = &plan.operations[index];
                let blocked = op.depends_on.iter().any(|&dep| {
                    matches!(
                        outcomes[dep].as_ref().map(|o| &o.status),
                        Some(OperationStatus::Failed(_) | OperationStatus::Skipped(_))
                    )
                });
                if blocked {
                    warn!("Skipping {} (upstream failure)", op.description());
                    outcomes[index] = Some(skipped(op, SkipReason::UpstreamFailure));
                }
            }

            if !cancel.is_cancelled() {
                for index in 0..total {
                    if in_flight.len() >= self.concurrency {
                        break;
                    }
                    if outcomes[index].is_some() || dispatched[index] {
                        continue;
                    }
                    let op = &plan.operations[index];
                    let ready = op.depends_on.iter().all(|&dep| {
                        matches!(
                            outcomes[dep].as_ref().map(|o| &o.status),
                            Some(OperationStatus::Succeeded)
                        )
                    });
                    if !ready {
                        continue;
                    }

                    debug!("Dispatching {}", op.description());
                    dispatched[index] = true;
                    let client = Arc::clone(&self.client);
                    let retry = self.retry;
                    let op = op.clone();
                    in_flight.spawn(async move {
                        let outcome = execute(client, retry, &op).await;
                        (index, outcome)
                    });
                }
            }

            if in_flight.is_empty() {
                break;
            }

            if let Some(joined) = in_flight.join_next().await {
                match joined {
                    Ok((index, outcome)) => outcomes[index] = Some(outcome),
                    Err(e) => {
                        // A panicked task loses its index; fail the whole
                        // batch of still-dispatched slots it could belong to.
                        warn!("Apply task panicked: {e}");
                        for index in 0..total {
                            if dispatched[index] && outcomes[index].is_none() {
                                outcomes[index] = Some(OperationOutcome {
                                    kind: plan.operations[index].kind,
                                    action: plan.operations[index].action,
                                    identity: plan.operations[index].identity.clone(),
                                    status: OperationStatus::Failed(format!(
                                        "Task panicked: {e}"
                                    )),
                                    attempts: 0,
                                });
                            }
                        }
                    }
                }
            }
        }

        // Anything never dispatched at this point was cut off by
        // cancellation.
        let outcomes = outcomes
            .into_iter()
            .enumerate()
            .map(|(index, outcome)| {
                outcome.unwrap_or_else(|| skipped(&plan.operations[index], SkipReason::Cancelled))
            })
            .collect();

        RunResult::new(started_at, outcomes)
    }
}

fn skipped(op: &Operation, reason: SkipReason) -> OperationOutcome {
    OperationOutcome {
        kind: op.kind,
        action: op.action,
        identity: op.identity.clone(),
        status: OperationStatus::Skipped(reason),
        attempts: 0,
    }
}

/// Runs one operation under the retry policy and classifies the result.
async fn execute(
    client: Arc<dyn ManagementClient>,
    retry: RetryPolicy,
    op: &Operation,
) -> OperationOutcome {
    let label = op.description();

    let (result, attempts) = with_retry(retry, &label, || {
        let client = Arc::clone(&client);
        let kind = op.kind;
        let identity = op.identity.clone();
        let payload = op.payload.clone();
        let action = op.action;
        async move { dispatch(client, action, kind, identity, payload).await }
    })
    .await;

    let status = match result {
        Ok(()) => OperationStatus::Succeeded,
        Err(err) if is_exhausted(&err, attempts, retry) => OperationStatus::Failed(format!(
            "Retries exhausted after {attempts} attempt(s): {err}"
        )),
        Err(err) => OperationStatus::Failed(err.to_string()),
    };

    if let OperationStatus::Failed(reason) = &status {
        warn!("{label} failed: {reason}");
    } else {
        debug!("{label} succeeded after {attempts} attempt(s)");
    }

    OperationOutcome {
        kind: op.kind,
        action: op.action,
        identity: op.identity.clone(),
        status,
        attempts,
    }
}

async fn dispatch(
    client: Arc<dyn ManagementClient>,
    action: Action,
    kind: ResourceKind,
    identity: Identity,
    payload: Option<Value>,
) -> crate::error::Result<()> {
    use crate::error::{RemoteError, SyncError};

    match action {
        Action::Create => {
            let payload = payload
                .ok_or_else(|| SyncError::internal("Create operation without payload"))?;
            client.create(kind, payload).await?;
        }
        Action::Update => {
            let payload = payload
                .ok_or_else(|| SyncError::internal("Update operation without payload"))?;
            client.update(kind, identity, payload).await?;
        }
        Action::Delete => {
            // A record already gone is the state we wanted.
            match client.delete(kind, identity).await {
                Ok(()) | Err(SyncError::Remote(RemoteError::NotFound { .. })) => {}
                Err(err) => return Err(err),
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RemoteError;
    use crate::remote::MockManagementClient;
    use serde_json::json;

    fn quick_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 2,
            base_delay_ms: 1,
            max_delay_ms: 2,
        }
    }

    fn op(
        kind: ResourceKind,
        action: Action,
        identity: &str,
        depends_on: Vec<usize>,
    ) -> Operation {
        Operation {
            kind,
            action,
            identity: Identity::new(identity),
            payload: Some(json!({ "name": identity })),
            fingerprint: None,
            depends_on,
        }
    }

    fn plan_of(operations: Vec<Operation>) -> Plan {
        Plan {
            created_at: Utc::now(),
            operations,
        }
    }

    fn executor(mock: MockManagementClient) -> ApplyExecutor {
        ApplyExecutor::new(Arc::new(mock), quick_retry(), 2)
    }

    #[tokio::test]
    async fn test_all_operations_succeed() {
        let mut mock = MockManagementClient::new();
        mock.expect_create().times(2).returning(|_, v| Ok(v));

        let plan = plan_of(vec![
            op(ResourceKind::Clients, Action::Create, "app", vec![]),
            op(ResourceKind::Rules, Action::Create, "r1", vec![0]),
        ]);

        let result = executor(mock).apply(&plan, &CancelToken::new()).await;
        assert!(result.success());
        assert_eq!(result.succeeded(), 2);
    }

    #[tokio::test]
    async fn test_failure_skips_dependents() {
        let mut mock = MockManagementClient::new();
        mock.expect_create().returning(|kind, v| {
            if kind == ResourceKind::Clients {
                Err(RemoteError::api_error(500, "boom").into())
            } else {
                Ok(v)
            }
        });

        let plan = plan_of(vec![
            op(ResourceKind::Clients, Action::Create, "app", vec![]),
            op(ResourceKind::Rules, Action::Create, "r1", vec![0]),
            op(ResourceKind::Rules, Action::Create, "r2", vec![1]),
            op(ResourceKind::Hooks, Action::Create, "h1", vec![]),
        ]);

        let result = executor(mock).apply(&plan, &CancelToken::new()).await;
        assert_eq!(result.failed(), 1);
        assert_eq!(result.skipped(), 2);
        assert_eq!(result.succeeded(), 1);
        assert_eq!(
            result.outcomes[1].status,
            OperationStatus::Skipped(SkipReason::UpstreamFailure)
        );
        assert_eq!(
            result.outcomes[2].status,
            OperationStatus::Skipped(SkipReason::UpstreamFailure)
        );
        assert_eq!(result.outcomes[3].status, OperationStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_cancellation_skips_everything_pending() {
        let mock = MockManagementClient::new();
        let cancel = CancelToken::new();
        cancel.cancel();

        let plan = plan_of(vec![
            op(ResourceKind::Clients, Action::Create, "app", vec![]),
            op(ResourceKind::Rules, Action::Create, "r1", vec![0]),
        ]);

        let result = executor(mock).apply(&plan, &cancel).await;
        assert_eq!(result.skipped(), 2);
        for outcome in &result.outcomes {
            assert_eq!(
                outcome.status,
                OperationStatus::Skipped(SkipReason::Cancelled)
            );
            assert_eq!(outcome.attempts, 0);
        }
    }

    #[tokio::test]
    async fn test_delete_of_missing_record_succeeds() {
        let mut mock = MockManagementClient::new();
        mock.expect_delete().times(1).returning(|kind, identity| {
            Err(RemoteError::NotFound {
                kind,
                identity: identity.to_string(),
            }
            .into())
        });

        let mut delete = op(ResourceKind::Rules, Action::Delete, "ghost", vec![]);
        delete.payload = None;
        let plan = plan_of(vec![delete]);

        let result = executor(mock).apply(&plan, &CancelToken::new()).await;
        assert!(result.success());
    }

    #[tokio::test]
    async fn test_retry_exhaustion_marks_failure() {
        let mut mock = MockManagementClient::new();
        mock.expect_create()
            .times(2)
            .returning(|_, _| Err(RemoteError::network("down").into()));

        let plan = plan_of(vec![op(ResourceKind::Rules, Action::Create, "r1", vec![])]);

        let result = executor(mock).apply(&plan, &CancelToken::new()).await;
        assert_eq!(result.failed(), 1);
        assert_eq!(result.outcomes[0].attempts, 2);
        assert!(matches!(
            &result.outcomes[0].status,
            OperationStatus::Failed(reason) if reason.contains("exhausted")
        ));
    }

    #[tokio::test]
    async fn test_transient_failure_retried_to_success() {
        let mut mock = MockManagementClient::new();
        let mut failed_once = false;
        mock.expect_create().times(2).returning(move |_, v| {
            if failed_once {
                Ok(v)
            } else {
                failed_once = true;
                Err(RemoteError::RateLimited {
                    retry_after_secs: 0,
                }
                .into())
            }
        });

        let plan = plan_of(vec![op(ResourceKind::Rules, Action::Create, "r1", vec![])]);

        let result = executor(mock).apply(&plan, &CancelToken::new()).await;
        assert!(result.success());
        assert_eq!(result.outcomes[0].attempts, 2);
    }
}
