//! Concurrent snapshot fetching.
//!
//! Fetches every managed kind from the remote in parallel, paginating each
//! kind sequentially under the retry policy, and assembles the result into a
//! single [`RemoteSnapshot`]. Any kind that cannot be fetched fails the whole
//! snapshot; a plan built from a partial view could delete resources that
//! merely failed to list.

use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::document::{Record, RemoteSnapshot, ResourceKind};
use crate::error::{FetchError, Result, SyncError};

use super::client::ManagementClient;
use super::retry::{RetryPolicy, is_exhausted, with_retry};

/// Fetches the remote state of every managed kind.
pub struct SnapshotFetcher {
    client: Arc<dyn ManagementClient>,
    retry: RetryPolicy,
}

impl SnapshotFetcher {
    /// Creates a fetcher over the given client.
    #[must_use]
    pub fn new(client: Arc<dyn ManagementClient>, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }

    /// Fetches all records of the given kinds concurrently.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Exhausted`] if a kind kept failing transiently
    /// past the retry budget, or [`FetchError::Failed`] on a permanent
    /// failure. When several kinds fail, the error reported is the one whose
    /// kind comes first in the given order.
    pub async fn fetch(&self, kinds: &[ResourceKind]) -> Result<RemoteSnapshot> {
        let mut tasks = JoinSet::new();

        for &kind in kinds {
            let client = Arc::clone(&self.client);
            let retry = self.retry;
            tasks.spawn(async move {
                let result = fetch_kind(client, retry, kind).await;
                (kind, result)
            });
        }

        let mut fetched = Vec::with_capacity(kinds.len());
        let mut failures: Vec<(ResourceKind, SyncError)> = Vec::new();

        while let Some(joined) = tasks.join_next().await {
            let (kind, result) =
                joined.map_err(|e| SyncError::internal(format!("Fetch task panicked: {e}")))?;
            match result {
                Ok(records) => {
                    debug!("Fetched {} {kind} record(s)", records.len());
                    fetched.push((kind, records));
                }
                Err(err) => failures.push((kind, err)),
            }
        }

        if !failures.is_empty() {
            // Deterministic: report the failure of the first kind in input
            // order, not the first to finish.
            let first = kinds
                .iter()
                .find_map(|kind| {
                    failures
                        .iter()
                        .position(|(k, _)| k == kind)
                        .map(|i| failures.swap_remove(i))
                })
                .map(|(_, err)| err);
            if let Some(err) = first {
                return Err(err);
            }
        }

        let mut snapshot = RemoteSnapshot::default();
        for (kind, records) in fetched {
            snapshot.insert(kind, records);
        }

        info!(
            "Snapshot complete: {} record(s) across {} kind(s)",
            snapshot.total_records(),
            kinds.len()
        );
        Ok(snapshot)
    }
}

/// Fetches every page of one kind, retrying each page request.
async fn fetch_kind(
    client: Arc<dyn ManagementClient>,
    retry: RetryPolicy,
    kind: ResourceKind,
) -> Result<Vec<Record>> {
    let mut records = Vec::new();
    let mut cursor: Option<String> = None;
    let label = format!("fetch {kind}");

    loop {
        let (result, attempts) = with_retry(retry, &label, || {
            let client = Arc::clone(&client);
            let cursor = cursor.clone();
            async move { client.list(kind, cursor).await }
        })
        .await;

        let page = match result {
            Ok(page) => page,
            Err(err) if is_exhausted(&err, attempts, retry) => {
                return Err(FetchError::Exhausted { kind, attempts }.into());
            }
            Err(err) => {
                return Err(FetchError::Failed {
                    kind,
                    message: err.to_string(),
                }
                .into());
            }
        };

        records.extend(page.records);
        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => return Ok(records),
        }
    }
}
