//! Management API client trait.
//!
//! The engine talks to the remote system exclusively through this trait:
//! paginated listing plus create/update/delete per kind. Every method may
//! surface a distinguished rate-limit condition carrying a retry-after hint
//! (see [`crate::error::RemoteError::RateLimited`]).

use async_trait::async_trait;
use serde_json::Value;

use crate::document::{Identity, Record, ResourceKind};
use crate::error::Result;

/// One page of a paginated listing.
#[derive(Debug, Clone)]
pub struct Page {
    /// Records on this page.
    pub records: Vec<Record>,
    /// Cursor for the next page; `None` when this is the last page.
    pub next_cursor: Option<String>,
}

/// Abstract client for the remote management API.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ManagementClient: Send + Sync {
    /// Lists one page of records for a kind.
    async fn list(&self, kind: ResourceKind, cursor: Option<String>) -> Result<Page>;

    /// Creates a record and returns the remote's view of it.
    async fn create(&self, kind: ResourceKind, record: Value) -> Result<Value>;

    /// Updates the record with the given identity.
    async fn update(&self, kind: ResourceKind, identity: Identity, record: Value)
        -> Result<Value>;

    /// Deletes the record with the given identity.
    async fn delete(&self, kind: ResourceKind, identity: Identity) -> Result<()>;
}
