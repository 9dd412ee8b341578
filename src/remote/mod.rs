//! Remote management API: client trait, HTTP implementation, retry, and
//! snapshot fetching.

mod client;
mod fetcher;
mod http;
mod retry;

pub use client::{ManagementClient, Page};
pub use fetcher::SnapshotFetcher;
pub use http::HttpManagementClient;
pub use retry::{RetryPolicy, with_retry};

pub(crate) use retry::is_exhausted;

#[cfg(test)]
pub use client::MockManagementClient;
