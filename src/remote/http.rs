//! HTTP implementation of the management API client.
//!
//! Speaks a small REST surface per kind: paginated `GET`, `POST`, `PATCH`,
//! and `DELETE`. Rate-limit responses are mapped to a distinguished error
//! carrying the remote's retry-after hint; retrying is the caller's job.

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode, header};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::trace;

use crate::document::{Identity, Record, ResourceKind};
use crate::error::{RemoteError, Result};
use crate::registry::spec_of;

use super::client::{ManagementClient, Page};

/// Fallback retry-after when the remote rate-limits without a hint.
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// HTTP client for the management API.
#[derive(Debug, Clone)]
pub struct HttpManagementClient {
    /// Underlying HTTP client.
    client: Client,
    /// Base URL, e.g. `https://tenant.example.com`.
    base_url: String,
    /// Bearer token.
    token: String,
}

/// Wire shape of one listing page.
#[derive(Debug, Deserialize)]
struct ListResponse {
    items: Vec<Value>,
    #[serde(default)]
    next: Option<String>,
}

impl HttpManagementClient {
    /// Creates a client for the given base URL and bearer token.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(base_url: &str, token: &str, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| RemoteError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    fn kind_url(&self, kind: ResourceKind) -> String {
        format!("{}/api/v2/{}", self.base_url, spec_of(kind).api_path)
    }

    fn record_url(&self, kind: ResourceKind, identity: &Identity) -> String {
        let spec = spec_of(kind);
        if spec.singleton {
            // Singletons are addressed by their collection path.
            self.kind_url(kind)
        } else {
            format!("{}/{}", self.kind_url(kind), identity)
        }
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        kind: ResourceKind,
        identity: Option<&Identity>,
        body: Option<&Value>,
    ) -> Result<Option<Value>> {
        trace!("{method} {url}");

        let mut request = self
            .client
            .request(method, url)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token));
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| RemoteError::network(format!("Request failed: {e}")))?;

        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or_default();
            let retry_after = if retry_after == 0 {
                DEFAULT_RETRY_AFTER_SECS
            } else {
                retry_after
            };

            return Err(RemoteError::RateLimited {
                retry_after_secs: retry_after,
            }
            .into());
        }

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(RemoteError::AuthenticationFailed {
                message: String::from("Invalid API token"),
            }
            .into());
        }

        if status == StatusCode::NOT_FOUND {
            return Err(RemoteError::NotFound {
                kind,
                identity: identity.map(ToString::to_string).unwrap_or_default(),
            }
            .into());
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::api_error(status.as_u16(), body).into());
        }

        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        let value = response.json().await.map_err(|e| {
            RemoteError::InvalidResponse {
                message: format!("Failed to parse response: {e}"),
            }
        })?;
        Ok(Some(value))
    }
}

#[async_trait]
impl ManagementClient for HttpManagementClient {
    async fn list(&self, kind: ResourceKind, cursor: Option<String>) -> Result<Page> {
        let mut url = self.kind_url(kind);
        if let Some(cursor) = cursor {
            url = format!("{url}?cursor={cursor}");
        }

        let value = self
            .send(Method::GET, &url, kind, None, None)
            .await?
            .ok_or_else(|| RemoteError::InvalidResponse {
                message: String::from("Empty listing response"),
            })?;

        // Singleton endpoints return a bare object rather than a page.
        if spec_of(kind).singleton {
            return Ok(Page {
                records: vec![Record::new(value)],
                next_cursor: None,
            });
        }

        let page: ListResponse = serde_json::from_value(value).map_err(|e| {
            RemoteError::InvalidResponse {
                message: format!("Malformed listing page: {e}"),
            }
        })?;

        Ok(Page {
            records: page.items.into_iter().map(Record::new).collect(),
            next_cursor: page.next,
        })
    }

    async fn create(&self, kind: ResourceKind, record: Value) -> Result<Value> {
        let url = self.kind_url(kind);
        self.send(Method::POST, &url, kind, None, Some(&record))
            .await?
            .ok_or_else(|| {
                RemoteError::InvalidResponse {
                    message: String::from("Empty create response"),
                }
                .into()
            })
    }

    async fn update(
        &self,
        kind: ResourceKind,
        identity: Identity,
        record: Value,
    ) -> Result<Value> {
        let url = self.record_url(kind, &identity);
        self.send(Method::PATCH, &url, kind, Some(&identity), Some(&record))
            .await?
            .ok_or_else(|| {
                RemoteError::InvalidResponse {
                    message: String::from("Empty update response"),
                }
                .into()
            })
    }

    async fn delete(&self, kind: ResourceKind, identity: Identity) -> Result<()> {
        let url = self.record_url(kind, &identity);
        self.send(Method::DELETE, &url, kind, Some(&identity), None)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> HttpManagementClient {
        HttpManagementClient::new(&server.uri(), "test-token", 5).unwrap()
    }

    #[tokio::test]
    async fn test_list_single_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/rules"))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{ "name": "r1", "order": 1 }],
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let page = client.list(ResourceKind::Rules, None).await.unwrap();
        assert_eq!(page.records.len(), 1);
        assert!(page.next_cursor.is_none());
    }

    #[tokio::test]
    async fn test_list_passes_cursor() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/clients"))
            .and(query_param("cursor", "abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [],
                "next": null,
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let page = client
            .list(ResourceKind::Clients, Some(String::from("abc")))
            .await
            .unwrap();
        assert!(page.records.is_empty());
    }

    #[tokio::test]
    async fn test_singleton_list_wraps_object() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/tenant/settings"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "friendly_name": "Acme" })),
            )
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let page = client.list(ResourceKind::TenantSettings, None).await.unwrap();
        assert_eq!(page.records.len(), 1);
    }

    #[tokio::test]
    async fn test_rate_limit_carries_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/rules"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client.list(ResourceKind::Rules, None).await.unwrap_err();
        assert_eq!(err.retry_delay_secs(), Some(7));
    }

    #[tokio::test]
    async fn test_auth_failure_is_permanent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/rules"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client.list(ResourceKind::Rules, None).await.unwrap_err();
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_delete_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/v2/rules/ghost"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client
            .delete(ResourceKind::Rules, Identity::new("ghost"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::SyncError::Remote(RemoteError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_delete_no_content() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/v2/rules/r1"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        client
            .delete(ResourceKind::Rules, Identity::new("r1"))
            .await
            .unwrap();
    }
}
