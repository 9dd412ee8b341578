//! Run configuration.
//!
//! Configuration is loaded from environment variables (optionally via a
//! `.env` file) and may be overridden per-field by the CLI layer.

use crate::error::{ConfigError, Result};
use crate::remote::RetryPolicy;

/// Environment variable holding the management API base URL.
pub const ENV_DOMAIN: &str = "TENANTSYNC_DOMAIN";

/// Environment variable holding the API bearer token.
pub const ENV_TOKEN: &str = "TENANTSYNC_TOKEN";

/// Default number of concurrently executing operations.
const DEFAULT_CONCURRENCY: usize = 4;

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Configuration for one synchronization run.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Base URL of the management API, e.g. `https://tenant.example.com`.
    pub domain: String,
    /// Bearer token for the management API.
    pub token: String,
    /// Maximum number of concurrently executing operations.
    pub concurrency: usize,
    /// Retry policy shared by the fetcher and the executor.
    pub retry: RetryPolicy,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl SyncConfig {
    /// Loads configuration from the environment.
    ///
    /// A `.env` file in the working directory is honored if present.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingEnvVar`] if the domain or token is not
    /// set.
    pub fn from_env() -> Result<Self> {
        Self::from_env_with_domain(None)
    }

    /// Loads configuration from the environment with an explicit domain
    /// taking precedence over [`ENV_DOMAIN`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingEnvVar`] if the token is not set, or if
    /// no domain override is given and the domain is not set either.
    pub fn from_env_with_domain(domain: Option<String>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let domain = match domain {
            Some(domain) => domain,
            None => require_env(ENV_DOMAIN)?,
        };
        let token = require_env(ENV_TOKEN)?;

        Ok(Self {
            domain,
            token,
            concurrency: DEFAULT_CONCURRENCY,
            retry: RetryPolicy::default(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        })
    }

    /// Creates a configuration with explicit credentials, for tests and
    /// embedding.
    #[must_use]
    pub fn new(domain: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            token: token.into(),
            concurrency: DEFAULT_CONCURRENCY,
            retry: RetryPolicy::default(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Overrides the operation concurrency bound.
    ///
    /// A bound of zero is clamped to one.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Overrides the retry policy.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

fn require_env(name: &str) -> Result<String> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            ConfigError::MissingEnvVar {
                name: name.to_string(),
            }
            .into()
        })
}
