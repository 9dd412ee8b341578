//! Error types for the tenantsync engine.
//!
//! This module provides the error hierarchy for all phases of a
//! synchronization run: configuration, document validation, snapshot
//! fetching, planning, and remote API calls.

use std::path::PathBuf;
use thiserror::Error;

use crate::document::ResourceKind;

/// The main error type for the tenantsync engine.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Desired-state document validation errors.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Snapshot fetch errors.
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Planning errors.
    #[error("Planning error: {0}")]
    Plan(#[from] PlanError),

    /// Remote management API errors.
    #[error("Remote API error: {0}")]
    Remote(#[from] RemoteError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Environment variable is missing.
    #[error("Missing environment variable: {name}")]
    MissingEnvVar {
        /// Name of the missing variable.
        name: String,
    },

    /// A configuration value is invalid.
    #[error("Invalid value for {name}: {message}")]
    InvalidValue {
        /// Name of the setting.
        name: String,
        /// Description of the problem.
        message: String,
    },

    /// The desired-state document file was not found.
    #[error("Document not found: {path}")]
    DocumentNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The dump target already exists and overwriting was not requested.
    #[error("Output file already exists: {path} (use --force to overwrite)")]
    OutputExists {
        /// Path to the existing file.
        path: PathBuf,
    },

    /// The desired-state document could not be parsed.
    #[error("Failed to parse document: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },
}

/// Desired-state document validation errors.
///
/// These always fail the run before any remote call is made.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// The document contains a resource kind the registry does not know.
    #[error("Unknown resource kind: {kind}")]
    UnknownKind {
        /// The unrecognized kind tag.
        kind: String,
    },

    /// A record failed required-field shape validation.
    #[error("Invalid {kind} record '{identity}': {message}")]
    InvalidRecord {
        /// Kind of the offending record.
        kind: ResourceKind,
        /// Identity of the offending record, if one could be determined.
        identity: String,
        /// Description of the problem.
        message: String,
    },

    /// Two desired records of one kind share the same identity.
    #[error("Duplicate {kind} identity: {identity}")]
    DuplicateIdentity {
        /// Kind with the duplicate.
        kind: ResourceKind,
        /// The duplicated identity.
        identity: String,
    },
}

/// Snapshot fetch errors.
///
/// Any of these aborts the run before planning, since planning requires a
/// complete snapshot.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Retries were exhausted while fetching a kind.
    #[error("Exhausted {attempts} fetch attempts for {kind}")]
    Exhausted {
        /// Kind that could not be fetched.
        kind: ResourceKind,
        /// Number of attempts made.
        attempts: u32,
    },

    /// A permanent failure occurred while fetching a kind.
    #[error("Failed to fetch {kind}: {message}")]
    Failed {
        /// Kind that could not be fetched.
        kind: ResourceKind,
        /// Description of the failure.
        message: String,
    },
}

/// Planning errors.
#[derive(Debug, Error)]
pub enum PlanError {
    /// The declared dependency edges between kinds form a cycle.
    #[error("Cyclic dependency between kinds: {cycle}")]
    CyclicDependency {
        /// Description of the cycle.
        cycle: String,
    },
}

/// Remote management API errors.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Rate limited by the remote, with a retry-after hint.
    #[error("Rate limited, retry after {retry_after_secs} seconds")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_secs: u64,
    },

    /// Authentication failed.
    #[error("Authentication failed: {message}")]
    AuthenticationFailed {
        /// Description of the auth failure.
        message: String,
    },

    /// The addressed resource does not exist on the remote.
    #[error("{kind} '{identity}' not found")]
    NotFound {
        /// Kind of the missing resource.
        kind: ResourceKind,
        /// Identity of the missing resource.
        identity: String,
    },

    /// API request failed.
    #[error("API request failed: {status} - {message}")]
    ApiRequestFailed {
        /// HTTP status code.
        status: u16,
        /// Error message from the API.
        message: String,
    },

    /// Network error.
    #[error("Network error: {message}")]
    NetworkError {
        /// Description of the network error.
        message: String,
    },

    /// Invalid response from the API.
    #[error("Invalid response: {message}")]
    InvalidResponse {
        /// Description of the response issue.
        message: String,
    },
}

/// Result type alias for tenantsync operations.
pub type Result<T> = std::result::Result<T, SyncError>;

impl SyncError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if this error is transient and worth retrying.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Remote(RemoteError::RateLimited { .. } | RemoteError::NetworkError { .. })
        )
    }

    /// Returns the remote-suggested retry delay in seconds, if any.
    #[must_use]
    pub const fn retry_delay_secs(&self) -> Option<u64> {
        match self {
            Self::Remote(RemoteError::RateLimited { retry_after_secs }) => Some(*retry_after_secs),
            _ => None,
        }
    }
}

impl ValidationError {
    /// Creates an invalid-record error.
    #[must_use]
    pub fn invalid_record(
        kind: ResourceKind,
        identity: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidRecord {
            kind,
            identity: identity.into(),
            message: message.into(),
        }
    }
}

impl RemoteError {
    /// Creates an API request error.
    #[must_use]
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiRequestFailed {
            status,
            message: message.into(),
        }
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkError {
            message: message.into(),
        }
    }
}
