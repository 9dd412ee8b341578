//! Per-run context.
//!
//! One `Context` is constructed per run and passed explicitly to every
//! component; no process-wide mutable state survives between runs.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::SyncConfig;
use crate::document::{DesiredDocument, RemoteSnapshot};
use crate::report::RunResult;

/// Cooperative cancellation handle for one run.
///
/// Cancelling lets in-flight operations complete; no new operations are
/// dispatched, and undispatched operations are reported as skipped.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a fresh, uncancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Returns true if cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Process-scoped state for one synchronization run.
///
/// Carries the desired-state document, the fetched snapshot, accumulated
/// results, and configuration. The document and snapshot are read-only once
/// set; the run result is written once by the engine at the end of a run.
#[derive(Debug)]
pub struct Context {
    /// Run configuration.
    pub config: SyncConfig,
    /// The desired-state document, built once per run.
    pub document: DesiredDocument,
    /// The remote snapshot, populated by the fetcher.
    pub snapshot: Option<RemoteSnapshot>,
    /// Cancellation handle for this run.
    pub cancel: CancelToken,
    /// Result of the apply phase, if one ran.
    pub result: Option<RunResult>,
}

impl Context {
    /// Creates a context for one run.
    #[must_use]
    pub fn new(config: SyncConfig, document: DesiredDocument) -> Self {
        Self {
            config,
            document,
            snapshot: None,
            cancel: CancelToken::new(),
            result: None,
        }
    }

    /// Returns a cancellation handle that can be signalled from elsewhere.
    #[must_use]
    pub fn cancel_handle(&self) -> CancelToken {
        self.cancel.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_token_propagates() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
