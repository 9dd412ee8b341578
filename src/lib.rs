// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(warnings)]                    // All warnings are treated as errors
#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Tenantsync
//!
//! A declarative, idempotent synchronization engine for multi-tenant service
//! configuration.
//!
//! ## Overview
//!
//! Tenantsync treats a tenant's configuration as code:
//!
//! - Describe the tenant's resources in a YAML desired-state document
//! - Deploy the document to converge the remote tenant toward it
//! - Dump a live tenant back into a document to bootstrap or audit
//! - Plan without applying to review the exact operations first
//!
//! ## Architecture
//!
//! The system is built around **desired state reconciliation**:
//!
//! 1. **Desired State**: the YAML document, one section per resource kind
//! 2. **Current State**: a snapshot fetched from the management API
//! 3. **Planner**: diffs the two per kind and schedules operations across
//!    kinds by their dependency edges
//! 4. **Executor**: applies the plan with bounded concurrency and retries
//!
//! ## Modules
//!
//! - [`document`]: resource kinds, records, and state documents
//! - [`registry`]: per-kind handlers and their static declarations
//! - [`remote`]: management API client, retry, and snapshot fetching
//! - [`planner`]: diff computation, scheduling, and plan execution
//! - [`sync`]: the engine tying the phases together
//! - [`loader`]: desired-state document loading and saving
//! - [`cli`]: command-line interface
//!
//! ## Example
//!
//! ```yaml
//! tenant-settings:
//!   friendly_name: Acme
//!
//! clients:
//!   - name: web-app
//!     app_type: spa
//!
//! rules:
//!   - name: enrich-profile
//!     script: |
//!       function (user, context, callback) { callback(null, user, context); }
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod config;
pub mod context;
pub mod document;
pub mod error;
pub mod loader;
pub mod planner;
pub mod registry;
pub mod remote;
pub mod report;
pub mod sync;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use config::SyncConfig;
pub use context::{CancelToken, Context};
pub use document::{DesiredDocument, Identity, Record, RemoteSnapshot, ResourceKind};
pub use error::{Result, SyncError};
pub use planner::{Action, ApplyExecutor, DiffPlanner, Operation, Plan, Scheduler};
pub use registry::{Registry, ResourceHandler};
pub use remote::{HttpManagementClient, ManagementClient, RetryPolicy, SnapshotFetcher};
pub use report::{OperationOutcome, OperationStatus, RunResult, SkipReason};
pub use sync::{SyncEngine, validate_document};
