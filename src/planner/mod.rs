//! Planning: per-kind diffing, cross-kind scheduling, and plan execution.

mod diff;
mod executor;
mod plan;
mod schedule;

pub use diff::DiffPlanner;
pub use executor::ApplyExecutor;
pub use plan::{Action, Operation, Plan};
pub use schedule::{Scheduler, topological_order};
