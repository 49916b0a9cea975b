//! Target graph resolution.
//!
//! Turns requested target names into an [`ExecutionPlan`]: a total order in
//! which dependencies come first, hooks sit next to their subject, and no
//! target appears twice. Resolution is pure; nothing runs until the plan is
//! handed to the executor.

pub mod errors;
pub mod graph;
pub mod plan;

pub use errors::ResolveError;
pub use graph::TargetGraph;
pub use plan::{resolve, ExecutionPlan, PlanEntry, Slot};
