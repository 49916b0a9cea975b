//! Running an execution plan.
//!
//! The executor runs plan entries in order; actions turn declared steps into
//! calls to the side-effect primitives in [`crate::util`].

pub mod actions;
pub mod executor;

pub use executor::{BuildError, Executor, RunReport, TargetOutcome, TargetStatus};
