//! High-level operations.
//!
//! This module contains the implementation of the `kiln` command.

pub mod kiln_build;

pub use kiln_build::{build, execute, list_targets, load_registry, BuildOptions, Mode};
