//! Kiln - a declarative build-target orchestration engine
//!
//! Build steps are named targets with dependencies, per-target configuration
//! derived from shared templates, and before/after hooks. Requested targets
//! are resolved into a single ordered plan and run one at a time.
//!
//! ```no_run
//! use kiln::{resolve, Configuration, Executor, Override, Registry, Shell, Target};
//!
//! # fn main() -> anyhow::Result<()> {
//! let csc = Configuration::from_entries([("bindir", "bin")]);
//! let debug = csc.derive(&[Override::set("bindir", "bin/debug")])?;
//!
//! let mut registry = Registry::new();
//! registry.register(Target::new("compile", |conf| {
//!     let bindir = conf.get_str("bindir").unwrap_or("bin");
//!     kiln::run_program("csc", [format!("-out:{}/game.exe", bindir)], None)?;
//!     Ok(())
//! }).with_config(debug))?;
//! registry.register(Target::aggregate("all").depends_on(["compile"]))?;
//!
//! let plan = resolve(&registry, &["all"])?;
//! Executor::new(&registry, &Shell::default()).execute(&plan).into_result()?;
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod core;
pub mod ops;
pub mod resolver;
pub mod util;

pub use crate::builder::{BuildError, Executor, RunReport};
pub use crate::core::{
    config::derive, ConfigValue, Configuration, HookKind, Manifest, Override, Registry, Role,
    Target,
};
pub use crate::resolver::{resolve, ExecutionPlan, ResolveError};
pub use crate::util::{copy, run_program, Shell};
