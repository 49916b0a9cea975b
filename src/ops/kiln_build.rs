//! Implementation of `kiln`: load, resolve, run.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::builder::executor::{BuildError, Executor, TargetStatus};
use crate::core::manifest::{find_manifest, Manifest, ManifestError};
use crate::core::registry::Registry;
use crate::core::target::HookKind;
use crate::resolver::errors::ResolveError;
use crate::resolver::graph::TargetGraph;
use crate::resolver::plan::{resolve, ExecutionPlan};
use crate::util::diagnostic::{suggestions, Diagnostic};
use crate::util::shell::{format_duration, Shell, Status};

/// What to do with the resolved build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Resolve and run the requested targets.
    #[default]
    Run,
    /// Print the execution plan without running anything.
    Plan,
    /// List registered targets.
    List,
    /// Print the target graph in Graphviz DOT.
    Graph,
}

/// Options for a `kiln` invocation.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Explicit build description; found by walking up from `cwd` otherwise.
    pub manifest_path: Option<PathBuf>,

    /// Requested targets (empty = default target)
    pub targets: Vec<String>,

    pub mode: Mode,
}

/// Locate the build description for an invocation started in `cwd`.
pub fn locate_manifest(explicit: Option<&Path>, cwd: &Path) -> Result<PathBuf, ManifestError> {
    match explicit {
        Some(path) if path.is_absolute() => Ok(path.to_path_buf()),
        Some(path) => Ok(cwd.join(path)),
        None => find_manifest(cwd),
    }
}

/// Load a build description into a registry.
pub fn load_registry(manifest_path: &Path) -> Result<Registry, ManifestError> {
    let manifest = Manifest::load(manifest_path)?;
    tracing::debug!(
        "loaded {} target(s) from {}",
        manifest.targets().len(),
        manifest_path.display()
    );
    manifest.into_registry()
}

/// Resolve the requested targets into a plan.
pub fn plan(registry: &Registry, targets: &[String]) -> Result<ExecutionPlan, ResolveError> {
    resolve(registry, targets)
}

/// Run a resolved plan, printing a summary.
///
/// Returns the original failure if any entry failed.
pub fn build(registry: &Registry, plan: &ExecutionPlan, shell: &Shell) -> Result<(), BuildError> {
    let report = Executor::new(registry, shell).execute(plan);

    if report.is_success() {
        shell.status(
            Status::Finished,
            format!(
                "{} target(s) in {}",
                report.count(TargetStatus::Succeeded),
                format_duration(report.elapsed())
            ),
        );
    } else {
        let skipped = report.count(TargetStatus::Skipped);
        if skipped > 0 {
            shell.warn(format!("{} target(s) skipped", skipped));
        }
    }

    report.into_result().map(|_| ())
}

/// Run a whole invocation.
///
/// `out` receives introspection output (`--plan`, `--list`, `--graph`);
/// status lines go to the shell.
pub fn execute(opts: &BuildOptions, cwd: &Path, shell: &Shell, out: &mut String) -> Result<()> {
    let manifest_path = locate_manifest(opts.manifest_path.as_deref(), cwd)?;
    shell.note(format!("using {}", manifest_path.display()));
    let registry = load_registry(&manifest_path)?;

    match opts.mode {
        Mode::List => out.push_str(&list_targets(&registry)),
        Mode::Graph => out.push_str(&TargetGraph::from_registry(&registry).to_dot()),
        Mode::Plan => {
            let plan = plan(&registry, &opts.targets)?;
            let _ = write!(out, "{}", plan);
        }
        Mode::Run => {
            if shell.is_verbose() {
                let requested = if opts.targets.is_empty() {
                    registry.default_target().unwrap_or("<default>").to_string()
                } else {
                    opts.targets.join(", ")
                };
                shell.status(Status::Resolving, requested);
            }
            let plan = plan(&registry, &opts.targets)?;
            build(&registry, &plan, shell)?;
        }
    }

    Ok(())
}

/// Human-readable listing of registered targets in registration order.
pub fn list_targets(registry: &Registry) -> String {
    let graph = TargetGraph::from_registry(registry);
    let mut out = String::new();

    for target in registry.targets() {
        let _ = write!(out, "{}", target.name());
        if registry.default_target() == Some(target.name()) {
            out.push_str(" (default)");
        }
        if target.role().is_hook() {
            let _ = write!(out, " ({})", target.role());
        }
        if let Some(description) = target.description() {
            let _ = write!(out, " - {}", description);
        }
        out.push('\n');

        if !target.deps().is_empty() {
            let _ = writeln!(out, "    depends on: {}", target.deps().join(", "));
        }
        let dependents = graph.dependents(target.name());
        if !dependents.is_empty() {
            let _ = writeln!(out, "    required by: {}", dependents.join(", "));
        }
        for kind in [HookKind::Before, HookKind::After] {
            let hooks = registry.hooks(kind, target.name());
            if !hooks.is_empty() {
                let _ = writeln!(out, "    {} hooks: {}", kind, hooks.join(", "));
            }
        }
    }

    out
}

/// Turn an error into a user-facing diagnostic.
pub fn diagnose(err: &anyhow::Error) -> Diagnostic {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<ResolveError>() {
            return e.to_diagnostic();
        }
        if let Some(e @ ManifestError::NotFound { .. }) = cause.downcast_ref::<ManifestError>() {
            return Diagnostic::error(e.to_string()).hint(suggestions::NO_MANIFEST);
        }
    }

    let mut diag = Diagnostic::error(err.to_string());
    for cause in err.chain().skip(1) {
        diag = diag.caused_by(cause.to_string());
    }
    if err.is::<BuildError>() {
        diag = diag.hint(suggestions::BUILD_FAILED);
    }
    diag
}
