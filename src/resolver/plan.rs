//! Execution plan generation.
//!
//! Resolution is a depth-first, post-order walk over the dependency graph.
//! Each target is emitted once, after all of its dependencies. Hooks are
//! emitted as a group around their subject:
//!
//! ```text
//! deps(T)..  deps(hooks of T)..  before(T)..  T  after(T)..
//! ```
//!
//! A hook is only emitted when its subject is. A hook that is also an
//! ordinary dependency of something emitted earlier is not emitted twice;
//! for a before-hook that still satisfies its ordering, for an after-hook it
//! is a [`ResolveError::HookConflict`].
//!
//! An after-hook may depend on its own subject. Anything else that would have
//! to run between a target and one of its hooks is a conflict: an after-hook
//! dependency that needs the subject first, a before-hook with after-hooks of
//! its own, or an after-hook with before-hooks of its own.

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::core::registry::Registry;
use crate::core::target::HookKind;
use crate::resolver::errors::{HookConflictReason, ResolveError};

/// Why an entry sits where it does in the plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot {
    /// Requested directly or reached as a dependency.
    Target,
    /// Placed adjacent to `subject` as one of its hooks.
    Hook { kind: HookKind, subject: String },
}

/// One step of an execution plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanEntry {
    pub name: String,
    pub slot: Slot,
}

impl PlanEntry {
    /// True if this entry is an after-hook placed behind `subject`.
    pub fn is_after_hook_of(&self, subject: &str) -> bool {
        matches!(
            &self.slot,
            Slot::Hook { kind: HookKind::After, subject: s } if s == subject
        )
    }
}

/// Ordered, deduplicated list of targets to run for one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionPlan {
    requested: Vec<String>,
    entries: Vec<PlanEntry>,
}

impl ExecutionPlan {
    /// The targets this plan was resolved for (the default if none was named).
    pub fn requested(&self) -> &[String] {
        &self.requested
    }

    pub fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }

    /// Target names in execution order.
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for ExecutionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            match &entry.slot {
                Slot::Target => writeln!(f, "{}", entry.name)?,
                Slot::Hook { kind, subject } => {
                    writeln!(f, "{} ({} {})", entry.name, kind, subject)?
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

/// Resolve `requested` into an execution plan.
///
/// An empty request resolves the registry's default target. The whole
/// registry is validated first, so malformed descriptions fail here even if
/// the broken part is not reachable from the request.
pub fn resolve<S: AsRef<str>>(
    registry: &Registry,
    requested: &[S],
) -> Result<ExecutionPlan, ResolveError> {
    registry.validate()?;

    let requested: Vec<String> = if requested.is_empty() {
        match registry.default_target() {
            Some(name) => vec![name.to_string()],
            None => return Err(ResolveError::NoTargetSpecified),
        }
    } else {
        requested.iter().map(|s| s.as_ref().to_string()).collect()
    };

    for name in &requested {
        if !registry.contains(name) {
            return Err(ResolveError::UnknownTarget { name: name.clone() });
        }
    }

    let mut walk = Walk {
        registry,
        marks: HashMap::new(),
        stack: Vec::new(),
        entries: Vec::new(),
    };
    for name in &requested {
        walk.visit(name, Slot::Target)?;
    }

    tracing::debug!(
        "resolved {} into {} step(s)",
        requested.join(", "),
        walk.entries.len()
    );

    Ok(ExecutionPlan {
        requested,
        entries: walk.entries,
    })
}

struct Walk<'a> {
    registry: &'a Registry,
    marks: HashMap<&'a str, Mark>,
    /// Targets currently being visited, outermost first.
    stack: Vec<&'a str>,
    entries: Vec<PlanEntry>,
}

impl<'a> Walk<'a> {
    fn visit(&mut self, name: &str, slot: Slot) -> Result<(), ResolveError> {
        let registry = self.registry;
        let target = registry
            .get(name)
            .ok_or_else(|| ResolveError::UnknownTarget {
                name: name.to_string(),
            })?;
        let name = target.name();

        match self.marks.get(name) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::InProgress) => return Err(self.cycle_error(name)),
            None => {}
        }

        self.marks.insert(name, Mark::InProgress);
        self.stack.push(name);

        for dep in target.deps() {
            self.visit(dep, Slot::Target)?;
        }

        let before = registry.hooks(HookKind::Before, name);
        let after = registry.hooks(HookKind::After, name);

        // Hook dependencies go ahead of the whole group to keep hooks adjacent.
        for hook in before {
            if let Some(hook_target) = registry.get(hook) {
                for dep in hook_target.deps() {
                    self.visit(dep, Slot::Target)?;
                }
            }
        }
        for hook in after {
            let Some(hook_target) = registry.get(hook) else {
                continue;
            };
            for dep in hook_target.deps() {
                // Satisfied by the time the hook runs.
                if dep == name {
                    continue;
                }
                if depends_on(registry, dep, name) {
                    return Err(ResolveError::HookConflict {
                        hook: hook.clone(),
                        subject: name.to_string(),
                        reason: HookConflictReason::DependsOnSubject {
                            dependency: dep.clone(),
                        },
                    });
                }
                self.visit(dep, Slot::Target)?;
            }
        }

        for hook in before {
            self.visit_hook(hook, HookKind::Before, name)?;
        }

        tracing::trace!("emit `{}`", name);
        self.entries.push(PlanEntry {
            name: name.to_string(),
            slot,
        });
        self.marks.insert(name, Mark::Done);
        self.stack.pop();

        for hook in after {
            self.visit_hook(hook, HookKind::After, name)?;
        }

        Ok(())
    }

    fn visit_hook(&mut self, hook: &str, kind: HookKind, subject: &str) -> Result<(), ResolveError> {
        if self.marks.get(hook) == Some(&Mark::Done) {
            return match kind {
                HookKind::Before => {
                    tracing::debug!(
                        "before-hook `{}` of `{}` already ran earlier, not repeating it",
                        hook,
                        subject
                    );
                    Ok(())
                }
                HookKind::After => Err(ResolveError::HookConflict {
                    hook: hook.to_string(),
                    subject: subject.to_string(),
                    reason: HookConflictReason::AlreadyRan,
                }),
            };
        }

        let facing = match kind {
            HookKind::Before => HookKind::After,
            HookKind::After => HookKind::Before,
        };
        if let Some(inner) = self.registry.hooks(facing, hook).first() {
            return Err(ResolveError::HookConflict {
                hook: hook.to_string(),
                subject: subject.to_string(),
                reason: HookConflictReason::NestedHook {
                    inner: inner.clone(),
                },
            });
        }

        self.visit(
            hook,
            Slot::Hook {
                kind,
                subject: subject.to_string(),
            },
        )
    }

    fn cycle_error(&self, name: &str) -> ResolveError {
        let start = self.stack.iter().position(|&n| n == name).unwrap_or(0);
        let mut cycle: Vec<String> = self.stack[start..].iter().map(|n| n.to_string()).collect();
        cycle.push(name.to_string());
        ResolveError::CyclicDependency { cycle }
    }
}

/// True if `from` reaches `to` through ordinary dependencies.
fn depends_on<'r>(registry: &'r Registry, from: &'r str, to: &str) -> bool {
    let mut seen = HashSet::new();
    let mut pending = vec![from];

    while let Some(name) = pending.pop() {
        if name == to {
            return true;
        }
        if !seen.insert(name) {
            continue;
        }
        if let Some(target) = registry.get(name) {
            pending.extend(target.deps().iter().map(String::as_str));
        }
    }

    false
}
