//! Resolution error types and diagnostics.

use thiserror::Error;

use crate::core::registry::RegistryError;
use crate::util::diagnostic::{suggestions, Diagnostic};

/// Error while turning requested targets into an execution plan.
///
/// All of these are detected before any target action runs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error(transparent)]
    Definition(#[from] RegistryError),

    #[error("cyclic dependency: {}", cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },

    #[error("no target specified and no default target declared")]
    NoTargetSpecified,

    #[error("unknown target `{name}`")]
    UnknownTarget { name: String },

    #[error("hook `{hook}` cannot run next to its target `{subject}`: {reason}")]
    HookConflict {
        hook: String,
        subject: String,
        reason: HookConflictReason,
    },
}

/// Why a hook cannot be placed adjacent to its subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookConflictReason {
    /// An after-hook already ran earlier as an ordinary dependency.
    AlreadyRan,
    /// An after-hook depends on something that itself depends on the subject.
    DependsOnSubject { dependency: String },
    /// The hook has a hook of its own that would land between it and the subject.
    NestedHook { inner: String },
}

impl std::fmt::Display for HookConflictReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HookConflictReason::AlreadyRan => {
                write!(f, "it already ran earlier as an ordinary dependency")
            }
            HookConflictReason::DependsOnSubject { dependency } => {
                write!(f, "its dependency `{}` must itself run after the target", dependency)
            }
            HookConflictReason::NestedHook { inner } => {
                write!(f, "its own hook `{}` would run between them", inner)
            }
        }
    }
}

impl ResolveError {
    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let diag = Diagnostic::error(self.to_string());

        match self {
            ResolveError::Definition(RegistryError::UnknownDependency { dependency, .. }) => diag
                .caused_by(format!("`{}` is not declared anywhere", dependency))
                .hint(suggestions::LIST_TARGETS),
            ResolveError::Definition(_) => diag,
            ResolveError::CyclicDependency { cycle } => diag
                .caused_by(format!("cycle: {}", cycle.join(" -> ")))
                .hint("Break the cycle by removing one of the dependencies"),
            ResolveError::NoTargetSpecified => diag
                .hint("Name a target on the command line")
                .hint("Declare `default = \"<target>\"` in the build description"),
            ResolveError::UnknownTarget { .. } => diag.hint(suggestions::LIST_TARGETS),
            ResolveError::HookConflict { hook, reason, .. } => match reason {
                HookConflictReason::AlreadyRan => diag
                    .caused_by(format!("`{}` is also reached as an ordinary dependency", hook))
                    .hint("Depend on the hook's subject instead of the hook"),
                HookConflictReason::DependsOnSubject { dependency } => diag.hint(
                    format!("Make `{}` a hook of its own or drop the dependency", dependency),
                ),
                HookConflictReason::NestedHook { inner } => diag.hint(format!(
                    "Attach `{}` to the outer target instead of to `{}`",
                    inner, hook
                )),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_message() {
        let err = ResolveError::CyclicDependency {
            cycle: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "cyclic dependency: a -> b -> a");

        let output = err.to_diagnostic().format(false);
        assert!(output.contains("error: cyclic dependency"));
        assert!(output.contains("help: Break the cycle"));
    }

    #[test]
    fn test_hook_conflict_message() {
        let err = ResolveError::HookConflict {
            hook: "codegen".into(),
            subject: "compile".into(),
            reason: HookConflictReason::NestedHook {
                inner: "lint".into(),
            },
        };
        assert_eq!(
            err.to_string(),
            "hook `codegen` cannot run next to its target `compile`: \
             its own hook `lint` would run between them"
        );
        assert!(err
            .to_diagnostic()
            .format(false)
            .contains("help: Attach `lint` to the outer target instead of to `codegen`"));
    }

    #[test]
    fn test_definition_error_is_transparent() {
        let err = ResolveError::from(RegistryError::UnknownDependency {
            target: "all".into(),
            dependency: "compil".into(),
        });
        assert_eq!(
            err.to_string(),
            "target `all` depends on unknown target `compil`"
        );
        assert!(err.to_diagnostic().format(false).contains("kiln --list"));
    }
}
