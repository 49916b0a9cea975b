//! Process exit codes.
//!
//! Every failure kind maps to its own code so scripts driving `kiln` can
//! tell a broken build description from a failing compiler.

use crate::builder::actions::InterpolateError;
use crate::core::config::ConfigError;
use crate::core::manifest::ManifestError;
use crate::core::registry::RegistryError;
use crate::resolver::errors::ResolveError;
use crate::util::fs::CopyError;
use crate::util::process::SubprocessError;

pub const SUCCESS: i32 = 0;
/// Anything not classified below, including plain action failures.
pub const FAILURE: i32 = 1;
/// Command-line usage error. Emitted by clap itself.
pub const USAGE: i32 = 2;
pub const DEFINITION: i32 = 3;
pub const CYCLE: i32 = 4;
pub const NO_TARGET: i32 = 5;
pub const COPY: i32 = 6;
pub const SUBPROCESS: i32 = 7;
pub const MANIFEST: i32 = 8;

/// Exit code for an error, from the first classifiable error in its chain.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<ResolveError>() {
            return match e {
                ResolveError::Definition(_) | ResolveError::HookConflict { .. } => DEFINITION,
                ResolveError::CyclicDependency { .. } => CYCLE,
                ResolveError::NoTargetSpecified | ResolveError::UnknownTarget { .. } => NO_TARGET,
            };
        }
        if let Some(e) = cause.downcast_ref::<ManifestError>() {
            return match e {
                ManifestError::Registry(_) => DEFINITION,
                _ => MANIFEST,
            };
        }
        if cause.is::<RegistryError>() {
            return DEFINITION;
        }
        if cause.is::<ConfigError>() || cause.is::<InterpolateError>() {
            return MANIFEST;
        }
        if cause.is::<CopyError>() {
            return COPY;
        }
        if cause.is::<SubprocessError>() {
            return SUBPROCESS;
        }
    }
    FAILURE
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use anyhow::{anyhow, Context};

    use crate::builder::executor::BuildError;

    #[test]
    fn test_resolve_errors() {
        let cycle = anyhow::Error::new(ResolveError::CyclicDependency {
            cycle: vec!["a".into(), "a".into()],
        });
        assert_eq!(exit_code_for(&cycle), CYCLE);

        let unknown = anyhow::Error::new(ResolveError::UnknownTarget { name: "x".into() });
        assert_eq!(exit_code_for(&unknown), NO_TARGET);

        let definition = anyhow::Error::new(ResolveError::from(RegistryError::UnknownDefault {
            name: "all".into(),
        }));
        assert_eq!(exit_code_for(&definition), DEFINITION);
    }

    #[test]
    fn test_action_errors_through_build_error() {
        let inner = anyhow::Error::new(SubprocessError::Exit {
            command: "csc".into(),
            code: Some(1),
        })
        .context("in /project");
        let err = anyhow::Error::new(BuildError {
            target: "compile".into(),
            source: inner,
        });
        assert_eq!(exit_code_for(&err), SUBPROCESS);

        let err = anyhow::Error::new(BuildError {
            target: "content".into(),
            source: anyhow::Error::new(CopyError::SourceMissing {
                path: PathBuf::from("src"),
            }),
        });
        assert_eq!(exit_code_for(&err), COPY);

        let err = anyhow::Error::new(BuildError {
            target: "custom".into(),
            source: anyhow!("action gave up"),
        });
        assert_eq!(exit_code_for(&err), FAILURE);
    }

    #[test]
    fn test_manifest_errors() {
        let err: anyhow::Error = Err::<(), _>(ManifestError::ConflictingRole {
            target: "x".into(),
        })
        .context("failed to load build description")
        .unwrap_err();
        assert_eq!(exit_code_for(&err), MANIFEST);

        let err = anyhow::Error::new(ManifestError::Registry(RegistryError::DuplicateTarget {
            name: "x".into(),
        }));
        assert_eq!(exit_code_for(&err), DEFINITION);
    }
}
