//! Target registry - the catalog of declared targets.
//!
//! The registry is populated during a declaration phase and then handed by
//! shared reference to the resolver and executor, which only read it.
//! Dependency and hook subject names are resolved lazily: declaration order
//! does not need to match dependency order, and [`Registry::validate`]
//! reports dangling references before anything runs.

use std::collections::HashMap;

use anyhow::Result;
use thiserror::Error;

use crate::core::config::Configuration;
use crate::core::target::{HookKind, Role, Target};

/// Malformed build description.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("target `{name}` is already defined")]
    DuplicateTarget { name: String },

    #[error("cannot make `{name}` the default target, `{existing}` already is")]
    DuplicateDefault { existing: String, name: String },

    #[error("target `{target}` depends on unknown target `{dependency}`")]
    UnknownDependency { target: String, dependency: String },

    #[error("hook `{hook}` is attached to unknown target `{subject}`")]
    UnknownHookSubject { hook: String, subject: String },

    #[error("default target `{name}` is not defined")]
    UnknownDefault { name: String },
}

/// Catalog of targets keyed by name, in registration order.
#[derive(Debug, Default)]
pub struct Registry {
    targets: Vec<Target>,
    index: HashMap<String, usize>,
    default: Option<String>,
    before: HashMap<String, Vec<String>>,
    after: HashMap<String, Vec<String>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Registry::default()
    }

    /// Register a fully built target.
    ///
    /// A [`Role::Default`] target also becomes the default; a hook role
    /// attaches the target to its subject, after any hooks already attached
    /// on the same side.
    pub fn register(&mut self, target: Target) -> Result<(), RegistryError> {
        let name = target.name().to_string();

        if self.index.contains_key(&name) {
            return Err(RegistryError::DuplicateTarget { name });
        }
        if *target.role() == Role::Default {
            self.check_default(&name)?;
            self.default = Some(name.clone());
        }
        if let Some((kind, subject)) = target.role().hook() {
            self.hooks_mut(kind)
                .entry(subject.to_string())
                .or_default()
                .push(name.clone());
        }

        tracing::debug!("registered target `{}` ({})", name, target.role());
        self.index.insert(name, self.targets.len());
        self.targets.push(target);
        Ok(())
    }

    /// Register a target from its parts.
    pub fn add<F, I, S>(
        &mut self,
        name: impl Into<String>,
        action: F,
        deps: I,
        role: Role,
    ) -> Result<(), RegistryError>
    where
        F: Fn(&Configuration) -> Result<()> + 'static,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.register(Target::new(name, action).depends_on(deps).with_role(role))
    }

    /// Attach a hook action to run directly before or after `subject`.
    pub fn register_hook<F>(
        &mut self,
        kind: HookKind,
        subject: impl Into<String>,
        name: impl Into<String>,
        action: F,
    ) -> Result<(), RegistryError>
    where
        F: Fn(&Configuration) -> Result<()> + 'static,
    {
        let subject = subject.into();
        let role = match kind {
            HookKind::Before => Role::Before(subject),
            HookKind::After => Role::After(subject),
        };
        self.register(Target::new(name, action).with_role(role))
    }

    /// Declare the target used when an invocation names none.
    pub fn set_default(&mut self, name: impl Into<String>) -> Result<(), RegistryError> {
        let name = name.into();
        self.check_default(&name)?;
        self.default = Some(name);
        Ok(())
    }

    fn check_default(&self, name: &str) -> Result<(), RegistryError> {
        match &self.default {
            Some(existing) => Err(RegistryError::DuplicateDefault {
                existing: existing.clone(),
                name: name.to_string(),
            }),
            None => Ok(()),
        }
    }

    fn hooks_mut(&mut self, kind: HookKind) -> &mut HashMap<String, Vec<String>> {
        match kind {
            HookKind::Before => &mut self.before,
            HookKind::After => &mut self.after,
        }
    }

    /// Look up a target by name.
    pub fn get(&self, name: &str) -> Option<&Target> {
        self.index.get(name).map(|&i| &self.targets[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// The declared default target, if any.
    pub fn default_target(&self) -> Option<&str> {
        self.default.as_deref()
    }

    /// Hooks attached to `subject` on one side, in registration order.
    pub fn hooks(&self, kind: HookKind, subject: &str) -> &[String] {
        let map = match kind {
            HookKind::Before => &self.before,
            HookKind::After => &self.after,
        };
        map.get(subject).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All targets in registration order.
    pub fn targets(&self) -> impl Iterator<Item = &Target> {
        self.targets.iter()
    }

    /// All target names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.targets.iter().map(Target::name)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Check every name reference in the registry.
    ///
    /// Covers all targets, not just the ones reachable from a request, so a
    /// malformed description fails the same way whatever is requested.
    pub fn validate(&self) -> Result<(), RegistryError> {
        for target in &self.targets {
            for dep in target.deps() {
                if !self.contains(dep) {
                    return Err(RegistryError::UnknownDependency {
                        target: target.name().to_string(),
                        dependency: dep.clone(),
                    });
                }
            }
            if let Some((_, subject)) = target.role().hook() {
                if !self.contains(subject) {
                    return Err(RegistryError::UnknownHookSubject {
                        hook: target.name().to_string(),
                        subject: subject.to_string(),
                    });
                }
            }
        }

        if let Some(name) = &self.default {
            if !self.contains(name) {
                return Err(RegistryError::UnknownDefault { name: name.clone() });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &Configuration) -> Result<()> {
        Ok(())
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = Registry::new();
        registry.add("a", noop, Vec::<String>::new(), Role::Normal).unwrap();
        registry.add("b", noop, ["a"], Role::Normal).unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("b").unwrap().deps(), ["a"]);
        assert_eq!(registry.names().collect::<Vec<_>>(), ["a", "b"]);
        assert!(registry.get("c").is_none());
    }

    #[test]
    fn test_duplicate_target() {
        let mut registry = Registry::new();
        registry.register(Target::aggregate("a")).unwrap();
        let err = registry.register(Target::aggregate("a")).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateTarget { name: "a".into() });
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_default() {
        let mut registry = Registry::new();
        registry
            .register(Target::aggregate("all").with_role(Role::Default))
            .unwrap();
        registry.register(Target::aggregate("other")).unwrap();

        let err = registry.set_default("other").unwrap_err();
        assert_eq!(
            err,
            RegistryError::DuplicateDefault {
                existing: "all".into(),
                name: "other".into()
            }
        );
        assert_eq!(registry.default_target(), Some("all"));
    }

    #[test]
    fn test_default_role_rejected_without_registering() {
        let mut registry = Registry::new();
        registry.set_default("all").unwrap();

        let err = registry
            .register(Target::aggregate("second").with_role(Role::Default))
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateDefault { .. }));
        assert!(!registry.contains("second"));
    }

    #[test]
    fn test_hooks_keep_registration_order() {
        let mut registry = Registry::new();
        registry.register(Target::aggregate("compile")).unwrap();
        registry
            .register_hook(HookKind::Before, "compile", "h1", noop)
            .unwrap();
        registry
            .register_hook(HookKind::Before, "compile", "h2", noop)
            .unwrap();
        registry
            .register_hook(HookKind::After, "compile", "h3", noop)
            .unwrap();

        assert_eq!(registry.hooks(HookKind::Before, "compile"), ["h1", "h2"]);
        assert_eq!(registry.hooks(HookKind::After, "compile"), ["h3"]);
        assert!(registry.hooks(HookKind::After, "link").is_empty());
    }

    #[test]
    fn test_validate_allows_forward_references() {
        let mut registry = Registry::new();
        registry
            .register(Target::aggregate("all").depends_on(["compile"]))
            .unwrap();
        registry.register(Target::aggregate("compile")).unwrap();
        registry.set_default("all").unwrap();

        assert!(registry.validate().is_ok());
    }

    #[test]
    fn test_validate_unknown_dependency() {
        let mut registry = Registry::new();
        registry
            .register(Target::aggregate("all").depends_on(["compil"]))
            .unwrap();

        assert_eq!(
            registry.validate().unwrap_err(),
            RegistryError::UnknownDependency {
                target: "all".into(),
                dependency: "compil".into()
            }
        );
    }

    #[test]
    fn test_validate_unknown_hook_subject_and_default() {
        let mut registry = Registry::new();
        registry
            .register_hook(HookKind::After, "clean", "vendor_clean", noop)
            .unwrap();
        assert!(matches!(
            registry.validate().unwrap_err(),
            RegistryError::UnknownHookSubject { .. }
        ));

        let mut registry = Registry::new();
        registry.set_default("all").unwrap();
        assert_eq!(
            registry.validate().unwrap_err(),
            RegistryError::UnknownDefault { name: "all".into() }
        );
    }
}
