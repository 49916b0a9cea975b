//! Target definitions - what gets run.
//!
//! A Target is a named action with declared dependencies, a configuration,
//! and a role. Hooks are targets too: their role ties them to a subject
//! target they must run directly before or after.

use std::fmt;

use anyhow::Result;

use crate::core::config::Configuration;

/// Signature of a target action.
///
/// Actions read their configuration and produce external side effects.
/// They never feed values back into the registry.
pub type ActionFn = dyn Fn(&Configuration) -> Result<()>;

/// Which side of its subject a hook runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    Before,
    After,
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookKind::Before => write!(f, "before"),
            HookKind::After => write!(f, "after"),
        }
    }
}

/// The role a target plays in the build.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Role {
    /// An ordinary, independently requestable target.
    #[default]
    Normal,
    /// Ordinary target that is also the default for the invocation.
    Default,
    /// Runs immediately before the named subject.
    Before(String),
    /// Runs immediately after the named subject.
    After(String),
}

impl Role {
    /// The hook side and subject, if this role is a hook.
    pub fn hook(&self) -> Option<(HookKind, &str)> {
        match self {
            Role::Before(subject) => Some((HookKind::Before, subject)),
            Role::After(subject) => Some((HookKind::After, subject)),
            Role::Normal | Role::Default => None,
        }
    }

    pub fn is_hook(&self) -> bool {
        self.hook().is_some()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Normal => write!(f, "target"),
            Role::Default => write!(f, "default"),
            Role::Before(subject) => write!(f, "before `{}`", subject),
            Role::After(subject) => write!(f, "after `{}`", subject),
        }
    }
}

/// A named build action.
pub struct Target {
    name: String,
    action: Box<ActionFn>,
    deps: Vec<String>,
    config: Configuration,
    role: Role,
    description: Option<String>,
}

impl Target {
    /// Create a target with the given action and no dependencies.
    pub fn new<F>(name: impl Into<String>, action: F) -> Self
    where
        F: Fn(&Configuration) -> Result<()> + 'static,
    {
        Target {
            name: name.into(),
            action: Box::new(action),
            deps: Vec::new(),
            config: Configuration::new(),
            role: Role::Normal,
            description: None,
        }
    }

    /// Create a target whose action does nothing.
    ///
    /// Useful for aggregate targets like `all` that only exist for their
    /// dependencies.
    pub fn aggregate(name: impl Into<String>) -> Self {
        Target::new(name, |_| Ok(()))
    }

    /// Add dependencies. Duplicate names are dropped, first occurrence wins.
    pub fn depends_on<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for dep in deps {
            let dep = dep.into();
            if !self.deps.contains(&dep) {
                self.deps.push(dep);
            }
        }
        self
    }

    pub fn with_config(mut self, config: Configuration) -> Self {
        self.config = config;
        self
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    /// One-line summary shown when listing targets.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared dependencies, in declaration order.
    pub fn deps(&self) -> &[String] {
        &self.deps
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn role(&self) -> &Role {
        &self.role
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Invoke the action with this target's configuration.
    pub fn run(&self) -> Result<()> {
        (self.action)(&self.config)
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Target")
            .field("name", &self.name)
            .field("deps", &self.deps)
            .field("config", &self.config)
            .field("role", &self.role)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_depends_on_dedups() {
        let target = Target::aggregate("all").depends_on(["a", "b", "a"]);
        assert_eq!(target.deps(), ["a", "b"]);
    }

    #[test]
    fn test_role_hook() {
        assert_eq!(
            Role::Before("compile".into()).hook(),
            Some((HookKind::Before, "compile"))
        );
        assert_eq!(Role::After("clean".into()).hook(), Some((HookKind::After, "clean")));
        assert!(!Role::Default.is_hook());
    }

    #[test]
    fn test_run_passes_config() {
        let seen = Rc::new(Cell::new(false));
        let seen_in = Rc::clone(&seen);
        let config = Configuration::from_entries([("bindir", "bin")]);

        let target = Target::new("content", move |conf| {
            seen_in.set(conf.get_str("bindir") == Some("bin"));
            Ok(())
        })
        .with_config(config);

        target.run().unwrap();
        assert!(seen.get());
    }
}
