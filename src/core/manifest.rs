//! Kiln.toml build description parsing and schema.
//!
//! A build description declares configuration templates and targets:
//!
//! ```toml
//! default = "all"
//!
//! [templates.csc]
//! srcdir = "src"
//! bindir = "bin"
//! libs = ["System.dll"]
//!
//! [templates.game]
//! extends = "csc"
//! libs = ["PrimusGE.dll"]            # appended to the parent list
//!
//! [targets.all]
//! depends = ["content", "compile"]
//!
//! [targets.content]
//! template = "game"
//! steps = [{ copy = { from = "${srcdir}", to = "${bindir}", pattern = "*.hlsl" } }]
//!
//! [targets.vendor_compile]
//! before = "compile"
//! steps = [{ run = { program = "python", args = ["make.py", "compile"], cwd = "vendor/PrimusGE" } }]
//! ```
//!
//! Targets are registered in document order, which is also the order hooks
//! on the same subject run in.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

use crate::builder::actions::{placeholders, steps_action};
use crate::core::config::{ConfigError, ConfigValue, Configuration, Override};
use crate::core::registry::{Registry, RegistryError};
use crate::core::target::{Role, Target};
use crate::util::fs::find_upwards;

static TARGET_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^\s*\[\s*targets\s*\.\s*(?:"([^"]+)"|([A-Za-z0-9_-]+))\s*\]\s*(?:#.*)?$"#)
        .expect("target header pattern is valid")
});

/// Canonical build description file name.
pub const MANIFEST_NAME: &str = "Kiln.toml";

/// Error while loading a build description.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("could not find `{}` in {} or any parent directory", MANIFEST_NAME, dir.display())]
    NotFound { dir: PathBuf },

    #[error("failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value for `{key}` in {context}")]
    InvalidValue {
        context: String,
        key: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("{context} refers to unknown template `{name}`")]
    UnknownTemplate { context: String, name: String },

    #[error("template inheritance cycle: {}", chain.join(" -> "))]
    TemplateCycle { chain: Vec<String> },

    #[error("invalid configuration for {context}")]
    Config {
        context: String,
        #[source]
        source: ConfigError,
    },

    #[error("target `{target}` can only have one of `before`, `after` and `default = true`")]
    ConflictingRole { target: String },

    #[error("target `{target}` uses `${{{key}}}` but its configuration has no `{key}`")]
    UnknownPlaceholder { target: String, key: String },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// A declared step of a target.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Copy(CopyStep),
    Run(RunStep),
}

/// Copy files matching `pattern` from `from` to `to`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CopyStep {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub pattern: Option<String>,
}

/// Run an external program.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunStep {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Working directory, relative to the build description.
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl Step {
    /// All interpolated strings of this step.
    fn strings(&self) -> Vec<&str> {
        match self {
            Step::Copy(step) => {
                let mut out = vec![step.from.as_str(), step.to.as_str()];
                out.extend(step.pattern.as_deref());
                out
            }
            Step::Run(step) => {
                let mut out = vec![step.program.as_str()];
                out.extend(step.args.iter().map(String::as_str));
                out.extend(step.cwd.as_deref());
                out.extend(step.env.values().map(String::as_str));
                out
            }
        }
    }
}

/// An override value as written: a plain value, or `{ replace = value }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawOverride {
    Replace { replace: ConfigValue },
    Value(ConfigValue),
}

impl RawOverride {
    fn into_override(self, key: &str) -> Override {
        match self {
            RawOverride::Replace { replace } => Override::replace(key, replace),
            RawOverride::Value(value) => Override::set(key, value),
        }
    }

    fn into_value(self) -> ConfigValue {
        match self {
            RawOverride::Replace { replace } => replace,
            RawOverride::Value(value) => value,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawManifest {
    #[serde(default)]
    default: Option<String>,
    #[serde(default)]
    templates: toml::Table,
    #[serde(default)]
    targets: toml::Table,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTarget {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    depends: Vec<String>,
    #[serde(default)]
    template: Option<String>,
    #[serde(default)]
    config: toml::Table,
    #[serde(default)]
    before: Option<String>,
    #[serde(default)]
    after: Option<String>,
    #[serde(default)]
    default: bool,
    #[serde(default)]
    steps: Vec<Step>,
}

/// A target as declared in the build description.
#[derive(Debug, Clone)]
pub struct TargetDecl {
    pub name: String,
    pub description: Option<String>,
    pub depends: Vec<String>,
    pub role: Role,
    pub config: Configuration,
    pub steps: Vec<Step>,
}

/// A parsed and checked build description.
#[derive(Debug, Clone)]
pub struct Manifest {
    path: PathBuf,
    default: Option<String>,
    templates: HashMap<String, Configuration>,
    targets: Vec<TargetDecl>,
}

impl Manifest {
    /// Load a build description from disk.
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents, path)
    }

    /// Parse a build description. `path` locates it for relative paths and
    /// error messages.
    pub fn parse(contents: &str, path: &Path) -> Result<Self, ManifestError> {
        let raw: RawManifest = toml::from_str(contents).map_err(|source| {
            // TOML rejects a repeated table header before targets are registered.
            match duplicate_target(contents) {
                Some(name) => RegistryError::DuplicateTarget { name }.into(),
                None => ManifestError::Parse {
                    path: path.to_path_buf(),
                    source,
                },
            }
        })?;

        let templates = TemplateSet::new(&raw.templates)?.resolve_all()?;

        let mut targets = Vec::with_capacity(raw.targets.len());
        for (name, value) in raw.targets {
            let decl: RawTarget = value.try_into().map_err(|source| ManifestError::InvalidValue {
                context: "targets".to_string(),
                key: name.clone(),
                source,
            })?;
            targets.push(target_decl(name, decl, &templates)?);
        }

        Ok(Manifest {
            path: path.to_path_buf(),
            default: raw.default,
            templates,
            targets,
        })
    }

    /// Directory relative paths resolve against.
    pub fn root(&self) -> &Path {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        }
    }

    pub fn default_target(&self) -> Option<&str> {
        self.default.as_deref()
    }

    pub fn template(&self, name: &str) -> Option<&Configuration> {
        self.templates.get(name)
    }

    /// Declared targets in document order.
    pub fn targets(&self) -> &[TargetDecl] {
        &self.targets
    }

    /// Register every declared target into a fresh registry.
    pub fn into_registry(self) -> Result<Registry, ManifestError> {
        let root = self.root().to_path_buf();
        let mut registry = Registry::new();

        for decl in self.targets {
            let mut target = Target::new(decl.name, steps_action(decl.steps, root.clone()))
                .depends_on(decl.depends)
                .with_config(decl.config)
                .with_role(decl.role);
            if let Some(description) = decl.description {
                target = target.with_description(description);
            }
            registry.register(target)?;
        }

        if let Some(name) = self.default {
            registry.set_default(name)?;
        }

        Ok(registry)
    }
}

/// Locate the build description by walking up from `cwd`.
pub fn find_manifest(cwd: &Path) -> Result<PathBuf, ManifestError> {
    find_upwards(cwd, MANIFEST_NAME).ok_or_else(|| ManifestError::NotFound {
        dir: cwd.to_path_buf(),
    })
}

fn target_decl(
    name: String,
    raw: RawTarget,
    templates: &HashMap<String, Configuration>,
) -> Result<TargetDecl, ManifestError> {
    let context = format!("target `{}`", name);

    let role = match (raw.before, raw.after, raw.default) {
        (None, None, false) => Role::Normal,
        (None, None, true) => Role::Default,
        (Some(subject), None, false) => Role::Before(subject),
        (None, Some(subject), false) => Role::After(subject),
        _ => return Err(ManifestError::ConflictingRole { target: name }),
    };

    let overrides = parse_overrides(&raw.config, &context)?;
    let config = match &raw.template {
        Some(template) => {
            let base = templates
                .get(template)
                .ok_or_else(|| ManifestError::UnknownTemplate {
                    context: context.clone(),
                    name: template.clone(),
                })?;
            let overrides: Vec<Override> = overrides
                .into_iter()
                .map(|(key, value)| value.into_override(&key))
                .collect();
            base.derive(&overrides).map_err(|source| ManifestError::Config {
                context: context.clone(),
                source,
            })?
        }
        None => Configuration::from_entries(
            overrides
                .into_iter()
                .map(|(key, value)| (key, value.into_value())),
        ),
    };

    for step in &raw.steps {
        for text in step.strings() {
            if let Some(key) = placeholders(text).into_iter().find(|key| !config.contains(key)) {
                return Err(ManifestError::UnknownPlaceholder {
                    target: name,
                    key: key.to_string(),
                });
            }
        }
    }

    Ok(TargetDecl {
        name,
        description: raw.description,
        depends: raw.depends,
        role,
        config,
        steps: raw.steps,
    })
}

/// First `[targets.<name>]` header that appears twice in `contents`.
fn duplicate_target(contents: &str) -> Option<String> {
    let mut seen = HashSet::new();
    TARGET_HEADER
        .captures_iter(contents)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|name| name.as_str())
        .find(|name| !seen.insert(*name))
        .map(str::to_string)
}

fn parse_overrides(
    table: &toml::Table,
    context: &str,
) -> Result<Vec<(String, RawOverride)>, ManifestError> {
    table
        .iter()
        .map(|(key, value)| {
            let parsed: RawOverride = value.clone().try_into().map_err(|source| {
                ManifestError::InvalidValue {
                    context: context.to_string(),
                    key: key.clone(),
                    source,
                }
            })?;
            Ok((key.clone(), parsed))
        })
        .collect()
}

/// Templates as written, resolved lazily through their `extends` chains.
struct TemplateSet {
    raw: HashMap<String, (Option<String>, Vec<(String, RawOverride)>)>,
    resolved: HashMap<String, Configuration>,
}

impl TemplateSet {
    fn new(table: &toml::Table) -> Result<Self, ManifestError> {
        let mut raw = HashMap::new();

        for (name, value) in table {
            let context = format!("template `{}`", name);
            let mut entries: toml::Table =
                value
                    .clone()
                    .try_into()
                    .map_err(|source| ManifestError::InvalidValue {
                        context: context.clone(),
                        key: name.clone(),
                        source,
                    })?;

            let extends = match entries.remove("extends") {
                Some(parent) => Some(parent.try_into::<String>().map_err(|source| {
                    ManifestError::InvalidValue {
                        context: context.clone(),
                        key: "extends".to_string(),
                        source,
                    }
                })?),
                None => None,
            };

            let overrides = parse_overrides(&entries, &context)?;
            raw.insert(name.clone(), (extends, overrides));
        }

        Ok(TemplateSet {
            raw,
            resolved: HashMap::new(),
        })
    }

    fn resolve_all(mut self) -> Result<HashMap<String, Configuration>, ManifestError> {
        let mut names: Vec<String> = self.raw.keys().cloned().collect();
        names.sort();
        for name in names {
            self.resolve(&name, &mut Vec::new())?;
        }
        Ok(self.resolved)
    }

    fn resolve(&mut self, name: &str, chain: &mut Vec<String>) -> Result<Configuration, ManifestError> {
        if let Some(config) = self.resolved.get(name) {
            return Ok(config.clone());
        }
        if chain.iter().any(|n| n == name) {
            let mut cycle = chain.clone();
            cycle.push(name.to_string());
            return Err(ManifestError::TemplateCycle { chain: cycle });
        }

        let (extends, overrides) = self
            .raw
            .get(name)
            .cloned()
            .ok_or_else(|| ManifestError::UnknownTemplate {
                context: chain
                    .last()
                    .map(|child| format!("template `{}`", child))
                    .unwrap_or_else(|| "build description".to_string()),
                name: name.to_string(),
            })?;

        let config = match extends {
            None => Configuration::from_entries(
                overrides
                    .into_iter()
                    .map(|(key, value)| (key, value.into_value())),
            ),
            Some(parent) => {
                chain.push(name.to_string());
                let base = self.resolve(&parent, chain)?;
                chain.pop();

                let overrides: Vec<Override> = overrides
                    .into_iter()
                    .map(|(key, value)| value.into_override(&key))
                    .collect();
                base.derive(&overrides).map_err(|source| ManifestError::Config {
                    context: format!("template `{}`", name),
                    source,
                })?
            }
        };

        self.resolved.insert(name.to_string(), config.clone());
        Ok(config)
    }
}
