//! Actions for targets declared in a build description.
//!
//! Each declared step becomes a call to one of the side-effect primitives.
//! String fields may reference the target's configuration as `${key}`;
//! an argument consisting of exactly one placeholder that names a list
//! expands to one argument per element.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use thiserror::Error;

use crate::core::config::{ConfigValue, Configuration};
use crate::core::manifest::{CopyStep, RunStep, Step};
use crate::util::fs::copy;
use crate::util::process::ProcessBuilder;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_.-]*)\}").expect("placeholder pattern is valid")
});

/// A `${key}` placeholder names no configuration entry.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown configuration key `{key}` in `{text}`")]
pub struct InterpolateError {
    pub key: String,
    pub text: String,
}

/// Keys referenced by `${...}` placeholders in `text`.
pub fn placeholders(text: &str) -> Vec<&str> {
    PLACEHOLDER
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect()
}

/// Replace every placeholder in `text` with its configuration value.
pub fn interpolate(text: &str, conf: &Configuration) -> Result<String, InterpolateError> {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;

    for caps in PLACEHOLDER.captures_iter(text) {
        let (Some(whole), Some(key)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let value = conf.get(key.as_str()).ok_or_else(|| InterpolateError {
            key: key.as_str().to_string(),
            text: text.to_string(),
        })?;
        out.push_str(&text[last..whole.start()]);
        out.push_str(&value.to_string());
        last = whole.end();
    }
    out.push_str(&text[last..]);
    Ok(out)
}

/// Interpolate program arguments, splicing list values in place.
pub fn expand_args(args: &[String], conf: &Configuration) -> Result<Vec<String>, InterpolateError> {
    let mut expanded = Vec::with_capacity(args.len());
    for arg in args {
        if let Some(ConfigValue::List(items)) = whole_placeholder(arg).and_then(|key| conf.get(key)) {
            expanded.extend(items.iter().cloned());
        } else {
            expanded.push(interpolate(arg, conf)?);
        }
    }
    Ok(expanded)
}

fn whole_placeholder(arg: &str) -> Option<&str> {
    let caps = PLACEHOLDER.captures(arg)?;
    let whole = caps.get(0)?;
    if whole.start() == 0 && whole.end() == arg.len() {
        caps.get(1).map(|m| m.as_str())
    } else {
        None
    }
}

/// Build the action for a declared list of steps.
///
/// Relative paths resolve against `root`, the directory holding the build
/// description.
pub fn steps_action(
    steps: Vec<Step>,
    root: PathBuf,
) -> impl Fn(&Configuration) -> Result<()> + 'static {
    move |conf: &Configuration| {
        for step in &steps {
            run_step(step, conf, &root)?;
        }
        Ok(())
    }
}

fn run_step(step: &Step, conf: &Configuration, root: &Path) -> Result<()> {
    match step {
        Step::Copy(step) => run_copy(step, conf, root),
        Step::Run(step) => run_command(step, conf, root),
    }
}

fn run_copy(step: &CopyStep, conf: &Configuration, root: &Path) -> Result<()> {
    let from = root.join(interpolate(&step.from, conf)?);
    let to = root.join(interpolate(&step.to, conf)?);
    let pattern = step
        .pattern
        .as_deref()
        .map(|p| interpolate(p, conf))
        .transpose()?;

    let copied = copy(&from, &to, pattern.as_deref())?;
    tracing::info!("copied {} file(s) to {}", copied, to.display());
    Ok(())
}

fn run_command(step: &RunStep, conf: &Configuration, root: &Path) -> Result<()> {
    let program = interpolate(&step.program, conf)?;
    let args = expand_args(&step.args, conf)?;
    let cwd = match &step.cwd {
        Some(dir) => root.join(interpolate(dir, conf)?),
        None => root.to_path_buf(),
    };

    let mut process = ProcessBuilder::new(&program).args(&args).cwd(&cwd);
    for (key, value) in &step.env {
        process = process.env(key, interpolate(value, conf)?);
    }

    process
        .exec_and_check()
        .with_context(|| format!("in {}", cwd.display()))?;
    Ok(())
}
