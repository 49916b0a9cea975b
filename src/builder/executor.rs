//! Plan executor.
//!
//! Runs an [`ExecutionPlan`] strictly in order, one target at a time. On the
//! first failure the rest of the plan is skipped, except the after-hooks of
//! the failed target: they are committed to run right after it and still
//! fire, so cleanup hooks see failed builds too. The original failure is
//! what gets reported.

use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use thiserror::Error;

use crate::core::registry::Registry;
use crate::resolver::plan::{ExecutionPlan, PlanEntry};
use crate::util::shell::{format_duration, Shell, Status};

/// A target action failed.
#[derive(Debug, Error)]
#[error("target `{target}` failed")]
pub struct BuildError {
    pub target: String,
    #[source]
    pub source: anyhow::Error,
}

/// Final state of one plan entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetStatus {
    Succeeded,
    Failed,
    /// Not run because an earlier entry failed.
    Skipped,
}

/// Outcome of one plan entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetOutcome {
    pub name: String,
    pub status: TargetStatus,
    /// Zero for skipped entries.
    pub duration: Duration,
}

/// Result of running a whole plan.
#[derive(Debug)]
pub struct RunReport {
    outcomes: Vec<TargetOutcome>,
    error: Option<BuildError>,
    elapsed: Duration,
}

impl RunReport {
    /// Per-entry outcomes, in plan order.
    pub fn outcomes(&self) -> &[TargetOutcome] {
        &self.outcomes
    }

    pub fn status_of(&self, name: &str) -> Option<TargetStatus> {
        self.outcomes
            .iter()
            .find(|o| o.name == name)
            .map(|o| o.status)
    }

    /// Number of entries with the given status.
    pub fn count(&self, status: TargetStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// The failure that stopped the plan.
    pub fn error(&self) -> Option<&BuildError> {
        self.error.as_ref()
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Surface the original failure, if any.
    pub fn into_result(self) -> Result<Vec<TargetOutcome>, BuildError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.outcomes),
        }
    }
}

/// Sequential plan executor.
pub struct Executor<'a> {
    registry: &'a Registry,
    shell: &'a Shell,
}

impl<'a> Executor<'a> {
    /// Create an executor over a populated registry.
    pub fn new(registry: &'a Registry, shell: &'a Shell) -> Self {
        Executor { registry, shell }
    }

    /// Run every entry of `plan`, applying the failure policy.
    pub fn execute(&self, plan: &ExecutionPlan) -> RunReport {
        let start = Instant::now();
        let entries = plan.entries();
        let mut outcomes = Vec::with_capacity(entries.len());
        let mut error = None;

        for (i, entry) in entries.iter().enumerate() {
            let began = Instant::now();
            match self.run_entry(entry) {
                Ok(()) => outcomes.push(self.outcome(entry, TargetStatus::Succeeded, began)),
                Err(err) => {
                    outcomes.push(self.outcome(entry, TargetStatus::Failed, began));
                    self.finish_failed(&entry.name, &entries[i + 1..], &mut outcomes);
                    error = Some(BuildError {
                        target: entry.name.clone(),
                        source: err,
                    });
                    break;
                }
            }
        }

        RunReport {
            outcomes,
            error,
            elapsed: start.elapsed(),
        }
    }

    /// Run the failed target's after-hooks and skip everything else.
    fn finish_failed(&self, failed: &str, rest: &[PlanEntry], outcomes: &mut Vec<TargetOutcome>) {
        for entry in rest {
            if entry.is_after_hook_of(failed) {
                tracing::debug!("running after-hook `{}` of failed `{}`", entry.name, failed);
                let began = Instant::now();
                let status = match self.run_entry(entry) {
                    Ok(()) => TargetStatus::Succeeded,
                    Err(err) => {
                        // The subject's failure is the one reported.
                        self.shell.error(format!("{:#}", err));
                        TargetStatus::Failed
                    }
                };
                outcomes.push(self.outcome(entry, status, began));
            } else {
                self.shell.status(Status::Skipped, &entry.name);
                outcomes.push(TargetOutcome {
                    name: entry.name.clone(),
                    status: TargetStatus::Skipped,
                    duration: Duration::ZERO,
                });
            }
        }
    }

    fn run_entry(&self, entry: &PlanEntry) -> Result<()> {
        let target = self
            .registry
            .get(&entry.name)
            .ok_or_else(|| anyhow!("target `{}` is not registered", entry.name))?;

        self.shell.status(Status::Running, &entry.name);
        tracing::debug!("running `{}`", entry.name);
        target.run()
    }

    fn outcome(&self, entry: &PlanEntry, status: TargetStatus, began: Instant) -> TargetOutcome {
        let duration = began.elapsed();
        match status {
            TargetStatus::Succeeded => self.shell.status(
                Status::Finished,
                format!("{} in {}", entry.name, format_duration(duration)),
            ),
            TargetStatus::Failed => self.shell.status(Status::Failed, &entry.name),
            TargetStatus::Skipped => {}
        }
        TargetOutcome {
            name: entry.name.clone(),
            status,
            duration,
        }
    }
}
