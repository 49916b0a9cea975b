//! Subprocess execution utilities.
//!
//! Target actions share one process, so a working-directory change made for
//! a subprocess must never leak into the next target. [`DirGuard`] scopes
//! the change and restores the previous directory when dropped, which covers
//! success, failure and early returns alike.

use std::collections::HashMap;
use std::env;
use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

use thiserror::Error;

/// Error from running an external program.
#[derive(Debug, Error)]
pub enum SubprocessError {
    #[error("failed to spawn `{program}`")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("`{command}` failed with exit code {}", describe_code(*code))]
    Exit { command: String, code: Option<i32> },

    #[error("cannot enter working directory {}", path.display())]
    Directory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl SubprocessError {
    /// Exit code of the process, if it ran and exited with one.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            SubprocessError::Exit { code, .. } => *code,
            _ => None,
        }
    }
}

fn describe_code(code: Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "<signal>".to_string(),
    }
}

/// Scoped change of the process working directory.
///
/// The previous directory is restored on drop.
#[derive(Debug)]
pub struct DirGuard {
    original: PathBuf,
}

impl DirGuard {
    /// Change into `dir`, remembering where we were.
    pub fn enter(dir: &Path) -> io::Result<Self> {
        let original = env::current_dir()?;
        env::set_current_dir(dir)?;
        tracing::trace!("entered {}", dir.display());
        Ok(DirGuard { original })
    }

    /// The directory that will be restored.
    pub fn original(&self) -> &Path {
        &self.original
    }
}

impl Drop for DirGuard {
    fn drop(&mut self) {
        if let Err(e) = env::set_current_dir(&self.original) {
            tracing::error!(
                "failed to restore working directory {}: {}",
                self.original.display(),
                e
            );
        }
    }
}

/// Builder for subprocess execution.
#[derive(Debug, Clone)]
pub struct ProcessBuilder {
    program: PathBuf,
    args: Vec<String>,
    env: HashMap<String, String>,
    cwd: Option<PathBuf>,
}

impl ProcessBuilder {
    /// Create a new process builder for the given program.
    pub fn new(program: impl AsRef<Path>) -> Self {
        ProcessBuilder {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            env: HashMap::new(),
            cwd: None,
        }
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args.extend(
            args.into_iter()
                .map(|s| s.as_ref().to_string_lossy().into_owned()),
        );
        self
    }

    /// Set an environment variable.
    pub fn env(mut self, key: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.env
            .insert(key.as_ref().to_string(), value.as_ref().to_string());
        self
    }

    /// Set the working directory for the duration of the run.
    pub fn cwd(mut self, cwd: impl AsRef<Path>) -> Self {
        self.cwd = Some(cwd.as_ref().to_path_buf());
        self
    }

    /// Run with inherited stdio and wait for completion.
    ///
    /// The working directory, if set, is entered before the program is
    /// looked up and left again before this returns.
    pub fn status(&self) -> Result<ExitStatus, SubprocessError> {
        let _guard = match &self.cwd {
            Some(dir) => Some(DirGuard::enter(dir).map_err(|source| {
                SubprocessError::Directory {
                    path: dir.clone(),
                    source,
                }
            })?),
            None => None,
        };

        let program = which::which(&self.program).unwrap_or_else(|_| self.program.clone());
        tracing::debug!("exec: {}", self.display_command());

        let mut cmd = Command::new(&program);
        cmd.args(&self.args);
        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        cmd.status().map_err(|source| SubprocessError::Spawn {
            program: self.program.display().to_string(),
            source,
        })
    }

    /// Run and require a zero exit status.
    pub fn exec_and_check(&self) -> Result<(), SubprocessError> {
        let status = self.status()?;
        if !status.success() {
            return Err(SubprocessError::Exit {
                command: self.display_command(),
                code: status.code(),
            });
        }
        Ok(())
    }

    /// Display the command for error messages.
    pub fn display_command(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// Run `program` with `args`, optionally inside `working_directory`.
///
/// Fails with [`SubprocessError::Exit`] on a non-zero exit status. The
/// caller's working directory is the same afterwards on every path.
pub fn run_program<I, S>(
    program: impl AsRef<Path>,
    args: I,
    working_directory: Option<&Path>,
) -> Result<(), SubprocessError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut builder = ProcessBuilder::new(program).args(args);
    if let Some(dir) = working_directory {
        builder = builder.cwd(dir);
    }
    builder.exec_and_check()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_display_command() {
        let pb = ProcessBuilder::new("python").args(["make.py", "compile"]);
        assert_eq!(pb.display_command(), "python make.py compile");
    }

    #[test]
    #[serial]
    fn test_dir_guard_restores() {
        let original = env::current_dir().unwrap();
        let tmp = TempDir::new().unwrap();
        {
            let guard = DirGuard::enter(tmp.path()).unwrap();
            assert_eq!(guard.original(), original);
            assert_ne!(env::current_dir().unwrap(), original);
        }
        assert_eq!(env::current_dir().unwrap(), original);
    }

    #[test]
    #[serial]
    #[cfg(unix)]
    fn test_runs_in_working_directory() {
        let original = env::current_dir().unwrap();
        let tmp = TempDir::new().unwrap();

        run_program("sh", ["-c", "echo built > marker.txt"], Some(tmp.path())).unwrap();

        assert!(tmp.path().join("marker.txt").exists());
        assert_eq!(env::current_dir().unwrap(), original);
    }

    #[test]
    #[serial]
    #[cfg(unix)]
    fn test_nonzero_exit_restores_directory() {
        let original = env::current_dir().unwrap();
        let tmp = TempDir::new().unwrap();

        let err = run_program("sh", ["-c", "exit 3"], Some(tmp.path())).unwrap_err();

        assert_eq!(err.exit_code(), Some(3));
        assert!(err.to_string().contains("exit code 3"));
        assert_eq!(env::current_dir().unwrap(), original);
    }

    #[test]
    #[serial]
    fn test_spawn_failure_restores_directory() {
        let original = env::current_dir().unwrap();
        let tmp = TempDir::new().unwrap();

        let err = run_program(
            "kiln-definitely-not-a-real-program",
            Vec::<String>::new(),
            Some(tmp.path()),
        )
        .unwrap_err();

        assert!(matches!(err, SubprocessError::Spawn { .. }));
        assert_eq!(err.exit_code(), None);
        assert_eq!(env::current_dir().unwrap(), original);
    }

    #[test]
    #[serial]
    fn test_missing_working_directory() {
        let original = env::current_dir().unwrap();
        let tmp = TempDir::new().unwrap();

        let err = run_program("sh", ["-c", "true"], Some(&tmp.path().join("missing"))).unwrap_err();

        assert!(matches!(err, SubprocessError::Directory { .. }));
        assert_eq!(env::current_dir().unwrap(), original);
    }
}
