//! Shared utilities

pub mod diagnostic;
pub mod exit;
pub mod fs;
pub mod process;
pub mod shell;

pub use diagnostic::Diagnostic;
pub use fs::{copy, CopyError};
pub use process::{run_program, DirGuard, ProcessBuilder, SubprocessError};
pub use shell::Shell;
