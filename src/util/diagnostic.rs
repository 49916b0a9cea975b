//! Error reports printed by the `kiln` binary.
//!
//! A report is the failure itself, the chain of causes underneath it, and
//! any hints for fixing the build description or the invocation.

use std::fmt::{self, Write as _};

/// Hints shared by several error kinds.
pub mod suggestions {
    pub const NO_MANIFEST: &str =
        "Create a Kiln.toml in the project root or pass one with `--file`";

    pub const LIST_TARGETS: &str = "Run `kiln --list` to see available targets";

    pub const BUILD_FAILED: &str = "Run `kiln --verbose` for more details";
}

const RED: &str = "\x1b[1;31m";
const GREEN: &str = "\x1b[1;32m";
const RESET: &str = "\x1b[0m";

/// A fatal error ready to show to the user.
#[derive(Debug, Clone, Default)]
pub struct Diagnostic {
    pub message: String,
    /// Underlying causes, outermost first.
    pub causes: Vec<String>,
    pub hints: Vec<String>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn caused_by(mut self, cause: impl Into<String>) -> Self {
        self.causes.push(cause.into());
        self
    }

    pub fn hint(mut self, hint: impl Into<String>) -> Self {
        self.hints.push(hint.into());
        self
    }

    /// Render for a terminal, with ANSI colors if `color` is set.
    pub fn format(&self, color: bool) -> String {
        let paint = |code: &str, word: &str| {
            if color {
                format!("{}{}{}", code, word, RESET)
            } else {
                word.to_string()
            }
        };

        let mut output = String::new();
        let _ = writeln!(output, "{}: {}", paint(RED, "error"), self.message);
        for cause in &self.causes {
            let _ = writeln!(output, "  caused by: {}", cause);
        }
        for hint in &self.hints {
            let _ = writeln!(output, "{}: {}", paint(GREEN, "help"), hint);
        }
        output
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format(false))
    }
}

/// Print a diagnostic to stderr.
pub fn emit(diagnostic: &Diagnostic, color: bool) {
    eprint!("{}", diagnostic.format(color));
}
