//! User-facing error reports.
//!
//! A [`Diagnostic`] is what the binary prints when an operation fails: one
//! headline, the packages or chains involved, and what to try next.

use std::fmt::{self, Write};
use std::path::PathBuf;

/// Hints shared by several error kinds.
pub mod suggestions {
    pub const PACKAGE_NOT_FOUND: &str =
        "Check the spelling, or run `pacman -Sy` if the sync databases are stale";

    pub const BUILD_FAILED: &str = "Re-run with `--verbose` to see the full makepkg output";

    pub const FETCH_FAILED: &str = "Check your network connection and the configured AUR URL";

    pub const CONFLICTS: &str = "Remove the conflicting packages first, or run without `--noconfirm`";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl Severity {
    fn label(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
        }
    }

    /// Bold red or bold yellow.
    fn ansi(self) -> &'static str {
        match self {
            Severity::Error => "1;31",
            Severity::Warning => "1;33",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub message: String,
    pub severity: Severity,
    /// One line per package or dependency chain involved.
    pub context: Vec<String>,
    pub suggestions: Vec<String>,
    /// File the problem was found in, usually a `.SRCINFO`.
    pub location: Option<PathBuf>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic {
            message: message.into(),
            severity: Severity::Error,
            context: Vec::new(),
            suggestions: Vec::new(),
            location: None,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            ..Diagnostic::error(message)
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context.push(context.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_location(mut self, path: impl Into<PathBuf>) -> Self {
        self.location = Some(path.into());
        self
    }

    /// Render for a terminal, with ANSI colours when `color` is set.
    pub fn format(&self, color: bool) -> String {
        let paint = |code: &str, text: &str| {
            if color {
                format!("\x1b[{}m{}\x1b[0m", code, text)
            } else {
                text.to_string()
            }
        };

        let mut out = String::new();
        let _ = writeln!(out, "{}: {}", paint(self.severity.ansi(), self.severity.label()), self.message);
        if let Some(path) = &self.location {
            let _ = writeln!(out, "  --> {}", path.display());
        }
        for line in &self.context {
            let _ = writeln!(out, "  → {}", line);
        }

        match self.suggestions.as_slice() {
            [] => {}
            [only] => {
                let _ = writeln!(out, "\n{}: {}", paint("1;32", "help"), only);
            }
            many => {
                let _ = writeln!(out, "\n{}: consider:", paint("1;32", "help"));
                for (i, suggestion) in many.iter().enumerate() {
                    let _ = writeln!(out, "  {}. {}", i + 1, suggestion);
                }
            }
        }
        out
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
