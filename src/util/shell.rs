//! Terminal output: status lines and progress bars.
//!
//! Status lines go to stderr with the verb right-aligned, so the messages
//! of one run line up:
//!
//! ```text
//!    Resolving 3 targets
//!     Fetching 2 PKGBUILDs
//!   Installing 4 packages
//! ```

use std::fmt::Display;
use std::io::{self, IsTerminal};
use std::str::FromStr;

use indicatif::{ProgressBar, ProgressStyle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Errors only.
    Quiet,
    #[default]
    Normal,
    /// Debug logging is on, so progress bars would interleave with it.
    Verbose,
}

/// When to emit ANSI colours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorChoice {
    /// Only when stderr is a terminal.
    #[default]
    Auto,
    Always,
    Never,
}

impl FromStr for ColorChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(ColorChoice::Auto),
            "always" => Ok(ColorChoice::Always),
            "never" => Ok(ColorChoice::Never),
            _ => Err(format!(
                "invalid color choice '{}'; expected 'auto', 'always', or 'never'",
                s
            )),
        }
    }
}

/// The verb in front of a status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Resolving,
    Fetching,
    Downloading,
    Installing,
    Finished,
    Skipped,
    Info,
    Warning,
    Error,
}

impl Status {
    /// Label and ANSI colour.
    fn style(self) -> (&'static str, &'static str) {
        match self {
            Status::Resolving => ("Resolving", "1;36"),
            Status::Fetching => ("Fetching", "1;36"),
            Status::Downloading => ("Downloading", "1;36"),
            Status::Installing => ("Installing", "1;36"),
            Status::Finished => ("Finished", "1;32"),
            Status::Skipped => ("Skipped", "1;33"),
            Status::Info => ("Info", "1;34"),
            Status::Warning => ("Warning", "1;33"),
            Status::Error => ("error", "1;31"),
        }
    }
}

const STATUS_WIDTH: usize = 12;

/// Where operations report what they are doing.
#[derive(Debug)]
pub struct Shell {
    verbosity: Verbosity,
    use_color: bool,
}

impl Shell {
    pub fn new(verbosity: Verbosity, color: ColorChoice) -> Self {
        let use_color = match color {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => io::stderr().is_terminal(),
        };
        Shell {
            verbosity,
            use_color,
        }
    }

    /// `--quiet` wins over `--verbose`.
    pub fn from_flags(quiet: bool, verbose: bool, color: ColorChoice) -> Self {
        let verbosity = match (quiet, verbose) {
            (true, _) => Verbosity::Quiet,
            (false, true) => Verbosity::Verbose,
            (false, false) => Verbosity::Normal,
        };
        Shell::new(verbosity, color)
    }

    pub fn is_quiet(&self) -> bool {
        self.verbosity == Verbosity::Quiet
    }

    pub fn is_verbose(&self) -> bool {
        self.verbosity == Verbosity::Verbose
    }

    pub fn use_color(&self) -> bool {
        self.use_color
    }

    pub fn status(&self, status: Status, msg: impl Display) {
        if self.is_quiet() && status != Status::Error {
            return;
        }
        eprintln!("{} {}", self.verb(status), msg);
    }

    pub fn note(&self, msg: impl Display) {
        self.status(Status::Info, msg);
    }

    pub fn warn(&self, msg: impl Display) {
        self.status(Status::Warning, msg);
    }

    pub fn error(&self, msg: impl Display) {
        self.status(Status::Error, msg);
    }

    fn verb(&self, status: Status) -> String {
        let (label, color) = status.style();
        let padded = format!("{:>1$}", label, STATUS_WIDTH);
        if self.use_color {
            format!("\x1b[{}m{}\x1b[0m", color, padded)
        } else {
            padded
        }
    }

    /// A bar for `total` jobs. Nothing is drawn when quiet, when verbose,
    /// or for a single job.
    pub fn progress(&self, total: u64, msg: impl Display) -> Progress {
        if self.verbosity != Verbosity::Normal || total <= 1 {
            return Progress::hidden();
        }
        let pb = ProgressBar::new(total);
        if let Ok(style) = ProgressStyle::with_template("{spinner:.green} {msg} [{bar:30.cyan/blue}] {pos}/{len}") {
            pb.set_style(style.progress_chars("=> "));
        }
        pb.set_message(msg.to_string());
        Progress { pb: Some(pb) }
    }
}

impl Default for Shell {
    fn default() -> Self {
        Shell::new(Verbosity::Normal, ColorChoice::Auto)
    }
}

/// Handle to a progress bar, cloned into worker threads.
#[derive(Debug, Clone)]
pub struct Progress {
    pb: Option<ProgressBar>,
}

impl Progress {
    pub fn hidden() -> Self {
        Progress { pb: None }
    }

    pub fn inc(&self, delta: u64) {
        if let Some(pb) = &self.pb {
            pb.inc(delta);
        }
    }

    pub fn finish(&self) {
        if let Some(pb) = &self.pb {
            pb.finish_and_clear();
        }
    }
}
