//! pacman command lines.

use std::path::{Path, PathBuf};

use crate::util::config::{Config, DEFAULT_PACMAN_CONF};
use crate::util::process::ProcessBuilder;

/// Install reason recorded with `pacman -D`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mark {
    AsDeps,
    AsExplicit,
}

impl Mark {
    fn flag(self) -> &'static str {
        match self {
            Mark::AsDeps => "--asdeps",
            Mark::AsExplicit => "--asexplicit",
        }
    }
}

/// Builds pacman transactions, elevated through `sudo` unless disabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacmanCommand {
    pacman: PathBuf,
    sudo: Option<PathBuf>,
    config: PathBuf,
    no_confirm: bool,
}

impl Default for PacmanCommand {
    fn default() -> Self {
        PacmanCommand::new("pacman", DEFAULT_PACMAN_CONF)
    }
}

impl PacmanCommand {
    pub fn new(pacman: impl Into<PathBuf>, config: impl Into<PathBuf>) -> Self {
        PacmanCommand {
            pacman: pacman.into(),
            sudo: None,
            config: config.into(),
            no_confirm: false,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        PacmanCommand::new(config.pacman_bin(), config.pacman_conf())
            .with_sudo(config.sudo_bin())
            .with_no_confirm(config.install.no_confirm)
    }

    pub fn with_sudo(mut self, sudo: Option<PathBuf>) -> Self {
        self.sudo = sudo;
        self
    }

    pub fn with_no_confirm(mut self, no_confirm: bool) -> Self {
        self.no_confirm = no_confirm;
        self
    }

    pub fn config_path(&self) -> &Path {
        &self.config
    }

    fn build<I, S>(&self, op: &[&str], targets: I) -> ProcessBuilder
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        let cmd = match &self.sudo {
            Some(sudo) => ProcessBuilder::new(sudo).arg(&self.pacman),
            None => ProcessBuilder::new(&self.pacman),
        };
        let mut cmd = cmd.args(op).arg("--config").arg(&self.config);
        if self.no_confirm {
            cmd = cmd.arg("--noconfirm");
        }
        cmd.arg("--").args(targets)
    }

    /// `-S` from the sync repositories.
    pub fn sync<S: AsRef<str>>(&self, targets: &[S], as_deps: bool, sysupgrade: bool) -> ProcessBuilder {
        let mut op = vec!["-S"];
        if as_deps {
            op.push("--asdeps");
        }
        if sysupgrade {
            op.push("--sysupgrade");
        }
        self.build(&op, targets.iter().map(|t| t.as_ref()))
    }

    /// `-U` of built archives.
    pub fn upgrade(&self, archives: &[PathBuf]) -> ProcessBuilder {
        self.build(&["-U"], archives)
    }

    /// `-D` to record why packages are installed.
    pub fn mark<S: AsRef<str>>(&self, mark: Mark, names: &[S]) -> ProcessBuilder {
        self.build(&["-D", mark.flag()], names.iter().map(|n| n.as_ref()))
    }

    /// `-Rsu` of packages and the dependencies only they needed.
    pub fn remove<S: AsRef<str>>(&self, names: &[S]) -> ProcessBuilder {
        self.build(&["-Rsu"], names.iter().map(|n| n.as_ref()))
    }
}
