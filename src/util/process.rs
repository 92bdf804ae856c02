//! Subprocess execution utilities.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use thiserror::Error;
use wait_timeout::ChildExt;

/// How often a timed child is polled for cancellation.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Shared cancellation flag.
///
/// Cloning shares the flag; once cancelled it stays cancelled.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Failures specific to bounded execution.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("`{command}` timed out after {timeout:?}")]
    TimedOut { command: String, timeout: Duration },

    #[error("`{0}` was cancelled")]
    Cancelled(String),
}

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<Output> for CommandOutput {
    fn from(output: Output) -> Self {
        CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

/// A command line to run: program, arguments, environment overrides and
/// working directory. Cheap to clone and print.
#[derive(Debug, Clone)]
pub struct ProcessBuilder {
    program: PathBuf,
    args: Vec<String>,
    env: HashMap<String, String>,
    cwd: Option<PathBuf>,
}

impl ProcessBuilder {
    pub fn new(program: impl AsRef<Path>) -> Self {
        ProcessBuilder {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            env: HashMap::new(),
            cwd: None,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    pub fn args<I, S>(self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        args.into_iter().fold(self, |pb, arg| pb.arg(arg))
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn cwd(mut self, cwd: impl AsRef<Path>) -> Self {
        self.cwd = Some(cwd.as_ref().to_path_buf());
        self
    }

    pub fn get_program(&self) -> &Path {
        &self.program
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    pub fn get_cwd(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    /// `program arg...`, as shown in logs and errors.
    pub fn display_command(&self) -> String {
        std::iter::once(self.program.display().to_string())
            .chain(self.args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).envs(&self.env);
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }
        cmd
    }

    fn spawn_piped(&self) -> Result<Child> {
        self.command()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to spawn `{}`", self.program.display()))
    }

    /// Run to completion, capturing stdout and stderr.
    pub fn exec(&self) -> Result<Output> {
        self.spawn_piped()?
            .wait_with_output()
            .with_context(|| format!("failed to wait for `{}`", self.program.display()))
    }

    /// Run attached to the terminal and return the exit code.
    pub fn status(&self) -> Result<Option<i32>> {
        let status = self
            .command()
            .status()
            .with_context(|| format!("failed to execute `{}`", self.program.display()))?;
        Ok(status.code())
    }

    /// Like [`exec`](Self::exec), but the child is killed once `timeout`
    /// passes or `cancel` fires.
    pub fn exec_with_timeout(&self, timeout: Duration, cancel: &CancelToken) -> Result<Output> {
        if cancel.is_cancelled() {
            return Err(ProcessError::Cancelled(self.display_command()).into());
        }

        let mut child = self.spawn_piped()?;
        let deadline = Instant::now() + timeout;
        let status = loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() || cancel.is_cancelled() {
                let _ = child.kill();
                let _ = child.wait();
                if cancel.is_cancelled() {
                    return Err(ProcessError::Cancelled(self.display_command()).into());
                }
                return Err(ProcessError::TimedOut {
                    command: self.display_command(),
                    timeout,
                }
                .into());
            }

            if let Some(status) = child.wait_timeout(remaining.min(POLL_INTERVAL))? {
                break status;
            }
        };

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        if let Some(mut out) = child.stdout.take() {
            out.read_to_end(&mut stdout)?;
        }
        if let Some(mut err) = child.stderr.take() {
            err.read_to_end(&mut stderr)?;
        }

        Ok(Output {
            status,
            stdout,
            stderr,
        })
    }
}

/// Runs external commands on behalf of the installer and fetchers.
///
/// `capture` collects output; `show` passes it through to the terminal.
pub trait CommandRunner: Send + Sync {
    fn capture(&self, cmd: &ProcessBuilder) -> Result<CommandOutput>;

    fn show(&self, cmd: &ProcessBuilder) -> Result<CommandOutput>;
}

/// [`CommandRunner`] that spawns real processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn capture(&self, cmd: &ProcessBuilder) -> Result<CommandOutput> {
        tracing::debug!("running `{}`", cmd.display_command());
        Ok(cmd.exec()?.into())
    }

    fn show(&self, cmd: &ProcessBuilder) -> Result<CommandOutput> {
        tracing::debug!("running `{}`", cmd.display_command());
        Ok(CommandOutput {
            code: cmd.status()?,
            ..CommandOutput::default()
        })
    }
}

/// Look `name` up in `PATH`.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    which::which(name).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_builder() {
        let output = ProcessBuilder::new("sh")
            .args(["-c", "echo $GREETING; pwd"])
            .env("GREETING", "hello")
            .cwd("/")
            .exec()
            .unwrap();
        assert!(output.status.success());
        assert_eq!(String::from_utf8_lossy(&output.stdout), "hello\n/\n");
    }

    #[test]
    fn test_display_command() {
        let pb = ProcessBuilder::new("makepkg").args(["-cf", "--noconfirm", "--holdver"]);

        assert_eq!(pb.display_command(), "makepkg -cf --noconfirm --holdver");
    }

    #[test]
    fn test_exec_with_timeout_finishes() {
        let output = ProcessBuilder::new("echo")
            .arg("quick")
            .exec_with_timeout(Duration::from_secs(5), &CancelToken::new())
            .unwrap();
        assert!(output.status.success());
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "quick");
    }

    #[test]
    fn test_exec_with_timeout_kills_slow_child() {
        let err = ProcessBuilder::new("sleep")
            .arg("5")
            .exec_with_timeout(Duration::from_millis(200), &CancelToken::new())
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProcessError>(),
            Some(ProcessError::TimedOut { .. })
        ));
    }

    #[test]
    fn test_cancelled_token_skips_spawn() {
        let token = CancelToken::new();
        token.cancel();
        let err = ProcessBuilder::new("echo")
            .exec_with_timeout(Duration::from_secs(1), &token)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProcessError>(),
            Some(ProcessError::Cancelled(_))
        ));
    }

    #[test]
    fn test_system_runner_capture() {
        let out = SystemRunner
            .capture(&ProcessBuilder::new("echo").arg("hi"))
            .unwrap();
        assert!(out.success());
        assert_eq!(out.stdout.trim(), "hi");
    }
}
