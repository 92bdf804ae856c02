//! Test utilities and mocks for strata unit tests.
//!
//! Everything strata talks to outside the process sits behind a trait:
//! the package databases ([`Executor`]), the AUR ([`RemoteQuery`]), git
//! remotes ([`RefQuery`]) and subprocesses ([`CommandRunner`]). The types
//! here implement those traits in memory.
//!
//! # Example
//!
//! ```rust,ignore
//! use strata::test_support::{MockProcessOutput, MockRunner};
//!
//! let runner = MockRunner::new()
//!     .expect("--packagelist", MockProcessOutput::success("/pkg/foo-1-1-any.pkg.tar.zst"));
//! // Pass `&runner` wherever a `&dyn CommandRunner` is taken...
//! assert_eq!(runner.calls_matching("makepkg").len(), 2);
//! ```

pub mod fixtures;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::aur::{AurError, AurQuery, RemoteQuery, SearchBy};
use crate::core::record::{Origin, PackageRecord};
use crate::db::{AlpmDb, Executor, Upgrade};
use crate::util::process::{CancelToken, CommandOutput, CommandRunner, ProcessBuilder};
use crate::vcs::{RefError, RefQuery};

pub use fixtures::*;

/// Mock process output for testing command execution.
#[derive(Debug, Clone)]
pub struct MockProcessOutput {
    /// Exit status code (0 = success).
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl MockProcessOutput {
    /// Create a successful output with the given stdout.
    pub fn success(stdout: impl Into<String>) -> Self {
        MockProcessOutput {
            status: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Create a failure output with the given stderr and status code.
    pub fn failure(status: i32, stderr: impl Into<String>) -> Self {
        MockProcessOutput {
            status,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

impl Default for MockProcessOutput {
    fn default() -> Self {
        MockProcessOutput::success("")
    }
}

impl From<MockProcessOutput> for CommandOutput {
    fn from(out: MockProcessOutput) -> Self {
        CommandOutput {
            code: Some(out.status),
            stdout: out.stdout,
            stderr: out.stderr,
        }
    }
}

/// Expectation for a command execution.
#[derive(Debug, Clone)]
struct CommandExpectation {
    /// Substring of the displayed command line.
    pattern: String,
    /// Only match commands run in this directory.
    cwd: Option<PathBuf>,
    output: MockProcessOutput,
    /// Number of times this expectation can be used (None = unlimited).
    times: Option<usize>,
    used: usize,
}

impl CommandExpectation {
    fn matches(&self, command: &str, cwd: Option<&PathBuf>) -> bool {
        command.contains(&self.pattern)
            && self.cwd.as_ref().map_or(true, |dir| Some(dir) == cwd)
            && self.times.map_or(true, |n| self.used < n)
    }
}

/// A command the runner was asked to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    /// Program and arguments, as [`ProcessBuilder::display_command`] shows them.
    pub command: String,
    pub cwd: Option<PathBuf>,
}

#[derive(Debug, Default)]
struct RunnerState {
    expectations: Vec<CommandExpectation>,
    calls: Vec<RecordedCall>,
}

/// [`CommandRunner`] that records every command and answers from a list of
/// expectations. Commands matching no expectation succeed with no output.
///
/// Expectations are tried in the order they were added.
#[derive(Debug, Default)]
pub struct MockRunner {
    state: Mutex<RunnerState>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(self, pattern: &str, cwd: Option<PathBuf>, output: MockProcessOutput, times: Option<usize>) -> Self {
        self.lock().expectations.push(CommandExpectation {
            pattern: pattern.to_string(),
            cwd,
            output,
            times,
            used: 0,
        });
        self
    }

    /// Answer every command containing `pattern` with `output`.
    pub fn expect(self, pattern: &str, output: MockProcessOutput) -> Self {
        self.push(pattern, None, output, None)
    }

    /// Like [`expect`](Self::expect), but only for the first `n` matches.
    pub fn expect_times(self, pattern: &str, output: MockProcessOutput, n: usize) -> Self {
        self.push(pattern, None, output, Some(n))
    }

    /// Like [`expect`](Self::expect), but only for commands run in `dir`.
    pub fn expect_in(self, dir: impl Into<PathBuf>, pattern: &str, output: MockProcessOutput) -> Self {
        self.push(pattern, Some(dir.into()), output, None)
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    /// Calls whose command line contains `pattern`.
    pub fn calls_matching(&self, pattern: &str) -> Vec<RecordedCall> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.command.contains(pattern))
            .cloned()
            .collect()
    }

    fn run(&self, cmd: &ProcessBuilder) -> Result<CommandOutput> {
        let call = RecordedCall {
            command: cmd.display_command(),
            cwd: cmd.get_cwd().map(PathBuf::from),
        };

        let mut state = self.lock();
        let output = state
            .expectations
            .iter_mut()
            .find(|exp| exp.matches(&call.command, call.cwd.as_ref()))
            .map(|exp| {
                exp.used += 1;
                exp.output.clone()
            })
            .unwrap_or_default();
        state.calls.push(call);
        Ok(output.into())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RunnerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl CommandRunner for MockRunner {
    fn capture(&self, cmd: &ProcessBuilder) -> Result<CommandOutput> {
        self.run(cmd)
    }

    fn show(&self, cmd: &ProcessBuilder) -> Result<CommandOutput> {
        self.run(cmd)
    }
}

/// In-memory package databases.
///
/// Built up like an [`AlpmDb`] read from disk: installed packages with
/// [`with_local`](Self::with_local), repository packages with
/// [`with_sync`](Self::with_sync) in repository priority order.
#[derive(Debug, Clone)]
pub struct MockDb {
    local: Vec<PackageRecord>,
    sync: Vec<(String, Vec<PackageRecord>)>,
    architectures: Vec<String>,
    db: AlpmDb,
}

impl Default for MockDb {
    fn default() -> Self {
        let architectures = vec!["x86_64".to_string()];
        MockDb {
            local: Vec::new(),
            sync: Vec::new(),
            db: AlpmDb::from_records(Vec::new(), Vec::new(), architectures.clone()),
            architectures,
        }
    }
}

impl MockDb {
    pub fn new() -> Self {
        Self::default()
    }

    fn rebuild(mut self) -> Self {
        self.db = AlpmDb::from_records(self.local.clone(), self.sync.clone(), self.architectures.clone());
        self
    }

    pub fn with_local(mut self, record: PackageRecord) -> Self {
        self.local.push(record);
        self.rebuild()
    }

    /// Add `record` to the sync repository `repo`, creating it after the
    /// existing ones if needed.
    pub fn with_sync(mut self, repo: &str, mut record: PackageRecord) -> Self {
        record.origin = Origin::Repo {
            repository: repo.to_string(),
        };
        match self.sync.iter_mut().find(|(name, _)| name == repo) {
            Some((_, pkgs)) => pkgs.push(record),
            None => self.sync.push((repo.to_string(), vec![record])),
        }
        self.rebuild()
    }

    pub fn with_architectures(mut self, archs: &[&str]) -> Self {
        self.architectures = archs.iter().map(|a| a.to_string()).collect();
        self.rebuild()
    }
}

impl Executor for MockDb {
    fn local_package(&self, name: &str) -> Option<PackageRecord> {
        self.db.local_package(name)
    }

    fn local_packages(&self) -> Vec<PackageRecord> {
        self.db.local_packages()
    }

    fn local_satisfier_exists(&self, dep: &str) -> bool {
        self.db.local_satisfier_exists(dep)
    }

    fn sync_package(&self, name: &str) -> Option<PackageRecord> {
        self.db.sync_package(name)
    }

    fn sync_package_from_db(&self, db: &str, name: &str) -> Option<PackageRecord> {
        self.db.sync_package_from_db(db, name)
    }

    fn sync_satisfier(&self, dep: &str) -> Option<PackageRecord> {
        self.db.sync_satisfier(dep)
    }

    fn packages_from_group(&self, group: &str) -> Vec<PackageRecord> {
        self.db.packages_from_group(group)
    }

    fn is_correct_version_installed(&self, name: &str, version: &str) -> bool {
        self.db.is_correct_version_installed(name, version)
    }

    fn installed_foreign_packages(&self) -> Vec<PackageRecord> {
        self.db.installed_foreign_packages()
    }

    fn repo_upgrades(&self) -> Vec<Upgrade> {
        self.db.repo_upgrades()
    }

    fn architectures(&self) -> Vec<String> {
        self.db.architectures()
    }
}

/// In-memory AUR that counts the queries it receives.
#[derive(Debug, Default)]
pub struct MockRemote {
    packages: Vec<PackageRecord>,
    failing_searches: Vec<String>,
    name_queries: AtomicUsize,
    provider_searches: AtomicUsize,
}

impl MockRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, record: PackageRecord) -> Self {
        self.packages.push(record);
        self
    }

    /// Make provider searches for `needle` fail.
    pub fn with_failing_search(mut self, needle: &str) -> Self {
        self.failing_searches.push(needle.to_string());
        self
    }

    /// Batched name lookups answered so far.
    pub fn name_queries(&self) -> usize {
        self.name_queries.load(Ordering::SeqCst)
    }

    /// Provider searches answered so far.
    pub fn provider_searches(&self) -> usize {
        self.provider_searches.load(Ordering::SeqCst)
    }
}

impl RemoteQuery for MockRemote {
    fn query(&self, query: &AurQuery) -> Result<Vec<PackageRecord>, AurError> {
        let counter = match query.by {
            SearchBy::Name => &self.name_queries,
            SearchBy::Provides => &self.provider_searches,
        };
        counter.fetch_add(1, Ordering::SeqCst);

        if query.by == SearchBy::Provides {
            if let Some(needle) = query
                .needles
                .iter()
                .find(|n| self.failing_searches.contains(n))
            {
                return Err(AurError::Rpc(format!("search for {} timed out", needle)));
            }
        }

        Ok(self
            .packages
            .iter()
            .filter(|pkg| match query.by {
                SearchBy::Name => query.needles.contains(&pkg.name),
                SearchBy::Provides => query.needles.iter().any(|needle| {
                    pkg.name == *needle || pkg.provided_names().any(|p| p == needle)
                }),
            })
            .cloned()
            .collect())
    }
}

/// Remote heads served from memory. URLs without a head are unreachable.
#[derive(Debug, Clone, Default)]
pub struct MockRefQuery {
    heads: Arc<Mutex<HashMap<String, (String, Duration)>>>,
}

impl MockRefQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_head(self, url: &str, sha: &str) -> Self {
        self.with_slow_head(url, sha, Duration::ZERO)
    }

    /// A head that takes `delay` to answer unless the query is cancelled.
    pub fn with_slow_head(self, url: &str, sha: &str, delay: Duration) -> Self {
        self.heads
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(url.to_string(), (sha.to_string(), delay));
        self
    }
}

impl RefQuery for MockRefQuery {
    fn head(
        &self,
        url: &str,
        _branch: &str,
        _protocols: &[String],
        cancel: &CancelToken,
    ) -> Result<String, RefError> {
        let head = self
            .heads
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(url)
            .cloned();
        let Some((sha, delay)) = head else {
            return Err(RefError::Unreachable {
                url: url.to_string(),
                reason: "no such repository".to_string(),
            });
        };

        let deadline = Instant::now() + delay;
        while Instant::now() < deadline {
            if cancel.is_cancelled() {
                return Err(RefError::Cancelled { url: url.to_string() });
            }
            thread::sleep(Duration::from_millis(10));
        }
        Ok(sha)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runner_matches_in_order() {
        let runner = MockRunner::new()
            .expect_times("pacman -U", MockProcessOutput::failure(1, "conflict"), 1)
            .expect_in("/build/a", "makepkg", MockProcessOutput::success("listed"));

        let upgrade = ProcessBuilder::new("pacman").arg("-U");
        assert_eq!(runner.show(&upgrade).unwrap().code, Some(1));
        assert!(runner.show(&upgrade).unwrap().success());

        let in_a = ProcessBuilder::new("makepkg").cwd("/build/a");
        let in_b = ProcessBuilder::new("makepkg").cwd("/build/b");
        assert_eq!(runner.capture(&in_a).unwrap().stdout, "listed");
        assert_eq!(runner.capture(&in_b).unwrap().stdout, "");

        assert_eq!(runner.calls().len(), 4);
        assert_eq!(runner.calls_matching("makepkg")[1].cwd, Some(PathBuf::from("/build/b")));
    }

    #[test]
    fn test_remote_counts_queries() {
        let remote = MockRemote::new()
            .with(aur_pkg("jdk-bin", "21-1").with_provides(["java-runtime=21"]))
            .with(aur_pkg("yay", "12-1"));

        let found = remote.query(&AurQuery::names(["yay", "missing"])).unwrap();
        assert_eq!(found.len(), 1);
        let providers = remote.query(&AurQuery::provides("java-runtime")).unwrap();
        assert_eq!(providers[0].name, "jdk-bin");
        assert_eq!((remote.name_queries(), remote.provider_searches()), (1, 1));
    }

    #[test]
    fn test_db_sync_repository_override() {
        let db = MockDb::new().with_sync("core", repo_pkg("glibc", "2.40-1"));
        assert_eq!(db.sync_package("glibc").unwrap().repository(), Some("core"));
        assert!(db.local_package("glibc").is_none());
    }

    #[test]
    fn test_ref_query_unknown_url() {
        let refs = MockRefQuery::new().with_head("a.org/a.git", "1");
        let cancel = CancelToken::new();
        assert_eq!(refs.head("a.org/a.git", "HEAD", &[], &cancel).unwrap(), "1");
        assert!(matches!(
            refs.head("b.org/b.git", "HEAD", &[], &cancel),
            Err(RefError::Unreachable { .. })
        ));
    }
}
