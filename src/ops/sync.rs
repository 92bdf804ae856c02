//! Implementation of `strata install`.
//!
//! Resolve the targets, check for conflicts, plan layers, fetch and download
//! what has to be built, then hand the plan to the [`Installer`].

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::aur::RemoteQuery;
use crate::db::Executor;
use crate::installer::download::download_sources;
use crate::installer::{Installer, InstallerOptions};
use crate::planner::{InstallPlan, PlanSummary};
use crate::resolver::{check_conflicts, Grapher, ProviderSelector, Resolution, ResolveOptions};
use crate::sources::PkgbuildSource;
use crate::util::config::Config;
use crate::util::context::GlobalContext;
use crate::util::pool::worker_count;
use crate::util::process::CommandRunner;
use crate::util::shell::{Shell, Status};
use crate::vcs::FingerprintStore;

/// Everything an operation talks to outside the process.
pub struct Backends<'a> {
    pub db: &'a dyn Executor,
    pub remote: &'a dyn RemoteQuery,
    pub runner: &'a dyn CommandRunner,
    pub pkgbuilds: &'a dyn PkgbuildSource,
    pub selector: &'a dyn ProviderSelector,
    pub store: Option<&'a FingerprintStore>,
}

impl<'a> Backends<'a> {
    pub fn grapher(&self, opts: ResolveOptions) -> Grapher<'a> {
        Grapher::new(self.db, self.remote, self.selector, opts)
    }
}

/// Options for the install command.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Targets of the form `[repo/|aur/]name[op version]`.
    pub targets: Vec<String>,

    /// Directory holding a `.SRCINFO` to build and install
    pub srcinfo_dir: Option<PathBuf>,

    pub resolve: ResolveOptions,
    pub install: InstallerOptions,

    /// Fail instead of asking when installed packages conflict
    pub no_confirm: bool,

    /// Remove build-only dependencies after a successful install
    pub remove_make_deps: bool,

    /// Concurrent source downloads
    pub download_workers: usize,
}

impl SyncOptions {
    pub fn from_config(config: &Config) -> Self {
        SyncOptions {
            targets: Vec::new(),
            srcinfo_dir: None,
            resolve: ResolveOptions::from_config(config),
            install: InstallerOptions::from_config(config),
            no_confirm: config.install.no_confirm,
            remove_make_deps: config.build.remove_make_deps,
            download_workers: worker_count(config.build.download_workers),
        }
    }
}

/// Resolve and install `opts.targets`.
pub fn sync(
    ctx: &GlobalContext,
    backends: &Backends<'_>,
    shell: &Shell,
    opts: &SyncOptions,
) -> Result<PlanSummary> {
    shell.status(
        Status::Resolving,
        format!("{} targets", opts.targets.len() + usize::from(opts.srcinfo_dir.is_some())),
    );

    let mut grapher = backends.grapher(opts.resolve.clone());
    if let Some(dir) = &opts.srcinfo_dir {
        grapher.graph_from_srcinfo(dir)?;
    }
    grapher.graph_from_targets(&opts.targets)?;
    let resolution = grapher.finish()?;

    execute(ctx, backends, shell, resolution, opts)
}

/// Install a finished resolution.
pub(crate) fn execute(
    ctx: &GlobalContext,
    backends: &Backends<'_>,
    shell: &Shell,
    resolution: Resolution,
    opts: &SyncOptions,
) -> Result<PlanSummary> {
    let conflicts = check_conflicts(&resolution.candidates(), backends.db);
    conflicts.ensure_confirmable(opts.no_confirm)?;
    for (pkg, others) in &conflicts.conflicts {
        let others: Vec<&str> = others.iter().map(String::as_str).collect();
        shell.warn(format!("{} conflicts with {}", pkg, others.join(", ")));
    }

    let build_dir = ctx.build_dir();
    let plan = InstallPlan::new(&resolution.graph, &build_dir);
    let summary = plan.summary();
    if plan.is_empty() {
        shell.note("there is nothing to do");
        return Ok(summary);
    }
    shell.note(summary.to_string().trim_end());

    let bases = plan.bases();
    if !bases.is_empty() {
        ctx.ensure_dir(&build_dir)?;
        let progress = shell.progress(bases.len() as u64, "Fetching PKGBUILDs");
        backends
            .pkgbuilds
            .fetch(&bases, &build_dir, &progress)
            .context("failed to fetch PKGBUILDs")?;
    }
    if !plan.build_dirs.is_empty() {
        shell.status(Status::Downloading, format!("sources of {} bases", plan.build_dirs.len()));
        let progress = shell.progress(plan.build_dirs.len() as u64, "Downloading sources");
        download_sources(
            backends.runner,
            &opts.install.makepkg,
            &plan.build_dirs,
            opts.download_workers,
            &progress,
        )?;
    }

    shell.status(Status::Installing, format!("{} packages", summary.total()));
    let mut installer = Installer::new(backends.db, backends.runner, opts.install.clone());
    if let Some(store) = backends.store {
        installer = installer.with_store(store);
    }
    installer.install(&plan)?;

    if opts.remove_make_deps && !opts.install.download_only {
        installer.remove_make_deps(&plan.make_deps())?;
    }
    installer.compile_failed_and_ignored()?;

    shell.status(Status::Finished, format!("{} packages", summary.total()));
    Ok(summary)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::installer::{InstallError, PacmanCommand};
    use crate::resolver::{AutoSelector, ResolveError};
    use crate::test_support::{
        aur_pkg, local_pkg, repo_pkg, MockDb, MockProcessOutput, MockRefQuery, MockRemote,
        MockRunner,
    };
    use crate::util::shell::{ColorChoice, Verbosity};
    use crate::util::shell::Progress;
    use std::collections::BTreeSet;
    use std::path::Path;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    /// Stand-in for the AUR git server: creates empty checkouts.
    #[derive(Default)]
    pub(crate) struct FakePkgbuilds {
        pub fetched: Mutex<Vec<String>>,
    }

    impl PkgbuildSource for FakePkgbuilds {
        fn fetch(
            &self,
            bases: &BTreeSet<String>,
            build_dir: &Path,
            _progress: &Progress,
        ) -> Result<Vec<(String, PathBuf)>> {
            let mut out = Vec::new();
            for base in bases {
                let dir = build_dir.join(base);
                std::fs::create_dir_all(&dir)?;
                self.fetched.lock().unwrap().push(base.clone());
                out.push((base.clone(), dir));
            }
            Ok(out)
        }
    }

    pub(crate) fn quiet() -> Shell {
        Shell::new(Verbosity::Quiet, ColorChoice::Never)
    }

    pub(crate) fn context(tmp: &TempDir) -> GlobalContext {
        GlobalContext::with_dirs(tmp.path().to_path_buf(), tmp.path().join("cache"), Config::default())
    }

    /// Archive path makepkg would list for `name` built in `base`.
    pub(crate) fn archive(ctx: &GlobalContext, base: &str, name: &str) -> PathBuf {
        ctx.build_dir().join(base).join(format!("{}-1-1-x86_64.pkg.tar.zst", name))
    }

    /// Make `--packagelist` in `base` list `names`, with the archives on disk.
    pub(crate) fn built(runner: MockRunner, ctx: &GlobalContext, base: &str, names: &[&str]) -> MockRunner {
        let dir = ctx.build_dir().join(base);
        std::fs::create_dir_all(&dir).unwrap();
        let mut list = String::new();
        for name in names {
            let path = archive(ctx, base, name);
            std::fs::write(&path, b"").unwrap();
            list.push_str(&format!("{}\n", path.display()));
        }
        runner.expect_in(dir, "--packagelist", MockProcessOutput::success(list))
    }

    fn opts(targets: &[&str]) -> SyncOptions {
        SyncOptions {
            targets: targets.iter().map(|t| t.to_string()).collect(),
            install: InstallerOptions {
                pacman: PacmanCommand::new("pacman", "/etc/pacman.conf"),
                ..InstallerOptions::default()
            },
            download_workers: 2,
            ..SyncOptions::default()
        }
    }

    #[test]
    fn test_installed_repo_dep_is_skipped_and_aur_dep_goes_first() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(&tmp);
        let db = MockDb::new()
            .with_local(local_pkg("q", "1-1"))
            .with_sync("extra", repo_pkg("q", "1-1"));
        let remote = MockRemote::new()
            .with(aur_pkg("p", "1-1").with_depends(["q", "r"]))
            .with(aur_pkg("r", "1-1"));
        let runner = built(MockRunner::new(), &ctx, "p", &["p"]);
        let runner = built(runner, &ctx, "r", &["r"]);
        let pkgbuilds = FakePkgbuilds::default();
        let backends = Backends {
            db: &db,
            remote: &remote,
            runner: &runner,
            pkgbuilds: &pkgbuilds,
            selector: &AutoSelector,
            store: None,
        };

        let summary = sync(&ctx, &backends, &quiet(), &opts(&["p"])).unwrap();
        assert_eq!(summary.total(), 2);
        assert_eq!(*pkgbuilds.fetched.lock().unwrap(), vec!["p", "r"]);

        let upgrades = runner.calls_matching("pacman -U");
        assert_eq!(upgrades.len(), 2);
        assert!(upgrades[0].command.ends_with(&archive(&ctx, "r", "r").display().to_string()));
        assert!(upgrades[1].command.ends_with(&archive(&ctx, "p", "p").display().to_string()));
        assert!(runner.calls_matching("pacman -S").is_empty());
        assert_eq!(runner.calls_matching("--verifysource").len(), 2);
    }

    #[test]
    fn test_terminal_failure_reports_manual_intervention() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(&tmp);
        let db = MockDb::new();
        let remote = MockRemote::new().with(aur_pkg("x", "1-1")).with(aur_pkg("y", "1-1"));
        let runner = built(MockRunner::new(), &ctx, "y", &["y"]).expect_in(
            ctx.build_dir().join("x"),
            "--packagelist",
            MockProcessOutput::failure(1, "PKGBUILD is broken"),
        );
        let pkgbuilds = FakePkgbuilds::default();
        let backends = Backends {
            db: &db,
            remote: &remote,
            runner: &runner,
            pkgbuilds: &pkgbuilds,
            selector: &AutoSelector,
            store: None,
        };

        let err = sync(&ctx, &backends, &quiet(), &opts(&["x", "y"])).unwrap_err();
        match err.downcast_ref::<InstallError>() {
            Some(InstallError::FailedAndIgnored(failed)) => {
                assert!(failed.contains("x"));
                assert!(!failed.contains("y"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        let upgrades = runner.calls_matching("pacman -U");
        assert_eq!(upgrades.len(), 1);
        assert!(upgrades[0].command.ends_with(&archive(&ctx, "y", "y").display().to_string()));
    }

    #[test]
    fn test_missing_targets_stop_before_any_command() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(&tmp);
        let db = MockDb::new();
        let remote = MockRemote::new().with(aur_pkg("app", "1-1").with_depends(["ghost"]));
        let runner = MockRunner::new();
        let pkgbuilds = FakePkgbuilds::default();
        let backends = Backends {
            db: &db,
            remote: &remote,
            runner: &runner,
            pkgbuilds: &pkgbuilds,
            selector: &AutoSelector,
            store: None,
        };

        let err = sync(&ctx, &backends, &quiet(), &opts(&["app"])).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ResolveError>(),
            Some(ResolveError::PackagesNotFound { .. })
        ));
        assert!(runner.calls().is_empty());
        assert!(pkgbuilds.fetched.lock().unwrap().is_empty());
    }

    #[test]
    fn test_installed_conflict_with_no_confirm_fails() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(&tmp);
        let db = MockDb::new().with_local(local_pkg("yay", "11-1"));
        let remote = MockRemote::new().with(aur_pkg("yay-git", "12-1").with_conflicts(["yay"]));
        let runner = MockRunner::new();
        let pkgbuilds = FakePkgbuilds::default();
        let backends = Backends {
            db: &db,
            remote: &remote,
            runner: &runner,
            pkgbuilds: &pkgbuilds,
            selector: &AutoSelector,
            store: None,
        };

        let mut options = opts(&["yay-git"]);
        options.no_confirm = true;
        assert!(sync(&ctx, &backends, &quiet(), &options).is_err());
        assert!(runner.calls().is_empty());

        // Without --noconfirm pacman gets to ask about it.
        let runner = built(MockRunner::new(), &ctx, "yay-git", &["yay-git"]);
        let backends = Backends {
            runner: &runner,
            ..backends
        };
        sync(&ctx, &backends, &quiet(), &opts(&["yay-git"])).unwrap();
        assert_eq!(runner.calls_matching("pacman -U").len(), 1);
    }

    #[test]
    fn test_make_deps_removed_after_install() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(&tmp);
        let db = MockDb::new().with_sync("extra", repo_pkg("go", "1.22-1"));
        let remote = MockRemote::new().with(aur_pkg("yay", "12-1").with_make_depends(["go"]));
        let runner = built(MockRunner::new(), &ctx, "yay", &["yay"]);
        let pkgbuilds = FakePkgbuilds::default();
        let backends = Backends {
            db: &db,
            remote: &remote,
            runner: &runner,
            pkgbuilds: &pkgbuilds,
            selector: &AutoSelector,
            store: None,
        };

        let mut options = opts(&["yay"]);
        options.remove_make_deps = true;
        sync(&ctx, &backends, &quiet(), &options).unwrap();

        let commands: Vec<String> = runner
            .calls_matching("pacman")
            .into_iter()
            .map(|c| c.command)
            .collect();
        assert_eq!(commands.first().map(String::as_str), Some("pacman -S --asdeps --config /etc/pacman.conf -- extra/go"));
        assert_eq!(commands.last().map(String::as_str), Some("pacman -Rsu --config /etc/pacman.conf -- go"));
    }

    #[test]
    fn test_nothing_to_do() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(&tmp);
        let db = MockDb::new();
        let remote = MockRemote::new();
        let runner = MockRunner::new();
        let pkgbuilds = FakePkgbuilds::default();
        let backends = Backends {
            db: &db,
            remote: &remote,
            runner: &runner,
            pkgbuilds: &pkgbuilds,
            selector: &AutoSelector,
            store: None,
        };

        let summary = sync(&ctx, &backends, &quiet(), &opts(&[])).unwrap();
        assert_eq!(summary.total(), 0);
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_fingerprints_recorded_for_installed_devel_package() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(&tmp);
        let db = MockDb::new();
        let remote = MockRemote::new().with(aur_pkg("yay-git", "r100.abc-1"));
        let runner = built(MockRunner::new(), &ctx, "yay-git", &["yay-git"]);
        std::fs::write(
            ctx.build_dir().join("yay-git").join(".SRCINFO"),
            "pkgbase = yay-git\n\tpkgver = r100.abc\n\tpkgrel = 1\n\
             \tsource = yay::git+https://github.com/Jguer/yay.git\n\npkgname = yay-git\n",
        )
        .unwrap();
        let store = FingerprintStore::load(
            tmp.path().join("vcs.json"),
            Arc::new(MockRefQuery::new().with_head("github.com/Jguer/yay.git", "def")),
        )
        .unwrap();
        let pkgbuilds = FakePkgbuilds::default();
        let backends = Backends {
            db: &db,
            remote: &remote,
            runner: &runner,
            pkgbuilds: &pkgbuilds,
            selector: &AutoSelector,
            store: Some(&store),
        };

        sync(&ctx, &backends, &quiet(), &opts(&["yay-git"])).unwrap();
        assert_eq!(store.get("yay-git").unwrap()["github.com/Jguer/yay.git"].sha, "def");
        assert!(tmp.path().join("vcs.json").exists());
    }
}
