//! Command implementations

pub mod completions;
pub mod gendb;
pub mod graph;
pub mod install;
pub mod upgrade;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};

use crate::cli::{BuildFlags, ModeArgs};
use strata::aur::AurClient;
use strata::db::{AlpmDb, PacmanConf};
use strata::ops::{Backends, SyncOptions};
use strata::resolver::AutoSelector;
use strata::sources::AurGit;
use strata::util::config::{load_config, RebuildMode, TargetMode};
use strata::util::context::global_config_path;
use strata::util::process::find_executable;
use strata::util::shell::ColorChoice;
use strata::util::{Config, GlobalContext, Shell, SystemRunner};
use strata::vcs::{FingerprintStore, GitLsRemote};

/// Flags every subcommand sees.
pub struct GlobalArgs {
    pub verbose: bool,
    pub quiet: bool,
    pub color: String,
    pub config: Option<PathBuf>,
}

impl GlobalArgs {
    pub fn shell(&self) -> Result<Shell> {
        let color = self
            .color
            .parse::<ColorChoice>()
            .map_err(|e| anyhow!("{}", e))?;
        Ok(Shell::from_flags(self.quiet, self.verbose, color))
    }

    pub fn load_config(&self) -> Config {
        let global = global_config_path().unwrap_or_default();
        load_config(&global, self.config.as_deref())
    }
}

/// The live system: local databases, the AUR and the tools used to build.
pub struct Session {
    pub ctx: GlobalContext,
    pub shell: Shell,
    db: AlpmDb,
    remote: AurClient,
    runner: SystemRunner,
    pkgbuilds: AurGit,
    store: FingerprintStore,
}

impl Session {
    pub fn open(global: &GlobalArgs) -> Result<Self> {
        let shell = global.shell()?;
        let ctx = GlobalContext::new(global.load_config())?;
        let config = ctx.config();

        let conf = PacmanConf::load(&config.pacman_conf());
        let db = AlpmDb::open(&config.db_path(), &conf)
            .with_context(|| format!("failed to open {}", config.db_path().display()))?;
        let remote = AurClient::new(config.aur_url(), config.aur_timeout())?;
        let pkgbuilds = AurGit::from_config(config);

        let git = find_executable("git").unwrap_or_else(|| PathBuf::from("git"));
        let refs = GitLsRemote::new(git).with_timeout(config.aur_timeout());
        let store = FingerprintStore::load(ctx.vcs_file(), Arc::new(refs))?;

        Ok(Session {
            ctx,
            shell,
            db,
            remote,
            runner: SystemRunner,
            pkgbuilds,
            store,
        })
    }

    pub fn backends(&self) -> Backends<'_> {
        Backends {
            db: &self.db,
            remote: &self.remote,
            runner: &self.runner,
            pkgbuilds: &self.pkgbuilds,
            selector: &AutoSelector,
            store: Some(&self.store),
        }
    }

    /// Options from configuration, overridden by command line flags.
    pub fn sync_options(&self, flags: &BuildFlags) -> Result<SyncOptions> {
        let mut opts = SyncOptions::from_config(self.ctx.config());
        apply_mode(&mut opts, &flags.mode);

        opts.resolve.no_deps |= flags.no_deps;
        opts.resolve.no_check_deps |= flags.no_check;
        opts.install.needed |= flags.needed;
        opts.install.download_only |= flags.download_only;
        opts.install.as_deps |= flags.as_deps;
        opts.install.as_explicit |= flags.as_explicit;
        opts.no_confirm |= flags.no_confirm;
        opts.remove_make_deps |= flags.remove_make_deps;
        if let Some(rebuild) = &flags.rebuild {
            opts.install.rebuild = rebuild.parse::<RebuildMode>().map_err(|e| anyhow!("{}", e))?;
        }
        if opts.install.as_deps {
            opts.install.as_explicit = false;
        }
        opts.install.pacman = opts.install.pacman.clone().with_no_confirm(opts.no_confirm);

        Ok(opts)
    }
}

pub fn apply_mode(opts: &mut SyncOptions, mode: &ModeArgs) {
    if mode.repo {
        opts.resolve.mode = TargetMode::Repo;
    } else if mode.aur {
        opts.resolve.mode = TargetMode::Aur;
    }
}
