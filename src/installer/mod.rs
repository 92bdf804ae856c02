//! Layer-by-layer installation.
//!
//! Layers are installed in order, prerequisites first. When a layer fails and
//! it is not the last one, its packages are rolled up into the next layer and
//! retried together with it. The last layer is the terminal pass: a package
//! that fails to build there is recorded in [`FailedAndIgnored`] and the
//! rest of the layer still goes ahead.

pub mod build;
pub mod download;
pub mod errors;
pub mod transaction;

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use tracing::{debug, error, info, warn};

use crate::core::package::{PackageRef, PackageSource};
use crate::db::Executor;
use crate::planner::{InstallPlan, Layer};
use crate::resolver::srcinfo::Srcinfo;
use crate::util::config::{Config, RebuildMode};
use crate::util::errors::MultiError;
use crate::util::pool::fan_out;
use crate::util::process::{CommandRunner, ProcessBuilder};
use crate::vcs::{parse_source, FingerprintStore};

pub use build::{decide_build, parse_package_list, BuildDecision, BuildInputs, MakepkgCommand};
pub use errors::{FailedAndIgnored, InstallError};
pub use transaction::{Mark, PacmanCommand};

/// Where the installer is in its walk over the layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallState {
    PendingLayer(usize),
    BuildingLayer(usize),
    LayerSucceeded(usize),
    LayerFailed(usize),
    RollingUp(usize),
    Complete,
}

#[derive(Debug, Clone, Default)]
pub struct InstallerOptions {
    /// Skip bases that are installed at the version about to be built.
    pub needed: bool,
    pub rebuild: RebuildMode,
    /// Build, but install nothing.
    pub download_only: bool,
    /// Record every explicit target as a dependency.
    pub as_deps: bool,
    /// Record every package as explicitly installed.
    pub as_explicit: bool,
    pub pacman: PacmanCommand,
    pub makepkg: MakepkgCommand,
}

impl InstallerOptions {
    pub fn from_config(config: &Config) -> Self {
        InstallerOptions {
            needed: config.build.needed,
            rebuild: config.rebuild(),
            download_only: false,
            as_deps: false,
            as_explicit: false,
            pacman: PacmanCommand::from_config(config),
            makepkg: MakepkgCommand::new(config.makepkg_bin()),
        }
    }
}

/// Archives of one package plus its debug package, if one was built.
struct Artifacts {
    archives: Vec<PathBuf>,
    debug: Option<String>,
}

pub struct Installer<'a> {
    db: &'a dyn Executor,
    runner: &'a dyn CommandRunner,
    store: Option<&'a FingerprintStore>,
    opts: InstallerOptions,
    failed_and_ignored: FailedAndIgnored,
    history: Vec<InstallState>,
}

impl<'a> Installer<'a> {
    pub fn new(db: &'a dyn Executor, runner: &'a dyn CommandRunner, opts: InstallerOptions) -> Self {
        Installer {
            db,
            runner,
            store: None,
            opts,
            failed_and_ignored: FailedAndIgnored::default(),
            history: Vec::new(),
        }
    }

    /// Record VCS fingerprints of built development packages in `store`.
    pub fn with_store(mut self, store: &'a FingerprintStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Every state transition so far.
    pub fn history(&self) -> &[InstallState] {
        &self.history
    }

    pub fn failed_and_ignored(&self) -> &FailedAndIgnored {
        &self.failed_and_ignored
    }

    /// The terminal-pass failures as an error, if there were any.
    pub fn compile_failed_and_ignored(&self) -> Result<(), InstallError> {
        if self.failed_and_ignored.is_empty() {
            Ok(())
        } else {
            Err(InstallError::FailedAndIgnored(self.failed_and_ignored.clone()))
        }
    }

    fn transition(&mut self, state: InstallState) {
        debug!("installer: {:?}", state);
        self.history.push(state);
    }

    /// Install every layer of `plan`.
    ///
    /// Errors of rolled-up layers are only reported if the terminal layer
    /// fails as well.
    pub fn install(&mut self, plan: &InstallPlan) -> Result<()> {
        let mut layers = plan.layers.clone();
        let rollup_errors = MultiError::new();
        let last = layers.len().saturating_sub(1);

        let mut i = 0;
        while i < layers.len() {
            let terminal = i == last;
            self.transition(InstallState::PendingLayer(i));
            self.transition(InstallState::BuildingLayer(i));

            match self.handle_layer(&layers[i], &plan.build_dirs, terminal) {
                Ok(()) => self.transition(InstallState::LayerSucceeded(i)),
                Err(e) if !terminal => {
                    self.transition(InstallState::LayerFailed(i));
                    let e = anyhow!(e);
                    warn!("{:#}; retrying together with the next layer", e);
                    rollup_errors.add(e);
                    self.transition(InstallState::RollingUp(i));
                    let failed = std::mem::take(&mut layers[i]);
                    let next = &mut layers[i + 1];
                    for (name, pkg) in failed {
                        next.insert(name, pkg);
                    }
                }
                Err(e) => {
                    self.transition(InstallState::LayerFailed(i));
                    rollup_errors.add(e);
                    return rollup_errors.into_result();
                }
            }
            i += 1;
        }

        self.transition(InstallState::Complete);
        Ok(())
    }

    fn is_dep(&self, pkg: &PackageRef) -> bool {
        if self.opts.as_deps {
            true
        } else if self.opts.as_explicit {
            false
        } else {
            pkg.reason.is_dependency()
        }
    }

    /// Install one layer: repository packages first, then built packages.
    pub fn handle_layer(
        &mut self,
        layer: &Layer,
        build_dirs: &BTreeMap<String, PathBuf>,
        terminal: bool,
    ) -> Result<(), InstallError> {
        let mut sync_deps = Vec::new();
        let mut sync_exp = Vec::new();
        let mut sync_groups = Vec::new();
        let mut sysupgrade = false;
        let mut src_deps = BTreeSet::new();
        let mut src_exp = BTreeSet::new();

        for (name, pkg) in layer {
            match pkg.source {
                PackageSource::RemoteBinary if pkg.is_upgrade => sysupgrade = true,
                PackageSource::RemoteBinary if pkg.is_group => sync_groups.push(name.clone()),
                PackageSource::RemoteBinary => {
                    if self.is_dep(pkg) {
                        sync_deps.push(name.clone());
                    } else {
                        sync_exp.push(name.clone());
                    }
                }
                PackageSource::SourceBuild | PackageSource::LocalSourceFile => {
                    if self.is_dep(pkg) {
                        src_deps.insert(name.clone());
                    } else {
                        src_exp.insert(name.clone());
                    }
                }
            }
        }
        debug!(
            "sync deps {:?}, sync explicit {:?}, source deps {:?}, source explicit {:?}",
            sync_deps, sync_exp, src_deps, src_exp
        );

        if !self.opts.download_only {
            self.install_sync(layer, &sync_deps, &sync_exp, &sync_groups, sysupgrade)?;
        }
        self.install_built(layer, build_dirs, &src_deps, &src_exp, terminal)
    }

    fn install_sync(
        &self,
        layer: &Layer,
        deps: &[String],
        explicit: &[String],
        groups: &[String],
        sysupgrade: bool,
    ) -> Result<(), InstallError> {
        let targets = |names: &[String]| -> Vec<String> {
            names.iter().map(|n| layer[n].sync_target()).collect()
        };

        if !deps.is_empty() {
            self.transact(self.opts.pacman.sync(&targets(deps), true, false))?;
        }
        let mut explicit_targets = targets(explicit);
        explicit_targets.extend(groups.iter().cloned());
        if !explicit_targets.is_empty() || sysupgrade {
            self.transact(self.opts.pacman.sync(&explicit_targets, false, sysupgrade))?;
        }

        self.stamp(deps, explicit)
    }

    fn stamp(&self, deps: &[String], explicit: &[String]) -> Result<(), InstallError> {
        if !deps.is_empty() {
            self.transact(self.opts.pacman.mark(Mark::AsDeps, deps))?;
        }
        if !explicit.is_empty() {
            self.transact(self.opts.pacman.mark(Mark::AsExplicit, explicit))?;
        }
        Ok(())
    }

    fn install_built(
        &mut self,
        layer: &Layer,
        build_dirs: &BTreeMap<String, PathBuf>,
        deps: &BTreeSet<String>,
        explicit: &BTreeSet<String>,
        terminal: bool,
    ) -> Result<(), InstallError> {
        let all: BTreeSet<&String> = deps.union(explicit).collect();
        if all.is_empty() {
            return Ok(());
        }

        let mut built: BTreeMap<String, BTreeMap<String, PathBuf>> = BTreeMap::new();
        let mut failed_bases: BTreeMap<String, String> = BTreeMap::new();
        let mut archives = Vec::new();
        let mut stamp_deps = Vec::new();
        let mut stamp_exp = Vec::new();
        let mut installed: Vec<(String, PathBuf)> = Vec::new();

        for name in all {
            let pkg = &layer[name];
            let base = pkg.base().to_string();

            if let Some(reason) = failed_bases.get(&base) {
                self.failed_and_ignored.insert(name.clone(), reason);
                continue;
            }

            let Some(dir) = build_dirs.get(&base) else {
                let err = InstallError::MissingBuildDir { base };
                if !terminal {
                    return Err(err);
                }
                error!("{}", err);
                self.failed_and_ignored.insert(name.clone(), err);
                continue;
            };

            let pkgdests = match built.get(&base) {
                Some(pkgdests) => pkgdests.clone(),
                None => match self.build_base(&base, dir, layer) {
                    Ok(pkgdests) => {
                        built.insert(base.clone(), pkgdests.clone());
                        pkgdests
                    }
                    Err(e) => {
                        if !terminal {
                            return Err(e);
                        }
                        let reason = format!("{:#}", anyhow!(e));
                        error!("{}", reason);
                        failed_bases.insert(base.clone(), reason.clone());
                        self.failed_and_ignored.insert(name.clone(), reason);
                        continue;
                    }
                },
            };

            if pkgdests.is_empty() || self.opts.download_only {
                continue;
            }

            let artifacts = match artifacts_for(&pkgdests, name) {
                Ok(artifacts) => artifacts,
                Err(e) => {
                    if !terminal {
                        return Err(e);
                    }
                    error!("{}", e);
                    self.failed_and_ignored.insert(name.clone(), e);
                    continue;
                }
            };

            archives.extend(artifacts.archives);
            if self.is_dep(pkg) {
                stamp_deps.push(name.clone());
            } else {
                stamp_exp.push(name.clone());
            }
            if let Some(debug) = artifacts.debug {
                stamp_deps.push(debug);
            }
            installed.push((name.clone(), dir.clone()));
        }

        if archives.is_empty() {
            return Ok(());
        }

        self.transact(self.opts.pacman.upgrade(&archives))?;
        self.stamp(&stamp_deps, &stamp_exp)?;
        self.record_fingerprints(&installed);
        Ok(())
    }

    /// Prepare, inspect and build the base in `dir`. Returns package name ->
    /// archive, empty when the base is already installed.
    fn build_base(
        &self,
        base: &str,
        dir: &Path,
        layer: &Layer,
    ) -> Result<BTreeMap<String, PathBuf>, InstallError> {
        let makepkg = &self.opts.makepkg;
        let build_failed = |source: anyhow::Error| InstallError::BuildFailed {
            base: base.to_string(),
            source,
        };

        self.run(&makepkg.prepare(dir)).map_err(build_failed)?;

        let listed = self
            .runner
            .capture(&makepkg.package_list(dir))
            .map_err(build_failed)?;
        if !listed.success() {
            return Err(build_failed(anyhow!(
                "`makepkg --packagelist` failed: {}",
                listed.stderr.trim()
            )));
        }
        let (pkgdests, version) = parse_package_list(&listed.stdout)?;

        let is_target = layer
            .values()
            .any(|pkg| pkg.base() == base && !pkg.reason.is_dependency());
        let is_devel_upgrade = layer
            .values()
            .any(|pkg| pkg.base() == base && pkg.is_upgrade && pkg.is_development);
        let installed_at_version = !is_devel_upgrade
            && pkgdests
                .keys()
                .filter(|name| !name.ends_with("-debug"))
                .all(|name| self.db.is_correct_version_installed(name, &version));
        let inputs = BuildInputs {
            needed: self.opts.needed,
            rebuild: self.opts.rebuild,
            is_target,
            installed_at_version,
            artifacts_present: pkgdests.values().all(|path| path.exists()),
        };

        let decision = decide_build(inputs);
        match decision {
            BuildDecision::SkipInstalled => {
                warn!("{}-{} is up to date -- skipping", base, version);
                return Ok(BTreeMap::new());
            }
            BuildDecision::PackageOnly => info!("{}-{} already made -- skipping build", base, version),
            BuildDecision::FullBuild => info!("building {}-{}", base, version),
        }
        if let Some(cmd) = makepkg.for_decision(decision, dir) {
            self.run(&cmd).map_err(build_failed)?;
        }
        Ok(pkgdests)
    }

    fn run(&self, cmd: &ProcessBuilder) -> Result<()> {
        let output = self.runner.show(cmd)?;
        if !output.success() {
            anyhow::bail!(
                "`{}` exited with status {}",
                cmd.display_command(),
                output.code.map_or_else(|| "signal".to_string(), |c| c.to_string())
            );
        }
        Ok(())
    }

    fn transact(&self, cmd: ProcessBuilder) -> Result<(), InstallError> {
        let output = self.runner.show(&cmd).map_err(|source| InstallError::Command {
            command: cmd.display_command(),
            source,
        })?;
        if !output.success() {
            return Err(InstallError::Transaction {
                exit_code: output.code.unwrap_or(1),
            });
        }
        Ok(())
    }

    /// Update fingerprints of installed packages with VCS sources.
    /// Failures are logged; the packages are installed either way.
    fn record_fingerprints(&self, installed: &[(String, PathBuf)]) {
        let Some(store) = self.store else {
            return;
        };
        let archs = self.db.architectures();

        let mut sources: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (name, dir) in installed {
            match Srcinfo::from_dir(dir, &archs) {
                Ok(info) => {
                    if info.sources.iter().any(|s| parse_source(s).is_some()) {
                        sources.insert(name.clone(), info.sources);
                    }
                }
                Err(e) => debug!("no .SRCINFO for {}: {}", name, e),
            }
        }
        if sources.is_empty() {
            return;
        }

        let outcome = fan_out(sources.keys().cloned(), sources.len(), |name| {
            let srcs = sources.get(name).map(Vec::as_slice).unwrap_or_default();
            store.update(name, srcs)
        });
        if let Err(e) = outcome.into_result() {
            warn!("failed to record VCS fingerprints: {:#}", e);
        }
    }

    /// Remove packages that were only installed to build others. Packages
    /// that failed in this run were never installed and are left out.
    pub fn remove_make_deps(&self, names: &[String]) -> Result<(), InstallError> {
        let installed: Vec<&String> = names
            .iter()
            .filter(|name| !self.failed_and_ignored.contains(name))
            .collect();
        if installed.is_empty() {
            return Ok(());
        }
        info!("removing make dependencies");
        self.transact(self.opts.pacman.remove(&installed))
    }
}

fn artifacts_for(pkgdests: &BTreeMap<String, PathBuf>, name: &str) -> Result<Artifacts, InstallError> {
    let path = pkgdests
        .get(name)
        .ok_or_else(|| InstallError::PkgDestNotInList {
            name: name.to_string(),
        })?;
    if !path.exists() {
        return Err(InstallError::MissingArtifact { path: path.clone() });
    }

    let mut archives = vec![path.clone()];
    let debug_name = format!("{}-debug", name);
    let debug = match pkgdests.get(&debug_name) {
        Some(debug_path) if debug_path.exists() => {
            archives.push(debug_path.clone());
            Some(debug_name)
        }
        _ => None,
    };
    Ok(Artifacts { archives, debug })
}
