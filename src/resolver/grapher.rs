//! Building the dependency graph from targets.
//!
//! Source packages are expanded breadth-first. Each round classifies every
//! dependency of the current frontier against the installed packages, the
//! graph and the sync repositories; whatever is left is looked up in the AUR
//! with a single batched name query, and names still unknown after that go
//! through a bounded provider search.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use tracing::{debug, warn};

use super::errors::ResolveError;
use super::providers::ProviderSelector;
use super::srcinfo::Srcinfo;
use crate::aur::{AurError, AurQuery, RemoteQuery};
use crate::core::depend::{Depend, Target};
use crate::core::package::{InstallReason, PackageRef};
use crate::core::record::{Origin, PackageRecord};
use crate::db::Executor;
use crate::graph::{DependencyGraph, GraphError};
use crate::util::config::{Config, TargetMode};
use crate::util::pool::fan_out;

/// Package name suffixes of VCS packages.
const VCS_SUFFIXES: &[&str] = &["-git", "-svn", "-hg", "-bzr", "-darcs", "-cvs", "-fossil"];

/// Whether `name` follows the naming convention of VCS packages.
pub fn is_vcs_name(name: &str) -> bool {
    VCS_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
}

/// Knobs for a resolution run.
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    pub mode: TargetMode,
    /// Skip runtime and check dependencies.
    pub no_deps: bool,
    pub no_check_deps: bool,
    /// Look for upstream changes of development packages when upgrading.
    pub devel: bool,
    /// Offer AUR versions older than the installed one as upgrades.
    pub downgrade: bool,
    /// Packages never upgraded.
    pub ignore: BTreeSet<String>,
    /// Concurrent AUR provider searches.
    pub provider_workers: usize,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        ResolveOptions {
            mode: TargetMode::Any,
            no_deps: false,
            no_check_deps: false,
            devel: false,
            downgrade: false,
            ignore: BTreeSet::new(),
            provider_workers: 4,
        }
    }
}

impl ResolveOptions {
    pub fn from_config(config: &Config) -> Self {
        ResolveOptions {
            mode: config.mode(),
            no_deps: false,
            no_check_deps: config.build.no_check,
            devel: config.install.devel,
            downgrade: config.install.downgrade,
            ignore: config.install.ignore.iter().cloned().collect(),
            provider_workers: config.provider_workers(),
        }
    }
}

/// The outcome of a successful resolution.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub graph: DependencyGraph<PackageRef>,
    /// Metadata of every package that was added to the graph.
    pub records: BTreeMap<String, PackageRecord>,
}

impl Resolution {
    /// Records of the packages still in the graph, excluding groups.
    pub fn candidates(&self) -> Vec<&PackageRecord> {
        self.records
            .iter()
            .filter(|(name, _)| {
                self.graph
                    .node_info(name)
                    .is_some_and(|pkg| !pkg.is_group && pkg.name == **name)
            })
            .map(|(_, record)| record)
            .collect()
    }
}

#[derive(Debug, Clone)]
struct PendingDep {
    requester: String,
    dep: String,
    reason: InstallReason,
}

#[derive(Debug, Default)]
struct AurLookup {
    /// Candidates keyed by the dependency name they answer.
    found: BTreeMap<String, Vec<PackageRecord>>,
    failed: BTreeMap<String, AurError>,
}

/// Resolves targets into a [`DependencyGraph`].
pub struct Grapher<'a> {
    pub(super) db: &'a dyn Executor,
    pub(super) remote: &'a dyn RemoteQuery,
    selector: &'a dyn ProviderSelector,
    pub(super) opts: ResolveOptions,
    pub(super) graph: DependencyGraph<PackageRef>,
    records: BTreeMap<String, PackageRecord>,
    /// First package that pulled each node in.
    requested_by: BTreeMap<String, String>,
    missing: BTreeMap<String, Vec<Vec<String>>>,
    /// Provider picked for each ambiguous dependency name.
    chosen_providers: BTreeMap<String, String>,
}

impl<'a> Grapher<'a> {
    pub fn new(
        db: &'a dyn Executor,
        remote: &'a dyn RemoteQuery,
        selector: &'a dyn ProviderSelector,
        opts: ResolveOptions,
    ) -> Self {
        Grapher {
            db,
            remote,
            selector,
            opts,
            graph: DependencyGraph::new(),
            records: BTreeMap::new(),
            requested_by: BTreeMap::new(),
            missing: BTreeMap::new(),
            chosen_providers: BTreeMap::new(),
        }
    }

    pub fn graph(&self) -> &DependencyGraph<PackageRef> {
        &self.graph
    }

    /// The graph and metadata, or every package that could not be found.
    pub fn finish(self) -> Result<Resolution, ResolveError> {
        if !self.missing.is_empty() {
            return Err(ResolveError::PackagesNotFound {
                missing: self.missing,
            });
        }
        Ok(Resolution {
            graph: self.graph,
            records: self.records,
        })
    }

    /// Add explicit targets of the form `[repo/]name[op version]`.
    ///
    /// Bare names are looked up in the sync repositories, then as groups,
    /// then in the AUR, as far as the target mode allows.
    pub fn graph_from_targets<S: AsRef<str>>(&mut self, targets: &[S]) -> Result<(), ResolveError> {
        let mut aur_targets = Vec::new();

        for raw in targets {
            let target = Target::parse(raw.as_ref());
            let name = target.name().to_string();

            match target.db.as_deref() {
                Some("aur") => {
                    if self.opts.mode.allows_aur() {
                        aur_targets.push(target);
                    } else {
                        self.record_missing(&target.to_string(), None);
                    }
                }
                Some(db) => match self.db.sync_package_from_db(db, &name) {
                    Some(pkg) if target.depend.version_matches(&pkg.version) => {
                        self.add_binary_target(pkg)?
                    }
                    _ => self.record_missing(&target.to_string(), None),
                },
                None => {
                    if self.opts.mode.allows_repo() {
                        if let Some(pkg) = self
                            .db
                            .sync_package(&name)
                            .filter(|pkg| target.depend.version_matches(&pkg.version))
                        {
                            self.add_binary_target(pkg)?;
                            continue;
                        }
                        let members = self.db.packages_from_group(&name);
                        if let Some(first) = members.first() {
                            let repo = first.repository().unwrap_or_default().to_string();
                            self.graph.add_node(&name);
                            self.set_info(&name, PackageRef::group(&name, repo))?;
                            continue;
                        }
                    }
                    if self.opts.mode.allows_aur() {
                        aur_targets.push(target);
                    } else {
                        self.record_missing(&name, None);
                    }
                }
            }
        }

        if aur_targets.is_empty() {
            return Ok(());
        }

        let names: Vec<String> = aur_targets.iter().map(|t| t.name().to_string()).collect();
        let found: BTreeMap<String, PackageRecord> = self
            .remote
            .query(&AurQuery::names(names))?
            .into_iter()
            .map(|r| (r.name.clone(), r))
            .collect();

        let mut frontier = Vec::new();
        for target in &aur_targets {
            match found
                .get(target.name())
                .filter(|r| target.depend.version_matches(&r.version))
            {
                Some(record) => {
                    if self.add_source_node(record.clone(), InstallReason::Explicit)? {
                        frontier.push(record.name.clone());
                    }
                }
                None => self.record_missing(target.name(), None),
            }
        }
        self.expand(frontier)
    }

    /// Add every package of the PKGBUILD in `dir` as an explicit target.
    pub fn graph_from_srcinfo(&mut self, dir: &Path) -> Result<(), ResolveError> {
        let info = Srcinfo::from_dir(dir, &self.db.architectures())?;
        let mut frontier = Vec::new();
        for record in info.packages {
            let name = record.name.clone();
            if self.add_source_node(record, InstallReason::Explicit)? {
                frontier.push(name);
            }
        }
        self.expand(frontier)
    }

    fn add_binary_target(&mut self, pkg: PackageRecord) -> Result<(), ResolveError> {
        let name = pkg.name.clone();
        let repo = pkg.repository().unwrap_or_default().to_string();
        self.graph.add_node(&name);
        self.set_info(
            &name,
            PackageRef::binary(&name, &pkg.version, repo, InstallReason::Explicit),
        )?;
        self.records.insert(name, pkg);
        Ok(())
    }

    /// Add a source-built package. Returns whether the node is new.
    pub(super) fn add_source_node(
        &mut self,
        record: PackageRecord,
        reason: InstallReason,
    ) -> Result<bool, ResolveError> {
        let pkg = match &record.origin {
            Origin::SrcInfo { dir } => {
                PackageRef::local_source(&record.name, &record.version, &record.base, dir)
            }
            _ => PackageRef::source_build(&record.name, &record.version, &record.base, reason),
        }
        .with_development(is_vcs_name(&record.name));
        self.insert_source(record, pkg)
    }

    /// Add `record` under the plan entry `pkg`, registering its provides.
    pub(super) fn insert_source(
        &mut self,
        record: PackageRecord,
        pkg: PackageRef,
    ) -> Result<bool, ResolveError> {
        let name = record.name.clone();
        let is_new = !self.graph.exists(&name);
        self.graph.add_node(&name);
        self.set_info(&name, pkg)?;
        for provided in record.provided_names() {
            if provided == name {
                continue;
            }
            match self.graph.alias(&name, provided) {
                Ok(()) => {}
                Err(GraphError::ConflictingAlias { existing: owner, .. })
                | Err(GraphError::AliasShadowsNode { alias: owner, .. }) => {
                    debug!("{} provides {}, already planned as {}", name, provided, owner);
                }
                Err(e) => return Err(e.into()),
            }
        }
        self.records.insert(name, record);
        Ok(is_new)
    }

    /// Attach `pkg` to its node unless an existing entry takes precedence.
    ///
    /// Upgrade entries are never replaced; otherwise `Explicit` replaces a
    /// dependency reason and the first dependency reason sticks.
    pub(super) fn set_info(&mut self, name: &str, pkg: PackageRef) -> Result<(), ResolveError> {
        if let Some(existing) = self.graph.node_info(name) {
            if existing.is_upgrade || !existing.reason.yields_to(pkg.reason) {
                return self.note_reason(name, pkg.reason);
            }
        }
        self.graph.set_node_info(name, pkg)?;
        Ok(())
    }

    /// Record that a planned node was asked for again with `reason`.
    fn note_reason(&mut self, name: &str, reason: InstallReason) -> Result<(), ResolveError> {
        if reason != InstallReason::RuntimeDep {
            return Ok(());
        }
        let Some(existing) = self.graph.node_info(name) else {
            return Ok(());
        };
        if existing.reason == InstallReason::RuntimeDep || existing.runtime_needed {
            return Ok(());
        }
        let mut pkg = existing.clone();
        pkg.runtime_needed = true;
        self.graph.set_node_info(name, pkg)?;
        Ok(())
    }

    fn edge(&mut self, child: &str, parent: &str) -> Result<(), ResolveError> {
        match self.graph.depend_on(child, parent) {
            Ok(()) => Ok(()),
            Err(GraphError::SelfReferential(name)) => {
                debug!("{} depends on itself, skipping", name);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn record_missing(&mut self, name: &str, requester: Option<&str>) {
        let chain = requester.map(|r| self.chain_to(r)).unwrap_or_default();
        let chains = self.missing.entry(name.to_string()).or_default();
        if !chains.contains(&chain) {
            chains.push(chain);
        }
    }

    /// Requesting packages from a target down to `name`.
    fn chain_to(&self, name: &str) -> Vec<String> {
        let mut chain = vec![name.to_string()];
        let mut current = name;
        while let Some(parent) = self.requested_by.get(current) {
            if chain.contains(parent) {
                break;
            }
            chain.push(parent.clone());
            current = parent;
        }
        chain.reverse();
        chain
    }

    fn dep_lists(&self, record: &PackageRecord) -> Vec<(Vec<String>, InstallReason)> {
        let mut lists = vec![(record.make_depends.clone(), InstallReason::BuildDep)];
        if !self.opts.no_deps {
            lists.push((record.depends.clone(), InstallReason::RuntimeDep));
            if !self.opts.no_check_deps {
                lists.push((record.check_depends.clone(), InstallReason::CheckDep));
            }
        }
        lists
    }

    /// Resolve the dependencies of the source packages in `frontier`,
    /// recursing into every source package that gets added.
    pub(super) fn expand(&mut self, mut frontier: Vec<String>) -> Result<(), ResolveError> {
        while !frontier.is_empty() {
            let mut pending = Vec::new();
            for name in std::mem::take(&mut frontier) {
                let Some(record) = self.records.get(&name).cloned() else {
                    continue;
                };
                for (deps, reason) in self.dep_lists(&record) {
                    for dep in deps {
                        if !self.resolve_known(&name, &dep, reason)? {
                            pending.push(PendingDep {
                                requester: name.clone(),
                                dep,
                                reason,
                            });
                        }
                    }
                }
            }
            if pending.is_empty() {
                break;
            }

            let AurLookup {
                found: candidates,
                failed: mut search_errors,
            } = self.lookup_aur(&pending)?;
            for p in pending {
                let depend = Depend::parse(&p.dep);
                if self.graph.exists(&depend.name) {
                    self.note_reason(&depend.name, p.reason)?;
                    self.edge(&p.requester, &depend.name)?;
                    continue;
                }

                let matching: Vec<PackageRecord> = candidates
                    .get(&depend.name)
                    .map(|found| {
                        found
                            .iter()
                            .filter(|r| depend.satisfied_by(r))
                            .cloned()
                            .collect()
                    })
                    .unwrap_or_default();

                match self.pick_provider(&depend, matching)? {
                    Some(record) => {
                        let name = record.name.clone();
                        self.requested_by
                            .entry(name.clone())
                            .or_insert_with(|| p.requester.clone());
                        if self.add_source_node(record, p.reason)? {
                            frontier.push(name.clone());
                        }
                        self.edge(&p.requester, &name)?;
                    }
                    None => {
                        if let Some(err) = search_errors.remove(&depend.name) {
                            return Err(ResolveError::Remote(err));
                        }
                        self.record_missing(&depend.name, Some(&p.requester));
                    }
                }
            }
        }
        Ok(())
    }

    /// Handle `dep` without asking the AUR. Returns `false` if it is still open.
    fn resolve_known(
        &mut self,
        requester: &str,
        dep: &str,
        reason: InstallReason,
    ) -> Result<bool, ResolveError> {
        if self.db.local_satisfier_exists(dep) {
            return Ok(true);
        }

        let depend = Depend::parse(dep);
        if self.graph.exists(&depend.name) {
            self.note_reason(&depend.name, reason)?;
            self.edge(requester, &depend.name)?;
            return Ok(true);
        }

        if let Some(pkg) = self.db.sync_satisfier(dep) {
            let name = pkg.name.clone();
            let repo = pkg.repository().unwrap_or_default().to_string();
            self.graph.add_node(&name);
            self.set_info(&name, PackageRef::binary(&name, &pkg.version, repo, reason))?;
            self.requested_by
                .entry(name.clone())
                .or_insert_with(|| requester.to_string());
            self.records.entry(name.clone()).or_insert(pkg);
            self.edge(requester, &name)?;
            return Ok(true);
        }

        Ok(false)
    }

    /// Batched AUR lookup for the open dependencies, keyed by dependency name.
    ///
    /// Failed provider searches are returned separately so a dependency that
    /// stays unresolved can report why.
    fn lookup_aur(&self, pending: &[PendingDep]) -> Result<AurLookup, ResolveError> {
        let names: BTreeSet<String> = pending
            .iter()
            .map(|p| Depend::parse(&p.dep).name)
            .filter(|name| !self.graph.exists(name))
            .collect();
        let mut lookup = AurLookup::default();
        if names.is_empty() {
            return Ok(lookup);
        }

        for record in self.remote.query(&AurQuery::names(names.iter().cloned()))? {
            lookup.found.entry(record.name.clone()).or_default().push(record);
        }

        let unresolved: Vec<String> = names
            .into_iter()
            .filter(|name| !lookup.found.contains_key(name))
            .collect();
        if unresolved.is_empty() {
            return Ok(lookup);
        }

        debug!("searching providers for {}", unresolved.join(", "));
        let remote = self.remote;
        let outcome = fan_out(unresolved, self.opts.provider_workers, |name| {
            Ok((name.to_string(), remote.query(&AurQuery::provides(name))))
        });
        for (name, result) in outcome.completed {
            match result {
                Ok(providers) if providers.is_empty() => {}
                Ok(providers) => {
                    lookup.found.insert(name, providers);
                }
                Err(e) => {
                    warn!("provider search for {} failed: {}", name, e);
                    lookup.failed.insert(name, e);
                }
            }
        }
        Ok(lookup)
    }

    fn pick_provider(
        &mut self,
        depend: &Depend,
        candidates: Vec<PackageRecord>,
    ) -> Result<Option<PackageRecord>, ResolveError> {
        if candidates.len() <= 1 {
            return Ok(candidates.into_iter().next());
        }

        if let Some(chosen) = self.chosen_providers.get(&depend.name) {
            if let Some(record) = candidates.iter().find(|c| &c.name == chosen) {
                return Ok(Some(record.clone()));
            }
        }

        let graph = &self.graph;
        let choice = self
            .selector
            .select(&depend.name, &candidates, &|name| graph.exists(name));
        match choice.and_then(|idx| candidates.get(idx)) {
            Some(record) => {
                debug!("using {} to provide {}", record.name, depend.name);
                self.chosen_providers
                    .insert(depend.name.clone(), record.name.clone());
                Ok(Some(record.clone()))
            }
            None => Err(ResolveError::ProviderUnresolved {
                dependency: depend.to_string(),
                candidates: candidates.iter().map(|c| c.name.clone()).collect(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::package::PackageSource;
    use crate::resolver::check_conflicts;
    use crate::resolver::providers::AutoSelector;
    use crate::test_support::{aur_pkg, local_pkg, repo_pkg, MockDb, MockRemote};
    use tempfile::TempDir;

    fn resolve(db: &MockDb, remote: &MockRemote, targets: &[&str]) -> Result<Resolution, ResolveError> {
        let mut grapher = Grapher::new(db, remote, &AutoSelector, ResolveOptions::default());
        grapher.graph_from_targets(targets)?;
        grapher.finish()
    }

    fn layers(res: &Resolution) -> Vec<Vec<String>> {
        res.graph.topo_sorted_layers()
    }

    #[test]
    fn test_installed_dependency_is_not_a_node() {
        let db = MockDb::new()
            .with_local(local_pkg("q", "1-1"))
            .with_sync("extra", repo_pkg("q", "1-1"));
        let remote = MockRemote::new()
            .with(aur_pkg("p", "1-1").with_depends(["q", "r"]))
            .with(aur_pkg("r", "2-1"));

        let res = resolve(&db, &remote, &["p"]).unwrap();
        assert!(!res.graph.exists("q"));
        assert_eq!(layers(&res), vec![vec!["r".to_string()], vec!["p".to_string()]]);

        let p = res.graph.node_info("p").unwrap();
        assert_eq!(p.source, PackageSource::SourceBuild);
        assert_eq!(p.reason, InstallReason::Explicit);
        assert_eq!(res.graph.node_info("r").unwrap().reason, InstallReason::RuntimeDep);
    }

    #[test]
    fn test_repo_dependency_becomes_binary_node() {
        let db = MockDb::new().with_sync("extra", repo_pkg("cmake", "3.29-1"));
        let remote = MockRemote::new().with(aur_pkg("p", "1-1").with_make_depends(["cmake>=3"]));

        let res = resolve(&db, &remote, &["p"]).unwrap();
        let cmake = res.graph.node_info("cmake").unwrap();
        assert_eq!(cmake.source, PackageSource::RemoteBinary);
        assert_eq!(cmake.reason, InstallReason::BuildDep);
        assert_eq!(cmake.repository.as_deref(), Some("extra"));
        assert_eq!(res.graph.immediate_dependencies("p"), BTreeSet::from(["cmake".to_string()]));
    }

    #[test]
    fn test_repo_target_and_group() {
        let db = MockDb::new()
            .with_sync("core", repo_pkg("gcc", "14-1").with_groups(["base-devel"]))
            .with_sync("extra", repo_pkg("vim", "9-1"));
        let remote = MockRemote::new();

        let res = resolve(&db, &remote, &["extra/vim", "base-devel"]).unwrap();
        let vim = res.graph.node_info("vim").unwrap();
        assert_eq!(vim.sync_target(), "extra/vim");
        let group = res.graph.node_info("base-devel").unwrap();
        assert!(group.is_group);
        assert_eq!(group.repository.as_deref(), Some("core"));
    }

    #[test]
    fn test_aur_pinned_target_skips_repos() {
        let db = MockDb::new().with_sync("extra", repo_pkg("yay", "1-1"));
        let remote = MockRemote::new().with(aur_pkg("yay", "12-1"));

        let res = resolve(&db, &remote, &["aur/yay"]).unwrap();
        assert_eq!(res.graph.node_info("yay").unwrap().source, PackageSource::SourceBuild);
    }

    #[test]
    fn test_missing_reports_chain() {
        let db = MockDb::new();
        let remote = MockRemote::new()
            .with(aur_pkg("app", "1-1").with_depends(["libbar"]))
            .with(aur_pkg("libbar", "1-1").with_depends(["libfoo"]));

        let err = resolve(&db, &remote, &["app", "typo"]).unwrap_err();
        match err {
            ResolveError::PackagesNotFound { missing } => {
                assert_eq!(missing["libfoo"], vec![vec!["app".to_string(), "libbar".to_string()]]);
                assert_eq!(missing["typo"], vec![Vec::<String>::new()]);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_mode_repo_excludes_aur() {
        let db = MockDb::new();
        let remote = MockRemote::new().with(aur_pkg("yay", "12-1"));
        let mut grapher = Grapher::new(
            &db,
            &remote,
            &AutoSelector,
            ResolveOptions {
                mode: TargetMode::Repo,
                ..ResolveOptions::default()
            },
        );
        grapher.graph_from_targets(&["yay"]).unwrap();
        assert!(matches!(grapher.finish(), Err(ResolveError::PackagesNotFound { .. })));
    }

    #[test]
    fn test_provider_search_and_alias() {
        let db = MockDb::new();
        let remote = MockRemote::new()
            .with(aur_pkg("app", "1-1").with_depends(["java-runtime", "java-environment"]))
            .with(aur_pkg("jdk-bin", "21-1").with_provides(["java-runtime", "java-environment"]))
            .with(aur_pkg("openjdk-git", "22-1").with_provides(["java-runtime"]));

        let res = resolve(&db, &remote, &["app"]).unwrap();
        // Either candidate satisfies java-runtime; the one already chosen for
        // java-environment or the first one is used, never both.
        let providers: Vec<&str> = ["jdk-bin", "openjdk-git"]
            .into_iter()
            .filter(|n| res.graph.exists(n))
            .collect();
        assert_eq!(providers, vec!["jdk-bin"]);
        assert!(res.graph.dependents("java-environment").contains("app"));
        assert!(remote.provider_searches() >= 1);
    }

    #[test]
    fn test_provided_name_already_planned_is_a_conflict() {
        let db = MockDb::new().with_sync("extra", repo_pkg("mesa", "24.1-1"));
        let remote = MockRemote::new()
            .with(aur_pkg("app", "1-1").with_depends(["mesa", "libx-git"]))
            .with(
                aur_pkg("libx-git", "r12.f00-1")
                    .with_provides(["mesa"])
                    .with_conflicts(["mesa"]),
            );

        let res = resolve(&db, &remote, &["app"]).unwrap();
        assert!(res.graph.exists("libx-git"));
        assert_eq!(res.graph.resolve("mesa"), "mesa");
        assert!(res.graph.aliases_of("libx-git").is_empty());

        let report = check_conflicts(&res.candidates(), &db);
        assert_eq!(
            report.conflicts["libx-git"],
            BTreeSet::from(["mesa".to_string()])
        );
    }

    #[test]
    fn test_shared_provided_name_keeps_first_owner() {
        let db = MockDb::new();
        let remote = MockRemote::new()
            .with(aur_pkg("a", "1-1").with_depends(["jdk-bin", "openjdk-git"]))
            .with(aur_pkg("jdk-bin", "21-1").with_provides(["java-runtime"]))
            .with(aur_pkg("openjdk-git", "22-1").with_provides(["java-runtime"]));

        let res = resolve(&db, &remote, &["a"]).unwrap();
        assert!(res.graph.exists("openjdk-git"));
        assert_eq!(res.graph.resolve("java-runtime"), "jdk-bin");
    }

    #[test]
    fn test_failed_provider_search_is_reported() {
        let db = MockDb::new();
        let remote = MockRemote::new()
            .with(aur_pkg("app", "1-1").with_depends(["java-runtime", "libfoo"]))
            .with(aur_pkg("libfoo", "1-1"))
            .with_failing_search("java-runtime");

        let err = resolve(&db, &remote, &["app"]).unwrap_err();
        assert!(matches!(err, ResolveError::Remote(AurError::Rpc(_))));
    }

    #[test]
    fn test_failed_search_for_found_name_is_ignored() {
        let db = MockDb::new();
        let remote = MockRemote::new()
            .with(aur_pkg("app", "1-1").with_depends(["libfoo"]))
            .with(aur_pkg("libfoo", "1-1"))
            .with_failing_search("libfoo");

        let res = resolve(&db, &remote, &["app"]).unwrap();
        assert!(res.graph.exists("libfoo"));
        assert_eq!(remote.provider_searches(), 0);
    }

    #[test]
    fn test_reason_precedence() {
        let db = MockDb::new();
        let remote = MockRemote::new()
            .with(aur_pkg("a", "1-1").with_make_depends(["lib"]).with_depends(["lib2"]))
            .with(aur_pkg("b", "1-1").with_depends(["lib"]))
            .with(aur_pkg("lib", "1-1"))
            .with(aur_pkg("lib2", "1-1"));

        // lib is pulled in as a make dependency first and keeps that reason.
        let res = resolve(&db, &remote, &["a", "b"]).unwrap();
        assert_eq!(res.graph.node_info("lib").unwrap().reason, InstallReason::BuildDep);

        // b still needs it at runtime.
        assert!(res.graph.node_info("lib").unwrap().runtime_needed);

        // Naming lib2 explicitly outranks its dependency reason.
        let res = resolve(&db, &remote, &["a", "lib2"]).unwrap();
        assert_eq!(res.graph.node_info("lib2").unwrap().reason, InstallReason::Explicit);
    }

    #[test]
    fn test_make_dep_later_wanted_at_runtime() {
        let db = MockDb::new().with_sync("extra", repo_pkg("cmake", "3.29-1"));
        let remote = MockRemote::new()
            .with(aur_pkg("a", "1-1").with_make_depends(["cmake", "lib"]))
            .with(aur_pkg("b", "1-1").with_depends(["cmake", "lib"]))
            .with(aur_pkg("lib", "1-1"));

        let res = resolve(&db, &remote, &["a", "b"]).unwrap();
        for name in ["cmake", "lib"] {
            let pkg = res.graph.node_info(name).unwrap();
            assert_eq!(pkg.reason, InstallReason::BuildDep);
            assert!(pkg.runtime_needed, "{} is needed by b at runtime", name);
        }
    }

    #[test]
    fn test_no_deps_keeps_make_deps() {
        let db = MockDb::new();
        let remote = MockRemote::new()
            .with(aur_pkg("a", "1-1").with_make_depends(["m"]).with_depends(["d"]).with_check_depends(["c"]))
            .with(aur_pkg("m", "1-1"));
        let mut grapher = Grapher::new(
            &db,
            &remote,
            &AutoSelector,
            ResolveOptions {
                no_deps: true,
                ..ResolveOptions::default()
            },
        );
        grapher.graph_from_targets(&["a"]).unwrap();
        let res = grapher.finish().unwrap();
        assert!(res.graph.exists("m"));
        assert!(!res.graph.exists("d"));
        assert!(!res.graph.exists("c"));
    }

    #[test]
    fn test_cycle_aborts() {
        let db = MockDb::new();
        let remote = MockRemote::new()
            .with(aur_pkg("a", "1-1").with_depends(["b"]))
            .with(aur_pkg("b", "1-1").with_depends(["a"]));
        let err = resolve(&db, &remote, &["a"]).unwrap_err();
        assert!(matches!(err, ResolveError::Graph(GraphError::Circular { .. })));
    }

    #[test]
    fn test_self_dependency_is_skipped() {
        let db = MockDb::new();
        let remote = MockRemote::new().with(aur_pkg("a", "1-1").with_provides(["liba"]).with_depends(["liba"]));
        let res = resolve(&db, &remote, &["a"]).unwrap();
        assert_eq!(res.graph.len(), 1);
        assert_eq!(res.graph.edge_count(), 0);
    }

    #[test]
    fn test_graph_from_srcinfo_split_package() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join(".SRCINFO"),
            "pkgbase = ab\n\tpkgver = 1\n\tpkgrel = 1\n\tdepends = zlib\n\n\
             pkgname = a\n\npkgname = b\n\tdepends = a=1-1\n",
        )
        .unwrap();

        let db = MockDb::new().with_local(local_pkg("zlib", "1.3-1"));
        let remote = MockRemote::new();
        let mut grapher = Grapher::new(&db, &remote, &AutoSelector, ResolveOptions::default());
        grapher.graph_from_srcinfo(tmp.path()).unwrap();
        let res = grapher.finish().unwrap();

        assert_eq!(layers(&res), vec![vec!["a".to_string()], vec!["b".to_string()]]);
        let b = res.graph.node_info("b").unwrap();
        assert_eq!(b.source, PackageSource::LocalSourceFile);
        assert_eq!(b.base(), "ab");
        assert_eq!(b.srcinfo_dir.as_deref(), Some(tmp.path()));
        assert_eq!(res.candidates().len(), 2);
    }

    #[test]
    fn test_aur_lookups_are_batched() {
        let db = MockDb::new();
        let remote = MockRemote::new()
            .with(aur_pkg("top", "1-1").with_depends(["d1", "d2", "d3"]))
            .with(aur_pkg("d1", "1-1"))
            .with(aur_pkg("d2", "1-1"))
            .with(aur_pkg("d3", "1-1"));
        resolve(&db, &remote, &["top"]).unwrap();
        // One query for the target, one for its whole dependency frontier.
        assert_eq!(remote.name_queries(), 2);
    }

    #[test]
    fn test_vcs_name() {
        assert!(is_vcs_name("yay-git"));
        assert!(!is_vcs_name("yay-bin"));
    }
}
