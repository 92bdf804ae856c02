//! System upgrade resolution.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use super::errors::ResolveError;
use super::grapher::{is_vcs_name, Grapher};
use crate::aur::AurQuery;
use crate::core::package::{InstallReason, PackageRef};
use crate::core::record::PackageRecord;
use crate::core::version::vercmp;
use crate::util::pool::fan_out;
use crate::vcs::FingerprintStore;

/// What an upgrade run found, before dependency expansion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpgradeSummary {
    pub repo: Vec<String>,
    pub aur: Vec<String>,
    /// Development packages with new upstream commits.
    pub devel: Vec<String>,
    pub ignored: Vec<String>,
}

impl UpgradeSummary {
    pub fn is_empty(&self) -> bool {
        self.repo.is_empty() && self.aur.is_empty() && self.devel.is_empty()
    }
}

fn reason_of(local: &PackageRecord) -> InstallReason {
    if local.is_explicit() {
        InstallReason::Explicit
    } else {
        InstallReason::RuntimeDep
    }
}

impl Grapher<'_> {
    /// Add every available upgrade of an installed package to the graph.
    ///
    /// Repository upgrades become binary nodes. Foreign packages are compared
    /// against the AUR, and with `devel` enabled, tracked development
    /// packages are checked for new upstream commits through `store`.
    pub fn graph_upgrades(
        &mut self,
        store: Option<&FingerprintStore>,
    ) -> Result<UpgradeSummary, ResolveError> {
        let mut summary = UpgradeSummary::default();

        if self.opts.mode.allows_repo() {
            for upgrade in self.db.repo_upgrades() {
                if self.opts.ignore.contains(&upgrade.name) {
                    warn!(
                        "ignoring package upgrade {} ({} => {})",
                        upgrade.name, upgrade.local_version, upgrade.remote_version
                    );
                    summary.ignored.push(upgrade.name);
                    continue;
                }
                let reason = self
                    .db
                    .local_package(&upgrade.name)
                    .map_or(InstallReason::RuntimeDep, |local| reason_of(&local));
                let pkg = PackageRef::binary(
                    &upgrade.name,
                    &upgrade.remote_version,
                    &upgrade.repository,
                    reason,
                )
                .with_upgrade(&upgrade.local_version);
                self.graph.add_node(&upgrade.name);
                self.set_info(&upgrade.name, pkg)?;
                summary.repo.push(upgrade.name);
            }
        }

        if !self.opts.mode.allows_aur() {
            return Ok(summary);
        }

        let foreign: BTreeMap<String, PackageRecord> = self
            .db
            .installed_foreign_packages()
            .into_iter()
            .map(|p| (p.name.clone(), p))
            .collect();
        if foreign.is_empty() {
            return Ok(summary);
        }

        let remote: BTreeMap<String, PackageRecord> = self
            .remote
            .query(&AurQuery::names(foreign.keys().cloned()))?
            .into_iter()
            .map(|r| (r.name.clone(), r))
            .collect();

        let mut upgrades: Vec<(PackageRecord, &PackageRecord, bool)> = Vec::new();
        let mut unchanged = Vec::new();
        for (name, local) in &foreign {
            let Some(record) = remote.get(name) else {
                debug!("{} is not in the AUR", name);
                continue;
            };
            match vercmp(&record.version, &local.version) {
                Ordering::Greater => upgrades.push((record.clone(), local, false)),
                Ordering::Less if self.opts.downgrade => upgrades.push((record.clone(), local, false)),
                Ordering::Less => {
                    debug!("{}: local ({}) is newer than AUR ({})", name, local.version, record.version)
                }
                Ordering::Equal => unchanged.push(name.clone()),
            }
        }

        if self.opts.devel {
            if let Some(store) = store {
                let tracked: Vec<String> = unchanged
                    .into_iter()
                    .filter(|name| store.get(name).is_some())
                    .collect();
                let outcome = fan_out(tracked, self.opts.provider_workers, |name| {
                    Ok((name.to_string(), store.to_upgrade(name)))
                });
                let mut devel: Vec<String> = outcome
                    .completed
                    .into_iter()
                    .filter(|(_, moved)| *moved)
                    .map(|(name, _)| name)
                    .collect();
                devel.sort();
                for name in devel {
                    if let (Some(record), Some(local)) = (remote.get(&name), foreign.get(&name)) {
                        upgrades.push((record.clone(), local, true));
                    }
                }
            }
        }

        let mut frontier = Vec::new();
        for (record, local, devel) in upgrades {
            let name = record.name.clone();
            if self.opts.ignore.contains(&name) {
                warn!(
                    "ignoring package upgrade {} ({} => {})",
                    name, local.version, record.version
                );
                summary.ignored.push(name);
                continue;
            }

            let pkg = PackageRef::source_build(&name, &record.version, &record.base, reason_of(local))
                .with_upgrade(&local.version)
                .with_development(devel || is_vcs_name(&name));
            if self.insert_source(record, pkg)? {
                frontier.push(name.clone());
            }
            if devel {
                summary.devel.push(name);
            } else {
                summary.aur.push(name);
            }
        }

        info!(
            "{} repository, {} AUR and {} development upgrades",
            summary.repo.len(),
            summary.aur.len(),
            summary.devel.len()
        );
        self.expand(frontier)?;
        Ok(summary)
    }

    /// Drop an upgrade the user declined, together with the dependencies
    /// only it needed. Explicit and upgrade entries are kept.
    pub fn exclude_upgrade(&mut self, name: &str) -> Vec<String> {
        self.graph
            .prune(name, |pkg| pkg.is_upgrade || pkg.reason == InstallReason::Explicit)
            .into_iter()
            .collect()
    }
}
