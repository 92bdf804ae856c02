//! Persistent record of the last commit seen for each tracked VCS source.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;

use anyhow::{Context, Result};
use crossbeam_channel::unbounded;
use serde::{Deserialize, Serialize};

use super::remote::RefQuery;
use super::source::parse_source;
use crate::util::errors::MultiError;
use crate::util::fs::{read_to_string, write_atomic};
use crate::util::process::CancelToken;

/// Last observed state of one remote source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginFingerprint {
    pub protocols: Vec<String>,
    pub branch: String,
    pub sha: String,
}

/// Fingerprints of one package, keyed by source URL.
pub type PackageFingerprints = BTreeMap<String, OriginFingerprint>;

type StoreMap = BTreeMap<String, PackageFingerprints>;

/// Fingerprints of every tracked development package.
///
/// The backing file is rewritten after every change, so a crash mid-update
/// loses at most the fingerprint being recorded.
pub struct FingerprintStore {
    path: PathBuf,
    entries: Mutex<StoreMap>,
    refs: Arc<dyn RefQuery>,
}

impl std::fmt::Debug for FingerprintStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FingerprintStore")
            .field("path", &self.path)
            .field("entries", &*self.lock())
            .finish()
    }
}

impl FingerprintStore {
    /// Load the store at `path`. A missing or blank file is an empty store.
    pub fn load(path: impl Into<PathBuf>, refs: Arc<dyn RefQuery>) -> Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let content = read_to_string(&path)?;
            if content.trim().is_empty() {
                StoreMap::new()
            } else {
                serde_json::from_str(&content)
                    .with_context(|| format!("failed to parse {}", path.display()))?
            }
        } else {
            StoreMap::new()
        };

        tracing::debug!("loaded {} fingerprinted packages from {}", entries.len(), path.display());
        Ok(FingerprintStore {
            path,
            entries: Mutex::new(entries),
            refs,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the store to disk.
    pub fn save(&self) -> Result<()> {
        let entries = self.lock();
        self.write(&entries)
    }

    fn write(&self, entries: &StoreMap) -> Result<()> {
        let json = serde_json::to_vec_pretty(entries)?;
        write_atomic(&self.path, &json)
    }

    fn lock(&self) -> MutexGuard<'_, StoreMap> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Fingerprints recorded for `pkg`.
    pub fn get(&self, pkg: &str) -> Option<PackageFingerprints> {
        self.lock().get(pkg).cloned()
    }

    pub fn packages(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Whether any source in `fingerprints` has moved upstream.
    ///
    /// Every URL is queried on its own thread. The first changed commit
    /// answers `true` and cancels the remaining queries. Sources that cannot
    /// be reached count as unchanged.
    pub fn needs_update(&self, fingerprints: &PackageFingerprints) -> bool {
        if fingerprints.is_empty() {
            return false;
        }

        let cancel = CancelToken::new();
        let (tx, rx) = unbounded::<bool>();

        for (url, info) in fingerprints {
            let tx = tx.clone();
            let refs = Arc::clone(&self.refs);
            let cancel = cancel.clone();
            let url = url.clone();
            let info = info.clone();
            thread::spawn(move || {
                let changed = match refs.head(&url, &info.branch, &info.protocols, &cancel) {
                    Ok(sha) => !sha.is_empty() && sha != info.sha,
                    Err(e) => {
                        tracing::debug!("{}", e);
                        false
                    }
                };
                let _ = tx.send(changed);
            });
        }
        drop(tx);

        for changed in rx.iter() {
            if changed {
                cancel.cancel();
                return true;
            }
        }
        false
    }

    /// Whether the tracked package `pkg` has a newer upstream commit.
    pub fn to_upgrade(&self, pkg: &str) -> bool {
        match self.get(pkg) {
            Some(fingerprints) => self.needs_update(&fingerprints),
            None => false,
        }
    }

    /// Record the current commit of every VCS source of `pkg`.
    ///
    /// Sources are queried concurrently; each answer replaces the package's
    /// entry and is saved before the call moves on. Unreachable sources are
    /// left out.
    pub fn update<S: AsRef<str> + Sync>(&self, pkg: &str, sources: &[S]) -> Result<()> {
        let parsed: Vec<_> = sources
            .iter()
            .filter_map(|s| parse_source(s.as_ref()))
            .collect();
        if parsed.is_empty() {
            return Ok(());
        }

        let found = Mutex::new(PackageFingerprints::new());
        let errors = MultiError::new();
        let cancel = CancelToken::new();

        thread::scope(|s| {
            for source in &parsed {
                let found = &found;
                let errors = &errors;
                let cancel = &cancel;
                s.spawn(move || {
                    let sha = match self.refs.head(&source.url, &source.branch, &source.protocols, cancel) {
                        Ok(sha) if !sha.is_empty() => sha,
                        Ok(_) => return,
                        Err(e) => {
                            tracing::debug!("{}", e);
                            return;
                        }
                    };

                    let mut found = found.lock().unwrap_or_else(|e| e.into_inner());
                    found.insert(
                        source.url.clone(),
                        OriginFingerprint {
                            protocols: source.protocols.clone(),
                            branch: source.branch.clone(),
                            sha,
                        },
                    );
                    tracing::info!("found git repo: {}", source.url);

                    let mut entries = self.lock();
                    entries.insert(pkg.to_string(), found.clone());
                    if let Err(e) = self.write(&entries) {
                        errors.add(e);
                    }
                });
            }
        });

        errors.into_result()
    }

    /// Forget `pkgs`. The file is rewritten only if something was removed.
    pub fn remove_packages<S: AsRef<str>>(&self, pkgs: &[S]) -> Result<()> {
        let mut entries = self.lock();
        let before = entries.len();
        for pkg in pkgs {
            entries.remove(pkg.as_ref());
        }
        if entries.len() != before {
            self.write(&entries)?;
        }
        Ok(())
    }

    /// Drop fingerprints of packages that are no longer installed.
    ///
    /// Returns the names that were removed.
    pub fn clean_orphans(&self, installed: &BTreeSet<String>) -> Result<Vec<String>> {
        let orphans: Vec<String> = self
            .lock()
            .keys()
            .filter(|pkg| !installed.contains(*pkg))
            .cloned()
            .collect();
        if !orphans.is_empty() {
            tracing::debug!("removing fingerprints of {}", orphans.join(", "));
            self.remove_packages(&orphans)?;
        }
        Ok(orphans)
    }
}
