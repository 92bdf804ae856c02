//! makepkg invocations and the build decision.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::errors::InstallError;
use crate::util::config::RebuildMode;
use crate::util::process::ProcessBuilder;

/// What to do with a package base whose PKGBUILD has been prepared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildDecision {
    /// Everything is installed at the target version; run nothing.
    SkipInstalled,
    /// Archives exist; only clean up the build directory.
    PackageOnly,
    FullBuild,
}

/// Facts the build decision depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildInputs {
    pub needed: bool,
    pub rebuild: RebuildMode,
    /// One of the base's packages was requested explicitly.
    pub is_target: bool,
    /// Every package of the base is installed at the version about to be built.
    pub installed_at_version: bool,
    /// Every archive makepkg would produce is already on disk.
    pub artifacts_present: bool,
}

pub fn decide_build(inputs: BuildInputs) -> BuildDecision {
    if inputs.needed && inputs.installed_at_version {
        return BuildDecision::SkipInstalled;
    }

    let reuse = match inputs.rebuild {
        RebuildMode::No => inputs.artifacts_present,
        RebuildMode::Yes => !inputs.is_target && inputs.artifacts_present,
        RebuildMode::All | RebuildMode::Tree => false,
    };
    if reuse {
        BuildDecision::PackageOnly
    } else {
        BuildDecision::FullBuild
    }
}

/// Argument sets for `makepkg`, each run inside a PKGBUILD directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MakepkgCommand {
    bin: PathBuf,
}

impl Default for MakepkgCommand {
    fn default() -> Self {
        MakepkgCommand::new("makepkg")
    }
}

impl MakepkgCommand {
    pub fn new(bin: impl Into<PathBuf>) -> Self {
        MakepkgCommand { bin: bin.into() }
    }

    fn cmd(&self, dir: &Path, args: &[&str]) -> ProcessBuilder {
        ProcessBuilder::new(&self.bin).args(args).cwd(dir)
    }

    /// Extract sources and run `prepare()`, bumping `pkgver` of VCS packages.
    pub fn prepare(&self, dir: &Path) -> ProcessBuilder {
        self.cmd(dir, &["--nobuild", "-fC", "--ignorearch"])
    }

    /// Print the archive paths a build would produce.
    pub fn package_list(&self, dir: &Path) -> ProcessBuilder {
        self.cmd(dir, &["--packagelist"])
    }

    pub fn package_only(&self, dir: &Path) -> ProcessBuilder {
        self.cmd(dir, &["-c", "--nobuild", "--noextract", "--ignorearch"])
    }

    pub fn full_build(&self, dir: &Path) -> ProcessBuilder {
        self.cmd(
            dir,
            &["-cf", "--noconfirm", "--noextract", "--noprepare", "--holdver", "--ignorearch"],
        )
    }

    /// Download and checksum sources without building.
    pub fn verify_sources(&self, dir: &Path) -> ProcessBuilder {
        self.cmd(dir, &["--verifysource", "-Ccf"])
    }

    /// The command carrying out `decision`, if any.
    pub fn for_decision(&self, decision: BuildDecision, dir: &Path) -> Option<ProcessBuilder> {
        match decision {
            BuildDecision::SkipInstalled => None,
            BuildDecision::PackageOnly => Some(self.package_only(dir)),
            BuildDecision::FullBuild => Some(self.full_build(dir)),
        }
    }
}

/// Parse `makepkg --packagelist` output into package name -> archive path,
/// plus the `pkgver-pkgrel` the archives carry.
///
/// Archive names look like `name-pkgver-pkgrel-arch.pkg.tar.zst`; package
/// names may contain dashes themselves.
pub fn parse_package_list(
    output: &str,
) -> Result<(BTreeMap<String, PathBuf>, String), InstallError> {
    let mut pkgdests = BTreeMap::new();
    let mut version = String::new();

    for line in output.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let path = PathBuf::from(line);
        let file_name = path
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or(line)
            .to_string();

        let parts: Vec<&str> = file_name.split('-').collect();
        if parts.len() < 4 {
            return Err(InstallError::CannotFindPackageName {
                line: line.to_string(),
            });
        }
        let name = parts[..parts.len() - 3].join("-");
        version = parts[parts.len() - 3..parts.len() - 1].join("-");
        pkgdests.insert(name, path);
    }

    if pkgdests.is_empty() {
        return Err(InstallError::NoPkgDestsFound);
    }
    Ok((pkgdests, version))
}
