//! Reader for pacman's on-disk databases.
//!
//! The local database is a directory per installed package holding a `desc`
//! file; a sync database is a gzip tarball with the same layout. Both use
//! `%FIELD%` headers followed by one value per line.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;
use tracing::{debug, warn};

use super::conf::PacmanConf;
use super::{DbError, Executor, Upgrade};
use crate::core::depend::Depend;
use crate::core::record::{Origin, PackageRecord};
use crate::core::version::vercmp;

type Fields = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone)]
struct SyncRepo {
    name: String,
    packages: BTreeMap<String, PackageRecord>,
}

/// [`Executor`] over a pacman database directory.
#[derive(Debug, Clone, Default)]
pub struct AlpmDb {
    local: BTreeMap<String, PackageRecord>,
    sync: Vec<SyncRepo>,
    architectures: Vec<String>,
}

impl AlpmDb {
    /// Read the local database and the sync databases of `conf.repositories`
    /// under `db_path`. Repositories without a downloaded database are skipped.
    pub fn open(db_path: &Path, conf: &PacmanConf) -> Result<Self, DbError> {
        let local = read_local(&db_path.join("local"))?;

        let mut sync = Vec::with_capacity(conf.repositories.len());
        for repo in &conf.repositories {
            let path = db_path.join("sync").join(format!("{}.db", repo));
            if !path.exists() {
                warn!("database for repository {} not found at {}", repo, path.display());
                continue;
            }
            sync.push(SyncRepo {
                name: repo.clone(),
                packages: read_sync(&path, repo)?,
            });
        }

        debug!(
            "loaded {} installed packages and {} sync repositories",
            local.len(),
            sync.len()
        );
        Ok(AlpmDb {
            local,
            sync,
            architectures: conf.architectures.clone(),
        })
    }

    /// Build a database from records already in memory.
    pub fn from_records(
        local: Vec<PackageRecord>,
        sync: Vec<(String, Vec<PackageRecord>)>,
        architectures: Vec<String>,
    ) -> Self {
        AlpmDb {
            local: local.into_iter().map(|p| (p.name.clone(), p)).collect(),
            sync: sync
                .into_iter()
                .map(|(name, pkgs)| SyncRepo {
                    name,
                    packages: pkgs.into_iter().map(|p| (p.name.clone(), p)).collect(),
                })
                .collect(),
            architectures,
        }
    }

    /// Sync repository names in priority order.
    pub fn repositories(&self) -> Vec<&str> {
        self.sync.iter().map(|r| r.name.as_str()).collect()
    }

    fn sync_packages(&self) -> impl Iterator<Item = &PackageRecord> {
        self.sync.iter().flat_map(|r| r.packages.values())
    }
}

impl Executor for AlpmDb {
    fn local_package(&self, name: &str) -> Option<PackageRecord> {
        self.local.get(name).cloned()
    }

    fn local_packages(&self) -> Vec<PackageRecord> {
        self.local.values().cloned().collect()
    }

    fn local_satisfier_exists(&self, dep: &str) -> bool {
        let dep = Depend::parse(dep);
        if let Some(pkg) = self.local.get(&dep.name) {
            if dep.satisfied_by(pkg) {
                return true;
            }
        }
        self.local.values().any(|pkg| dep.satisfied_by(pkg))
    }

    fn sync_package(&self, name: &str) -> Option<PackageRecord> {
        self.sync.iter().find_map(|r| r.packages.get(name).cloned())
    }

    fn sync_package_from_db(&self, db: &str, name: &str) -> Option<PackageRecord> {
        self.sync
            .iter()
            .find(|r| r.name == db)
            .and_then(|r| r.packages.get(name).cloned())
    }

    fn sync_satisfier(&self, dep: &str) -> Option<PackageRecord> {
        let dep = Depend::parse(dep);
        let by_name = self
            .sync
            .iter()
            .filter_map(|r| r.packages.get(&dep.name))
            .find(|pkg| dep.version_matches(&pkg.version));
        by_name
            .or_else(|| self.sync_packages().find(|pkg| dep.satisfied_by(pkg)))
            .cloned()
    }

    fn packages_from_group(&self, group: &str) -> Vec<PackageRecord> {
        self.sync_packages()
            .filter(|pkg| pkg.groups.iter().any(|g| g == group))
            .cloned()
            .collect()
    }

    fn is_correct_version_installed(&self, name: &str, version: &str) -> bool {
        self.local.get(name).is_some_and(|pkg| pkg.version == version)
    }

    fn installed_foreign_packages(&self) -> Vec<PackageRecord> {
        self.local
            .values()
            .filter(|pkg| !self.sync.iter().any(|r| r.packages.contains_key(&pkg.name)))
            .cloned()
            .collect()
    }

    fn repo_upgrades(&self) -> Vec<Upgrade> {
        self.local
            .values()
            .filter_map(|local| {
                let (repo, remote) = self
                    .sync
                    .iter()
                    .find_map(|r| r.packages.get(&local.name).map(|p| (&r.name, p)))?;
                (vercmp(&remote.version, &local.version) == Ordering::Greater).then(|| Upgrade {
                    name: local.name.clone(),
                    repository: repo.clone(),
                    local_version: local.version.clone(),
                    remote_version: remote.version.clone(),
                })
            })
            .collect()
    }

    fn architectures(&self) -> Vec<String> {
        self.architectures.clone()
    }
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> DbError + '_ {
    move |source| DbError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn read_local(dir: &Path) -> Result<BTreeMap<String, PackageRecord>, DbError> {
    let mut packages = BTreeMap::new();
    if !dir.exists() {
        debug!("no local database at {}", dir.display());
        return Ok(packages);
    }

    for entry in fs::read_dir(dir).map_err(io_err(dir))? {
        let entry = entry.map_err(io_err(dir))?;
        let desc = entry.path().join("desc");
        if !desc.is_file() {
            continue;
        }
        let content = fs::read_to_string(&desc).map_err(io_err(&desc))?;
        let fields = parse_desc(&content);
        let explicit = fields
            .get("REASON")
            .and_then(|v| v.first())
            .is_none_or(|reason| reason != "1");
        let entry_name = entry.file_name().to_string_lossy().into_owned();
        let record = record_from_fields(&fields, Origin::Local { explicit }, &desc, &entry_name)?;
        packages.insert(record.name.clone(), record);
    }
    Ok(packages)
}

fn read_sync(path: &Path, repo: &str) -> Result<BTreeMap<String, PackageRecord>, DbError> {
    let mut data = Vec::new();
    File::open(path)
        .and_then(|f| BufReader::new(f).read_to_end(&mut data))
        .map_err(io_err(path))?;

    // Older databases and `repo-add -n` output may be uncompressed.
    let reader: Box<dyn Read> = if data.starts_with(&[0x1f, 0x8b]) {
        Box::new(GzDecoder::new(data.as_slice()))
    } else {
        Box::new(data.as_slice())
    };

    // desc and depends of one package share a directory.
    let mut entries: BTreeMap<String, Fields> = BTreeMap::new();
    let mut archive = Archive::new(reader);
    for entry in archive.entries().map_err(io_err(path))? {
        let mut entry = entry.map_err(io_err(path))?;
        let entry_path = entry.path().map_err(io_err(path))?.into_owned();
        let Some(file) = entry_path.file_name().map(|f| f.to_string_lossy().into_owned()) else {
            continue;
        };
        if file != "desc" && file != "depends" {
            continue;
        }
        let dir = entry_path
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut content = String::new();
        entry.read_to_string(&mut content).map_err(io_err(path))?;
        entries.entry(dir).or_default().extend(parse_desc(&content));
    }

    let origin = Origin::Repo {
        repository: repo.to_string(),
    };
    let mut packages = BTreeMap::new();
    for (dir, fields) in &entries {
        let record = record_from_fields(fields, origin.clone(), path, dir)?;
        packages.insert(record.name.clone(), record);
    }
    Ok(packages)
}

/// Split a `desc` file into its `%FIELD%` blocks.
pub(crate) fn parse_desc(content: &str) -> Fields {
    let mut fields = Fields::new();
    let mut current: Option<String> = None;
    let mut values = Vec::new();

    for line in content.lines() {
        let line = line.trim();
        if line.len() > 2 && line.starts_with('%') && line.ends_with('%') {
            if let Some(field) = current.take() {
                fields.insert(field, std::mem::take(&mut values));
            }
            current = Some(line[1..line.len() - 1].to_string());
        } else if !line.is_empty() {
            values.push(line.to_string());
        }
    }
    if let Some(field) = current {
        fields.insert(field, values);
    }
    fields
}

fn record_from_fields(
    fields: &Fields,
    origin: Origin,
    path: &Path,
    entry: &str,
) -> Result<PackageRecord, DbError> {
    let single = |field: &'static str| -> Result<String, DbError> {
        fields
            .get(field)
            .and_then(|v| v.first())
            .cloned()
            .ok_or_else(|| DbError::MissingField {
                path: PathBuf::from(path),
                entry: entry.to_string(),
                field,
            })
    };
    let list = |field: &str| fields.get(field).cloned().unwrap_or_default();

    let name = single("NAME")?;
    let version = single("VERSION")?;
    let mut record = PackageRecord::new(name, version, origin)
        .with_depends(list("DEPENDS"))
        .with_make_depends(list("MAKEDEPENDS"))
        .with_check_depends(list("CHECKDEPENDS"))
        .with_provides(list("PROVIDES"))
        .with_conflicts(list("CONFLICTS"))
        .with_groups(list("GROUPS"));
    if let Ok(base) = single("BASE") {
        record = record.with_base(base);
    }
    record.description = list("DESC").join(" ");
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use tempfile::TempDir;

    fn write_local(db: &Path, name: &str, version: &str, extra: &str) {
        let dir = db.join("local").join(format!("{}-{}", name, version));
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("desc"),
            format!("%NAME%\n{}\n\n%VERSION%\n{}\n\n{}", name, version, extra),
        )
        .unwrap();
    }

    fn write_sync(db: &Path, repo: &str, pkgs: &[(&str, &str, &str)]) {
        let dir = db.join("sync");
        fs::create_dir_all(&dir).unwrap();
        let file = File::create(dir.join(format!("{}.db", repo))).unwrap();
        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
        for (name, version, extra) in pkgs {
            let desc = format!("%NAME%\n{}\n\n%VERSION%\n{}\n\n{}", name, version, extra);
            let mut header = tar::Header::new_gnu();
            header.set_size(desc.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, format!("{}-{}/desc", name, version), desc.as_bytes())
                .unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
    }

    fn fixture() -> (TempDir, AlpmDb) {
        let tmp = TempDir::new().unwrap();
        let db = tmp.path();
        write_local(db, "glibc", "2.38-1", "");
        write_local(db, "yay", "12.0.0-1", "%REASON%\n0\n");
        write_local(db, "libfoo", "1.0-1", "%REASON%\n1\n\n%PROVIDES%\nlibfoo.so=1-64\n");
        write_sync(
            db,
            "core",
            &[
                ("glibc", "2.39-1", "%GROUPS%\nbase\n"),
                ("gcc", "14.1-1", "%GROUPS%\nbase-devel\n\n%DEPENDS%\nglibc>=2.38\n"),
            ],
        );
        write_sync(
            db,
            "extra",
            &[
                ("glibc", "9.0-1", ""),
                ("rustup", "1.27-1", "%PROVIDES%\nrust\ncargo\n"),
            ],
        );
        let conf = PacmanConf {
            repositories: vec!["core".into(), "extra".into(), "missing".into()],
            architectures: vec!["x86_64".into()],
        };
        let alpm = AlpmDb::open(db, &conf).unwrap();
        (tmp, alpm)
    }

    #[test]
    fn test_parse_desc() {
        let fields = parse_desc("%NAME%\nfoo\n\n%DEPENDS%\nbar\nbaz>=1\n\n%DESC%\nA thing\n");
        assert_eq!(fields["NAME"], vec!["foo"]);
        assert_eq!(fields["DEPENDS"], vec!["bar", "baz>=1"]);
        assert_eq!(fields["DESC"], vec!["A thing"]);
    }

    #[test]
    fn test_open_reads_local_and_sync() {
        let (_tmp, db) = fixture();
        assert_eq!(db.repositories(), vec!["core", "extra"]);
        assert_eq!(db.local_packages().len(), 3);

        let gcc = db.sync_package("gcc").unwrap();
        assert_eq!(gcc.repository(), Some("core"));
        assert_eq!(gcc.depends, vec!["glibc>=2.38"]);
    }

    #[test]
    fn test_install_reason() {
        let (_tmp, db) = fixture();
        assert!(db.local_package("yay").unwrap().is_explicit());
        assert!(db.local_package("glibc").unwrap().is_explicit());
        assert!(!db.local_package("libfoo").unwrap().is_explicit());
    }

    #[test]
    fn test_repository_priority() {
        let (_tmp, db) = fixture();
        assert_eq!(db.sync_package("glibc").unwrap().version, "2.39-1");
        assert_eq!(
            db.sync_package_from_db("extra", "glibc").unwrap().version,
            "9.0-1"
        );
        assert!(db.sync_package_from_db("core", "rustup").is_none());
    }

    #[test]
    fn test_satisfiers() {
        let (_tmp, db) = fixture();
        assert_eq!(db.sync_satisfier("cargo").unwrap().name, "rustup");
        assert_eq!(db.sync_satisfier("glibc>=5").unwrap().version, "9.0-1");
        assert!(db.sync_satisfier("nope").is_none());

        assert!(db.local_satisfier_exists("glibc>=2"));
        assert!(db.local_satisfier_exists("libfoo.so"));
        assert!(!db.local_satisfier_exists("glibc>=3"));
    }

    #[test]
    fn test_groups() {
        let (_tmp, db) = fixture();
        let base_devel = db.packages_from_group("base-devel");
        assert_eq!(base_devel.len(), 1);
        assert_eq!(base_devel[0].name, "gcc");
    }

    #[test]
    fn test_foreign_and_upgrades() {
        let (_tmp, db) = fixture();
        let foreign: Vec<String> = db
            .installed_foreign_packages()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(foreign, vec!["libfoo", "yay"]);

        let upgrades = db.repo_upgrades();
        assert_eq!(upgrades.len(), 1);
        assert_eq!(upgrades[0].name, "glibc");
        assert_eq!(upgrades[0].repository, "core");
        assert_eq!(upgrades[0].remote_version, "2.39-1");
    }

    #[test]
    fn test_version_installed() {
        let (_tmp, db) = fixture();
        assert!(db.is_correct_version_installed("yay", "12.0.0-1"));
        assert!(!db.is_correct_version_installed("yay", "12.0.1-1"));
        assert!(!db.is_correct_version_installed("paru", "1"));
    }

    #[test]
    fn test_missing_name_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("local").join("broken-1");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("desc"), "%VERSION%\n1\n").unwrap();

        let err = AlpmDb::open(tmp.path(), &PacmanConf::default()).unwrap_err();
        assert!(matches!(err, DbError::MissingField { field: "NAME", .. }));
    }
}
