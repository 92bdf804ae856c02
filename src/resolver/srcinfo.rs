//! `.SRCINFO` parsing.
//!
//! A `.SRCINFO` holds one `pkgbase` section followed by a `pkgname` section
//! per split package. Package sections inherit every field of the base
//! unless they set it themselves. Fields suffixed `_<arch>` only apply on
//! that architecture.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::record::{Origin, PackageRecord};

#[derive(Debug, Error)]
pub enum SrcinfoError {
    #[error("failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}:{line}: {message}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },
}

type Fields = BTreeMap<String, Vec<String>>;

/// A parsed `.SRCINFO`, filtered for a set of architectures.
#[derive(Debug, Clone, PartialEq)]
pub struct Srcinfo {
    pub base: String,
    /// `[epoch:]pkgver-pkgrel`
    pub version: String,
    pub sources: Vec<String>,
    pub packages: Vec<PackageRecord>,
}

impl Srcinfo {
    /// Read `<dir>/.SRCINFO`.
    pub fn from_dir(dir: &Path, architectures: &[String]) -> Result<Srcinfo, SrcinfoError> {
        let path = dir.join(".SRCINFO");
        let content = std::fs::read_to_string(&path).map_err(|source| SrcinfoError::Io {
            path: path.clone(),
            source,
        })?;
        Srcinfo::parse(&content, &path, dir, architectures)
    }

    /// Parse `content`. `path` is only used in errors; records point at `dir`.
    pub fn parse(
        content: &str,
        path: &Path,
        dir: &Path,
        architectures: &[String],
    ) -> Result<Srcinfo, SrcinfoError> {
        let err = |line: usize, message: String| SrcinfoError::Parse {
            path: path.to_path_buf(),
            line,
            message,
        };

        let mut base: Option<(String, Fields)> = None;
        let mut packages: Vec<(String, Fields)> = Vec::new();

        for (idx, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = line
                .split_once('=')
                .map(|(k, v)| (k.trim(), v.trim()))
                .ok_or_else(|| err(idx + 1, format!("expected `key = value`, found `{}`", line)))?;

            match key {
                "pkgbase" => {
                    if base.is_some() {
                        return Err(err(idx + 1, "duplicate pkgbase".to_string()));
                    }
                    base = Some((value.to_string(), Fields::new()));
                }
                "pkgname" => {
                    if base.is_none() {
                        return Err(err(idx + 1, "pkgname before pkgbase".to_string()));
                    }
                    packages.push((value.to_string(), Fields::new()));
                }
                _ => {
                    let fields = match packages.last_mut() {
                        Some((_, fields)) => fields,
                        None => match base.as_mut() {
                            Some((_, fields)) => fields,
                            None => return Err(err(idx + 1, format!("`{}` before pkgbase", key))),
                        },
                    };
                    fields.entry(key.to_string()).or_default().push(value.to_string());
                }
            }
        }

        let (base_name, base_fields) =
            base.ok_or_else(|| err(0, "missing pkgbase".to_string()))?;
        let single = |field: &str| {
            base_fields
                .get(field)
                .and_then(|v| v.first())
                .filter(|v| !v.is_empty())
                .cloned()
        };
        let pkgver = single("pkgver").ok_or_else(|| err(0, "missing pkgver".to_string()))?;
        let pkgrel = single("pkgrel").ok_or_else(|| err(0, "missing pkgrel".to_string()))?;
        let version = match single("epoch") {
            Some(epoch) if epoch != "0" => format!("{}:{}-{}", epoch, pkgver, pkgrel),
            _ => format!("{}-{}", pkgver, pkgrel),
        };

        let empty = Fields::new();
        let sources = arch_values("source", &base_fields, &empty, architectures);
        let make_depends = arch_values("makedepends", &base_fields, &empty, architectures);
        let check_depends = arch_values("checkdepends", &base_fields, &empty, architectures);

        let packages = packages
            .iter()
            .map(|(name, fields)| {
                let mut record = PackageRecord::new(
                    name.clone(),
                    version.clone(),
                    Origin::SrcInfo {
                        dir: dir.to_path_buf(),
                    },
                )
                .with_base(base_name.clone())
                .with_depends(arch_values("depends", &base_fields, fields, architectures))
                .with_make_depends(make_depends.clone())
                .with_check_depends(check_depends.clone())
                .with_provides(arch_values("provides", &base_fields, fields, architectures))
                .with_conflicts(arch_values("conflicts", &base_fields, fields, architectures))
                .with_groups(arch_values("groups", &base_fields, fields, architectures));
                record.description = fields
                    .get("pkgdesc")
                    .or_else(|| base_fields.get("pkgdesc"))
                    .and_then(|v| v.first())
                    .cloned()
                    .unwrap_or_default();
                record
            })
            .collect();

        Ok(Srcinfo {
            base: base_name,
            version,
            sources,
            packages,
        })
    }
}

/// `field` plus its `_<arch>` variants, each taken from the package section
/// if set there and from the base otherwise. Empty values clear a field.
fn arch_values(field: &str, base: &Fields, pkg: &Fields, architectures: &[String]) -> Vec<String> {
    let keys = std::iter::once(field.to_string())
        .chain(architectures.iter().map(|arch| format!("{}_{}", field, arch)));

    let mut out = Vec::new();
    for key in keys {
        if let Some(values) = pkg.get(&key).or_else(|| base.get(&key)) {
            out.extend(values.iter().filter(|v| !v.is_empty()).cloned());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPLIT: &str = "\
pkgbase = python-foo
\tpkgdesc = Foo bindings
\tpkgver = 1.2
\tpkgrel = 3
\tepoch = 1
\tarch = x86_64
\tarch = aarch64
\tmakedepends = python-build
\tmakedepends_aarch64 = arm-only-tool
\tcheckdepends = python-pytest
\tdepends = glibc
\tdepends_x86_64 = lib32-glibc
\tsource = git+https://example.org/foo.git
\tsource_x86_64 = https://example.org/x86.patch

pkgname = python-foo
\tdepends = python
\tprovides = foo=1.2

pkgname = python-foo-docs
\tpkgdesc = Docs
\tdepends =
";

    fn parse(content: &str, archs: &[&str]) -> Result<Srcinfo, SrcinfoError> {
        let archs: Vec<String> = archs.iter().map(|a| a.to_string()).collect();
        Srcinfo::parse(content, Path::new("/tmp/foo/.SRCINFO"), Path::new("/tmp/foo"), &archs)
    }

    #[test]
    fn test_split_package() {
        let info = parse(SPLIT, &["x86_64"]).unwrap();
        assert_eq!(info.base, "python-foo");
        assert_eq!(info.version, "1:1.2-3");
        assert_eq!(
            info.sources,
            vec!["git+https://example.org/foo.git", "https://example.org/x86.patch"]
        );
        assert_eq!(info.packages.len(), 2);

        let main = &info.packages[0];
        assert_eq!(main.name, "python-foo");
        assert_eq!(main.base, "python-foo");
        assert_eq!(main.depends, vec!["python", "lib32-glibc"]);
        assert_eq!(main.make_depends, vec!["python-build"]);
        assert_eq!(main.check_depends, vec!["python-pytest"]);
        assert_eq!(main.provides, vec!["foo=1.2"]);
        assert_eq!(main.description, "Foo bindings");

        let docs = &info.packages[1];
        assert_eq!(docs.depends, vec!["lib32-glibc"]);
        assert_eq!(docs.description, "Docs");
        assert!(matches!(docs.origin, Origin::SrcInfo { .. }));
    }

    #[test]
    fn test_other_architecture() {
        let info = parse(SPLIT, &["aarch64"]).unwrap();
        assert_eq!(info.sources, vec!["git+https://example.org/foo.git"]);
        assert_eq!(info.packages[0].depends, vec!["python"]);
        assert_eq!(info.packages[0].make_depends, vec!["python-build", "arm-only-tool"]);
    }

    #[test]
    fn test_zero_epoch_omitted() {
        let info = parse("pkgbase = a\npkgver = 1\npkgrel = 1\nepoch = 0\npkgname = a\n", &[]).unwrap();
        assert_eq!(info.version, "1-1");
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            parse("pkgname = a\n", &[]),
            Err(SrcinfoError::Parse { line: 1, .. })
        ));
        assert!(matches!(
            parse("pkgbase = a\npkgrel = 1\n", &[]),
            Err(SrcinfoError::Parse { .. })
        ));
        assert!(matches!(
            parse("pkgbase = a\ngarbage\n", &[]),
            Err(SrcinfoError::Parse { line: 2, .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = Srcinfo::from_dir(Path::new("/nonexistent/dir"), &[]).unwrap_err();
        assert!(matches!(err, SrcinfoError::Io { .. }));
    }
}
