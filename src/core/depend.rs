//! Dependency strings and command-line targets.

use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use super::record::PackageRecord;
use super::version::vercmp;

static DEPEND_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([^<>=]+)(<=|>=|<|>|=)?(.*)$").expect("dependency pattern is valid")
});

/// Version constraint operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepMod {
    Any,
    Eq,
    Ge,
    Le,
    Gt,
    Lt,
}

impl DepMod {
    fn parse(op: &str) -> DepMod {
        match op {
            "=" => DepMod::Eq,
            ">=" => DepMod::Ge,
            "<=" => DepMod::Le,
            ">" => DepMod::Gt,
            "<" => DepMod::Lt,
            _ => DepMod::Any,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            DepMod::Any => "",
            DepMod::Eq => "=",
            DepMod::Ge => ">=",
            DepMod::Le => "<=",
            DepMod::Gt => ">",
            DepMod::Lt => "<",
        }
    }
}

/// A parsed `name[op version]` dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Depend {
    pub name: String,
    pub op: DepMod,
    pub version: String,
}

impl Depend {
    pub fn parse(s: &str) -> Depend {
        let s = s.trim();
        match DEPEND_RE.captures(s) {
            Some(caps) => {
                let op = caps.get(2).map_or(DepMod::Any, |m| DepMod::parse(m.as_str()));
                Depend {
                    name: caps[1].to_string(),
                    op,
                    version: if op == DepMod::Any {
                        String::new()
                    } else {
                        caps[3].to_string()
                    },
                }
            }
            None => Depend {
                name: s.to_string(),
                op: DepMod::Any,
                version: String::new(),
            },
        }
    }

    /// Whether `version` meets this constraint.
    pub fn version_matches(&self, version: &str) -> bool {
        let ord = vercmp(version, &self.version);
        match self.op {
            DepMod::Any => true,
            DepMod::Eq => ord == Ordering::Equal,
            DepMod::Ge => ord != Ordering::Less,
            DepMod::Le => ord != Ordering::Greater,
            DepMod::Gt => ord == Ordering::Greater,
            DepMod::Lt => ord == Ordering::Less,
        }
    }

    /// Whether `pkg` satisfies this dependency by name or through `provides`.
    ///
    /// An unversioned provide only satisfies an unversioned dependency.
    pub fn satisfied_by(&self, pkg: &PackageRecord) -> bool {
        if pkg.name == self.name && self.version_matches(&pkg.version) {
            return true;
        }

        pkg.provides.iter().any(|provide| {
            let provided = Depend::parse(provide);
            if provided.name != self.name {
                return false;
            }
            match self.op {
                DepMod::Any => true,
                _ => provided.op == DepMod::Eq && self.version_matches(&provided.version),
            }
        })
    }
}

impl fmt::Display for Depend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.name, self.op.as_str(), self.version)
    }
}

/// A command-line target: `[repo/]name[op version]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// `Some("aur")` pins to the AUR, any other value to that sync repository.
    pub db: Option<String>,
    pub depend: Depend,
}

impl Target {
    pub fn parse(s: &str) -> Target {
        let (db, rest) = match s.split_once('/') {
            Some((db, rest)) if !db.is_empty() => (Some(db.to_string()), rest),
            _ => (None, s),
        };
        Target {
            db,
            depend: Depend::parse(rest),
        }
    }

    pub fn name(&self) -> &str {
        &self.depend.name
    }

    pub fn is_aur(&self) -> bool {
        self.db.as_deref() == Some("aur")
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.db {
            Some(db) => write!(f, "{}/{}", db, self.depend),
            None => write!(f, "{}", self.depend),
        }
    }
}
