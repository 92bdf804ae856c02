//! The parts of `pacman.conf` the database reader needs.

use std::path::Path;

use crate::util::fs::read_to_string;

/// Repository order and architecture from `pacman.conf`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PacmanConf {
    /// Sync repositories in priority order.
    pub repositories: Vec<String>,
    pub architectures: Vec<String>,
}

impl PacmanConf {
    /// Read `path`, or return an empty configuration if it cannot be read.
    pub fn load(path: &Path) -> PacmanConf {
        match read_to_string(path) {
            Ok(content) => PacmanConf::parse(&content),
            Err(e) => {
                tracing::debug!("{:#}", e);
                PacmanConf::default()
            }
        }
    }

    pub fn parse(content: &str) -> PacmanConf {
        let mut conf = PacmanConf::default();
        let mut section = String::new();

        for line in content.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }

            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                section = name.trim().to_string();
                if section != "options" && !conf.repositories.contains(&section) {
                    conf.repositories.push(section.clone());
                }
                continue;
            }

            if section != "options" {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                if key.trim() == "Architecture" {
                    conf.architectures = value
                        .split_whitespace()
                        .map(|arch| match arch {
                            "auto" => std::env::consts::ARCH.to_string(),
                            other => other.to_string(),
                        })
                        .collect();
                }
            }
        }

        if conf.architectures.is_empty() {
            conf.architectures.push(std::env::consts::ARCH.to_string());
        }
        conf
    }
}
