//! Client for the AUR RPC interface, version 5.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use super::{AurError, AurQuery, RemoteQuery, SearchBy};
use crate::core::record::{AurMeta, Origin, PackageRecord};

/// Names per `info` request; longer query strings are rejected by the server.
const INFO_CHUNK: usize = 150;

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    results: Vec<RpcPackage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RpcPackage {
    name: String,
    package_base: String,
    version: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    num_votes: u64,
    #[serde(default)]
    popularity: f64,
    #[serde(default)]
    maintainer: Option<String>,
    #[serde(default)]
    last_modified: i64,
    #[serde(default)]
    out_of_date: Option<i64>,
    #[serde(default)]
    depends: Vec<String>,
    #[serde(default)]
    make_depends: Vec<String>,
    #[serde(default)]
    check_depends: Vec<String>,
    #[serde(default)]
    provides: Vec<String>,
    #[serde(default)]
    conflicts: Vec<String>,
    #[serde(default)]
    groups: Vec<String>,
}

impl From<RpcPackage> for PackageRecord {
    fn from(pkg: RpcPackage) -> Self {
        let meta = AurMeta {
            votes: pkg.num_votes,
            popularity: pkg.popularity,
            maintainer: pkg.maintainer,
            last_modified: pkg.last_modified,
            out_of_date: pkg.out_of_date,
        };
        let mut record = PackageRecord::new(pkg.name, pkg.version, Origin::Aur(meta))
            .with_base(pkg.package_base)
            .with_depends(pkg.depends)
            .with_make_depends(pkg.make_depends)
            .with_check_depends(pkg.check_depends)
            .with_provides(pkg.provides)
            .with_conflicts(pkg.conflicts)
            .with_groups(pkg.groups);
        record.description = pkg.description.unwrap_or_default();
        record
    }
}

/// [`RemoteQuery`] over HTTP with an in-memory cache.
///
/// A name that the AUR does not know is cached as missing too, so repeated
/// frontier lookups never ask twice.
#[derive(Debug)]
pub struct AurClient {
    client: Client,
    rpc: Url,
    info_cache: Mutex<HashMap<String, Option<PackageRecord>>>,
    provides_cache: Mutex<HashMap<String, Vec<String>>>,
}

impl AurClient {
    pub fn new(aur_url: &str, timeout: Duration) -> Result<Self, AurError> {
        let invalid = |source| AurError::InvalidUrl {
            url: aur_url.to_string(),
            source,
        };
        let base = Url::parse(&format!("{}/", aur_url.trim_end_matches('/'))).map_err(invalid)?;
        let rpc = base.join("rpc/").map_err(invalid)?;

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("strata/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(AurClient {
            client,
            rpc,
            info_cache: Mutex::new(HashMap::new()),
            provides_cache: Mutex::new(HashMap::new()),
        })
    }

    fn request(&self, params: &[(&str, &str)]) -> Result<Vec<RpcPackage>, AurError> {
        let mut query: Vec<(&str, &str)> = vec![("v", "5")];
        query.extend_from_slice(params);

        let response = self.client.get(self.rpc.clone()).query(&query).send()?;
        if !response.status().is_success() {
            return Err(AurError::Status(response.status().as_u16()));
        }

        let body: RpcResponse = response.json()?;
        if body.kind == "error" {
            return Err(AurError::Rpc(body.error.unwrap_or_default()));
        }
        Ok(body.results)
    }

    fn info(&self, names: &[String]) -> Result<Vec<PackageRecord>, AurError> {
        let mut found = Vec::new();
        let mut missing = Vec::new();
        {
            let cache = self.info_cache.lock().unwrap_or_else(|e| e.into_inner());
            for name in names {
                match cache.get(name) {
                    Some(Some(record)) => found.push(record.clone()),
                    Some(None) => {}
                    None => missing.push(name.clone()),
                }
            }
        }
        missing.sort();
        missing.dedup();

        for chunk in missing.chunks(INFO_CHUNK) {
            debug!("aur info for {} packages", chunk.len());
            let mut params = vec![("type", "info")];
            params.extend(chunk.iter().map(|n| ("arg[]", n.as_str())));
            let results = self.request(&params)?;

            let mut cache = self.info_cache.lock().unwrap_or_else(|e| e.into_inner());
            for name in chunk {
                cache.insert(name.clone(), None);
            }
            for pkg in results {
                let record = PackageRecord::from(pkg);
                cache.insert(record.name.clone(), Some(record.clone()));
                found.push(record);
            }
        }
        Ok(found)
    }

    fn providers(&self, needle: &str) -> Result<Vec<String>, AurError> {
        if let Some(names) = self
            .provides_cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(needle)
        {
            return Ok(names.clone());
        }

        debug!("aur provider search for {}", needle);
        let names: Vec<String> = self
            .request(&[("type", "search"), ("by", "provides"), ("arg", needle)])?
            .into_iter()
            .map(|pkg| pkg.name)
            .collect();
        self.provides_cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(needle.to_string(), names.clone());
        Ok(names)
    }
}

impl RemoteQuery for AurClient {
    fn query(&self, query: &AurQuery) -> Result<Vec<PackageRecord>, AurError> {
        match query.by {
            SearchBy::Name => self.info(&query.needles),
            // Search results carry no dependency lists, so look the hits up again.
            SearchBy::Provides => {
                let mut names = Vec::new();
                for needle in &query.needles {
                    names.extend(self.providers(needle)?);
                }
                self.info(&names)
            }
        }
    }
}
