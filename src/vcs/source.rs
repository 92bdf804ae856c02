//! PKGBUILD `source=()` entries that track a moving VCS ref.

/// A git source whose HEAD is tracked between builds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VcsSource {
    /// URL without scheme, query or fragment.
    pub url: String,
    pub branch: String,
    /// Transport protocols, most preferred last.
    pub protocols: Vec<String>,
}

/// Parse a source entry such as `name::git+https://host/repo.git#branch=main`.
///
/// Returns `None` for non-git sources and for entries pinned with
/// `#commit=` or `#tag=`, which never move.
pub fn parse_source(source: &str) -> Option<VcsSource> {
    let source = source.rsplit("::").next().unwrap_or(source);
    let (scheme, rest) = source.split_once("://")?;

    let parts: Vec<&str> = scheme.splitn(2, '+').collect();
    if !parts.contains(&"git") {
        return None;
    }
    let protocols = parts
        .last()
        .map(|p| vec![p.to_string()])
        .unwrap_or_default();

    let (url, branch) = match rest.split_once('#') {
        Some((url, fragment)) => match fragment.split_once('=') {
            Some(("branch", branch)) => (url, branch),
            _ => return None,
        },
        None => (rest, "HEAD"),
    };

    let url = strip_query(url);
    let branch = strip_query(branch);
    if url.is_empty() || branch.is_empty() {
        return None;
    }

    Some(VcsSource {
        url: url.to_string(),
        branch: branch.to_string(),
        protocols,
    })
}

fn strip_query(s: &str) -> &str {
    s.split('?').next().unwrap_or(s)
}
