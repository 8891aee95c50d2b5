//! Translation between engine file URIs and local paths.

use std::sync::OnceLock;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use regex::Regex;
use tracing::debug;

use crate::render::url_decode;

/// Characters left as-is when building a `file://` URI.
const URI_SAFE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b':')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Maps file locations between the engine's namespace and the local one.
pub trait PathMapper: std::fmt::Debug + Send + Sync {
    /// Engine URI (`file:///srv/app/index.php`) to a local path.
    fn to_local(&self, uri: &str) -> String;
    /// Local path to an engine URI.
    fn to_server(&self, path: &str) -> String;
}

/// Mapper for engines that see the same filesystem as the client.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityMapper;

impl PathMapper for IdentityMapper {
    fn to_local(&self, uri: &str) -> String {
        normalize(&strip_scheme(&url_decode(uri)))
    }

    fn to_server(&self, path: &str) -> String {
        file_uri(&normalize(path))
    }
}

/// Prefix substitution between server and local directories.
#[derive(Debug, Clone, Default)]
pub struct MappingTable {
    /// `(server, local)` prefixes, checked in order.
    entries: Vec<(String, String)>,
}

impl MappingTable {
    /// Build from `(server path, local path)` pairs.
    pub fn new<I, S, L>(mappings: I) -> Self
    where
        I: IntoIterator<Item = (S, L)>,
        S: AsRef<str>,
        L: AsRef<str>,
    {
        Self {
            entries: mappings
                .into_iter()
                .map(|(server, local)| (normalize(server.as_ref()), normalize(local.as_ref())))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PathMapper for MappingTable {
    fn to_local(&self, uri: &str) -> String {
        let path = normalize(&strip_scheme(&url_decode(uri)));
        let mapped = self
            .entries
            .iter()
            .find_map(|(server, local)| replace_prefix(&path, server, local));
        match mapped {
            Some(local) => local,
            None => {
                debug!("no path mapping for {path}");
                path
            }
        }
    }

    fn to_server(&self, path: &str) -> String {
        let path = normalize(path);
        let mapped = self
            .entries
            .iter()
            .find_map(|(server, local)| replace_prefix(&path, local, server))
            .unwrap_or(path);
        file_uri(&mapped)
    }
}

fn drive_pattern() -> &'static Regex {
    static DRIVE: OnceLock<Regex> = OnceLock::new();
    DRIVE.get_or_init(|| Regex::new(r"^[a-zA-Z]:[\\/]").expect("drive regex is valid"))
}

fn is_windows_path(path: &str) -> bool {
    drive_pattern().is_match(path)
}

/// `scheme:///path` -> `/path`, `scheme:///C:/path` -> `C:/path`.
fn strip_scheme(uri: &str) -> String {
    match uri.split_once(":///") {
        Some((_, rest)) if is_windows_path(rest) => rest.to_string(),
        Some((_, rest)) => format!("/{rest}"),
        None => uri.to_string(),
    }
}

/// Collapse separators and `.`/`..` segments, add a leading slash to
/// relative non-Windows paths.
fn normalize(path: &str) -> String {
    let windows = is_windows_path(path);
    let unified = path.replace('\\', "/");

    let (prefix, rest) = if windows {
        unified.split_at(2)
    } else {
        ("", unified.as_str())
    };

    let mut parts: Vec<&str> = Vec::new();
    for segment in rest.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }

    let joined = format!("{prefix}/{}", parts.join("/"));
    if windows {
        joined.replace('/', "\\")
    } else {
        joined
    }
}

/// Replace `from` at the start of `path`, on a segment boundary.
fn replace_prefix(path: &str, from: &str, to: &str) -> Option<String> {
    let rest = path.strip_prefix(from)?;
    let boundary = rest.is_empty()
        || rest.starts_with(['/', '\\'])
        || from.ends_with(['/', '\\']);
    if !boundary {
        return None;
    }
    let mapped = format!("{to}{rest}");
    Some(if is_windows_path(&mapped) {
        mapped.replace('/', "\\")
    } else {
        mapped.replace('\\', "/")
    })
}

fn file_uri(path: &str) -> String {
    let path = path.replace('\\', "/");
    let path = if path.starts_with('/') {
        path
    } else {
        format!("/{path}")
    };
    format!("file://{}", utf8_percent_encode(&path, URI_SAFE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_strips_scheme_and_decodes() {
        let mapper = IdentityMapper;
        assert_eq!(
            mapper.to_local("file:///var/www/my%20site/index.php"),
            "/var/www/my site/index.php"
        );
        assert_eq!(mapper.to_local("/already/local.php"), "/already/local.php");
    }

    #[test]
    fn identity_to_server_encodes() {
        assert_eq!(
            IdentityMapper.to_server("/var/www/my site/index.php"),
            "file:///var/www/my%20site/index.php"
        );
    }

    #[test]
    fn normalize_paths() {
        assert_eq!(normalize("/a//b/./c/../d/"), "/a/b/d");
        assert_eq!(normalize("relative/file.php"), "/relative/file.php");
        assert_eq!(normalize("C:/Projects/app"), "C:\\Projects\\app");
        assert_eq!(normalize("C:\\Projects\\\\app\\"), "C:\\Projects\\app");
        assert_eq!(normalize("/"), "/");
    }

    #[test]
    fn mapping_server_to_local() {
        let table = MappingTable::new([("/var/www/html", "/home/dev/project")]);
        assert_eq!(
            table.to_local("file:///var/www/html/src/App.php"),
            "/home/dev/project/src/App.php"
        );
        // Not a segment boundary.
        assert_eq!(
            table.to_local("file:///var/www/html2/index.php"),
            "/var/www/html2/index.php"
        );
    }

    #[test]
    fn mapping_local_to_server() {
        let table = MappingTable::new([("/var/www/html/", "/home/dev/project/")]);
        assert_eq!(
            table.to_server("/home/dev/project/src/App.php"),
            "file:///var/www/html/src/App.php"
        );
        assert_eq!(
            table.to_server("/elsewhere/x.php"),
            "file:///elsewhere/x.php"
        );
    }

    #[test]
    fn mapping_to_windows_local() {
        let table = MappingTable::new([("/var/www", "C:\\Projects\\site")]);
        assert_eq!(
            table.to_local("file:///var/www/index.php"),
            "C:\\Projects\\site\\index.php"
        );
        assert_eq!(
            table.to_server("C:\\Projects\\site\\index.php"),
            "file:///var/www/index.php"
        );
    }

    #[test]
    fn windows_uri_keeps_drive() {
        assert_eq!(
            IdentityMapper.to_local("file:///C:/site/index.php"),
            "C:\\site\\index.php"
        );
        assert_eq!(
            IdentityMapper.to_server("C:\\site\\index.php"),
            "file:///C:/site/index.php"
        );
    }

    #[test]
    fn first_matching_mapping_wins() {
        let table = MappingTable::new([("/srv/a", "/local/a"), ("/srv", "/local/root")]);
        assert_eq!(table.to_local("file:///srv/a/x.php"), "/local/a/x.php");
        assert_eq!(table.to_local("file:///srv/b/x.php"), "/local/root/b/x.php");
        assert!(!table.is_empty());
    }
}
