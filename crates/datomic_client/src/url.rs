//! Resource path construction.

use crate::config::Version;

/// Builds resource URLs from a base address and an optional storage alias.
///
/// Absent or empty segments are skipped, so an unconfigured storage alias
/// never leaves an empty `//` slot in the path.
#[derive(Debug, Clone, Copy)]
pub struct UrlBuilder<'a> {
    base: &'a str,
    storage: Option<&'a str>,
}

impl<'a> UrlBuilder<'a> {
    /// Creates a builder. A trailing `/` on `base` is ignored.
    pub fn new(base: &'a str, storage: Option<&'a str>) -> Self {
        Self {
            base: base.trim_end_matches('/'),
            storage,
        }
    }

    /// Returns the storage alias, if configured.
    pub fn storage(&self) -> Option<&'a str> {
        self.storage.filter(|s| !s.is_empty())
    }

    /// Joins the base address and every present segment with `/`.
    pub fn root<'s, I>(&self, segments: I) -> String
    where
        I: IntoIterator<Item = Option<&'s str>>,
    {
        let mut url = self.base.to_string();
        for segment in segments.into_iter().flatten() {
            if segment.is_empty() {
                continue;
            }
            url.push('/');
            url.push_str(segment);
        }
        url
    }

    /// `{base}/data/{storage}/{db}[/{version}][/{resource}]`.
    pub fn database(&self, db: &str, version: Option<&Version>, resource: Option<&str>) -> String {
        let version = version.map(Version::to_string);
        self.root([
            Some("data"),
            self.storage(),
            Some(db),
            version.as_deref(),
            resource,
        ])
    }

    /// `{base}/data/{storage}`, the collection of databases.
    pub fn storage_root(&self) -> String {
        self.root([Some("data"), self.storage()])
    }

    /// `{base}/events/{storage}/{db}`.
    pub fn events(&self, db: &str) -> String {
        self.root([Some("events"), self.storage(), Some(db)])
    }

    /// `{base}/api/query`.
    pub fn query(&self) -> String {
        self.root([Some("api/query")])
    }
}
