use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Characters allowed in a package name besides alphanumerics.
const NAME_PUNCTUATION: [char; 3] = ['_', '-', '.'];

/// Returns the longest prefix of `raw` made only of name characters.
///
/// The first disallowed character truncates the name; nothing after it is
/// kept. An empty result means `raw` carried no usable name.
pub fn sanitize(raw: &str) -> &str {
    match raw.char_indices().find(|&(_, c)| !is_name_char(c)) {
        Some((end, _)) => &raw[..end],
        None => raw,
    }
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || NAME_PUNCTUATION.contains(&c)
}

/// A sanitized, non-empty package name.
///
/// Identity is exact string equality after sanitization; no case folding or
/// index-specific normalization is applied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageName(String);

impl PackageName {
    /// Sanitizes `raw`, returning `None` when nothing valid remains.
    pub fn new(raw: &str) -> Option<Self> {
        let clean = sanitize(raw);
        if clean.is_empty() {
            None
        } else {
            Some(Self(clean.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PackageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PackageName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Compression applied to a source archive's tar stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TarCompression {
    Gzip,
    Bzip2,
}

/// Container format of a downloadable artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactFormat {
    /// Zip container (wheel or egg) carrying `*.dist-info/METADATA`.
    WheelLike,

    /// Compressed tar carrying `*.egg-info/requires.txt`.
    SourceArchive(TarCompression),

    /// Matched only by the catch-all link rule; opened as a zip best-effort.
    Unknown,
}

impl ArtifactFormat {
    /// Whether metadata is read through the zip strategy.
    pub fn is_zip(&self) -> bool {
        matches!(self, Self::WheelLike | Self::Unknown)
    }
}

/// Link suffixes in priority order with the format each implies and whether
/// the artifact is a dependency-free leaf. The empty suffix is the catch-all.
pub const LINK_SUFFIXES: [(&str, ArtifactFormat, bool); 5] = [
    (".whl", ArtifactFormat::WheelLike, false),
    (
        ".tar.gz",
        ArtifactFormat::SourceArchive(TarCompression::Gzip),
        false,
    ),
    (
        ".tar.bz2",
        ArtifactFormat::SourceArchive(TarCompression::Bzip2),
        false,
    ),
    (".egg", ArtifactFormat::WheelLike, true),
    ("", ArtifactFormat::Unknown, false),
];

/// A resolved artifact ready for download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactDescriptor {
    /// Absolute download URL
    pub url: String,

    /// Local file name: the URL's last path segment without any fragment
    pub filename: String,

    /// Detected container format
    pub format: ArtifactFormat,

    /// Leaf shortcut: skip metadata extraction entirely (eggs)
    pub no_dependencies: bool,
}

impl ArtifactDescriptor {
    pub fn new(url: impl Into<String>, format: ArtifactFormat, no_dependencies: bool) -> Self {
        let url = url.into();
        let filename = filename_from_url(&url).to_string();
        Self {
            url,
            filename,
            format,
            no_dependencies,
        }
    }
}

/// Final path segment of `url` with any `#fragment` removed.
pub fn filename_from_url(url: &str) -> &str {
    let without_fragment = url.split_once('#').map_or(url, |(head, _)| head);
    without_fragment
        .rsplit_once('/')
        .map_or(without_fragment, |(_, tail)| tail)
}

/// The dependency graph discovered by a crawl.
///
/// `visited` holds every name dispatched to the pipeline. A visited name
/// without an entry in `edges` was resolved without known dependencies, or
/// failed before its edges were recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyGraph {
    pub root: PackageName,
    pub edges: IndexMap<PackageName, Vec<PackageName>>,
    pub visited: IndexSet<PackageName>,
}

impl DependencyGraph {
    pub fn new(root: PackageName) -> Self {
        let mut visited = IndexSet::new();
        visited.insert(root.clone());
        Self {
            root,
            edges: IndexMap::new(),
            visited,
        }
    }

    /// Records the edge list for `name`. The first recorded list is final.
    ///
    /// Returns `false` when `name` already had edges.
    pub fn record(&mut self, name: PackageName, deps: Vec<PackageName>) -> bool {
        if self.edges.contains_key(&name) {
            return false;
        }
        self.edges.insert(name, deps);
        true
    }

    /// Marks `name` as dispatched. Returns `true` when it was not seen before.
    pub fn visit(&mut self, name: PackageName) -> bool {
        self.visited.insert(name)
    }

    pub fn dependencies(&self, name: &PackageName) -> Option<&[PackageName]> {
        self.edges.get(name).map(Vec::as_slice)
    }

    /// Iterates `(name, dependency)` pairs in recording order.
    pub fn edge_pairs(&self) -> impl Iterator<Item = (&PackageName, &PackageName)> {
        self.edges
            .iter()
            .flat_map(|(name, deps)| deps.iter().map(move |dep| (name, dep)))
    }
}
