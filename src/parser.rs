//! Dependency name extraction from package metadata text.

use crate::model::PackageName;

/// Marker preceding one dependency declaration in core metadata.
pub const REQUIRES_DIST_MARKER: &str = "Requires-Dist: ";

/// Which metadata document the text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataKind {
    /// `*.dist-info/METADATA` (RFC 822 style headers)
    CoreMetadata,

    /// `*.egg-info/requires.txt` (one requirement per line)
    RequiresTxt,
}

/// Yields the text following every `Requires-Dist: ` occurrence, up to the
/// end of its line.
///
/// Occurrences are found anywhere in `text`, not only at the start of a line.
pub fn requires_dist_values(text: &str) -> impl Iterator<Item = &str> {
    let mut rest = text;
    std::iter::from_fn(move || {
        let start = rest.find(REQUIRES_DIST_MARKER)? + REQUIRES_DIST_MARKER.len();
        let tail = &rest[start..];
        let end = tail.find('\n').unwrap_or(tail.len());
        rest = &tail[end..];
        Some(tail[..end].trim_end_matches('\r'))
    })
}

/// Whether a requirement only applies when an extra is selected.
pub fn is_extra_only(requirement: &str) -> bool {
    let Some((_, marker)) = requirement.split_once(';') else {
        return false;
    };
    let compact: String = marker.chars().filter(|c| !c.is_whitespace()).collect();
    compact.contains("extra==")
}

/// Dependency name of a `Requires-Dist` value: everything before the first
/// `[` or whitespace, sanitized.
fn requirement_name(requirement: &str) -> Option<PackageName> {
    let end = requirement
        .find(|c: char| c == '[' || c.is_whitespace())
        .unwrap_or(requirement.len());
    PackageName::new(&requirement[..end])
}

/// Extracts dependency names from a metadata document, in declaration order.
///
/// With `include_extras == false`, core-metadata requirements guarded by an
/// `extra == ...` marker are dropped. `requires.txt` carries no such marker,
/// so every line that sanitizes to a non-empty name is kept.
pub fn parse_dependencies(text: &str, kind: MetadataKind, include_extras: bool) -> Vec<PackageName> {
    match kind {
        MetadataKind::CoreMetadata => requires_dist_values(text)
            .filter(|value| include_extras || !is_extra_only(value))
            .filter_map(requirement_name)
            .collect(),
        MetadataKind::RequiresTxt => text
            .lines()
            .filter_map(PackageName::new)
            .collect(),
    }
}
