//! Core metadata from zip artifacts.

use crate::harvest::traits::{safe_child, ExtractedEntry, ExtractionError, MetadataDocument};
use crate::parser::MetadataKind;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, warn};
use zip::ZipArchive;

/// Member name suffix of a wheel's core metadata file.
pub const METADATA_SUFFIX: &str = ".dist-info/METADATA";

/// Finds the first `*.dist-info/METADATA` member, writes it under
/// `work_dir` mirroring its archive path, and returns its text.
pub fn extract_core_metadata(
    archive_path: &Path,
    work_dir: &Path,
) -> Result<Option<MetadataDocument>, ExtractionError> {
    let file = BufReader::new(File::open(archive_path)?);
    let mut archive = ZipArchive::new(file)?;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        if !entry.name().ends_with(METADATA_SUFFIX) {
            continue;
        }

        let member = entry.name().to_string();
        let Some(relative) = entry.enclosed_name() else {
            warn!(member = %member, "Skipping metadata member with unsafe path");
            continue;
        };
        let dest = safe_child(work_dir, &relative)?;
        let top_dir = relative
            .components()
            .next()
            .map(|first| work_dir.join(first.as_os_str()))
            .filter(|dir| *dir != dest);

        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes)?;

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&dest, &bytes)?;
        debug!(member = %member, path = %dest.display(), "Extracted core metadata");

        return Ok(Some(MetadataDocument {
            kind: MetadataKind::CoreMetadata,
            member,
            text: String::from_utf8_lossy(&bytes).into_owned(),
            extracted: Some(ExtractedEntry {
                path: dest,
                top_dir,
            }),
        }));
    }

    Ok(None)
}
