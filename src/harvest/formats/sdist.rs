//! `requires.txt` from compressed tar source archives.

use crate::harvest::traits::{ExtractionError, MetadataDocument};
use crate::model::TarCompression;
use crate::parser::MetadataKind;
use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tar::Archive;
use tracing::debug;

/// Member name suffix of an sdist's dependency listing.
pub const REQUIRES_SUFFIX: &str = ".egg-info/requires.txt";

/// Streams the archive and returns the text of the last
/// `*.egg-info/requires.txt` member. Nothing is written to disk.
pub fn read_requires(
    archive_path: &Path,
    compression: TarCompression,
) -> Result<Option<MetadataDocument>, ExtractionError> {
    let file = BufReader::new(File::open(archive_path)?);
    let decoder: Box<dyn Read> = match compression {
        TarCompression::Gzip => Box::new(GzDecoder::new(file)),
        TarCompression::Bzip2 => Box::new(BzDecoder::new(file)),
    };
    let mut archive = Archive::new(decoder);

    let mut found = None;
    for entry in archive.entries()? {
        let mut entry = entry?;
        let member = entry.path()?.to_string_lossy().into_owned();
        if !member.ends_with(REQUIRES_SUFFIX) {
            continue;
        }

        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes)?;
        debug!(member = %member, "Found requires.txt");

        found = Some(MetadataDocument {
            kind: MetadataKind::RequiresTxt,
            member,
            text: String::from_utf8_lossy(&bytes).into_owned(),
            extracted: None,
        });
    }

    Ok(found)
}
