//! Metadata extraction strategies, one per container family.
//!
//! - [`wheel`]: zip artifacts (wheels, eggs, unrecognized links)
//! - [`sdist`]: gzip- or bzip2-compressed tar source archives

pub mod sdist;
pub mod wheel;

use crate::harvest::traits::{ExtractionError, MetadataDocument};
use crate::model::ArtifactFormat;
use std::path::Path;

/// Reads the dependency metadata document out of a downloaded artifact.
///
/// Returns `Ok(None)` when the archive holds no matching member.
///
/// # Errors
///
/// Returns [`ExtractionError`] if the archive cannot be read or the
/// metadata file cannot be written to `work_dir`.
pub fn extract_metadata(
    archive: &Path,
    format: ArtifactFormat,
    work_dir: &Path,
) -> Result<Option<MetadataDocument>, ExtractionError> {
    match format {
        ArtifactFormat::WheelLike | ArtifactFormat::Unknown => {
            wheel::extract_core_metadata(archive, work_dir)
        }
        ArtifactFormat::SourceArchive(compression) => sdist::read_requires(archive, compression),
    }
}

/// Builders for small artifacts used across unit tests.
#[cfg(test)]
pub(crate) mod testutil {
    use crate::model::TarCompression;
    use std::fs::File;
    use std::io::Write;
    use std::path::Path;
    use zip::write::SimpleFileOptions;

    pub fn write_wheel(path: &Path, entries: &[(&str, &str)]) {
        let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
        for (name, contents) in entries {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(contents.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    pub fn write_sdist(path: &Path, compression: TarCompression, entries: &[(&str, &str)]) {
        let mut tar_bytes = Vec::new();
        {
            let mut builder = tar::Builder::new(&mut tar_bytes);
            for (name, contents) in entries {
                let mut header = tar::Header::new_gnu();
                header.set_path(name).unwrap();
                header.set_size(contents.len() as u64);
                header.set_mode(0o644);
                header.set_cksum();
                builder.append(&header, contents.as_bytes()).unwrap();
            }
            builder.finish().unwrap();
        }

        let file = File::create(path).unwrap();
        match compression {
            TarCompression::Gzip => {
                let mut encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
                encoder.write_all(&tar_bytes).unwrap();
                encoder.finish().unwrap();
            }
            TarCompression::Bzip2 => {
                let mut encoder = bzip2::write::BzEncoder::new(file, bzip2::Compression::default());
                encoder.write_all(&tar_bytes).unwrap();
                encoder.finish().unwrap();
            }
        }
    }
}
