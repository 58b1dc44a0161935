//! Writing `data.tar.gz` entries to disk.

use std::fs;
use std::fs::File;
use std::io;
use std::io::BufWriter;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::time::Instant;

use flate2::read::GzDecoder;

use crate::ExtractionReport;
use crate::FormatError;
use crate::PackageConfig;
use crate::Result;
use crate::security::apply_mode;
use crate::security::install_location;
use crate::tar::EntryKind;
use crate::tar::TarError;
use crate::tar::TarReader;

/// Extracts every entry of the gzip tar stream `reader` below `destination`.
///
/// `archive` names the package in error messages.
pub(crate) fn extract_tar_gz<R: Read>(
    reader: R,
    destination: &Path,
    config: &PackageConfig,
    archive: &str,
) -> Result<ExtractionReport> {
    let start = Instant::now();
    let mut report = ExtractionReport::new();

    fs::create_dir_all(destination)?;

    // A read-only directory mode would block the files written into it.
    let mut directory_modes: Vec<(PathBuf, u32)> = Vec::new();

    let mut tar = TarReader::new(GzDecoder::new(reader));
    while let Some(mut entry) = tar
        .next_entry()
        .map_err(|err| FormatError::from_data_tar(&err, archive))?
    {
        let header = entry.header().clone();
        match header.kind() {
            EntryKind::Directory => {
                let path = install_location(header.name(), destination)?;
                fs::create_dir_all(&path)?;
                if config.preserve_permissions {
                    directory_modes.push((path, header.mode()));
                }
                report.directories_created += 1;
                tracing::debug!(entry = header.name(), "created directory");
            }
            EntryKind::File => {
                if header.size() > config.max_file_size {
                    return Err(FormatError::EntryTooLarge {
                        archive: archive.to_string(),
                        name: header.name().to_string(),
                        size: header.size(),
                        max: config.max_file_size,
                    }
                    .into());
                }

                let path = install_location(header.name(), destination)?;
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)?;
                }

                let mut out = BufWriter::new(File::create(&path)?);
                let written = copy_entry(&mut entry, &mut out, archive)?;
                out.flush()?;
                drop(out);

                if config.preserve_permissions {
                    apply_mode(&path, header.mode())?;
                }
                report.files_extracted += 1;
                report.bytes_written += written;
                tracing::debug!(entry = header.name(), bytes = written, "extracted file");
            }
            EntryKind::Other(flag) => {
                let message = format!(
                    "skipped {}: unsupported entry type '{}'",
                    header.name(),
                    char::from(flag)
                );
                tracing::warn!(archive, "{message}");
                report.add_warning(message);
            }
        }
    }

    directory_modes.sort_by_key(|(path, _)| std::cmp::Reverse(path.components().count()));
    for (path, mode) in &directory_modes {
        apply_mode(path, *mode)?;
    }

    report.duration = start.elapsed();
    tracing::info!(
        archive,
        destination = %destination.display(),
        files = report.files_extracted,
        directories = report.directories_created,
        bytes = report.bytes_written,
        "extraction complete"
    );
    Ok(report)
}

/// Copies an entry to `out`, keeping read failures (a damaged archive) apart
/// from write failures (the filesystem).
pub(super) fn copy_entry<R: Read, W: Write>(entry: &mut R, out: &mut W, archive: &str) -> Result<u64> {
    let mut buf = [0u8; 8192];
    let mut total = 0u64;
    loop {
        let read = match entry.read(&mut buf) {
            Ok(0) => return Ok(total),
            Ok(read) => read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => {
                return Err(FormatError::from_data_tar(&TarError::from(err), archive).into());
            }
        };
        out.write_all(&buf[..read])?;
        total += read as u64;
    }
}
