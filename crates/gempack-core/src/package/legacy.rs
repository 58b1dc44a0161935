//! Reader for the legacy pre-tar package layout.
//!
//! A legacy package is line oriented: a script preamble that ends with an
//! `__END__` line, the YAML metadata, a `---` line, a YAML table of files,
//! another `---` line, then the zlib-deflated contents of each file back to
//! back in table order. The layout has no place for signatures.

use std::fs;
use std::fs::File;
use std::io;
use std::io::BufRead;
use std::io::BufWriter;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::time::Instant;

use flate2::read::ZlibDecoder;
use serde::Deserialize;

use super::PackageSource;
use super::extract::copy_entry;
use super::parse_spec;
use crate::ExtractionReport;
use crate::FormatError;
use crate::PackageConfig;
use crate::Result;
use crate::security::apply_mode;
use crate::security::install_location;
use crate::specification::Specification;
use crate::tar::header::MODE_MASK;

const PREAMBLE_END: &[u8] = b"__END__";
const SECTION_END: &str = "---";

/// One row of the file table.
#[derive(Debug, Deserialize)]
struct LegacyFile {
    path: String,
    mode: u32,
    /// Size of the deflated body.
    size: u64,
}

/// Parses the metadata section.
pub(crate) fn read_spec<S: Specification>(source: &PackageSource, config: &PackageConfig) -> Result<S> {
    let archive = source.label();
    let mut reader = source.reader()?;
    skip_preamble(&mut reader, config, &archive)?;
    let yaml = read_section(&mut reader, config, &archive, "metadata")?;
    tracing::debug!(archive = %archive, "legacy metadata loaded");
    parse_spec(yaml.as_bytes(), &archive)
}

/// File names listed in the file table, in table order.
pub(crate) fn contents(source: &PackageSource, config: &PackageConfig) -> Result<Vec<String>> {
    let archive = source.label();
    let mut reader = source.reader()?;
    let table = read_table(&mut reader, config, &archive)?;
    Ok(table.into_iter().map(|file| file.path).collect())
}

/// Inflates every file in the table below `destination`.
pub(crate) fn extract_files(
    source: &PackageSource,
    destination: &Path,
    config: &PackageConfig,
) -> Result<ExtractionReport> {
    let start = Instant::now();
    let archive = source.label();
    let mut reader = source.reader()?;
    let table = read_table(&mut reader, config, &archive)?;

    let mut report = ExtractionReport::new();
    fs::create_dir_all(destination)?;

    for file in &table {
        let path = install_location(&file.path, destination)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut body = (&mut reader).take(file.size);
        let mut out = BufWriter::new(File::create(&path)?);
        let written = {
            let mut inflated = ZlibDecoder::new(&mut body).take(config.max_file_size.saturating_add(1));
            copy_entry(&mut inflated, &mut out, &archive)?
        };
        out.flush()?;
        drop(out);

        if written > config.max_file_size {
            fs::remove_file(&path)?;
            return Err(FormatError::EntryTooLarge {
                archive,
                name: file.path.clone(),
                size: written,
                max: config.max_file_size,
            }
            .into());
        }

        // Trailing bytes after the deflate stream belong to this body.
        io::copy(&mut body, &mut io::sink()).map_err(|_| data_missing(&archive))?;
        if body.limit() > 0 {
            return Err(data_missing(&archive).into());
        }

        if config.preserve_permissions {
            apply_mode(&path, file.mode & MODE_MASK)?;
        }
        report.files_extracted += 1;
        report.bytes_written += written;
        tracing::debug!(entry = %file.path, bytes = written, "extracted legacy file");
    }

    report.duration = start.elapsed();
    tracing::info!(
        archive = %archive,
        destination = %destination.display(),
        files = report.files_extracted,
        bytes = report.bytes_written,
        "legacy extraction complete"
    );
    Ok(report)
}

fn read_table<R: BufRead>(reader: &mut R, config: &PackageConfig, archive: &str) -> Result<Vec<LegacyFile>> {
    skip_preamble(reader, config, archive)?;
    read_section(reader, config, archive, "metadata")?;
    let yaml = read_section(reader, config, archive, "file table")?;
    if yaml.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_yaml::from_str(&yaml).map_err(|err| {
        FormatError::InvalidMetadata {
            archive: archive.to_string(),
            reason: format!("file table: {err}"),
        }
        .into()
    })
}

/// Consumes lines up to and including `__END__`.
fn skip_preamble<R: BufRead>(reader: &mut R, config: &PackageConfig, archive: &str) -> Result<()> {
    let mut consumed = 0u64;
    let mut line = Vec::new();
    while consumed < config.max_metadata_size {
        line.clear();
        let read = (&mut *reader)
            .take(config.max_metadata_size - consumed)
            .read_until(b'\n', &mut line)
            .map_err(|_| metadata_missing(archive))?;
        if read == 0 {
            break;
        }
        consumed += read as u64;
        if line.trim_ascii_end() == PREAMBLE_END {
            return Ok(());
        }
    }
    Err(metadata_missing(archive).into())
}

/// Reads lines up to a `---` line or the end of the stream.
fn read_section<R: BufRead>(reader: &mut R, config: &PackageConfig, archive: &str, what: &str) -> Result<String> {
    let limit = config.max_metadata_size;
    let mut section = String::new();
    let mut line = String::new();
    loop {
        line.clear();
        let budget = limit.saturating_add(1).saturating_sub(section.len() as u64);
        let read = (&mut *reader)
            .take(budget)
            .read_line(&mut line)
            .map_err(|err| FormatError::InvalidMetadata {
                archive: archive.to_string(),
                reason: format!("{what}: {err}"),
            })?;
        if read == 0 || line.trim() == SECTION_END {
            return Ok(section);
        }
        section.push_str(&line);

        let size = section.len() as u64;
        if size > limit {
            return Err(FormatError::EntryTooLarge {
                archive: archive.to_string(),
                name: what.to_string(),
                size,
                max: limit,
            }
            .into());
        }
    }
}

fn metadata_missing(archive: &str) -> FormatError {
    FormatError::MetadataMissing {
        archive: archive.to_string(),
    }
}

fn data_missing(archive: &str) -> FormatError {
    FormatError::DataMissing {
        archive: archive.to_string(),
    }
}
