//! Where a package's bytes come from.

use std::fs::File;
use std::io::BufRead;
use std::io::BufReader;
use std::io::Read;
use std::path::Path;
use std::path::PathBuf;

use flate2::bufread::GzDecoder;

use crate::FormatError;
use crate::tar::TarReader;

/// First two bytes of every gzip member.
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Checksum assignment that opens every legacy package preamble.
const LEGACY_MARKER: &[u8] = b"MD5SUM =";

/// How far into the stream [`LEGACY_MARKER`] may appear.
const LEGACY_MARKER_WINDOW: usize = 20;

/// Backing store of a [`Package`](super::Package).
///
/// Nothing is opened until an operation needs the archive; every operation
/// opens a fresh stream.
#[derive(Debug, Clone)]
pub enum PackageSource {
    /// A package file on disk.
    Path(PathBuf),
    /// A package held in memory.
    Memory {
        /// Identifier used in error messages.
        label: String,
        /// Raw archive bytes.
        bytes: Vec<u8>,
    },
}

impl PackageSource {
    /// Identifier used in error messages.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Path(path) => path.display().to_string(),
            Self::Memory { label, .. } => label.clone(),
        }
    }

    /// Raw byte stream of the package.
    pub(crate) fn reader(&self) -> Result<Box<dyn BufRead + '_>, FormatError> {
        Ok(match self {
            Self::Path(path) => Box::new(BufReader::new(self.open_file(path)?)),
            Self::Memory { bytes, .. } => Box::new(bytes.as_slice()),
        })
    }

    /// Whether the package uses the legacy pre-tar layout.
    ///
    /// A source that cannot be read is not legacy; the tar path reports the
    /// failure.
    pub(crate) fn is_legacy(&self) -> bool {
        let Ok(mut stream) = self.reader() else {
            return false;
        };
        stream.fill_buf().is_ok_and(|head| {
            head[..head.len().min(LEGACY_MARKER_WINDOW)]
                .windows(LEGACY_MARKER.len())
                .any(|window| window == LEGACY_MARKER)
        })
    }

    /// Opens the outer archive, transparently gunzipping it when the stream
    /// starts with the gzip magic.
    pub(crate) fn open(&self) -> Result<TarReader<Box<dyn Read + '_>>, FormatError> {
        let mut stream = self.reader()?;
        let gzipped = stream
            .fill_buf()
            .map_err(|cause| FormatError::Unreadable {
                archive: self.label(),
                cause,
            })?
            .starts_with(&GZIP_MAGIC);

        let stream: Box<dyn Read + '_> = if gzipped {
            tracing::trace!(archive = %self.label(), "outer archive is gzip-compressed");
            Box::new(GzDecoder::new(stream))
        } else {
            Box::new(stream)
        };
        Ok(TarReader::new(stream))
    }

    fn open_file(&self, path: &Path) -> Result<File, FormatError> {
        File::open(path).map_err(|cause| FormatError::Unreadable {
            archive: self.label(),
            cause,
        })
    }
}

impl From<PathBuf> for PackageSource {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<&Path> for PackageSource {
    fn from(path: &Path) -> Self {
        Self::Path(path.to_path_buf())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::tar::TarWriter;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;
    use tempfile::TempDir;

    fn plain_tar() -> Vec<u8> {
        let mut tar = TarWriter::new(Vec::new());
        tar.add_bytes("metadata.gz", 0o644, b"x").unwrap();
        tar.finish().unwrap()
    }

    fn first_name(source: &PackageSource) -> Option<String> {
        let mut reader = source.open().unwrap();
        reader.next_entry().unwrap().map(|entry| entry.name().to_string())
    }

    #[test]
    fn test_plain_and_gzip_outer() {
        let plain = PackageSource::Memory {
            label: "plain.gem".to_string(),
            bytes: plain_tar(),
        };
        assert_eq!(first_name(&plain).as_deref(), Some("metadata.gz"));

        let mut gz = GzEncoder::new(Vec::new(), Compression::default());
        gz.write_all(&plain_tar()).unwrap();
        let gzipped = PackageSource::Memory {
            label: "gz.gem".to_string(),
            bytes: gz.finish().unwrap(),
        };
        assert_eq!(first_name(&gzipped).as_deref(), Some("metadata.gz"));
    }

    #[test]
    fn test_empty_source_has_no_entries() {
        let empty = PackageSource::Memory {
            label: "empty.gem".to_string(),
            bytes: Vec::new(),
        };
        assert!(first_name(&empty).is_none());
    }

    #[test]
    fn test_legacy_detection() {
        let legacy = PackageSource::Memory {
            label: "old.gem".to_string(),
            bytes: b"MD5SUM = \"abc\"\n__END__\n".to_vec(),
        };
        assert!(legacy.is_legacy());

        let tar = PackageSource::Memory {
            label: "new.gem".to_string(),
            bytes: plain_tar(),
        };
        assert!(!tar.is_legacy());

        let late = PackageSource::Memory {
            label: "late.gem".to_string(),
            bytes: format!("{}MD5SUM = \"abc\"\n", " ".repeat(20)).into_bytes(),
        };
        assert!(!late.is_legacy());
        assert!(!PackageSource::from(PathBuf::from("/nonexistent/a.gem")).is_legacy());
    }

    #[test]
    fn test_missing_file_is_unreadable() {
        let temp = TempDir::new().unwrap();
        let source = PackageSource::from(temp.path().join("nonexistent.gem"));
        let Err(err) = source.open() else {
            panic!("opening a missing file should fail");
        };
        assert!(matches!(err, FormatError::Unreadable { .. }));
        assert!(err.to_string().ends_with("nonexistent.gem"));
    }
}
