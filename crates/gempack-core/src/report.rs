//! Extraction and verification reports.

use std::time::Duration;

use crate::security::SecurityPolicy;
use crate::trust::DigestMap;

/// Report of a package extraction.
#[derive(Debug, Clone, Default)]
pub struct ExtractionReport {
    /// Number of files written.
    pub files_extracted: usize,

    /// Number of directory entries created.
    pub directories_created: usize,

    /// Total bytes written to disk.
    pub bytes_written: u64,

    /// Duration of the extraction.
    pub duration: Duration,

    /// Entries that were skipped, one message each.
    pub warnings: Vec<String>,
}

impl ExtractionReport {
    /// Creates a new empty extraction report.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a warning message to the report.
    pub fn add_warning(&mut self, message: String) {
        self.warnings.push(message);
    }

    /// Returns total number of entries materialized.
    #[must_use]
    pub const fn total_items(&self) -> usize {
        self.files_extracted + self.directories_created
    }

    /// Returns whether any warnings were generated.
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Outcome of a successful [`Package::verify`](crate::Package::verify).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationReport {
    /// Every outer entry name, sorted.
    pub files: Vec<String>,

    /// Digest of every non-signature entry.
    pub digests: DigestMap,

    /// Entries that carried a signature.
    pub signed: Vec<String>,

    /// Policy the package was checked under.
    pub policy: SecurityPolicy,
}

impl VerificationReport {
    /// Returns `true` if at least one entry was signed.
    #[must_use]
    pub fn is_signed(&self) -> bool {
        !self.signed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_report() {
        let report = ExtractionReport::new();
        assert_eq!(report.files_extracted, 0);
        assert_eq!(report.directories_created, 0);
        assert_eq!(report.bytes_written, 0);
        assert!(!report.has_warnings());
    }

    #[test]
    fn test_add_warning() {
        let mut report = ExtractionReport::new();
        report.add_warning("skipped symlink lib/link".to_string());
        assert!(report.has_warnings());
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn test_total_items() {
        let mut report = ExtractionReport::new();
        report.files_extracted = 10;
        report.directories_created = 5;
        assert_eq!(report.total_items(), 15);
    }

    #[test]
    fn test_verification_report_signed() {
        let mut report = VerificationReport {
            files: vec!["data.tar.gz".to_string(), "metadata.gz".to_string()],
            digests: DigestMap::new(),
            signed: Vec::new(),
            policy: SecurityPolicy::None,
        };
        assert!(!report.is_signed());
        report.signed.push("metadata.gz".to_string());
        assert!(report.is_signed());
    }
}
