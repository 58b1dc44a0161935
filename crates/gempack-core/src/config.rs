//! Package handling configuration.

use crate::trust::DigestAlgorithm;

/// Limits and options applied when reading and extracting packages.
///
/// # Examples
///
/// ```
/// use gempack_core::PackageConfig;
/// use gempack_core::trust::DigestAlgorithm;
///
/// let config = PackageConfig::default()
///     .with_digest_algorithm(DigestAlgorithm::Sha512)
///     .with_max_file_size(10 * 1024 * 1024);
///
/// assert_eq!(config.max_file_size, 10 * 1024 * 1024);
/// assert!(config.preserve_permissions);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageConfig {
    /// Digest used for every entry during verification.
    pub digest_algorithm: DigestAlgorithm,

    /// Maximum decompressed size of `metadata.gz` in bytes.
    pub max_metadata_size: u64,

    /// Maximum size of a single extracted file in bytes.
    pub max_file_size: u64,

    /// Apply the stored permission bits to extracted files.
    pub preserve_permissions: bool,
}

impl Default for PackageConfig {
    /// Default values:
    /// - `digest_algorithm`: SHA-256
    /// - `max_metadata_size`: 1 MB
    /// - `max_file_size`: 50 MB
    /// - `preserve_permissions`: true
    fn default() -> Self {
        Self {
            digest_algorithm: DigestAlgorithm::Sha256,
            max_metadata_size: 1024 * 1024,  // 1 MB
            max_file_size: 50 * 1024 * 1024, // 50 MB
            preserve_permissions: true,
        }
    }
}

impl PackageConfig {
    /// Sets the digest algorithm.
    #[must_use]
    pub const fn with_digest_algorithm(mut self, algorithm: DigestAlgorithm) -> Self {
        self.digest_algorithm = algorithm;
        self
    }

    /// Sets the metadata size limit.
    #[must_use]
    pub const fn with_max_metadata_size(mut self, bytes: u64) -> Self {
        self.max_metadata_size = bytes;
        self
    }

    /// Sets the per-file size limit.
    #[must_use]
    pub const fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    /// Controls whether stored modes are applied on extraction.
    #[must_use]
    pub const fn with_preserve_permissions(mut self, preserve: bool) -> Self {
        self.preserve_permissions = preserve;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PackageConfig::default();
        assert_eq!(config.digest_algorithm, DigestAlgorithm::Sha256);
        assert_eq!(config.max_metadata_size, 1024 * 1024);
        assert_eq!(config.max_file_size, 50 * 1024 * 1024);
        assert!(config.preserve_permissions);
    }

    #[test]
    fn test_with_methods() {
        let config = PackageConfig::default()
            .with_digest_algorithm(DigestAlgorithm::Sha512)
            .with_max_metadata_size(16)
            .with_max_file_size(32)
            .with_preserve_permissions(false);
        assert_eq!(config.digest_algorithm, DigestAlgorithm::Sha512);
        assert_eq!(config.max_metadata_size, 16);
        assert_eq!(config.max_file_size, 32);
        assert!(!config.preserve_permissions);
    }

    #[test]
    fn test_struct_update_syntax() {
        let config = PackageConfig {
            max_file_size: 1,
            ..Default::default()
        };
        assert_eq!(config.max_file_size, 1);
        assert!(config.preserve_permissions);
    }
}
