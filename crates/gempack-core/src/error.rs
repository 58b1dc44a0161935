//! Error types for package archive operations.
//!
//! Every failure surfaced by a [`Package`](crate::Package) operation is one of
//! three kinds: the archive is structurally unusable ([`FormatError`]), an
//! entry would land outside the destination root ([`PackageError::Path`]), or
//! a security policy check failed ([`TrustError`]). Messages are intended to
//! be shown to end users verbatim.

use std::path::PathBuf;
use thiserror::Error;

use crate::tar::TarError;

/// Result type alias using `PackageError`.
pub type Result<T> = std::result::Result<T, PackageError>;

/// Broad classification of a [`PackageError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The archive is absent, empty, truncated, or malformed.
    Format,
    /// An entry would be written outside the destination root.
    Path,
    /// A security policy check failed.
    Trust,
    /// A filesystem operation failed while extracting.
    Io,
    /// A package could not be assembled.
    Build,
}

/// Archive is absent, empty, truncated, or structurally invalid.
///
/// Every variant names the archive it was raised for.
#[derive(Error, Debug)]
pub enum FormatError {
    /// A tar header name field contains an embedded null byte.
    #[error("tar is corrupt, name contains null byte in {archive}")]
    NullByteInName {
        /// Archive identifier.
        archive: String,
    },

    /// The archive ended before a `metadata.gz` entry was found.
    #[error("package metadata is missing in {archive}")]
    MetadataMissing {
        /// Archive identifier.
        archive: String,
    },

    /// The archive has no `data.tar.gz` entry.
    #[error("package data is missing in {archive}")]
    DataMissing {
        /// Archive identifier.
        archive: String,
    },

    /// The archive source could not be opened.
    #[error("{} - {archive}", describe_io(.cause))]
    Unreadable {
        /// Archive identifier.
        archive: String,
        /// Underlying I/O failure.
        #[source]
        cause: std::io::Error,
    },

    /// `metadata.gz` was found but could not be decoded or parsed.
    #[error("invalid package metadata in {archive}: {reason}")]
    InvalidMetadata {
        /// Archive identifier.
        archive: String,
        /// Parser or decoder message.
        reason: String,
    },

    /// The same entry name appears more than once in the outer archive.
    #[error("duplicate entry {name} in {archive}")]
    DuplicateEntry {
        /// Archive identifier.
        archive: String,
        /// Repeated entry name.
        name: String,
    },

    /// An entry exceeds a configured size limit.
    #[error("entry {name} of {size} bytes exceeds the limit of {max} bytes in {archive}")]
    EntryTooLarge {
        /// Archive identifier.
        archive: String,
        /// Entry name.
        name: String,
        /// Declared or decoded size.
        size: u64,
        /// Configured maximum.
        max: u64,
    },
}

impl FormatError {
    /// Maps a low-level tar failure into the archive-level format error.
    ///
    /// Null bytes keep their own message; every other structural or I/O
    /// problem while scanning means the metadata could not be reached.
    pub(crate) fn from_tar(err: &TarError, archive: &str) -> Self {
        match err {
            TarError::NullByteInName => Self::NullByteInName {
                archive: archive.to_string(),
            },
            _ => Self::MetadataMissing {
                archive: archive.to_string(),
            },
        }
    }

    /// Like [`FormatError::from_tar`], for failures while reading
    /// `data.tar.gz` or scanning for it.
    pub(crate) fn from_data_tar(err: &TarError, archive: &str) -> Self {
        match err {
            TarError::NullByteInName => Self::NullByteInName {
                archive: archive.to_string(),
            },
            _ => Self::DataMissing {
                archive: archive.to_string(),
            },
        }
    }
}

/// OS error text without the `(os error N)` suffix `io::Error` appends.
fn describe_io(err: &std::io::Error) -> String {
    let text = err.to_string();
    match text.rfind(" (os error ") {
        Some(idx) => text[..idx].to_string(),
        None => text,
    }
}

/// A security policy check failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrustError {
    /// The policy requires signatures but the package carries no certificate
    /// chain.
    #[error("unsigned gems are not allowed by the {policy} policy")]
    Unsigned {
        /// Display name of the active policy.
        policy: String,
    },

    /// A digested entry has no signature.
    #[error("missing signature for {name}")]
    MissingSignature {
        /// Entry name.
        name: String,
    },

    /// A signature does not match the digest and signer key.
    #[error("invalid signature for {name}")]
    InvalidSignature {
        /// Entry name.
        name: String,
    },

    /// A certificate in the chain is malformed, expired, or mis-issued.
    #[error("{message}")]
    Certificate {
        /// Human-readable description naming the certificate.
        message: String,
    },

    /// The package uses the legacy layout, which has no place for signatures.
    #[error("old format gems do not contain signatures and cannot be verified")]
    LegacyFormat,

    /// The chain does not lead to a trusted certificate.
    #[error("root certificate {subject} is not trusted")]
    Untrusted {
        /// Subject of the untrusted root.
        subject: String,
    },
}

/// Errors that can occur while reading, verifying, or extracting a package.
#[derive(Error, Debug)]
pub enum PackageError {
    /// Archive is absent, empty, truncated, or structurally invalid.
    #[error(transparent)]
    Format(#[from] FormatError),

    /// Resolved install location escapes the destination root.
    #[error("installing into parent path {} of {} is not allowed", path.display(), root.display())]
    Path {
        /// The rejected, fully resolved path.
        path: PathBuf,
        /// The destination root.
        root: PathBuf,
    },

    /// A security policy check failed.
    #[error(transparent)]
    Trust(#[from] TrustError),

    /// Filesystem operation failed during extraction.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A package could not be assembled by the builder.
    #[error("cannot build package: {reason}")]
    Build {
        /// What went wrong.
        reason: String,
    },
}

impl From<TarError> for PackageError {
    /// Writer-side conversion. Readers map tar failures to [`FormatError`]
    /// explicitly because the message depends on which entry was sought.
    fn from(err: TarError) -> Self {
        match err {
            TarError::Io(err) => Self::Io(err),
            other => Self::Build {
                reason: other.to_string(),
            },
        }
    }
}

impl PackageError {
    /// Returns the broad kind of this error.
    ///
    /// # Examples
    ///
    /// ```
    /// use gempack_core::{ErrorKind, PackageError, TrustError};
    ///
    /// let err = PackageError::from(TrustError::MissingSignature {
    ///     name: "data.tar.gz".to_string(),
    /// });
    /// assert_eq!(err.kind(), ErrorKind::Trust);
    /// ```
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Format(_) => ErrorKind::Format,
            Self::Path { .. } => ErrorKind::Path,
            Self::Trust(_) => ErrorKind::Trust,
            Self::Io(_) => ErrorKind::Io,
            Self::Build { .. } => ErrorKind::Build,
        }
    }

    /// Returns `true` if this error was raised by a security check rather
    /// than by a malformed or unreadable archive.
    #[must_use]
    pub const fn is_security_violation(&self) -> bool {
        matches!(self, Self::Path { .. } | Self::Trust(_))
    }

    /// Returns the format error, if this is one.
    #[must_use]
    pub const fn as_format(&self) -> Option<&FormatError> {
        match self {
            Self::Format(err) => Some(err),
            _ => None,
        }
    }

    /// Returns the trust error, if this is one.
    #[must_use]
    pub const fn as_trust(&self) -> Option<&TrustError> {
        match self {
            Self::Trust(err) => Some(err),
            _ => None,
        }
    }
}
