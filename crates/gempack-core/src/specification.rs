//! Package metadata documents.
//!
//! The archive engine does not interpret metadata beyond the signer
//! certificate chain. It hands the gunzipped `metadata.gz` bytes to a
//! [`Specification`] implementation and compares parsed documents by value.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::trust::Certificate;

/// A metadata document stored in `metadata.gz`.
pub trait Specification: Clone + fmt::Debug + PartialEq + Sized {
    /// Parse or serialization failure.
    type Error: fmt::Display;

    /// Parses the decompressed metadata bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if `bytes` is not a valid document.
    fn from_bytes(bytes: &[u8]) -> Result<Self, Self::Error>;

    /// Serializes the document to the bytes stored (before gzip) in
    /// `metadata.gz`.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be serialized.
    fn to_bytes(&self) -> Result<Vec<u8>, Self::Error>;

    /// Signer certificates, leaf first. Empty for unsigned packages.
    fn cert_chain(&self) -> &[Certificate] {
        &[]
    }
}

/// YAML package metadata.
///
/// # Examples
///
/// ```
/// use gempack_core::{PackageSpec, Specification};
///
/// let spec = PackageSpec::new("a", "2").with_files(["lib/code.rb"]);
/// let yaml = spec.to_bytes().unwrap();
/// assert_eq!(PackageSpec::from_bytes(&yaml).unwrap(), spec);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageSpec {
    /// Package name.
    pub name: String,

    /// Version string, uninterpreted.
    pub version: String,

    /// One-line description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    /// Files shipped in `data.tar.gz`.
    #[serde(default)]
    pub files: Vec<String>,

    /// Signer certificate chain, leaf first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cert_chain: Vec<Certificate>,
}

impl PackageSpec {
    /// Creates a spec with no files and no signer.
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            summary: None,
            files: Vec::new(),
            cert_chain: Vec::new(),
        }
    }

    /// Sets the file list.
    #[must_use]
    pub fn with_files<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.files = files.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the summary.
    #[must_use]
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Sets the signer certificate chain.
    #[must_use]
    pub fn with_cert_chain(mut self, chain: Vec<Certificate>) -> Self {
        self.cert_chain = chain;
        self
    }

    /// `name-version`.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}-{}", self.name, self.version)
    }
}

impl Specification for PackageSpec {
    type Error = serde_yaml::Error;

    fn from_bytes(bytes: &[u8]) -> Result<Self, Self::Error> {
        serde_yaml::from_slice(bytes)
    }

    fn to_bytes(&self) -> Result<Vec<u8>, Self::Error> {
        serde_yaml::to_string(self).map(String::into_bytes)
    }

    fn cert_chain(&self) -> &[Certificate] {
        &self.cert_chain
    }
}
