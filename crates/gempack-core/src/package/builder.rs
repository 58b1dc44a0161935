//! Assembling package archives.

use std::fs;
use std::io::Write;
use std::path::Path;

use ed25519_dalek::SigningKey;
use flate2::Compression;
use flate2::write::GzEncoder;

use super::DATA_ENTRY;
use super::METADATA_ENTRY;
use super::SIGNATURE_SUFFIX;
use crate::PackageError;
use crate::PackageSpec;
use crate::Result;
use crate::TrustError;
use crate::specification::Specification;
use crate::tar::TarWriter;
use crate::tar::header::MODE_MASK;
use crate::trust::DigestAlgorithm;
use crate::trust::sign_digest;

/// Mode of the outer archive's entries.
const ENTRY_MODE: u32 = 0o444;

#[derive(Debug, Clone)]
enum DataEntry {
    File { name: String, mode: u32, contents: Vec<u8> },
    Directory { name: String, mode: u32 },
}

/// Builds a package archive from a spec and a list of files.
///
/// The result is a gzip-compressed tar holding `data.tar.gz` then
/// `metadata.gz`. When a signing key is set, each entry is followed by its
/// `.sig` entry; the key must belong to the leaf of the spec's certificate
/// chain.
///
/// # Examples
///
/// ```
/// use gempack_core::{Package, PackageBuilder, PackageSpec};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let spec = PackageSpec::new("a", "2").with_files(["lib/code.rb"]);
/// let bytes = PackageBuilder::new(spec.clone())
///     .add_file("lib/code.rb", 0o644, "puts 'hi'")
///     .build()?;
///
/// let mut package = Package::from_bytes("a-2.gem", bytes);
/// package.verify()?;
/// assert_eq!(package.spec()?, &spec);
/// assert_eq!(package.contents()?, ["lib/code.rb"]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct PackageBuilder<S: Specification = PackageSpec> {
    spec: S,
    entries: Vec<DataEntry>,
    signer: Option<SigningKey>,
    digest_algorithm: DigestAlgorithm,
}

impl<S: Specification> PackageBuilder<S> {
    /// Starts a package described by `spec`.
    #[must_use]
    pub fn new(spec: S) -> Self {
        Self {
            spec,
            entries: Vec::new(),
            signer: None,
            digest_algorithm: DigestAlgorithm::default(),
        }
    }

    /// Adds a file with the given permission bits.
    #[must_use]
    pub fn add_file(mut self, name: impl Into<String>, mode: u32, contents: impl Into<Vec<u8>>) -> Self {
        self.entries.push(DataEntry::File {
            name: name.into(),
            mode: mode & MODE_MASK,
            contents: contents.into(),
        });
        self
    }

    /// Adds a directory entry.
    #[must_use]
    pub fn add_directory(mut self, name: impl Into<String>, mode: u32) -> Self {
        self.entries.push(DataEntry::Directory {
            name: name.into(),
            mode: mode & MODE_MASK,
        });
        self
    }

    /// Adds the file at `path` under `name`, keeping its permission bits.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read.
    pub fn add_path(self, name: impl Into<String>, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read(path)?;
        let mode = file_mode(path)?;
        Ok(self.add_file(name, mode, contents))
    }

    /// Signs the package with `key`.
    #[must_use]
    pub fn sign_with(mut self, key: SigningKey) -> Self {
        self.signer = Some(key);
        self
    }

    /// Digest used for signing. Must match the verifier's configuration.
    #[must_use]
    pub const fn with_digest_algorithm(mut self, algorithm: DigestAlgorithm) -> Self {
        self.digest_algorithm = algorithm;
        self
    }

    /// Writes the package to memory.
    ///
    /// # Errors
    ///
    /// - [`TrustError::Certificate`] if a signing key is set but the spec has
    ///   no certificate chain, or the key does not match its leaf
    /// - [`PackageError::Build`] if the spec cannot be serialized or an entry
    ///   name cannot be stored
    pub fn build(&self) -> Result<Vec<u8>> {
        self.check_signer()?;

        let data = self.data_tar_gz()?;
        let metadata = gzip(
            &self
                .spec
                .to_bytes()
                .map_err(|err| PackageError::Build {
                    reason: format!("cannot serialize metadata: {err}"),
                })?,
        )?;

        let mut outer = TarWriter::new(GzEncoder::new(Vec::new(), Compression::default()));
        for (name, bytes) in [(DATA_ENTRY, &data), (METADATA_ENTRY, &metadata)] {
            outer.add_bytes(name, ENTRY_MODE, bytes)?;
            if let Some(key) = &self.signer {
                let signature = sign_digest(key, &self.digest_algorithm.digest(bytes));
                outer.add_bytes(&format!("{name}{SIGNATURE_SUFFIX}"), ENTRY_MODE, &signature)?;
            }
        }
        let bytes = outer.finish()?.finish()?;

        tracing::debug!(
            entries = self.entries.len(),
            signed = self.signer.is_some(),
            bytes = bytes.len(),
            "package built"
        );
        Ok(bytes)
    }

    /// Writes the package to `path`.
    ///
    /// # Errors
    ///
    /// See [`PackageBuilder::build`]; also fails if the file cannot be
    /// written.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, self.build()?)?;
        Ok(())
    }

    fn check_signer(&self) -> Result<()> {
        let Some(key) = &self.signer else {
            return Ok(());
        };
        let Some(leaf) = self.spec.cert_chain().first() else {
            return Err(TrustError::Certificate {
                message: "cannot sign a package whose metadata has no certificate chain".to_string(),
            }
            .into());
        };
        if leaf.public_key() != key.verifying_key().as_bytes() {
            return Err(TrustError::Certificate {
                message: format!("signing key does not match certificate {}", leaf.subject()),
            }
            .into());
        }
        Ok(())
    }

    fn data_tar_gz(&self) -> Result<Vec<u8>> {
        let mut tar = TarWriter::new(GzEncoder::new(Vec::new(), Compression::default()));
        for entry in &self.entries {
            match entry {
                DataEntry::File { name, mode, contents } => tar.add_bytes(name, *mode, contents)?,
                DataEntry::Directory { name, mode } => tar.add_directory(name, *mode)?,
            }
        }
        Ok(tar.finish()?.finish()?)
    }
}

fn gzip(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut gz = GzEncoder::new(Vec::new(), Compression::default());
    gz.write_all(bytes)?;
    Ok(gz.finish()?)
}

#[cfg(unix)]
fn file_mode(path: &Path) -> Result<u32> {
    use std::os::unix::fs::PermissionsExt;
    Ok(fs::metadata(path)?.permissions().mode() & MODE_MASK)
}

#[cfg(not(unix))]
fn file_mode(path: &Path) -> Result<u32> {
    let readonly = fs::metadata(path)?.permissions().readonly();
    Ok(if readonly { 0o444 } else { 0o644 })
}
