//! Package archives.
//!
//! A package is a tar archive, usually gzip-compressed, holding two entries:
//!
//! - `metadata.gz`: the gzip-compressed [`Specification`] document
//! - `data.tar.gz`: a gzip-compressed tar of the packaged files
//!
//! A signed package also carries `metadata.gz.sig` and `data.tar.gz.sig`,
//! each an Ed25519 signature over the digest of the entry it names. The
//! signer's certificate chain travels inside the metadata.
//!
//! Packages in the legacy pre-tar layout, recognized by the `MD5SUM =` line
//! that opens them, can be read and extracted but never verified.
//!
//! # Examples
//!
//! ```no_run
//! use gempack_core::{Package, SecurityPolicy};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut package = Package::open("a-2.gem").with_security_policy(SecurityPolicy::Low);
//! package.verify()?;
//! println!("{} contains {:?}", package.spec()?.full_name(), package.contents()?);
//! package.extract_files("/srv/gems/a-2")?;
//! # Ok(())
//! # }
//! ```

mod builder;
mod extract;
mod legacy;
mod source;

pub use builder::PackageBuilder;
pub use source::PackageSource;

use std::collections::BTreeSet;
use std::io::Read;
use std::path::Path;
use std::path::PathBuf;

use chrono::DateTime;
use chrono::Utc;
use flate2::read::GzDecoder;

use crate::ExtractionReport;
use crate::FormatError;
use crate::PackageConfig;
use crate::PackageSpec;
use crate::Result;
use crate::TrustError;
use crate::VerificationReport;
use crate::security::SecurityPolicy;
use crate::specification::Specification;
use crate::tar::TarError;
use crate::tar::TarReader;
use crate::trust::DigestMap;
use crate::trust::SignatureMap;
use crate::trust::TrustStore;
use crate::trust::TrustVerifier;

/// Name of the metadata entry.
pub const METADATA_ENTRY: &str = "metadata.gz";

/// Name of the data entry.
pub const DATA_ENTRY: &str = "data.tar.gz";

/// Suffix appended to an entry name to form its signature entry.
pub const SIGNATURE_SUFFIX: &str = ".sig";

/// A package archive and the state accumulated while reading it.
///
/// Opening a package only records where it lives. Each operation reads the
/// archive from the start in a single forward pass.
#[derive(Debug)]
pub struct Package<S: Specification = PackageSpec> {
    source: PackageSource,
    spec: Option<S>,
    files: Vec<String>,
    security_policy: SecurityPolicy,
    trust_store: TrustStore,
    config: PackageConfig,
    verification_time: Option<DateTime<Utc>>,
}

impl Package {
    /// Package stored at `path`.
    ///
    /// Nothing is read until an operation needs the archive, so a missing
    /// file is reported by the first such operation.
    #[must_use]
    pub fn open(path: impl AsRef<Path>) -> Self {
        Self::from_source(PackageSource::from(path.as_ref()))
    }

    /// Package held in memory. `label` stands in for a file name in error
    /// messages.
    #[must_use]
    pub fn from_bytes(label: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self::from_source(PackageSource::Memory {
            label: label.into(),
            bytes: bytes.into(),
        })
    }
}

impl<S: Specification> Package<S> {
    /// Package over `source` whose metadata is parsed as `S`.
    #[must_use]
    pub fn from_source(source: PackageSource) -> Self {
        Self {
            source,
            spec: None,
            files: Vec::new(),
            security_policy: SecurityPolicy::None,
            trust_store: TrustStore::new(),
            config: PackageConfig::default(),
            verification_time: None,
        }
    }

    /// Sets the policy [`Package::verify`] enforces.
    #[must_use]
    pub const fn with_security_policy(mut self, policy: SecurityPolicy) -> Self {
        self.security_policy = policy;
        self
    }

    /// Sets the policy [`Package::verify`] enforces.
    pub const fn set_security_policy(&mut self, policy: SecurityPolicy) {
        self.security_policy = policy;
    }

    /// Active policy.
    #[must_use]
    pub const fn security_policy(&self) -> SecurityPolicy {
        self.security_policy
    }

    /// Replaces the trusted certificates.
    #[must_use]
    pub fn with_trust_store(mut self, store: TrustStore) -> Self {
        self.trust_store = store;
        self
    }

    /// Trusted certificates, for adding more.
    pub const fn trust_store_mut(&mut self) -> &mut TrustStore {
        &mut self.trust_store
    }

    /// Replaces the configuration.
    #[must_use]
    pub const fn with_config(mut self, config: PackageConfig) -> Self {
        self.config = config;
        self
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &PackageConfig {
        &self.config
    }

    /// Checks certificate validity at `at` instead of the current time.
    #[must_use]
    pub const fn with_verification_time(mut self, at: DateTime<Utc>) -> Self {
        self.verification_time = Some(at);
        self
    }

    /// Where the package is read from.
    #[must_use]
    pub const fn source(&self) -> &PackageSource {
        &self.source
    }

    /// Entry names seen by the last successful [`Package::verify`], sorted.
    #[must_use]
    pub fn files(&self) -> &[String] {
        &self.files
    }

    /// The package metadata, read and parsed on first use.
    ///
    /// # Errors
    ///
    /// - [`FormatError::Unreadable`] if the source cannot be opened
    /// - [`FormatError::MetadataMissing`] if the archive ends before
    ///   `metadata.gz`
    /// - [`FormatError::InvalidMetadata`] if the entry does not decode
    pub fn spec(&mut self) -> Result<&S> {
        let spec = match self.spec.take() {
            Some(spec) => spec,
            None => self.read_spec()?,
        };
        Ok(self.spec.insert(spec))
    }

    /// Installs an already-parsed spec, replacing any memoized one.
    pub fn set_spec(&mut self, spec: S) {
        self.spec = Some(spec);
    }

    /// Names of the files in `data.tar.gz`, in archive order.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::DataMissing`] if there is no data entry or it
    /// cannot be read.
    pub fn contents(&self) -> Result<Vec<String>> {
        if self.source.is_legacy() {
            return legacy::contents(&self.source, &self.config);
        }
        let archive = self.source.label();
        let mut outer = self.source.open()?;
        let data = outer
            .find_entry(DATA_ENTRY)
            .map_err(|err| FormatError::from_data_tar(&err, &archive))?;
        let Some(data) = data else {
            return Err(FormatError::DataMissing { archive }.into());
        };

        let mut inner = TarReader::new(GzDecoder::new(data));
        let mut names = Vec::new();
        while let Some(entry) = inner
            .next_entry()
            .map_err(|err| FormatError::from_data_tar(&err, &archive))?
        {
            names.push(entry.name().to_string());
        }
        Ok(names)
    }

    /// Extracts every file in `data.tar.gz` below `destination`.
    ///
    /// The destination is created even when the package holds no files.
    /// Permission bits are set to the stored mode exactly unless
    /// [`PackageConfig::preserve_permissions`] is off. Files extracted before
    /// a failing entry are left in place.
    ///
    /// # Errors
    ///
    /// - [`PackageError::Path`](crate::PackageError::Path) if an entry would
    ///   land outside `destination`
    /// - [`FormatError`] if the archive is unreadable or damaged
    /// - [`PackageError::Io`](crate::PackageError::Io) for filesystem failures
    pub fn extract_files(&self, destination: impl AsRef<Path>) -> Result<ExtractionReport> {
        if self.source.is_legacy() {
            return legacy::extract_files(&self.source, destination.as_ref(), &self.config);
        }
        let archive = self.source.label();
        let mut outer = self.source.open()?;
        let data = outer
            .find_entry(DATA_ENTRY)
            .map_err(|err| FormatError::from_data_tar(&err, &archive))?;
        let Some(data) = data else {
            return Err(FormatError::DataMissing { archive }.into());
        };
        extract::extract_tar_gz(data, destination.as_ref(), &self.config, &archive)
    }

    /// Extracts a gzip tar stream below `destination` with the same rules as
    /// [`Package::extract_files`].
    ///
    /// # Errors
    ///
    /// See [`Package::extract_files`].
    pub fn extract_tar_gz<R: Read>(&self, reader: R, destination: impl AsRef<Path>) -> Result<ExtractionReport> {
        extract::extract_tar_gz(reader, destination.as_ref(), &self.config, &self.source.label())
    }

    /// Reads the whole archive once, digesting every entry, and checks it
    /// against the security policy.
    ///
    /// On success the metadata is memoized and [`Package::files`] lists every
    /// entry name.
    ///
    /// # Errors
    ///
    /// - [`FormatError::Unreadable`] if the source cannot be opened
    /// - [`FormatError::NullByteInName`] for a corrupt entry name
    /// - [`FormatError::MetadataMissing`] if the archive is empty, truncated,
    ///   or lacks `metadata.gz`
    /// - [`FormatError::DataMissing`] if it lacks `data.tar.gz`
    /// - [`TrustError`](crate::TrustError) if the policy rejects the package,
    ///   or if the package uses the legacy layout and a policy is active
    pub fn verify(&mut self) -> Result<VerificationReport> {
        if self.source.is_legacy() {
            return self.verify_legacy();
        }
        let archive = self.source.label();
        let scan = scan(&self.source, &self.config, &archive)?;

        let Some(metadata) = scan.metadata else {
            return Err(FormatError::MetadataMissing { archive }.into());
        };
        if !scan.digests.contains_key(DATA_ENTRY) {
            return Err(FormatError::DataMissing { archive }.into());
        }
        let spec = parse_spec::<S>(&metadata, &archive)?;

        self.spec = Some(spec);
        self.files = scan.files;

        if self.security_policy.is_active() {
            self.verify_signatures(&scan.digests, &scan.signatures)?;
        }

        let signed: Vec<String> = scan
            .digests
            .keys()
            .filter(|name| scan.signatures.contains_key(*name))
            .cloned()
            .collect();
        tracing::info!(
            archive = %archive,
            policy = %self.security_policy,
            entries = self.files.len(),
            signed = signed.len(),
            "package verified"
        );

        Ok(VerificationReport {
            files: self.files.clone(),
            digests: scan.digests,
            signed,
            policy: self.security_policy,
        })
    }

    /// Checks `signatures` over `digests` against the spec's certificate
    /// chain under the active policy and trust store.
    ///
    /// Reads the spec from the archive if none is memoized.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError`](crate::TrustError) if the policy rejects the
    /// signatures, or a format error if the spec must be read and cannot be.
    pub fn verify_signatures(&mut self, digests: &DigestMap, signatures: &SignatureMap) -> Result<()> {
        self.spec()?;
        let cert_chain = self.spec.as_ref().map_or(&[][..], Specification::cert_chain);

        let mut verifier = TrustVerifier::new(&self.trust_store);
        if let Some(at) = self.verification_time {
            verifier = verifier.at(at);
        }
        verifier.verify_signatures(digests, signatures, cert_chain, self.security_policy)?;
        Ok(())
    }

    /// Resolves `file` below `destination`, rejecting escapes.
    ///
    /// # Errors
    ///
    /// Returns [`PackageError::Path`](crate::PackageError::Path) if the
    /// resolved path is outside `destination`.
    pub fn install_location(&self, file: impl AsRef<Path>, destination: impl AsRef<Path>) -> Result<PathBuf> {
        crate::security::install_location(file, destination)
    }

    /// Legacy packages carry no signatures, so only the unchecked policy
    /// accepts them. The report lists no entries.
    fn verify_legacy(&mut self) -> Result<VerificationReport> {
        if self.security_policy.is_active() {
            return Err(TrustError::LegacyFormat.into());
        }
        self.spec()?;
        self.files.clear();
        tracing::info!(archive = %self.source.label(), "legacy package accepted without verification");
        Ok(VerificationReport {
            files: Vec::new(),
            digests: DigestMap::new(),
            signed: Vec::new(),
            policy: self.security_policy,
        })
    }

    fn read_spec(&self) -> Result<S> {
        if self.source.is_legacy() {
            return legacy::read_spec(&self.source, &self.config);
        }
        let archive = self.source.label();
        let mut outer = self.source.open()?;
        let entry = outer
            .find_entry(METADATA_ENTRY)
            .map_err(|err| FormatError::from_tar(&err, &archive))?;
        let Some(mut entry) = entry else {
            return Err(FormatError::MetadataMissing { archive }.into());
        };

        check_metadata_size(entry.header().size(), &self.config, &archive)?;
        let compressed = entry
            .read_all()
            .map_err(|err| FormatError::from_tar(&err, &archive))?;
        let spec = parse_spec(&gunzip_metadata(&compressed, &self.config, &archive)?, &archive)?;
        tracing::debug!(archive = %archive, "metadata loaded");
        Ok(spec)
    }
}

/// Size of an Ed25519 signature, the largest `.sig` entry accepted.
const SIGNATURE_SIZE: u64 = ed25519_dalek::SIGNATURE_LENGTH as u64;

/// Everything a verification pass collects.
struct Scan {
    files: Vec<String>,
    digests: DigestMap,
    signatures: SignatureMap,
    metadata: Option<Vec<u8>>,
}

fn scan(source: &PackageSource, config: &PackageConfig, archive: &str) -> Result<Scan> {
    let mut outer = source.open()?;
    let mut scan = Scan {
        files: Vec::new(),
        digests: DigestMap::new(),
        signatures: SignatureMap::new(),
        metadata: None,
    };
    let mut seen = BTreeSet::new();

    while let Some(mut entry) = outer
        .next_entry()
        .map_err(|err| FormatError::from_tar(&err, archive))?
    {
        let name = entry.name().to_string();
        tracing::debug!(archive, entry = %name, size = entry.header().size(), "verifying entry");

        if !seen.insert(name.clone()) {
            return Err(FormatError::DuplicateEntry {
                archive: archive.to_string(),
                name,
            }
            .into());
        }

        if let Some(signed) = name.strip_suffix(SIGNATURE_SUFFIX) {
            let size = entry.header().size();
            if size > SIGNATURE_SIZE {
                return Err(FormatError::EntryTooLarge {
                    archive: archive.to_string(),
                    name,
                    size,
                    max: SIGNATURE_SIZE,
                }
                .into());
            }
            let signature = entry
                .read_all()
                .map_err(|err| FormatError::from_tar(&err, archive))?;
            scan.signatures.insert(signed.to_string(), signature);
        } else if name == METADATA_ENTRY {
            check_metadata_size(entry.header().size(), config, archive)?;
            let compressed = entry
                .read_all()
                .map_err(|err| FormatError::from_tar(&err, archive))?;
            scan.digests
                .insert(name.clone(), config.digest_algorithm.digest(&compressed));
            scan.metadata = Some(gunzip_metadata(&compressed, config, archive)?);
        } else {
            let digest = config
                .digest_algorithm
                .digest_reader(&mut entry)
                .map_err(|err| FormatError::from_tar(&TarError::from(err), archive))?;
            scan.digests.insert(name.clone(), digest);
        }
        scan.files.push(name);
    }

    scan.files.sort();
    Ok(scan)
}

fn check_metadata_size(size: u64, config: &PackageConfig, archive: &str) -> Result<()> {
    if size > config.max_metadata_size {
        return Err(FormatError::EntryTooLarge {
            archive: archive.to_string(),
            name: METADATA_ENTRY.to_string(),
            size,
            max: config.max_metadata_size,
        }
        .into());
    }
    Ok(())
}

/// Decompresses `metadata.gz`, bounded by the configured size limit.
fn gunzip_metadata(compressed: &[u8], config: &PackageConfig, archive: &str) -> Result<Vec<u8>> {
    let mut metadata = Vec::new();
    GzDecoder::new(compressed)
        .take(config.max_metadata_size.saturating_add(1))
        .read_to_end(&mut metadata)
        .map_err(|err| FormatError::InvalidMetadata {
            archive: archive.to_string(),
            reason: err.to_string(),
        })?;

    let size = metadata.len() as u64;
    if size > config.max_metadata_size {
        return Err(FormatError::EntryTooLarge {
            archive: archive.to_string(),
            name: METADATA_ENTRY.to_string(),
            size,
            max: config.max_metadata_size,
        }
        .into());
    }
    Ok(metadata)
}

fn parse_spec<S: Specification>(metadata: &[u8], archive: &str) -> Result<S> {
    S::from_bytes(metadata).map_err(|err| {
        FormatError::InvalidMetadata {
            archive: archive.to_string(),
            reason: err.to_string(),
        }
        .into()
    })
}
