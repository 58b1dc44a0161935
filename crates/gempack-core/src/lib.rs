//! Package archive engine with safe extraction and signature verification.
//!
//! `gempack-core` reads and writes package archives: a tar container holding
//! gzip-compressed metadata and a gzip-compressed tar of files. It extracts
//! packages without letting entries escape the destination directory and
//! verifies signed packages against a trust store under a configurable
//! [`SecurityPolicy`].
//!
//! # Examples
//!
//! ```
//! use gempack_core::{Package, PackageBuilder, PackageSpec, SecurityPolicy};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let spec = PackageSpec::new("a", "2").with_files(["lib/code.rb"]);
//! let bytes = PackageBuilder::new(spec)
//!     .add_file("lib/code.rb", 0o644, "puts 'hi'")
//!     .build()?;
//!
//! let mut package = Package::from_bytes("a-2.gem", bytes)
//!     .with_security_policy(SecurityPolicy::High);
//! let err = package.verify().unwrap_err();
//! assert_eq!(
//!     err.to_string(),
//!     "unsigned gems are not allowed by the High Security policy"
//! );
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod package;
pub mod report;
pub mod security;
pub mod specification;
pub mod tar;
pub mod trust;

pub use config::PackageConfig;
pub use error::ErrorKind;
pub use error::FormatError;
pub use error::PackageError;
pub use error::Result;
pub use error::TrustError;
pub use package::Package;
pub use package::PackageBuilder;
pub use package::PackageSource;
pub use report::ExtractionReport;
pub use report::VerificationReport;
pub use security::SecurityPolicy;
pub use specification::PackageSpec;
pub use specification::Specification;
pub use trust::Certificate;
pub use trust::TrustStore;
