//! Entry digests.

use std::fmt;
use std::io;
use std::io::Read;
use std::str::FromStr;

use sha2::Digest;
use sha2::Sha256;
use sha2::Sha512;

/// One-way hash used to digest archive entries before signing.
///
/// The algorithm is fixed for a verification run; signer and verifier must
/// agree on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DigestAlgorithm {
    /// SHA-256 (32-byte digests).
    #[default]
    Sha256,
    /// SHA-512 (64-byte digests).
    Sha512,
}

impl DigestAlgorithm {
    /// Computes the digest of `data`.
    #[must_use]
    pub fn digest(self, data: &[u8]) -> Vec<u8> {
        match self {
            Self::Sha256 => Sha256::digest(data).to_vec(),
            Self::Sha512 => Sha512::digest(data).to_vec(),
        }
    }

    /// Computes the digest of everything `reader` yields.
    ///
    /// # Errors
    ///
    /// Returns the first read error.
    pub fn digest_reader<R: Read>(self, mut reader: R) -> io::Result<Vec<u8>> {
        match self {
            Self::Sha256 => {
                let mut hasher = Sha256::new();
                io::copy(&mut reader, &mut hasher)?;
                Ok(hasher.finalize().to_vec())
            }
            Self::Sha512 => {
                let mut hasher = Sha512::new();
                io::copy(&mut reader, &mut hasher)?;
                Ok(hasher.finalize().to_vec())
            }
        }
    }

    /// Digest length in bytes.
    #[must_use]
    pub const fn output_len(self) -> usize {
        match self {
            Self::Sha256 => 32,
            Self::Sha512 => 64,
        }
    }

    /// Algorithm identifier.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DigestAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "").as_str() {
            "sha256" => Ok(Self::Sha256),
            "sha512" => Ok(Self::Sha512),
            other => Err(format!("unsupported digest algorithm: {other}")),
        }
    }
}
