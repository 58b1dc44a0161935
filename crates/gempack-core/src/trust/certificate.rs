//! Signer certificates.
//!
//! A certificate binds a subject name to an Ed25519 public key for a
//! validity window, signed by an issuer. Chains run leaf first; the last
//! certificate is either self-signed or issued by a certificate held in the
//! [`TrustStore`](super::TrustStore).

use chrono::DateTime;
use chrono::Duration;
use chrono::SecondsFormat;
use chrono::Utc;
use ed25519_dalek::Signature;
use ed25519_dalek::Signer;
use ed25519_dalek::SigningKey;
use ed25519_dalek::Verifier;
use ed25519_dalek::VerifyingKey;
use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;

use crate::TrustError;

/// Domain separator for certificate signing bytes.
const CERT_DOMAIN_SEPARATOR: &[u8] = b"gempack:certificate:v1\0";

/// Validity window of a certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Validity {
    /// First instant the certificate is valid.
    pub not_before: DateTime<Utc>,
    /// Last instant the certificate is valid.
    pub not_after: DateTime<Utc>,
}

impl Validity {
    /// Valid from now for `days` days.
    #[must_use]
    pub fn days_from_now(days: i64) -> Self {
        let now = Utc::now();
        Self {
            not_before: now,
            not_after: now + Duration::days(days),
        }
    }
}

/// An issued signer certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    subject: String,
    issuer: String,
    #[serde(with = "hex")]
    public_key: [u8; 32],
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
    #[serde(with = "hex")]
    signature: [u8; 64],
}

impl Certificate {
    /// Creates a certificate for `key` signed by itself.
    #[must_use]
    pub fn self_signed(subject: impl Into<String>, key: &SigningKey, validity: Validity) -> Self {
        let subject = subject.into();
        let mut cert = Self::unsigned(subject.clone(), subject, &key.verifying_key(), validity);
        cert.signature = key.sign(&cert.signing_bytes()).to_bytes();
        cert
    }

    /// Issues a certificate for `subject_key`, signed by `issuer_key` on
    /// behalf of `issuer`.
    #[must_use]
    pub fn issue(
        subject: impl Into<String>,
        subject_key: &VerifyingKey,
        issuer: &Self,
        issuer_key: &SigningKey,
        validity: Validity,
    ) -> Self {
        let mut cert = Self::unsigned(subject.into(), issuer.subject.clone(), subject_key, validity);
        cert.signature = issuer_key.sign(&cert.signing_bytes()).to_bytes();
        cert
    }

    fn unsigned(subject: String, issuer: String, key: &VerifyingKey, validity: Validity) -> Self {
        Self {
            subject,
            issuer,
            public_key: key.to_bytes(),
            not_before: validity.not_before,
            not_after: validity.not_after,
            signature: [0u8; 64],
        }
    }

    /// Subject name.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Issuer name.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Raw Ed25519 public key.
    #[must_use]
    pub const fn public_key(&self) -> &[u8; 32] {
        &self.public_key
    }

    /// Start of the validity window.
    #[must_use]
    pub const fn not_before(&self) -> DateTime<Utc> {
        self.not_before
    }

    /// End of the validity window.
    #[must_use]
    pub const fn not_after(&self) -> DateTime<Utc> {
        self.not_after
    }

    /// Returns `true` if subject and issuer are the same name.
    #[must_use]
    pub fn is_self_signed(&self) -> bool {
        self.subject == self.issuer
    }

    /// Decodes the embedded public key.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::Certificate`] if the bytes are not a valid
    /// curve point.
    pub fn verifying_key(&self) -> Result<VerifyingKey, TrustError> {
        VerifyingKey::from_bytes(&self.public_key).map_err(|_| TrustError::Certificate {
            message: format!("certificate {} has a malformed public key", self.subject),
        })
    }

    /// Checks that `at` lies inside the validity window.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::Certificate`] naming this certificate if it is
    /// expired or not yet valid.
    pub fn check_validity(&self, at: DateTime<Utc>) -> Result<(), TrustError> {
        if at < self.not_before {
            return Err(TrustError::Certificate {
                message: format!(
                    "certificate {} is not valid before {}",
                    self.subject,
                    self.not_before.to_rfc3339_opts(SecondsFormat::Secs, true)
                ),
            });
        }
        if at > self.not_after {
            return Err(TrustError::Certificate {
                message: format!(
                    "certificate {} expired at {}",
                    self.subject,
                    self.not_after.to_rfc3339_opts(SecondsFormat::Secs, true)
                ),
            });
        }
        Ok(())
    }

    /// Checks that this certificate names `issuer` as its issuer and carries
    /// a valid signature from the issuer's key.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::Certificate`] on a name mismatch, a malformed
    /// issuer key, or a bad signature.
    pub fn verify_issued_by(&self, issuer: &Self) -> Result<(), TrustError> {
        if self.issuer != issuer.subject {
            return Err(TrustError::Certificate {
                message: format!(
                    "certificate {} was not issued by {}",
                    self.subject, issuer.subject
                ),
            });
        }
        let key = issuer.verifying_key()?;
        key.verify(&self.signing_bytes(), &Signature::from_bytes(&self.signature))
            .map_err(|_| TrustError::Certificate {
                message: format!("invalid signature on certificate {}", self.subject),
            })
    }

    /// Hex SHA-256 over the signing bytes and signature.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.signing_bytes());
        hasher.update(self.signature);
        hex::encode(hasher.finalize())
    }

    /// Serializes to JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Parses a certificate from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed input.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Canonical bytes covered by the issuer signature.
    fn signing_bytes(&self) -> Vec<u8> {
        let not_before = self.not_before.to_rfc3339_opts(SecondsFormat::AutoSi, true);
        let not_after = self.not_after.to_rfc3339_opts(SecondsFormat::AutoSi, true);

        let mut out = Vec::with_capacity(
            CERT_DOMAIN_SEPARATOR.len() + 32 + 16 + self.subject.len() + self.issuer.len() + 64,
        );
        out.extend_from_slice(CERT_DOMAIN_SEPARATOR);
        for field in [
            self.subject.as_bytes(),
            self.issuer.as_bytes(),
            self.public_key.as_slice(),
            not_before.as_bytes(),
            not_after.as_bytes(),
        ] {
            let len = u32::try_from(field.len()).unwrap_or(u32::MAX);
            out.extend_from_slice(&len.to_be_bytes());
            out.extend_from_slice(field);
        }
        out
    }
}
