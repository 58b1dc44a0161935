//! Digest signature and certificate chain verification.

use std::collections::BTreeMap;

use chrono::DateTime;
use chrono::Utc;
use ed25519_dalek::Signature;
use ed25519_dalek::Signer;
use ed25519_dalek::SigningKey;
use ed25519_dalek::Verifier;
use ed25519_dalek::VerifyingKey;

use super::Certificate;
use super::TrustStore;
use crate::TrustError;
use crate::package::METADATA_ENTRY;
use crate::security::Check;
use crate::security::SecurityPolicy;

/// Entry name to digest bytes.
pub type DigestMap = BTreeMap<String, Vec<u8>>;

/// Entry name to signature bytes.
pub type SignatureMap = BTreeMap<String, Vec<u8>>;

/// Signs a digest with `key`.
///
/// Signatures are Ed25519 over the raw digest bytes.
#[must_use]
pub fn sign_digest(key: &SigningKey, digest: &[u8]) -> Vec<u8> {
    key.sign(digest).to_bytes().to_vec()
}

/// Checks signatures and certificate chains against a trust store.
///
/// Verification is a pure function of its inputs plus the store and the
/// verification time, which defaults to now.
#[derive(Debug, Clone, Copy)]
pub struct TrustVerifier<'a> {
    store: &'a TrustStore,
    at: DateTime<Utc>,
}

impl<'a> TrustVerifier<'a> {
    /// Verifier backed by `store`, checking validity at the current time.
    #[must_use]
    pub fn new(store: &'a TrustStore) -> Self {
        Self {
            store,
            at: Utc::now(),
        }
    }

    /// Checks certificate validity windows at `at` instead of now.
    #[must_use]
    pub const fn at(mut self, at: DateTime<Utc>) -> Self {
        self.at = at;
        self
    }

    /// Verifies `signatures` over `digests` under `policy`.
    ///
    /// Steps, in order:
    /// 1. a policy that requires signed content rejects an empty chain;
    /// 2. every digest the policy requires to be signed must have a
    ///    signature (signatures without a digest are ignored);
    /// 3. each present signature must verify against the leaf key;
    /// 4. the chain must be well formed, in its validity window, and, when
    ///    the policy demands it, rooted in the trust store.
    ///
    /// # Errors
    ///
    /// Returns the first [`TrustError`] encountered.
    pub fn verify_signatures(
        &self,
        digests: &DigestMap,
        signatures: &SignatureMap,
        cert_chain: &[Certificate],
        policy: SecurityPolicy,
    ) -> Result<(), TrustError> {
        if !policy.is_active() {
            return Ok(());
        }

        let Some(leaf) = cert_chain.first() else {
            if policy.requires(Check::RequireSignedMetadata) {
                return Err(TrustError::Unsigned {
                    policy: policy.name().to_string(),
                });
            }
            if digests.keys().any(|name| signatures.contains_key(name)) {
                return Err(TrustError::Certificate {
                    message: "package is signed but carries no certificate chain".to_string(),
                });
            }
            tracing::debug!(%policy, "accepting unsigned package");
            return Ok(());
        };

        for name in digests.keys() {
            let required = policy.requires(Check::RequireAllSigned)
                || (policy.requires(Check::RequireSignedMetadata) && name == METADATA_ENTRY);
            if required && !signatures.contains_key(name) {
                return Err(TrustError::MissingSignature { name: name.clone() });
            }
        }

        let key = leaf.verifying_key()?;
        for (name, digest) in digests {
            if let Some(signature) = signatures.get(name) {
                if !verify_digest(&key, digest, signature) {
                    return Err(TrustError::InvalidSignature { name: name.clone() });
                }
                tracing::debug!(entry = %name, signer = leaf.subject(), "signature verified");
            }
        }

        self.verify_chain(cert_chain, policy)
    }

    /// Validates the chain leaf to root.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::Certificate`] for an expired or mis-issued
    /// certificate and [`TrustError::Untrusted`] when the policy requires a
    /// trusted root and none is found.
    pub fn verify_chain(&self, cert_chain: &[Certificate], policy: SecurityPolicy) -> Result<(), TrustError> {
        let Some(root) = cert_chain.last() else {
            return Ok(());
        };

        for (idx, cert) in cert_chain.iter().enumerate() {
            cert.check_validity(self.at)?;
            if let Some(issuer) = cert_chain.get(idx + 1) {
                cert.verify_issued_by(issuer)?;
            }
        }

        let trusted = if root.is_self_signed() {
            root.verify_issued_by(root)?;
            self.store.is_trusted(root)
        } else {
            self.store.find_by_subject(root.issuer()).any(|anchor| {
                anchor.check_validity(self.at).is_ok() && root.verify_issued_by(anchor).is_ok()
            })
        };

        if policy.requires(Check::RequireTrustedSigner) && !trusted {
            return Err(TrustError::Untrusted {
                subject: root.subject().to_string(),
            });
        }
        Ok(())
    }
}

fn verify_digest(key: &VerifyingKey, digest: &[u8], signature: &[u8]) -> bool {
    Signature::from_slice(signature).is_ok_and(|signature| key.verify(digest, &signature).is_ok())
}
