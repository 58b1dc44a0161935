//! Trusted certificate store.

use std::collections::BTreeMap;

use super::Certificate;

/// In-memory set of trusted certificates, keyed by fingerprint.
///
/// Persistence is left to the caller; the verifier only reads from the
/// store.
#[derive(Debug, Clone, Default)]
pub struct TrustStore {
    certs: BTreeMap<String, Certificate>,
}

impl TrustStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `cert` to the trusted set.
    ///
    /// Returns `false` if an identical certificate was already present.
    pub fn add_trusted(&mut self, cert: Certificate) -> bool {
        let fingerprint = cert.fingerprint();
        tracing::debug!(subject = cert.subject(), %fingerprint, "adding trusted certificate");
        self.certs.insert(fingerprint, cert).is_none()
    }

    /// Returns `true` if exactly this certificate is trusted.
    #[must_use]
    pub fn is_trusted(&self, cert: &Certificate) -> bool {
        self.certs.contains_key(&cert.fingerprint())
    }

    /// Trusted certificates whose subject is `subject`.
    pub fn find_by_subject<'a>(&'a self, subject: &'a str) -> impl Iterator<Item = &'a Certificate> + 'a {
        self.certs.values().filter(move |cert| cert.subject() == subject)
    }

    /// Number of trusted certificates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.certs.len()
    }

    /// Returns `true` if nothing is trusted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.certs.is_empty()
    }

    /// Iterates over trusted certificates in fingerprint order.
    pub fn iter(&self) -> impl Iterator<Item = &Certificate> {
        self.certs.values()
    }
}

impl FromIterator<Certificate> for TrustStore {
    fn from_iter<I: IntoIterator<Item = Certificate>>(iter: I) -> Self {
        let mut store = Self::new();
        for cert in iter {
            store.add_trusted(cert);
        }
        store
    }
}
