//! Digests, signatures, and certificate trust.
//!
//! Every archive entry is digested with a [`DigestAlgorithm`]; a signed
//! package carries an Ed25519 signature over each digest plus the signer's
//! certificate chain in its metadata. [`TrustVerifier`] checks both against a
//! [`TrustStore`] under a [`SecurityPolicy`](crate::SecurityPolicy).

pub mod certificate;
pub mod digest;
pub mod store;
pub mod verifier;

pub use certificate::Certificate;
pub use certificate::Validity;
pub use digest::DigestAlgorithm;
pub use store::TrustStore;
pub use verifier::DigestMap;
pub use verifier::SignatureMap;
pub use verifier::TrustVerifier;
pub use verifier::sign_digest;
