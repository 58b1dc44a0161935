//! Shared fixtures for integration tests.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use ed25519_dalek::SigningKey;
use flate2::Compression;
use flate2::write::GzEncoder;
use flate2::write::ZlibEncoder;
use gempack_core::PackageBuilder;
use gempack_core::PackageSpec;
use gempack_core::tar::TarWriter;
use gempack_core::trust::Certificate;
use gempack_core::trust::Validity;
use rand::RngCore;
use rand::rngs::OsRng;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

/// Routes library logs to the test harness; `RUST_LOG` picks the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// The spec every fixture package is built from.
pub fn quick_spec() -> PackageSpec {
    PackageSpec::new("a", "2")
        .with_summary("this is a summary")
        .with_files(["lib/code.rb"])
}

/// Writes an unsigned `a-2.gem` holding `lib/code.rb` into `dir`.
pub fn build_gem(dir: &Path, spec: &PackageSpec) -> PathBuf {
    let path = dir.join(format!("{}.gem", spec.full_name()));
    PackageBuilder::new(spec.clone())
        .add_file("lib/code.rb", 0o644, "code")
        .write_to(&path)
        .unwrap();
    path
}

/// Incompressible bytes.
pub fn noise(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

/// Writes a package in the legacy pre-tar layout: preamble, metadata, file
/// table, then zlib bodies.
pub fn legacy_gem(dir: &Path, spec: &PackageSpec, files: &[(&str, u32, &[u8])]) -> PathBuf {
    let mut table = String::new();
    let mut bodies = Vec::new();
    for (path, mode, data) in files {
        let mut zlib = ZlibEncoder::new(Vec::new(), Compression::default());
        zlib.write_all(data).unwrap();
        let body = zlib.finish().unwrap();
        table.push_str(&format!("- path: {path}\n  mode: {mode}\n  size: {}\n", body.len()));
        bodies.extend_from_slice(&body);
    }

    let mut bytes = b"MD5SUM = \"989bf34a1cbecd52e0ea66b662b3a405\"\nif $0 == __FILE__\n  require 'optparse'\nend\n__END__\n".to_vec();
    bytes.extend_from_slice(&gempack_core::Specification::to_bytes(spec).unwrap());
    bytes.extend_from_slice(b"---\n");
    bytes.extend_from_slice(table.as_bytes());
    bytes.extend_from_slice(b"---\n");
    bytes.extend_from_slice(&bodies);

    let path = dir.join("old_format.gem");
    std::fs::write(&path, bytes).unwrap();
    path
}

pub fn gzip(bytes: &[u8]) -> Vec<u8> {
    let mut gz = GzEncoder::new(Vec::new(), Compression::default());
    gz.write_all(bytes).unwrap();
    gz.finish().unwrap()
}

/// A plain tar built by `build`.
pub fn util_tar(build: impl FnOnce(&mut TarWriter<Vec<u8>>)) -> Vec<u8> {
    let mut tar = TarWriter::new(Vec::new());
    build(&mut tar);
    tar.finish().unwrap()
}

/// A gzip tar built by `build`.
pub fn util_tar_gz(build: impl FnOnce(&mut TarWriter<Vec<u8>>)) -> Vec<u8> {
    gzip(&util_tar(build))
}

/// A signing key with a self-signed certificate.
pub struct Signer {
    pub key: SigningKey,
    pub cert: Certificate,
}

impl Signer {
    pub fn self_signed(subject: &str) -> Self {
        let key = SigningKey::generate(&mut OsRng);
        let cert = Certificate::self_signed(subject, &key, Validity::days_from_now(365));
        Self { key, cert }
    }

    /// A key whose certificate is issued by `self`.
    pub fn issue(&self, subject: &str, validity: Validity) -> Self {
        let key = SigningKey::generate(&mut OsRng);
        let cert = Certificate::issue(subject, &key.verifying_key(), &self.cert, &self.key, validity);
        Self { key, cert }
    }
}

/// Builds a signed package for `spec` whose chain is `chain`, signed with
/// `key`.
pub fn build_signed(spec: PackageSpec, key: SigningKey, chain: Vec<Certificate>) -> Vec<u8> {
    PackageBuilder::new(spec.with_cert_chain(chain))
        .add_file("lib/code.rb", 0o644, "code")
        .sign_with(key)
        .build()
        .unwrap()
}
