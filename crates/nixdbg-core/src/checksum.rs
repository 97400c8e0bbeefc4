//! SHA-256 verification of downloaded release tarballs.

use crate::error::BootstrapError;
use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

const BUF_SIZE: usize = 64 * 1024;

/// Lowercase hex SHA-256 of everything `reader` yields.
pub fn sha256_reader<R: Read>(mut reader: R) -> std::io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        match reader.read(&mut buf)? {
            0 => break,
            n => hasher.update(&buf[..n]),
        }
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Lowercase hex SHA-256 of a release tarball on disk.
pub fn sha256_path(path: &Path) -> Result<String> {
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    sha256_reader(f).with_context(|| format!("hash {}", path.display()))
}

/// Fails with `ChecksumMismatch` unless `path` hashes to `expected`.
/// The expected digest is compared case-insensitively.
pub fn verify_sha256(path: &Path, expected: &str) -> Result<()> {
    let actual = sha256_path(path)?;
    let expected = expected.trim().to_ascii_lowercase();
    if actual != expected {
        return Err(BootstrapError::ChecksumMismatch { expected, actual }.into());
    }
    tracing::debug!(path = %path.display(), "sha256 ok");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HELLO_SHA256: &str = "5891b5b522d5df086d0ff0b110fbd9d21bb4fc7163af34d08286a2e846f6be03";

    #[test]
    fn known_digests() {
        assert_eq!(
            sha256_reader(&b""[..]).unwrap(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            sha256_reader(&b"abc"[..]).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn digest_spans_buffer_boundary() {
        let data = vec![0x5au8; BUF_SIZE * 2 + 17];
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(&data).unwrap();
        f.flush().unwrap();
        assert_eq!(sha256_path(f.path()).unwrap(), hex::encode(Sha256::digest(&data)));
    }

    #[test]
    fn verify_accepts_uppercase_expected() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"hello\n").unwrap();
        f.flush().unwrap();
        verify_sha256(f.path(), &HELLO_SHA256.to_ascii_uppercase()).unwrap();
    }

    #[test]
    fn verify_reports_mismatch() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"hello, tampered\n").unwrap();
        f.flush().unwrap();
        let err = verify_sha256(f.path(), HELLO_SHA256).unwrap_err();
        match err.downcast_ref::<BootstrapError>() {
            Some(BootstrapError::ChecksumMismatch { expected, actual }) => {
                assert_eq!(expected, HELLO_SHA256);
                assert_ne!(actual, HELLO_SHA256);
            }
            other => panic!("expected ChecksumMismatch, got {:?}", other),
        }
    }

    #[test]
    fn verify_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(verify_sha256(&dir.path().join("absent"), HELLO_SHA256).is_err());
    }
}
