//! SHA-256 verification of downloaded artifacts
//!
//! Digests are computed incrementally while the body streams to disk, so a
//! file never has to be read back for verification.

use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::io::AsyncReadExt;

/// Result of comparing a computed digest with the expected one
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// Digests are equal
    Match { calculated: String },

    /// Digests differ
    Mismatch { expected: String, calculated: String },
}

impl Verification {
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Match { .. })
    }

    /// Lowercase hex digest of the received bytes
    pub fn calculated(&self) -> &str {
        match self {
            Self::Match { calculated } | Self::Mismatch { calculated, .. } => calculated,
        }
    }
}

/// Incremental SHA-256 hasher bound to an expected digest
#[derive(Debug, Clone)]
pub struct ChecksumVerifier {
    hasher: Sha256,
    expected: String,
}

impl ChecksumVerifier {
    /// Creates a verifier for the given expected hex digest
    ///
    /// Comparison is case-insensitive and ignores surrounding whitespace.
    pub fn new(expected: &str) -> Self {
        Self {
            hasher: Sha256::new(),
            expected: expected.trim().to_ascii_lowercase(),
        }
    }

    /// Feeds a chunk of the body into the digest
    pub fn update(&mut self, chunk: &[u8]) {
        self.hasher.update(chunk);
    }

    pub fn expected(&self) -> &str {
        &self.expected
    }

    /// Finalizes the digest and compares it with the expected value
    pub fn finish(self) -> Verification {
        let calculated = hex::encode(self.hasher.finalize());
        if calculated == self.expected {
            Verification::Match { calculated }
        } else {
            Verification::Mismatch {
                expected: self.expected,
                calculated,
            }
        }
    }
}

/// Computes the lowercase hex SHA-256 digest of a byte slice
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Computes the lowercase hex SHA-256 digest of a file on disk
pub async fn sha256_file(path: &Path) -> std::io::Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 64 * 1024];

    loop {
        let read = file.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(hex::encode(hasher.finalize()))
}
