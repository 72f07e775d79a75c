//! Atomic file writer
//!
//! Bodies are streamed into `<name>.unfinished` and only renamed to their
//! final name once complete. A transfer that never reaches
//! [`AtomicFileWriter::finish`] leaves the `.unfinished` file behind, so a
//! clean file name always denotes a complete (and, when a digest was given,
//! verified) download.

use super::checksum::{ChecksumVerifier, Verification};
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

/// Suffix of files that are still being written
pub const UNFINISHED_SUFFIX: &str = "unfinished";

/// Suffix of complete files that failed checksum verification
pub const CORRUPT_SUFFIX: &str = "corrupt";

/// Appends `.<suffix>` to the file name of `path`
pub fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(OsString::new);
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

/// How a finished write was finalized
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Renamed to the clean destination
    Complete { path: PathBuf, bytes: u64 },

    /// Renamed to `<name>.corrupt` after a digest mismatch
    Corrupt {
        path: PathBuf,
        bytes: u64,
        expected: String,
        calculated: String,
    },
}

/// Streams a body to disk under a temporary name
pub struct AtomicFileWriter {
    destination: PathBuf,
    temp_path: PathBuf,
    file: File,
    verifier: Option<ChecksumVerifier>,
    bytes_written: u64,
}

impl AtomicFileWriter {
    /// Creates (or truncates) `<destination>.unfinished`
    ///
    /// When `expected_sha256` is given, every written chunk also feeds an
    /// incremental digest that is checked in [`finish`](Self::finish).
    pub async fn create(destination: PathBuf, expected_sha256: Option<&str>) -> io::Result<Self> {
        let temp_path = with_suffix(&destination, UNFINISHED_SUFFIX);
        let file = File::create(&temp_path).await?;

        Ok(Self {
            destination,
            temp_path,
            file,
            verifier: expected_sha256.map(ChecksumVerifier::new),
            bytes_written: 0,
        })
    }

    /// Path of the in-progress file
    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Appends a chunk to the in-progress file
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.file.write_all(chunk).await?;
        if let Some(verifier) = self.verifier.as_mut() {
            verifier.update(chunk);
        }
        self.bytes_written += chunk.len() as u64;
        Ok(())
    }

    /// Flushes the file and moves it to its final name
    ///
    /// An existing file at the target name is replaced.
    pub async fn finish(mut self) -> io::Result<WriteOutcome> {
        self.file.flush().await?;
        self.file.sync_all().await?;
        drop(self.file);

        let verification = self.verifier.map(ChecksumVerifier::finish);

        match verification {
            Some(Verification::Mismatch {
                expected,
                calculated,
            }) => {
                let corrupt_path = with_suffix(&self.destination, CORRUPT_SUFFIX);
                replace(&self.temp_path, &corrupt_path).await?;
                Ok(WriteOutcome::Corrupt {
                    path: corrupt_path,
                    bytes: self.bytes_written,
                    expected,
                    calculated,
                })
            }
            _ => {
                replace(&self.temp_path, &self.destination).await?;
                Ok(WriteOutcome::Complete {
                    path: self.destination,
                    bytes: self.bytes_written,
                })
            }
        }
    }
}

async fn replace(from: &Path, to: &Path) -> io::Result<()> {
    match tokio::fs::remove_file(to).await {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    tokio::fs::rename(from, to).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::checksum::sha256_hex;

    #[test]
    fn test_with_suffix() {
        let path = Path::new("/tmp/reports/a.zip");
        assert_eq!(
            with_suffix(path, UNFINISHED_SUFFIX),
            PathBuf::from("/tmp/reports/a.zip.unfinished")
        );
        assert_eq!(
            with_suffix(path, CORRUPT_SUFFIX),
            PathBuf::from("/tmp/reports/a.zip.corrupt")
        );
    }

    #[tokio::test]
    async fn test_write_and_finish() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("report.zip");

        let mut writer = AtomicFileWriter::create(dest.clone(), None).await.unwrap();
        assert!(writer.temp_path().exists());
        writer.write_chunk(b"abc").await.unwrap();
        writer.write_chunk(b"def").await.unwrap();
        assert_eq!(writer.bytes_written(), 6);

        let outcome = writer.finish().await.unwrap();
        assert_eq!(
            outcome,
            WriteOutcome::Complete {
                path: dest.clone(),
                bytes: 6
            }
        );
        assert_eq!(std::fs::read(&dest).unwrap(), b"abcdef");
        assert!(!with_suffix(&dest, UNFINISHED_SUFFIX).exists());
    }

    #[tokio::test]
    async fn test_finish_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("report.zip");
        std::fs::write(&dest, b"old").unwrap();

        let mut writer = AtomicFileWriter::create(dest.clone(), None).await.unwrap();
        writer.write_chunk(b"new").await.unwrap();
        writer.finish().await.unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_verified_write() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("report.zip");
        let digest = sha256_hex(b"payload");

        let mut writer = AtomicFileWriter::create(dest.clone(), Some(&digest))
            .await
            .unwrap();
        writer.write_chunk(b"payload").await.unwrap();

        let outcome = writer.finish().await.unwrap();
        assert!(matches!(outcome, WriteOutcome::Complete { .. }));
        assert!(dest.exists());
    }

    #[tokio::test]
    async fn test_mismatch_renames_to_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("report.zip");
        let corrupt = with_suffix(&dest, CORRUPT_SUFFIX);
        std::fs::write(&corrupt, b"stale").unwrap();
        let digest = sha256_hex(b"expected payload");

        let mut writer = AtomicFileWriter::create(dest.clone(), Some(&digest))
            .await
            .unwrap();
        writer.write_chunk(b"other payload").await.unwrap();

        match writer.finish().await.unwrap() {
            WriteOutcome::Corrupt {
                path,
                expected,
                calculated,
                ..
            } => {
                assert_eq!(path, corrupt);
                assert_eq!(expected, digest);
                assert_eq!(calculated, sha256_hex(b"other payload"));
            }
            other => panic!("Expected corrupt outcome, got {:?}", other),
        }

        assert!(!dest.exists());
        assert_eq!(std::fs::read(&corrupt).unwrap(), b"other payload");
    }

    #[tokio::test]
    async fn test_dropped_writer_leaves_unfinished_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("report.zip");

        let mut writer = AtomicFileWriter::create(dest.clone(), None).await.unwrap();
        writer.write_chunk(b"partial").await.unwrap();
        drop(writer);

        assert!(!dest.exists());
        assert!(with_suffix(&dest, UNFINISHED_SUFFIX).exists());
    }
}
