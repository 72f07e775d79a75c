//! Download descriptors and outcomes

use crate::DownloadError;
use std::path::{Path, PathBuf};

/// One file to download
///
/// `token` is an opaque value owned by the caller; it is returned unchanged
/// in the matching [`DownloadOutcome`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadDescriptor<T> {
    /// URL to fetch
    pub url: String,

    /// Directory the file is saved to (created if missing)
    pub to_dir: PathBuf,

    /// File name override
    pub filename: Option<String>,

    /// Stem pattern containing `/name/`
    pub stem_pattern: Option<String>,

    /// Expected SHA-256 digest as hex
    pub sha256: Option<String>,

    /// Caller correlation value
    pub token: T,
}

impl<T> DownloadDescriptor<T> {
    pub fn new(url: impl Into<String>, to_dir: impl Into<PathBuf>, token: T) -> Self {
        Self {
            url: url.into(),
            to_dir: to_dir.into(),
            filename: None,
            stem_pattern: None,
            sha256: None,
            token,
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_stem_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.stem_pattern = Some(pattern.into());
        self
    }

    pub fn with_sha256(mut self, sha256: impl Into<String>) -> Self {
        self.sha256 = Some(sha256.into());
        self
    }

    /// Splits off the token, leaving a `Send + 'static` job
    pub(crate) fn into_parts(self) -> (DownloadJob, T) {
        (
            DownloadJob {
                url: self.url,
                to_dir: self.to_dir,
                filename: self.filename,
                stem_pattern: self.stem_pattern,
                sha256: self.sha256,
            },
            self.token,
        )
    }
}

/// A descriptor without its token
#[derive(Debug, Clone)]
pub(crate) struct DownloadJob {
    pub url: String,
    pub to_dir: PathBuf,
    pub filename: Option<String>,
    pub stem_pattern: Option<String>,
    pub sha256: Option<String>,
}

/// Result of one download
#[derive(Debug)]
pub struct DownloadOutcome<T> {
    /// URL of the descriptor
    pub url: String,

    /// Clean path of the saved file; `None` on failure
    pub path: Option<PathBuf>,

    /// Error of a failed download; `None` on success
    pub error: Option<DownloadError>,

    /// Position of the request in the start sequence of the downloader;
    /// `None` if no request was sent
    pub start_seq: Option<u64>,

    /// Token of the descriptor
    pub token: T,
}

impl<T> DownloadOutcome<T> {
    pub(crate) fn from_result(
        url: String,
        result: Result<PathBuf, DownloadError>,
        start_seq: Option<u64>,
        token: T,
    ) -> Self {
        let (path, error) = match result {
            Ok(path) => (Some(path), None),
            Err(error) => (None, Some(error)),
        };
        Self {
            url,
            path,
            error,
            start_seq,
            token,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Path of the `.corrupt` file when checksum verification failed
    pub fn corrupt_path(&self) -> Option<&Path> {
        match &self.error {
            Some(DownloadError::Corrupt { path, .. }) => Some(path),
            _ => None,
        }
    }
}

/// Returns the first error of a batch, in submission order
pub fn first_error<T>(outcomes: &[DownloadOutcome<T>]) -> Option<&DownloadError> {
    outcomes.iter().find_map(|o| o.error.as_ref())
}

/// Turns a finished batch into an error if any item failed
///
/// For callers that prefer raising over inspecting outcomes. The batch has
/// already run to completion; the returned error is the first one in
/// submission order.
pub fn into_result<T>(
    mut outcomes: Vec<DownloadOutcome<T>>,
) -> Result<Vec<DownloadOutcome<T>>, DownloadError> {
    if let Some(pos) = outcomes.iter().position(|o| o.error.is_some()) {
        if let Some(error) = outcomes.swap_remove(pos).error {
            return Err(error);
        }
    }
    Ok(outcomes)
}
