//! Download descriptors for filings
//!
//! Turns the artifact URLs of filings into [`DownloadDescriptor`]s and
//! stores the paths of successful downloads back on the filings.

use super::collection::FilingSet;
use super::filing::Filing;
use super::FileKind;
use crate::download::{validate_stem_pattern, DownloadDescriptor, DownloadOutcome, Downloader};
use crate::DownloadError;
use std::collections::HashMap;
use std::path::PathBuf;

/// Correlation token of a filing download
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileRef {
    pub filing_api_id: String,
    pub kind: FileKind,
}

/// Overrides for one artifact kind
///
/// A fixed `filename` is only meaningful when downloading a single filing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadItem {
    pub filename: Option<String>,
    pub to_dir: Option<PathBuf>,
    pub stem_pattern: Option<String>,
}

/// What to download for each filing
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    /// Artifact kinds, in the order descriptors are built
    pub kinds: Vec<FileKind>,

    /// Per-kind overrides
    pub items: HashMap<FileKind, DownloadItem>,

    /// Default directory
    pub to_dir: PathBuf,

    /// Default stem pattern
    pub stem_pattern: Option<String>,

    /// Verify packages against `package_sha256`
    pub check_corruption: bool,
}

impl DownloadRequest {
    pub fn new(kinds: Vec<FileKind>, to_dir: impl Into<PathBuf>) -> Self {
        Self {
            kinds,
            items: HashMap::new(),
            to_dir: to_dir.into(),
            stem_pattern: None,
            check_corruption: true,
        }
    }

    pub fn with_item(mut self, kind: FileKind, item: DownloadItem) -> Self {
        self.items.insert(kind, item);
        self
    }

    pub fn with_stem_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.stem_pattern = Some(pattern.into());
        self
    }

    pub fn with_check_corruption(mut self, check: bool) -> Self {
        self.check_corruption = check;
        self
    }

    /// Rejects stem patterns without the `/name/` placeholder
    pub fn validate(&self) -> Result<(), DownloadError> {
        validate_stem_pattern(self.stem_pattern.as_deref())?;
        for item in self.items.values() {
            validate_stem_pattern(item.stem_pattern.as_deref())?;
        }
        Ok(())
    }
}

impl Filing {
    /// Builds the descriptors of this filing
    ///
    /// Kinds whose URL is missing are skipped.
    pub fn download_descriptors(
        &self,
        request: &DownloadRequest,
    ) -> Result<Vec<DownloadDescriptor<FileRef>>, DownloadError> {
        request.validate()?;
        Ok(self.build_descriptors(request))
    }

    fn build_descriptors(&self, request: &DownloadRequest) -> Vec<DownloadDescriptor<FileRef>> {
        let mut descriptors = Vec::new();

        for &kind in &request.kinds {
            let Some(url) = self.url(kind) else {
                tracing::warn!("Filing {} has no {} URL, skipping", self.api_id, kind);
                continue;
            };

            let item = request.items.get(&kind);
            let to_dir = item
                .and_then(|i| i.to_dir.clone())
                .unwrap_or_else(|| request.to_dir.clone());

            let mut descriptor = DownloadDescriptor::new(
                url,
                to_dir,
                FileRef {
                    filing_api_id: self.api_id.clone(),
                    kind,
                },
            );
            descriptor.filename = item.and_then(|i| i.filename.clone());
            descriptor.stem_pattern = item
                .and_then(|i| i.stem_pattern.clone())
                .or_else(|| request.stem_pattern.clone());
            if kind == FileKind::Package && request.check_corruption {
                descriptor.sha256 = self.package_sha256.clone();
            }

            descriptors.push(descriptor);
        }

        descriptors
    }
}

impl FilingSet {
    /// Builds the descriptors of every filing in set order
    pub fn download_descriptors(
        &self,
        request: &DownloadRequest,
    ) -> Result<Vec<DownloadDescriptor<FileRef>>, DownloadError> {
        request.validate()?;
        Ok(self
            .iter()
            .flat_map(|filing| filing.build_descriptors(request))
            .collect())
    }

    /// Downloads the requested artifacts of all filings
    ///
    /// Paths of successful downloads are stored in the `download_paths` of
    /// the filings. Failed items are reported in the returned outcomes; use
    /// [`into_result`](crate::download::into_result) to turn them into an
    /// error.
    pub async fn download(
        &mut self,
        downloader: &Downloader,
        request: &DownloadRequest,
    ) -> Result<Vec<DownloadOutcome<FileRef>>, DownloadError> {
        let descriptors = self.download_descriptors(request)?;
        let outcomes = downloader.download_all(descriptors).await;
        self.assign_paths(&outcomes);
        Ok(outcomes)
    }

    /// Stores the clean paths of successful outcomes on their filings
    pub fn assign_paths(&mut self, outcomes: &[DownloadOutcome<FileRef>]) {
        for outcome in outcomes {
            let Some(path) = &outcome.path else {
                continue;
            };
            if let Some(paths) = self.download_paths_mut(&outcome.token.filing_api_id) {
                paths.set(outcome.token.kind, path.clone());
            }
        }
    }
}
