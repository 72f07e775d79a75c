//! xbrl-filings: a client for the filings.xbrl.org JSON:API
//!
//! This crate assembles paginated filing queries into a cross-linked object
//! graph (filings, entities and validation messages) and downloads the report
//! artifacts of filings in bounded-concurrency batches with SHA-256
//! verification.

pub mod config;
pub mod diagnostics;
pub mod download;
pub mod http;
pub mod json;
pub mod output;
pub mod query;
pub mod resource;

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for xbrl-filings operations
#[derive(Debug, Error)]
pub enum FilingsError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Page error: {0}")]
    Page(#[from] PageError),

    #[error("Download error: {0}")]
    Download(#[from] DownloadError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Errors that make a whole query fail
///
/// A page that cannot be decoded aborts the query; no partial result
/// collection is returned after one of these.
#[derive(Debug, Error)]
pub enum PageError {
    #[error("Failed to decode page from {url}: {source}")]
    Decode {
        url: String,
        source: serde_json::Error,
    },

    #[error("Malformed page from {url}: {message}")]
    Malformed { url: String, message: String },

    #[error("The filings API returned {} error(s) for {url}: {}", errors.len(), join_api_errors(errors))]
    Api {
        url: String,
        errors: Vec<query::ApiError>,
    },

    #[error("HTTP status {status} for {url}")]
    HttpStatus {
        url: String,
        status: u16,
        body: String,
    },

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Query aborted: page {page} failed earlier")]
    Aborted { page: usize },
}

fn join_api_errors(errors: &[query::ApiError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors scoped to a single download
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("HTTP status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error(
        "Corrupt download from {url}: expected SHA-256 {expected}, calculated {calculated} (saved as {})",
        path.display()
    )]
    Corrupt {
        url: String,
        path: PathBuf,
        expected: String,
        calculated: String,
    },

    #[error("IO error for {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Placeholder '/name/' missing in stem pattern {0:?}")]
    InvalidStemPattern(String),

    #[error("Download task for {url} did not complete: {source}")]
    Task {
        url: String,
        source: download::SchedulerError,
    },
}

impl DownloadError {
    /// Returns true for connection, status and timeout failures
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Http { .. } | Self::Status { .. } | Self::Timeout { .. }
        )
    }

    /// Returns true if the file was downloaded but failed verification
    pub fn is_corrupt(&self) -> bool {
        matches!(self, Self::Corrupt { .. })
    }
}

/// Result type alias for xbrl-filings operations
pub type Result<T> = std::result::Result<T, FilingsError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use diagnostics::Diagnostics;
pub use download::{Concurrency, DownloadDescriptor, DownloadOutcome, Downloader};
pub use query::{GraphAssembler, QueryResult};
pub use resource::{Entity, FileKind, Filing, FilingSet, Scope, ValidationMessage};
