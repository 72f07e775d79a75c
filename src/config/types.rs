use serde::Deserialize;
use std::path::PathBuf;

/// Default entry point of the filings API
pub const DEFAULT_ENTRY_POINT_URL: &str = "https://filings.xbrl.org/api/filings";

/// Main configuration structure for xbrl-filings
///
/// Every section has defaults, so an empty file is a valid configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub download: DownloadConfig,
    #[serde(default, rename = "user-agent")]
    pub user_agent: UserAgentConfig,
}

/// Filings API configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// URL of the filings endpoint; relative URLs in responses are resolved
    /// against it
    #[serde(rename = "entry-point-url")]
    pub entry_point_url: String,

    /// Number of filings requested per page
    #[serde(rename = "max-page-size")]
    pub max_page_size: usize,

    /// Timeout of a single page request (seconds)
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            entry_point_url: DEFAULT_ENTRY_POINT_URL.to_string(),
            max_page_size: 200,
            timeout_secs: 30,
        }
    }
}

/// Download batch configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Directory files are saved to
    pub directory: PathBuf,

    /// Maximum number of concurrent downloads (0 = unlimited)
    #[serde(rename = "max-concurrent")]
    pub max_concurrent: usize,

    /// Timeout of a single download, body included (seconds)
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,

    /// Verify package downloads against the SHA-256 published by the API
    #[serde(rename = "check-corruption")]
    pub check_corruption: bool,

    /// Stem pattern containing `/name/`
    #[serde(rename = "stem-pattern")]
    pub stem_pattern: Option<String>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            max_concurrent: 5,
            timeout_secs: 30,
            check_corruption: true,
            stem_pattern: None,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UserAgentConfig {
    /// Name of the client
    #[serde(rename = "client-name")]
    pub client_name: String,

    /// Version of the client
    #[serde(rename = "client-version")]
    pub client_version: String,

    /// Email address for contact about the client
    #[serde(rename = "contact-email")]
    pub contact_email: Option<String>,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            client_name: env!("CARGO_PKG_NAME").to_string(),
            client_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_email: None,
        }
    }
}
