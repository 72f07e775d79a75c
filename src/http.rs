//! HTTP client construction and error classification

use crate::config::UserAgentConfig;
use crate::DownloadError;
use reqwest::Client;
use std::time::Duration;

/// Formats the user agent string
///
/// Format: `ClientName/Version` or `ClientName/Version (+ContactEmail)`
pub fn user_agent(config: &UserAgentConfig) -> String {
    match &config.contact_email {
        Some(email) => format!(
            "{}/{} (+{})",
            config.client_name, config.client_version, email
        ),
        None => format!("{}/{}", config.client_name, config.client_version),
    }
}

/// Builds an HTTP client with proper configuration
///
/// Request timeouts are set per request by the callers, so the client
/// itself only bounds the connect phase.
///
/// # Example
///
/// ```no_run
/// use xbrl_filings::config::UserAgentConfig;
/// use xbrl_filings::http::build_http_client;
///
/// let client = build_http_client(&UserAgentConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent(config))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Maps a reqwest error of a download to a [`DownloadError`]
pub fn classify_download_error(url: &str, error: reqwest::Error) -> DownloadError {
    if error.is_timeout() {
        DownloadError::Timeout {
            url: url.to_string(),
        }
    } else if let Some(status) = error.status() {
        DownloadError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        }
    } else {
        DownloadError::Http {
            url: url.to_string(),
            source: error,
        }
    }
}
