use crate::config::types::{ApiConfig, Config, DownloadConfig, UserAgentConfig};
use crate::download::NAME_PLACEHOLDER;
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_api_config(&config.api)?;
    validate_download_config(&config.download)?;
    validate_user_agent_config(&config.user_agent)?;
    Ok(())
}

/// Validates API configuration
fn validate_api_config(config: &ApiConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.entry_point_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid entry-point-url: {}", e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "entry-point-url must use http or https, got '{}'",
            config.entry_point_url
        )));
    }

    if config.max_page_size < 1 || config.max_page_size > 1000 {
        return Err(ConfigError::Validation(format!(
            "max-page-size must be between 1 and 1000, got {}",
            config.max_page_size
        )));
    }

    if config.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "api timeout-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates download configuration
fn validate_download_config(config: &DownloadConfig) -> Result<(), ConfigError> {
    if config.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "download timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.directory.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "download directory cannot be empty".to_string(),
        ));
    }

    if let Some(pattern) = &config.stem_pattern {
        if !pattern.contains(NAME_PLACEHOLDER) {
            return Err(ConfigError::Validation(format!(
                "stem-pattern must contain '{}', got '{}'",
                NAME_PLACEHOLDER, pattern
            )));
        }
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Client name: non-empty, alphanumeric + hyphens only
    if config.client_name.is_empty() {
        return Err(ConfigError::Validation(
            "client-name cannot be empty".to_string(),
        ));
    }

    if !config
        .client_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "client-name must contain only alphanumeric characters and hyphens, got '{}'",
            config.client_name
        )));
    }

    if config.client_version.trim().is_empty() {
        return Err(ConfigError::Validation(
            "client-version cannot be empty".to_string(),
        ));
    }

    if let Some(email) = &config.contact_email {
        validate_email(email)?;
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact-email cannot be empty".to_string(),
        ));
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    let local = parts[0];
    let domain = parts[1];

    if local.is_empty() || domain.is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_api_config() {
        let mut api = ApiConfig::default();
        assert!(validate_api_config(&api).is_ok());

        api.max_page_size = 0;
        assert!(matches!(
            validate_api_config(&api),
            Err(ConfigError::Validation(_))
        ));

        api.max_page_size = 200;
        api.entry_point_url = "not a url".to_string();
        assert!(matches!(
            validate_api_config(&api),
            Err(ConfigError::InvalidUrl(_))
        ));

        api.entry_point_url = "ftp://filings.xbrl.org/api/filings".to_string();
        assert!(matches!(
            validate_api_config(&api),
            Err(ConfigError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_validate_download_config() {
        let mut download = DownloadConfig::default();
        download.max_concurrent = 0;
        assert!(validate_download_config(&download).is_ok());

        download.timeout_secs = 0;
        assert!(validate_download_config(&download).is_err());

        download.timeout_secs = 30;
        download.stem_pattern = Some("/name/-copy".to_string());
        assert!(validate_download_config(&download).is_ok());

        download.stem_pattern = Some("copy".to_string());
        assert!(validate_download_config(&download).is_err());
    }

    #[test]
    fn test_validate_user_agent_config() {
        let mut ua = UserAgentConfig::default();
        assert!(validate_user_agent_config(&ua).is_ok());

        ua.client_name = "bad name".to_string();
        assert!(validate_user_agent_config(&ua).is_err());

        ua.client_name = "good-name".to_string();
        ua.contact_email = Some("nobody".to_string());
        assert!(validate_user_agent_config(&ua).is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("user@example.com").is_ok());
        assert!(validate_email("admin@sub.example.com").is_ok());

        assert!(validate_email("").is_err());
        assert!(validate_email("invalid").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("user@").is_err());
        assert!(validate_email("user@domain").is_err());
    }
}
