use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use xbrl_filings::config::load_config;
///
/// let config = load_config(Path::new("config.toml")).unwrap();
/// println!("Entry point: {}", config.api.entry_point_url);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Logged with each run so results can be traced back to the settings that
/// produced them.
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash of the file content
/// * `Err(ConfigError)` - Failed to read the file
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_ENTRY_POINT_URL;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let config_content = r#"
[api]
entry-point-url = "https://filings.example.org/api/filings"
max-page-size = 50
timeout-secs = 10

[download]
directory = "./reports"
max-concurrent = 8
timeout-secs = 120
check-corruption = false
stem-pattern = "/name/_v2"

[user-agent]
client-name = "TestClient"
client-version = "2.1"
contact-email = "admin@example.com"
"#;

        let file = create_temp_config(config_content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(
            config.api.entry_point_url,
            "https://filings.example.org/api/filings"
        );
        assert_eq!(config.api.max_page_size, 50);
        assert_eq!(config.download.directory, PathBuf::from("./reports"));
        assert_eq!(config.download.max_concurrent, 8);
        assert!(!config.download.check_corruption);
        assert_eq!(config.download.stem_pattern.as_deref(), Some("/name/_v2"));
        assert_eq!(config.user_agent.client_name, "TestClient");
        assert_eq!(
            config.user_agent.contact_email.as_deref(),
            Some("admin@example.com")
        );
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let file = create_temp_config("");
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.api.entry_point_url, DEFAULT_ENTRY_POINT_URL);
        assert_eq!(config.api.max_page_size, 200);
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.download.max_concurrent, 5);
        assert!(config.download.check_corruption);
        assert_eq!(config.user_agent.client_name, "xbrl-filings");
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let file = create_temp_config("[download]\nmax-concurrent = 0\n");
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.download.max_concurrent, 0);
        assert_eq!(config.download.timeout_secs, 30);
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/config.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let config_content = r#"
[download]
stem-pattern = "no-placeholder"
"#;

        let file = create_temp_config(config_content);
        let result = load_config(file.path());
        assert!(matches!(result.unwrap_err(), ConfigError::Validation(_)));
    }

    #[test]
    fn test_compute_config_hash() {
        let file = create_temp_config("test content");

        let hash1 = compute_config_hash(file.path()).unwrap();
        let hash2 = compute_config_hash(file.path()).unwrap();

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_load_config_with_hash() {
        let file = create_temp_config("[api]\nmax-page-size = 10\n");
        let (config, hash) = load_config_with_hash(file.path()).unwrap();

        assert_eq!(config.api.max_page_size, 10);
        assert_eq!(hash, compute_config_hash(file.path()).unwrap());
    }
}
