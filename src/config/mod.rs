//! Configuration module for xbrl-filings
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use xbrl_filings::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("config.toml")).unwrap();
//! println!("Pages hold up to {} filings", config.api.max_page_size);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{ApiConfig, Config, DownloadConfig, UserAgentConfig, DEFAULT_ENTRY_POINT_URL};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
pub use validation::validate;
