//! Records of the filings API and the query result collection
//!
//! A query produces [`Filing`]s. Depending on the [`Scope`], each filing is
//! linked to its [`Entity`] and its [`ValidationMessage`]s. Subresources are
//! shared: all filings of one entity hold the same `Arc<Entity>`.

pub mod collection;
pub mod downloads;
pub mod entity;
pub mod filing;
pub mod schema;
pub mod validation_message;

pub use collection::{FilingSet, SubresourceView};
pub use downloads::{DownloadItem, DownloadRequest, FileRef};
pub use entity::Entity;
pub use filing::{DownloadPaths, Filing};
pub use schema::{FieldKind, FieldSpec, FieldValue, Inclusion, Record};
pub use validation_message::ValidationMessage;

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

/// Resource types of the filings API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Filing,
    Entity,
    ValidationMessage,
}

impl ResourceKind {
    /// The JSON:API `type` string
    pub fn api_type(&self) -> &'static str {
        match self {
            ResourceKind::Filing => "filing",
            ResourceKind::Entity => "entity",
            ResourceKind::ValidationMessage => "validation_message",
        }
    }

    /// Record name used in diagnostics
    pub fn record_name(&self) -> &'static str {
        match self {
            ResourceKind::Filing => "Filing",
            ResourceKind::Entity => "Entity",
            ResourceKind::ValidationMessage => "ValidationMessage",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.api_type())
    }
}

/// Which subresources a query retrieves along with the filings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Scope {
    pub entities: bool,
    pub validation_messages: bool,
}

impl Scope {
    /// Filings only
    pub fn filings_only() -> Self {
        Self::default()
    }

    /// Filings, entities and validation messages
    pub fn all() -> Self {
        Self {
            entities: true,
            validation_messages: true,
        }
    }

    /// Value of the JSON:API `include` parameter, if any
    pub fn include_param(&self) -> Option<String> {
        let mut include = Vec::new();
        if self.entities {
            include.push("entity");
        }
        if self.validation_messages {
            include.push("validation_messages");
        }
        if include.is_empty() {
            None
        } else {
            Some(include.join(","))
        }
    }

    /// Returns true if `api_type` is expected in the `included` array
    pub fn includes_type(&self, api_type: &str) -> bool {
        (self.entities && api_type == ResourceKind::Entity.api_type())
            || (self.validation_messages && api_type == ResourceKind::ValidationMessage.api_type())
    }
}

/// Where and when a record was retrieved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    pub url: String,
    pub time: DateTime<Utc>,
}

impl ApiRequest {
    pub fn new(url: impl Into<String>, time: DateTime<Utc>) -> Self {
        Self {
            url: url.into(),
            time,
        }
    }
}

/// Downloadable artifacts of a filing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FileKind {
    /// xBRL-JSON document
    Json,
    /// Report package (zip)
    Package,
    /// Inline XBRL report
    Xhtml,
}

impl FileKind {
    pub const ALL: [FileKind; 3] = [FileKind::Json, FileKind::Package, FileKind::Xhtml];

    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Json => "json",
            FileKind::Package => "package",
            FileKind::Xhtml => "xhtml",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(FileKind::Json),
            "package" => Ok(FileKind::Package),
            "xhtml" => Ok(FileKind::Xhtml),
            other => Err(format!(
                "Unknown file kind '{}', expected one of: json, package, xhtml",
                other
            )),
        }
    }
}
