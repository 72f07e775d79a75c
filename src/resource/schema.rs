//! Static field schemas of the record types
//!
//! Each record type lists its public fields in display order. A field may be
//! included only under a condition, for example download path fields only
//! once something has been downloaded.

use super::{FileKind, ResourceKind};
use chrono::{DateTime, NaiveDate, Utc};
use std::fmt;
use std::path::PathBuf;

/// Value type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    Float,
    Date,
    DateTime,
    Url,
    Path,
    TextList,
}

/// When a field is part of the columns of a result set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inclusion {
    Always,
    /// Some filing of the set has a download path of this kind
    WhenDownloaded(FileKind),
    /// Some filing of the set is linked to an entity
    WhenEntities,
}

/// A field of a record type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub inclusion: Inclusion,
}

impl FieldSpec {
    pub const fn new(name: &'static str, kind: FieldKind, inclusion: Inclusion) -> Self {
        Self {
            name,
            kind,
            inclusion,
        }
    }
}

/// A field read from a record
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Text(String),
    Integer(i64),
    Float(f64),
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
    Path(PathBuf),
    TextList(Vec<String>),
}

impl FieldValue {
    pub(crate) fn text(value: Option<&String>) -> Self {
        value.map_or(FieldValue::Null, |v| FieldValue::Text(v.clone()))
    }

    pub(crate) fn integer(value: Option<i64>) -> Self {
        value.map_or(FieldValue::Null, FieldValue::Integer)
    }

    pub(crate) fn float(value: Option<f64>) -> Self {
        value.map_or(FieldValue::Null, FieldValue::Float)
    }

    pub(crate) fn date(value: Option<NaiveDate>) -> Self {
        value.map_or(FieldValue::Null, FieldValue::Date)
    }

    pub(crate) fn datetime(value: Option<DateTime<Utc>>) -> Self {
        value.map_or(FieldValue::Null, FieldValue::DateTime)
    }

    pub(crate) fn path(value: Option<&PathBuf>) -> Self {
        value.map_or(FieldValue::Null, |p| FieldValue::Path(p.clone()))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => Ok(()),
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Integer(i) => write!(f, "{}", i),
            FieldValue::Float(x) => write!(f, "{}", x),
            FieldValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            FieldValue::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
            FieldValue::Path(p) => write!(f, "{}", p.display()),
            FieldValue::TextList(items) => f.write_str(&items.join(", ")),
        }
    }
}

/// Common interface of the record types
pub trait Record {
    const KIND: ResourceKind;

    /// Fields in display order
    fn schema() -> &'static [FieldSpec];

    fn api_id(&self) -> &str;

    /// Reads a field by name; `None` for names not in the schema
    fn field_value(&self, name: &str) -> Option<FieldValue>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_value_display() {
        assert_eq!(FieldValue::Null.to_string(), "");
        assert_eq!(FieldValue::Integer(4).to_string(), "4");
        assert_eq!(
            FieldValue::Date(NaiveDate::from_ymd_opt(2023, 1, 2).unwrap()).to_string(),
            "2023-01-02"
        );
        assert_eq!(
            FieldValue::TextList(vec!["a".into(), "b".into()]).to_string(),
            "a, b"
        );
    }

    #[test]
    fn test_constructors_map_none_to_null() {
        assert!(FieldValue::text(None).is_null());
        assert!(FieldValue::integer(None).is_null());
        assert_eq!(FieldValue::float(Some(1.5)), FieldValue::Float(1.5));
    }
}
