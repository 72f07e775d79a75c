use crate::diagnostics::{Diagnostics, ValueFailure};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;
use std::collections::HashSet;
use url::Url;

/// Kinds of strings a [`JsonTree`] can parse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseKind {
    Date,
    DateTime,
    Url,
}

impl ParseKind {
    fn describe(&self) -> &'static str {
        match self {
            ParseKind::Date => "not a date",
            ParseKind::DateTime => "not a datetime",
            ParseKind::Url => "not a URL",
        }
    }
}

/// Follows a dot-separated key path through nested objects
///
/// Returns `None` if a component is missing, an intermediate value is not
/// an object, or the final value is `null`.
pub fn lookup<'a>(value: &'a Value, key_path: &str) -> Option<&'a Value> {
    let mut current = value;
    for comp in key_path.split('.') {
        current = current.as_object()?.get(comp)?;
    }
    if current.is_null() {
        None
    } else {
        Some(current)
    }
}

/// Tracked reader over one JSON object
///
/// Every read is counted. [`close`](Self::close) hands the counts, the
/// parse failures and the key paths that were never read over to a
/// [`Diagnostics`] registry.
#[derive(Debug)]
pub struct JsonTree<'a> {
    record: &'static str,
    api_id: Option<String>,
    tree: &'a Value,
    base_url: &'a Url,
    reads: Vec<(String, bool)>,
    accessed: HashSet<String>,
    failures: Vec<ValueFailure>,
}

impl<'a> JsonTree<'a> {
    /// Creates a reader for a record of type `record`
    ///
    /// Relative URLs are resolved against `base_url`.
    pub fn new(record: &'static str, tree: &'a Value, base_url: &'a Url) -> Self {
        Self {
            record,
            api_id: None,
            tree,
            base_url,
            reads: Vec::new(),
            accessed: HashSet::new(),
            failures: Vec::new(),
        }
    }

    /// Sets the identity reported with parse failures
    pub fn set_api_id(&mut self, api_id: &str) {
        self.api_id = Some(api_id.to_string());
    }

    pub fn record(&self) -> &'static str {
        self.record
    }

    /// Reads the raw value at `key_path`
    pub fn get(&mut self, key_path: &str) -> Option<&'a Value> {
        let value = lookup(self.tree, key_path);
        self.reads.push((key_path.to_string(), value.is_some()));
        self.accessed.insert(key_path.to_string());
        value
    }

    /// Reads a string, or the text of a number or boolean
    pub fn get_str(&mut self, key_path: &str) -> Option<String> {
        match self.get(key_path)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Reads an integer, also from a numeric string
    pub fn get_i64(&mut self, key_path: &str) -> Option<i64> {
        match self.get(key_path)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Reads an array
    pub fn get_array(&mut self, key_path: &str) -> Option<&'a [Value]> {
        self.get(key_path)?.as_array().map(Vec::as_slice)
    }

    /// Reads a `YYYY-MM-DD` date
    pub fn get_date(&mut self, key_path: &str) -> Option<NaiveDate> {
        let raw = self.get_str(key_path)?;
        let parsed = parse_date(&raw);
        if parsed.is_none() {
            self.fail(key_path, raw, ParseKind::Date);
        }
        parsed
    }

    /// Reads an ISO 8601 datetime as UTC
    ///
    /// Strings without an offset, such as `2023-05-09 10:51:50.382633`, are
    /// taken to be UTC.
    pub fn get_datetime(&mut self, key_path: &str) -> Option<DateTime<Utc>> {
        let raw = self.get_str(key_path)?;
        let parsed = parse_datetime(&raw);
        if parsed.is_none() {
            self.fail(key_path, raw, ParseKind::DateTime);
        }
        parsed
    }

    /// Reads a URL, resolving relative references against the base URL
    pub fn get_url(&mut self, key_path: &str) -> Option<String> {
        let raw = self.get_str(key_path)?;
        match self.base_url.join(raw.trim()) {
            Ok(url) => Some(url.to_string()),
            Err(_) => {
                self.fail(key_path, raw, ParseKind::Url);
                None
            }
        }
    }

    fn fail(&mut self, key_path: &str, value: String, kind: ParseKind) {
        self.failures.push(ValueFailure {
            record: self.record,
            api_id: self.api_id.clone(),
            field: key_path.to_string(),
            value,
            reason: kind.describe().to_string(),
        });
    }

    /// Flushes read counts, parse failures and unread key paths
    ///
    /// Arrays are treated as leaves; their elements are not inspected.
    pub fn close(self, diagnostics: &mut Diagnostics) {
        for (key_path, found) in &self.reads {
            diagnostics.record_key_path_access(self.record, key_path, *found);
        }
        for failure in self.failures {
            diagnostics.record_value_failure(failure);
        }

        let mut unaccessed = Vec::new();
        collect_unaccessed(self.tree, "", &self.accessed, &mut unaccessed);
        for key_path in unaccessed {
            diagnostics.record_unaccessed_key_path(self.record, &key_path);
        }
    }
}

fn collect_unaccessed(
    value: &Value,
    prefix: &str,
    accessed: &HashSet<String>,
    out: &mut Vec<String>,
) {
    let Some(object) = value.as_object() else {
        return;
    };

    for (key, child) in object {
        let key_path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };

        if child.is_object() {
            collect_unaccessed(child, &key_path, accessed, out);
        } else if !accessed.contains(&key_path) {
            out.push(key_path);
        }
    }
}

/// Parses a `YYYY-M-D` date
pub(crate) fn parse_date(raw: &str) -> Option<NaiveDate> {
    let mut parts = raw.trim().split('-');
    let year = parts.next()?.parse().ok()?;
    let month = parts.next()?.parse().ok()?;
    let day = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month, day)
}

fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}
