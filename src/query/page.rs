//! Decoding of JSON:API page bodies

use crate::resource::ApiRequest;
use crate::PageError;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use url::Url;

/// One object of a JSON:API `errors` document
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ApiError {
    #[serde(default, deserialize_with = "status_as_string")]
    pub status: Option<String>,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub detail: Option<String>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = self.status.as_deref().unwrap_or("?");
        match (&self.title, &self.detail) {
            (Some(title), Some(detail)) => write!(f, "[{}] {}: {}", status, title, detail),
            (Some(text), None) | (None, Some(text)) => write!(f, "[{}] {}", status, text),
            (None, None) => write!(f, "[{}]", status),
        }
    }
}

// The API sends the status as a string, some proxies as a number.
fn status_as_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Pagination links of a page, resolved to absolute URLs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageLinks {
    pub self_url: Option<String>,
    pub prev: Option<String>,
    pub next: Option<String>,
    pub first: Option<String>,
    pub last: Option<String>,
}

/// A decoded page body
///
/// Construction through [`decode_page`] guarantees that the body is an
/// object whose `data` member is an array and whose `included` member, if
/// present, is an array as well.
#[derive(Debug, Clone)]
pub struct ApiPage {
    /// URL the page was requested from
    pub url: Url,

    pub body: Value,

    pub request: ApiRequest,
}

impl ApiPage {
    /// Primary resource objects
    pub fn data(&self) -> &[Value] {
        self.body
            .get("data")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Included resource objects
    pub fn included(&self) -> &[Value] {
        self.body
            .get("included")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Decodes a page body
///
/// # Arguments
///
/// * `url` - The URL the body was requested from
/// * `bytes` - The raw response body
/// * `time` - When the request was sent
///
/// # Returns
///
/// * `Ok(ApiPage)` - A structurally valid page
/// * `Err(PageError)` - The body is not JSON, is not a JSON:API document,
///   or is an `errors` document
pub fn decode_page(url: &Url, bytes: &[u8], time: DateTime<Utc>) -> Result<ApiPage, PageError> {
    let body: Value = serde_json::from_slice(bytes).map_err(|source| PageError::Decode {
        url: url.to_string(),
        source,
    })?;
    validate_body(url, body, time)
}

pub(crate) fn validate_body(
    url: &Url,
    body: Value,
    time: DateTime<Utc>,
) -> Result<ApiPage, PageError> {
    let malformed = |message: &str| PageError::Malformed {
        url: url.to_string(),
        message: message.to_string(),
    };

    let Some(object) = body.as_object() else {
        return Err(malformed("body is not a JSON object"));
    };

    if let Some(errors) = api_errors(&body) {
        return Err(PageError::Api {
            url: url.to_string(),
            errors,
        });
    }

    match object.get("data") {
        Some(Value::Array(_)) => {}
        Some(_) => return Err(malformed("'data' is not an array")),
        None => return Err(malformed("'data' is missing")),
    }

    match object.get("included") {
        None | Some(Value::Null) | Some(Value::Array(_)) => {}
        Some(_) => return Err(malformed("'included' is not an array")),
    }

    Ok(ApiPage {
        url: url.clone(),
        request: ApiRequest::new(url.as_str(), time),
        body,
    })
}

/// Reads the `errors` member of a document, if it has any errors
pub(crate) fn api_errors(body: &Value) -> Option<Vec<ApiError>> {
    let errors = body.get("errors")?.as_array()?;
    if errors.is_empty() {
        return None;
    }
    Some(
        errors
            .iter()
            .map(|e| serde_json::from_value(e.clone()).unwrap_or_default())
            .collect(),
    )
}
