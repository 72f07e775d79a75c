//! Validation messages of filings
//!
//! Messages come from the XBRL processor that validated the report. Two
//! message codes carry numbers in their text which are extracted into
//! separate fields:
//!
//! - `xbrl.5.2.5.2:calcInconsistency`: calculation inconsistencies
//! - `message:tech_duplicated_facts1`: duplicated facts with differing values

use super::schema::{FieldKind, FieldSpec, FieldValue, Inclusion, Record};
use super::{ApiRequest, ResourceKind};
use crate::diagnostics::{Diagnostics, ValueFailure};
use crate::json::JsonTree;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;
use url::Url;

/// Code of calculation inconsistency messages
pub const CALC_INCONSISTENCY_CODE: &str = "xbrl.5.2.5.2:calcInconsistency";

/// Code of duplicated fact messages
pub const DUPLICATED_FACTS_CODE: &str = "message:tech_duplicated_facts1";

struct MessagePatterns {
    line_item: Regex,
    short_role: Regex,
    reported_sum: Regex,
    computed_sum: Regex,
    context_id: Regex,
    unreported_items: Regex,
    comma: Regex,
    duplicate_first: Regex,
    duplicate_second: Regex,
}

fn patterns() -> Option<&'static MessagePatterns> {
    static PATTERNS: OnceLock<Option<MessagePatterns>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            Some(MessagePatterns {
                line_item: Regex::new(r"\bfrom (\S+)").ok()?,
                short_role: Regex::new(r"\blink role (\S+)").ok()?,
                reported_sum: Regex::new(r"\breported sum (\S+)").ok()?,
                computed_sum: Regex::new(r"\bcomputed sum (\S+)").ok()?,
                context_id: Regex::new(r"\bcontext (\S+)").ok()?,
                unreported_items: Regex::new(r"\bunreportedContributingItems (.+)").ok()?,
                comma: Regex::new(r"\s*,\s*").ok()?,
                duplicate_first: Regex::new(r"\bvalue:\s*(\S+)").ok()?,
                duplicate_second: Regex::new(r"!=\s+(\S+)").ok()?,
            })
        })
        .as_ref()
}

/// A single validation message of any severity
#[derive(Debug, Clone, Default)]
pub struct ValidationMessage {
    pub api_id: String,

    /// `ERROR`, `WARNING` or `INCONSISTENCY`
    pub severity: Option<String>,

    /// Message text, trimmed
    pub text: Option<String>,

    /// Code of the broken rule
    pub code: Option<String>,

    /// Computed sum of a calculation inconsistency
    pub calc_computed_sum: Option<f64>,

    /// Reported sum of a calculation inconsistency
    pub calc_reported_sum: Option<f64>,

    /// Context of the inconsistent calculation
    pub calc_context_id: Option<String>,

    /// Concept the inconsistent sum is reported for
    pub calc_line_item: Option<String>,

    /// Last path segment of the extended link role
    pub calc_short_role: Option<String>,

    /// Contributing items that were not reported
    pub calc_unreported_items: Option<Vec<String>>,

    /// Greater value of a duplicated fact
    pub duplicate_greater: Option<f64>,

    /// Lesser value of a duplicated fact
    pub duplicate_lesser: Option<f64>,

    pub request: Option<ApiRequest>,

    filing_api_id: OnceLock<String>,
}

impl PartialEq for ValidationMessage {
    fn eq(&self, other: &Self) -> bool {
        self.api_id == other.api_id
            && self.severity == other.severity
            && self.text == other.text
            && self.code == other.code
            && self.filing_api_id.get() == other.filing_api_id.get()
    }
}

impl ValidationMessage {
    /// Creates a message with only its identity set
    pub fn new(api_id: impl Into<String>) -> Self {
        Self {
            api_id: api_id.into(),
            ..Self::default()
        }
    }

    pub(crate) fn from_fragment(
        api_id: &str,
        fragment: &Value,
        request: &ApiRequest,
        base_url: &Url,
        diagnostics: &mut Diagnostics,
    ) -> Self {
        let mut tree = JsonTree::new(
            ResourceKind::ValidationMessage.record_name(),
            fragment,
            base_url,
        );
        tree.set_api_id(api_id);
        tree.get("id");
        tree.get("type");

        let mut message = Self {
            api_id: api_id.to_string(),
            severity: tree.get_str("attributes.severity"),
            text: tree
                .get_str("attributes.message")
                .map(|t| t.trim().to_string()),
            code: tree.get_str("attributes.code"),
            request: Some(request.clone()),
            ..Self::default()
        };
        tree.close(diagnostics);

        message.derive_fields(diagnostics);
        message
    }

    /// Identity of the filing this message belongs to
    ///
    /// Set when the first filing referring to the message is linked.
    pub fn filing_api_id(&self) -> Option<&str> {
        self.filing_api_id.get().map(String::as_str)
    }

    /// Links the message to a filing
    ///
    /// Returns false if it already belongs to a different filing.
    pub(crate) fn claim(&self, filing_api_id: &str) -> bool {
        let owner = self
            .filing_api_id
            .get_or_init(|| filing_api_id.to_string());
        owner == filing_api_id
    }

    fn derive_fields(&mut self, diagnostics: &mut Diagnostics) {
        let (Some(text), Some(patterns)) = (self.text.clone(), patterns()) else {
            return;
        };

        match self.code.as_deref() {
            Some(CALC_INCONSISTENCY_CODE) => {
                self.calc_computed_sum = self.derive_float(
                    &patterns.computed_sum,
                    &text,
                    "calc_computed_sum",
                    diagnostics,
                );
                self.calc_reported_sum = self.derive_float(
                    &patterns.reported_sum,
                    &text,
                    "calc_reported_sum",
                    diagnostics,
                );
                self.calc_context_id = capture(&patterns.context_id, &text);
                self.calc_line_item = capture(&patterns.line_item, &text);
                self.calc_short_role =
                    capture(&patterns.short_role, &text).map(|role| short_role(&role));

                self.calc_unreported_items = capture(&patterns.unreported_items, &text)
                    .filter(|items| !items.eq_ignore_ascii_case("none"))
                    .map(|items| {
                        patterns
                            .comma
                            .split(&items)
                            .map(str::to_string)
                            .collect()
                    });
            }
            Some(DUPLICATED_FACTS_CODE) => {
                let first =
                    self.derive_float(&patterns.duplicate_first, &text, "duplicate_*", diagnostics);
                let second = self.derive_float(
                    &patterns.duplicate_second,
                    &text,
                    "duplicate_*",
                    diagnostics,
                );
                if let (Some(a), Some(b)) = (first, second) {
                    self.duplicate_greater = Some(a.max(b));
                    self.duplicate_lesser = Some(a.min(b));
                }
            }
            _ => {}
        }
    }

    fn derive_float(
        &self,
        pattern: &Regex,
        text: &str,
        field: &str,
        diagnostics: &mut Diagnostics,
    ) -> Option<f64> {
        let raw = capture(pattern, text)?;
        match raw.replace(',', "").parse::<f64>() {
            Ok(value) => Some(value),
            Err(_) => {
                diagnostics.record_value_failure(ValueFailure {
                    record: ResourceKind::ValidationMessage.record_name(),
                    api_id: Some(self.api_id.clone()),
                    field: field.to_string(),
                    value: raw,
                    reason: "not a number".to_string(),
                });
                None
            }
        }
    }
}

fn capture(pattern: &Regex, text: &str) -> Option<String> {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Last segment of the path of a role URI, or the role itself
fn short_role(role: &str) -> String {
    let path = match Url::parse(role) {
        Ok(url) => url.path().to_string(),
        Err(_) => role.to_string(),
    };
    path.rsplit('/')
        .find(|segment| !segment.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| role.to_string())
}

const VALIDATION_MESSAGE_SCHEMA: &[FieldSpec] = &[
    FieldSpec::new("api_id", FieldKind::Text, Inclusion::Always),
    FieldSpec::new("severity", FieldKind::Text, Inclusion::Always),
    FieldSpec::new("text", FieldKind::Text, Inclusion::Always),
    FieldSpec::new("code", FieldKind::Text, Inclusion::Always),
    FieldSpec::new("filing_api_id", FieldKind::Text, Inclusion::Always),
    FieldSpec::new("calc_computed_sum", FieldKind::Float, Inclusion::Always),
    FieldSpec::new("calc_reported_sum", FieldKind::Float, Inclusion::Always),
    FieldSpec::new("calc_context_id", FieldKind::Text, Inclusion::Always),
    FieldSpec::new("calc_line_item", FieldKind::Text, Inclusion::Always),
    FieldSpec::new("calc_short_role", FieldKind::Text, Inclusion::Always),
    FieldSpec::new("calc_unreported_items", FieldKind::TextList, Inclusion::Always),
    FieldSpec::new("duplicate_greater", FieldKind::Float, Inclusion::Always),
    FieldSpec::new("duplicate_lesser", FieldKind::Float, Inclusion::Always),
    FieldSpec::new("request_url", FieldKind::Url, Inclusion::Always),
    FieldSpec::new("request_time", FieldKind::DateTime, Inclusion::Always),
];

impl Record for ValidationMessage {
    const KIND: ResourceKind = ResourceKind::ValidationMessage;

    fn schema() -> &'static [FieldSpec] {
        VALIDATION_MESSAGE_SCHEMA
    }

    fn api_id(&self) -> &str {
        &self.api_id
    }

    fn field_value(&self, name: &str) -> Option<FieldValue> {
        let value = match name {
            "api_id" => FieldValue::text(Some(&self.api_id)),
            "severity" => FieldValue::text(self.severity.as_ref()),
            "text" => FieldValue::text(self.text.as_ref()),
            "code" => FieldValue::text(self.code.as_ref()),
            "filing_api_id" => FieldValue::text(self.filing_api_id.get()),
            "calc_computed_sum" => FieldValue::float(self.calc_computed_sum),
            "calc_reported_sum" => FieldValue::float(self.calc_reported_sum),
            "calc_context_id" => FieldValue::text(self.calc_context_id.as_ref()),
            "calc_line_item" => FieldValue::text(self.calc_line_item.as_ref()),
            "calc_short_role" => FieldValue::text(self.calc_short_role.as_ref()),
            "calc_unreported_items" => self
                .calc_unreported_items
                .clone()
                .map_or(FieldValue::Null, FieldValue::TextList),
            "duplicate_greater" => FieldValue::float(self.duplicate_greater),
            "duplicate_lesser" => FieldValue::float(self.duplicate_lesser),
            "request_url" => FieldValue::text(self.request.as_ref().map(|r| &r.url)),
            "request_time" => FieldValue::datetime(self.request.as_ref().map(|r| r.time)),
            _ => return None,
        };
        Some(value)
    }
}
