//! Filings, the primary records of a query

use super::entity::Entity;
use super::schema::{FieldKind, FieldSpec, FieldValue, Inclusion, Record};
use super::validation_message::ValidationMessage;
use super::{ApiRequest, FileKind, ResourceKind};
use crate::diagnostics::Diagnostics;
use crate::json::JsonTree;
use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use url::Url;

/// Local paths of downloaded artifacts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadPaths {
    pub json: Option<PathBuf>,
    pub package: Option<PathBuf>,
    pub xhtml: Option<PathBuf>,
}

impl DownloadPaths {
    pub fn get(&self, kind: FileKind) -> Option<&Path> {
        match kind {
            FileKind::Json => self.json.as_deref(),
            FileKind::Package => self.package.as_deref(),
            FileKind::Xhtml => self.xhtml.as_deref(),
        }
    }

    pub fn set(&mut self, kind: FileKind, path: PathBuf) {
        match kind {
            FileKind::Json => self.json = Some(path),
            FileKind::Package => self.package = Some(path),
            FileKind::Xhtml => self.xhtml = Some(path),
        }
    }
}

/// A report filed by an entity
#[derive(Debug, Clone)]
pub struct Filing {
    pub api_id: String,

    /// Country where the filing was reported
    pub country: Option<String>,

    /// Filing index: LEI, reporting date and filing system
    pub filing_index: Option<String>,

    /// Two-letter language code, derived from the package or report file name
    pub language: Option<String>,

    /// End date of the last reporting period in the report
    pub last_end_date: Option<NaiveDate>,

    /// Reporting date from the package file name, else `last_end_date`
    pub reporting_date: Option<NaiveDate>,

    pub error_count: Option<i64>,
    pub inconsistency_count: Option<i64>,
    pub warning_count: Option<i64>,

    /// When the filing was added to the database
    pub added_time: Option<DateTime<Utc>>,

    /// When the filing was processed for the database
    pub processed_time: Option<DateTime<Utc>>,

    /// Identity of the entity as declared by the filing
    pub entity_api_id: Option<String>,

    /// Linked entity; `None` also when entities were not requested
    pub entity: Option<Arc<Entity>>,

    /// Linked messages; `None` when messages were not requested
    pub validation_messages: Option<Vec<Arc<ValidationMessage>>>,

    /// xBRL-JSON document
    pub json_url: Option<String>,

    /// Report package as filed
    pub package_url: Option<String>,

    /// Inline XBRL viewer page
    pub viewer_url: Option<String>,

    /// Inline XBRL report extracted from the package (API `report_url`)
    pub xhtml_url: Option<String>,

    /// SHA-256 of the report package
    pub package_sha256: Option<String>,

    pub download_paths: DownloadPaths,

    pub request: ApiRequest,

    pub(crate) declared_message_ids: Vec<String>,
}

impl Filing {
    pub(crate) fn from_fragment(
        api_id: &str,
        fragment: &Value,
        request: &ApiRequest,
        base_url: &Url,
        diagnostics: &mut Diagnostics,
    ) -> Self {
        let mut tree = JsonTree::new(ResourceKind::Filing.record_name(), fragment, base_url);
        tree.set_api_id(api_id);
        tree.get("id");
        tree.get("type");

        let declared_message_ids = tree
            .get_array("relationships.validation_messages.data")
            .unwrap_or_default()
            .iter()
            .filter_map(|reference| match reference.get("id") {
                Some(Value::String(id)) => Some(id.clone()),
                Some(Value::Number(id)) => Some(id.to_string()),
                _ => None,
            })
            .collect();

        let mut filing = Self {
            api_id: api_id.to_string(),
            country: tree.get_str("attributes.country"),
            filing_index: tree.get_str("attributes.fxo_id"),
            language: None,
            last_end_date: tree.get_date("attributes.period_end"),
            reporting_date: None,
            error_count: tree.get_i64("attributes.error_count"),
            inconsistency_count: tree.get_i64("attributes.inconsistency_count"),
            warning_count: tree.get_i64("attributes.warning_count"),
            added_time: tree.get_datetime("attributes.date_added"),
            processed_time: tree.get_datetime("attributes.processed"),
            entity_api_id: tree.get_str("relationships.entity.data.id"),
            entity: None,
            validation_messages: None,
            json_url: tree.get_url("attributes.json_url"),
            package_url: tree.get_url("attributes.package_url"),
            viewer_url: tree.get_url("attributes.viewer_url"),
            xhtml_url: tree.get_url("attributes.report_url"),
            package_sha256: tree.get_str("attributes.sha256"),
            download_paths: DownloadPaths::default(),
            request: request.clone(),
            declared_message_ids,
        };
        tree.close(diagnostics);

        filing.language = filing.derive_language();
        filing.reporting_date = filing.derive_reporting_date();
        filing
    }

    /// Download URL of an artifact
    pub fn url(&self, kind: FileKind) -> Option<&str> {
        match kind {
            FileKind::Json => self.json_url.as_deref(),
            FileKind::Package => self.package_url.as_deref(),
            FileKind::Xhtml => self.xhtml_url.as_deref(),
        }
    }

    /// Identities of the messages the filing refers to
    pub fn declared_message_ids(&self) -> &[String] {
        &self.declared_message_ids
    }

    fn derive_language(&self) -> Option<String> {
        let resolved = [self.package_url.as_deref(), self.xhtml_url.as_deref()]
            .into_iter()
            .filter_map(url_stem)
            .find_map(|stem| language_from_stem(&stem));
        correct_language_code(resolved, self.country.as_deref())
    }

    /// Last valid `YYYY-MM-DD` date in the package file stem
    fn derive_reporting_date(&self) -> Option<NaiveDate> {
        let Some(stem) = url_stem(self.package_url.as_deref()) else {
            return self.last_end_date;
        };
        let normalized: String = stem
            .chars()
            .map(|c| if c.is_ascii_digit() { c } else { '-' })
            .collect();

        reporting_date_pattern()
            .and_then(|re| re.captures_iter(&normalized).last())
            .and_then(|caps| {
                NaiveDate::from_ymd_opt(
                    caps[1].parse().ok()?,
                    caps[2].parse().ok()?,
                    caps[3].parse().ok()?,
                )
            })
            .or(self.last_end_date)
    }
}

/// Percent-decoded file stem of an absolute URL
fn url_stem(url: Option<&str>) -> Option<String> {
    let url = Url::parse(url?).ok()?;
    let path = urlencoding::decode(url.path()).ok()?;
    let name = path.rsplit('/').next()?;
    let stem = Path::new(name).file_stem()?.to_string_lossy().into_owned();
    if stem.trim().is_empty() {
        None
    } else {
        Some(stem)
    }
}

fn language_from_stem(stem: &str) -> Option<String> {
    let normalized = stem.replace('_', "-");
    let last_part = normalized.rsplit('-').next()?;
    if !last_part.chars().all(char::is_alphabetic) {
        return None;
    }

    let code = last_part.to_lowercase();
    match last_part.chars().count() {
        2 => Some(code),
        3 => alpha2_from_alpha3(&code).map(str::to_string),
        _ => None,
    }
}

/// Fixes country codes used in place of language codes
fn correct_language_code(code: Option<String>, country: Option<&str>) -> Option<String> {
    let code = code?;
    let corrected = match (country, code.as_str()) {
        (Some("CZ"), "cz") => "cs",
        (Some("SE"), "se") => "sv",
        (Some("DK"), "dk") => "da",
        // Bokmål and Nynorsk are both reported as Norwegian
        (Some("NO"), "nb" | "nn") => "no",
        _ => return Some(code),
    };
    Some(corrected.to_string())
}

fn reporting_date_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r"\b(\d{4})-(0[1-9]|1[012])-(0[1-9]|[12]\d|3[01])\b").ok()
        })
        .as_ref()
}

/// ISO 639-2 codes of the official EU languages mapped to ISO 639-1
fn alpha2_from_alpha3(code: &str) -> Option<&'static str> {
    let alpha2 = match code {
        "bul" => "bg",
        "ces" => "cs",
        "dan" => "da",
        "deu" => "de",
        "ell" => "el",
        "eng" => "en",
        "est" => "et",
        "fin" => "fi",
        "fra" => "fr",
        "gle" => "ga",
        "hrv" => "hr",
        "hun" => "hu",
        "ita" => "it",
        "lav" => "lv",
        "lit" => "lt",
        "mlt" => "mt",
        "nld" => "nl",
        "pol" => "pl",
        "por" => "pt",
        "ron" => "ro",
        "slk" => "sk",
        "slv" => "sl",
        "spa" => "es",
        "swe" => "sv",
        _ => return None,
    };
    Some(alpha2)
}

const FILING_SCHEMA: &[FieldSpec] = &[
    FieldSpec::new("api_id", FieldKind::Text, Inclusion::Always),
    FieldSpec::new("country", FieldKind::Text, Inclusion::Always),
    FieldSpec::new("filing_index", FieldKind::Text, Inclusion::Always),
    FieldSpec::new("language", FieldKind::Text, Inclusion::Always),
    FieldSpec::new("last_end_date", FieldKind::Date, Inclusion::Always),
    FieldSpec::new("reporting_date", FieldKind::Date, Inclusion::Always),
    FieldSpec::new("error_count", FieldKind::Integer, Inclusion::Always),
    FieldSpec::new("inconsistency_count", FieldKind::Integer, Inclusion::Always),
    FieldSpec::new("warning_count", FieldKind::Integer, Inclusion::Always),
    FieldSpec::new("added_time", FieldKind::DateTime, Inclusion::Always),
    FieldSpec::new("processed_time", FieldKind::DateTime, Inclusion::Always),
    FieldSpec::new("entity_api_id", FieldKind::Text, Inclusion::WhenEntities),
    FieldSpec::new("json_url", FieldKind::Url, Inclusion::Always),
    FieldSpec::new("package_url", FieldKind::Url, Inclusion::Always),
    FieldSpec::new("viewer_url", FieldKind::Url, Inclusion::Always),
    FieldSpec::new("xhtml_url", FieldKind::Url, Inclusion::Always),
    FieldSpec::new(
        "json_download_path",
        FieldKind::Path,
        Inclusion::WhenDownloaded(FileKind::Json),
    ),
    FieldSpec::new(
        "package_download_path",
        FieldKind::Path,
        Inclusion::WhenDownloaded(FileKind::Package),
    ),
    FieldSpec::new(
        "xhtml_download_path",
        FieldKind::Path,
        Inclusion::WhenDownloaded(FileKind::Xhtml),
    ),
    FieldSpec::new("package_sha256", FieldKind::Text, Inclusion::Always),
    FieldSpec::new("request_url", FieldKind::Url, Inclusion::Always),
    FieldSpec::new("request_time", FieldKind::DateTime, Inclusion::Always),
];

impl Record for Filing {
    const KIND: ResourceKind = ResourceKind::Filing;

    fn schema() -> &'static [FieldSpec] {
        FILING_SCHEMA
    }

    fn api_id(&self) -> &str {
        &self.api_id
    }

    fn field_value(&self, name: &str) -> Option<FieldValue> {
        let value = match name {
            "api_id" => FieldValue::text(Some(&self.api_id)),
            "country" => FieldValue::text(self.country.as_ref()),
            "filing_index" => FieldValue::text(self.filing_index.as_ref()),
            "language" => FieldValue::text(self.language.as_ref()),
            "last_end_date" => FieldValue::date(self.last_end_date),
            "reporting_date" => FieldValue::date(self.reporting_date),
            "error_count" => FieldValue::integer(self.error_count),
            "inconsistency_count" => FieldValue::integer(self.inconsistency_count),
            "warning_count" => FieldValue::integer(self.warning_count),
            "added_time" => FieldValue::datetime(self.added_time),
            "processed_time" => FieldValue::datetime(self.processed_time),
            "entity_api_id" => FieldValue::text(self.entity_api_id.as_ref()),
            "json_url" => FieldValue::text(self.json_url.as_ref()),
            "package_url" => FieldValue::text(self.package_url.as_ref()),
            "viewer_url" => FieldValue::text(self.viewer_url.as_ref()),
            "xhtml_url" => FieldValue::text(self.xhtml_url.as_ref()),
            "json_download_path" => FieldValue::path(self.download_paths.json.as_ref()),
            "package_download_path" => FieldValue::path(self.download_paths.package.as_ref()),
            "xhtml_download_path" => FieldValue::path(self.download_paths.xhtml.as_ref()),
            "package_sha256" => FieldValue::text(self.package_sha256.as_ref()),
            "request_url" => FieldValue::text(Some(&self.request.url)),
            "request_time" => FieldValue::DateTime(self.request.time),
            _ => return None,
        };
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Utc};
    use serde_json::json;

    fn filing_from(fragment: Value) -> (Filing, Diagnostics) {
        let base = Url::parse("https://filings.xbrl.org/api/filings").unwrap();
        let request = ApiRequest::new("https://filings.xbrl.org/api/filings", Utc::now());
        let mut diagnostics = Diagnostics::new();
        let id = fragment["id"].as_str().unwrap_or("0").to_string();
        let filing = Filing::from_fragment(&id, &fragment, &request, &base, &mut diagnostics);
        (filing, diagnostics)
    }

    fn with_package(package_url: &str, period_end: &str) -> Filing {
        filing_from(json!({
            "type": "filing",
            "id": "1",
            "attributes": {"package_url": package_url, "period_end": period_end}
        }))
        .0
    }

    #[test]
    fn test_from_fragment() {
        let (filing, diagnostics) = filing_from(json!({
            "type": "filing",
            "id": "4261",
            "attributes": {
                "country": "FI",
                "fxo_id": "743700XJC24THUPK0S03-2022-12-31-ESEF-FI-0",
                "period_end": "2022-12-31",
                "error_count": 0,
                "inconsistency_count": 2,
                "warning_count": 5,
                "date_added": "2023-04-19 10:21:41.286918",
                "processed": "2023-04-19 10:21:41.286918",
                "json_url": "/743700XJC24THUPK0S03/2022-12-31/ESEF/FI/0/report.json",
                "package_url": "/743700XJC24THUPK0S03/2022-12-31/ESEF/FI/0/example-2022-12-31-fi.zip",
                "viewer_url": "/743700XJC24THUPK0S03/2022-12-31/ESEF/FI/0/reports/ixbrlviewer.html",
                "report_url": "/743700XJC24THUPK0S03/2022-12-31/ESEF/FI/0/reports/report.xhtml",
                "sha256": "0123abcd"
            },
            "relationships": {
                "entity": {"data": {"type": "entity", "id": "2648"}},
                "validation_messages": {"data": [
                    {"type": "validation_message", "id": "10"},
                    {"type": "validation_message", "id": 11}
                ]}
            }
        }));

        assert_eq!(filing.api_id, "4261");
        assert_eq!(filing.country.as_deref(), Some("FI"));
        assert_eq!(filing.inconsistency_count, Some(2));
        assert_eq!(filing.entity_api_id.as_deref(), Some("2648"));
        assert_eq!(filing.declared_message_ids(), &["10".to_string(), "11".to_string()]);
        assert_eq!(
            filing.package_url.as_deref(),
            Some("https://filings.xbrl.org/743700XJC24THUPK0S03/2022-12-31/ESEF/FI/0/example-2022-12-31-fi.zip")
        );
        assert_eq!(filing.url(FileKind::Xhtml), filing.xhtml_url.as_deref());
        assert_eq!(filing.package_sha256.as_deref(), Some("0123abcd"));
        assert_eq!(filing.language.as_deref(), Some("fi"));
        assert_eq!(filing.reporting_date, NaiveDate::from_ymd_opt(2022, 12, 31));
        assert!(filing.added_time.is_some());
        assert!(filing.entity.is_none());
        assert!(filing.validation_messages.is_none());
        assert!(!diagnostics.has_issues());
    }

    #[test]
    fn test_language_from_alpha3() {
        let filing = with_package("https://x.org/a/report_2021-12-31_eng.zip", "2021-12-31");
        assert_eq!(filing.language.as_deref(), Some("en"));

        let filing = with_package("https://x.org/a/report-2021-12-31-xyz.zip", "2021-12-31");
        assert_eq!(filing.language, None);

        let filing = with_package("https://x.org/a/report-2021-12-31-1.zip", "2021-12-31");
        assert_eq!(filing.language, None);
    }

    #[test]
    fn test_reporting_date_falls_back_to_period_end() {
        let filing = with_package("https://x.org/a/ACME_2022_06_30_report.zip", "2022-12-31");
        assert_eq!(filing.reporting_date.map(|d| d.month()), Some(6));

        // Single-digit months are not dates
        let filing = with_package("https://x.org/a/ACME_2022-6-30_report.zip", "2022-12-31");
        assert_eq!(filing.reporting_date, NaiveDate::from_ymd_opt(2022, 12, 31));

        // Impossible dates fall back too
        let filing = with_package("https://x.org/a/ACME-2022-02-31.zip", "2022-12-31");
        assert_eq!(filing.reporting_date, NaiveDate::from_ymd_opt(2022, 12, 31));

        let filing = with_package("https://x.org/a/annual_report.zip", "2022-12-31");
        assert_eq!(filing.reporting_date, NaiveDate::from_ymd_opt(2022, 12, 31));
    }

    #[test]
    fn test_reporting_date_separators_and_last_match() {
        let filing = with_package("https://x.org/a/ABC.2021.12.31.zip", "2020-01-01");
        assert_eq!(filing.reporting_date, NaiveDate::from_ymd_opt(2021, 12, 31));

        let filing = with_package(
            "https://x.org/a/2020-01-31-report-2021-12-31.zip",
            "2020-01-01",
        );
        assert_eq!(filing.reporting_date, NaiveDate::from_ymd_opt(2021, 12, 31));
    }

    #[test]
    fn test_language_code_corrections() {
        let cases = [
            ("CZ", "ABC-2022-12-31-cz.zip", Some("cs")),
            ("SE", "ABC-2022-12-31-se.zip", Some("sv")),
            ("DK", "ABC-2022-12-31-dk.zip", Some("da")),
            ("NO", "ABC-2022-12-31-nb.zip", Some("no")),
            ("NO", "ABC-2022-12-31-nn.zip", Some("no")),
            ("FI", "ABC-2022-12-31-se.zip", Some("se")),
        ];

        for (country, name, expected) in cases {
            let (filing, _) = filing_from(json!({
                "type": "filing",
                "id": "1",
                "attributes": {
                    "country": country,
                    "package_url": format!("https://x.org/a/{}", name)
                }
            }));
            assert_eq!(filing.language.as_deref(), expected, "{} {}", country, name);
        }
    }

    #[test]
    fn test_language_falls_back_to_report_url() {
        let (filing, _) = filing_from(json!({
            "type": "filing",
            "id": "1",
            "attributes": {
                "package_url": "https://x.org/a/ABC.zip",
                "report_url": "https://x.org/a/reports/abc-2022-12-31-fi.xhtml"
            }
        }));
        assert_eq!(filing.language.as_deref(), Some("fi"));

        let (filing, _) = filing_from(json!({
            "type": "filing",
            "id": "2",
            "attributes": {"package_url": "https://x.org/a/ABC.zip"}
        }));
        assert_eq!(filing.language, None);
    }

    #[test]
    fn test_invalid_date_is_diagnosed() {
        let (filing, diagnostics) = filing_from(json!({
            "type": "filing",
            "id": "5",
            "attributes": {"period_end": "December 2022"}
        }));

        assert_eq!(filing.last_end_date, None);
        assert_eq!(diagnostics.value_failures().len(), 1);
        assert_eq!(diagnostics.value_failures()[0].field, "attributes.period_end");
    }

    #[test]
    fn test_download_paths() {
        let mut filing = with_package("https://x.org/a.zip", "2022-12-31");
        assert_eq!(filing.field_value("package_download_path"), Some(FieldValue::Null));

        filing
            .download_paths
            .set(FileKind::Package, PathBuf::from("/tmp/a.zip"));
        assert_eq!(
            filing.download_paths.get(FileKind::Package),
            Some(Path::new("/tmp/a.zip"))
        );
        assert_eq!(
            filing.field_value("package_download_path"),
            Some(FieldValue::Path(PathBuf::from("/tmp/a.zip")))
        );
    }
}
