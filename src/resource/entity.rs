//! Filer entities

use super::schema::{FieldKind, FieldSpec, FieldValue, Inclusion, Record};
use super::{ApiRequest, ResourceKind};
use crate::diagnostics::Diagnostics;
use crate::json::JsonTree;
use serde_json::Value;
use url::Url;

/// Entity that files reports, such as a listed company
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    /// Identity in the API (not the LEI)
    pub api_id: String,

    /// Identifier of the entity, typically an LEI code
    pub identifier: Option<String>,

    pub name: Option<String>,

    /// API URL listing the filings of this entity
    pub api_entity_filings_url: Option<String>,

    pub request: ApiRequest,
}

impl Entity {
    pub(crate) fn from_fragment(
        api_id: &str,
        fragment: &Value,
        request: &ApiRequest,
        base_url: &Url,
        diagnostics: &mut Diagnostics,
    ) -> Self {
        let mut tree = JsonTree::new(ResourceKind::Entity.record_name(), fragment, base_url);
        tree.set_api_id(api_id);
        tree.get("id");
        tree.get("type");

        let entity = Self {
            api_id: api_id.to_string(),
            identifier: tree.get_str("attributes.identifier"),
            name: tree.get_str("attributes.name"),
            api_entity_filings_url: tree.get_url("relationships.filings.links.related"),
            request: request.clone(),
        };

        tree.close(diagnostics);
        entity
    }
}

const ENTITY_SCHEMA: &[FieldSpec] = &[
    FieldSpec::new("api_id", FieldKind::Text, Inclusion::Always),
    FieldSpec::new("identifier", FieldKind::Text, Inclusion::Always),
    FieldSpec::new("name", FieldKind::Text, Inclusion::Always),
    FieldSpec::new("api_entity_filings_url", FieldKind::Url, Inclusion::Always),
    FieldSpec::new("request_url", FieldKind::Url, Inclusion::Always),
    FieldSpec::new("request_time", FieldKind::DateTime, Inclusion::Always),
];

impl Record for Entity {
    const KIND: ResourceKind = ResourceKind::Entity;

    fn schema() -> &'static [FieldSpec] {
        ENTITY_SCHEMA
    }

    fn api_id(&self) -> &str {
        &self.api_id
    }

    fn field_value(&self, name: &str) -> Option<FieldValue> {
        let value = match name {
            "api_id" => FieldValue::text(Some(&self.api_id)),
            "identifier" => FieldValue::text(self.identifier.as_ref()),
            "name" => FieldValue::text(self.name.as_ref()),
            "api_entity_filings_url" => FieldValue::text(self.api_entity_filings_url.as_ref()),
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
    use chrono::Utc;
    use serde_json::json;

    #[test]
    fn test_from_fragment() {
        let fragment = json!({
            "type": "entity",
            "id": "2648",
            "attributes": {
                "identifier": "743700XJC24THUPK0S03",
                "name": "Example Oyj",
                "api_id": "2648"
            },
            "relationships": {
                "filings": {"links": {"related": "/api/entities/743700XJC24THUPK0S03/filings"}}
            },
            "links": {"self": "/api/entities/743700XJC24THUPK0S03"}
        });
        let base = Url::parse("https://filings.xbrl.org/api/filings").unwrap();
        let request = ApiRequest::new("https://filings.xbrl.org/api/filings", Utc::now());
        let mut diagnostics = Diagnostics::new();

        let entity = Entity::from_fragment("2648", &fragment, &request, &base, &mut diagnostics);

        assert_eq!(entity.api_id, "2648");
        assert_eq!(entity.identifier.as_deref(), Some("743700XJC24THUPK0S03"));
        assert_eq!(entity.name.as_deref(), Some("Example Oyj"));
        assert_eq!(
            entity.api_entity_filings_url.as_deref(),
            Some("https://filings.xbrl.org/api/entities/743700XJC24THUPK0S03/filings")
        );

        let unaccessed: Vec<_> = diagnostics.unaccessed_key_paths().collect();
        assert!(unaccessed.contains(&("Entity", "attributes.api_id")));
        assert!(unaccessed.contains(&("Entity", "links.self")));

        assert_eq!(
            entity.field_value("name"),
            Some(FieldValue::Text("Example Oyj".to_string()))
        );
        assert_eq!(entity.field_value("nonexistent"), None);
    }
}
