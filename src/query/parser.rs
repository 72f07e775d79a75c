//! Parsing of one filings page
//!
//! A page is parsed in two passes. The first pass builds the subresources
//! the page introduces and indexes them by identity; the second builds the
//! filings and resolves their relations against that index, falling back to
//! the subresources of earlier pages.

use super::page::{ApiPage, PageLinks};
use crate::diagnostics::{Diagnostics, MissingReference, Origin, ValueFailure};
use crate::json::JsonTree;
use crate::resource::{Entity, Filing, ResourceKind, Scope, ValidationMessage};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Record name of page-level key paths in the diagnostics
pub const PAGE_RECORD: &str = "FilingsPage";

/// Identities seen so far in one query
#[derive(Debug, Clone, Default)]
pub struct SeenIds {
    pub filings: HashSet<String>,
    pub entities: HashSet<String>,
    pub validation_messages: HashSet<String>,
}

/// Subresources created by earlier pages of a query
#[derive(Debug, Clone, Default)]
pub struct SubresourcePools {
    pub entities: HashMap<String, Arc<Entity>>,
    pub validation_messages: HashMap<String, Arc<ValidationMessage>>,
}

impl SubresourcePools {
    /// Adds the subresources introduced by a page
    pub fn extend(&mut self, page: &ParsedPage) {
        for entity in &page.entities {
            self.entities
                .entry(entity.api_id.clone())
                .or_insert_with(|| entity.clone());
        }
        for message in &page.validation_messages {
            self.validation_messages
                .entry(message.api_id.clone())
                .or_insert_with(|| message.clone());
        }
    }
}

/// Page-level metadata
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageMeta {
    /// Number of filings matching the whole query (`meta.count`)
    pub query_filing_count: Option<i64>,

    /// JSON:API version (`jsonapi.version`)
    pub api_version: Option<String>,

    pub links: PageLinks,
}

/// What a page added to a query
#[derive(Debug, Clone, Default)]
pub struct ParsedPage {
    /// New filings in page order
    pub filings: Vec<Filing>,

    /// New entities in `included` order
    pub entities: Vec<Arc<Entity>>,

    /// New validation messages in `included` order
    pub validation_messages: Vec<Arc<ValidationMessage>>,

    /// Filing identities of this page that had been seen before
    pub duplicate_filings: Vec<String>,

    /// Entity identities referred to by the filings of this page
    pub referenced_entities: HashSet<String>,

    pub meta: PageMeta,
}

/// Parses the filings and subresources a page introduces
///
/// # Arguments
///
/// * `page` - The decoded page
/// * `scope` - Which subresources were requested
/// * `seen` - Identities of earlier pages; updated with the new ones
/// * `pools` - Subresources of earlier pages
/// * `diagnostics` - Registry receiving everything inconsistent
///
/// Nothing in here fails: repeated filings, unresolvable relations and
/// unexpected resource types are recorded as diagnostics and skipped.
pub fn parse_filings_page(
    page: &ApiPage,
    scope: Scope,
    seen: &mut SeenIds,
    pools: &SubresourcePools,
    diagnostics: &mut Diagnostics,
) -> ParsedPage {
    let mut parsed = ParsedPage {
        meta: parse_meta(page, diagnostics),
        ..ParsedPage::default()
    };

    // Pass 1: index new subresources
    let mut page_entities: HashMap<String, Arc<Entity>> = HashMap::new();
    let mut page_messages: HashMap<String, Arc<ValidationMessage>> = HashMap::new();

    for fragment in page.included() {
        let api_type = fragment_type(fragment);
        if !scope.includes_type(api_type) {
            diagnostics.record_unexpected_type(api_type, Origin::Included);
            continue;
        }
        let Some(api_id) = fragment_id(fragment, api_type, diagnostics) else {
            continue;
        };

        if api_type == ResourceKind::Entity.api_type() {
            if !seen.entities.insert(api_id.clone()) {
                continue;
            }
            let entity = Arc::new(Entity::from_fragment(
                &api_id,
                fragment,
                &page.request,
                &page.url,
                diagnostics,
            ));
            page_entities.insert(api_id, entity.clone());
            parsed.entities.push(entity);
        } else {
            if !seen.validation_messages.insert(api_id.clone()) {
                continue;
            }
            let message = Arc::new(ValidationMessage::from_fragment(
                &api_id,
                fragment,
                &page.request,
                &page.url,
                diagnostics,
            ));
            page_messages.insert(api_id, message.clone());
            parsed.validation_messages.push(message);
        }
    }

    // Pass 2: filings and their relations
    for fragment in page.data() {
        let api_type = fragment_type(fragment);
        if api_type != ResourceKind::Filing.api_type() {
            diagnostics.record_unexpected_type(api_type, Origin::Data);
            continue;
        }
        let Some(api_id) = fragment_id(fragment, api_type, diagnostics) else {
            continue;
        };

        if !seen.filings.insert(api_id.clone()) {
            diagnostics.record_duplicate_filing(&api_id, &page.request.url);
            parsed.duplicate_filings.push(api_id);
            continue;
        }

        let mut filing =
            Filing::from_fragment(&api_id, fragment, &page.request, &page.url, diagnostics);

        if scope.entities {
            filing.entity = resolve_entity(&filing, &page_entities, pools, diagnostics);
            if let Some(entity_id) = &filing.entity_api_id {
                parsed.referenced_entities.insert(entity_id.clone());
            }
        }
        if scope.validation_messages {
            filing.validation_messages = Some(resolve_messages(
                &filing,
                &page_messages,
                pools,
                diagnostics,
            ));
        }

        parsed.filings.push(filing);
    }

    if scope.validation_messages {
        for message in &parsed.validation_messages {
            if message.filing_api_id().is_none() {
                diagnostics.record_orphan(ResourceKind::ValidationMessage, &message.api_id);
            }
        }
    }

    tracing::debug!(
        "Parsed {}: {} new filings, {} new entities, {} new validation messages",
        page.url,
        parsed.filings.len(),
        parsed.entities.len(),
        parsed.validation_messages.len()
    );

    parsed
}

fn parse_meta(page: &ApiPage, diagnostics: &mut Diagnostics) -> PageMeta {
    let mut tree = JsonTree::new(PAGE_RECORD, &page.body, &page.url);
    tree.get("data");
    tree.get("included");

    let meta = PageMeta {
        query_filing_count: tree.get_i64("meta.count"),
        api_version: tree.get_str("jsonapi.version"),
        links: PageLinks {
            self_url: tree.get_url("links.self"),
            prev: tree.get_url("links.prev"),
            next: tree.get_url("links.next"),
            first: tree.get_url("links.first"),
            last: tree.get_url("links.last"),
        },
    };

    tree.close(diagnostics);
    meta
}

fn fragment_type(fragment: &Value) -> &str {
    fragment
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or("<missing>")
}

fn fragment_id(fragment: &Value, api_type: &str, diagnostics: &mut Diagnostics) -> Option<String> {
    match fragment.get("id") {
        Some(Value::String(id)) if !id.is_empty() => Some(id.clone()),
        Some(Value::Number(id)) => Some(id.to_string()),
        other => {
            diagnostics.record_value_failure(ValueFailure {
                record: PAGE_RECORD,
                api_id: None,
                field: format!("{}.id", api_type),
                value: other.map(Value::to_string).unwrap_or_default(),
                reason: "resource object without identity".to_string(),
            });
            None
        }
    }
}

fn resolve_entity(
    filing: &Filing,
    page_entities: &HashMap<String, Arc<Entity>>,
    pools: &SubresourcePools,
    diagnostics: &mut Diagnostics,
) -> Option<Arc<Entity>> {
    let found = filing.entity_api_id.as_deref().and_then(|entity_id| {
        page_entities
            .get(entity_id)
            .or_else(|| pools.entities.get(entity_id))
            .cloned()
    });

    if found.is_none() {
        diagnostics.record_missing_reference(MissingReference {
            from: ResourceKind::Filing,
            from_id: filing.api_id.clone(),
            target: ResourceKind::Entity,
            target_id: filing.entity_api_id.clone(),
        });
    }
    found
}

fn resolve_messages(
    filing: &Filing,
    page_messages: &HashMap<String, Arc<ValidationMessage>>,
    pools: &SubresourcePools,
    diagnostics: &mut Diagnostics,
) -> Vec<Arc<ValidationMessage>> {
    let mut messages = Vec::with_capacity(filing.declared_message_ids().len());

    for message_id in filing.declared_message_ids() {
        let found = page_messages
            .get(message_id)
            .or_else(|| pools.validation_messages.get(message_id));

        match found {
            Some(message) => {
                if !message.claim(&filing.api_id) {
                    tracing::warn!(
                        "Validation message {} of filing {} is also referred to by filing {}",
                        message_id,
                        message.filing_api_id().unwrap_or("?"),
                        filing.api_id
                    );
                }
                messages.push(message.clone());
            }
            None => diagnostics.record_missing_reference(MissingReference {
                from: ResourceKind::Filing,
                from_id: filing.api_id.clone(),
                target: ResourceKind::ValidationMessage,
                target_id: Some(message_id.clone()),
            }),
        }
    }

    messages
}
