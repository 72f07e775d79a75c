//! Queries over multiple pages against a mock filings API

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};
use xbrl_filings::query::{PageSource, QueryParams};
use xbrl_filings::resource::ResourceKind;
use xbrl_filings::{PageError, Scope};

fn page_source(server: &MockServer) -> PageSource {
    let entry_point = Url::parse(&format!("{}/api/filings", server.uri())).unwrap();
    PageSource::new(reqwest::Client::new(), entry_point, Duration::from_secs(5))
}

fn filing(id: &str, entity: &str, messages: &[&str]) -> Value {
    json!({
        "type": "filing",
        "id": id,
        "attributes": {
            "country": "FI",
            "period_end": "2022-12-31",
            "package_url": format!("/{}/{}-2022-12-31-fi.zip", id, entity),
            "sha256": "00"
        },
        "relationships": {
            "entity": {"data": {"type": "entity", "id": entity}},
            "validation_messages": {
                "data": messages
                    .iter()
                    .map(|m| json!({"type": "validation_message", "id": m}))
                    .collect::<Vec<_>>()
            }
        }
    })
}

fn entity(id: &str) -> Value {
    json!({
        "type": "entity",
        "id": id,
        "attributes": {"identifier": format!("LEI{}", id), "name": format!("Company {}", id)}
    })
}

fn message(id: &str) -> Value {
    json!({
        "type": "validation_message",
        "id": id,
        "attributes": {
            "severity": "INCONSISTENCY",
            "code": "xbrl.5.2.5.2:calcInconsistency",
            "message": "Calculation inconsistent from ifrs-full:Assets in link role https://example.com/role/FinancialPosition reported sum 10 computed sum 12 context c1 unit u1 unreportedContributingItems none"
        }
    })
}

async fn mount_page(server: &MockServer, number: Option<&str>, body: Value) {
    let mock = Mock::given(method("GET")).and(path("/api/filings"));
    let mock = match number {
        Some(number) => mock.and(query_param("page[number]", number)),
        // Only the first page URL carries page[size]
        None => mock.and(query_param("page[size]", "200")),
    };
    mock.respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_duplicates_across_pages_keep_first() {
    let server = MockServer::start().await;

    mount_page(
        &server,
        None,
        json!({
            "data": [filing("1", "a", &[]), filing("2", "b", &[])],
            "included": [entity("a"), entity("b")],
            "meta": {"count": 4},
            "links": {"next": "/api/filings?page%5Bnumber%5D=2"}
        }),
    )
    .await;
    mount_page(
        &server,
        Some("2"),
        json!({
            "data": [filing("2", "b", &[]), filing("3", "a", &[])],
            "included": [entity("a"), entity("b")],
            "meta": {"count": 4},
            "links": {"next": "/api/filings?page%5Bnumber%5D=3"}
        }),
    )
    .await;
    mount_page(
        &server,
        Some("3"),
        json!({
            "data": [filing("1", "a", &[]), filing("4", "c", &[])],
            "included": [entity("a"), entity("c")],
            "meta": {"count": 4}
        }),
    )
    .await;

    let scope = Scope {
        entities: true,
        validation_messages: false,
    };
    let result = page_source(&server)
        .run_query(&QueryParams::default(), scope, None)
        .await
        .unwrap();

    let ids: Vec<&str> = result.filings.iter().map(|f| f.api_id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2", "3", "4"]);

    let duplicates: Vec<&str> = result
        .diagnostics
        .duplicate_filings()
        .iter()
        .map(|d| d.api_id.as_str())
        .collect();
    assert_eq!(duplicates, vec!["2", "1"]);

    // The first instance of a filing stays
    let first = result.filings.get("1").unwrap();
    assert!(!first.request.url.contains("page%5Bnumber%5D"));

    // One entity instance per identity, shared across pages
    let a1 = result.filings.get("1").unwrap().entity.as_ref().unwrap();
    let a3 = result.filings.get("3").unwrap().entity.as_ref().unwrap();
    assert!(Arc::ptr_eq(a1, a3));
    assert_eq!(a1.name.as_deref(), Some("Company a"));
    assert_eq!(result.filings.entities().len(), 3);
    assert!(result.diagnostics.orphans().is_empty());
    assert_eq!(result.pages.len(), 3);
    assert_eq!(result.pages[1].duplicate_filings, 1);
}

#[tokio::test]
async fn test_messages_are_linked_and_derived() {
    let server = MockServer::start().await;

    mount_page(
        &server,
        None,
        json!({
            "data": [filing("1", "a", &["m1", "m2"])],
            "included": [entity("a"), message("m1"), message("m2"), message("m3")],
            "jsonapi": {"version": "1.0"}
        }),
    )
    .await;

    let result = page_source(&server)
        .run_query(&QueryParams::default(), Scope::all(), None)
        .await
        .unwrap();

    let filing = result.filings.get("1").unwrap();
    let messages = filing.validation_messages.as_ref().unwrap();
    assert_eq!(messages.len(), 2);
    assert!(messages.iter().all(|m| m.filing_api_id() == Some("1")));
    assert_eq!(messages[0].calc_reported_sum, Some(10.0));
    assert_eq!(messages[0].calc_computed_sum, Some(12.0));
    assert_eq!(filing.language.as_deref(), Some("fi"));
    assert_eq!(result.api_version.as_deref(), Some("1.0"));

    let orphans = result.diagnostics.orphans();
    assert_eq!(orphans.len(), 1);
    assert_eq!(orphans[0].kind, ResourceKind::ValidationMessage);
    assert_eq!(orphans[0].api_id, "m3");
}

#[tokio::test]
async fn test_removing_filing_updates_views() {
    let server = MockServer::start().await;

    mount_page(
        &server,
        None,
        json!({
            "data": [filing("1", "a", &["m1"]), filing("2", "b", &["m2"])],
            "included": [entity("a"), entity("b"), message("m1"), message("m2")]
        }),
    )
    .await;

    let mut result = page_source(&server)
        .run_query(&QueryParams::default(), Scope::all(), None)
        .await
        .unwrap();
    assert_eq!(result.filings.entities().len(), 2);
    assert_eq!(result.filings.validation_messages().len(), 2);

    result.filings.remove("2");
    let entities: Vec<&str> = result
        .filings
        .entities()
        .iter()
        .map(|e| e.api_id.as_str())
        .collect();
    assert_eq!(entities, vec!["a"]);
    assert_eq!(result.filings.validation_messages().len(), 1);
}

#[tokio::test]
async fn test_malformed_page_returns_no_result() {
    let server = MockServer::start().await;

    mount_page(
        &server,
        None,
        json!({
            "data": [filing("1", "a", &[])],
            "links": {"next": "/api/filings?page%5Bnumber%5D=2"}
        }),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/api/filings"))
        .and(query_param("page[number]", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"data\": [truncated"))
        .expect(1)
        .mount(&server)
        .await;

    let result = page_source(&server)
        .run_query(&QueryParams::default(), Scope::filings_only(), None)
        .await;
    assert!(matches!(result, Err(PageError::Decode { .. })));
}
