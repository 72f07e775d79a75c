//! Download batches against a mock file server

use serde_json::json;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use xbrl_filings::download::{
    into_result, sha256_file, sha256_hex, Concurrency, DownloadOptions, Downloader,
};
use xbrl_filings::query::{PageSource, QueryParams};
use xbrl_filings::resource::DownloadRequest;
use xbrl_filings::{DownloadDescriptor, DownloadError, FileKind, Scope};

fn downloader(limit: usize) -> Downloader {
    Downloader::new(
        reqwest::Client::new(),
        DownloadOptions {
            concurrency: Concurrency::from_limit(limit),
            timeout: Duration::from_secs(10),
        },
    )
}

async fn serve(server: &MockServer, file_path: &str, body: &[u8]) {
    Mock::given(method("GET"))
        .and(path(file_path))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .mount(server)
        .await;
}

fn dir_entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

#[tokio::test]
async fn test_checksum_round_trip() {
    let server = MockServer::start().await;
    let body = b"PK\x03\x04 report package".to_vec();
    serve(&server, "/files/report.zip", &body).await;
    let temp_dir = TempDir::new().unwrap();

    let expected = sha256_hex(&body);
    let descriptor = DownloadDescriptor::new(
        format!("{}/files/report.zip", server.uri()),
        temp_dir.path(),
        "report",
    )
    .with_sha256(expected.to_uppercase());

    let outcomes = downloader(2).download_all(vec![descriptor]).await;
    assert_eq!(outcomes.len(), 1);

    let outcome = &outcomes[0];
    assert!(outcome.error.is_none(), "Unexpected error {:?}", outcome.error);
    assert_eq!(outcome.token, "report");

    let saved = outcome.path.as_ref().unwrap();
    assert_eq!(saved, &temp_dir.path().join("report.zip"));
    assert_eq!(sha256_file(saved).await.unwrap(), expected);
}

#[tokio::test]
async fn test_checksum_mismatch_leaves_corrupt_file() {
    let server = MockServer::start().await;
    serve(&server, "/files/report.zip", b"tampered content").await;
    let temp_dir = TempDir::new().unwrap();

    let descriptor = DownloadDescriptor::new(
        format!("{}/files/report.zip", server.uri()),
        temp_dir.path(),
        1u32,
    )
    .with_sha256(sha256_hex(b"original content"));

    let outcomes = downloader(2).download_all(vec![descriptor]).await;
    let outcome = &outcomes[0];

    assert!(outcome.path.is_none());
    match &outcome.error {
        Some(DownloadError::Corrupt {
            path,
            expected,
            calculated,
            ..
        }) => {
            assert_eq!(path, &temp_dir.path().join("report.zip.corrupt"));
            assert_eq!(expected, &sha256_hex(b"original content"));
            assert_eq!(calculated, &sha256_hex(b"tampered content"));
        }
        other => panic!("Expected corrupt download, got {:?}", other),
    }

    let corrupt = temp_dir.path().join("report.zip.corrupt");
    assert!(std::fs::metadata(&corrupt).unwrap().len() > 0);
    assert!(!temp_dir.path().join("report.zip").exists());
    assert_eq!(dir_entries(temp_dir.path()), vec!["report.zip.corrupt"]);
}

#[tokio::test]
async fn test_connection_failure_creates_no_file() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let address = listener.local_addr().unwrap();
    drop(listener);

    let temp_dir = TempDir::new().unwrap();
    let target = temp_dir.path().join("out");
    let url = format!("http://{}/report.zip", address);
    let descriptor = DownloadDescriptor::new(url, &target, ());

    let outcomes = downloader(1).download_all(vec![descriptor]).await;
    let error = outcomes[0].error.as_ref().unwrap();

    assert!(error.is_transport(), "Expected transport error, got {:?}", error);
    assert!(outcomes[0].path.is_none());
    assert!(!target.exists());
}

#[tokio::test]
async fn test_corrupt_item_does_not_abort_batch() {
    let server = MockServer::start().await;
    serve(&server, "/a.zip", b"first").await;
    serve(&server, "/b.zip", b"second").await;
    serve(&server, "/c.zip", b"third").await;
    let temp_dir = TempDir::new().unwrap();

    let descriptors = vec![
        DownloadDescriptor::new(format!("{}/a.zip", server.uri()), temp_dir.path(), 1)
            .with_sha256(sha256_hex(b"first")),
        DownloadDescriptor::new(format!("{}/b.zip", server.uri()), temp_dir.path(), 2)
            .with_sha256(sha256_hex(b"not second")),
        DownloadDescriptor::new(format!("{}/c.zip", server.uri()), temp_dir.path(), 3)
            .with_sha256(sha256_hex(b"third")),
    ];

    let outcomes = downloader(2).download_all(descriptors).await;
    let tokens: Vec<i32> = outcomes.iter().map(|o| o.token).collect();
    assert_eq!(tokens, vec![1, 2, 3]);

    assert!(outcomes[0].path.as_ref().is_some_and(|p| p.exists()));
    assert!(outcomes[1].error.as_ref().is_some_and(DownloadError::is_corrupt));
    assert!(outcomes[1].path.is_none());
    assert!(outcomes[2].path.as_ref().is_some_and(|p| p.exists()));

    // Eager raising surfaces the corrupt item after the whole batch ran
    match into_result(outcomes) {
        Err(DownloadError::Corrupt { url, .. }) => assert!(url.ends_with("/b.zip")),
        other => panic!("Expected corrupt download, got {:?}", other.map(|o| o.len())),
    }
    assert!(temp_dir.path().join("c.zip").exists());
}

#[tokio::test]
async fn test_start_order_equals_submission_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"x".to_vec()))
        .mount(&server)
        .await;
    let temp_dir = TempDir::new().unwrap();

    let descriptors: Vec<DownloadDescriptor<usize>> = (0..50)
        .map(|i| {
            DownloadDescriptor::new(
                format!("{}/files/{}.bin", server.uri(), i),
                temp_dir.path(),
                i,
            )
        })
        .collect();

    let outcomes = downloader(17).download_all(descriptors).await;
    assert_eq!(outcomes.len(), 50);
    assert!(outcomes.iter().all(|o| o.is_success()));
    assert!(outcomes.iter().enumerate().all(|(i, o)| o.token == i));

    // Requests are handed to the transport in submission order
    let started: Vec<u64> = outcomes.iter().map(|o| o.start_seq.unwrap()).collect();
    assert_eq!(started, (0..50).collect::<Vec<u64>>());

    let mut requested: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| r.url.path().to_string())
        .collect();
    requested.sort();
    let mut submitted: Vec<String> = (0..50).map(|i| format!("/files/{}.bin", i)).collect();
    submitted.sort();
    assert_eq!(requested, submitted);
}

#[tokio::test]
async fn test_slow_response_does_not_hold_back_next_download() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow.zip"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"slow".to_vec())
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;
    serve(&server, "/fast.zip", b"fast").await;
    let temp_dir = TempDir::new().unwrap();

    let descriptors = vec![
        DownloadDescriptor::new(format!("{}/slow.zip", server.uri()), temp_dir.path(), 0),
        DownloadDescriptor::new(format!("{}/fast.zip", server.uri()), temp_dir.path(), 1),
    ];

    let started = std::time::Instant::now();
    let mut stream = downloader(4).download_stream(descriptors);

    let first = stream.next().await.unwrap();
    assert_eq!(first.token, 1);
    assert!(first.is_success());
    assert!(started.elapsed() < Duration::from_secs(2));

    let second = stream.next().await.unwrap();
    assert_eq!(second.token, 0);
    assert!(second.is_success());
    assert_eq!(first.start_seq, Some(1));
    assert_eq!(second.start_seq, Some(0));
}

#[tokio::test]
async fn test_query_then_download_assigns_paths() {
    let server = MockServer::start().await;
    let package = b"package bytes".to_vec();

    Mock::given(method("GET"))
        .and(path("/api/filings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {
                    "type": "filing",
                    "id": "1",
                    "attributes": {
                        "package_url": "/packages/one-2023-12-31-en.zip",
                        "json_url": "/json/one.json",
                        "sha256": sha256_hex(&package)
                    }
                },
                {
                    "type": "filing",
                    "id": "2",
                    "attributes": {
                        "package_url": "/packages/two-2023-12-31-en.zip",
                        "sha256": sha256_hex(b"something else")
                    }
                }
            ]
        })))
        .mount(&server)
        .await;
    serve(&server, "/packages/one-2023-12-31-en.zip", &package).await;
    serve(&server, "/packages/two-2023-12-31-en.zip", &package).await;
    serve(&server, "/json/one.json", b"{}").await;

    let source = PageSource::new(
        reqwest::Client::new(),
        Url::parse(&format!("{}/api/filings", server.uri())).unwrap(),
        Duration::from_secs(5),
    );
    let mut result = source
        .run_query(&QueryParams::default(), Scope::filings_only(), None)
        .await
        .unwrap();

    let temp_dir = TempDir::new().unwrap();
    let request = DownloadRequest::new(vec![FileKind::Package, FileKind::Json], temp_dir.path())
        .with_stem_pattern("/name/_v1");
    let outcomes = result
        .filings
        .download(&downloader(3), &request)
        .await
        .unwrap();

    assert_eq!(outcomes.len(), 3);

    let one = result.filings.get("1").unwrap();
    assert_eq!(
        one.download_paths.package,
        Some(temp_dir.path().join("one-2023-12-31-en_v1.zip"))
    );
    assert_eq!(
        one.download_paths.json,
        Some(temp_dir.path().join("one_v1.json"))
    );

    let two = result.filings.get("2").unwrap();
    assert_eq!(two.download_paths.package, None);
    assert!(temp_dir
        .path()
        .join("two-2023-12-31-en_v1.zip.corrupt")
        .exists());

    let columns = result.filings.columns();
    assert!(columns.contains(&"package_download_path"));
    assert!(columns.contains(&"json_download_path"));
    assert!(!columns.contains(&"xhtml_download_path"));
}
