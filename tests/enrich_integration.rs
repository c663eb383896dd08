//! Enrichment pass against a mocked Semantic Scholar API.

mod support;

use std::time::Duration;

use paper_harvest::sources::SemanticScholarClient;
use paper_harvest::store::{NewPaper, PaperFilter, PaperStore};
use paper_harvest::{Database, EnrichmentPass, FetchConfig, Fetcher};
use serde_json::json;
use support::socket_guard::start_mock_server_or_skip;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> SemanticScholarClient {
    let fetcher = Fetcher::new(&FetchConfig {
        timeout: Duration::from_secs(5),
        retry_times: 1,
        retry_delay: Duration::from_millis(1),
        ..FetchConfig::default()
    })
    .unwrap();
    SemanticScholarClient::with_base_url(fetcher, server.uri()).with_delay(Duration::ZERO)
}

#[tokio::test]
async fn test_doi_lookup_fills_abstract_and_keeps_existing_doi() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/paper/DOI:10.1145/3658644.1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "title": "Oblivious Maps",
            "abstract": "We build oblivious maps.",
            "citationCount": 7,
            "publicationDate": "2024-10-14",
            "externalIds": {"DOI": "10.9999/other"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = PaperStore::new(Database::new_in_memory().await.unwrap());
    let mut paper = NewPaper::new("Oblivious Maps", "CCS");
    paper.doi = Some("10.1145/3658644.1".to_string());
    let id = store.insert(&paper).await.unwrap();

    let source = client(&server);
    let stats = EnrichmentPass::new(&source, &store)
        .run(&PaperFilter::default())
        .await
        .unwrap();

    assert_eq!(stats.success, 1);
    let stored = store.get(id).await.unwrap().unwrap();
    assert_eq!(stored.abstract_text.as_deref(), Some("We build oblivious maps."));
    assert_eq!(stored.doi.as_deref(), Some("10.1145/3658644.1"));
    assert_eq!(
        stored.notes.as_deref(),
        Some("Citations: 7; Date: 2024-10-14")
    );
}

#[tokio::test]
async fn test_title_search_used_without_doi_and_misses_are_failures() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/paper/search"))
        .and(query_param("query", "Known Title"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{
                "abstract": "Found by title.",
                "externalIds": {"DOI": "10.5555/found"}
            }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/paper/search"))
        .and(query_param("query", "Unknown Title"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .mount(&server)
        .await;

    let store = PaperStore::new(Database::new_in_memory().await.unwrap());
    let known = store.insert(&NewPaper::new("Known Title", "NDSS")).await.unwrap();
    let unknown = store
        .insert(&NewPaper::new("Unknown Title", "NDSS"))
        .await
        .unwrap();
    let mut done = NewPaper::new("Has Abstract", "NDSS");
    done.abstract_text = Some("Already here.".to_string());
    store.insert(&done).await.unwrap();

    let source = client(&server);
    let stats = EnrichmentPass::new(&source, &store)
        .run(&PaperFilter::default())
        .await
        .unwrap();

    assert_eq!(stats.success, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.skipped, 1);

    let known = store.get(known).await.unwrap().unwrap();
    assert_eq!(known.abstract_text.as_deref(), Some("Found by title."));
    assert_eq!(known.doi.as_deref(), Some("10.5555/found"));
    assert!(store.get(unknown).await.unwrap().unwrap().abstract_text.is_none());
}

#[tokio::test]
async fn test_front_matter_is_skipped_without_request() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .expect(0)
        .mount(&server)
        .await;

    let store = PaperStore::new(Database::new_in_memory().await.unwrap());
    let mut volume = NewPaper::new("Proceedings of the 2024 ACM Conference on Security", "CCS");
    volume.doi = Some("10.1145/978-1-4503".to_string());
    store.insert(&volume).await.unwrap();

    let source = client(&server);
    let stats = EnrichmentPass::new(&source, &store)
        .run(&PaperFilter::default())
        .await
        .unwrap();

    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.total(), 1);
}
