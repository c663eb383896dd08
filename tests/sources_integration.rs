//! End-to-end crawl tests: mocked upstreams, real adapters, real store.

mod support;

use std::time::Duration;

use paper_harvest::sources::{DblpAdapter, IacrAdapter, find_venue};
use paper_harvest::store::{PaperFilter, PaperStore};
use paper_harvest::{
    AdapterRegistry, Database, FetchConfig, Fetcher, IngestCoordinator, SourceKind, SourceTask,
    TaskState,
};
use serde_json::json;
use support::socket_guard::start_mock_server_or_skip;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_fetcher(retry_times: u32) -> Fetcher {
    Fetcher::new(&FetchConfig {
        timeout: Duration::from_secs(5),
        retry_times,
        retry_delay: Duration::from_millis(5),
        ..FetchConfig::default()
    })
    .unwrap()
}

async fn memory_store() -> PaperStore {
    PaperStore::new(Database::new_in_memory().await.unwrap())
}

fn dblp_body() -> serde_json::Value {
    json!({
        "result": {
            "hits": {
                "@total": "3",
                "hit": [
                    {"info": {
                        "title": "Succinct Arguments from Lattices.",
                        "authors": {"author": [{"text": "Alice"}, {"text": "Bob"}]},
                        "ee": "https://eprint.example.org/2024/001.pdf",
                        "year": "2024",
                        "key": "conf/crypto/AB24",
                        "doi": "10.1007/978-3-031-00001-1_1"
                    }},
                    {"info": {
                        "title": "Landing Page Only",
                        "authors": {"author": {"text": "Carol"}},
                        "ee": "https://doi.org/10.1007/xyz",
                        "year": "2024",
                        "key": "conf/crypto/C24"
                    }},
                    {"info": {
                        "title": "Wrong Stream",
                        "year": "2024",
                        "key": "conf/cryptoeprint/D24"
                    }}
                ]
            }
        }
    })
}

async fn mount_dblp(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/search/publ/api"))
        .and(query_param("format", "json"))
        .and(query_param("q", "conf/crypto 2024"))
        .respond_with(ResponseTemplate::new(200).set_body_json(dblp_body()))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_dblp_crawl_normalizes_and_filters_hits() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_dblp(&server).await;

    let adapter = DblpAdapter::with_base_url(
        fast_fetcher(1),
        format!("{}/search/publ/api", server.uri()),
        100,
    );
    let crypto = find_venue("crypto").unwrap();
    let papers = paper_harvest::SourceAdapter::crawl(&adapter, crypto, 2024)
        .await
        .unwrap();

    assert_eq!(papers.len(), 2);
    let first = &papers[0];
    assert_eq!(first.conference, "CRYPTO");
    assert_eq!(first.year, Some(2024));
    assert_eq!(first.authors, vec!["Alice", "Bob"]);
    assert_eq!(
        first.pdf_url.as_deref(),
        Some("https://eprint.example.org/2024/001.pdf")
    );
    assert_eq!(papers[1].pdf_url, None);
}

#[tokio::test]
async fn test_second_dblp_ingest_inserts_nothing_new() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_dblp(&server).await;

    let mut registry = AdapterRegistry::new();
    registry.register(Box::new(DblpAdapter::with_base_url(
        fast_fetcher(1),
        format!("{}/search/publ/api", server.uri()),
        100,
    )));
    let store = memory_store().await;
    let coordinator = IngestCoordinator::new(&registry, &store);
    let task = SourceTask::new(SourceKind::Dblp, find_venue("crypto").unwrap(), 2024);

    let first = coordinator.run(&[task]).await;
    let second = coordinator.run(&[task]).await;

    assert_eq!(first.inserted(), 2);
    assert_eq!(second.inserted(), 0);
    assert_eq!(second.skipped(), 2);
    assert_eq!(store.query(&PaperFilter::default()).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_iacr_program_keeps_only_paper_talks() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let program = json!({
        "days": [{
            "timeslots": [{
                "sessions": [
                    {
                        "session_title": "Zero Knowledge",
                        "talks": [
                            {
                                "paperId": "17",
                                "title": "Folding Schemes Revisited",
                                "authors": ["Dana", "Eve"],
                                "eprint": "https://eprint.iacr.org/2024/017"
                            },
                            {"title": "Invited Talk", "authors": ["Frank"]}
                        ]
                    },
                    {
                        "session_title": "Lunch Break",
                        "talks": [{"paperId": "99", "title": "Sandwiches"}]
                    }
                ]
            }]
        }]
    });
    Mock::given(method("GET"))
        .and(path("/2024/currentProgram.php"))
        .respond_with(ResponseTemplate::new(200).set_body_json(program))
        .expect(1)
        .mount(&server)
        .await;

    let mut registry = AdapterRegistry::new();
    registry.register(Box::new(IacrAdapter::with_base_url(
        fast_fetcher(1),
        server.uri(),
    )));
    let store = memory_store().await;
    let coordinator = IngestCoordinator::new(&registry, &store);
    let task = SourceTask::new(SourceKind::Site, find_venue("crypto").unwrap(), 2024);

    let report = coordinator.run(&[task]).await;

    assert_eq!(report.tasks[0].state, TaskState::Stored);
    assert_eq!(report.inserted(), 1);
    let stored = store.query(&PaperFilter::default()).await.unwrap();
    assert_eq!(stored[0].title, "Folding Schemes Revisited");
    assert_eq!(
        stored[0].pdf_url.as_deref(),
        Some("https://eprint.iacr.org/2024/017.pdf")
    );
}

#[tokio::test]
async fn test_unreachable_upstream_fails_task_after_retry_bound() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/search/publ/api"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let mut registry = AdapterRegistry::new();
    registry.register(Box::new(DblpAdapter::with_base_url(
        fast_fetcher(3),
        format!("{}/search/publ/api", server.uri()),
        100,
    )));
    let store = memory_store().await;
    let coordinator = IngestCoordinator::new(&registry, &store);
    let task = SourceTask::new(SourceKind::Dblp, find_venue("ndss").unwrap(), 2023);

    let report = coordinator.run(&[task]).await;

    assert_eq!(report.failed_tasks(), 1);
    assert_eq!(report.tasks[0].state, TaskState::Failed);
    assert!(report.tasks[0].error.as_deref().unwrap().contains("3 attempt"));
    assert!(store.query(&PaperFilter::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_site_task_without_registered_adapter_fails_cleanly() {
    let registry = AdapterRegistry::new();
    let store = memory_store().await;
    let coordinator = IngestCoordinator::new(&registry, &store);
    let task = SourceTask::new(SourceKind::Site, find_venue("ccs").unwrap(), 2024);

    let report = coordinator.run(&[task]).await;

    assert_eq!(report.tasks[0].state, TaskState::Failed);
    assert_eq!(report.inserted(), 0);
}
