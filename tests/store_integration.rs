//! Integration tests for the paper store against a file-backed database.

use paper_harvest::store::{
    DownloadStatus, NewPaper, PaperFilter, PaperPatch, PaperStore, StoreError,
};
use paper_harvest::Database;
use tempfile::TempDir;

async fn setup_store() -> (PaperStore, TempDir) {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let db = Database::new(&temp_dir.path().join("nested/papers.db"))
        .await
        .expect("failed to open database");
    (PaperStore::new(db), temp_dir)
}

fn paper_with_pdf(title: &str, conference: &str, year: i32) -> NewPaper {
    let mut paper = NewPaper::new(title, conference);
    paper.year = Some(year);
    paper.pdf_url = Some(format!("https://example.org/{year}/{}.pdf", title.len()));
    paper
}

#[tokio::test]
async fn test_insert_same_dblp_key_twice_reports_already_exists() {
    let (store, _dir) = setup_store().await;
    let mut paper = NewPaper::new("Lattice Tricks", "CRYPTO");
    paper.dblp_key = Some("conf/crypto/X24".to_string());

    store.insert(&paper).await.unwrap();
    let err = store.insert(&paper).await.unwrap_err();

    assert!(matches!(err, StoreError::AlreadyExists { .. }));
    assert_eq!(store.query(&PaperFilter::default()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_site_records_dedup_on_normalized_title_venue_year() {
    let (store, _dir) = setup_store().await;
    let mut first = NewPaper::new("Fast MPC: Now!", "NDSS");
    first.year = Some(2024);
    let mut again = NewPaper::new("  fast mpc now ", "NDSS");
    again.year = Some(2024);
    let mut next_year = again.clone();
    next_year.year = Some(2025);

    store.insert(&first).await.unwrap();
    assert!(store.insert(&again).await.unwrap_err().is_already_exists());
    store.insert(&next_year).await.unwrap();
}

#[tokio::test]
async fn test_update_merges_only_supplied_fields() {
    let (store, _dir) = setup_store().await;
    let mut paper = NewPaper::new("Merge Me", "CCS");
    paper.doi = Some("10.1/keep".to_string());
    paper.notes = Some("first".to_string());
    let id = store.insert(&paper).await.unwrap();

    store
        .update(
            id,
            &PaperPatch {
                abstract_text: Some("Now with abstract.".to_string()),
                append_note: Some("Citations: 4".to_string()),
                ..PaperPatch::default()
            },
        )
        .await
        .unwrap();

    let stored = store.get(id).await.unwrap().unwrap();
    assert_eq!(stored.abstract_text.as_deref(), Some("Now with abstract."));
    assert_eq!(stored.doi.as_deref(), Some("10.1/keep"));
    assert_eq!(stored.notes.as_deref(), Some("first\nCitations: 4"));
}

#[tokio::test]
async fn test_status_changes_are_logged_in_order() {
    let (store, _dir) = setup_store().await;
    let id = store
        .insert(&paper_with_pdf("Logged", "CRYPTO", 2024))
        .await
        .unwrap();

    let claimed = store
        .claim_next_pending(&PaperFilter::default())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(claimed.id, id);
    assert_eq!(claimed.status(), DownloadStatus::Downloading);

    store
        .set_download_status(id, DownloadStatus::Failed, None, Some("HTTP 503"))
        .await
        .unwrap();

    let log = store.download_attempts(id).await.unwrap();
    let statuses: Vec<DownloadStatus> = log.iter().map(|entry| entry.status()).collect();
    assert_eq!(
        statuses,
        vec![DownloadStatus::Downloading, DownloadStatus::Failed]
    );
    assert_eq!(log[1].error_message.as_deref(), Some("HTTP 503"));
}

#[tokio::test]
async fn test_completed_requires_path_and_is_never_overwritten() {
    let (store, _dir) = setup_store().await;
    let id = store
        .insert(&paper_with_pdf("Done", "CRYPTO", 2024))
        .await
        .unwrap();
    store
        .claim_next_pending(&PaperFilter::default())
        .await
        .unwrap();

    let err = store
        .set_download_status(id, DownloadStatus::Completed, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidRecord { .. }));

    store
        .set_download_status(id, DownloadStatus::Completed, Some("/tmp/1_Done.pdf"), None)
        .await
        .unwrap();

    let stale = store
        .set_download_status(id, DownloadStatus::Downloading, None, None)
        .await
        .unwrap_err();
    assert!(matches!(stale, StoreError::InvalidTransition { .. }));

    let stored = store.get(id).await.unwrap().unwrap();
    assert_eq!(stored.status(), DownloadStatus::Completed);
    assert_eq!(stored.pdf_path.as_deref(), Some("/tmp/1_Done.pdf"));
}

#[tokio::test]
async fn test_paper_without_pdf_url_is_never_claimed() {
    let (store, _dir) = setup_store().await;
    store
        .insert(&NewPaper::new("No Link", "NDSS"))
        .await
        .unwrap();

    assert!(
        store
            .claim_next_pending(&PaperFilter::default())
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_reset_failed_leaves_completed_untouched() {
    let (store, _dir) = setup_store().await;
    let failed = store
        .insert(&paper_with_pdf("Will Fail", "CCS", 2023))
        .await
        .unwrap();
    let done = store
        .insert(&paper_with_pdf("Will Finish", "CCS", 2023))
        .await
        .unwrap();
    for _ in 0..2 {
        store
            .claim_next_pending(&PaperFilter::default())
            .await
            .unwrap();
    }
    store
        .set_download_status(failed, DownloadStatus::Failed, None, Some("boom"))
        .await
        .unwrap();
    store
        .set_download_status(done, DownloadStatus::Completed, Some("/x.pdf"), None)
        .await
        .unwrap();

    let reset = store.reset_failed(&PaperFilter::default()).await.unwrap();

    assert_eq!(reset, 1);
    assert_eq!(
        store.get(failed).await.unwrap().unwrap().status(),
        DownloadStatus::Pending
    );
    assert_eq!(
        store.get(done).await.unwrap().unwrap().status(),
        DownloadStatus::Completed
    );
}

#[tokio::test]
async fn test_requeue_stale_downloads_after_crash() {
    let (store, _dir) = setup_store().await;
    let id = store
        .insert(&paper_with_pdf("In Flight", "CRYPTO", 2024))
        .await
        .unwrap();
    store
        .claim_next_pending(&PaperFilter::default())
        .await
        .unwrap();

    assert_eq!(store.requeue_stale_downloads().await.unwrap(), 1);
    assert_eq!(
        store.get(id).await.unwrap().unwrap().status(),
        DownloadStatus::Pending
    );
}

#[tokio::test]
async fn test_concurrent_claims_never_hand_out_the_same_paper() {
    let (store, _dir) = setup_store().await;
    for i in 0..20 {
        store
            .insert(&paper_with_pdf(&format!("Paper {i}"), "CRYPTO", 2024))
            .await
            .unwrap();
    }

    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let mut ids = Vec::new();
            while let Some(paper) = store
                .claim_next_pending(&PaperFilter::default())
                .await
                .unwrap()
            {
                ids.push(paper.id);
            }
            ids
        }));
    }

    let mut all_ids = Vec::new();
    for handle in handles {
        all_ids.extend(handle.await.unwrap());
    }
    all_ids.sort_unstable();
    let before = all_ids.len();
    all_ids.dedup();
    assert_eq!(before, 20);
    assert_eq!(all_ids.len(), 20);
}

#[tokio::test]
async fn test_statistics_group_by_conference_and_status() {
    let (store, _dir) = setup_store().await;
    store
        .insert(&paper_with_pdf("A", "CRYPTO", 2024))
        .await
        .unwrap();
    store
        .insert(&paper_with_pdf("B", "CRYPTO", 2023))
        .await
        .unwrap();
    let mut with_abstract = NewPaper::new("C", "NDSS");
    with_abstract.abstract_text = Some("text".to_string());
    store.insert(&with_abstract).await.unwrap();

    let stats = store.statistics().await.unwrap();
    assert_eq!(stats.total, 3);
    assert_eq!(
        stats.by_conference,
        vec![("CRYPTO".to_string(), 2), ("NDSS".to_string(), 1)]
    );
    assert_eq!(stats.status_count(DownloadStatus::Pending), 3);
    assert_eq!(stats.with_abstract, 1);
    assert_eq!(stats.with_pdf_url, 2);
}
