//! End-to-end pipeline tests
//!
//! These tests exercise the full public surface against a mock HTTP
//! server: an export tree is laid out on disk, attachments are retrieved
//! through a real transport, and the enriched archive is reopened to
//! verify its contents entry by entry.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use slack_export_dl::{
    AttachmentStore, Config, CookieTransport, Event, FailurePolicy, FetchConfig, RetrievalEngine,
    TokenTransport, assemble, backfill_emails_from,
};
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TIMEOUT: Duration = Duration::from_secs(5);

/// Lay out a two-channel export tree referencing attachments on `server`
fn write_export_tree(export_root: &Path, server_uri: &str) {
    let general = export_root.join("general");
    std::fs::create_dir_all(&general).unwrap();
    std::fs::write(
        general.join("2023-01-01.json"),
        format!(
            r#"[
                {{"type": "message", "text": "no attachment", "ts": "1.0"}},
                {{"subtype": "file_share", "ts": "2.0",
                  "file": {{"id": "F1", "name": "cat.png",
                            "url_private": "{uri}/view/F1",
                            "url_private_download": "{uri}/dl/F1"}}}}
            ]"#,
            uri = server_uri
        ),
    )
    .unwrap();
    std::fs::write(
        general.join("2023-01-02.json"),
        format!(
            r#"[
                {{"type": "message", "ts": "3.0",
                  "files": [{{"id": "F2", "name": "notes.txt",
                              "url_private": "{uri}/dl/F2"}}]}}
            ]"#,
            uri = server_uri
        ),
    )
    .unwrap();

    let random = export_root.join("random");
    std::fs::create_dir_all(&random).unwrap();
    std::fs::write(
        random.join("2023-01-01.json"),
        format!(
            r#"[
                {{"subtype": "file_share", "ts": "4.0",
                  "file": {{"id": "F1", "name": "cat.png",
                            "url_private_download": "{uri}/dl/F1"}}}}
            ]"#,
            uri = server_uri
        ),
    )
    .unwrap();

    std::fs::write(export_root.join("users.json"), br#"[{"id": "U1"}]"#).unwrap();
}

fn config_for(root: &Path) -> Config {
    Config {
        export_root: root.join("export"),
        store_dir: root.join("files"),
        fetch: FetchConfig {
            max_concurrent_fetches: 2,
            failure_policy: FailurePolicy::Continue,
            ..FetchConfig::default()
        },
    }
}

fn archive_names(path: &Path) -> Vec<String> {
    let file = std::fs::File::open(path).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect()
}

fn read_entry(path: &Path, name: &str) -> Vec<u8> {
    let file = std::fs::File::open(path).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    let mut entry = archive.by_name(name).unwrap();
    let mut buf = Vec::new();
    entry.read_to_end(&mut buf).unwrap();
    buf
}

#[tokio::test]
async fn token_pipeline_retrieves_deduplicates_and_assembles() {
    let server = MockServer::start().await;
    // expect(1): the duplicate F1 reference in #random and the whole
    // second run below must be served from the store, not the network.
    Mock::given(method("GET"))
        .and(path("/dl/F1"))
        .and(header("authorization", "Bearer xoxp-test"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"cat-bytes".to_vec()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/dl/F2"))
        .and(header("authorization", "Bearer xoxp-test"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"note-bytes".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let root = tempfile::tempdir().unwrap();
    write_export_tree(&root.path().join("export"), &server.uri());

    let transport = Arc::new(TokenTransport::new("xoxp-test", TIMEOUT).unwrap());
    let engine = RetrievalEngine::new(config_for(root.path()), transport);
    let mut events = engine.subscribe();

    let summary = engine.run().await.unwrap();
    assert_eq!(summary.attempted, 3);
    assert_eq!(summary.retrieved, 2);
    assert_eq!(summary.skipped, 1, "second F1 reference must be deduplicated");
    assert!(summary.failed.is_empty());
    assert!(summary.finished_at >= summary.started_at);
    assert!(engine.store().has("F1", "cat.png"));
    assert!(engine.store().has("F2", "notes.txt"));

    // Progress stayed observable end to end.
    let mut saw_finished = false;
    let mut retrieved_events = 0;
    while let Ok(event) = events.try_recv() {
        match event {
            Event::AttachmentRetrieved { .. } => retrieved_events += 1,
            Event::RunFinished { summary } => {
                saw_finished = true;
                assert_eq!(summary.retrieved, 2);
            }
            _ => {}
        }
    }
    assert_eq!(retrieved_events, 2);
    assert!(saw_finished);

    // Re-run against the unchanged export: everything is already stored.
    let summary = engine.run().await.unwrap();
    assert_eq!(summary.retrieved, 0);
    assert_eq!(summary.skipped, 3);

    // Assemble and reopen the archive.
    let output = root.path().join("export-with-files.zip");
    assemble(&root.path().join("export"), engine.store(), &output).unwrap();

    let names = archive_names(&output);
    for expected in [
        "general/2023-01-01.json",
        "general/2023-01-02.json",
        "random/2023-01-01.json",
        "users.json",
        "__uploads/F1/cat.png",
        "__uploads/F2/notes.txt",
    ] {
        assert_eq!(
            names.iter().filter(|n| n.as_str() == expected).count(),
            1,
            "archive must contain {} exactly once",
            expected
        );
    }
    assert_eq!(names.len(), 6);
    assert_eq!(read_entry(&output, "__uploads/F1/cat.png"), b"cat-bytes");
    assert_eq!(
        read_entry(&output, "general/2023-01-02.json"),
        std::fs::read(root.path().join("export/general/2023-01-02.json")).unwrap()
    );
}

#[tokio::test]
async fn cookie_pipeline_retrieves_with_session_cookie() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("cookie", "d=secret"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"cat-bytes".to_vec()))
        .mount(&server)
        .await;

    let root = tempfile::tempdir().unwrap();
    write_export_tree(&root.path().join("export"), &server.uri());

    let transport = Arc::new(CookieTransport::new("d=secret\n", TIMEOUT).unwrap());
    let engine = RetrievalEngine::new(config_for(root.path()), transport);

    let summary = engine.run().await.unwrap();
    assert_eq!(summary.retrieved, 2);
    assert!(summary.failed.is_empty());
}

#[tokio::test]
async fn email_backfill_lands_in_assembled_archive() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/users.list"))
        .and(header("authorization", "Bearer xoxp-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "ok": true,
            "members": [{"id": "U1", "profile": {"email": "ada@example.com"}}]
        })))
        .mount(&server)
        .await;

    let root = tempfile::tempdir().unwrap();
    let export = root.path().join("export");
    std::fs::create_dir_all(export.join("general")).unwrap();
    std::fs::write(export.join("general/2023-01-01.json"), "[]").unwrap();
    std::fs::write(
        export.join("users.json"),
        br#"[{"id": "U1", "name": "ada", "profile": {"real_name": "Ada Lovelace"}}]"#,
    )
    .unwrap();

    let transport = TokenTransport::new("xoxp-test", TIMEOUT).unwrap();
    let updated = backfill_emails_from(
        &export,
        &transport,
        &format!("{}/api/users.list", server.uri()),
    )
    .await
    .unwrap();
    assert_eq!(updated, 1);

    let output = root.path().join("out.zip");
    let store = AttachmentStore::new(root.path().join("files"));
    assemble(&export, &store, &output).unwrap();

    let users: serde_json::Value =
        serde_json::from_slice(&read_entry(&output, "users.json")).unwrap();
    assert_eq!(users[0]["profile"]["email"], "ada@example.com");
    assert_eq!(users[0]["profile"]["real_name"], "Ada Lovelace");
    assert_eq!(users[0]["name"], "ada");
}

#[tokio::test]
async fn expired_session_failures_leave_remaining_attachments_retrieved() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/dl/F1"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/dl/F2"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"note-bytes".to_vec()))
        .mount(&server)
        .await;

    let root = tempfile::tempdir().unwrap();
    write_export_tree(&root.path().join("export"), &server.uri());

    let transport = Arc::new(TokenTransport::new("xoxp-expired", TIMEOUT).unwrap());
    let engine = RetrievalEngine::new(config_for(root.path()), transport);

    let summary = engine.run().await.unwrap();
    assert_eq!(summary.retrieved, 1);
    // F1 fails in #general and is attempted again in #random.
    assert_eq!(summary.failed.len(), 2);
    assert!(summary.failed.iter().all(|f| f.id == "F1"));
    assert!(summary.failed[0].error.contains("403"));
    assert!(!engine.store().has("F1", "cat.png"));
    assert!(engine.store().has("F2", "notes.txt"));

    // The failed attachment is retried by a later run once access works.
    server.reset().await;
    Mock::given(method("GET"))
        .and(path("/dl/F1"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"cat-bytes".to_vec()))
        .mount(&server)
        .await;
    let summary = engine.run().await.unwrap();
    assert_eq!(summary.retrieved, 1);
    assert!(summary.failed.is_empty());
    assert!(engine.store().has("F1", "cat.png"));
}
