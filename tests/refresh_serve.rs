//! End-to-end tests: fake upstream -> refresh cycle -> HTTP views
//!
//! Uses a mockito server in place of the real schedule endpoint and drives the
//! router directly with `tower::ServiceExt::oneshot`.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use bin_collector::cache::CacheCell;
use bin_collector::data::ScheduleClient;
use bin_collector::refresh::{CycleOutcome, RefreshConfig, Refresher, Sleeper};
use bin_collector::server::{router, AppState, TemplateRenderer};

const ALICE: &str = r#"[{"id":"1","name":"Alice","query":"začret 69","city":"Celje","next_mko":"2024-01-05","next_emb":"2024-01-03","next_bio":"2024-01-07"}]"#;

/// Skips every wait so retry cycles finish instantly
struct NoSleep;

#[async_trait]
impl Sleeper for NoSleep {
    async fn sleep(&self, _duration: Duration) {}
}

fn app(cell: Arc<CacheCell>, dir: &TempDir) -> Router {
    let template = dir.path().join("template.html");
    fs::write(&template, "<td>{{ mko_name }}</td><td>{{ mko_date }}</td>").unwrap();
    router(
        AppState::new(cell, TemplateRenderer::new(template)),
        dir.path().join("static"),
    )
}

async fn get_body(app: Router, uri: &str) -> (StatusCode, String) {
    let response = app
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

async fn get_json(app: Router) -> Value {
    let (status, body) = get_body(app, "/api/data").await;
    assert_eq!(status, StatusCode::OK);
    serde_json::from_str(&body).expect("api/data should return JSON")
}

fn refresher(client: ScheduleClient, cell: Arc<CacheCell>) -> Refresher<ScheduleClient, NoSleep> {
    Refresher::new(client, cell, RefreshConfig::default()).with_sleeper(NoSleep)
}

#[tokio::test]
async fn test_successful_fetch_is_served_as_json_and_html() {
    let mut upstream = mockito::Server::new_async().await;
    let _mock = upstream
        .mock("POST", "/")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(ALICE)
        .create_async()
        .await;

    let dir = TempDir::new().unwrap();
    let cell = Arc::new(CacheCell::new());
    let client =
        ScheduleClient::with_base_url(upstream.url(), "začret 69", Duration::from_secs(5)).unwrap();

    let outcome = refresher(client, cell.clone()).run_cycle().await;
    assert_eq!(outcome, CycleOutcome::Updated { attempts: 1 });

    let json = get_json(app(cell.clone(), &dir)).await;
    assert_eq!(json["mko_date"], "2024-01-05");
    assert_eq!(json["emb_date"], "2024-01-03");
    assert_eq!(json["bio_date"], "2024-01-07");
    assert_eq!(json["city"], "Celje");
    assert_eq!(json["name"], "Alice");

    let (status, html) = get_body(app(cell, &dir), "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(html, "<td>Mešani komunalni odpadki</td><td>2024-01-05</td>");
}

#[tokio::test]
async fn test_upstream_errors_are_retried_and_stale_data_kept() {
    let mut upstream = mockito::Server::new_async().await;
    let failing = upstream
        .mock("POST", "/")
        .with_status(500)
        .expect(3)
        .create_async()
        .await;

    let dir = TempDir::new().unwrap();
    let cell = Arc::new(CacheCell::new());
    cell.write(bin_collector::data::CachedSnapshot {
        city: "Celje".to_string(),
        mko_date: "2024-01-05".to_string(),
        ..Default::default()
    });
    let client =
        ScheduleClient::with_base_url(upstream.url(), "začret 69", Duration::from_secs(5)).unwrap();

    let outcome = refresher(client, cell.clone()).run_cycle().await;

    failing.assert_async().await;
    assert_eq!(outcome, CycleOutcome::Exhausted { attempts: 3 });
    let json = get_json(app(cell, &dir)).await;
    assert_eq!(json["mko_date"], "2024-01-05");
}

#[tokio::test]
async fn test_timeouts_keep_previous_snapshot() {
    // Accepts connections but never answers.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let silent = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let dir = TempDir::new().unwrap();
    let cell = Arc::new(CacheCell::new());
    cell.write(bin_collector::data::CachedSnapshot {
        mko_date: "2024-01-05".to_string(),
        ..Default::default()
    });
    let before = cell.read();
    let client = ScheduleClient::with_base_url(
        format!("http://{}", addr),
        "začret 69",
        Duration::from_millis(100),
    )
    .unwrap();

    let outcome = refresher(client, cell.clone()).run_cycle().await;
    silent.abort();

    assert_eq!(outcome, CycleOutcome::Exhausted { attempts: 3 });
    assert_eq!(cell.read(), before);
    let json = get_json(app(cell, &dir)).await;
    assert_eq!(json["mko_date"], "2024-01-05");
}

#[tokio::test]
async fn test_empty_response_leaves_default_snapshot() {
    let mut upstream = mockito::Server::new_async().await;
    let _mock = upstream
        .mock("POST", "/")
        .with_status(200)
        .with_body("[]")
        .create_async()
        .await;

    let dir = TempDir::new().unwrap();
    let cell = Arc::new(CacheCell::new());
    let client =
        ScheduleClient::with_base_url(upstream.url(), "začret 69", Duration::from_secs(5)).unwrap();

    refresher(client, cell.clone()).run_cycle().await;

    assert!(cell.read().is_default());
    let json = get_json(app(cell, &dir)).await;
    assert!(json.as_object().unwrap().values().all(|v| v == ""));
}

#[tokio::test]
async fn test_concurrent_readers_see_whole_snapshots() {
    let dir = TempDir::new().unwrap();
    let cell = Arc::new(CacheCell::new());
    let app = app(cell.clone(), &dir);

    let writer = {
        let cell = cell.clone();
        tokio::spawn(async move {
            for day in 1..=28 {
                let date = format!("2024-02-{:02}", day);
                cell.write(bin_collector::data::CachedSnapshot {
                    mko_date: date.clone(),
                    emb_date: date.clone(),
                    bio_date: date,
                    ..Default::default()
                });
                tokio::task::yield_now().await;
            }
        })
    };

    let reads = (0..64).map(|_| get_json(app.clone()));
    let results = futures::future::join_all(reads).await;
    writer.await.unwrap();

    for json in results {
        assert_eq!(json["mko_date"], json["emb_date"]);
        assert_eq!(json["mko_date"], json["bio_date"]);
    }
}
