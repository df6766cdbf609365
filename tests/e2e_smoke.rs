// tests/e2e_smoke.rs
//
// Builds the production wiring from config (no API key, no webhook) and
// drives it through the router.

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use tower::ServiceExt; // for `oneshot`

use news_digest_etl::bootstrap::AppRuntime;
use news_digest_etl::config::AppConfig;

fn runtime(dir: &tempfile::TempDir) -> AppRuntime {
    let mut cfg = AppConfig::default();
    cfg.gemini.api_key = String::new();
    cfg.webhook_url = None;
    cfg.db_path = dir.path().join("db.json");
    AppRuntime::from_config(cfg).expect("wire runtime")
}

async fn body_string(resp: axum::response::Response) -> String {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn smoke_sources_and_schedule_persist_to_disk() {
    let dir = tempfile::tempdir().unwrap();
    let rt = runtime(&dir);
    rt.scheduler.initialize().await.unwrap();
    let app: Router = news_digest_etl::router(rt.state());

    let req = Request::builder()
        .method("POST")
        .uri("/api/news-sources")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"name":"Example","url":"https://example.com/rss"}"#))
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let req = Request::builder()
        .method("POST")
        .uri("/api/schedule")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"cron":"0 9 * * *","isEnabled":true}"#))
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let raw = std::fs::read_to_string(dir.path().join("db.json")).unwrap();
    assert!(raw.contains("\"newsSources\""), "{raw}");
    assert!(raw.contains("https://example.com/rss"), "{raw}");
    assert!(raw.contains("\"cron\": \"0 9 * * *\""), "{raw}");

    // A fresh runtime over the same file restores the timer.
    rt.scheduler.shutdown().await;
    let restarted = runtime(&dir);
    restarted.scheduler.initialize().await.unwrap();
    assert_eq!(restarted.scheduler.active_timer_count().await, 1);
    restarted.scheduler.shutdown().await;
}

#[tokio::test]
async fn smoke_missing_api_key_fails_without_publishing() {
    let dir = tempfile::tempdir().unwrap();
    let app: Router = news_digest_etl::router(runtime(&dir).state());

    let req = Request::builder()
        .method("POST")
        .uri("/api/etl/generate-summary")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let s = body_string(resp).await;
    assert!(s.contains("\"failedIn\":\"extract_requested\""), "{s}");
    assert!(s.contains("unavailable"), "{s}");
}
