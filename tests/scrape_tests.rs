//! End-to-end tests for the /metrics endpoint.
//!
//! Each test seeds a temporary SQLite database, starts an in-process target
//! server and the exporter router on ephemeral ports, and scrapes the
//! exporter over HTTP.

use axum::{http::StatusCode, response::Redirect, routing::get, Router};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use bookmarks_alive_exporter::config::Config;
use bookmarks_alive_exporter::server;
use bookmarks_alive_exporter::state::AppState;
use bookmarks_alive_exporter::{HttpProber, SqliteSource};

/// Creates `bookmarks.db` in `dir` and runs `statements` against it.
async fn seed_database(dir: &TempDir, statements: &[String]) -> String {
    let path = dir.path().join("bookmarks.db");
    let options = SqliteConnectOptions::new()
        .filename(&path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .unwrap();
    for statement in statements {
        sqlx::query(statement).execute(&pool).await.unwrap();
    }
    pool.close().await;
    path.to_string_lossy().to_string()
}

async fn seed_bookmarks(dir: &TempDir, urls: &[String]) -> String {
    let mut statements = vec!["CREATE TABLE bookmarks (url TEXT)".to_string()];
    statements.extend(
        urls.iter()
            .map(|url| format!("INSERT INTO bookmarks (url) VALUES ('{url}')")),
    );
    seed_database(dir, &statements).await
}

/// Serves `app` on an ephemeral local port.
async fn spawn_server(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Target whose paths answer with well-known statuses.
async fn spawn_target() -> SocketAddr {
    let app = Router::new()
        .route("/ok", get(|| async { "ok" }))
        .route("/teapot", get(|| async { StatusCode::IM_A_TEAPOT }))
        .route("/moved", get(|| async { Redirect::temporary("/ok") }))
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                "late"
            }),
        );
    spawn_server(app).await
}

/// Starts the exporter against `db` and returns its address.
async fn spawn_exporter(db: &str, config: Config) -> SocketAddr {
    let config = Config {
        db: Some(db.to_string()),
        ..config
    };
    let source = Arc::new(SqliteSource::connect(config.db(), config.query()).await.unwrap());
    let prober = Arc::new(HttpProber::new(config.user_agent(), config.probe_timeout()).unwrap());
    let state = AppState::new(config, source, prober, CancellationToken::new()).unwrap();
    spawn_server(server::router(state)).await
}

async fn scrape(exporter: SocketAddr) -> (StatusCode, String) {
    let response = reqwest::get(format!("http://{exporter}/metrics"))
        .await
        .unwrap();
    let status = StatusCode::from_u16(response.status().as_u16()).unwrap();
    (status, response.text().await.unwrap())
}

fn status_lines(body: &str) -> Vec<&str> {
    body.lines()
        .filter(|line| line.starts_with("bookmarks_alive_status{"))
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_all_urls_reachable() {
    let target = spawn_target().await;
    let urls = vec![
        format!("http://{target}/ok"),
        format!("http://{target}/ok?page=2"),
        format!("http://{target}/moved"),
    ];
    let dir = TempDir::new().unwrap();
    let db = seed_bookmarks(&dir, &urls).await;
    let exporter = spawn_exporter(&db, Config::default()).await;

    let (status, body) = scrape(exporter).await;

    assert_eq!(status, StatusCode::OK);
    let lines = status_lines(&body);
    assert_eq!(lines.len(), 3, "unexpected exposition: {body}");
    assert!(lines.iter().all(|line| line.ends_with(" 200")), "{body}");
    for url in &urls {
        assert!(body.contains(&format!("url=\"{url}\"")), "missing {url}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_non_success_status_is_reported_verbatim() {
    let target = spawn_target().await;
    let urls = vec![format!("http://{target}/teapot"), format!("http://{target}/absent")];
    let dir = TempDir::new().unwrap();
    let db = seed_bookmarks(&dir, &urls).await;
    let exporter = spawn_exporter(&db, Config::default()).await;

    let (status, body) = scrape(exporter).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(&format!("bookmarks_alive_status{{url=\"{}\"}} 418", urls[0])));
    assert!(body.contains(&format!("bookmarks_alive_status{{url=\"{}\"}} 404", urls[1])));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_unreachable_url_reports_zero() {
    // Reserve a port, then close it so connections are refused.
    let closed = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = closed.local_addr().unwrap();
    drop(closed);

    let url = format!("http://{addr}/gone");
    let dir = TempDir::new().unwrap();
    let db = seed_bookmarks(&dir, &[url.clone()]).await;
    let exporter = spawn_exporter(&db, Config::default()).await;

    let (status, body) = scrape(exporter).await;

    assert_eq!(status, StatusCode::OK);
    let lines = status_lines(&body);
    assert_eq!(lines, vec![format!("bookmarks_alive_status{{url=\"{url}\"}} 0")]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_deadline_serves_partial_snapshot() {
    let target = spawn_target().await;
    let urls = vec![format!("http://{target}/slow"), format!("http://{target}/slow?b")];
    let dir = TempDir::new().unwrap();
    let db = seed_bookmarks(&dir, &urls).await;
    let exporter = spawn_exporter(
        &db,
        Config {
            scrape_timeout_secs: Some(1),
            ..Config::default()
        },
    )
    .await;

    let started = std::time::Instant::now();
    let (status, body) = scrape(exporter).await;

    assert_eq!(status, StatusCode::OK);
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(status_lines(&body).is_empty(), "unexpected entries: {body}");
    assert!(body.contains("bookmarks_alive_exporter_collection_timed_out 1"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_store_open_failure_is_server_error() {
    let dir = TempDir::new().unwrap();
    let db = seed_database(&dir, &["CREATE TABLE unrelated (value TEXT)".to_string()]).await;
    let exporter = spawn_exporter(&db, Config::default()).await;

    let (status, body) = scrape(exporter).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!body.contains("bookmarks_alive_status"));
    assert!(!body.contains("# TYPE"));

    // The failed run is visible on /health.
    let health = reqwest::get(format!("http://{exporter}/health")).await.unwrap();
    assert_eq!(health.status().as_u16(), 503);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_health_and_landing_page() {
    let target = spawn_target().await;
    let dir = TempDir::new().unwrap();
    let db = seed_bookmarks(&dir, &[format!("http://{target}/ok")]).await;
    let exporter = spawn_exporter(&db, Config::default()).await;

    let (status, _) = scrape(exporter).await;
    assert_eq!(status, StatusCode::OK);

    let health = reqwest::get(format!("http://{exporter}/health")).await.unwrap();
    assert_eq!(health.status().as_u16(), 200);

    let root = reqwest::get(format!("http://{exporter}/"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(root.contains("/metrics"));

    let config = reqwest::get(format!("http://{exporter}/config"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(config.contains(&db));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_health_route_can_be_disabled() {
    let dir = TempDir::new().unwrap();
    let db = seed_bookmarks(&dir, &[]).await;
    let exporter = spawn_exporter(
        &db,
        Config {
            enable_health: Some(false),
            ..Config::default()
        },
    )
    .await;

    let health = reqwest::get(format!("http://{exporter}/health")).await.unwrap();
    assert_eq!(health.status().as_u16(), 404);
}
