use std::io::{Read, Write};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use snip_core::{DeletionStore, Repository, ShortCode, UserId};
use snip_deleter::{Deleter, DeleterConfig, DeleterError, UrlDeleter};
use snip_gateway::{App, AppState, TrustedSubnet};
use snip_generator::SeqGenerator;
use snip_shortener::ShortenerService;
use snip_storage::InMemoryRepository;
use tokio::sync::mpsc;
use tower::ServiceExt;

const BASE_URL: &str = "http://snip.test";

/// Forwards every delete request to the test instead of deleting anything.
struct ForwardingDeleter {
    requests: mpsc::UnboundedSender<(UserId, Vec<ShortCode>)>,
}

#[async_trait]
impl Deleter for ForwardingDeleter {
    async fn delete(&self, user: &UserId, codes: &[ShortCode]) -> snip_deleter::Result<()> {
        self.requests
            .send((user.clone(), codes.to_vec()))
            .map_err(|_| DeleterError::Stopped)
    }
}

struct TestApp {
    repository: Arc<InMemoryRepository>,
    router: Router,
}

impl TestApp {
    fn with_deleter(deleter: Arc<dyn Deleter>, subnet: Option<TrustedSubnet>) -> Self {
        let repository = Arc::new(InMemoryRepository::new());
        let shortener = Arc::new(ShortenerService::new(
            Arc::clone(&repository),
            SeqGenerator::with_prefix("sn"),
        ));
        let state =
            AppState::new(shortener, deleter, format!("{BASE_URL}/")).with_trusted_subnet(subnet);

        Self {
            repository,
            router: App::router(state),
        }
    }

    fn new() -> Self {
        let (requests, _) = mpsc::unbounded_channel();
        Self::with_deleter(Arc::new(ForwardingDeleter { requests }), None)
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        (status, headers, body.to_vec())
    }
}

fn post_text(uri: &str, user: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("User-Id", user)
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn json_request(method: &str, uri: &str, user: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("User-Id", user)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn get_as(uri: &str, user: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("User-Id", user)
        .body(Body::empty())
        .unwrap()
}

fn json(body: &[u8]) -> serde_json::Value {
    serde_json::from_slice(body).unwrap()
}

fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

fn gunzip(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    GzDecoder::new(data).read_to_end(&mut out).unwrap();
    out
}

#[tokio::test]
async fn health_reports_ok() {
    let app = TestApp::new();

    let (status, _, body) = app.send(get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["status"], "ok");
}

#[tokio::test]
async fn text_shorten_then_conflict() {
    let app = TestApp::new();

    let (status, _, body) = app
        .send(post_text("/", "alice", "https://example.com\n"))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body, b"http://snip.test/sn000000");

    let (status, _, body) = app.send(post_text("/", "bob", "https://example.com")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body, b"http://snip.test/sn000000");
}

#[tokio::test]
async fn requests_without_user_are_unauthorized() {
    let app = TestApp::new();

    let request = Request::builder()
        .method("POST")
        .uri("/")
        .body(Body::from("https://example.com"))
        .unwrap();
    let (status, _, _) = app.send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, _) = app.send(get("/api/user/urls")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn json_shorten_and_invalid_input() {
    let app = TestApp::new();

    let (status, _, body) = app
        .send(json_request(
            "POST",
            "/api/shorten",
            "alice",
            serde_json::json!({ "url": "https://example.com" }),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json(&body)["result"], "http://snip.test/sn000000");

    let (status, _, body) = app
        .send(json_request(
            "POST",
            "/api/shorten",
            "alice",
            serde_json::json!({ "url": "https://example.com" }),
        ))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json(&body)["result"], "http://snip.test/sn000000");

    let (status, _, _) = app
        .send(json_request(
            "POST",
            "/api/shorten",
            "alice",
            serde_json::json!({ "url": "not a url" }),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = app
        .send(json_request(
            "POST",
            "/api/shorten",
            "alice",
            serde_json::json!({ "link": "https://example.com" }),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn gzip_request_and_response_bodies() {
    let app = TestApp::new();
    let payload = serde_json::json!({ "url": "https://example.com/some/long/path?page=1" });

    let request = Request::builder()
        .method("POST")
        .uri("/api/shorten")
        .header("User-Id", "alice")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CONTENT_ENCODING, "gzip")
        .header(header::ACCEPT_ENCODING, "gzip")
        .body(Body::from(gzip(payload.to_string().as_bytes())))
        .unwrap();
    let (status, headers, body) = app.send(request).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(headers[header::CONTENT_ENCODING], "gzip");
    assert_eq!(json(&gunzip(&body))["result"], "http://snip.test/sn000000");

    // Clients that do not ask for gzip get plain bodies.
    let (status, headers, body) = app.send(get_as("/api/user/urls", "alice")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers.get(header::CONTENT_ENCODING).is_none());
    assert_eq!(
        json(&body)[0]["original_url"],
        "https://example.com/some/long/path?page=1"
    );
}

#[tokio::test]
async fn batch_shorten_keeps_correlation_ids() {
    let app = TestApp::new();

    let (status, _, body) = app
        .send(json_request(
            "POST",
            "/api/shorten/batch",
            "alice",
            serde_json::json!([
                { "correlation_id": "first", "original_url": "https://a.example" },
                { "correlation_id": "second", "original_url": "https://b.example" },
            ]),
        ))
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(
        json(&body),
        serde_json::json!([
            { "correlation_id": "first", "short_url": "http://snip.test/sn000000" },
            { "correlation_id": "second", "short_url": "http://snip.test/sn000001" },
        ])
    );
}

#[tokio::test]
async fn redirect_found_gone_and_missing() {
    let app = TestApp::new();
    let alice = UserId::new_unchecked("alice");
    app.repository
        .insert(
            &ShortCode::new_unchecked("kept01"),
            "https://kept.example",
            Some(&alice),
        )
        .await
        .unwrap();
    app.repository
        .insert(
            &ShortCode::new_unchecked("gone01"),
            "https://gone.example",
            Some(&alice),
        )
        .await
        .unwrap();
    app.repository
        .mark_deleted(&[ShortCode::new_unchecked("gone01")])
        .await
        .unwrap();

    let (status, headers, _) = app.send(get("/kept01")).await;
    assert_eq!(status, StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(headers[header::LOCATION], "https://kept.example");

    let (status, _, _) = app.send(get("/gone01")).await;
    assert_eq!(status, StatusCode::GONE);

    let (status, _, _) = app.send(get("/nothing")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) = app.send(get("/a.b")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn user_urls_lists_only_own_urls() {
    let app = TestApp::new();

    let (status, _, _) = app.send(get_as("/api/user/urls", "alice")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    app.send(post_text("/", "alice", "https://a.example")).await;
    app.send(post_text("/", "bob", "https://b.example")).await;

    let (status, _, body) = app.send(get_as("/api/user/urls", "alice")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json(&body),
        serde_json::json!([
            { "short_url": "http://snip.test/sn000000", "original_url": "https://a.example" },
        ])
    );
}

#[tokio::test]
async fn delete_is_accepted_and_handed_to_the_deleter() {
    let (requests, mut received) = mpsc::unbounded_channel();
    let app = TestApp::with_deleter(Arc::new(ForwardingDeleter { requests }), None);

    let (status, _, _) = app
        .send(json_request(
            "DELETE",
            "/api/user/urls",
            "alice",
            serde_json::json!(["abc123", "def456", "!"]),
        ))
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (user, codes) = tokio::time::timeout(Duration::from_secs(1), received.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.as_str(), "alice");
    assert_eq!(
        codes,
        vec![
            ShortCode::new_unchecked("abc123"),
            ShortCode::new_unchecked("def456")
        ]
    );
}

#[tokio::test]
async fn delete_with_malformed_body_is_rejected() {
    let app = TestApp::new();

    let (status, _, _) = app
        .send(json_request(
            "DELETE",
            "/api/user/urls",
            "alice",
            serde_json::json!({ "codes": [] }),
        ))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn deleted_urls_end_up_gone() {
    let repository = Arc::new(InMemoryRepository::new());
    let deleter = Arc::new(UrlDeleter::new(
        DeleterConfig::builder()
            .batch_waiting_time(Duration::from_millis(10))
            .build(),
        Arc::clone(&repository),
    ));
    deleter.start().unwrap();

    let shortener = Arc::new(ShortenerService::new(
        Arc::clone(&repository),
        SeqGenerator::with_prefix("sn"),
    ));
    let router = App::router(AppState::new(shortener, deleter.clone(), BASE_URL));
    let app = TestApp { repository, router };

    app.send(post_text("/", "alice", "https://a.example")).await;
    app.send(post_text("/", "bob", "https://b.example")).await;

    let (status, _, _) = app
        .send(json_request(
            "DELETE",
            "/api/user/urls",
            "alice",
            serde_json::json!(["sn000000", "sn000001"]),
        ))
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let mut gone = false;
    for _ in 0..100 {
        let (status, _, _) = app.send(get("/sn000000")).await;
        if status == StatusCode::GONE {
            gone = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(gone, "alice's url should be deleted");

    deleter.stop().await;

    let (status, _, _) = app.send(get("/sn000001")).await;
    assert_eq!(status, StatusCode::TEMPORARY_REDIRECT);
}

#[tokio::test]
async fn stats_respect_trusted_subnet() {
    let (requests, _) = mpsc::unbounded_channel();
    let app = TestApp::with_deleter(
        Arc::new(ForwardingDeleter { requests }),
        Some("10.0.0.0/8".parse().unwrap()),
    );
    app.send(post_text("/", "alice", "https://a.example")).await;

    let trusted = Request::builder()
        .uri("/api/internal/stats")
        .header("X-Real-IP", "10.1.2.3")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = app.send(trusted).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body), serde_json::json!({ "urls": 1, "users": 1 }));

    let untrusted = Request::builder()
        .uri("/api/internal/stats")
        .header("X-Real-IP", "192.168.0.1")
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = app.send(untrusted).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _, _) = app.send(get("/api/internal/stats")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn stats_are_open_without_trusted_subnet() {
    let app = TestApp::new();

    let (status, _, body) = app.send(get("/api/internal/stats")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body), serde_json::json!({ "urls": 0, "users": 0 }));
}
