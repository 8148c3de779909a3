//! HTTP-level tests driven through the router with `oneshot`.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use facegate::{Engine, EMBEDDING_DIM};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use server::{build_router, FsMediaStore, ServerConfig, ServerState, StaticTokens, TokenGrant};
use tower::ServiceExt;

const ADMIN: &str = "admin-token";
const OTHER_ADMIN: &str = "other-admin-token";
const VIEWER: &str = "viewer-token";
const BOUNDARY: &str = "facegate-test-boundary";

struct TestApp {
    router: Router,
    _media_dir: tempfile::TempDir,
}

fn grant(token: &str, tenant: &str, is_admin: bool) -> TokenGrant {
    TokenGrant {
        token: token.into(),
        user_id: format!("{token}-user"),
        tenant_id: tenant.into(),
        is_admin,
    }
}

fn app_with(config: ServerConfig) -> TestApp {
    let media_dir = tempfile::tempdir().unwrap();
    let engine = Engine::in_memory().unwrap();
    let sessions = Arc::new(StaticTokens::new(vec![
        grant(ADMIN, "acme", true),
        grant(OTHER_ADMIN, "globex", true),
        grant(VIEWER, "acme", false),
    ]));
    let media = Arc::new(FsMediaStore::new(
        media_dir.path(),
        "http://media.test/media",
    ));
    let state = ServerState::from_parts(config, engine, sessions, media);
    TestApp {
        router: build_router(Arc::new(state)),
        _media_dir: media_dir,
    }
}

fn app() -> TestApp {
    app_with(ServerConfig {
        serve_media: false,
        ..ServerConfig::default()
    })
}

async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };
    (status, body)
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

fn filled(value: f32) -> Vec<f32> {
    vec![value; EMBEDDING_DIM]
}

fn csv(vector: &[f32]) -> String {
    vector
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn enroll_request(
    token: &str,
    user_id: &str,
    embedding: &str,
    image_type: &str,
    image: &[u8],
) -> Request<Body> {
    let mut body = Vec::new();
    for (name, value) in [("userId", user_id), ("embedding", embedding)] {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"faceImage\"; filename=\"face.jpg\"\r\nContent-Type: {image_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(image);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/api/faces")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn create_user(app: &TestApp, token: &str, user_id: &str, name: &str) {
    let (status, _) = send(
        app,
        json_request(
            "POST",
            "/api/users",
            Some(token),
            json!({ "name": name, "user_id": user_id }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

async fn enroll(app: &TestApp, token: &str, user_id: &str, vector: &[f32]) -> Value {
    let (status, body) = send(
        app,
        enroll_request(token, user_id, &csv(vector), "image/jpeg", b"\xff\xd8jpeg"),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body
}

async fn recognize(app: &TestApp, token: &str, vector: &[f32]) -> (StatusCode, Value) {
    send(
        app,
        json_request(
            "POST",
            "/api/faces/recognize",
            Some(token),
            json!({ "embedding": vector }),
        ),
    )
    .await
}

#[tokio::test]
async fn public_endpoints_need_no_token() {
    let app = app();
    let (status, body) = send(&app, get("/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = send(&app, get("/ready", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["components"]["store"], "ready");

    let (status, _) = send(&app, get("/", None)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn api_requires_bearer_token() {
    let app = app();
    let (status, body) = send(&app, get("/api/users", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "AUTH_FAILED");
    assert_eq!(body["error"]["retryable"], false);

    let (status, _) = send(&app, get("/api/users", Some("bogus"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn non_admin_is_forbidden() {
    let app = app();
    let (status, body) = recognize(&app, VIEWER, &filled(0.0)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");
}

#[tokio::test]
async fn enroll_and_recognize_round_trip() {
    let app = app();
    create_user(&app, ADMIN, "a", "Ada").await;
    create_user(&app, ADMIN, "b", "Bo").await;

    let enrolled = enroll(&app, ADMIN, "a", &filled(0.0)).await;
    assert_eq!(enrolled["subject_id"], "a");
    let image_ref = enrolled["image_ref"].as_str().unwrap();
    assert!(image_ref.starts_with("faces/") && image_ref.ends_with(".jpg"));
    assert_eq!(
        enrolled["image_url"],
        format!("http://media.test/media/{image_ref}")
    );
    enroll(&app, ADMIN, "b", &filled(1.0)).await;

    let (status, body) = recognize(&app, ADMIN, &filled(0.0)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["matched"], true);
    assert_eq!(body["subject_id"], "a");
    assert_eq!(body["display_name"], "Ada");
    assert_eq!(body["distance"], 0.0);
    assert_eq!(body["confidence"], 1.0);
    assert_eq!(body["image_url"], enrolled["image_url"]);

    let (status, logs) = send(&app, get("/api/faces/logs?limit=10", Some(ADMIN))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(logs.as_array().unwrap().len(), 1);
    assert_eq!(logs[0]["subject_id"], "a");
}

#[tokio::test]
async fn far_query_reports_no_match_with_threshold() {
    let app = app();
    create_user(&app, ADMIN, "c", "Cy").await;
    let mut stored = filled(0.0);
    stored[0] = 5.0;
    enroll(&app, ADMIN, "c", &stored).await;

    let (status, body) = recognize(&app, ADMIN, &filled(0.0)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["matched"], false);
    assert!((body["threshold"].as_f64().unwrap() - 0.6).abs() < 1e-6);
    assert_eq!(body.as_object().unwrap().len(), 2, "{body}");
}

#[tokio::test]
async fn tenants_are_isolated() {
    let app = app();
    create_user(&app, ADMIN, "a", "Ada").await;
    enroll(&app, ADMIN, "a", &filled(0.0)).await;

    let (_, body) = recognize(&app, OTHER_ADMIN, &filled(0.0)).await;
    assert_eq!(body["matched"], false);

    let (status, _) = send(&app, get("/api/faces/user/a", Some(OTHER_ADMIN))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, get("/api/faces/user/a", Some(ADMIN))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["subject_id"], "a");
}

#[tokio::test]
async fn wrong_dimension_is_validation_error() {
    let app = app();
    let (status, body) = recognize(&app, ADMIN, &[0.0; 3]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert!(body["error"]["message"].as_str().unwrap().contains("512"));

    create_user(&app, ADMIN, "a", "Ada").await;
    let (status, body) = send(
        &app,
        enroll_request(ADMIN, "a", "0.1,0.2", "image/png", b"png"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn malformed_json_is_bad_request() {
    let app = app();
    let request = Request::builder()
        .method("POST")
        .uri("/api/faces/recognize")
        .header(header::AUTHORIZATION, format!("Bearer {ADMIN}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{ not json"))
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn enrollment_checks_subject_and_file_type() {
    let app = app();
    let embedding = csv(&filled(0.0));

    let (status, body) = send(
        &app,
        enroll_request(ADMIN, "ghost", &embedding, "image/jpeg", b"jpeg"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND, "{body}");

    create_user(&app, ADMIN, "a", "Ada").await;
    let (status, body) = send(
        &app,
        enroll_request(ADMIN, "a", &embedding, "text/plain", b"hello"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("Only image files"));
}

#[tokio::test]
async fn oversized_image_is_rejected() {
    let app = app_with(ServerConfig {
        serve_media: false,
        max_image_mb: 1,
        max_body_size_mb: 4,
        ..ServerConfig::default()
    });
    create_user(&app, ADMIN, "a", "Ada").await;
    let image = vec![0u8; 1024 * 1024 + 1];
    let (status, body) = send(
        &app,
        enroll_request(ADMIN, "a", &csv(&filled(0.0)), "image/jpeg", &image),
    )
    .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"]["code"], "PAYLOAD_TOO_LARGE");
}

#[tokio::test]
async fn deleted_user_is_no_longer_recognized() {
    let app = app();
    create_user(&app, ADMIN, "a", "Ada").await;
    enroll(&app, ADMIN, "a", &filled(0.0)).await;

    let request = Request::builder()
        .method("DELETE")
        .uri("/api/users/a")
        .header(header::AUTHORIZATION, format!("Bearer {ADMIN}"))
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = recognize(&app, ADMIN, &filled(0.0)).await;
    assert_eq!(body["matched"], false);

    let (status, _) = send(&app, get("/api/faces/user/a", Some(ADMIN))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, get("/api/users/a", Some(ADMIN))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn duplicate_user_is_conflict() {
    let app = app();
    create_user(&app, ADMIN, "a", "Ada").await;
    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/users",
            Some(ADMIN),
            json!({ "name": "Ada again", "user_id": "a" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");

    let (_, users) = send(&app, get("/api/users", Some(ADMIN))).await;
    assert_eq!(users.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn rename_updates_display_name_in_matches() {
    let app = app();
    create_user(&app, ADMIN, "a", "Ada").await;
    enroll(&app, ADMIN, "a", &filled(0.0)).await;

    let (status, body) = send(
        &app,
        json_request("PUT", "/api/users/a", Some(ADMIN), json!({ "name": "Ada Lovelace" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["display_name"], "Ada Lovelace");

    let (_, body) = recognize(&app, ADMIN, &filled(0.0)).await;
    assert_eq!(body["display_name"], "Ada Lovelace");

    let (status, body) = send(
        &app,
        json_request("PUT", "/api/users/a", Some(ADMIN), json!({ "name": "  " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, _) = send(
        &app,
        json_request("PUT", "/api/users/ghost", Some(ADMIN), json!({ "name": "Nobody" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Another tenant cannot rename it.
    let (status, _) = send(
        &app,
        json_request("PUT", "/api/users/a", Some(OTHER_ADMIN), json!({ "name": "Taken" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        json_request("PUT", "/api/users/a", Some(VIEWER), json!({ "name": "Mine" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn any_token_can_read_own_profile() {
    let app = app();
    let (status, body) = send(&app, get("/api/users/info", Some(VIEWER))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["user_id"], "viewer-token-user");
    assert_eq!(body["tenant_id"], "acme");
    assert_eq!(body["is_admin"], false);
    assert_eq!(body["face_registered"], false);
    assert!(body.get("display_name").is_none());

    create_user(&app, ADMIN, "viewer-token-user", "Vera").await;
    enroll(&app, ADMIN, "viewer-token-user", &filled(0.3)).await;
    let (_, body) = send(&app, get("/api/users/info", Some(VIEWER))).await;
    assert_eq!(body["display_name"], "Vera");
    assert_eq!(body["face_registered"], true);

    let (status, _) = send(&app, get("/api/users/info", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    // The viewer still cannot reach admin routes.
    let (status, _) = send(&app, get("/api/users", Some(VIEWER))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn rate_limit_applies_per_caller() {
    let app = app_with(ServerConfig {
        serve_media: false,
        rate_limit_per_minute: 2,
        ..ServerConfig::default()
    });
    for _ in 0..2 {
        let (status, _) = send(&app, get("/api/users", Some(ADMIN))).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, body) = send(&app, get("/api/users", Some(ADMIN))).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"]["retryable"], true);

    // Another caller has its own window.
    let (status, _) = send(&app, get("/api/users", Some(OTHER_ADMIN))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let app = app();
    let (status, body) = send(&app, get("/nope", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}
