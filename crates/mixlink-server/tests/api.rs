//! REST API integration tests.
//!
//! Each test builds a real AuthManager backed by a tempdir, constructs the
//! axum Router, and sends requests via `tower::ServiceExt`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, Method, Request, StatusCode};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt; // for `.oneshot()`

use mixlink_auth::{AuthManager, SessionFile};
use mixlink_core::{AuthConfig, Config};
use mixlink_server::{create_router, AppState};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn setup_with_config(auth: AuthConfig) -> (axum::Router, TempDir) {
    let tmp = TempDir::new().expect("tempdir");
    let file = SessionFile::with_path(tmp.path().join("sessions.json")).expect("session file");
    let config = Config::new().with_auth(auth);
    let manager = Arc::new(AuthManager::open(&config.auth, file).await);
    let state = Arc::new(AppState::new(config, manager));
    (create_router(state), tmp)
}

async fn setup() -> (axum::Router, TempDir) {
    setup_with_config(AuthConfig::default()).await
}

fn json_request(method: Method, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    match body {
        Some(val) => builder.body(Body::from(val.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn authed_request(method: Method, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

fn from_peer(mut request: Request<Body>, peer: &str) -> Request<Body> {
    let addr: SocketAddr = peer.parse().unwrap();
    request.extensions_mut().insert(ConnectInfo(addr));
    request
}

async fn body_json(resp: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).to_string()))
}

/// Pair a device and return (session id, token)
async fn pair(app: &axum::Router, device: &str) -> (String, String) {
    let resp = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/pair/initiate",
            Some(json!({ "deviceName": device })),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let ticket = body_json(resp).await;

    let resp = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/pair/complete",
            Some(json!({
                "code": ticket["code"].as_str().unwrap().to_lowercase(),
                "correlationId": ticket["correlationId"],
            })),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    (
        body["sessionId"].as_str().unwrap().to_string(),
        body["token"].as_str().unwrap().to_string(),
    )
}

// ---------------------------------------------------------------------------
// Pairing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn initiate_returns_ticket() {
    let (app, _tmp) = setup().await;

    let resp = app
        .oneshot(json_request(Method::POST, "/api/pair/initiate", None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = body_json(resp).await;
    assert_eq!(body["code"].as_str().unwrap().len(), 6);
    assert_eq!(body["expiresIn"], 300);
    assert!(body["correlationId"].is_string());
}

#[tokio::test]
async fn complete_with_unknown_code_is_rejected() {
    let (app, _tmp) = setup().await;

    let resp = app
        .oneshot(json_request(
            Method::POST,
            "/api/pair/complete",
            Some(json!({ "code": "ZZZZZZ", "correlationId": "nope" })),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = body_json(resp).await;
    assert_eq!(body["error"], "pairing_code_invalid");
    assert_eq!(body["message"], "Invalid pairing code");
}

#[tokio::test]
async fn initiate_is_rate_limited_per_peer() {
    let (app, _tmp) = setup().await;

    for _ in 0..3 {
        let resp = app
            .clone()
            .oneshot(from_peer(
                json_request(Method::POST, "/api/pair/initiate", None),
                "192.168.1.50:50000",
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    let resp = app
        .clone()
        .oneshot(from_peer(
            json_request(Method::POST, "/api/pair/initiate", None),
            "192.168.1.50:50001",
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body_json(resp).await["error"], "pairing_rate_limited");

    let resp = app
        .oneshot(from_peer(
            json_request(Method::POST, "/api/pair/initiate", None),
            "192.168.1.51:50000",
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn session_limit_maps_to_conflict() {
    let (app, _tmp) = setup_with_config(AuthConfig::default().with_session_max_count(1)).await;
    pair(&app, "phone").await;

    let resp = app
        .clone()
        .oneshot(json_request(Method::POST, "/api/pair/initiate", None))
        .await
        .unwrap();
    let ticket = body_json(resp).await;

    let resp = app
        .oneshot(json_request(
            Method::POST,
            "/api/pair/complete",
            Some(json!({ "code": ticket["code"], "correlationId": ticket["correlationId"] })),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(resp).await["error"], "session_limit_reached");
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sessions_require_a_token() {
    let (app, _tmp) = setup().await;

    let resp = app
        .clone()
        .oneshot(json_request(Method::GET, "/api/sessions", None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(resp).await["error"], "unauthorized");

    let resp = app
        .oneshot(authed_request(Method::GET, "/api/sessions", "bogus"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(resp).await["error"], "session_invalid");
}

#[tokio::test]
async fn list_and_revoke_sessions() {
    let (app, _tmp) = setup().await;
    let (phone_id, phone_token) = pair(&app, "phone").await;
    let (tablet_id, tablet_token) = pair(&app, "tablet").await;

    let resp = app
        .clone()
        .oneshot(authed_request(Method::GET, "/api/sessions", &phone_token))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let list = body_json(resp).await;
    assert_eq!(list.as_array().unwrap().len(), 2);
    assert!(list[0].get("token").is_none());

    let uri = format!("/api/sessions/{}", tablet_id);
    let resp = app
        .clone()
        .oneshot(authed_request(Method::GET, &uri, &phone_token))
        .await
        .unwrap();
    assert_eq!(body_json(resp).await["deviceName"], "tablet");

    let resp = app
        .clone()
        .oneshot(authed_request(Method::DELETE, &uri, &phone_token))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = app
        .clone()
        .oneshot(authed_request(Method::DELETE, &uri, &phone_token))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    // Revoked token no longer works
    let resp = app
        .clone()
        .oneshot(authed_request(Method::GET, "/api/sessions", &tablet_token))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = app
        .clone()
        .oneshot(authed_request(Method::DELETE, "/api/sessions", &phone_token))
        .await
        .unwrap();
    assert_eq!(body_json(resp).await["revoked"], 1);

    let uri = format!("/api/sessions/{}", phone_id);
    let resp = app
        .oneshot(authed_request(Method::GET, &uri, &phone_token))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn current_session_is_optional() {
    let (app, _tmp) = setup().await;

    let resp = app
        .clone()
        .oneshot(json_request(Method::GET, "/api/session", None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["authenticated"], false);

    let (id, token) = pair(&app, "phone").await;
    let resp = app
        .oneshot(authed_request(Method::GET, "/api/session", &token))
        .await
        .unwrap();
    let body = body_json(resp).await;
    assert_eq!(body["authenticated"], true);
    assert_eq!(body["session"]["sessionId"], id.as_str());
    assert_eq!(body["session"]["deviceName"], "phone");
}

#[tokio::test]
async fn info_reports_counts() {
    let (app, _tmp) = setup().await;
    pair(&app, "phone").await;

    let resp = app
        .oneshot(json_request(Method::GET, "/api/info", None))
        .await
        .unwrap();
    let body = body_json(resp).await;
    assert_eq!(body["sessions"], 1);
    assert_eq!(body["maxSessions"], 10);
    assert_eq!(body["pendingPairings"], 0);
}
