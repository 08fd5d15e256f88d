mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use base64::{Engine as _, engine::general_purpose};
use serde_json::json;

use common::{
    COUNT_AFTER_SHRINK, COUNT_ON_VALIDATE, Upstream, build_app, json_request, send, spawn_mock,
    test_config,
};

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build request")
}

#[tokio::test]
async fn status_reports_usage_for_valid_key() {
    let mock = spawn_mock(Upstream::Ok).await;
    let app = build_app(&test_config(&mock));

    let (status, _, body) = send(app, get("/api/status")).await;
    assert_eq!(status, StatusCode::OK);

    let v: serde_json::Value = serde_json::from_slice(&body).expect("parse json");
    assert_eq!(v["status"], "ok");
    assert_eq!(v["compressionCount"], COUNT_ON_VALIDATE);
    assert_eq!(v["monthlyLimit"], 500);
    assert_eq!(v["remaining"], 500 - COUNT_ON_VALIDATE);
    assert_eq!(
        v["message"],
        format!("API key is valid. {COUNT_ON_VALIDATE}/500 compressions used this month.")
    );

    // 校验只发一次空的 shrink
    let calls = mock.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].path, "/shrink");
}

#[tokio::test]
async fn status_rejects_invalid_key() {
    let mock = spawn_mock(Upstream::Unauthorized).await;
    let app = build_app(&test_config(&mock));

    let (status, _, body) = send(app, get("/api/status")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let v: serde_json::Value = serde_json::from_slice(&body).expect("parse json");
    assert_eq!(v["error"], "Invalid API key");
    assert_eq!(v["code"], "INVALID_API_KEY");
    assert_eq!(v["status"], 401);
}

#[tokio::test]
async fn exhausted_quota_still_reports_valid_key() {
    let mock = spawn_mock(Upstream::QuotaExceeded).await;
    let app = build_app(&test_config(&mock));

    let (status, _, body) = send(app, get("/api/status")).await;
    assert_eq!(status, StatusCode::OK);

    let v: serde_json::Value = serde_json::from_slice(&body).expect("parse json");
    assert_eq!(v["status"], "ok");
    assert_eq!(v["compressionCount"], 500);
    assert_eq!(v["monthlyLimit"], 500);
    assert_eq!(v["remaining"], 0);
    assert_eq!(
        v["message"],
        "API key is valid. 500/500 compressions used this month."
    );
}

#[tokio::test]
async fn status_maps_any_validation_failure_to_unauthorized() {
    let mock = spawn_mock(Upstream::ServerError).await;
    let app = build_app(&test_config(&mock));

    let (status, _, body) = send(app, get("/api/status")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let v: serde_json::Value = serde_json::from_slice(&body).expect("parse json");
    assert_eq!(v["error"], "Invalid API key");
    assert!(
        v["message"]
            .as_str()
            .is_some_and(|m| m.contains("temporarily unavailable"))
    );
}

#[tokio::test]
async fn status_is_unauthorized_when_upstream_unreachable() {
    let mock = spawn_mock(Upstream::Ok).await;
    let mut config = test_config(&mock);
    // 端口 9 (discard) 上通常没有监听
    config.tinify.base_url = "http://127.0.0.1:9".to_string();
    let app = build_app(&config);

    let (status, _, _) = send(app, get("/api/status")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn compress_updates_usage_seen_by_shared_client() {
    let mock = spawn_mock(Upstream::Ok).await;
    let config = test_config(&mock);
    let state = tiny_relay::AppState::new(&config.tinify).expect("app state");
    let app = tiny_relay::create_app(state.clone(), &config);

    let image = general_purpose::STANDARD.encode(b"some-image-bytes");
    let (status, _, _) = send(
        app,
        json_request("/api/compress", json!({ "image": image })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state.tinify.usage().compression_count, COUNT_AFTER_SHRINK);
}

#[tokio::test]
async fn liveness_root_reports_running() {
    let mock = spawn_mock(Upstream::Ok).await;
    let app = build_app(&test_config(&mock));

    let (status, _, body) = send(app, get("/")).await;
    assert_eq!(status, StatusCode::OK);

    let v: serde_json::Value = serde_json::from_slice(&body).expect("parse json");
    assert_eq!(v["service"], "tiny-relay");
    assert_eq!(v["status"], "running");
    assert_eq!(v["version"], env!("CARGO_PKG_VERSION"));
    assert!(mock.calls().is_empty(), "liveness must not touch upstream");
}

#[tokio::test]
async fn openapi_document_is_served() {
    let mock = spawn_mock(Upstream::Ok).await;
    let app = build_app(&test_config(&mock));

    let (status, _, body) = send(app, get("/api-docs/openapi.json")).await;
    assert_eq!(status, StatusCode::OK);

    let v: serde_json::Value = serde_json::from_slice(&body).expect("parse json");
    assert!(v["paths"].get("/compress").is_some());
    assert!(v["paths"].get("/compress/binary").is_some());
    assert!(v["paths"].get("/status").is_some());
}
