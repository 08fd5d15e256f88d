#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    body::{Body, Bytes, to_bytes},
    extract::{Path, State},
    http::{HeaderMap, Request, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower::ServiceExt;

use tiny_relay::{AppConfig, AppState, create_app};

/// 模拟上游在 /shrink 上的行为
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upstream {
    Ok,
    Unauthorized,
    QuotaExceeded,
    ServerError,
}

/// 每次调用的记录：(方法, 路径, 提交的指令 JSON)
#[derive(Debug, Clone)]
pub struct Call {
    pub method: String,
    pub path: String,
    pub commands: Option<serde_json::Value>,
}

#[derive(Clone)]
struct MockState {
    addr: SocketAddr,
    mode: Upstream,
    calls: Arc<Mutex<Vec<Call>>>,
}

pub struct MockTinify {
    pub addr: SocketAddr,
    pub calls: Arc<Mutex<Vec<Call>>>,
}

impl MockTinify {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

/// 上游压缩后返回的固定字节（4 字节）
pub const COMPRESSED: &[u8] = b"tiny";
/// shrink 之后的月度计数
pub const COUNT_AFTER_SHRINK: u64 = 8;
/// 空请求（凭证校验）时报告的月度计数
pub const COUNT_ON_VALIDATE: u64 = 7;

fn error_json(status: StatusCode, error: &str, message: &str, count: u64) -> Response {
    let mut res = (
        status,
        Json(serde_json::json!({ "error": error, "message": message })),
    )
        .into_response();
    res.headers_mut()
        .insert("compression-count", count.into());
    res
}

async fn shrink(State(st): State<MockState>, headers: HeaderMap, body: Bytes) -> Response {
    st.calls.lock().expect("calls lock").push(Call {
        method: "POST".into(),
        path: "/shrink".into(),
        commands: None,
    });

    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("Basic "));
    if !authorized || st.mode == Upstream::Unauthorized {
        return error_json(
            StatusCode::UNAUTHORIZED,
            "Unauthorized",
            "Credentials are invalid.",
            0,
        );
    }
    if st.mode == Upstream::QuotaExceeded {
        return error_json(
            StatusCode::TOO_MANY_REQUESTS,
            "TooManyRequests",
            "Your monthly limit has been exceeded.",
            500,
        );
    }
    if st.mode == Upstream::ServerError {
        return error_json(
            StatusCode::SERVICE_UNAVAILABLE,
            "ServiceUnavailable",
            "Service is temporarily unavailable.",
            COUNT_ON_VALIDATE,
        );
    }
    if body.is_empty() {
        return error_json(
            StatusCode::BAD_REQUEST,
            "InputMissing",
            "Input file is empty.",
            COUNT_ON_VALIDATE,
        );
    }

    let location = format!("http://{}/output/abc123", st.addr);
    let json = serde_json::json!({
        "input": { "size": body.len(), "type": "image/png" },
        "output": {
            "size": COMPRESSED.len(),
            "type": "image/png",
            "width": 100,
            "height": 50,
            "ratio": 0.5,
            "url": location,
        }
    });
    let mut res = (StatusCode::CREATED, Json(json)).into_response();
    res.headers_mut()
        .insert(header::LOCATION, location.parse().expect("location header"));
    res.headers_mut()
        .insert("compression-count", COUNT_AFTER_SHRINK.into());
    res
}

fn output_response(mime: &str) -> Response {
    let mut res = (StatusCode::OK, Bytes::from_static(COMPRESSED)).into_response();
    let headers = res.headers_mut();
    headers.insert(header::CONTENT_TYPE, mime.parse().expect("content type"));
    headers.insert("image-width", 100u32.into());
    headers.insert("image-height", 50u32.into());
    headers.insert("compression-count", COUNT_AFTER_SHRINK.into());
    res
}

async fn output_get(State(st): State<MockState>, Path(id): Path<String>) -> Response {
    st.calls.lock().expect("calls lock").push(Call {
        method: "GET".into(),
        path: format!("/output/{id}"),
        commands: None,
    });
    output_response("image/png")
}

async fn output_post(
    State(st): State<MockState>,
    Path(id): Path<String>,
    Json(commands): Json<serde_json::Value>,
) -> Response {
    let mime = commands["convert"]["type"]
        .as_str()
        .unwrap_or("image/png")
        .to_string();
    st.calls.lock().expect("calls lock").push(Call {
        method: "POST".into(),
        path: format!("/output/{id}"),
        commands: Some(commands),
    });
    output_response(&mime)
}

/// 在 127.0.0.1 随机端口上启动模拟的 Tinify 服务
pub async fn spawn_mock(mode: Upstream) -> MockTinify {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock listener");
    let addr = listener.local_addr().expect("mock addr");
    let calls = Arc::new(Mutex::new(Vec::new()));

    let state = MockState {
        addr,
        mode,
        calls: calls.clone(),
    };
    let router = Router::new()
        .route("/shrink", post(shrink))
        .route("/output/:id", get(output_get).post(output_post))
        .with_state(state);

    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });

    MockTinify { addr, calls }
}

pub fn test_config(mock: &MockTinify) -> AppConfig {
    let mut config = AppConfig::default();
    config.tinify.api_key = "test-api-key".to_string();
    config.tinify.base_url = mock.base_url();
    config.tinify.timeout_secs = 5;
    config
}

pub fn build_app(config: &AppConfig) -> Router {
    let state = AppState::new(&config.tinify).expect("app state");
    create_app(state, config)
}

/// 发送请求并读取 (状态, 响应头, body)
pub async fn send(app: Router, req: Request<Body>) -> (StatusCode, HeaderMap, Bytes) {
    let resp = app.oneshot(req).await.expect("call app");
    let status = resp.status();
    let headers = resp.headers().clone();
    let body = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    (status, headers, body)
}

pub fn json_request(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("build request")
}

pub const BOUNDARY: &str = "----tiny-relay-test-boundary";

/// 手工拼装 multipart/form-data 请求体
pub fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((field, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"upload.png\"\r\nContent-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn multipart_request(uri: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .expect("build request")
}
