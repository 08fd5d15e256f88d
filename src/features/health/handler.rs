use axum::{http::StatusCode, response::Json};
use serde::{Deserialize, Serialize};

/// 服务名（与 Cargo package 名一致）
pub const SERVICE_NAME: &str = env!("CARGO_PKG_NAME");

/// 存活检查响应
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct HealthResponse {
    /// 服务名称
    #[schema(example = "tiny-relay")]
    pub service: String,
    /// 服务状态
    #[schema(example = "running")]
    pub status: String,
    /// 当前版本（Cargo package version）
    #[schema(example = "0.1.0")]
    pub version: String,
}

#[utoipa::path(
    get,
    path = "/",
    summary = "存活检查",
    description = "用于探活，返回服务名、状态与版本；不访问上游。",
    responses((status = 200, description = "服务运行中", body = HealthResponse)),
    tag = "Health"
)]
pub async fn health_check() -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            service: SERVICE_NAME.to_string(),
            status: "running".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}
