use axum::{Json, Router, extract::State, routing::get};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, ErrorBody};
use crate::state::AppState;

/// 凭证状态响应
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    #[schema(example = "ok")]
    pub status: String,
    /// 本月已用压缩次数
    #[schema(example = 42)]
    pub compression_count: u64,
    /// 免费额度月上限
    #[schema(example = 500)]
    pub monthly_limit: u64,
    /// 剩余次数
    #[schema(example = 458)]
    pub remaining: u64,
    #[schema(example = "API key is valid. 42/500 compressions used this month.")]
    pub message: String,
}

#[utoipa::path(
    get,
    path = "/status",
    summary = "校验 API Key 并查询用量",
    description = "向 Tinify 校验当前配置的 API Key（不消耗额度），返回本月已用压缩次数。额度用完仍视为凭证有效；其余校验失败统一返回 401。",
    responses(
        (status = 200, description = "凭证有效", body = StatusResponse),
        (status = 401, description = "凭证无效或无法校验", body = ErrorBody)
    ),
    tag = "Status"
)]
pub async fn get_status(State(state): State<AppState>) -> Result<Json<StatusResponse>, AppError> {
    let usage = state
        .tinify
        .validate()
        .await
        .map_err(AppError::CredentialCheck)?;

    Ok(Json(StatusResponse {
        status: "ok".to_string(),
        compression_count: usage.compression_count,
        monthly_limit: usage.monthly_limit,
        remaining: usage.remaining(),
        message: format!(
            "API key is valid. {}/{} compressions used this month.",
            usage.compression_count, usage.monthly_limit
        ),
    }))
}

pub fn create_status_router() -> Router<AppState> {
    Router::<AppState>::new().route("/status", get(get_status))
}
