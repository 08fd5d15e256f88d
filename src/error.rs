use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::features::tinify::FREE_TIER_MONTHLY_LIMIT;

/// 应用统一错误类型（请求级）
#[derive(Error, Debug)]
pub enum AppError {
    /// 请求中没有图片（JSON 缺少 image 字段 / multipart 缺少文件）
    #[error("{0}")]
    MissingInput(String),

    /// 参数校验错误（格式、尺寸、base64 等）
    #[error("{0}")]
    InvalidInput(String),

    /// 请求体超过上传限制
    #[error("{0}")]
    PayloadTooLarge(String),

    /// 上游压缩服务错误
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// 凭证校验失败（状态接口专用，统一按 401 返回）
    #[error("{0}")]
    CredentialCheck(ServiceError),

    /// 内部服务器错误
    #[error("{0}")]
    Internal(String),
}

/// 上游（Tinify）错误类型
#[derive(Error, Debug)]
pub enum ServiceError {
    /// API Key 无效（HTTP 401）
    #[error("{0}")]
    Auth(String),

    /// 月度额度或速率超限（HTTP 429）
    #[error("{0}")]
    Quota(String),

    /// 上游拒绝了请求（其余 4xx）
    #[error("{message} (HTTP {status})")]
    Client { status: u16, message: String },

    /// 上游内部错误（5xx）
    #[error("{message} (HTTP {status})")]
    Server { status: u16, message: String },

    /// 无法归类的响应状态
    #[error("{message} (HTTP {status})")]
    Unexpected { status: u16, message: String },

    /// 网络连接错误
    #[error("connection error: {0}")]
    Connection(String),

    /// 上游请求超时
    #[error("upstream request timed out")]
    Timeout,

    /// 上游响应无法解析
    #[error("invalid upstream response: {0}")]
    Decode(String),
}

impl ServiceError {
    /// 按上游 HTTP 状态码归类错误
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 => ServiceError::Auth(message),
            429 => ServiceError::Quota(message),
            400..=499 => ServiceError::Client { status, message },
            500..=599 => ServiceError::Server { status, message },
            _ => ServiceError::Unexpected { status, message },
        }
    }
}

/// 统一错误响应体
///
/// 所有接口（包括成功时返回二进制的接口）出错时都返回这一 JSON 结构。
#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    /// 面向用户的错误标签
    #[schema(example = "Invalid API key")]
    pub error: String,

    /// 详细信息（上游错误会原样透出）
    #[schema(example = "Credentials are invalid.")]
    pub message: String,

    /// 稳定的错误码，用于程序化处理
    #[schema(example = "INVALID_API_KEY")]
    pub code: String,

    /// HTTP 状态码（与响应 status 一致）
    #[schema(example = 401)]
    pub status: u16,

    /// 请求追踪 ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::MissingInput(_) | AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::CredentialCheck(_) => StatusCode::UNAUTHORIZED,
            AppError::Service(ServiceError::Auth(_)) => StatusCode::UNAUTHORIZED,
            AppError::Service(ServiceError::Quota(_)) => StatusCode::TOO_MANY_REQUESTS,
            AppError::Service(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn stable_code(&self) -> &'static str {
        match self {
            AppError::MissingInput(_) => "MISSING_INPUT",
            AppError::InvalidInput(_) => "INVALID_INPUT",
            AppError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            AppError::CredentialCheck(_) | AppError::Service(ServiceError::Auth(_)) => {
                "INVALID_API_KEY"
            }
            AppError::Service(ServiceError::Quota(_)) => "RATE_LIMITED",
            AppError::Service(_) => "COMPRESSION_FAILED",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 错误标签（响应体的 `error` 字段）
    pub fn label(&self) -> &'static str {
        match self {
            AppError::MissingInput(_) => "No image provided",
            AppError::InvalidInput(_) => "Invalid request",
            AppError::PayloadTooLarge(_) => "Payload too large",
            AppError::CredentialCheck(_) | AppError::Service(ServiceError::Auth(_)) => {
                "Invalid API key"
            }
            AppError::Service(ServiceError::Quota(_)) => "Rate limited, monthly limit reached",
            AppError::Service(_) => "Compression failed",
            AppError::Internal(_) => "Internal server error",
        }
    }

    /// 详细信息（响应体的 `message` 字段）
    pub fn message(&self) -> String {
        match self {
            AppError::Service(ServiceError::Auth(detail)) => {
                format!("The configured Tinify API key was rejected: {detail}")
            }
            AppError::Service(ServiceError::Quota(detail)) => format!(
                "The free tier allows {FREE_TIER_MONTHLY_LIMIT} compressions/month: {detail}"
            ),
            AppError::CredentialCheck(e) => {
                format!("Unable to validate the configured Tinify API key: {e}")
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.stable_code(), "请求失败: {}", self);
        } else {
            tracing::warn!(code = self.stable_code(), "请求被拒绝: {}", self);
        }

        let body = ErrorBody {
            error: self.label().to_string(),
            message: self.message(),
            code: self.stable_code().to_string(),
            status: status.as_u16(),
            request_id: crate::request_id::current_request_id(),
        };

        let mut res = Json(body).into_response();
        *res.status_mut() = status;
        res.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        res
    }
}

// =============== Error conversions for common external errors ===============

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ServiceError::Timeout
        } else if err.is_decode() {
            ServiceError::Decode(err.to_string())
        } else {
            ServiceError::Connection(err.to_string())
        }
    }
}
