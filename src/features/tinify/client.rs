use std::sync::atomic::{AtomicU64, Ordering};

use axum::body::Bytes;
use reqwest::header::{CONTENT_TYPE, HeaderMap, LOCATION};

use crate::config::TinifyConfig;
use crate::error::{AppError, ServiceError};

use super::FREE_TIER_MONTHLY_LIMIT;
use super::models::{
    ApiErrorBody, CommandSet, MaterializedImage, ServiceUsage, ShrinkOutput, ShrinkResponse,
};

/// Basic Auth 的固定用户名
const AUTH_USER: &str = "api";
const COMPRESSION_COUNT_HEADER: &str = "compression-count";
const IMAGE_WIDTH_HEADER: &str = "image-width";
const IMAGE_HEIGHT_HEADER: &str = "image-height";

/// Tinify HTTP API 客户端
///
/// 持有唯一的 API Key 与上游报告的月度用量；通过 `AppState` 显式传递，
/// 不依赖全局变量。
#[derive(Debug)]
pub struct TinifyClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    compression_count: AtomicU64,
}

impl TinifyClient {
    pub fn new(config: &TinifyConfig) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout_duration())
            .build()
            .map_err(|e| AppError::Internal(format!("初始化 HTTP Client 失败: {e}")))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.trim().to_string(),
            compression_count: AtomicU64::new(0),
        })
    }

    /// 最近一次观测到的用量
    pub fn usage(&self) -> ServiceUsage {
        ServiceUsage {
            compression_count: self.compression_count.load(Ordering::Relaxed),
            monthly_limit: FREE_TIER_MONTHLY_LIMIT,
        }
    }

    /// 上传源图，返回输出资源地址。每次调用消耗一次月度额度。
    pub async fn shrink(&self, image: Bytes) -> Result<ShrinkOutput, ServiceError> {
        let resp = self
            .http
            .post(self.endpoint("/shrink"))
            .basic_auth(AUTH_USER, Some(&self.api_key))
            .body(image)
            .send()
            .await?;
        let resp = self.check(resp).await?;

        let location = resp
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let info: ShrinkResponse = resp
            .json()
            .await
            .map_err(|e| ServiceError::Decode(format!("解析 shrink 响应失败: {e}")))?;

        let location = location
            .or_else(|| info.output.url.clone())
            .ok_or_else(|| ServiceError::Decode("shrink 响应缺少 Location".to_string()))?;

        Ok(ShrinkOutput {
            location: self.resolve(&location),
            info,
        })
    }

    /// 取回输出图片；指令集非空时一并提交
    pub async fn materialize(
        &self,
        location: &str,
        commands: &CommandSet,
    ) -> Result<MaterializedImage, ServiceError> {
        let req = if commands.is_empty() {
            self.http.get(location)
        } else {
            self.http.post(location).json(commands)
        };
        let resp = req
            .basic_auth(AUTH_USER, Some(&self.api_key))
            .send()
            .await?;
        let resp = self.check(resp).await?;

        let headers = resp.headers();
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(|v| v.trim().to_ascii_lowercase())
            .filter(|v| !v.is_empty());
        let width = header_u32(headers, IMAGE_WIDTH_HEADER);
        let height = header_u32(headers, IMAGE_HEIGHT_HEADER);
        let bytes = resp.bytes().await?;

        Ok(MaterializedImage {
            bytes,
            content_type,
            width,
            height,
        })
    }

    /// 校验 API Key：提交一个空的 shrink 请求。
    ///
    /// 上游对空输入返回 400（InputMissing）即说明凭证有效，且不消耗额度。
    /// 429 表示额度已用完，凭证本身仍然有效。
    pub async fn validate(&self) -> Result<ServiceUsage, ServiceError> {
        let resp = self
            .http
            .post(self.endpoint("/shrink"))
            .basic_auth(AUTH_USER, Some(&self.api_key))
            .send()
            .await?;
        match self.check(resp).await {
            Ok(_) | Err(ServiceError::Client { .. }) | Err(ServiceError::Quota(_)) => {
                Ok(self.usage())
            }
            Err(e) => Err(e),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// 上游可能返回相对路径的 Location
    fn resolve(&self, location: &str) -> String {
        if location.starts_with("http://") || location.starts_with("https://") {
            location.to_string()
        } else if location.starts_with('/') {
            self.endpoint(location)
        } else {
            self.endpoint(&format!("/{location}"))
        }
    }

    fn record_usage(&self, headers: &HeaderMap) {
        if let Some(count) = headers
            .get(COMPRESSION_COUNT_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
        {
            self.compression_count.store(count, Ordering::Relaxed);
        }
    }

    /// 记录用量并把非 2xx 响应转换为 `ServiceError`
    async fn check(&self, resp: reqwest::Response) -> Result<reqwest::Response, ServiceError> {
        self.record_usage(resp.headers());

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let text = resp.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<ApiErrorBody>(&text)
            .map(|body| body.describe())
            .unwrap_or_default();
        let message = if detail.is_empty() {
            status
                .canonical_reason()
                .unwrap_or("Unknown status")
                .to_string()
        } else {
            detail
        };

        tracing::debug!(status = status.as_u16(), "Tinify 返回错误: {}", message);
        Err(ServiceError::from_status(status.as_u16(), message))
    }
}

fn header_u32(headers: &HeaderMap, name: &str) -> Option<u32> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}
