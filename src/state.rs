use std::sync::Arc;

use crate::config::TinifyConfig;
use crate::error::AppError;
use crate::features::tinify::TinifyClient;

/// 聚合的应用共享状态
#[derive(Clone)]
pub struct AppState {
    /// 上游客户端（持有 API Key 与月度用量计数）
    pub tinify: Arc<TinifyClient>,
}

impl AppState {
    pub fn new(tinify: &TinifyConfig) -> Result<Self, AppError> {
        Ok(Self {
            tinify: Arc::new(TinifyClient::new(tinify)?),
        })
    }
}
