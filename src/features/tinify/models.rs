use axum::body::Bytes;
use serde::{Deserialize, Serialize};

/// 缩放指令（只使用 fit：在给定边界内等比缩放）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResizeCommand {
    pub method: &'static str,
    pub width: u32,
    pub height: u32,
}

/// 格式转换指令
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConvertCommand {
    #[serde(rename = "type")]
    pub mime_type: String,
}

/// 背景填充指令（转为不支持透明通道的格式时使用）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransformCommand {
    pub background: String,
}

/// 对输出地址提交的指令集合
///
/// 为空时直接 GET 输出地址；否则以 JSON 形式 POST。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommandSet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resize: Option<ResizeCommand>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub convert: Option<ConvertCommand>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transform: Option<TransformCommand>,
}

impl CommandSet {
    pub fn is_empty(&self) -> bool {
        self.resize.is_none() && self.convert.is_none() && self.transform.is_none()
    }
}

/// `/shrink` 响应中的图片描述
#[derive(Debug, Clone, Deserialize)]
pub struct ImageInfo {
    #[serde(default)]
    pub size: u64,
    #[serde(rename = "type", default)]
    pub mime_type: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub ratio: Option<f64>,
    #[serde(default)]
    pub url: Option<String>,
}

/// `/shrink` 响应体
#[derive(Debug, Clone, Deserialize)]
pub struct ShrinkResponse {
    pub input: ImageInfo,
    pub output: ImageInfo,
}

/// 上游错误响应体：`{"error": "...", "message": "..."}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub message: String,
}

impl ApiErrorBody {
    /// 拼成一条便于透出的消息
    pub fn describe(&self) -> String {
        match (self.error.is_empty(), self.message.is_empty()) {
            (false, false) => format!("{}: {}", self.error, self.message),
            (false, true) => self.error.clone(),
            (true, false) => self.message.clone(),
            (true, true) => String::new(),
        }
    }
}

/// 上传完成后的源图句柄
#[derive(Debug, Clone)]
pub struct ShrinkOutput {
    /// 输出资源地址（后续指令都提交到这里）
    pub location: String,
    pub info: ShrinkResponse,
}

/// 最终物化得到的图片
#[derive(Debug, Clone)]
pub struct MaterializedImage {
    pub bytes: Bytes,
    /// 去掉参数后的 Content-Type，例如 `image/webp`
    pub content_type: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// 上游报告的用量
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceUsage {
    /// 本月已压缩次数（取自最近一次响应的 Compression-Count）
    pub compression_count: u64,
    /// 免费额度的月上限
    pub monthly_limit: u64,
}

impl ServiceUsage {
    pub fn remaining(&self) -> u64 {
        self.monthly_limit.saturating_sub(self.compression_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_set_serializes_only_present_operations() {
        let commands = CommandSet {
            resize: None,
            convert: Some(ConvertCommand {
                mime_type: "image/webp".to_string(),
            }),
            transform: None,
        };
        let v = serde_json::to_value(&commands).expect("serialize");
        assert_eq!(v, serde_json::json!({ "convert": { "type": "image/webp" } }));
        assert!(!commands.is_empty());
        assert!(CommandSet::default().is_empty());
    }

    #[test]
    fn api_error_body_describe_joins_fields() {
        let body: ApiErrorBody =
            serde_json::from_str(r#"{"error":"Unauthorized","message":"Credentials are invalid."}"#)
                .expect("parse");
        assert_eq!(body.describe(), "Unauthorized: Credentials are invalid.");
    }

    #[test]
    fn remaining_never_underflows() {
        let usage = ServiceUsage {
            compression_count: 612,
            monthly_limit: 500,
        };
        assert_eq!(usage.remaining(), 0);
    }
}
