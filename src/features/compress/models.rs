use std::fmt;
use std::str::FromStr;

use axum::body::Bytes;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::AppError;

/// 目标输出格式
#[derive(Debug, Clone, Copy, Serialize, Deserialize, utoipa::ToSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// PNG（默认，不做格式转换）
    #[default]
    Png,
    /// JPEG（无透明通道，转换时会填充背景色）
    #[serde(alias = "jpg")]
    Jpeg,
    /// WebP
    Webp,
    /// AVIF
    Avif,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::Webp => "webp",
            OutputFormat::Avif => "avif",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Png => "image/png",
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Webp => "image/webp",
            OutputFormat::Avif => "image/avif",
        }
    }

    /// 文件扩展名（jpeg 使用惯用的 jpg）
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            other => other.as_str(),
        }
    }

    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/png" => Some(OutputFormat::Png),
            "image/jpeg" | "image/jpg" => Some(OutputFormat::Jpeg),
            "image/webp" => Some(OutputFormat::Webp),
            "image/avif" => Some(OutputFormat::Avif),
            _ => None,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(OutputFormat::Png),
            "jpeg" | "jpg" => Ok(OutputFormat::Jpeg),
            "webp" => Ok(OutputFormat::Webp),
            "avif" => Ok(OutputFormat::Avif),
            other => Err(AppError::InvalidInput(format!(
                "Unsupported format '{other}', expected one of png, jpeg, jpg, webp, avif"
            ))),
        }
    }
}

/// 可选变换参数
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompressOptions {
    pub format: OutputFormat,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub background: Option<String>,
}

impl CompressOptions {
    /// 由松散的请求字段构造，空字符串视为未提供
    pub fn parse(
        format: Option<&str>,
        width: Option<u32>,
        height: Option<u32>,
        background: Option<String>,
    ) -> Result<Self, AppError> {
        let format = match format.map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => raw.parse()?,
            None => OutputFormat::default(),
        };
        if width == Some(0) || height == Some(0) {
            return Err(AppError::InvalidInput(
                "width and height must be positive integers".to_string(),
            ));
        }
        let background = background
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Ok(Self {
            format,
            width,
            height,
            background,
        })
    }
}

/// 解析尺寸字段（multipart 文本或 JSON 字符串），空白视为未提供
pub fn parse_dimension(field: &str, raw: Option<&str>) -> Result<Option<u32>, AppError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(v) => v.parse::<u32>().map(Some).map_err(|_| {
            AppError::InvalidInput(format!("{field} must be a positive integer, got '{v}'"))
        }),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDimension {
    Number(u32),
    Text(String),
}

/// JSON 中的尺寸既可以是数字也可以是字符串，与 multipart 保持一致
fn deserialize_dimension<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<RawDimension>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RawDimension::Number(n)) => Ok(Some(n)),
        Some(RawDimension::Text(s)) => {
            parse_dimension("dimension", Some(&s)).map_err(serde::de::Error::custom)
        }
    }
}

/// 待压缩的图片与参数
#[derive(Debug, Clone)]
pub struct CompressionRequest {
    pub image: Bytes,
    pub options: CompressOptions,
}

impl CompressionRequest {
    /// 图片字节不能为空
    pub fn new(image: Bytes, options: CompressOptions) -> Result<Self, AppError> {
        if image.is_empty() {
            return Err(AppError::MissingInput("The uploaded image is empty".to_string()));
        }
        Ok(Self { image, options })
    }
}

/// 压缩结果
#[derive(Debug, Clone)]
pub struct CompressionResult {
    pub output: Bytes,
    /// 实际输出格式（以上游 Content-Type 为准）
    pub output_format: String,
    pub mime_type: String,
    pub original_size: u64,
    pub compressed_size: u64,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub compression_count: u64,
}

impl CompressionResult {
    pub fn savings(&self) -> i64 {
        savings_percent(self.original_size, self.compressed_size)
    }

    /// 二进制下载时使用的文件扩展名
    pub fn extension(&self) -> &str {
        match OutputFormat::from_mime(&self.mime_type) {
            Some(fmt) => fmt.extension(),
            None => self.output_format.as_str(),
        }
    }
}

/// 节省比例：round((1 - compressed / original) * 100)
///
/// 压缩后更大时为负数；original 为 0 时返回 0。
pub fn savings_percent(original: u64, compressed: u64) -> i64 {
    if original == 0 {
        return 0;
    }
    ((1.0 - compressed as f64 / original as f64) * 100.0).round() as i64
}

/// JSON 压缩请求体
#[derive(Debug, Clone, Default, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CompressJsonRequest {
    /// base64 编码的图片（可带 `data:image/png;base64,` 前缀）
    #[schema(example = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mP8z8BQDwAEhQGAhKmMIQAAAABJRU5ErkJggg==")]
    #[serde(default)]
    pub image: Option<String>,
    /// 输出格式：png | jpeg | jpg | webp | avif（默认 png）
    #[schema(example = "webp")]
    #[serde(default)]
    pub format: Option<String>,
    /// 目标宽度（fit 缩放），数字或数字字符串
    #[serde(default, deserialize_with = "deserialize_dimension")]
    pub width: Option<u32>,
    /// 目标高度（fit 缩放），数字或数字字符串
    #[serde(default, deserialize_with = "deserialize_dimension")]
    pub height: Option<u32>,
    /// 背景色（仅 jpeg 生效，默认 white）
    #[schema(example = "#ffffff")]
    #[serde(default)]
    pub background: Option<String>,
}

/// JSON 压缩响应体
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompressJsonResponse {
    pub success: bool,
    /// base64 编码的压缩结果
    pub image: String,
    /// 实际输出格式
    #[schema(example = "webp")]
    pub format: String,
    #[schema(example = "image/webp")]
    pub mime_type: String,
    pub original_size: u64,
    pub compressed_size: u64,
    /// 节省百分比（整数）
    #[schema(example = 63)]
    pub savings: i64,
    /// 本月已用压缩次数
    pub compression_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

/// multipart 表单（仅用于 OpenAPI 文档）
#[derive(Debug, utoipa::ToSchema)]
#[allow(dead_code)]
pub struct CompressBinaryForm {
    /// 图片文件
    #[schema(value_type = String, format = Binary)]
    pub image: Vec<u8>,
    pub format: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub background: Option<String>,
}
