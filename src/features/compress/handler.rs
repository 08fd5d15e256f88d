//! 压缩接口（features/compress）：JSON/base64 与 multipart 二进制两种适配
use axum::{
    Json, Router,
    body::Bytes,
    extract::{
        DefaultBodyLimit, Extension, Multipart, State,
        multipart::{Field, MultipartError, MultipartRejection},
        rejection::JsonRejection,
    },
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    response::IntoResponse,
    routing::post,
};
use base64::{Engine as _, engine::general_purpose};

use crate::config::UploadConfig;
use crate::error::{AppError, ErrorBody};
use crate::state::AppState;

use super::models::{
    CompressBinaryForm, CompressJsonRequest, CompressJsonResponse, CompressOptions,
    CompressionRequest, CompressionResult, parse_dimension,
};
use super::pipeline;

pub const X_ORIGINAL_SIZE: HeaderName = HeaderName::from_static("x-original-size");
pub const X_COMPRESSED_SIZE: HeaderName = HeaderName::from_static("x-compressed-size");
pub const X_SAVINGS: HeaderName = HeaderName::from_static("x-savings");
pub const X_COMPRESSION_COUNT: HeaderName = HeaderName::from_static("x-compression-count");
pub const X_OUTPUT_FORMAT: HeaderName = HeaderName::from_static("x-output-format");

const IMAGE_FIELD: &str = "image";

/// multipart 边界、分段头与文本字段的额外空间；文件本身的上限单独校验
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// 单个上传文件的字节上限
#[derive(Debug, Clone, Copy)]
pub struct FileSizeLimit(pub usize);

#[utoipa::path(
    post,
    path = "/compress",
    summary = "压缩图片（JSON/base64）",
    description = "请求体携带 base64 图片与可选的 format/width/height/background，经 Tinify 压缩后以 base64 返回，并附带体积与节省比例。",
    request_body = CompressJsonRequest,
    responses(
        (status = 200, description = "压缩成功", body = CompressJsonResponse),
        (status = 400, description = "缺少图片或参数错误", body = ErrorBody),
        (status = 401, description = "API Key 无效", body = ErrorBody),
        (status = 429, description = "月度额度已用完", body = ErrorBody),
        (status = 500, description = "压缩失败", body = ErrorBody)
    ),
    tag = "Compress"
)]
pub async fn compress_json(
    State(state): State<AppState>,
    payload: Result<Json<CompressJsonRequest>, JsonRejection>,
) -> Result<Json<CompressJsonResponse>, AppError> {
    let Json(req) = payload.map_err(reject_json)?;

    let image = decode_image_field(req.image.as_deref())?;
    let options = CompressOptions::parse(
        req.format.as_deref(),
        req.width,
        req.height,
        req.background,
    )?;
    let request = CompressionRequest::new(image, options)?;

    let result = pipeline::compress(&state.tinify, request).await?;
    Ok(Json(json_response(&result)))
}

#[utoipa::path(
    post,
    path = "/compress/binary",
    summary = "压缩图片（multipart 二进制）",
    description = "以 multipart 字段 `image` 上传文件（上限 50 MiB），响应体直接是压缩后的图片，体积与节省比例放在 X-Original-Size / X-Compressed-Size / X-Savings / X-Compression-Count 响应头中。",
    request_body(content = CompressBinaryForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "压缩后的图片字节"),
        (status = 400, description = "缺少文件或参数错误", body = ErrorBody),
        (status = 401, description = "API Key 无效", body = ErrorBody),
        (status = 413, description = "文件超过上传限制", body = ErrorBody),
        (status = 429, description = "月度额度已用完", body = ErrorBody),
        (status = 500, description = "压缩失败", body = ErrorBody)
    ),
    tag = "Compress"
)]
pub async fn compress_binary(
    State(state): State<AppState>,
    Extension(file_limit): Extension<FileSizeLimit>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, AppError> {
    let mut multipart = multipart.map_err(|e| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge(e.body_text())
        } else {
            // 非 multipart 请求等同于没有上传文件
            AppError::MissingInput(format!("Expected a multipart upload: {}", e.body_text()))
        }
    })?;

    let mut image: Option<Bytes> = None;
    let mut format: Option<String> = None;
    let mut width: Option<String> = None;
    let mut height: Option<String> = None;
    let mut background: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(reject_multipart)? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        match name.as_str() {
            IMAGE_FIELD => image = Some(read_file_field(field, file_limit.0).await?),
            "format" => format = Some(field.text().await.map_err(reject_multipart)?),
            "width" => width = Some(field.text().await.map_err(reject_multipart)?),
            "height" => height = Some(field.text().await.map_err(reject_multipart)?),
            "background" => background = Some(field.text().await.map_err(reject_multipart)?),
            _ => {}
        }
    }

    let image = image.ok_or_else(|| {
        AppError::MissingInput("Multipart field 'image' must contain a file".to_string())
    })?;
    let options = CompressOptions::parse(
        format.as_deref(),
        parse_dimension("width", width.as_deref())?,
        parse_dimension("height", height.as_deref())?,
        background,
    )?;
    let request = CompressionRequest::new(image, options)?;

    let result = pipeline::compress(&state.tinify, request).await?;
    let headers = binary_headers(&result)?;
    Ok((StatusCode::OK, headers, result.output))
}

/// 路由：两种请求体各自设置体积上限
pub fn create_compress_router(upload: &UploadConfig) -> Router<AppState> {
    let multipart_limit = upload
        .max_binary_bytes
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    Router::<AppState>::new()
        .route(
            "/compress",
            post(compress_json).layer(DefaultBodyLimit::max(upload.max_json_bytes)),
        )
        .route(
            "/compress/binary",
            post(compress_binary)
                .layer::<_, std::convert::Infallible>(DefaultBodyLimit::max(multipart_limit))
                .layer(Extension(FileSizeLimit(upload.max_binary_bytes))),
        )
}

/// 分块读取文件字段，累计超过上限即返回 413
async fn read_file_field(mut field: Field<'_>, limit: usize) -> Result<Bytes, AppError> {
    let mut buf = Vec::new();
    while let Some(chunk) = field.chunk().await.map_err(reject_multipart)? {
        if buf.len() + chunk.len() > limit {
            return Err(AppError::PayloadTooLarge(format!(
                "Uploaded file exceeds the {limit} byte limit"
            )));
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(Bytes::from(buf))
}

/// 解码 base64 图片字段，兼容 data URL 前缀与换行
fn decode_image_field(raw: Option<&str>) -> Result<Bytes, AppError> {
    let raw = raw.map(str::trim).unwrap_or_default();
    let encoded = match raw.strip_prefix("data:") {
        Some(rest) => rest.split_once(',').map(|(_, data)| data).unwrap_or_default(),
        None => raw,
    };
    if encoded.is_empty() {
        return Err(AppError::MissingInput(
            "Request body must include a base64 'image' field".to_string(),
        ));
    }

    let cleaned: String = encoded
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    let bytes = general_purpose::STANDARD
        .decode(cleaned.as_bytes())
        .map_err(|e| AppError::InvalidInput(format!("Field 'image' is not valid base64: {e}")))?;
    Ok(Bytes::from(bytes))
}

fn reject_json(e: JsonRejection) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(e.body_text())
    } else {
        AppError::InvalidInput(e.body_text())
    }
}

fn reject_multipart(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(e.body_text())
    } else {
        AppError::InvalidInput(e.body_text())
    }
}

fn json_response(result: &CompressionResult) -> CompressJsonResponse {
    CompressJsonResponse {
        success: true,
        image: general_purpose::STANDARD.encode(&result.output),
        format: result.output_format.clone(),
        mime_type: result.mime_type.clone(),
        original_size: result.original_size,
        compressed_size: result.compressed_size,
        savings: result.savings(),
        compression_count: result.compression_count,
        width: result.width,
        height: result.height,
    }
}

fn binary_headers(result: &CompressionResult) -> Result<HeaderMap, AppError> {
    let invalid = |e: header::InvalidHeaderValue| AppError::Internal(format!("构造响应头失败: {e}"));

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&result.mime_type).map_err(invalid)?,
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&format!(
            "inline; filename=\"compressed.{}\"",
            result.extension()
        ))
        .map_err(invalid)?,
    );
    headers.insert(X_ORIGINAL_SIZE, HeaderValue::from(result.original_size));
    headers.insert(X_COMPRESSED_SIZE, HeaderValue::from(result.compressed_size));
    headers.insert(
        X_SAVINGS,
        HeaderValue::from_str(&format!("{}%", result.savings())).map_err(invalid)?,
    );
    headers.insert(X_COMPRESSION_COUNT, HeaderValue::from(result.compression_count));
    headers.insert(
        X_OUTPUT_FORMAT,
        HeaderValue::from_str(&result.output_format).map_err(invalid)?,
    );
    Ok(headers)
}
