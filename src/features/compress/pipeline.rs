//! 压缩 + 变换流水线：上传 → 缩放 → 转换 → 填充背景 → 物化。
//!
//! JSON 与二进制两个接口共用这里的 `compress`，只在边界上做请求/响应适配。
use std::time::Instant;

use crate::error::ServiceError;
use crate::features::tinify::TinifyClient;
use crate::features::tinify::models::{
    CommandSet, ConvertCommand, ResizeCommand, TransformCommand,
};

use super::models::{CompressOptions, CompressionRequest, CompressionResult, OutputFormat};

/// 只给定一个维度时，另一维度使用的“无约束”取值
pub const UNBOUNDED_DIMENSION: u32 = 9999;

/// jpeg 没有透明通道，未指定背景时使用白色
pub const DEFAULT_BACKGROUND: &str = "white";

const RESIZE_METHOD_FIT: &str = "fit";

/// 根据参数生成上游指令集（固定顺序：resize → convert → background）
pub fn build_commands(options: &CompressOptions) -> CommandSet {
    let resize = if options.width.is_some() || options.height.is_some() {
        Some(ResizeCommand {
            method: RESIZE_METHOD_FIT,
            width: options.width.unwrap_or(UNBOUNDED_DIMENSION),
            height: options.height.unwrap_or(UNBOUNDED_DIMENSION),
        })
    } else {
        None
    };

    let convert = (options.format != OutputFormat::Png).then(|| ConvertCommand {
        mime_type: options.format.mime_type().to_string(),
    });

    let transform = (options.format == OutputFormat::Jpeg).then(|| TransformCommand {
        background: options
            .background
            .clone()
            .unwrap_or_else(|| DEFAULT_BACKGROUND.to_string()),
    });

    CommandSet {
        resize,
        convert,
        transform,
    }
}

/// 执行一次完整压缩；每次调用会让上游月度计数加一
pub async fn compress(
    client: &TinifyClient,
    request: CompressionRequest,
) -> Result<CompressionResult, ServiceError> {
    let started = Instant::now();
    let CompressionRequest { image, options } = request;
    let original_size = image.len() as u64;
    let commands = build_commands(&options);

    let source = client.shrink(image).await?;
    tracing::debug!(
        target: "compress",
        input_type = %source.info.input.mime_type,
        shrunk_size = source.info.output.size,
        "源图已上传"
    );

    let output = client.materialize(&source.location, &commands).await?;

    // 请求 png 时不做转换，输出格式沿用源图，因此以上游 Content-Type 为准
    let mime_type = output
        .content_type
        .clone()
        .unwrap_or_else(|| options.format.mime_type().to_string());
    let output_format = match OutputFormat::from_mime(&mime_type) {
        Some(fmt) => fmt.as_str().to_string(),
        None => mime_type
            .strip_prefix("image/")
            .unwrap_or(options.format.as_str())
            .to_string(),
    };

    let result = CompressionResult {
        compressed_size: output.bytes.len() as u64,
        output: output.bytes,
        output_format,
        mime_type,
        original_size,
        width: output.width,
        height: output.height,
        compression_count: client.usage().compression_count,
    };

    tracing::info!(
        target: "compress",
        original_size = result.original_size,
        compressed_size = result.compressed_size,
        savings = result.savings(),
        format = %result.output_format,
        resized = commands.resize.is_some(),
        compression_count = result.compression_count,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "压缩完成"
    );

    Ok(result)
}
