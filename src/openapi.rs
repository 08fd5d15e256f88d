use utoipa::{
    Modify, OpenApi,
    openapi::server::{ServerBuilder, ServerVariableBuilder},
};

/// 为 Swagger UI 提供正确的“业务接口前缀”Servers 配置。
///
/// - 业务接口默认前缀为 `/api`（对应 `config.api.prefix` / `APP_API__PREFIX`）。
/// - 存活检查 `/` 不带前缀，因此额外提供根路径作为备用 server。
struct ApiServers;

impl Modify for ApiServers {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let api = ServerBuilder::new()
            .url("{api_prefix}")
            .description(Some("业务接口（默认 /api）"))
            .parameter(
                "api_prefix",
                ServerVariableBuilder::new()
                    .default_value("/api")
                    .description(Some("业务接口前缀：对应 config.api.prefix")),
            )
            .build();

        let root = ServerBuilder::new()
            .url("/")
            .description(Some("根路径（存活检查）"))
            .build();

        openapi.servers = Some(vec![api, root]);
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::features::health::handler::health_check,
        crate::features::status::handler::get_status,
        crate::features::compress::handler::compress_json,
        crate::features::compress::handler::compress_binary,
    ),
    modifiers(&ApiServers),
    tags(
        (
            name = "Compress",
            description = "图片压缩：JSON/base64 与 multipart 二进制两种入口，共用同一条 Tinify 流水线。"
        ),
        (name = "Status", description = "凭证校验与月度用量。"),
        (name = "Health", description = "存活检查。"),
    ),
    info(
        title = "Tiny Relay API",
        version = env!("CARGO_PKG_VERSION"),
        description = "Tinify 图片压缩中继（Axum + utoipa）。除 `/` 外，业务接口挂载在 `config.api.prefix`（默认 /api）下，OpenAPI 的 paths 不包含该前缀。"
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::ApiDoc;
    use utoipa::OpenApi;

    #[test]
    fn openapi_lists_all_endpoints() {
        let doc = ApiDoc::openapi();
        for path in ["/", "/status", "/compress", "/compress/binary"] {
            assert!(doc.paths.paths.contains_key(path), "missing path {path}");
        }
    }
}
