use axum::{Router, body::Body, middleware, routing::get};
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::AppConfig;
use crate::cors::build_cors_layer;
use crate::features::{compress, health, status};
use crate::openapi::ApiDoc;
use crate::request_id::{make_request_span, request_id_middleware};
use crate::state::AppState;

fn compression_predicate() -> impl tower_http::compression::predicate::Predicate {
    use tower_http::compression::predicate::{NotForContentType, Predicate, SizeAbove};

    // 只压缩 JSON/文本类响应：压缩结果本身已是图片，二次压缩只会浪费 CPU。
    SizeAbove::default()
        .and(NotForContentType::GRPC)
        .and(NotForContentType::IMAGES)
        .and(NotForContentType::SSE)
        .and(NotForContentType::const_new("application/octet-stream"))
}

/// 组装完整路由：存活检查 + 业务接口 + 文档，以及全局中间件
pub fn create_app(state: AppState, config: &AppConfig) -> Router {
    let api_router = Router::<AppState>::new()
        .merge(compress::create_compress_router(&config.upload))
        .merge(status::create_status_router());

    let mut app = Router::<AppState>::new()
        .route("/", get(health::health_check))
        .nest(&config.api.prefix, api_router)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(state)
        .layer(CompressionLayer::new().compress_when(compression_predicate()))
        .layer(TraceLayer::new_for_http().make_span_with(make_request_span::<Body>))
        // request_id 必须在 TraceLayer 外层，span 才能读到它
        .layer(middleware::from_fn(request_id_middleware));

    if let Some(cors) = build_cors_layer(&config.cors) {
        app = app.layer(cors);
    }

    app
}

#[cfg(test)]
mod compression_predicate_tests {
    use super::compression_predicate;
    use axum::body::Body;
    use axum::http::{Response as HttpResponse, header};
    use tower_http::compression::predicate::Predicate;

    fn should_compress_for(ct: &str) -> bool {
        // 命中 SizeAbove（默认 32B），避免因为 body 太小导致测试不稳定。
        let body_bytes = vec![b'x'; 2048];
        let resp = HttpResponse::builder()
            .header(header::CONTENT_TYPE, ct)
            .body(Body::from(body_bytes))
            .unwrap();
        compression_predicate().should_compress(&resp)
    }

    #[test]
    fn compression_predicate_skips_compressed_images() {
        assert!(!should_compress_for("image/png"));
        assert!(!should_compress_for("image/webp"));
        assert!(!should_compress_for("image/avif"));
    }

    #[test]
    fn compression_predicate_allows_json() {
        assert!(should_compress_for("application/json"));
    }

    #[test]
    fn compression_predicate_skips_octet_stream() {
        assert!(!should_compress_for("application/octet-stream"));
    }
}
