use tiny_relay::{AppConfig, AppState, create_app, shutdown};

fn init_tracing(config: Option<&AppConfig>) {
    let default_level = config.map(|c| c.logging.level.as_str()).unwrap_or("info");
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("tiny_relay={default_level},tower_http={default_level}").into()
    });

    let compact = config.is_some_and(|c| c.logging.format.eq_ignore_ascii_case("compact"));
    if compact {
        tracing_subscriber::fmt().compact().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() {
    // 先加载配置再初始化日志，日志级别以配置为准（RUST_LOG 优先）
    let loaded = AppConfig::load();
    init_tracing(loaded.as_ref().ok());

    let config = match loaded {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("配置初始化失败: {}", e);
            std::process::exit(1);
        }
    };

    let state = match AppState::new(&config.tinify) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Tinify 客户端初始化失败: {}", e);
            std::process::exit(1);
        }
    };

    let app = create_app(state, &config);

    let addr = config.server_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("绑定地址失败 {}: {}", addr, e);
            std::process::exit(1);
        });

    tracing::info!("服务器启动: http://{}", addr);
    tracing::info!("API文档: http://{}/docs", addr);
    tracing::info!("压缩接口: http://{}{}/compress", addr, config.api.prefix);
    tracing::info!("状态接口: http://{}{}/status", addr, config.api.prefix);
    tracing::info!(
        "Tinify 上游: {}（API Key {}）",
        config.tinify.base_url,
        config.masked_api_key()
    );

    let graceful = axum::serve(listener, app).with_graceful_shutdown(async {
        let reason = shutdown::wait_for_signal().await;
        tracing::info!("接收到退出信号: {:?}，开始优雅关闭HTTP服务器...", reason);
    });

    if let Err(e) = graceful.await {
        tracing::error!("服务器运行错误: {}", e);
        std::process::exit(1);
    }

    tracing::info!("服务器已优雅关闭");
}
