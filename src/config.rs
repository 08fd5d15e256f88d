use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 配置文件路径的环境变量名（缺省为 `config.toml`，文件不存在时跳过）
const CONFIG_PATH_ENV: &str = "APP_CONFIG";

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    pub host: String,
    /// 监听端口
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别（`RUST_LOG` 优先）
    pub level: String,
    /// 日志格式：full | compact
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "full".to_string(),
        }
    }
}

/// API 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API 路由前缀
    pub prefix: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            prefix: "/api".to_string(),
        }
    }
}

/// Tinify 上游配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TinifyConfig {
    /// API Key（也可通过 `TINIFY_API_KEY` 提供）
    #[serde(default)]
    pub api_key: String,
    /// API 基地址
    #[serde(default = "TinifyConfig::default_base_url")]
    pub base_url: String,
    /// 单次上游请求超时（秒）
    #[serde(default = "TinifyConfig::default_timeout")]
    pub timeout_secs: u64,
    /// 上游请求的 User-Agent
    #[serde(default = "TinifyConfig::default_user_agent")]
    pub user_agent: String,
}

impl TinifyConfig {
    fn default_base_url() -> String {
        "https://api.tinify.com".to_string()
    }
    fn default_timeout() -> u64 {
        60
    }
    fn default_user_agent() -> String {
        format!("tiny-relay/{}", env!("CARGO_PKG_VERSION"))
    }

    /// 获取上游请求超时时间
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

impl Default for TinifyConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: Self::default_base_url(),
            timeout_secs: Self::default_timeout(),
            user_agent: Self::default_user_agent(),
        }
    }
}

/// 上传体积限制
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// 二进制（multipart）上传的最大字节数
    #[serde(default = "UploadConfig::default_max_binary")]
    pub max_binary_bytes: usize,
    /// JSON 请求体的最大字节数（base64 会膨胀约 4/3）
    #[serde(default = "UploadConfig::default_max_json")]
    pub max_json_bytes: usize,
}

impl UploadConfig {
    fn default_max_binary() -> usize {
        50 * 1024 * 1024
    }
    fn default_max_json() -> usize {
        70 * 1024 * 1024
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_binary_bytes: Self::default_max_binary(),
            max_json_bytes: Self::default_max_json(),
        }
    }
}

/// CORS 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// 是否启用 CORS
    #[serde(default = "CorsConfig::default_enabled")]
    pub enabled: bool,
    /// 允许的 Origin 列表（支持 "*" 表示任意）
    #[serde(default = "CorsConfig::default_origins")]
    pub allowed_origins: Vec<String>,
    /// 允许的方法列表（支持 "*" 表示任意）
    #[serde(default = "CorsConfig::default_methods")]
    pub allowed_methods: Vec<String>,
    /// 允许的请求头列表（支持 "*" 表示任意）
    #[serde(default = "CorsConfig::default_headers")]
    pub allowed_headers: Vec<String>,
    /// 暴露的响应头列表；默认包含二进制接口的元数据头，浏览器端才能读到
    #[serde(default = "CorsConfig::default_expose_headers")]
    pub expose_headers: Vec<String>,
    /// 是否允许携带凭证（Cookie/Authorization）
    #[serde(default)]
    pub allow_credentials: bool,
    /// 预检缓存时间（秒）
    #[serde(default)]
    pub max_age_secs: Option<u64>,
}

impl CorsConfig {
    fn default_enabled() -> bool {
        true
    }
    fn default_origins() -> Vec<String> {
        vec!["*".to_string()]
    }
    fn default_methods() -> Vec<String> {
        vec!["GET".to_string(), "POST".to_string(), "OPTIONS".to_string()]
    }
    fn default_headers() -> Vec<String> {
        vec!["*".to_string()]
    }
    fn default_expose_headers() -> Vec<String> {
        [
            "x-original-size",
            "x-compressed-size",
            "x-savings",
            "x-compression-count",
            "x-output-format",
            "x-request-id",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            allowed_origins: Self::default_origins(),
            allowed_methods: Self::default_methods(),
            allowed_headers: Self::default_headers(),
            expose_headers: Self::default_expose_headers(),
            allow_credentials: false,
            max_age_secs: None,
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub api: ApiConfig,
    /// Tinify 上游配置
    #[serde(default)]
    pub tinify: TinifyConfig,
    /// 上传限制
    #[serde(default)]
    pub upload: UploadConfig,
    /// CORS 配置
    #[serde(default)]
    pub cors: CorsConfig,
}

impl AppConfig {
    /// 按 默认值 → 配置文件（可选）→ 环境变量 的顺序加载配置
    ///
    /// 环境变量：
    /// - `APP_SERVER__PORT`、`APP_TINIFY__API_KEY` 等（`__` 分隔层级）
    /// - `TINIFY_API_KEY`、`PORT` 作为常用别名，优先级最高
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| "config.toml".to_string());
        let port_override = match std::env::var("PORT") {
            Ok(raw) => Some(raw.trim().parse::<u16>().map_err(|e| {
                ConfigError::Message(format!("PORT 不是合法端口号 ({raw}): {e}"))
            })?),
            Err(_) => None,
        };

        let builder = ConfigBuilder::builder()
            .add_source(ConfigBuilder::try_from(&AppConfig::default())?)
            .add_source(File::with_name(&config_path).required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("tinify.api_key", std::env::var("TINIFY_API_KEY").ok())?
            .set_override_option("server.port", port_override.map(i64::from))?
            .build()?;

        let config: Self = builder.try_deserialize()?;
        config.validate()?;

        tracing::debug!(
            "配置加载完成: tinify.base_url = {}, api_key = {}",
            config.tinify.base_url,
            config.masked_api_key()
        );

        Ok(config)
    }

    /// 启动前的必要校验
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tinify.api_key.trim().is_empty() {
            return Err(ConfigError::Message(
                "缺少 Tinify API Key，请设置 TINIFY_API_KEY 或 tinify.api_key".to_string(),
            ));
        }
        if self.upload.max_binary_bytes == 0 || self.upload.max_json_bytes == 0 {
            return Err(ConfigError::Message("上传体积限制必须大于 0".to_string()));
        }
        Ok(())
    }

    /// 获取服务器监听地址
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// 日志里展示用的 API Key（只保留前 4 位）
    pub fn masked_api_key(&self) -> String {
        let key = self.tinify.api_key.trim();
        let prefix: String = key.chars().take(4).collect();
        format!("{prefix}***")
    }
}
