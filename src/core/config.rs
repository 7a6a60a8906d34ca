use crate::auth::JwtConfig;

/// 服务器配置
///
/// # 环境变量
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | WORK_DIR | /var/lib/ragy | 工作目录 (数据库、日志) |
/// | DATABASE_PATH | {WORK_DIR}/ragy.db | SQLite 数据库文件 |
/// | HTTP_PORT | 3000 | HTTP 服务端口 |
/// | JWT_SECRET | (必填) | JWT 密钥，至少 32 字节 |
/// | GATEWAY_BASE_URL | (必填) | KNET 网关地址 |
/// | GATEWAY_API_KEY | (必填) | KNET 网关密钥 |
/// | FCM_ENDPOINT | https://fcm.googleapis.com/fcm/send | FCM 推送端点 |
/// | FCM_SERVER_KEY | "" | FCM 服务端密钥 |
/// | PAYMENT_SUCCESS_URL | (必填) | 支付成功跳转地址 |
/// | PAYMENT_ERROR_URL | (必填) | 支付失败跳转地址 |
/// | ENVIRONMENT | development | 运行环境 |
#[derive(Debug, Clone)]
pub struct Config {
    /// 工作目录，存储数据库与日志文件
    pub work_dir: String,
    /// SQLite 数据库文件路径
    pub database_path: String,
    /// HTTP API 服务端口
    pub http_port: u16,
    /// JWT 认证配置
    pub jwt: JwtConfig,
    /// 运行环境: development | staging | production
    pub environment: String,

    // === 支付网关 ===
    pub gateway_base_url: String,
    pub gateway_api_key: String,
    /// 支付成功后的浏览器跳转地址
    pub payment_success_url: String,
    /// 支付失败后的浏览器跳转地址
    pub payment_error_url: String,

    // === 推送 ===
    pub fcm_endpoint: String,
    pub fcm_server_key: String,
}

impl Config {
    /// 从环境变量加载配置
    pub fn from_env() -> anyhow::Result<Self> {
        let work_dir = std::env::var("WORK_DIR").unwrap_or_else(|_| "/var/lib/ragy".into());
        let database_path =
            std::env::var("DATABASE_PATH").unwrap_or_else(|_| format!("{work_dir}/ragy.db"));

        Ok(Self {
            database_path,
            http_port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            jwt: JwtConfig::from_env().map_err(|e| anyhow::anyhow!(e))?,
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
            gateway_base_url: require_env("GATEWAY_BASE_URL")?,
            gateway_api_key: require_env("GATEWAY_API_KEY")?,
            payment_success_url: require_env("PAYMENT_SUCCESS_URL")?,
            payment_error_url: require_env("PAYMENT_ERROR_URL")?,
            fcm_endpoint: std::env::var("FCM_ENDPOINT")
                .unwrap_or_else(|_| "https://fcm.googleapis.com/fcm/send".into()),
            fcm_server_key: std::env::var("FCM_SERVER_KEY").unwrap_or_default(),
            work_dir,
        })
    }

    /// 是否生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// 日志目录 (work_dir/logs)
    pub fn log_dir(&self) -> String {
        format!("{}/logs", self.work_dir)
    }
}

fn require_env(name: &str) -> anyhow::Result<String> {
    std::env::var(name).map_err(|_| anyhow::anyhow!("{name} environment variable must be set"))
}
