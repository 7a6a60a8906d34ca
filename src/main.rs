use ragy_server::{Config, Server, ServerState, print_banner};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. 环境变量 (.env 可选)
    let _ = dotenv::dotenv();

    // 2. 加载配置
    let config = Config::from_env()?;

    // 3. 日志 (生产环境落盘，按天滚动)
    let log_dir = config.log_dir();
    if config.is_production() {
        std::fs::create_dir_all(&log_dir)?;
        ragy_server::init_logger_with_file(Some("info"), Some(&log_dir));
    } else {
        ragy_server::init_logger();
    }

    print_banner();
    tracing::info!("Ragy server starting...");

    // 4. 初始化服务器状态
    let state = ServerState::initialize(&config).await?;

    // 5. 启动 HTTP 服务器
    let server = Server::new(config, state);
    if let Err(e) = server.run().await {
        tracing::error!("Server error: {}", e);
        return Err(e);
    }

    Ok(())
}
